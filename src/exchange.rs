use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bodies::BodySet;

/// Hand-off point between the simulation and render threads.
///
/// The producer overwrites the snapshot under the lock; the consumer copies
/// it out whenever the dirty flag says a newer step exists. Both sides hold
/// the lock only for the memcpy, so neither stalls the other for long, and
/// the consumer always sees a complete step ("most recent wins", never a
/// torn one). Shutdown is signalled separately, through the host handle's
/// own atomic, so the two concerns stay independent.
pub struct Exchange {
    snapshot: Mutex<Vec<[f32; 4]>>,
    updated: AtomicBool,
}

impl Exchange {
    pub fn new(n_bodies: usize) -> Self {
        Self {
            snapshot: Mutex::new(vec![[0.0; 4]; n_bodies]),
            updated: AtomicBool::new(false),
        }
    }

    /// Store the positions of a completed step and mark them fresh.
    pub fn publish(&self, bodies: &BodySet) {
        let mut data = self.snapshot.lock().unwrap();
        for (slot, p) in data.iter_mut().zip(&bodies.pos) {
            *slot = [p.x, p.y, p.z, 0.0];
        }
        self.updated.store(true, Ordering::Release);
    }

    /// Copy the latest snapshot into `out` if one was published since the
    /// previous take. Returns whether `out` was written.
    pub fn take(&self, out: &mut [[f32; 4]]) -> bool {
        if !self.updated.swap(false, Ordering::Acquire) {
            return false;
        }
        let data = self.snapshot.lock().unwrap();
        out.copy_from_slice(&data);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Point3;

    fn set_with_positions(positions: &[[f32; 3]]) -> BodySet {
        let mut set = BodySet::zeroed(positions.len());
        for (i, p) in positions.iter().enumerate() {
            set.pos[i] = Point3::new(p[0], p[1], p[2]);
        }
        set
    }

    #[test]
    fn take_is_edge_triggered() {
        let exchange = Exchange::new(2);
        let mut out = [[0.0f32; 4]; 2];

        assert!(!exchange.take(&mut out));

        exchange.publish(&set_with_positions(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]));
        assert!(exchange.take(&mut out));
        assert_eq!(out[0], [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(out[1], [4.0, 5.0, 6.0, 0.0]);

        // Nothing new since the last take.
        assert!(!exchange.take(&mut out));
    }

    #[test]
    fn intermediate_steps_are_coalesced() {
        let exchange = Exchange::new(1);
        let mut out = [[0.0f32; 4]; 1];

        exchange.publish(&set_with_positions(&[[1.0, 0.0, 0.0]]));
        exchange.publish(&set_with_positions(&[[2.0, 0.0, 0.0]]));

        assert!(exchange.take(&mut out));
        assert_eq!(out[0][0], 2.0);
        assert!(!exchange.take(&mut out));
    }
}
