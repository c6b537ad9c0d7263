use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crate::exchange::Exchange;
use crate::sim::Simulation;

/// Handle to the background integration thread. Dropping it without calling
/// [`HostHandle::stop`] detaches the thread, so the simulation loop owns one
/// for the lifetime of the run and stops it on shutdown.
pub struct HostHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<Simulation>,
}

/// Spawn the background thread that steps `sim` as fast as it can,
/// publishing each completed step to `exchange`. The render thread samples
/// at its own pace; intermediate steps are coalesced.
pub fn start(sim: Simulation, dt: f32, exchange: Arc<Exchange>) -> HostHandle {
    log::info!(
        "host backend stepping {} bodies with the {:?} model",
        sim.bodies.len(),
        sim.model()
    );
    let stop = Arc::new(AtomicBool::new(false));
    let token = stop.clone();
    let thread = std::thread::Builder::new()
        .name("simulation".to_string())
        .spawn(move || run_loop(sim, dt, exchange, token))
        .expect("failed to spawn the simulation thread");
    HostHandle { stop, thread }
}

fn run_loop(
    mut sim: Simulation,
    dt: f32,
    exchange: Arc<Exchange>,
    stop: Arc<AtomicBool>,
) -> Simulation {
    let mut steps: u64 = 0;
    while !stop.load(Ordering::Relaxed) {
        sim.step(dt);
        exchange.publish(&sim.bodies);
        steps += 1;
    }
    log::debug!("simulation thread exiting after {steps} steps");
    sim
}

impl HostHandle {
    /// Request termination and wait for the in-flight step to finish. After
    /// this returns nothing writes to the body set anymore; the final state
    /// is handed back to the caller.
    pub fn stop(self) -> Simulation {
        self.stop.store(true, Ordering::Relaxed);
        self.thread.join().expect("simulation thread panicked")
    }
}
