use cgmath::{Point3, Vector3, Zero};
use rayon::iter::{
    IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator,
};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::bodies::BodySet;
use crate::constants::{BODIES_PER_THREAD, G, MAX_THREADS};

pub mod host;
mod merging;
mod softened;

pub use merging::accumulate as accumulate_merging;
pub use softened::accumulate as accumulate_softened;

/// Force law applied each step. The two variants are alternatives, not
/// layers: `Softened` pads the squared separation and never merges,
/// `Merging` collides overlapping bodies inelastically and uses the bare
/// inverse-square law everywhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GravityModel {
    Softened,
    Merging,
}

impl GravityModel {
    /// `Softened` keeps the accumulator in units of `m / r^3` and folds the
    /// gravitational constant in at integration time; `Merging` already
    /// divides the full force by each body's mass while accumulating.
    fn integration_scale(self) -> f32 {
        match self {
            GravityModel::Softened => G,
            GravityModel::Merging => 1.0,
        }
    }
}

fn compute_target_threads(n_bodies: usize) -> usize {
    n_bodies.div_ceil(BODIES_PER_THREAD).clamp(1, MAX_THREADS)
}

/// A body set plus the thread pool that advances it.
pub struct Simulation {
    pub bodies: BodySet,
    model: GravityModel,
    pool: ThreadPool,
}

impl Simulation {
    pub fn new(bodies: BodySet, model: GravityModel) -> Self {
        let n_threads = compute_target_threads(bodies.len());
        Self {
            bodies,
            model,
            pool: ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()
                .unwrap(),
        }
    }

    pub fn model(&self) -> GravityModel {
        self.model
    }

    /// Advance all bodies by one time step of `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        let model = self.model;
        let bodies = &mut self.bodies;
        self.pool.install(|| {
            match model {
                GravityModel::Softened => {
                    softened::accumulate(&bodies.pos, &bodies.mass, &mut bodies.acc);
                }
                GravityModel::Merging => {
                    merging::accumulate(
                        &bodies.pos,
                        &mut bodies.vel,
                        &bodies.mass,
                        &bodies.radius,
                        &mut bodies.acc,
                    );
                }
            }
            integrate(
                &mut bodies.pos,
                &mut bodies.vel,
                &mut bodies.acc,
                model.integration_scale(),
                dt,
            );
        });
    }

    /// Sequential reference path. Same arithmetic in a fixed order, so two
    /// runs from the same initial state are bit-identical.
    pub fn step_single_threaded(&mut self, dt: f32) {
        let bodies = &mut self.bodies;
        match self.model {
            GravityModel::Softened => {
                softened::accumulate_single_threaded(&bodies.pos, &bodies.mass, &mut bodies.acc);
            }
            GravityModel::Merging => {
                merging::accumulate_single_threaded(
                    &bodies.pos,
                    &mut bodies.vel,
                    &bodies.mass,
                    &bodies.radius,
                    &mut bodies.acc,
                );
            }
        }
        integrate_single_threaded(
            &mut bodies.pos,
            &mut bodies.vel,
            &mut bodies.acc,
            self.model.integration_scale(),
            dt,
        );
    }
}

/// Explicit Euler-like update: x += v dt + a dt^2 / 2, v += a dt. The
/// accumulator is cleared for the next pass.
pub fn integrate(
    pos: &mut [Point3<f32>],
    vel: &mut [Vector3<f32>],
    acc: &mut [Vector3<f32>],
    scale: f32,
    dt: f32,
) {
    pos.par_iter_mut()
        .zip(vel.par_iter_mut())
        .zip(acc.par_iter_mut())
        .for_each(|((p, v), a)| {
            let ka = *a * scale;
            *p += *v * dt + ka * (0.5 * dt * dt);
            *v += ka * dt;
            *a = Vector3::zero();
        });
}

pub fn integrate_single_threaded(
    pos: &mut [Point3<f32>],
    vel: &mut [Vector3<f32>],
    acc: &mut [Vector3<f32>],
    scale: f32,
    dt: f32,
) {
    for ((p, v), a) in pos.iter_mut().zip(vel.iter_mut()).zip(acc.iter_mut()) {
        let ka = *a * scale;
        *p += *v * dt + ka * (0.5 * dt * dt);
        *v += ka * dt;
        *a = Vector3::zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_target_scales_with_body_count() {
        assert_eq!(compute_target_threads(1), 1);
        assert_eq!(compute_target_threads(BODIES_PER_THREAD), 1);
        assert_eq!(compute_target_threads(BODIES_PER_THREAD + 1), 2);
        assert_eq!(compute_target_threads(BODIES_PER_THREAD * 100), MAX_THREADS);
        // Degenerate empty set still gets a pool.
        assert_eq!(compute_target_threads(0), 1);
    }

    #[test]
    fn model_is_recorded() {
        let sim = Simulation::new(BodySet::zeroed(4), GravityModel::Merging);
        assert_eq!(sim.model(), GravityModel::Merging);
        let sim = Simulation::new(BodySet::zeroed(4), GravityModel::Softened);
        assert_eq!(sim.model(), GravityModel::Softened);
    }
}
