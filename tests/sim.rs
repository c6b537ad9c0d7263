use std::sync::Arc;
use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use cgmath::{InnerSpace, Point3, Vector3, Zero};
use rand::SeedableRng;
use rand::rngs::StdRng;

use gravity::bodies::BodySet;
use gravity::constants::{EPSILON, G};
use gravity::exchange::Exchange;
use gravity::sim::{
    GravityModel, Simulation, accumulate_merging, accumulate_softened, host,
    integrate_single_threaded,
};

const DT: f32 = 0.00005;

fn seeded_clusters(count: usize, seed: u64) -> BodySet {
    BodySet::two_clusters_with(count, &mut StdRng::seed_from_u64(seed))
}

fn total_momentum(bodies: &BodySet) -> Vector3<f32> {
    bodies
        .mass
        .iter()
        .zip(&bodies.vel)
        .fold(Vector3::zero(), |acc, (m, v)| acc + v * *m)
}

#[test]
fn softened_steps_conserve_momentum() {
    let bodies = seeded_clusters(128, 42);
    let before = total_momentum(&bodies);
    let magnitude_scale: f32 = bodies
        .mass
        .iter()
        .zip(&bodies.vel)
        .map(|(m, v)| m * v.magnitude())
        .sum();

    let mut sim = Simulation::new(bodies, GravityModel::Softened);
    for _ in 0..10 {
        sim.step_single_threaded(DT);
    }

    let drift = (total_momentum(&sim.bodies) - before).magnitude();
    assert!(
        drift <= magnitude_scale * 1e-3,
        "momentum drifted by {drift} against a scale of {magnitude_scale}"
    );
}

#[test]
fn single_threaded_runs_are_bit_identical() {
    let mut a = Simulation::new(seeded_clusters(96, 9), GravityModel::Softened);
    let mut b = Simulation::new(seeded_clusters(96, 9), GravityModel::Softened);
    for _ in 0..5 {
        a.step_single_threaded(DT);
        b.step_single_threaded(DT);
    }
    assert_eq!(a.bodies.pos, b.bodies.pos);
    assert_eq!(a.bodies.vel, b.bodies.vel);
}

#[test]
fn softened_parallel_matches_sequential_exactly() {
    // Rows are accumulated independently in both paths, in the same inner
    // order, so threading changes nothing about the arithmetic.
    let mut parallel = Simulation::new(seeded_clusters(96, 11), GravityModel::Softened);
    let mut sequential = Simulation::new(seeded_clusters(96, 11), GravityModel::Softened);
    for _ in 0..3 {
        parallel.step(DT);
        sequential.step_single_threaded(DT);
    }
    assert_eq!(parallel.bodies.pos, sequential.bodies.pos);
    assert_eq!(parallel.bodies.vel, sequential.bodies.vel);
}

#[test]
fn merging_parallel_matches_sequential_within_tolerance() {
    // The parallel path sums per-worker scratch buffers in reduction order,
    // so results agree with the sequential pass only up to rounding.
    let mut parallel = Simulation::new(seeded_clusters(96, 13), GravityModel::Merging);
    let mut sequential = Simulation::new(seeded_clusters(96, 13), GravityModel::Merging);
    for _ in 0..3 {
        parallel.step(DT);
        sequential.step_single_threaded(DT);
    }
    for (p, s) in parallel.bodies.pos.iter().zip(&sequential.bodies.pos) {
        assert_relative_eq!(p.x, s.x, max_relative = 1e-4, epsilon = 1e-6);
        assert_relative_eq!(p.y, s.y, max_relative = 1e-4, epsilon = 1e-6);
        assert_relative_eq!(p.z, s.z, max_relative = 1e-4, epsilon = 1e-6);
    }
}

#[test]
fn single_body_feels_no_force() {
    // The lone attractor sits at the origin; softening keeps its own
    // self-term finite, and it contributes nothing.
    let mut sim = Simulation::new(seeded_clusters(1, 3), GravityModel::Softened);
    for _ in 0..10 {
        sim.step_single_threaded(DT);
    }
    assert_eq!(sim.bodies.pos[0], Point3::new(0.0, 0.0, 0.0));
    assert_eq!(sim.bodies.vel[0], Vector3::zero());
    assert_eq!(sim.bodies.acc[0], Vector3::zero());
}

#[test]
fn overlapping_bodies_merge_inelastically() {
    let mut set = BodySet::zeroed(2);
    set.pos[1] = Point3::new(1e-3, 0.0, 0.0);
    set.radius = vec![0.01, 0.01];
    set.mass = vec![2.0, 1.0];
    set.vel[0] = Vector3::new(3.0, 0.0, 0.0);

    accumulate_merging(
        &set.pos,
        &mut set.vel,
        &set.mass,
        &set.radius,
        &mut set.acc,
    );

    // Combined momentum 6.0 over combined mass 3.0.
    let merged = Vector3::new(2.0, 0.0, 0.0);
    assert_eq!(set.vel[0], merged);
    assert_eq!(set.vel[1], merged);
    assert_eq!(set.acc[0], Vector3::zero());
    assert_eq!(set.acc[1], Vector3::zero());

    // Still in contact, so a second pass is a fixed point.
    accumulate_merging(
        &set.pos,
        &mut set.vel,
        &set.mass,
        &set.radius,
        &mut set.acc,
    );
    assert_eq!(set.vel[0], merged);
    assert_eq!(set.vel[1], merged);
}

#[test]
fn two_body_attraction_is_symmetric() {
    let mut set = BodySet::zeroed(2);
    set.pos[0] = Point3::new(-1.3, 0.0, 0.0);
    set.pos[1] = Point3::new(1.3, 0.0, 0.0);
    set.mass = vec![1e10, 1e10];
    set.vel[0] = Vector3::new(0.0, 110.0, 0.0);
    set.vel[1] = Vector3::new(0.0, -110.0, 0.0);

    accumulate_softened(&set.pos, &set.mass, &mut set.acc);

    let mag_sq = 2.6f32 * 2.6 + EPSILON;
    let expected = 2.6 * 1e10 / (mag_sq * mag_sq * mag_sq).sqrt();
    assert_relative_eq!(set.acc[0].x, expected, max_relative = 1e-5);
    assert_eq!(set.acc[0].y, 0.0);
    assert_eq!(set.acc[0].z, 0.0);
    // The rows see mirrored separations and identical magnitudes.
    assert_eq!(set.acc[1], -set.acc[0]);

    integrate_single_threaded(&mut set.pos, &mut set.vel, &mut set.acc, G, DT);

    // The velocity term dominates the step by many orders of magnitude.
    assert_relative_eq!(set.pos[0].y, 110.0 * DT, max_relative = 1e-5);
    assert_relative_eq!(set.pos[1].y, -110.0 * DT, max_relative = 1e-5);
    assert!(set.pos[0].x > -1.3);
    assert!(set.pos[1].x < 1.3);
    assert_eq!(set.acc[0], Vector3::zero());
}

#[test]
fn host_backend_publishes_and_stops() {
    let bodies = seeded_clusters(32, 21);
    let initial = bodies.pos.clone();
    let exchange = Arc::new(Exchange::new(bodies.len()));
    let sim = Simulation::new(bodies, GravityModel::Softened);

    let handle = host::start(sim, DT, exchange.clone());

    let mut out = vec![[0.0f32; 4]; 32];
    let deadline = Instant::now() + Duration::from_secs(5);
    while !exchange.take(&mut out) {
        assert!(Instant::now() < deadline, "no step was published in time");
        std::thread::yield_now();
    }

    let sim = handle.stop();
    assert_ne!(sim.bodies.pos, initial);
    // The last snapshot the render side saw was a complete step.
    assert!(out.iter().any(|p| p[1] != 0.0));
}
