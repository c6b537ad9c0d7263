// PHYSICAL
/// Newtonian gravitational constant, in m^3 kg^-1 s^-2.
pub const G: f32 = 6.67408e-11;
/// Softening term added to the squared separation. Keeps the force law
/// finite when two bodies pass arbitrarily close to each other.
pub const EPSILON: f32 = 1e-6;

// SIMULATION
/// Hard cap on number of simulation threads.
pub const MAX_THREADS: usize = 20;
/// Minimum number of bodies per thread.
pub const BODIES_PER_THREAD: usize = 256;
/// Workgroup size of the compute kernels, must match physics.wgsl.
pub const WORKGROUP_SIZE: u32 = 64;

// INITIAL CONDITIONS (two-cluster preset)
/// Uniform jitter range around each cluster center.
pub const CLUSTER_JITTER: f32 = 0.2;
/// Distance of each cluster center from the origin, along x.
pub const CLUSTER_OFFSET: f32 = 1.3;
/// Initial speed of the cluster bodies along y. Good looping.
pub const CLUSTER_SPEED: f32 = 110.0;
/// Scale of the random body masses.
pub const CLUSTER_MASS_SCALE: f32 = 9.5e8;
/// Mass of the central attractor.
pub const ATTRACTOR_MASS: f32 = 5e14;
