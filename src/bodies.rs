use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;

use cgmath::{Point3, Vector3, Zero};
use rand::Rng;

use crate::constants::{
    ATTRACTOR_MASS, CLUSTER_JITTER, CLUSTER_MASS_SCALE, CLUSTER_OFFSET, CLUSTER_SPEED,
};

/// Per-body state, stored as parallel arrays rather than an array of structs
/// so the hot loops walk contiguous memory.
///
/// All arrays have the same length for the lifetime of the set, and index `i`
/// refers to the same body in every array. Mass, radius and color are fixed
/// after construction; `acc` is a scratch accumulator that every integration
/// step resets to zero.
pub struct BodySet {
    pub pos: Vec<Point3<f32>>,
    pub vel: Vec<Vector3<f32>>,
    pub acc: Vec<Vector3<f32>>,
    pub color: Vec<Vector3<f32>>,
    pub mass: Vec<f32>,
    pub radius: Vec<f32>,
}

impl BodySet {
    pub fn zeroed(count: usize) -> Self {
        Self {
            pos: vec![Point3::new(0.0, 0.0, 0.0); count],
            vel: vec![Vector3::zero(); count],
            acc: vec![Vector3::zero(); count],
            color: vec![Vector3::zero(); count],
            mass: vec![0.0; count],
            radius: vec![0.0; count],
        }
    }

    /// Two clusters of `count / 2` bodies each, offset along x and moving in
    /// opposite directions along y, plus a heavy white attractor at the
    /// origin as the last body.
    pub fn two_clusters(count: usize) -> Self {
        Self::two_clusters_with(count, &mut rand::rng())
    }

    pub fn two_clusters_with<R: Rng>(count: usize, rng: &mut R) -> Self {
        let mut set = Self::zeroed(count);
        if count == 0 {
            return set;
        }

        for i in 0..count - 1 {
            let jitter = Vector3::new(
                rng.random_range(-CLUSTER_JITTER..CLUSTER_JITTER),
                rng.random_range(-CLUSTER_JITTER..CLUSTER_JITTER),
                rng.random_range(-CLUSTER_JITTER..CLUSTER_JITTER),
            );
            if i < count / 2 {
                set.pos[i] = Point3::new(jitter.x - CLUSTER_OFFSET, jitter.y, jitter.z);
                set.vel[i] = Vector3::new(0.0, CLUSTER_SPEED, 0.0);
                set.color[i] = Vector3::new(0.0, 1.0, 0.0);
            } else {
                set.pos[i] = Point3::new(jitter.x + CLUSTER_OFFSET, jitter.y, jitter.z);
                set.vel[i] = Vector3::new(0.0, -CLUSTER_SPEED, 0.0);
                set.color[i] = Vector3::new(1.0, 0.0, 1.0);
            }
            let mass = rng.random_range(0.0..CLUSTER_JITTER) * CLUSTER_MASS_SCALE;
            set.mass[i] = mass;
            set.radius[i] = mass.powf(1.0 / 3.0) * 6.9e-6;
        }

        set.pos[count - 1] = Point3::new(0.0, 0.0, 0.0);
        set.mass[count - 1] = ATTRACTOR_MASS;
        set.color[count - 1] = Vector3::new(1.0, 1.0, 1.0);
        set.radius[count - 1] = 1e14f32.powf(1.0 / 3.0) * 2.9e-6;
        set
    }

    pub fn len(&self) -> usize {
        self.pos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }

    /// Positions padded to 16-byte stride, as the GPU buffers expect.
    pub fn packed_positions(&self) -> Vec<[f32; 4]> {
        self.pos.iter().map(|p| [p.x, p.y, p.z, 0.0]).collect()
    }

    pub fn packed_velocities(&self) -> Vec<[f32; 4]> {
        self.vel.iter().map(|v| [v.x, v.y, v.z, 0.0]).collect()
    }

    pub fn body(&self, index: usize) -> BodyRef<'_> {
        BodyRef { set: self, index }
    }

    /// Dump positions to `path`, one `x,y,z` line per body in index order.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        write_positions(&mut out, self.pos.iter().map(|p| [p.x, p.y, p.z]))?;
        out.flush()
    }
}

/// Debug view of one body's (position, velocity, acceleration) triple.
pub struct BodyRef<'a> {
    set: &'a BodySet,
    index: usize,
}

impl Display for BodyRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (p, v, a) = (
            self.set.pos[self.index],
            self.set.vel[self.index],
            self.set.acc[self.index],
        );
        write!(
            f,
            "({}, {}, {}), ({}, {}, {}), ({}, {}, {})",
            p.x, p.y, p.z, v.x, v.y, v.z, a.x, a.y, a.z
        )
    }
}

/// Flat position export: one `x,y,z` line per body, no header.
pub fn write_positions<W: Write>(
    out: &mut W,
    positions: impl Iterator<Item = [f32; 3]>,
) -> io::Result<()> {
    for [x, y, z] in positions {
        writeln!(out, "{},{},{}", x, y, z)?;
    }
    Ok(())
}

/// Inverse of [`write_positions`], for inspecting dumps in tests and tools.
pub fn read_positions<R: BufRead>(input: R) -> io::Result<Vec<[f32; 3]>> {
    let mut out = Vec::new();
    for line in input.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(',').map(str::parse::<f32>);
        let mut next = || {
            fields
                .next()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "expected x,y,z"))?
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        };
        out.push([next()?, next()?, next()?]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn two_clusters_shape() {
        let set = BodySet::two_clusters_with(64, &mut StdRng::seed_from_u64(1));
        assert_eq!(set.len(), 64);
        assert_eq!(set.vel.len(), 64);
        assert_eq!(set.mass.len(), 64);
        assert_eq!(set.radius.len(), 64);

        // Last body is the central attractor.
        assert_eq!(set.mass[63], ATTRACTOR_MASS);
        assert_eq!(set.pos[63], Point3::new(0.0, 0.0, 0.0));

        for i in 0..63 {
            assert!(set.mass[i] >= 0.0);
            assert!(set.acc[i] == Vector3::zero());
            let expected = if i < 32 { CLUSTER_SPEED } else { -CLUSTER_SPEED };
            assert_eq!(set.vel[i].y, expected);
        }
    }

    #[test]
    fn single_body_is_just_the_attractor() {
        let set = BodySet::two_clusters_with(1, &mut StdRng::seed_from_u64(1));
        assert_eq!(set.len(), 1);
        assert_eq!(set.mass[0], ATTRACTOR_MASS);
        assert_eq!(set.vel[0], Vector3::zero());
    }

    #[test]
    fn position_export_round_trip() {
        let set = BodySet::two_clusters_with(16, &mut StdRng::seed_from_u64(7));
        let mut buf = Vec::new();
        write_positions(&mut buf, set.pos.iter().map(|p| [p.x, p.y, p.z])).unwrap();

        let read = read_positions(buf.as_slice()).unwrap();
        assert_eq!(read.len(), 16);
        for (parsed, p) in read.iter().zip(&set.pos) {
            // Display for f32 prints the shortest round-trippable form.
            assert_eq!(*parsed, [p.x, p.y, p.z]);
        }
    }

    #[test]
    fn body_display_lists_state_triples() {
        let mut set = BodySet::zeroed(2);
        set.pos[1] = Point3::new(1.0, 2.0, 3.0);
        set.vel[1] = Vector3::new(4.0, 5.0, 6.0);
        assert_eq!(set.body(1).to_string(), "(1, 2, 3), (4, 5, 6), (0, 0, 0)");
        assert_eq!(set.body(0).to_string(), "(0, 0, 0), (0, 0, 0), (0, 0, 0)");
    }

    #[test]
    fn malformed_position_line_is_rejected() {
        assert!(read_positions("1.0,2.0".as_bytes()).is_err());
        assert!(read_positions("1.0,two,3.0".as_bytes()).is_err());
    }
}
