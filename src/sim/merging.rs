use cgmath::{InnerSpace, Point3, Vector3, Zero};
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::constants::G;

/// Pairwise accumulation over `j > i` with perfectly inelastic collision
/// merging. Overlapping bodies contribute no force for the step; instead both
/// take on the velocity of their combined momentum, which is a fixed point as
/// long as they stay in contact. Zero-mass bodies are inert.
///
/// Rows write to both `acc[i]` and `acc[j]`, so the parallel path folds into
/// per-worker scratch buffers and merges them afterwards. Velocity merges are
/// collected during the scan and applied in a single ordered pass, which
/// keeps them race-free and deterministic given the pair order.
pub fn accumulate(
    pos: &[Point3<f32>],
    vel: &mut [Vector3<f32>],
    mass: &[f32],
    radius: &[f32],
    acc: &mut [Vector3<f32>],
) {
    let n = pos.len();
    let (forces, mut merges) = (0..n)
        .into_par_iter()
        .fold(
            || (vec![Vector3::zero(); n], Vec::new()),
            |(mut out, mut merges), i| {
                accumulate_row(pos, mass, radius, i, &mut out, &mut merges);
                (out, merges)
            },
        )
        .reduce(
            || (vec![Vector3::zero(); n], Vec::new()),
            |(mut out_a, mut merges_a), (out_b, merges_b)| {
                for (a, b) in out_a.iter_mut().zip(out_b) {
                    *a += b;
                }
                merges_a.extend(merges_b);
                (out_a, merges_a)
            },
        );

    for (a, f) in acc.iter_mut().zip(forces) {
        *a += f;
    }
    merges.sort_unstable();
    apply_merges(vel, mass, &merges);
}

pub fn accumulate_single_threaded(
    pos: &[Point3<f32>],
    vel: &mut [Vector3<f32>],
    mass: &[f32],
    radius: &[f32],
    acc: &mut [Vector3<f32>],
) {
    let mut merges = Vec::new();
    for i in 0..pos.len() {
        accumulate_row(pos, mass, radius, i, acc, &mut merges);
    }
    apply_merges(vel, mass, &merges);
}

#[inline]
fn accumulate_row(
    pos: &[Point3<f32>],
    mass: &[f32],
    radius: &[f32],
    i: usize,
    out: &mut [Vector3<f32>],
    merges: &mut Vec<(usize, usize)>,
) {
    if mass[i] == 0.0 {
        return;
    }
    let pi = pos[i];
    for j in (i + 1)..pos.len() {
        if mass[j] == 0.0 {
            continue;
        }
        let d = pos[j] - pi;
        let mag_sq = d.magnitude2();
        let mag = mag_sq.sqrt();
        let contact_radius = 0.5 * (radius[i] + radius[j]);
        if mag < contact_radius {
            merges.push((i, j));
            continue;
        }
        let f = G * mass[i] * mass[j] / mag_sq;
        let dir = d / mag;
        out[i] += dir * (f / mass[i]);
        out[j] -= dir * (f / mass[j]);
    }
}

fn apply_merges(vel: &mut [Vector3<f32>], mass: &[f32], merges: &[(usize, usize)]) {
    for &(i, j) in merges {
        let group = (vel[i] * mass[i] + vel[j] * mass[j]) / (mass[i] + mass[j]);
        vel[i] = group;
        vel[j] = group;
    }
}
