use cgmath::{InnerSpace, Point3, Vector3};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefMutIterator, ParallelIterator};

use crate::constants::EPSILON;

/// Softened all-pairs accumulation. Every ordered pair is evaluated,
/// including `i == j`: with the separation padded by `EPSILON` the self term
/// is exactly zero, so there is no need to branch on it in the inner loop.
///
/// The accumulator holds `sum(d * m_j / r^3)`; the integrator multiplies by
/// `G` once per body instead of once per pair. Rows only write their own
/// accumulator, so the outer loop parallelizes without contention.
pub fn accumulate(pos: &[Point3<f32>], mass: &[f32], acc: &mut [Vector3<f32>]) {
    acc.par_iter_mut().enumerate().for_each(|(i, out)| {
        accumulate_row(pos, mass, i, out);
    });
}

pub fn accumulate_single_threaded(pos: &[Point3<f32>], mass: &[f32], acc: &mut [Vector3<f32>]) {
    for (i, out) in acc.iter_mut().enumerate() {
        accumulate_row(pos, mass, i, out);
    }
}

#[inline]
fn accumulate_row(pos: &[Point3<f32>], mass: &[f32], i: usize, out: &mut Vector3<f32>) {
    let pi = pos[i];
    for (pj, mj) in pos.iter().zip(mass) {
        let d = pj - pi;
        let mag_sq = d.magnitude2() + EPSILON;
        let inv_cube = 1.0 / (mag_sq * mag_sq * mag_sq).sqrt();
        *out += d * (mj * inv_cube);
    }
}
