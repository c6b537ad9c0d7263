use criterion::{Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use gravity::bodies::BodySet;
use gravity::sim::{GravityModel, Simulation};

const DT: f32 = 0.00005;

fn bench_step(c: &mut Criterion) {
    for count in [256, 1024, 4096] {
        let mut group = c.benchmark_group(format!("step_{count}"));
        group.sample_size(20);

        let bodies = BodySet::two_clusters_with(count, &mut StdRng::seed_from_u64(123));
        let mut sim = Simulation::new(bodies, GravityModel::Softened);
        group.bench_function("softened", |b| b.iter(|| sim.step(DT)));

        let bodies = BodySet::two_clusters_with(count, &mut StdRng::seed_from_u64(123));
        let mut sim = Simulation::new(bodies, GravityModel::Merging);
        group.bench_function("merging", |b| b.iter(|| sim.step(DT)));

        group.finish();
    }
}

fn bench_single_threaded(c: &mut Criterion) {
    let bodies = BodySet::two_clusters_with(1024, &mut StdRng::seed_from_u64(123));
    let mut sim = Simulation::new(bodies, GravityModel::Softened);
    c.bench_function("softened_single_threaded_1024", |b| {
        b.iter(|| sim.step_single_threaded(DT))
    });
}

criterion_group!(benches, bench_step, bench_single_threaded);
criterion_main!(benches);
