//! Simulation benchmarks for nemo_core.
//!
//! Run with: `cargo bench -p nemo_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nemo_core::components::Team;
use nemo_core::math::Vec2;
use nemo_core::simulation::Simulation;
use nemo_core::unit::UnitSpec;

fn skirmish(per_side: u32) -> Simulation {
    let mut sim = Simulation::new();
    for i in 0..per_side {
        let y = f64::from(i) * 40.0;
        for (team, x) in [(Team::Red, 0.0), (Team::Blue, 500.0)] {
            let spec = UnitSpec::from_tags(team, Vec2::new(x, y), &["move", "attack", "attack"])
                .expect("static tags parse");
            sim.spawn_unit(&spec).expect("spawn succeeds");
        }
    }
    sim
}

/// Ticks a symmetric skirmish at several sizes.
pub fn simulation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    for per_side in [8, 32, 128] {
        group.bench_with_input(BenchmarkId::from_parameter(per_side), &per_side, |b, &n| {
            let mut sim = skirmish(n);
            b.iter(|| black_box(sim.tick()));
        });
    }
    group.finish();
}

/// Measures the cost of hashing a mid-sized world.
pub fn state_hash_benchmark(c: &mut Criterion) {
    let sim = skirmish(64);
    c.bench_function("state_hash", |b| b.iter(|| black_box(sim.state_hash())));
}

criterion_group!(benches, simulation_benchmark, state_hash_benchmark);
criterion_main!(benches);
