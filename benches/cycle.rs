//! Criterion benchmarks for the mona cycle.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use mona::{Mona, MonaConfig};

fn sensor_pattern(step: usize, sensors: usize) -> Vec<f32> {
    (0..sensors).map(|i| ((step + i) % 3 == 0) as u8 as f32).collect()
}

// A network that has already learned for `warmup` cycles.
fn make_mona(sensors: usize, max_mediators: usize, warmup: usize) -> Mona {
    let mut mona = Mona::new(
        MonaConfig::new(sensors, 3, 1)
            .with_seed(42)
            .with_max_mediators(max_mediators),
    )
    .expect("valid bench config");
    mona.set_need(0, 1.0).expect("need 0 exists");
    mona.add_goal(0, &vec![1.0; sensors], 0, Some(2), 1.0)
        .expect("valid goal");
    for step in 0..warmup {
        mona.cycle(&sensor_pattern(step, sensors)).expect("sensor count matches");
    }
    mona
}

/// Benchmark cycle() as the mediator population grows.
fn bench_cycle_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_mediators");

    for max in [25usize, 100, 400].iter() {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("max_mediators", max), max, |b, &max| {
            let mut mona = make_mona(4, max, 500);
            let mut step = 0;
            b.iter(|| {
                step += 1;
                black_box(mona.cycle(&sensor_pattern(step, 4)).expect("cycle"))
            });
        });
    }

    group.finish();
}

/// Benchmark image save size and time on a trained network.
fn bench_image(c: &mut Criterion) {
    let mona = make_mona(4, 200, 500);
    c.bench_function("save_image_200", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            mona.save_image_to(&mut out).expect("in-memory write");
            black_box(out.len())
        });
    });
}

criterion_group!(benches, bench_cycle_sizes, bench_image);
criterion_main!(benches);
