use criterion::{black_box, criterion_group, criterion_main, Criterion};

use hrds::{BufferBuilder, Grid, Hrds, Interpolator, Layer};

/// A grid with a gentle gradient so the interpolator never takes the flat
/// shortcut.
fn gradient(origin: (f64, f64), cell: f64, n: usize, offset: f64) -> Grid {
    let values: Vec<f64> = (0..n * n)
        .map(|i| offset + (i / n) as f64 * 0.01 + (i % n) as f64 * 0.02)
        .collect();
    Grid::new(origin, (cell, cell), n, n, values, None).unwrap()
}

/// Base over (0, 0)-(1000, 1000) with two nested overlays.
fn create_stack() -> Hrds {
    let base = gradient((0.0, 0.0), 10.0, 100, -50.0);
    let layer1 = gradient((200.0, 200.0), 2.0, 300, -40.0);
    let layer2 = gradient((300.0, 300.0), 0.5, 400, -30.0);

    let make_layer = |name: &str, grid: Grid, distance: f64| {
        let buffer = BufferBuilder::new(distance).generate(&grid).unwrap();
        Layer::new(name, Interpolator::new(grid), Interpolator::new(buffer))
    };

    Hrds::new(
        Interpolator::new(base),
        vec![
            make_layer("layer1", layer1, 50.0),
            make_layer("layer2", layer2, 20.0),
        ],
    )
}

fn bench_single_interpolator(c: &mut Criterion) {
    let interp = Interpolator::new(gradient((0.0, 0.0), 10.0, 100, 0.0));

    c.bench_function("interpolator_get_value", |b| {
        b.iter(|| {
            black_box(
                interp
                    .get_value(black_box(512.3), black_box(488.7))
                    .unwrap(),
            );
        });
    });
}

fn bench_stack_blend(c: &mut Criterion) {
    let hrds = create_stack();

    // Inside layer2's buffer zone: two layers are evaluated and blended.
    c.bench_function("hrds_get_value_blend", |b| {
        b.iter(|| {
            black_box(hrds.get_value(black_box(305.0), black_box(400.0)).unwrap());
        });
    });

    // Outside every overlay: scans the stack, then falls through to the base.
    c.bench_function("hrds_get_value_base", |b| {
        b.iter(|| {
            black_box(hrds.get_value(black_box(900.0), black_box(900.0)).unwrap());
        });
    });
}

fn bench_batch(c: &mut Criterion) {
    let hrds = create_stack();
    let points: Vec<(f64, f64)> = (0..1000)
        .map(|i| {
            let frac = i as f64 / 1000.0;
            (150.0 + frac * 400.0, 150.0 + frac * 400.0)
        })
        .collect();

    c.bench_function("hrds_batch_1000", |b| {
        b.iter(|| {
            black_box(hrds.get_values(black_box(&points), f64::NAN));
        });
    });
}

fn bench_buffer_generation(c: &mut Criterion) {
    let grid = gradient((0.0, 0.0), 1.0, 500, 0.0);

    c.bench_function("buffer_500x500", |b| {
        b.iter(|| {
            black_box(BufferBuilder::new(25.0).generate(black_box(&grid)).unwrap());
        });
    });
}

criterion_group!(
    benches,
    bench_single_interpolator,
    bench_stack_blend,
    bench_batch,
    bench_buffer_generation,
);
criterion_main!(benches);
