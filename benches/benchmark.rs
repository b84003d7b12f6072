// This file contains benchmarks for the purpose of guarding against
// performance regressions. To run them, use `cargo bench`.

use criterion::{criterion_group, criterion_main, Criterion};

use lucent::render::{CpuRenderer, RenderMode};
use lucent::scene::Scene;

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Performance regression tests");
    group.sample_size(10);

    group.bench_function("Scene + BVH setup", |b| {
        b.iter(|| CpuRenderer::new(&Scene::cornell(), 64, 64))
    });

    let scene = Scene::cornell();
    group.bench_function("Monte Carlo frame (CPU, 64x64)", |b| {
        let mut renderer = CpuRenderer::new(&scene, 64, 64);
        let mut frame = 0;
        b.iter(|| {
            frame += 1;
            renderer.render_frame_cpu(RenderMode::MonteCarlo, frame, 0.0, 1);
        })
    });

    group.bench_function("Deterministic frame (CPU, 64x64)", |b| {
        let mut renderer = CpuRenderer::new(&scene, 64, 64);
        b.iter(|| renderer.render_frame_cpu(RenderMode::Deterministic, 1, 0.0, 1))
    });

    group.bench_function("Surface attributes (CPU, 64x64)", |b| {
        let mut renderer = CpuRenderer::new(&scene, 64, 64);
        b.iter(|| renderer.render_surface_attributes(1, 0.0))
    });

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
