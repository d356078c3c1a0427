use criterion::{Criterion, black_box, criterion_group, criterion_main};
use strata_terrain::*;

fn generated_grid(options: &GenerationOptions) -> HeightGrid {
    let mut grid = HeightGrid::new(GridGeometry::new(4, 4, 32, 32, 100.0)).unwrap();
    let noise = NoiseField::new(options, grid.geometry());
    for ys in 0..4 {
        for xs in 0..4 {
            grid.generate_section(&noise, xs, ys);
        }
    }
    grid
}

fn bench_grid_erosion(c: &mut Criterion) {
    let mut options = GenerationOptions::default();
    options.grid.iterations = 4;
    let base = generated_grid(&options);

    for execution in [ExecutionPath::Scalar, ExecutionPath::Vectorized] {
        options.execution = execution;
        let engine = ErosionEngine::from_options(&options);
        c.bench_function(&format!("grid_erosion_{execution:?}"), |bencher| {
            bencher.iter(|| {
                let mut grid = base.clone();
                black_box(engine.run(&mut grid))
            })
        });
    }
}

fn bench_particle_erosion(c: &mut Criterion) {
    let mut options = GenerationOptions {
        method: ErosionMethod::Particle,
        ..Default::default()
    };
    options.particle.iterations = 2_000;
    let base = generated_grid(&options);

    for execution in [ExecutionPath::Scalar, ExecutionPath::Vectorized] {
        options.execution = execution;
        let engine = ErosionEngine::from_options(&options);
        c.bench_function(&format!("particle_erosion_{execution:?}"), |bencher| {
            bencher.iter(|| {
                let mut grid = base.clone();
                black_box(engine.run(&mut grid))
            })
        });
    }
}

fn bench_filters(c: &mut Criterion) {
    let base = generated_grid(&GenerationOptions::default());
    let thermal = ThermalFilter::new(&ThermalSettings::default(), 100.0);
    c.bench_function("thermal_weathering", |bencher| {
        bencher.iter(|| {
            let mut grid = base.clone();
            thermal.apply(black_box(&mut grid));
        })
    });
    c.bench_function("smooth_size_2", |bencher| {
        bencher.iter(|| {
            let mut grid = base.clone();
            SmoothFilter::default().apply(black_box(&mut grid));
        })
    });
}

criterion_group!(
    benches,
    bench_grid_erosion,
    bench_particle_erosion,
    bench_filters
);
criterion_main!(benches);
