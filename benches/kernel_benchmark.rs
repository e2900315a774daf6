use autosvm::{
    CrossValidationConfig, Kernel, KernelFunction, KernelType, ParamGrid, ParamId, SampleLayout,
    Svm, SvmParams, TrainData, TrainFlags,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};

fn create_classification_data(n_rows: usize, n_features: usize) -> TrainData {
    let samples = Array2::from_shape_fn((n_rows, n_features), |(i, j)| {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        sign + ((i * 31 + j * 17) % 97) as f64 / 97.0 - 0.5
    });
    let responses = Array1::from_shape_fn(n_rows, |i| (i % 2) as f64);
    TrainData::new(samples, SampleLayout::Row, responses).unwrap()
}

fn bench_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel");
    let x = Array1::from_shape_fn(128, |i| (i as f64 * 0.37).sin().abs());
    let y = Array1::from_shape_fn(128, |i| (i as f64 * 0.11).cos().abs());

    for kernel_type in [
        KernelType::Linear,
        KernelType::Poly,
        KernelType::Rbf,
        KernelType::Sigmoid,
        KernelType::Chi2,
        KernelType::Inter,
    ] {
        let params = SvmParams {
            kernel_type,
            gamma: 0.1,
            degree: 3.0,
            coef0: 1.0,
            ..SvmParams::default()
        };
        let kernel = KernelFunction::from_params(&params);
        group.bench_function(BenchmarkId::new("compute", kernel_type), |b| {
            b.iter(|| kernel.compute(black_box(x.view()), black_box(y.view())))
        });
    }

    group.finish();
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    for n_rows in [100, 400, 1000] {
        let data = create_classification_data(n_rows, 10);
        group.bench_with_input(BenchmarkId::new("train_rbf", n_rows), &data, |b, data| {
            b.iter(|| {
                let mut svm = Svm::new();
                svm.set_gamma(0.1);
                svm.train(black_box(data), TrainFlags::NONE).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_train_auto(c: &mut Criterion) {
    let mut group = c.benchmark_group("train_auto");
    group.sample_size(10);

    let data = create_classification_data(200, 10);
    let config = CrossValidationConfig::new()
        .with_k_fold(5)
        .with_grid(ParamId::C, ParamGrid::new(0.1, 100.0, 10.0))
        .with_grid(ParamId::Gamma, ParamGrid::new(0.01, 1.0, 10.0));

    group.bench_function("grid_4x3_k5", |b| {
        b.iter(|| {
            let mut svm = Svm::new();
            svm.train_auto(black_box(&data), &config).unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_kernels, bench_training, bench_train_auto);
criterion_main!(benches);
