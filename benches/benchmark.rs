use criterion::{black_box, criterion_group, criterion_main, Criterion};

use dspu::filter::{Filter, FilterParams, FilterTransform, FilterType, Prototype, Shape};
use dspu::limiter::Limiter;
use dspu::oversampler::{Factor, Oversampler, Precision};

fn filter_bench(c: &mut Criterion) {
    let sr = 48000.0f32;
    let mut filter = Filter::new();
    let mut params = FilterParams::new(FilterType::new(Prototype::Butterworth, Shape::Lopass, FilterTransform::Bilinear));
    params.f1 = 1000.0;
    params.f2 = 1000.0;
    params.slope = 4;
    filter.update(sr, params);

    let n = 1024;
    let src: Vec<f32> = (0..n).map(|i| (i as f32 * 0.01).sin()).collect();
    let mut dst = vec![0.0f32; n];

    c.bench_function("filter_process_1024", |b| {
        b.iter(|| filter.process(black_box(&mut dst), black_box(&src), n).unwrap())
    });
}

fn limiter_bench(c: &mut Criterion) {
    let sr = 48000.0f32;
    let mut lim = Limiter::init(sr, 10.0, sr);
    let n = 1024;
    let sidechain: Vec<f32> = (0..n).map(|i| (i as f32 * 0.1).sin() * 1.5).collect();
    let mut gain = vec![0.0f32; n];

    c.bench_function("limiter_process_1024", |b| {
        b.iter(|| lim.process(black_box(&mut gain), black_box(&sidechain), n).unwrap())
    });
}

fn oversampler_bench(c: &mut Criterion) {
    let sr = 48000.0f32;
    let mut over = Oversampler::new(sr);
    over.set_factor(Factor::X4);
    over.set_precision(Precision::Periods4);
    let n = 512;
    let src: Vec<f32> = (0..n).map(|i| (i as f32 * 0.05).sin()).collect();
    let mut dst = vec![0.0f32; n];

    c.bench_function("oversampler_process_512", |b| {
        b.iter(|| {
            over.process(black_box(&mut dst), black_box(&src), n, |out, inp, m| {
                out[..m].copy_from_slice(&inp[..m]);
            })
            .unwrap()
        })
    });
}

criterion_group!(benches, filter_bench, limiter_bench, oversampler_bench);
criterion_main!(benches);
