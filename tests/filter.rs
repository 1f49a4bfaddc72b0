use dspu::filter::{Filter, FilterParams, FilterTransform, FilterType, Prototype, Shape};

#[test]
fn lowpass_attenuates_high_frequencies() {
    let _ = env_logger::builder().is_test(true).try_init();
    let sr = 48000.0f32;
    let mut f = Filter::new();
    let mut params = FilterParams::new(FilterType::new(Prototype::Butterworth, Shape::Lopass, FilterTransform::Bilinear));
    params.f1 = 500.0;
    params.f2 = 500.0;
    params.slope = 2;
    params.quality = std::f32::consts::FRAC_1_SQRT_2;
    f.update(sr, params);

    let n = 4096;
    let low_hz = 100.0;
    let high_hz = 12000.0;
    let low: Vec<f32> = (0..n).map(|i| (std::f32::consts::TAU * low_hz * i as f32 / sr).sin()).collect();
    let high: Vec<f32> = (0..n).map(|i| (std::f32::consts::TAU * high_hz * i as f32 / sr).sin()).collect();

    let mut out_low = vec![0.0f32; n];
    let mut out_high = vec![0.0f32; n];
    f.process(&mut out_low, &low, n).unwrap();

    let mut f2 = Filter::new();
    f2.update(sr, params);
    f2.process(&mut out_high, &high, n).unwrap();

    let rms = |buf: &[f32]| (buf.iter().map(|x| x * x).sum::<f32>() / buf.len() as f32).sqrt();
    let tail = n / 2;
    assert!(rms(&out_low[tail..]) > rms(&out_high[tail..]));
}

#[test]
fn filter_bank_clears_on_empty_rebuild() {
    use dspu::filter::FilterBank;
    let mut bank = FilterBank::new();
    bank.begin();
    bank.end(true);
    let src = vec![1.0f32; 16];
    let mut dst = vec![1.0f32; 16];
    bank.process(&mut dst, &src, 16);
    assert!(dst.iter().all(|&x| x == 0.0));
}
