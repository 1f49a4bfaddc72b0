use dspu::limiter::{Limiter, Settings};

#[test]
fn loud_transient_is_pulled_under_threshold() {
    let sr = 48000.0f32;
    let mut lim = Limiter::init(sr, 10.0, sr);
    let threshold = 0.8;
    lim.set_threshold(threshold, true);

    let n = 256;
    let mut sidechain = vec![0.0f32; n];
    sidechain[50] = 4.0;
    let mut gain = vec![0.0f32; n];
    lim.process(&mut gain, &sidechain, n).unwrap();

    let worst = sidechain
        .iter()
        .zip(gain.iter())
        .map(|(&s, &g)| s.abs() * g)
        .fold(0.0f32, f32::max);
    assert!(worst <= threshold + 1e-2, "worst = {worst}");
}

#[test]
fn silence_leaves_the_limiter_at_unity() {
    let sr = 44100.0f32;
    let mut lim = Limiter::init(sr, 5.0, sr);
    let n = 128;
    let sidechain = vec![0.0f32; n];
    let mut gain = vec![0.0f32; n];
    lim.process(&mut gain, &sidechain, n).unwrap();
    assert!(gain.iter().all(|&g| (g - 1.0).abs() < 1e-3));
}

#[test]
fn default_settings_are_sane() {
    let s = Settings::default();
    assert!(s.threshold > 0.0);
    assert!(s.attack_samples > 0.0);
}
