use dspu::sidechain::{DetectMode, Sidechain, StereoSource};

#[test]
fn rms_envelope_tracks_a_step_in_level() {
    let sr = 48000.0f32;
    let mut sc = Sidechain::new(sr, 50.0);
    sc.set_source(StereoSource::Middle, false);
    sc.set_mode(DetectMode::Rms);
    sc.set_reactivity(10.0);

    let n = 4096;
    let quiet = vec![0.05f32; n];
    let loud = vec![0.9f32; n];
    let mut out = vec![0.0f32; n];

    sc.process(&mut out, &quiet, &quiet, n).unwrap();
    let settled_quiet = out[n - 1];

    sc.process(&mut out, &loud, &loud, n).unwrap();
    let settled_loud = out[n - 1];

    assert!(settled_loud > settled_quiet);
    assert!(out.iter().all(|x| x.is_finite() && *x >= 0.0));
}
