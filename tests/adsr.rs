use dspu::adsr::{Adsr, AdsrSettings};

#[test]
fn envelope_buffer_matches_pointwise_evaluation() {
    let mut env = Adsr::new();
    env.update_settings(AdsrSettings {
        attack_time: 0.1,
        hold_time: 0.0,
        decay_time: 0.2,
        slope_time: 0.0,
        release_time: 0.3,
        sustain_level: 0.6,
        ..Default::default()
    });

    let n = 64;
    let dt = 0.01;
    let mut generated = vec![0.0f32; n];
    env.generate(&mut generated, 0.0, dt, n).unwrap();

    for (i, &g) in generated.iter().enumerate() {
        let t = i as f32 * dt;
        assert!((g - env.process(t)).abs() < 1e-6);
    }

    let times: Vec<f32> = (0..n).map(|i| i as f32 * dt).collect();
    let mut evaluated = vec![0.0f32; n];
    env.process_buf(&mut evaluated, &times, n).unwrap();
    assert!(evaluated.iter().zip(generated.iter()).all(|(&e, &g)| (e - g).abs() < 1e-6));
}
