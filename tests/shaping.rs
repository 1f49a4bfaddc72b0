use dspu::shaping::{Bilinear, Shaper, ShapeFunction};

#[test]
fn shaper_swaps_function_without_reallocating() {
    let mut shaper = Shaper::new(ShapeFunction::Bilinear(Bilinear::new(2.0).unwrap()));

    let src: Vec<f32> = (-16..=16).map(|i| i as f32 / 16.0).collect();
    let mut dst = vec![0.0f32; src.len()];
    shaper.process(&mut dst, &src, src.len()).unwrap();
    assert!(dst.iter().all(|&x| x.is_finite() && x.abs() <= 1.0 + 1e-3));

    shaper.set_function(ShapeFunction::Bilinear(Bilinear::new(0.2).unwrap()));
    shaper.reset();
    shaper.process(&mut dst, &src, src.len()).unwrap();
    assert!(dst.iter().all(|&x| x.is_finite() && x.abs() <= 1.0 + 1e-3));
}
