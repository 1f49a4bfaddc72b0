//! Parameterized saturating waveshaping functions, plus a stateful TAP
//! Tubewarmth model. Grounded in `misc/shaping.h`'s function catalog: each
//! accepts any real input and returns a value in `[-1, 1]`.

use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug)]
pub struct Sinusoidal {
    pub slope: f32,
    radius: f32,
}

impl Sinusoidal {
    pub fn new(slope: f32) -> Result<Self> {
        if !(slope > 0.0 && slope < std::f32::consts::FRAC_PI_2) {
            return Err(Error::InvalidValue("sinusoidal slope out of (0, pi/2)".into()));
        }
        Ok(Self { slope, radius: std::f32::consts::FRAC_PI_2 / slope })
    }
}

fn sinusoidal(p: &Sinusoidal, x: f32) -> f32 {
    if x.abs() >= p.radius {
        x.signum()
    } else {
        (p.slope * x).sin()
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Polynomial {
    pub shape: f32,
    radius: f32,
}

impl Polynomial {
    pub fn new(shape: f32) -> Result<Self> {
        if !(shape > 0.0 && shape <= 1.0) {
            return Err(Error::InvalidValue("polynomial shape out of (0, 1]".into()));
        }
        Ok(Self { shape, radius: 1.0 - shape })
    }
}

fn polynomial(p: &Polynomial, x: f32) -> f32 {
    let r = if p.radius < 1e-9 { 1e-9 } else { p.radius };
    if x.abs() >= r {
        x.signum()
    } else {
        let u = x / r;
        x.signum() * r * (p.shape * u.abs() + (1.0 - p.shape) * u * u)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Hyperbolic {
    pub shape: f32,
    hyperbolic_shape: f32,
}

impl Hyperbolic {
    pub fn new(shape: f32) -> Result<Self> {
        if !(shape > 0.0) {
            return Err(Error::InvalidValue("hyperbolic shape must be positive".into()));
        }
        Ok(Self { shape, hyperbolic_shape: shape.tanh() })
    }
}

fn hyperbolic(p: &Hyperbolic, x: f32) -> f32 {
    (p.shape * x).tanh() / p.hyperbolic_shape.max(1e-9)
}

#[derive(Copy, Clone, Debug)]
pub struct Exponential {
    pub shape: f32,
    log_shape: f32,
    scale: f32,
}

impl Exponential {
    pub fn new(shape: f32) -> Result<Self> {
        if !(shape > 1.0) {
            return Err(Error::InvalidValue("exponential shape must exceed 1".into()));
        }
        Ok(Self { shape, log_shape: shape.ln(), scale: shape / (shape - 1.0) })
    }
}

fn exponential(p: &Exponential, x: f32) -> f32 {
    let ax = x.abs().min(1.0);
    x.signum() * p.scale * (1.0 - (-p.log_shape * ax).exp())
}

#[derive(Copy, Clone, Debug)]
pub struct Power {
    pub shape: f32,
}

impl Power {
    pub fn new(shape: f32) -> Result<Self> {
        if !(shape >= 1.0) {
            return Err(Error::InvalidValue("power shape must be >= 1".into()));
        }
        Ok(Self { shape })
    }
}

fn power(p: &Power, x: f32) -> f32 {
    x.signum() * x.abs().min(1.0).powf(p.shape)
}

#[derive(Copy, Clone, Debug)]
pub struct Bilinear {
    pub shape: f32,
}

impl Bilinear {
    pub fn new(shape: f32) -> Result<Self> {
        if !(shape >= 0.0) {
            return Err(Error::InvalidValue("bilinear shape must be non-negative".into()));
        }
        Ok(Self { shape })
    }
}

fn bilinear(p: &Bilinear, x: f32) -> f32 {
    x / (1.0 + p.shape * x.abs())
}

#[derive(Copy, Clone, Debug)]
pub struct AsymmetricClip {
    pub high_clip: f32,
    pub low_clip: f32,
}

impl AsymmetricClip {
    pub fn new(high_clip: f32, low_clip: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&high_clip) || !(0.0..=1.0).contains(&low_clip) {
            return Err(Error::InvalidValue("asymmetric clip limits out of [0, 1]".into()));
        }
        Ok(Self { high_clip, low_clip })
    }
}

fn asymmetric_clip(p: &AsymmetricClip, x: f32) -> f32 {
    if x >= 0.0 {
        x.min(p.high_clip)
    } else {
        x.max(-p.low_clip)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct AsymmetricSoftclip {
    pub high_limit: f32,
    pub low_limit: f32,
    pos_scale: f32,
    neg_scale: f32,
}

impl AsymmetricSoftclip {
    pub fn new(high_limit: f32, low_limit: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&high_limit) || !(0.0..1.0).contains(&low_limit) {
            return Err(Error::InvalidValue("asymmetric softclip limits out of [0, 1)".into()));
        }
        Ok(Self {
            high_limit,
            low_limit,
            pos_scale: 1.0 / (1.0 - high_limit),
            neg_scale: 1.0 / (1.0 - low_limit),
        })
    }
}

fn asymmetric_softclip(p: &AsymmetricSoftclip, x: f32) -> f32 {
    if x >= 0.0 {
        if x <= p.high_limit {
            x
        } else {
            p.high_limit + (1.0 - p.high_limit) * (1.0 - (-(x - p.high_limit) * p.pos_scale).exp())
        }
    } else if x >= -p.low_limit {
        x
    } else {
        -p.low_limit - (1.0 - p.low_limit) * (1.0 - ((x + p.low_limit) * p.neg_scale).exp())
    }
}

#[derive(Copy, Clone, Debug)]
pub struct QuarterCircle {
    pub radius: f32,
    radius2: f32,
}

impl QuarterCircle {
    pub fn new(radius: f32) -> Result<Self> {
        if !(radius > 0.0) {
            return Err(Error::InvalidValue("quarter circle radius must be positive".into()));
        }
        Ok(Self { radius, radius2: 2.0 * radius })
    }
}

fn quarter_circle(p: &QuarterCircle, x: f32) -> f32 {
    let ax = x.abs().min(p.radius2);
    let u = ax / p.radius - 1.0;
    x.signum() * (1.0 - (1.0 - u * u).max(0.0).sqrt())
}

#[derive(Copy, Clone, Debug)]
pub struct Rectifier {
    pub shape: f32,
}

impl Rectifier {
    pub fn new(shape: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&shape) {
            return Err(Error::InvalidValue("rectifier shape out of [0, 1]".into()));
        }
        Ok(Self { shape })
    }
}

fn rectifier(p: &Rectifier, x: f32) -> f32 {
    let clamped = x.clamp(-1.0, 1.0);
    (1.0 - p.shape) * clamped + p.shape * clamped.abs()
}

#[derive(Copy, Clone, Debug)]
pub struct Bitcrush {
    pub levels: f32,
}

impl Bitcrush {
    pub fn new(levels: f32) -> Result<Self> {
        if !(levels >= 1.0) {
            return Err(Error::InvalidValue("bitcrush levels must be >= 1".into()));
        }
        Ok(Self { levels })
    }
}

fn bitcrush_floor(p: &Bitcrush, x: f32) -> f32 {
    let clamped = x.clamp(-1.0, 1.0);
    ((clamped * p.levels).floor() / p.levels).clamp(-1.0, 1.0)
}

fn bitcrush_ceil(p: &Bitcrush, x: f32) -> f32 {
    let clamped = x.clamp(-1.0, 1.0);
    ((clamped * p.levels).ceil() / p.levels).clamp(-1.0, 1.0)
}

fn bitcrush_round(p: &Bitcrush, x: f32) -> f32 {
    let clamped = x.clamp(-1.0, 1.0);
    ((clamped * p.levels).round() / p.levels).clamp(-1.0, 1.0)
}

const TAP_EPS: f32 = 1e-9;

fn tap_gate(x: f32) -> f32 {
    if x < -TAP_EPS || x > TAP_EPS {
        x
    } else {
        0.0
    }
}

fn tap_rect_sqrt(x: f32) -> f32 {
    if x > TAP_EPS {
        x.sqrt()
    } else if x < -TAP_EPS {
        (-x).sqrt()
    } else {
        0.0
    }
}

/// TAP Tubewarmth stateful model: fits separate power-law curves to the
/// positive and negative halves of the signal, blended against a
/// square-root "warmth" term, with a one-sample smoothing memory.
#[derive(Copy, Clone, Debug)]
pub struct TapTubewarmth {
    pub drive: f32,
    pub blend: f32,

    pwrq: f32,
    srct: f32,
    ap: f32,
    kpa: f32,
    kpb: f32,
    an: f32,
    kna: f32,
    knb: f32,

    last_raw_output: f32,
    last_raw_intermediate: f32,
}

impl TapTubewarmth {
    pub fn new(drive: f32, blend: f32) -> Result<Self> {
        if !(-10.0..10.0).contains(&drive) {
            return Err(Error::InvalidValue("tubewarmth drive out of (-10, 10)".into()));
        }
        if !(0.1..10.0).contains(&blend) {
            return Err(Error::InvalidValue("tubewarmth blend out of (0.1, 10)".into()));
        }
        let mut me = Self {
            drive,
            blend,
            pwrq: 0.0,
            srct: 0.0,
            ap: 0.0,
            kpa: 0.0,
            kpb: 0.0,
            an: 0.0,
            kna: 0.0,
            knb: 0.0,
            last_raw_output: 0.0,
            last_raw_intermediate: 0.0,
        };
        me.recompute();
        Ok(me)
    }

    fn recompute(&mut self) {
        self.pwrq = (self.blend / 10.0).clamp(0.0, 1.0);
        self.srct = tap_rect_sqrt(self.drive / 10.0);

        self.ap = 1.0 + self.drive.max(0.0) / 5.0;
        self.kpa = 0.5 * self.pwrq;
        self.kpb = 1.0 - self.kpa;

        self.an = 1.0 + (-self.drive).max(0.0) / 5.0;
        self.kna = 0.5 * self.pwrq;
        self.knb = 1.0 - self.kna;
    }

    pub fn set_drive(&mut self, drive: f32) -> Result<()> {
        if !(-10.0..10.0).contains(&drive) {
            return Err(Error::InvalidValue("tubewarmth drive out of (-10, 10)".into()));
        }
        self.drive = drive;
        self.recompute();
        Ok(())
    }

    pub fn set_blend(&mut self, blend: f32) -> Result<()> {
        if !(0.1..10.0).contains(&blend) {
            return Err(Error::InvalidValue("tubewarmth blend out of (0.1, 10)".into()));
        }
        self.blend = blend;
        self.recompute();
        Ok(())
    }

    pub fn reset(&mut self) {
        self.last_raw_output = 0.0;
        self.last_raw_intermediate = 0.0;
    }
}

fn tap_tubewarmth(p: &mut TapTubewarmth, x: f32) -> f32 {
    let gated = tap_gate(x);
    let shaped = if gated >= 0.0 {
        p.kpa * gated.abs().powf(p.ap) * gated.signum() + p.kpb * gated
    } else {
        p.kna * gated.abs().powf(p.an) * gated.signum() + p.knb * gated
    };
    let warmed = shaped + p.srct * tap_rect_sqrt(gated) * 0.1;
    let smoothed = 0.5 * (warmed + p.last_raw_intermediate);
    p.last_raw_intermediate = warmed;
    p.last_raw_output = smoothed;
    smoothed.clamp(-1.0, 1.0)
}

/// Tagged shaping function together with its live parameters, mirroring the
/// original `Shaper` class's single-active-function design.
pub enum ShapeFunction {
    Sinusoidal(Sinusoidal),
    Polynomial(Polynomial),
    Hyperbolic(Hyperbolic),
    Exponential(Exponential),
    Power(Power),
    Bilinear(Bilinear),
    AsymmetricClip(AsymmetricClip),
    AsymmetricSoftclip(AsymmetricSoftclip),
    QuarterCircle(QuarterCircle),
    Rectifier(Rectifier),
    BitcrushFloor(Bitcrush),
    BitcrushCeil(Bitcrush),
    BitcrushRound(Bitcrush),
    TapTubewarmth(TapTubewarmth),
}

pub struct Shaper {
    function: ShapeFunction,
}

impl Shaper {
    pub fn new(function: ShapeFunction) -> Self {
        Self { function }
    }

    pub fn set_function(&mut self, function: ShapeFunction) {
        self.function = function;
    }

    pub fn process_scalar(&mut self, x: f32) -> f32 {
        match &mut self.function {
            ShapeFunction::Sinusoidal(p) => sinusoidal(p, x),
            ShapeFunction::Polynomial(p) => polynomial(p, x),
            ShapeFunction::Hyperbolic(p) => hyperbolic(p, x),
            ShapeFunction::Exponential(p) => exponential(p, x),
            ShapeFunction::Power(p) => power(p, x),
            ShapeFunction::Bilinear(p) => bilinear(p, x),
            ShapeFunction::AsymmetricClip(p) => asymmetric_clip(p, x),
            ShapeFunction::AsymmetricSoftclip(p) => asymmetric_softclip(p, x),
            ShapeFunction::QuarterCircle(p) => quarter_circle(p, x),
            ShapeFunction::Rectifier(p) => rectifier(p, x),
            ShapeFunction::BitcrushFloor(p) => bitcrush_floor(p, x),
            ShapeFunction::BitcrushCeil(p) => bitcrush_ceil(p, x),
            ShapeFunction::BitcrushRound(p) => bitcrush_round(p, x),
            ShapeFunction::TapTubewarmth(p) => tap_tubewarmth(p, x),
        }
    }

    pub fn process(&mut self, dst: &mut [f32], src: &[f32], n: usize) -> Result<()> {
        if dst.len() < n || src.len() < n {
            return Err(Error::bad_args("process buffers shorter than n"));
        }
        for i in 0..n {
            dst[i] = self.process_scalar(src[i]);
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        if let ShapeFunction::TapTubewarmth(p) = &mut self.function {
            p.reset();
        }
    }

    pub fn dump(&self, v: &mut dyn crate::dump::StateDumper) {
        v.begin_object("shaper");
        let name = match &self.function {
            ShapeFunction::Sinusoidal(_) => "sinusoidal",
            ShapeFunction::Polynomial(_) => "polynomial",
            ShapeFunction::Hyperbolic(_) => "hyperbolic",
            ShapeFunction::Exponential(_) => "exponential",
            ShapeFunction::Power(_) => "power",
            ShapeFunction::Bilinear(_) => "bilinear",
            ShapeFunction::AsymmetricClip(_) => "asymmetric_clip",
            ShapeFunction::AsymmetricSoftclip(_) => "asymmetric_softclip",
            ShapeFunction::QuarterCircle(_) => "quarter_circle",
            ShapeFunction::Rectifier(_) => "rectifier",
            ShapeFunction::BitcrushFloor(_) => "bitcrush_floor",
            ShapeFunction::BitcrushCeil(_) => "bitcrush_ceil",
            ShapeFunction::BitcrushRound(_) => "bitcrush_round",
            ShapeFunction::TapTubewarmth(_) => "tap_tubewarmth",
        };
        v.write("function", name.to_string());
        v.end_object();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_functions_stay_in_unit_range() {
        let cases: Vec<ShapeFunction> = vec![
            ShapeFunction::Sinusoidal(Sinusoidal::new(1.0).unwrap()),
            ShapeFunction::Polynomial(Polynomial::new(0.5).unwrap()),
            ShapeFunction::Hyperbolic(Hyperbolic::new(2.0).unwrap()),
            ShapeFunction::Exponential(Exponential::new(2.0).unwrap()),
            ShapeFunction::Power(Power::new(2.0).unwrap()),
            ShapeFunction::Bilinear(Bilinear::new(1.0).unwrap()),
            ShapeFunction::QuarterCircle(QuarterCircle::new(1.0).unwrap()),
            ShapeFunction::Rectifier(Rectifier::new(0.5).unwrap()),
            ShapeFunction::BitcrushFloor(Bitcrush::new(8.0).unwrap()),
        ];
        for f in cases {
            let mut shaper = Shaper::new(f);
            for x in [-3.0f32, -1.0, -0.1, 0.0, 0.1, 1.0, 3.0] {
                let y = shaper.process_scalar(x);
                assert!((-1.0..=1.0).contains(&y), "out of range: {y} for input {x}");
            }
        }
    }

    #[test]
    fn bilinear_is_odd_symmetric() {
        let mut shaper = Shaper::new(ShapeFunction::Bilinear(Bilinear::new(2.0).unwrap()));
        let pos = shaper.process_scalar(0.6);
        let neg = shaper.process_scalar(-0.6);
        assert!((pos + neg).abs() < 1e-6);
    }

    #[test]
    fn tubewarmth_identity_near_zero_drive() {
        let mut shaper = Shaper::new(ShapeFunction::TapTubewarmth(TapTubewarmth::new(0.0, 0.1).unwrap()));
        let mut buf = vec![0.0f32; 32];
        let src = vec![0.05f32; 32];
        shaper.process(&mut buf, &src, 32).unwrap();
        assert!(buf.iter().all(|&x| x.abs() <= 1.0));
    }
}
