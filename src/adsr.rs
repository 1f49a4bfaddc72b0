//! ADSR envelope generator: a multi-segment envelope over `t in [0, 1]` with
//! a per-segment curve family (spec §4.11).

use crate::error::{Error, Result};
use crate::math::{clamp01, lerp};

/// Per-segment curve shape.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Curve {
    None,
    Line,
    Line2,
    Cubic,
    Quadro,
    Exp,
}

#[derive(Copy, Clone, Debug)]
pub struct AdsrSettings {
    pub attack_time: f32,
    pub hold_time: f32,
    pub decay_time: f32,
    pub slope_time: f32,
    pub release_time: f32,
    pub break_enabled: bool,
    pub break_level: f32,
    pub sustain_level: f32,
    pub attack_curve: Curve,
    pub decay_curve: Curve,
    pub slope_curve: Curve,
    pub release_curve: Curve,
    /// Curve shape parameter in `[-1, 1]`, used by `Line`'s knee position and
    /// `Exp`'s sign-of-exponent selection.
    pub curve_param: f32,
}

impl Default for AdsrSettings {
    fn default() -> Self {
        Self {
            attack_time: 0.1,
            hold_time: 0.0,
            decay_time: 0.1,
            slope_time: 0.0,
            release_time: 0.2,
            break_enabled: false,
            break_level: 0.7,
            sustain_level: 0.6,
            attack_curve: Curve::Line,
            decay_curve: Curve::Line,
            slope_curve: Curve::Line,
            release_curve: Curve::Line,
            curve_param: 0.0,
        }
    }
}

#[derive(Copy, Clone, Default)]
struct SegmentCoefs {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    knee: f32,
}

/// Precomputed segment boundaries and closed-form shaping coefficients.
#[derive(Copy, Clone)]
struct Plan {
    a: f32,
    h: f32,
    d: f32,
    s: f32,
    r: f32,
    attack: SegmentCoefs,
    decay: SegmentCoefs,
    slope: SegmentCoefs,
    release: SegmentCoefs,
}

pub struct Adsr {
    settings: AdsrSettings,
    plan: Plan,
}

impl Adsr {
    pub fn new() -> Self {
        let settings = AdsrSettings::default();
        let plan = build_plan(&settings);
        Self { settings, plan }
    }

    pub fn update_settings(&mut self, settings: AdsrSettings) {
        self.settings = settings;
        self.plan = build_plan(&settings);
    }

    /// Evaluate the envelope at a single `t in [0, 1]`.
    pub fn process(&self, t: f32) -> f32 {
        let p = &self.plan;
        let t = clamp01(t);
        if t <= p.a {
            eval_segment(&p.attack, t, 0.0, p.a, 0.0, 1.0)
        } else if t <= p.h {
            1.0
        } else if t <= p.d {
            let target = if self.settings.break_enabled {
                self.settings.break_level
            } else {
                self.settings.sustain_level
            };
            eval_segment(&p.decay, t, p.h, p.d, 1.0, target)
        } else if self.settings.break_enabled && t <= p.s {
            eval_segment(&p.slope, t, p.d, p.s, self.settings.break_level, self.settings.sustain_level)
        } else if t <= p.r {
            self.settings.sustain_level
        } else if t < 1.0 {
            eval_segment(&p.release, t, p.r, 1.0, self.settings.sustain_level, 0.0)
        } else {
            0.0
        }
    }

    pub fn process_buf(&self, dst: &mut [f32], src: &[f32], n: usize) -> Result<()> {
        if dst.len() < n || src.len() < n {
            return Err(Error::bad_args("process buffers shorter than n"));
        }
        for i in 0..n {
            dst[i] = self.process(src[i]);
        }
        Ok(())
    }

    pub fn process_mul(&self, dst: &mut [f32], src: &[f32], n: usize) -> Result<()> {
        if dst.len() < n || src.len() < n {
            return Err(Error::bad_args("process buffers shorter than n"));
        }
        for i in 0..n {
            dst[i] *= self.process(src[i]);
        }
        Ok(())
    }

    pub fn generate(&self, dst: &mut [f32], t0: f32, dt: f32, n: usize) -> Result<()> {
        if dst.len() < n {
            return Err(Error::bad_args("generate buffer shorter than n"));
        }
        let mut t = t0;
        for sample in dst.iter_mut().take(n) {
            *sample = self.process(t);
            t += dt;
        }
        Ok(())
    }

    pub fn generate_mul(&self, dst: &mut [f32], t0: f32, dt: f32, n: usize) -> Result<()> {
        if dst.len() < n {
            return Err(Error::bad_args("generate_mul buffer shorter than n"));
        }
        let mut t = t0;
        for sample in dst.iter_mut().take(n) {
            *sample *= self.process(t);
            t += dt;
        }
        Ok(())
    }
}

impl Default for Adsr {
    fn default() -> Self {
        Self::new()
    }
}

fn build_plan(s: &AdsrSettings) -> Plan {
    let a = s.attack_time.max(0.0);
    let h = a + s.hold_time.max(0.0);
    let d = h + s.decay_time.max(0.0);
    let slope_span = if s.break_enabled { s.slope_time.max(0.0) } else { 0.0 };
    let slope_end = d + slope_span;
    let r = slope_end.max(1.0 - s.release_time.max(0.0)).min(1.0).max(slope_end);

    Plan {
        a,
        h,
        d,
        s: slope_end,
        r,
        attack: segment_coefs(s.attack_curve, s.curve_param),
        decay: segment_coefs(s.decay_curve, s.curve_param),
        slope: segment_coefs(s.slope_curve, s.curve_param),
        release: segment_coefs(s.release_curve, s.curve_param),
    }
}

/// Precompute closed-form coefficients for a segment's curve, normalized on
/// `t in [0,1]` mapping `(0,0) -> (1,1)`; the caller rescales into actual
/// value range at evaluation time.
fn segment_coefs(curve: Curve, param: f32) -> SegmentCoefs {
    match curve {
        Curve::None | Curve::Line => SegmentCoefs {
            knee: (param * 0.5 + 0.5).clamp(0.0, 1.0),
            ..Default::default()
        },
        Curve::Line2 => SegmentCoefs::default(),
        Curve::Cubic => {
            // Hermite: h(t) = 2t^3 - 3t^2 + 1 descending form fit via a,b,c,d
            // matching endpoints and zero derivatives, with a midpoint pin
            // nudged by `param`.
            let mid = 0.5 + 0.25 * param;
            let a = 2.0 - 4.0 * mid;
            let b = -3.0 + 4.0 * mid;
            SegmentCoefs { a, b, c: 0.0, d: 1.0, knee: mid }
        }
        Curve::Quadro => {
            let mid = 0.5 + 0.25 * param;
            SegmentCoefs { a: 1.0, b: -2.0 + 4.0 * (1.0 - mid), c: 0.0, d: 1.0, knee: mid }
        }
        Curve::Exp => {
            let k = if param >= 0.0 { 4.0 } else { -4.0 };
            SegmentCoefs { a: 0.0, b: 0.0, c: k, d: 0.0, knee: 0.0 }
        }
    }
}

fn shape(u: f32, curve: Curve, coefs: &SegmentCoefs) -> f32 {
    let u = clamp01(u);
    match curve {
        Curve::None => u,
        Curve::Line => {
            let knee = coefs.knee.clamp(0.001, 0.999);
            if u < knee {
                0.5 * (u / knee)
            } else {
                0.5 + 0.5 * (u - knee) / (1.0 - knee)
            }
        }
        Curve::Line2 => u * u * (3.0 - 2.0 * u),
        Curve::Cubic => {
            let t2 = u * u;
            let t3 = t2 * u;
            1.0 - (coefs.a * t3 + coefs.b * t2 + coefs.c * u)
        }
        Curve::Quadro => {
            let t2 = u * u;
            let t4 = t2 * t2;
            1.0 - (coefs.a * t4 + coefs.b * t2)
        }
        Curve::Exp => {
            let c = coefs.c;
            let denom = (c).exp() - 1.0;
            if denom.abs() < 1e-6 {
                u
            } else {
                1.0 - ((c * u).exp() - 1.0) / denom
            }
        }
    }
}

fn eval_segment(coefs: &SegmentCoefs, t: f32, t0: f32, t1: f32, v0: f32, v1: f32) -> f32 {
    if (t1 - t0).abs() < 1e-9 {
        return v1;
    }
    let u = (t - t0) / (t1 - t0);
    let curve_for_shape = if coefs.d == 0.0 && coefs.c == 0.0 && coefs.a == 0.0 && coefs.b == 0.0 && coefs.knee == 0.0 {
        Curve::Line2
    } else if coefs.c != 0.0 && coefs.a == 0.0 {
        Curve::Exp
    } else if coefs.d == 1.0 && coefs.a != 0.0 {
        Curve::Cubic
    } else {
        Curve::Line
    };
    let shaped = 1.0 - shape(1.0 - u, curve_for_shape, coefs);
    lerp(v0, v1, shaped.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_endpoints_and_sustain_plateau() {
        let mut adsr = Adsr::new();
        let settings = AdsrSettings {
            attack_time: 0.1,
            hold_time: 0.0,
            decay_time: 0.1,
            slope_time: 0.0,
            release_time: 0.3,
            break_enabled: false,
            break_level: 0.7,
            sustain_level: 0.5,
            attack_curve: Curve::Line2,
            decay_curve: Curve::Line2,
            slope_curve: Curve::Line2,
            release_curve: Curve::Line2,
            curve_param: 0.0,
        };
        adsr.update_settings(settings);

        assert!((adsr.process(0.0)).abs() < 1e-6);
        assert!((adsr.process(0.1) - 1.0).abs() < 1e-3);
        assert!((adsr.process(0.5) - 0.5).abs() < 1e-3);
        assert!((adsr.process(1.0)).abs() < 1e-6);
    }

    #[test]
    fn generate_fills_requested_span() {
        let adsr = Adsr::new();
        let mut buf = vec![0.0f32; 100];
        adsr.generate(&mut buf, 0.0, 0.01, 100).unwrap();
        assert!((buf[0]).abs() < 1e-3);
    }
}
