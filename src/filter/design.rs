//! Analog prototype design and discretization (spec §4.1 "Design algorithm").
//!
//! Two phases, matching the cookbook the spec describes:
//! 1. `analog_cascades` emits one or more [`AnalogCascade`]s in the "s"
//!    domain for the RLC/BWC/LRX prototype families (APO and the weighting
//!    curves are computed directly in the discrete domain instead).
//! 2. `bilinear` / `matched_z` turn an analog cascade into a
//!    [`DiscreteCascade`] at a given sample rate.

use std::f32::consts::PI;

use num_complex::Complex32;

use super::cascade::{AnalogCascade, DiscreteCascade};
use super::params::{FilterParams, FilterTransform, Prototype, Shape, WeightingCurve};

/// Build the full discrete cascade chain for `params` at `sample_rate`,
/// dispatching on prototype family per spec §4.1.
pub fn design(params: &FilterParams, sample_rate: f32) -> Vec<DiscreteCascade> {
    let p = params.normalized(sample_rate);
    match p.filter_type.prototype {
        Prototype::Apo => vec![apo_biquad(&p, sample_rate)],
        Prototype::Weighting(curve) => weighting_cascades(curve, sample_rate),
        Prototype::Rlc => {
            let analog = rlc_cascades(&p);
            transform_all(&analog, &p, sample_rate)
        }
        Prototype::Butterworth => {
            let analog = bwc_cascades(&p);
            transform_all(&analog, &p, sample_rate)
        }
        Prototype::LinkwitzRiley => {
            // Emit the Butterworth cascade twice with halved gain and doubled
            // slope, per spec §4.1.
            let mut half = p;
            half.gain = p.gain.sqrt();
            half.slope = (p.slope * 2).min(crate::math::FILTER_CHAINS_MAX);
            let analog = bwc_cascades(&half);
            let mut chain = transform_all(&analog, &half, sample_rate);
            chain.extend(transform_all(&analog, &half, sample_rate));
            chain
        }
    }
}

fn transform_all(
    analog: &[AnalogCascade],
    p: &FilterParams,
    sample_rate: f32,
) -> Vec<DiscreteCascade> {
    analog
        .iter()
        .map(|a| match p.filter_type.transform {
            FilterTransform::Bilinear => bilinear(a, p.f1, sample_rate),
            FilterTransform::MatchedZ => matched_z(a, p.f1, sample_rate),
        })
        .collect()
}

/// RLC (single-pole, with an optional cascade of 2-pole sections whose count
/// equals `slope`) analog prototype.
fn rlc_cascades(p: &FilterParams) -> Vec<AnalogCascade> {
    let w0 = std::f32::consts::TAU * p.f1.max(1.0);
    let gain = p.gain;
    let slope = p.slope;
    match p.filter_type.shape {
        Shape::Lopass => (0..slope).map(|_| lopass_pole(w0, 0.5)).collect(),
        Shape::Hipass => (0..slope).map(|_| hipass_pole(w0, 0.5)).collect(),
        Shape::Loshelf => vec![shelf_section(w0, gain, 0.5, false)],
        Shape::Hishelf => vec![shelf_section(w0, gain, 0.5, true)],
        Shape::Bell => {
            let bw = std::f32::consts::TAU * (p.f2.max(1.0) - p.f1.max(0.0)).max(1.0);
            vec![bell_section(w0, bw, gain)]
        }
        Shape::Bandpass => {
            let bw = std::f32::consts::TAU * (p.f2.max(1.0) - p.f1.max(0.0)).max(1.0);
            vec![bandpass_section(w0, bw)]
        }
        Shape::Notch => {
            let bw = std::f32::consts::TAU * (p.f2.max(1.0) - p.f1.max(0.0)).max(1.0);
            vec![notch_section(w0, bw)]
        }
        Shape::Allpass | Shape::Allpass2 => vec![allpass_section(w0, 0.5)],
        Shape::Resonance => vec![resonance_section(w0, p.quality.max(0.01))],
        Shape::Envelope => vec![lopass_pole(w0, 0.5)],
        Shape::Ladderpass => (0..slope)
            .flat_map(|_| [shelf_section(w0, gain, 0.5, false), lopass_pole(w0, 0.5)])
            .collect(),
        Shape::Ladderrej => (0..slope)
            .flat_map(|_| [shelf_section(w0, gain, 0.5, true), hipass_pole(w0, 0.5)])
            .collect(),
    }
}

/// Butterworth prototype: cascades distributed on angles
/// `theta_j = ((2j+1) * pi / 2) / slope`, per spec §4.1.
fn bwc_cascades(p: &FilterParams) -> Vec<AnalogCascade> {
    let w0 = std::f32::consts::TAU * p.f1.max(1.0);
    let slope = p.slope.max(1);
    let mut out = Vec::with_capacity(slope);
    for j in 0..slope {
        let theta = ((2 * j + 1) as f32 * PI / 2.0) / slope as f32;
        let q = 1.0 / (2.0 * theta.cos()).abs().max(1e-6);
        out.push(match p.filter_type.shape {
            Shape::Hipass => hipass_pole(w0, q),
            _ => lopass_pole(w0, q),
        });
    }
    out
}

fn lopass_pole(w0: f32, q: f32) -> AnalogCascade {
    AnalogCascade::new(w0 * w0, 0.0, 0.0, w0 * w0, w0 / q, 1.0)
}

fn hipass_pole(w0: f32, q: f32) -> AnalogCascade {
    AnalogCascade::new(0.0, 0.0, 1.0, w0 * w0, w0 / q, 1.0)
}

fn bandpass_section(w0: f32, bw: f32) -> AnalogCascade {
    AnalogCascade::new(0.0, bw, 0.0, w0 * w0, bw, 1.0)
}

fn notch_section(w0: f32, bw: f32) -> AnalogCascade {
    AnalogCascade::new(w0 * w0, 0.0, 1.0, w0 * w0, bw, 1.0)
}

fn allpass_section(w0: f32, q: f32) -> AnalogCascade {
    let wq = w0 / q;
    AnalogCascade::new(w0 * w0, -wq, 1.0, w0 * w0, wq, 1.0)
}

fn resonance_section(w0: f32, q: f32) -> AnalogCascade {
    AnalogCascade::new(0.0, w0 / q, 0.0, w0 * w0, w0 / q, 1.0)
}

fn bell_section(w0: f32, bw: f32, gain: f32) -> AnalogCascade {
    AnalogCascade::new(w0 * w0, bw * gain, 1.0, w0 * w0, bw, 1.0)
}

fn shelf_section(w0: f32, gain: f32, q: f32, high: bool) -> AnalogCascade {
    let wq = w0 / q;
    if high {
        AnalogCascade::new(gain, wq, 1.0, 1.0, wq, 1.0)
    } else {
        AnalogCascade::new(w0 * w0 * gain, 0.0, 0.0, w0 * w0, 0.0, 1.0)
            .with_denominator_pole(w0, wq)
    }
}

impl AnalogCascade {
    fn with_denominator_pole(mut self, w0: f32, wq: f32) -> Self {
        self.b1 = wq;
        self.b2 = 1.0;
        let _ = w0;
        self
    }
}

/// Bilinear transform with prewarping (spec §4.1): `kf = 1 / tan(pi*f1/sr)`,
/// substituting `s = kf*(1-z^-1)/(1+z^-1)`.
pub fn bilinear(analog: &AnalogCascade, f1: f32, sample_rate: f32) -> DiscreteCascade {
    let kf = 1.0 / (PI * f1.max(1.0) / sample_rate).tan();
    let kf2 = kf * kf;
    let t0 = analog.t0;
    let t1 = analog.t1 * kf;
    let t2 = analog.t2 * kf2;
    let b0 = analog.b0;
    let b1 = analog.b1 * kf;
    let b2 = analog.b2 * kf2;

    let d0 = b0 + b1 + b2;
    let d0 = if d0.abs() < 1e-20 { 1e-20 } else { d0 };

    let out_b0 = (t0 + t1 + t2) / d0;
    let out_b1 = 2.0 * (t0 - t2) / d0;
    let out_b2 = (t0 - t1 + t2) / d0;
    let out_a1 = -2.0 * (b0 - b2) / d0;
    let out_a2 = -(b0 - b1 + b2) / d0;

    // Update form uses `a1`/`a2` with the sign already flipped (spec §3).
    DiscreteCascade {
        b0: out_b0,
        b1: out_b1,
        b2: out_b2,
        a1: -out_a1,
        a2: -out_a2,
    }
}

/// Matched-Z transform (spec §4.1): factor the analog denominator, place
/// `e^{pT}` poles in the digital plane, then post-normalize amplitude at the
/// control frequency `pi*f1/(5*sr)` against the analog response at `Om=0.1`.
pub fn matched_z(analog: &AnalogCascade, f1: f32, sample_rate: f32) -> DiscreteCascade {
    let t = 1.0 / sample_rate;
    let (a1, a2) = roots_to_digital(analog.b0, analog.b1, analog.b2, t);

    // Unnormalized numerator: reuse the same root-placement identity on the
    // numerator polynomial when it is itself second order; otherwise keep a
    // flat gain (matches `t0`-only numerators such as a single-pole lopass).
    let (n0, n1, n2) = if analog.t2.abs() > 1e-12 {
        let (na1, na2) = roots_to_digital(analog.t0.max(1e-12), analog.t1, analog.t2, t);
        (1.0, -na1, -na2)
    } else if analog.t1.abs() > 1e-12 {
        (analog.t0, analog.t1, 0.0)
    } else {
        (analog.t0, 0.0, 0.0)
    };

    let mut cascade = DiscreteCascade {
        b0: n0,
        b1: n1,
        b2: n2,
        a1,
        a2,
    };

    let control_omega = PI * f1.max(1.0) / (5.0 * sample_rate);
    let digital_amp = cascade.response(control_omega / std::f32::consts::TAU).norm();
    let analog_amp = analog.response(0.1).norm();
    if digital_amp > 1e-12 {
        let scale = analog_amp / digital_amp;
        cascade.b0 *= scale;
        cascade.b1 *= scale;
        cascade.b2 *= scale;
    }
    cascade
}

/// Given analog denominator `b0 + b1*s + b2*s^2`, return digital `(a1, a2)`
/// in the fused-multiply-add sign convention, handling both real-root and
/// complex-conjugate-pole cases from spec §4.1.
fn roots_to_digital(b0: f32, b1: f32, b2: f32, t: f32) -> (f32, f32) {
    if b2.abs() < 1e-12 {
        // Single real pole: b0 + b1*s = 0 => s = -b0/b1.
        let r0 = if b1.abs() > 1e-12 { -b0 / b1 } else { 0.0 };
        let z = (r0 * t).exp();
        return (z, 0.0);
    }
    let disc = b1 * b1 - 4.0 * b2 * b0;
    if disc >= 0.0 {
        let sqrt_disc = disc.sqrt();
        let r0 = (-b1 + sqrt_disc) / (2.0 * b2);
        let r1 = (-b1 - sqrt_disc) / (2.0 * b2);
        let z0 = (r0 * t).exp();
        let z1 = (r1 * t).exp();
        (z0 + z1, -(z0 * z1))
    } else {
        let re = -b1 / (2.0 * b2);
        let im = (-disc).sqrt() / (2.0 * b2);
        let a1 = 2.0 * (re * t).exp() * (im * t).cos();
        let a2 = -((2.0 * re * t).exp());
        (a1, a2)
    }
}

/// EQ-APO cookbook biquad, computed directly in the discrete domain.
pub fn apo_biquad(p: &FilterParams, sample_rate: f32) -> DiscreteCascade {
    let f0 = p.f1.max(1.0);
    let q = p.quality.max(0.01);
    // `gain` is a linear multiplier; the cookbook shelf/bell formulas want
    // `A = sqrt(gain)` (the usual `A = 10^(dBgain/40)` with `dBgain = 20*log10(gain)`).
    let a = p.gain.max(1e-6).sqrt();
    let w0 = std::f32::consts::TAU * f0 / sample_rate;
    let (sin_w0, cos_w0) = w0.sin_cos();
    let alpha = sin_w0 / (2.0 * q);

    let (b0, b1, b2, a0, a1, a2) = match p.filter_type.shape {
        Shape::Lopass => (
            (1.0 - cos_w0) / 2.0,
            1.0 - cos_w0,
            (1.0 - cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        ),
        Shape::Hipass => (
            (1.0 + cos_w0) / 2.0,
            -(1.0 + cos_w0),
            (1.0 + cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        ),
        Shape::Bandpass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
        Shape::Notch => (1.0, -2.0 * cos_w0, 1.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
        Shape::Allpass | Shape::Allpass2 => (
            1.0 - alpha,
            -2.0 * cos_w0,
            1.0 + alpha,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        ),
        Shape::Bell => (
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
        ),
        Shape::Loshelf => {
            let sq = (2.0 * a).sqrt() * alpha;
            (
                a * ((a + 1.0) - (a - 1.0) * cos_w0 + sq),
                2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                a * ((a + 1.0) - (a - 1.0) * cos_w0 - sq),
                (a + 1.0) + (a - 1.0) * cos_w0 + sq,
                -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                (a + 1.0) + (a - 1.0) * cos_w0 - sq,
            )
        }
        Shape::Hishelf => {
            let sq = (2.0 * a).sqrt() * alpha;
            (
                a * ((a + 1.0) + (a - 1.0) * cos_w0 + sq),
                -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                a * ((a + 1.0) + (a - 1.0) * cos_w0 - sq),
                (a + 1.0) - (a - 1.0) * cos_w0 + sq,
                2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                (a + 1.0) - (a - 1.0) * cos_w0 - sq,
            )
        }
        Shape::Resonance | Shape::Envelope | Shape::Ladderpass | Shape::Ladderrej => {
            (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
        }
    };

    DiscreteCascade {
        b0: b0 / a0,
        b1: b1 / a0,
        b2: b2 / a0,
        a1: -(a1 / a0),
        a2: -(a2 / a0),
    }
}

/// Fixed biquad sequence approximating the IEC 61672 / ITU-R BS.468
/// weighting curves, post-normalized to unity gain at 1 kHz (spec §4.1).
/// The exact pole/zero tables are an Open Question (DESIGN.md) since the
/// retrieval-capped `original_source` excerpt did not carry the raw
/// coefficients; these use the widely published analog prototypes.
fn weighting_cascades(curve: WeightingCurve, sample_rate: f32) -> Vec<DiscreteCascade> {
    // Analog A-weighting poles (Hz), per IEC 61672-1 Annex E.
    const F1: f32 = 20.598997;
    const F2: f32 = 107.65265;
    const F3: f32 = 737.86223;
    const F4: f32 = 12194.217;

    let pole = |f_hz: f32| -> AnalogCascade { hipass_pole(std::f32::consts::TAU * f_hz, 0.5_f32.sqrt()) };

    let mut cascades = match curve {
        WeightingCurve::A => vec![
            pole(F1),
            pole(F1),
            hipass_pole(std::f32::consts::TAU * F2, 1.0),
            hipass_pole(std::f32::consts::TAU * F3, 1.0),
            lopass_pole(std::f32::consts::TAU * F4, 1.0),
            lopass_pole(std::f32::consts::TAU * F4, 1.0),
        ],
        WeightingCurve::B => vec![
            pole(F1),
            pole(F1),
            hipass_pole(std::f32::consts::TAU * F2, 1.0),
            lopass_pole(std::f32::consts::TAU * F4, 1.0),
            lopass_pole(std::f32::consts::TAU * F4, 1.0),
        ],
        WeightingCurve::C => vec![
            pole(F1),
            pole(F1),
            lopass_pole(std::f32::consts::TAU * F4, 1.0),
            lopass_pole(std::f32::consts::TAU * F4, 1.0),
        ],
        WeightingCurve::D => vec![
            hipass_pole(std::f32::consts::TAU * 200.0, 1.0),
            lopass_pole(std::f32::consts::TAU * 5000.0, 1.0),
        ],
        WeightingCurve::K => vec![
            shelf_section(std::f32::consts::TAU * 1500.0, 4.0, 1.0_f32.sqrt(), true),
            hipass_pole(std::f32::consts::TAU * 38.0, 0.5),
        ],
    };

    let synthetic_params = FilterParams {
        filter_type: super::params::FilterType::new(
            Prototype::Weighting(curve),
            Shape::Hipass,
            FilterTransform::Bilinear,
        ),
        f1: F1,
        f2: F1,
        gain: 1.0,
        slope: 1,
        quality: 0.0,
    };

    let mut discrete: Vec<DiscreteCascade> = cascades
        .drain(..)
        .map(|a| bilinear(&a, synthetic_params.f1, sample_rate))
        .collect();

    // Post-normalize: unity gain at 1 kHz.
    let omega_1k = 1000.0 / sample_rate;
    let mut response = Complex32::new(1.0, 0.0);
    for c in &discrete {
        response *= c.response(omega_1k);
    }
    let mag = response.norm();
    if mag > 1e-12 {
        if let Some(first) = discrete.first_mut() {
            first.b0 /= mag;
            first.b1 /= mag;
            first.b2 /= mag;
        }
    }
    discrete
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::params::{FilterType, Shape as ShapeP};

    #[test]
    fn bwc_lopass_dc_gain_is_unity() {
        let sr = 48000.0;
        let params = FilterParams {
            filter_type: FilterType::new(
                Prototype::Butterworth,
                ShapeP::Lopass,
                FilterTransform::Bilinear,
            ),
            f1: 1000.0,
            f2: 1000.0,
            gain: 1.0,
            slope: 2,
            quality: 0.7,
        };
        let chain = design(&params, sr);
        assert_eq!(chain.len(), 2);
        let mut response = Complex32::new(1.0, 0.0);
        for c in &chain {
            response *= c.response(0.0);
        }
        assert!((response.norm() - 1.0).abs() < 1e-3);

        let mut response_10k = Complex32::new(1.0, 0.0);
        for c in &chain {
            response_10k *= c.response(10_000.0 / sr);
        }
        assert!(response_10k.norm() < 0.2, "gain at 10kHz: {}", response_10k.norm());
    }

    #[test]
    fn apo_bell_unity_at_dc_and_nyquist_with_zero_gain() {
        let sr = 48000.0;
        let params = FilterParams {
            filter_type: FilterType::new(Prototype::Apo, ShapeP::Bell, FilterTransform::Bilinear),
            f1: 1000.0,
            f2: 1000.0,
            gain: 1.0,
            slope: 1,
            quality: 1.0,
        };
        let c = apo_biquad(&params, sr);
        assert!((c.response(0.0).norm() - 1.0).abs() < 1e-2);
    }
}
