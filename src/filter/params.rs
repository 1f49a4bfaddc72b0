//! Filter parameter record: the tagged `{type, f1, f2, gain, slope, quality}`
//! record from spec §3.

use crate::math::FILTER_CHAINS_MAX;

/// Analog prototype family.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Prototype {
    /// Single-pole RLC sections (`slope` chained 2-pole sections, cf. §4.1).
    Rlc,
    /// Butterworth (`BWC`): cascades distributed on angles per spec §4.1.
    Butterworth,
    /// Linkwitz-Riley (`LRX`): Butterworth emitted twice, halved gain, doubled slope.
    LinkwitzRiley,
    /// EQ-APO cookbook biquad, computed directly in the discrete domain.
    Apo,
    /// Fixed IEC/ITU weighting curve.
    Weighting(WeightingCurve),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WeightingCurve {
    A,
    B,
    C,
    D,
    K,
}

/// Filter shape.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    Lopass,
    Hipass,
    Loshelf,
    Hishelf,
    Bell,
    Bandpass,
    Notch,
    Allpass,
    Allpass2,
    Ladderpass,
    Ladderrej,
    Resonance,
    Envelope,
}

/// Discretization transform applied to the analog prototype.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FilterTransform {
    Bilinear,
    MatchedZ,
}

/// A complete filter design request.
#[derive(Copy, Clone, Debug)]
pub struct FilterType {
    pub prototype: Prototype,
    pub shape: Shape,
    pub transform: FilterTransform,
}

impl FilterType {
    pub const fn new(prototype: Prototype, shape: Shape, transform: FilterTransform) -> Self {
        Self {
            prototype,
            shape,
            transform,
        }
    }
}

/// Parameters for a single [`crate::filter::Filter`] or dynamic-filter slot.
#[derive(Copy, Clone, Debug)]
pub struct FilterParams {
    pub filter_type: FilterType,
    pub f1: f32,
    pub f2: f32,
    pub gain: f32,
    pub slope: usize,
    pub quality: f32,
}

impl FilterParams {
    pub fn new(filter_type: FilterType) -> Self {
        Self {
            filter_type,
            f1: 1000.0,
            f2: 2000.0,
            gain: 1.0,
            slope: 1,
            quality: 0.0,
        }
    }

    /// Clamp `slope` to `[1, FILTER_CHAINS_MAX]` and `f1`/`f2` to
    /// `[0, 0.49 * sample_rate]`, swapping them if `f2 < f1` for a band.
    pub fn normalized(&self, sample_rate: f32) -> FilterParams {
        let mut p = *self;
        p.slope = p.slope.clamp(1, FILTER_CHAINS_MAX);
        p.f1 = crate::math::clamp_freq(p.f1, sample_rate);
        p.f2 = crate::math::clamp_freq(p.f2, sample_rate);
        if matches!(
            p.filter_type.shape,
            Shape::Bandpass | Shape::Notch | Shape::Allpass2
        ) && p.f2 < p.f1
        {
            std::mem::swap(&mut p.f1, &mut p.f2);
        }
        p
    }
}
