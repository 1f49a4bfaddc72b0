//! Second-order sections: analog prototype coefficients and their discrete,
//! ready-to-run form.

pub use crate::math::FILTER_CHAINS_MAX;

/// Analog-domain second-order section:
/// `H(s) = (t0 + t1*s + t2*s^2) / (b0 + b1*s + b2*s^2)`.
#[derive(Copy, Clone, Debug, Default)]
pub struct AnalogCascade {
    pub t0: f32,
    pub t1: f32,
    pub t2: f32,
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
}

impl AnalogCascade {
    pub const fn new(t0: f32, t1: f32, t2: f32, b0: f32, b1: f32, b2: f32) -> Self {
        Self { t0, t1, t2, b0, b1, b2 }
    }

    /// Evaluate `H(jw)` for real radian frequency `w`.
    pub fn response(&self, w: f32) -> num_complex::Complex32 {
        use num_complex::Complex32;
        let s = Complex32::new(0.0, w);
        let num = Complex32::new(self.t0, 0.0) + s * self.t1 + s * s * self.t2;
        let den = Complex32::new(self.b0, 0.0) + s * self.b1 + s * s * self.b2;
        num / den
    }
}

/// Discrete second-order section in the fused-multiply-add update form
/// `y = b0*x + b1*x1 + b2*x2 + a1*y1 + a2*y2` — note `a1`/`a2` already carry
/// the sign flip relative to the textbook `a` coefficients (spec §3).
#[derive(Copy, Clone, Debug, Default)]
pub struct DiscreteCascade {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl DiscreteCascade {
    pub const IDENTITY: DiscreteCascade = DiscreteCascade {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Frequency response at angular frequency `omega` expressed as a
    /// fraction of the sampling rate (`omega = f / sr`).
    pub fn response(&self, omega: f32) -> num_complex::Complex32 {
        use num_complex::Complex32;
        let theta = -std::f32::consts::TAU * omega;
        let z1 = Complex32::from_polar(1.0, theta);
        let z2 = z1 * z1;
        let num = Complex32::new(self.b0, 0.0) + z1 * self.b1 + z2 * self.b2;
        let den = Complex32::new(1.0, 0.0) - z1 * self.a1 - z2 * self.a2;
        num / den
    }
}

/// Per-cascade run-time state: two history samples, shared between the
/// direct-form-II-transposed scalar path and the vectorized bank path.
#[derive(Copy, Clone, Debug, Default)]
pub struct CascadeState {
    pub s1: f32,
    pub s2: f32,
}

impl CascadeState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Process `n` samples through `coefs`, transposed direct form II:
    /// `y = b0*x + s1; s1' = s2 + b1*x + a1*y; s2' = b2*x + a2*y`.
    #[inline]
    pub fn process(&mut self, coefs: &DiscreteCascade, dst: &mut [f32], src: &[f32]) {
        let mut s1 = self.s1;
        let mut s2 = self.s2;
        for (d, &x) in dst.iter_mut().zip(src) {
            let y = coefs.b0 * x + s1;
            s1 = s2 + coefs.b1 * x + coefs.a1 * y;
            s2 = coefs.b2 * x + coefs.a2 * y;
            *d = y;
        }
        self.s1 = s1;
        self.s2 = s2;
    }
}
