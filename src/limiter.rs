//! Look-ahead limiter: a sliding gain envelope buffer carved into "dents"
//! around detected peaks, with optional automatic level release (spec §4.5).

use crate::error::{Error, Result};
use crate::math::{db_to_gain, GAIN_LOWERING, LIMITER_PEAKS_MAX};

/// Peak-scan iteration count past which a knee that still hasn't converged
/// is almost certainly fighting a pathological sidechain rather than a
/// transient; logged once per occurrence so a host can flag the input.
const ITERATION_WARN_THRESH: u32 = 4096;

/// A dent shape family, each with rise/plateau/fall phases.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DentMode {
    HermThin,
    HermWide,
    HermTail,
    HermDuck,
    ExpThin,
    ExpWide,
    ExpTail,
    ExpDuck,
    LineThin,
    LineWide,
    LineTail,
    LineDuck,
}

impl DentMode {
    fn is_herm(self) -> bool {
        matches!(self, DentMode::HermThin | DentMode::HermWide | DentMode::HermTail | DentMode::HermDuck)
    }
    fn is_exp(self) -> bool {
        matches!(self, DentMode::ExpThin | DentMode::ExpWide | DentMode::ExpTail | DentMode::ExpDuck)
    }
    fn is_wide(self) -> bool {
        matches!(self, DentMode::HermWide | DentMode::ExpWide | DentMode::LineWide)
    }
    fn is_duck(self) -> bool {
        matches!(self, DentMode::HermDuck | DentMode::ExpDuck | DentMode::LineDuck)
    }
}

#[derive(Copy, Clone)]
pub struct Settings {
    pub threshold: f32,
    pub knee: f32,
    pub attack_samples: f32,
    pub release_samples: f32,
    pub lookahead_samples: usize,
    pub mode: DentMode,
    pub alr_enabled: bool,
    pub alr_attack_samples: f32,
    pub alr_release_samples: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            knee: 1.0,
            attack_samples: 32.0,
            release_samples: 240.0,
            lookahead_samples: 64,
            mode: DentMode::HermThin,
            alr_enabled: false,
            alr_attack_samples: 480.0,
            alr_release_samples: 4800.0,
        }
    }
}

const GRANULARITY: usize = crate::math::BUF_GRANULARITY;

/// Windowed peak-scanning gain reducer operating on a long sliding gain
/// buffer (spec §4.5's "Limiter envelope buffer" glossary entry).
pub struct Limiter {
    buf: Vec<f32>,
    head: usize,
    max_lookahead: usize,
    settings: Settings,
    pending_threshold: Option<(f32, bool)>,
    alr_env: f32,
    dirty: bool,
    /// Soft-knee region bounds and quadratic-Hermite coefficients,
    /// precomputed in `update_settings` (spec §4.5's ALR description).
    alr_ks: f32,
    alr_ke: f32,
    alr_gain: f32,
    alr_herm_a: f32,
    alr_herm_b: f32,
}

impl Limiter {
    /// Allocate the gain buffer sized `8*max_lookahead + 4*max_lookahead +
    /// granularity`, filled with 1.0.
    pub fn init(_max_sr: f32, max_lookahead_ms: f32, sample_rate: f32) -> Self {
        let max_lookahead = ((max_lookahead_ms * 0.001 * sample_rate).ceil() as usize).max(1);
        let capacity = 8 * max_lookahead + 4 * max_lookahead + GRANULARITY;
        let mut me = Self {
            buf: vec![1.0f32; capacity],
            head: 4 * max_lookahead,
            max_lookahead,
            settings: Settings::default(),
            pending_threshold: None,
            alr_env: 1.0,
            dirty: true,
            alr_ks: 0.0,
            alr_ke: 0.0,
            alr_gain: 0.0,
            alr_herm_a: 0.0,
            alr_herm_b: 0.0,
        };
        me.rebuild_alr_knee();
        me
    }

    pub fn set_threshold(&mut self, threshold: f32, immediate: bool) {
        self.pending_threshold = Some((threshold, immediate));
        self.dirty = true;
    }

    pub fn set_attack_release(&mut self, attack_samples: f32, release_samples: f32) {
        self.settings.attack_samples = attack_samples;
        self.settings.release_samples = release_samples;
        self.dirty = true;
    }

    pub fn set_lookahead(&mut self, lookahead_samples: usize) -> Result<()> {
        if lookahead_samples > self.max_lookahead {
            return Err(Error::invalid("lookahead exceeds max_lookahead"));
        }
        self.settings.lookahead_samples = lookahead_samples;
        self.dirty = true;
        Ok(())
    }

    pub fn set_knee(&mut self, knee: f32) {
        self.settings.knee = knee;
        self.dirty = true;
    }

    pub fn set_mode(&mut self, mode: DentMode) {
        self.settings.mode = mode;
        self.dirty = true;
    }

    pub fn set_alr(&mut self, enabled: bool, attack_samples: f32, release_samples: f32) {
        self.settings.alr_enabled = enabled;
        self.settings.alr_attack_samples = attack_samples;
        self.settings.alr_release_samples = release_samples;
        self.dirty = true;
    }

    fn update_settings(&mut self) {
        if !self.dirty {
            return;
        }
        if let Some((t, immediate)) = self.pending_threshold.take() {
            if !immediate && self.settings.threshold > 0.0 {
                let ratio = t / self.settings.threshold;
                for v in self.buf.iter_mut() {
                    *v *= ratio;
                }
            }
            self.settings.threshold = t;
        }
        self.rebuild_alr_knee();
        self.dirty = false;
    }

    /// Precompute the ALR soft-knee region (`KS..KE`) and its quadratic
    /// Hermite blend (spec §4.5): below `KS` the envelope passes untouched;
    /// above `KE` the hard `alr_gain / e` asymptote applies (see
    /// [`Self::apply_alr`]); in between, a quadratic fit matches value and
    /// slope with the flat region at `KS` and value and slope with the
    /// asymptote at `KE`, removing the gain-derivative discontinuity a bare
    /// hard cutover at `KE` would otherwise produce.
    fn rebuild_alr_knee(&mut self) {
        let threshold = self.settings.threshold;
        let knee = self.settings.knee;
        let ke = threshold * knee * std::f32::consts::FRAC_1_SQRT_2;
        let ks = ke * (std::f32::consts::SQRT_2 - 1.0);
        let gain = threshold * std::f32::consts::FRAC_1_SQRT_2;

        self.alr_ks = ks;
        self.alr_ke = ke;
        self.alr_gain = gain;

        let u_end = ke - ks;
        if u_end <= 1e-9 || ke <= 1e-9 {
            self.alr_herm_a = 0.0;
            self.alr_herm_b = 0.0;
            return;
        }
        let target_value = gain / ke;
        let target_slope = -gain / (ke * ke);
        // f(u) = a*u^2 + b*u + 1, with u = e - ks, fit so f(u_end) and
        // f'(u_end) match the hard asymptote's value and slope at KE.
        let a = (1.0 - target_value + target_slope * u_end) / (u_end * u_end);
        let b = target_slope - 2.0 * a * u_end;
        self.alr_herm_a = a;
        self.alr_herm_b = b;
    }

    /// Process up to `n <= 8192` samples of sidechain signal into `gain_out`.
    pub fn process(&mut self, gain_out: &mut [f32], sidechain: &[f32], n: usize) -> Result<()> {
        if n > GRANULARITY {
            return Err(Error::bad_args("limiter block exceeds granularity"));
        }
        if gain_out.len() < n || sidechain.len() < n {
            return Err(Error::bad_args("process buffers shorter than n"));
        }
        self.update_settings();

        let max_la = self.max_lookahead;
        let window_start = self.head + max_la + 3 * max_la;
        for i in 0..n {
            self.buf[window_start + i] = 1.0;
        }

        let mut tmp = vec![0.0f32; n];
        for i in 0..n {
            tmp[i] = sidechain[i].abs() * self.buf[window_start + i];
        }

        if self.settings.alr_enabled {
            self.apply_alr(&mut tmp, sidechain, n, window_start);
        }

        let mut knee = self.settings.knee;
        let threshold = self.settings.threshold;
        let mut iterations = 0u32;
        loop {
            let (idx, peak) = tmp
                .iter()
                .enumerate()
                .fold((0usize, 0.0f32), |acc, (i, &v)| if v.abs() > acc.1 { (i, v.abs()) } else { acc });
            if peak <= threshold * knee || peak <= 1e-9 {
                break;
            }
            let amplitude = (peak - threshold) / peak;
            self.apply_dent(window_start, idx, amplitude);
            for i in 0..n {
                tmp[i] = sidechain[i].abs() * self.buf[window_start + i];
            }
            iterations += 1;
            if iterations % LIMITER_PEAKS_MAX as u32 == 0 {
                knee *= GAIN_LOWERING;
            }
            if iterations > ITERATION_WARN_THRESH {
                log::warn!("limiter peak scan hit the iteration cap ({iterations}); knee may not have converged");
                break;
            }
        }

        let lookahead = self.settings.lookahead_samples;
        for i in 0..n {
            gain_out[i] = self.buf[self.head + max_la - lookahead + i];
        }

        self.head += n;
        if self.head >= 8 * max_la {
            let tail_start = self.head;
            let tail_len = 4 * max_la + GRANULARITY - n;
            for i in 0..tail_len {
                self.buf[i] = self.buf[tail_start + i];
            }
            for v in self.buf[tail_len..].iter_mut() {
                *v = 1.0;
            }
            self.head = 4 * max_la;
        }
        Ok(())
    }

    fn apply_alr(&mut self, tmp: &mut [f32], sidechain: &[f32], n: usize, window_start: usize) {
        let a = (-1.0f32 / self.settings.alr_attack_samples.max(1.0)).exp();
        let r = (-1.0f32 / self.settings.alr_release_samples.max(1.0)).exp();
        for i in 0..n {
            let x = sidechain[i].abs();
            let coeff = if x > self.alr_env { a } else { r };
            self.alr_env = x + coeff * (self.alr_env - x);
            let e = self.alr_env;
            let pre_gain = if e >= self.alr_ke {
                (self.alr_gain / e).min(1.0)
            } else if e > self.alr_ks {
                let u = e - self.alr_ks;
                (self.alr_herm_a * u * u + self.alr_herm_b * u + 1.0).min(1.0)
            } else {
                continue;
            };
            self.buf[window_start + i] *= pre_gain;
            tmp[i] = sidechain[i].abs() * self.buf[window_start + i];
        }
    }

    fn apply_dent(&mut self, window_start: usize, center: usize, amplitude: f32) {
        let mode = self.settings.mode;
        let attack = self.settings.attack_samples.max(1.0);
        let release = self.settings.release_samples.max(1.0);
        let plateau = if mode.is_duck() { release * 0.5 } else { 0.0 };
        let a = if mode.is_wide() { attack * 0.5 } else { attack };

        let lo = (center as isize - a as isize).max(-(window_start as isize));
        let hi = center as isize + release as isize + plateau as isize;

        for n in lo..=hi {
            let t = n as f32 - center as f32;
            let level = if t < 0.0 {
                dent_rise(t, -a, mode)
            } else if t <= plateau {
                1.0
            } else {
                dent_fall(t - plateau, release, mode)
            };
            let gain = 1.0 - amplitude * level;
            let idx = (window_start as isize + n) as usize;
            if idx < self.buf.len() {
                self.buf[idx] *= gain.max(0.0);
            }
        }
    }

    pub fn reset(&mut self) {
        for v in self.buf.iter_mut() {
            *v = 1.0;
        }
        self.head = 4 * self.max_lookahead;
        self.alr_env = 1.0;
    }

    pub fn latency_samples(&self) -> usize {
        self.settings.lookahead_samples
    }

    pub fn dump(&self, v: &mut dyn crate::dump::StateDumper) {
        v.begin_object("limiter");
        v.write("threshold", self.settings.threshold as f64);
        v.write("knee", self.settings.knee as f64);
        v.writei("lookahead", self.settings.lookahead_samples as i64);
        v.end_object();
    }
}

/// Cubic-Hermite rise from (-1, 0) to (`a_end`, 1) normalized onto `[t0, 0]`.
fn dent_rise(t: f32, t0: f32, mode: DentMode) -> f32 {
    let u = (1.0 - t / t0).clamp(0.0, 1.0);
    if mode.is_herm() {
        u * u * (3.0 - 2.0 * u)
    } else if mode.is_exp() {
        let c = 2.0 / t0.abs().max(1e-6);
        1.0 - (-c * u).exp() * ((c).exp() - 1.0).recip().max(0.0)
    } else {
        u
    }
}

fn dent_fall(t: f32, release: f32, mode: DentMode) -> f32 {
    let u = (1.0 - t / release).clamp(0.0, 1.0);
    if mode.is_herm() {
        u * u * (3.0 - 2.0 * u)
    } else if mode.is_exp() {
        let c = 2.0 / release.max(1e-6);
        (-c * (1.0 - u)).exp()
    } else {
        u
    }
}

pub fn db_threshold(db: f32) -> f32 {
    db_to_gain(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_d_impulse_is_attenuated_below_knee() {
        let sr = 48000.0;
        let mut lim = Limiter::init(sr, 10.0, sr);
        lim.set_threshold(0.5, true);
        lim.set_lookahead((0.005 * sr) as usize).unwrap();
        lim.set_attack_release(0.002 * sr, 0.005 * sr);
        lim.set_mode(DentMode::HermThin);

        let n = 9600usize;
        let mut sidechain = vec![0.0f32; n];
        let impulse_idx = (0.1 * sr) as usize;
        sidechain[impulse_idx] = 2.0;

        let mut gain = vec![0.0f32; n];
        let chunk = 4096usize;
        let mut pos = 0;
        while pos < n {
            let len = chunk.min(n - pos);
            lim.process(&mut gain[pos..pos + len], &sidechain[pos..pos + len], len).unwrap();
            pos += len;
        }

        let lookahead = lim.latency_samples();
        let mut max_out = 0.0f32;
        for i in 0..n {
            let gi = i.checked_sub(lookahead).unwrap_or(0);
            if gi < n {
                max_out = max_out.max((sidechain[i] * gain[gi]).abs());
            }
        }
        assert!(max_out <= 0.5 * lim.settings.knee + 0.05, "max_out = {max_out}");
    }

    #[test]
    fn alr_soft_knee_matches_hard_asymptote_at_ke() {
        let sr = 48000.0;
        let mut lim = Limiter::init(sr, 10.0, sr);
        lim.set_threshold(0.5, true);
        lim.set_knee(1.2);
        lim.set_alr(true, 10.0, 10.0);

        let sidechain = vec![0.0f32; 8];
        let mut gain = vec![0.0f32; 8];
        lim.process(&mut gain, &sidechain, 8).unwrap();

        let u_end = lim.alr_ke - lim.alr_ks;
        let quad_at_ke = lim.alr_herm_a * u_end * u_end + lim.alr_herm_b * u_end + 1.0;
        let hard_at_ke = lim.alr_gain / lim.alr_ke;
        assert!((quad_at_ke - hard_at_ke).abs() < 1e-4, "quad={quad_at_ke} hard={hard_at_ke}");
    }

    #[test]
    fn alr_attenuates_sustained_signal_above_knee() {
        let sr = 48000.0;
        let mut lim = Limiter::init(sr, 10.0, sr);
        lim.set_threshold(0.5, true);
        lim.set_knee(1.0);
        lim.set_alr(true, 4.0, 4.0);

        let n = 4096usize;
        let sidechain = vec![0.9f32; n];
        let mut gain = vec![0.0f32; n];
        lim.process(&mut gain, &sidechain, n).unwrap();

        assert!(gain[n - 1] < 1.0, "gain should be reduced once the envelope rises past KE: {}", gain[n - 1]);
    }

    #[test]
    fn silence_leaves_unity_gain() {
        let sr = 48000.0;
        let mut lim = Limiter::init(sr, 10.0, sr);
        lim.set_threshold(0.5, true);
        let sidechain = vec![0.0f32; 512];
        let mut gain = vec![0.0f32; 512];
        lim.process(&mut gain, &sidechain, 512).unwrap();
        assert!(gain.iter().all(|&g| (g - 1.0).abs() < 1e-6));
    }
}
