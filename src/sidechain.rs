//! Sidechain analyzer: derive a scalar control-signal sequence from one or
//! two input channels (spec §4.10).

use std::collections::VecDeque;

use crate::error::{Error, Result};

/// Which channel(s) feed the detector.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StereoSource {
    Left,
    Right,
    Middle,
    Side,
    AbsMin,
    AbsMax,
}

/// Envelope-detection mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DetectMode {
    Peak,
    Lpf,
    Uniform,
    Rms,
}

const REFRESH_PERIOD: usize = 4096;

/// Scalar control-signal extractor.
pub struct Sidechain {
    sample_rate: f32,
    source: StereoSource,
    mid_side_input: bool,
    mode: DetectMode,
    reactivity_ms: f32,
    max_reactivity_ms: f32,
    lpf_state: f32,
    ring: VecDeque<f32>,
    ring_cap: usize,
    running_sum: f64,
    running_sum_sq: f64,
    samples_since_refresh: usize,
}

impl Sidechain {
    pub fn new(sample_rate: f32, max_reactivity_ms: f32) -> Self {
        Self {
            sample_rate,
            source: StereoSource::Left,
            mid_side_input: false,
            mode: DetectMode::Peak,
            reactivity_ms: 10.0,
            max_reactivity_ms,
            lpf_state: 0.0,
            ring: VecDeque::new(),
            ring_cap: 1,
            running_sum: 0.0,
            running_sum_sq: 0.0,
            samples_since_refresh: 0,
        }
    }

    pub fn set_source(&mut self, source: StereoSource, mid_side_input: bool) {
        self.source = source;
        self.mid_side_input = mid_side_input;
    }

    pub fn set_mode(&mut self, mode: DetectMode) {
        self.mode = mode;
        self.rebuild_ring();
    }

    pub fn set_reactivity(&mut self, reactivity_ms: f32) {
        self.reactivity_ms = reactivity_ms.clamp(0.0, self.max_reactivity_ms);
        self.rebuild_ring();
    }

    fn reactivity_samples(&self) -> usize {
        ((self.reactivity_ms * 0.001 * self.sample_rate).round() as usize).max(1)
    }

    fn rebuild_ring(&mut self) {
        self.ring_cap = self.reactivity_samples();
        self.ring.clear();
        self.ring.resize(self.ring_cap, 0.0);
        self.running_sum = 0.0;
        self.running_sum_sq = 0.0;
        self.samples_since_refresh = 0;
    }

    fn channel_value(&self, left: f32, right: f32) -> f32 {
        let (l, r) = if self.mid_side_input {
            (left + right, left - right)
        } else {
            (left, right)
        };
        match self.source {
            StereoSource::Left => l,
            StereoSource::Right => r,
            StereoSource::Middle => 0.5 * (l + r),
            StereoSource::Side => 0.5 * (l - r),
            StereoSource::AbsMin => {
                if l.abs() < r.abs() {
                    l
                } else {
                    r
                }
            }
            StereoSource::AbsMax => {
                if l.abs() > r.abs() {
                    l
                } else {
                    r
                }
            }
        }
    }

    fn detect(&mut self, x: f32) -> f32 {
        let ax = x.abs();
        match self.mode {
            DetectMode::Peak => ax,
            DetectMode::Lpf => {
                let reactivity = self.reactivity_samples() as f32;
                let tau = 1.0 - (((1.0 - std::f32::consts::FRAC_1_SQRT_2).ln()) / reactivity).exp();
                self.lpf_state += tau * (ax - self.lpf_state);
                self.lpf_state
            }
            DetectMode::Uniform => {
                if self.ring_cap == 0 {
                    return ax;
                }
                let old = self.ring.pop_front().unwrap_or(0.0);
                self.ring.push_back(ax);
                self.running_sum += (ax - old) as f64;
                self.maybe_refresh();
                (self.running_sum / self.ring_cap as f64) as f32
            }
            DetectMode::Rms => {
                if self.ring_cap == 0 {
                    return ax;
                }
                let old = self.ring.pop_front().unwrap_or(0.0);
                self.ring.push_back(ax);
                self.running_sum_sq += (ax * ax - old * old) as f64;
                self.maybe_refresh();
                (self.running_sum_sq.max(0.0) / self.ring_cap as f64).sqrt() as f32
            }
        }
    }

    fn maybe_refresh(&mut self) {
        self.samples_since_refresh += 1;
        if self.samples_since_refresh >= REFRESH_PERIOD {
            self.samples_since_refresh = 0;
            self.running_sum = self.ring.iter().map(|&v| v as f64).sum();
            self.running_sum_sq = self.ring.iter().map(|&v| (v as f64) * (v as f64)).sum();
        }
    }

    /// Process `n` samples from (optionally dual-channel) `left`/`right` into
    /// `out`.
    pub fn process(&mut self, out: &mut [f32], left: &[f32], right: &[f32], n: usize) -> Result<()> {
        if out.len() < n || left.len() < n || right.len() < n {
            return Err(Error::bad_args("process buffers shorter than n"));
        }
        for i in 0..n {
            let x = self.channel_value(left[i], right[i]);
            out[i] = self.detect(x);
        }
        Ok(())
    }

    /// Single-sample form for scalar (mono) callers.
    pub fn process_scalar(&mut self, x: f32) -> f32 {
        self.detect(x)
    }

    pub fn reset(&mut self) {
        self.lpf_state = 0.0;
        self.rebuild_ring();
    }

    pub fn dump(&self, v: &mut dyn crate::dump::StateDumper) {
        v.begin_object("sidechain");
        v.write("reactivity_ms", self.reactivity_ms as f64);
        v.writei("ring_cap", self.ring_cap as i64);
        v.end_object();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_steady_state_matches_abs_value() {
        let sr = 48000.0;
        let mut sc = Sidechain::new(sr, 100.0);
        sc.set_mode(DetectMode::Rms);
        sc.set_reactivity(5.0);
        let n = sc.reactivity_samples() * 3;
        let left = vec![0.7f32; n];
        let right = vec![0.7f32; n];
        let mut out = vec![0.0f32; n];
        sc.process(&mut out, &left, &right, n).unwrap();
        let tail = &out[n - 8..];
        for &v in tail {
            assert!((v - 0.7).abs() < 1e-3, "v = {v}");
        }
    }

    #[test]
    fn peak_mode_is_plain_abs() {
        let mut sc = Sidechain::new(48000.0, 50.0);
        sc.set_mode(DetectMode::Peak);
        let left = [-0.3, 0.8, -1.0];
        let right = [0.0, 0.0, 0.0];
        let mut out = [0.0f32; 3];
        sc.process(&mut out, &left, &right, 3).unwrap();
        assert_eq!(out, [0.3, 0.8, 1.0]);
    }
}
