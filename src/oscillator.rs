//! Band-limited periodic waveform synthesis driven by a fixed-point phase
//! accumulator (spec §4.7).

use crate::error::{Error, Result};
use crate::oversampler::{Factor as OversamplerFactor, Oversampler, Precision as OversamplerPrecision};

/// Waveform family.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Cosine,
    SquaredSine,
    SquaredCosine,
    Rectangular,
    Sawtooth,
    Trapezoid,
    PulseTrain,
    Parabolic,
}

/// Native (aliased) or band-limited (oversampled) synthesis mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Quality {
    Native,
    BandLimited,
}

/// How an oscillator's samples combine with the destination buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Combine {
    Overwrite,
    Add,
    Mul,
}

/// Fixed-point phase accumulator oscillator with duty/trapezoid shaping.
pub struct Oscillator {
    bits: u32,
    mask: u32,
    phase: u32,
    freq_ctrl_word: u32,
    sample_rate: f32,
    frequency: f32,
    waveform: Waveform,
    quality: Quality,
    duty: f32,
    reverse_dc_center: bool,
    oversampler: Option<Oversampler>,
}

impl Oscillator {
    pub fn new(sample_rate: f32, bits: u32) -> Self {
        let mask = if bits >= 32 { u32::MAX } else { (1u32 << bits) - 1 };
        let mut osc = Self {
            bits,
            mask,
            phase: 0,
            freq_ctrl_word: 0,
            sample_rate,
            frequency: 440.0,
            waveform: Waveform::Sine,
            quality: Quality::Native,
            duty: 0.5,
            reverse_dc_center: false,
            oversampler: None,
        };
        osc.set_frequency(osc.frequency);
        osc
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.set_frequency(self.frequency);
        if let Some(over) = &mut self.oversampler {
            over.set_sample_rate(sample_rate);
        }
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
        let word = (self.mask as f64 + 1.0) * frequency as f64 / self.sample_rate as f64;
        self.freq_ctrl_word = word.round() as u32;
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn set_duty(&mut self, duty: f32) {
        self.duty = duty.clamp(0.0, 1.0);
    }

    pub fn set_reverse_dc_center(&mut self, reverse: bool) {
        self.reverse_dc_center = reverse;
    }

    pub fn set_quality(
        &mut self,
        quality: Quality,
        oversample_factor: OversamplerFactor,
        oversample_precision: OversamplerPrecision,
    ) {
        self.quality = quality;
        if quality == Quality::BandLimited {
            let mut over = Oversampler::new(self.sample_rate);
            over.set_factor(oversample_factor);
            over.set_precision(oversample_precision);
            self.oversampler = Some(over);
        } else {
            self.oversampler = None;
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0;
    }

    pub fn latency_samples(&self) -> usize {
        match &self.oversampler {
            Some(over) => over.latency(),
            None => 0,
        }
    }

    fn native_sample(&self, phase_u: u32) -> f32 {
        let t = phase_u as f32 / (self.mask as f32 + 1.0);
        let out = match self.waveform {
            Waveform::Sine => (std::f32::consts::TAU * t).sin(),
            Waveform::Cosine => (std::f32::consts::TAU * t).cos(),
            Waveform::SquaredSine => {
                let s = (std::f32::consts::TAU * t).sin();
                s * s
            }
            Waveform::SquaredCosine => {
                let c = (std::f32::consts::TAU * t).cos();
                c * c
            }
            Waveform::Rectangular => {
                if t < self.duty {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * t - 1.0,
            Waveform::Trapezoid => trapezoid(t, self.duty),
            Waveform::PulseTrain => {
                if t < self.duty * 0.1 {
                    1.0
                } else {
                    0.0
                }
            }
            Waveform::Parabolic => {
                let u = 2.0 * t - 1.0;
                1.0 - u * u
            }
        };
        if self.reverse_dc_center {
            -out
        } else {
            out
        }
    }

    fn run_native(&mut self, n: usize, buf: &mut [f32]) {
        for sample in buf.iter_mut().take(n) {
            *sample = self.native_sample(self.phase & self.mask);
            self.phase = self.phase.wrapping_add(self.freq_ctrl_word);
        }
    }

    fn run(&mut self, n: usize, buf: &mut [f32]) -> Result<()> {
        match self.quality {
            Quality::Native => {
                self.run_native(n, buf);
                Ok(())
            }
            Quality::BandLimited => {
                let over = self.oversampler.as_mut().ok_or(Error::BadState)?;
                let waveform = self.waveform;
                let duty = self.duty;
                let reverse = self.reverse_dc_center;
                let mask = self.mask;
                let phase_cell = std::cell::Cell::new(self.phase);
                let freq_ctrl_word = self.freq_ctrl_word;

                let dummy_src = vec![0.0f32; n];
                over.process(buf, &dummy_src, n, |out, _in, m| {
                    let mut phase = phase_cell.get();
                    for sample in out.iter_mut().take(m) {
                        let t = (phase & mask) as f32 / (mask as f32 + 1.0);
                        let mut v = match waveform {
                            Waveform::Sine => (std::f32::consts::TAU * t).sin(),
                            Waveform::Cosine => (std::f32::consts::TAU * t).cos(),
                            Waveform::SquaredSine => (std::f32::consts::TAU * t).sin().powi(2),
                            Waveform::SquaredCosine => (std::f32::consts::TAU * t).cos().powi(2),
                            Waveform::Rectangular => {
                                if t < duty {
                                    1.0
                                } else {
                                    -1.0
                                }
                            }
                            Waveform::Sawtooth => 2.0 * t - 1.0,
                            Waveform::Trapezoid => trapezoid(t, duty),
                            Waveform::PulseTrain => {
                                if t < duty * 0.1 {
                                    1.0
                                } else {
                                    0.0
                                }
                            }
                            Waveform::Parabolic => {
                                let u = 2.0 * t - 1.0;
                                1.0 - u * u
                            }
                        };
                        if reverse {
                            v = -v;
                        }
                        *sample = v;
                        phase = phase.wrapping_add(freq_ctrl_word);
                    }
                    phase_cell.set(phase);
                })?;
                self.phase = phase_cell.get();
                Ok(())
            }
        }
    }

    pub fn process_overwrite(&mut self, dst: &mut [f32], n: usize) -> Result<()> {
        if dst.len() < n {
            return Err(Error::bad_args("process buffer shorter than n"));
        }
        self.run(n, dst)
    }

    pub fn process_add(&mut self, dst: &mut [f32], n: usize) -> Result<()> {
        if dst.len() < n {
            return Err(Error::bad_args("process buffer shorter than n"));
        }
        let mut scratch = vec![0.0f32; n];
        self.run(n, &mut scratch)?;
        for i in 0..n {
            dst[i] += scratch[i];
        }
        Ok(())
    }

    pub fn process_mul(&mut self, dst: &mut [f32], n: usize) -> Result<()> {
        if dst.len() < n {
            return Err(Error::bad_args("process buffer shorter than n"));
        }
        let mut scratch = vec![0.0f32; n];
        self.run(n, &mut scratch)?;
        for i in 0..n {
            dst[i] *= scratch[i];
        }
        Ok(())
    }

    /// Produce a decimated window spanning exactly `n_periods` full cycles,
    /// skipping `n_skip` leading periods, useful for FFT-safe drawing.
    pub fn get_periods(&self, dst: &mut [f32], n_periods: u32, n_skip: u32, n_samples: usize) -> Result<()> {
        if dst.len() < n_samples {
            return Err(Error::bad_args("get_periods buffer shorter than n_samples"));
        }
        let period_span = (self.mask as u64 + 1) * n_periods as u64;
        let skip_span = (self.mask as u64 + 1) * n_skip as u64;
        for (i, sample) in dst.iter_mut().enumerate().take(n_samples) {
            let frac = i as f64 / n_samples.max(1) as f64;
            let phase = (skip_span + (frac * period_span as f64) as u64) as u32 & self.mask;
            *sample = self.native_sample(phase);
        }
        Ok(())
    }

    pub fn dump(&self, v: &mut dyn crate::dump::StateDumper) {
        v.begin_object("oscillator");
        v.write("frequency", self.frequency as f64);
        v.writei("bits", self.bits as i64);
        v.end_object();
    }
}

fn trapezoid(t: f32, duty: f32) -> f32 {
    let rise_end = duty * 0.5;
    let fall_start = 1.0 - duty * 0.5;
    if t < rise_end {
        -1.0 + 2.0 * (t / rise_end.max(1e-6))
    } else if t < fall_start {
        1.0
    } else {
        1.0 - 2.0 * ((t - fall_start) / (1.0 - fall_start).max(1e-6))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_period_matches_frequency() {
        let sr = 48000.0;
        let mut osc = Oscillator::new(sr, 32);
        osc.set_frequency(1000.0);
        osc.set_waveform(Waveform::Sine);
        let n = 48;
        let mut buf = vec![0.0f32; n];
        osc.process_overwrite(&mut buf, n).unwrap();
        assert!((buf[0]).abs() < 0.2);
    }

    #[test]
    fn get_periods_spans_requested_cycle_count() {
        let osc = Oscillator::new(48000.0, 24);
        let mut buf = vec![0.0f32; 256];
        osc.get_periods(&mut buf, 2, 0, 256).unwrap();
        assert!((buf[0] - buf[128]).abs() < 0.05);
    }

    #[test]
    fn sawtooth_ranges_between_minus_one_and_one() {
        let mut osc = Oscillator::new(48000.0, 32);
        osc.set_frequency(100.0);
        osc.set_waveform(Waveform::Sawtooth);
        let mut buf = vec![0.0f32; 512];
        osc.process_overwrite(&mut buf, 512).unwrap();
        assert!(buf.iter().all(|&x| (-1.0..=1.0).contains(&x)));
    }
}
