//! Multi-channel PCM buffer.
//!
//! Storage is channel-major: channel `c`'s samples live at
//! `data[c * capacity .. c * capacity + length]`. `capacity` is the
//! per-channel stride and is always a multiple of [`ALIGN_QUANTUM`], which
//! keeps every channel's base address aligned for a SIMD backend even though
//! this crate's own [`crate::simd`] module does not require it.

use crate::error::{Error, Result};
use crate::math::{align_capacity, ALIGN_QUANTUM};

/// A multi-channel sample buffer in 32-bit float precision.
///
/// ### Example: create an empty stereo buffer
/// ```
/// use dspu::Sample;
/// let s = Sample::new(2, 44100, 0);
/// assert_eq!(s.channels(), 2);
/// assert_eq!(s.length(), 0);
/// ```
#[derive(Clone, Debug)]
pub struct Sample {
    data: Vec<f32>,
    channels: usize,
    capacity: usize,
    length: usize,
    sample_rate: u32,
}

impl Sample {
    /// Create an empty sample with room for `capacity` samples per channel.
    pub fn new(channels: usize, sample_rate: u32, capacity: usize) -> Self {
        let capacity = align_capacity(capacity);
        Self {
            data: vec![0.0; channels * capacity],
            channels,
            capacity,
            length: 0,
            sample_rate,
        }
    }

    /// Construct a sample directly from an existing flat buffer. `data` must
    /// contain `channels * capacity` elements laid out channel-major.
    pub fn from_raw(
        data: Vec<f32>,
        channels: usize,
        capacity: usize,
        length: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if channels == 0 || data.len() != channels * capacity || length > capacity {
            return Err(Error::bad_args("sample buffer shape mismatch"));
        }
        Ok(Self {
            data,
            channels,
            capacity,
            length,
            sample_rate,
        })
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    pub fn duration(&self) -> f64 {
        self.length as f64 / self.sample_rate.max(1) as f64
    }

    #[inline]
    pub fn channel(&self, c: usize) -> &[f32] {
        let base = c * self.capacity;
        &self.data[base..base + self.length]
    }

    #[inline]
    pub fn channel_mut(&mut self, c: usize) -> &mut [f32] {
        let base = c * self.capacity;
        &mut self.data[base..base + self.length]
    }

    /// Reallocate to hold `new_capacity` samples per channel, preserving
    /// existing data within the overlap of old and new strides.
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        let new_capacity = align_capacity(new_capacity);
        let mut new_data = vec![0.0; self.channels * new_capacity];
        let keep = self.length.min(new_capacity);
        for c in 0..self.channels {
            let old_base = c * self.capacity;
            let new_base = c * new_capacity;
            new_data[new_base..new_base + keep]
                .copy_from_slice(&self.data[old_base..old_base + keep]);
        }
        self.data = new_data;
        self.capacity = new_capacity;
        self.length = self.length.min(new_capacity);
        Ok(())
    }

    /// Grow capacity (if needed) and set `length` to `new_length`, zero-filling
    /// any newly exposed region.
    pub fn set_length(&mut self, new_length: usize) -> Result<()> {
        if new_length > self.capacity {
            self.resize(new_length)?;
        }
        if new_length > self.length {
            for c in 0..self.channels {
                let base = c * self.capacity;
                self.data[base + self.length..base + new_length].fill(0.0);
            }
        }
        self.length = new_length;
        Ok(())
    }

    /// Insert `count` zero samples at `pos` in every channel, shifting
    /// existing samples at positions `>= pos` forward by `count`.
    pub fn insert(&mut self, pos: usize, count: usize) -> Result<()> {
        if pos > self.length {
            return Err(Error::bad_args("insert position past end of sample"));
        }
        if count == 0 {
            return Ok(());
        }
        let new_length = self.length + count;
        if new_length > self.capacity {
            self.resize(new_length.max(self.capacity * 2))?;
        }
        for c in 0..self.channels {
            let base = c * self.capacity;
            self.data.copy_within(
                base + pos..base + self.length,
                base + pos + count,
            );
            self.data[base + pos..base + pos + count].fill(0.0);
        }
        self.length = new_length;
        Ok(())
    }

    /// Append `other`'s samples (which must share channel count) to the end.
    pub fn append(&mut self, other: &Sample) -> Result<()> {
        if other.channels != self.channels {
            return Err(Error::bad_args("channel count mismatch on append"));
        }
        let at = self.length;
        self.insert(at, other.length)?;
        for c in 0..self.channels {
            self.channel_mut(c)[at..at + other.length].copy_from_slice(other.channel(c));
        }
        Ok(())
    }

    /// Prepend `other`'s samples to the front.
    pub fn prepend(&mut self, other: &Sample) -> Result<()> {
        if other.channels != self.channels {
            return Err(Error::bad_args("channel count mismatch on prepend"));
        }
        self.insert(0, other.length)?;
        for c in 0..self.channels {
            self.channel_mut(c)[0..other.length].copy_from_slice(other.channel(c));
        }
        Ok(())
    }

    /// Exchange the contents of two samples in O(1).
    pub fn swap(&mut self, other: &mut Sample) {
        std::mem::swap(self, other);
    }

    /// Peak absolute amplitude across all channels.
    pub fn amplitude(&self) -> f32 {
        let mut peak = 0.0f32;
        for c in 0..self.channels {
            for &x in self.channel(c) {
                peak = peak.max(x.abs());
            }
        }
        peak
    }

    /// Resample to `target_rate` using windowed-sinc (Lanczos-3) interpolation,
    /// matching the kernel family the oversampler uses elsewhere in this crate.
    pub fn resampled(&self, target_rate: u32) -> Result<Sample> {
        if target_rate == 0 {
            return Err(Error::invalid("target sample rate must be positive"));
        }
        if target_rate == self.sample_rate {
            return Ok(self.clone());
        }
        let ratio = target_rate as f64 / self.sample_rate.max(1) as f64;
        let new_length = ((self.length as f64) * ratio).round() as usize;
        let mut out = Sample::new(self.channels, target_rate, new_length);
        out.set_length(new_length)?;
        const A: isize = 3;
        for c in 0..self.channels {
            let src = self.channel(c);
            let dst = out.channel_mut(c);
            for (n, d) in dst.iter_mut().enumerate() {
                let src_pos = n as f64 / ratio;
                let center = src_pos.floor() as isize;
                let mut acc = 0.0f64;
                let mut wsum = 0.0f64;
                for k in (center - A + 1)..=(center + A) {
                    if k < 0 || k as usize >= src.len() {
                        continue;
                    }
                    let x = src_pos - k as f64;
                    let w = lanczos_kernel(x, A as f64);
                    acc += w * src[k as usize] as f64;
                    wsum += w;
                }
                *d = if wsum > 0.0 { (acc / wsum) as f32 } else { 0.0 };
            }
        }
        Ok(out)
    }
}

fn lanczos_kernel(x: f64, a: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else if x.abs() >= a {
        0.0
    } else {
        let px = std::f64::consts::PI * x;
        a * (px.sin()) * (px / a).sin() / (px * px)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::ALIGN_QUANTUM;

    #[test]
    fn capacity_is_aligned() {
        let s = Sample::new(2, 48000, 3);
        assert_eq!(s.capacity() % ALIGN_QUANTUM, 0);
        assert!(s.capacity() >= 3);
    }

    #[test]
    fn insert_shifts_tail_and_grows_length() {
        let mut s = Sample::new(1, 48000, 4);
        s.set_length(4).unwrap();
        s.channel_mut(0).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        let before_len = s.length();
        s.insert(2, 2).unwrap();
        assert_eq!(s.length(), before_len + 2);
        assert_eq!(s.channel(0), &[1.0, 2.0, 0.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn append_preserves_existing_data() {
        let mut a = Sample::new(1, 48000, 2);
        a.set_length(2).unwrap();
        a.channel_mut(0).copy_from_slice(&[1.0, 2.0]);
        let mut b = Sample::new(1, 48000, 2);
        b.set_length(2).unwrap();
        b.channel_mut(0).copy_from_slice(&[3.0, 4.0]);
        a.append(&b).unwrap();
        assert_eq!(a.channel(0), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn resample_round_trip_preserves_length_ratio() {
        let mut s = Sample::new(1, 48000, 480);
        s.set_length(480).unwrap();
        for (i, x) in s.channel_mut(0).iter_mut().enumerate() {
            *x = (i as f32 * 0.1).sin();
        }
        let up = s.resampled(96000).unwrap();
        let down = up.resampled(48000).unwrap();
        assert_eq!(down.length(), s.length());
        let mut sq_err = 0.0f64;
        for i in 10..470 {
            let d = (down.channel(0)[i] - s.channel(0)[i]) as f64;
            sq_err += d * d;
        }
        let rms = (sq_err / 460.0).sqrt();
        assert!(rms < 1e-2, "rms error too high: {rms}");
    }
}
