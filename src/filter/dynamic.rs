//! `DynamicFilters`: N identical-shape filter slots whose frequency response
//! is remodulated per sample by a control signal (spec §4.3).

use crate::error::{Error, Result};
use crate::math::FILTER_CHAINS_MAX;

use super::cascade::CascadeState;
use super::design::design;
use super::params::FilterParams;

struct Slot {
    params: Option<FilterParams>,
    state: [CascadeState; FILTER_CHAINS_MAX],
}

impl Slot {
    fn new() -> Self {
        Self {
            params: None,
            state: [CascadeState::default(); FILTER_CHAINS_MAX],
        }
    }
}

/// `N` filter slots, each able to run with a per-sample control signal that
/// modulates the cutoff frequency of the shared shape, matching the spec's
/// "same closed-form design equations as Filter §4.1 *per sample*".
pub struct DynamicFilters {
    slots: Vec<Slot>,
    sample_rate: f32,
}

impl DynamicFilters {
    /// Pre-allocate per-filter memory for `n` slots.
    pub fn init(n: usize) -> Self {
        Self {
            slots: (0..n).map(|_| Slot::new()).collect(),
            sample_rate: crate::math::DEFAULT_SR as f32,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    pub fn set_params(&mut self, id: usize, p: FilterParams) -> Result<()> {
        let slot = self.slots.get_mut(id).ok_or_else(|| Error::invalid("filter id out of range"))?;
        slot.params = Some(p.normalized(self.sample_rate));
        Ok(())
    }

    /// Apply filter `id` to `n` samples while the instantaneous control
    /// parameter follows `gain[i]`, a per-sample multiplier on the cutoff
    /// frequency.
    pub fn process(&mut self, id: usize, dst: &mut [f32], src: &[f32], gain: &[f32], n: usize) -> Result<()> {
        if dst.len() < n || src.len() < n || gain.len() < n {
            return Err(Error::bad_args("process buffers shorter than n"));
        }
        let sample_rate = self.sample_rate;
        let slot = self.slots.get_mut(id).ok_or_else(|| Error::invalid("filter id out of range"))?;
        let base = slot.params.ok_or(Error::BadState)?;

        for i in 0..n {
            let mut p = base;
            p.f1 = crate::math::clamp_freq(base.f1 * gain[i].max(0.0), sample_rate);
            let chain = design(&p, sample_rate);
            let mut x = src[i];
            for (c, state) in chain.iter().zip(slot.state.iter_mut()) {
                let mut y = [0.0f32];
                state.process(c, &mut y, &[x]);
                x = y[0];
            }
            dst[i] = x;
        }
        Ok(())
    }

    /// Compute the transfer function of filter `id` at `n` points assuming a
    /// constant `gain`, reusing the same cascade generator with one sample.
    pub fn freq_chart(&self, id: usize, dst_re: &mut [f32], dst_im: &mut [f32], f: &[f32], gain: f32, n: usize) -> Result<()> {
        if dst_re.len() < n || dst_im.len() < n || f.len() < n {
            return Err(Error::bad_args("freq_chart buffers shorter than n"));
        }
        let slot = self.slots.get(id).ok_or_else(|| Error::invalid("filter id out of range"))?;
        let base = slot.params.ok_or(Error::BadState)?;
        let mut p = base;
        p.f1 = crate::math::clamp_freq(base.f1 * gain.max(0.0), self.sample_rate);
        let chain = design(&p, self.sample_rate);
        for i in 0..n {
            let mut response = num_complex::Complex32::new(1.0, 0.0);
            for c in &chain {
                response *= c.response(f[i] / self.sample_rate);
            }
            dst_re[i] = response.re;
            dst_im[i] = response.im;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::params::{FilterTransform, FilterType, Prototype, Shape};

    #[test]
    fn unmodulated_gain_matches_static_filter_dc() {
        let mut df = DynamicFilters::init(1);
        df.set_sample_rate(48000.0);
        df.set_params(
            0,
            FilterParams {
                filter_type: FilterType::new(Prototype::Rlc, Shape::Lopass, FilterTransform::Bilinear),
                f1: 1000.0,
                f2: 1000.0,
                gain: 1.0,
                slope: 1,
                quality: 0.5,
            },
        )
        .unwrap();
        let src = [0.0f32; 512];
        let mut dst = [0.0f32; 512];
        let gain = [1.0f32; 512];
        let mut impulse = src;
        impulse[0] = 1.0;
        df.process(0, &mut dst, &impulse, &gain, 512).unwrap();
        let dc: f32 = dst.iter().sum();
        assert!((dc - 1.0).abs() < 0.1, "dc = {dc}");
    }
}
