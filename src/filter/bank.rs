//! Filter bank: holds up to `FILTER_CHAINS_MAX` discrete biquads and applies
//! them as a chain (spec §4.2).

use crate::math::FILTER_CHAINS_MAX;

use super::cascade::{CascadeState, DiscreteCascade};

/// Holds and runs a chain of discrete second-order sections.
#[derive(Clone)]
pub struct FilterBank {
    coefs: Vec<DiscreteCascade>,
    state: Vec<CascadeState>,
    building: bool,
}

impl Default for FilterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterBank {
    pub fn new() -> Self {
        Self {
            coefs: Vec::with_capacity(FILTER_CHAINS_MAX),
            state: Vec::with_capacity(FILTER_CHAINS_MAX),
            building: false,
        }
    }

    /// Declare a new chain build. Any cascades added via [`add_chain`] replace
    /// the previous chain once [`end`] is called.
    pub fn begin(&mut self) {
        self.coefs.clear();
        self.building = true;
    }

    /// Append a new biquad slot to the chain under construction, returning
    /// its index so the caller can fill in coefficients.
    pub fn add_chain(&mut self, coefs: DiscreteCascade) -> usize {
        debug_assert!(self.building, "add_chain called outside begin/end");
        self.coefs.push(coefs);
        self.coefs.len() - 1
    }

    /// Finalize the chain. `clear_state` resets filter memory (used when
    /// shape or slope changed, per spec §4.2).
    pub fn end(&mut self, clear_state: bool) {
        self.building = false;
        if clear_state || self.state.len() != self.coefs.len() {
            self.state = vec![CascadeState::default(); self.coefs.len()];
        }
    }

    pub fn len(&self) -> usize {
        self.coefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefs.is_empty()
    }

    pub fn coefs(&self) -> &[DiscreteCascade] {
        &self.coefs
    }

    /// Run the chain over `n` samples. Fan-out (x1/x2/x4/x8 in the original
    /// SIMD backend) collapses here to a plain sequential per-section loop;
    /// the seam is [`crate::simd::biquad_process_x1`] if a vectorized
    /// backend is plugged in later.
    pub fn process(&mut self, dst: &mut [f32], src: &[f32], n: usize) {
        if self.coefs.is_empty() {
            dst[..n].fill(0.0);
            return;
        }
        dst[..n].copy_from_slice(&src[..n]);
        let mut scratch = vec![0.0f32; n];
        for (coefs, state) in self.coefs.iter().zip(self.state.iter_mut()) {
            state.process(coefs, &mut scratch[..n], &dst[..n]);
            dst[..n].copy_from_slice(&scratch[..n]);
        }
    }

    pub fn reset_state(&mut self) {
        for s in self.state.iter_mut() {
            s.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_end_clear_produces_zero_output() {
        let mut bank = FilterBank::new();
        bank.begin();
        bank.end(true);
        let src = [1.0f32; 8];
        let mut dst = [0.0f32; 8];
        bank.process(&mut dst, &src, 8);
        assert!(dst.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn identity_chain_passes_signal_through() {
        let mut bank = FilterBank::new();
        bank.begin();
        bank.add_chain(DiscreteCascade::IDENTITY);
        bank.end(true);
        let src = [1.0f32, -2.0, 3.0, 0.5];
        let mut dst = [0.0f32; 4];
        bank.process(&mut dst, &src, 4);
        assert_eq!(dst, src);
    }
}
