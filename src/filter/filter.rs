//! `Filter`: design and run a single polymorphic second-order-section filter
//! cascade (spec §4.1).

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};

use super::bank::FilterBank;
use super::cascade::DiscreteCascade;
use super::design::design;
use super::params::FilterParams;

/// Parameter-staging dirty bits (spec §9): setters only OR bits in; a plain
/// integer mask, as the design notes recommend over an atomic or a crate.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
struct Dirty(u32);

impl Dirty {
    const REBUILD: Dirty = Dirty(0b01);
    const CLEAR: Dirty = Dirty(0b10);

    const fn empty() -> Self {
        Dirty(0)
    }

    fn contains(self, bit: Dirty) -> bool {
        self.0 & bit.0 != 0
    }
}

impl std::ops::BitOrAssign for Dirty {
    fn bitor_assign(&mut self, rhs: Dirty) {
        self.0 |= rhs.0;
    }
}

/// A bank owned by this filter, or a handle into one shared across several
/// filters (spec §9 "Owned vs. shared FilterBank"). The shared variant never
/// mutates the bank outside a `begin`/`end` bracket.
enum BankRef {
    Owned(FilterBank),
    Shared(Rc<RefCell<FilterBank>>),
}

/// A single polymorphic filter: analog design, discretization, and the bank
/// that runs the resulting cascade chain.
pub struct Filter {
    bank: BankRef,
    params: Option<FilterParams>,
    sample_rate: f32,
    dirty: Dirty,
}

impl Filter {
    /// Allocate an owned filter bank.
    pub fn new() -> Self {
        Self {
            bank: BankRef::Owned(FilterBank::new()),
            params: None,
            sample_rate: crate::math::DEFAULT_SR as f32,
            dirty: Dirty::empty(),
        }
    }

    /// Share an external filter bank (caller owns `begin`/`end` discipline
    /// around rebuilds when sharing across effect-chain filters).
    pub fn with_shared_bank(bank: Rc<RefCell<FilterBank>>) -> Self {
        Self {
            bank: BankRef::Shared(bank),
            params: None,
            sample_rate: crate::math::DEFAULT_SR as f32,
            dirty: Dirty::empty(),
        }
    }

    /// Store new parameters and mark the filter dirty. Recomputation happens
    /// lazily in [`update_settings`], keeping this call allocation-free.
    pub fn update(&mut self, sample_rate: f32, params: FilterParams) {
        let shape_changed = self
            .params
            .map(|old| {
                old.filter_type.shape as u8 != params.filter_type.shape as u8
                    || old.slope != params.slope
            })
            .unwrap_or(true);
        self.sample_rate = sample_rate;
        self.params = Some(params.normalized(sample_rate));
        self.dirty |= Dirty::REBUILD;
        if shape_changed {
            self.dirty |= Dirty::CLEAR;
        }
    }

    /// Recompute the discrete cascade chain if dirty. Idempotent and safe to
    /// call from the audio thread right before the next `process`.
    pub fn update_settings(&mut self) -> Result<()> {
        if !self.dirty.contains(Dirty::REBUILD) {
            return Ok(());
        }
        let params = self.params.ok_or(Error::BadState)?;
        let chain = design(&params, self.sample_rate);
        let clear = self.dirty.contains(Dirty::CLEAR);
        match &mut self.bank {
            BankRef::Owned(bank) => {
                bank.begin();
                for c in chain {
                    bank.add_chain(c);
                }
                bank.end(clear);
            }
            BankRef::Shared(bank) => {
                let mut bank = bank.borrow_mut();
                bank.begin();
                for c in chain {
                    bank.add_chain(c);
                }
                bank.end(clear);
            }
        }
        self.dirty = Dirty::empty();
        Ok(())
    }

    pub fn process(&mut self, dst: &mut [f32], src: &[f32], n: usize) -> Result<()> {
        if dst.len() < n || src.len() < n {
            return Err(Error::bad_args("process buffers shorter than n"));
        }
        self.update_settings()?;
        match &mut self.bank {
            BankRef::Owned(bank) => bank.process(dst, src, n),
            BankRef::Shared(bank) => bank.borrow_mut().process(dst, src, n),
        }
        Ok(())
    }

    fn with_coefs<R>(&self, f: impl FnOnce(&[DiscreteCascade]) -> R) -> R {
        match &self.bank {
            BankRef::Owned(bank) => f(bank.coefs()),
            BankRef::Shared(bank) => f(bank.borrow().coefs()),
        }
    }

    /// Evaluate the transfer function at `n` angular frequencies (as
    /// fractions of the sample rate) into `re`/`im` buffers.
    pub fn freq_chart(&self, re: &mut [f32], im: &mut [f32], f: &[f32], n: usize) -> Result<()> {
        if re.len() < n || im.len() < n || f.len() < n {
            return Err(Error::bad_args("freq_chart buffers shorter than n"));
        }
        self.with_coefs(|coefs| {
            for i in 0..n {
                let mut response = num_complex::Complex32::new(1.0, 0.0);
                for c in coefs {
                    response *= c.response(f[i] / self.sample_rate);
                }
                re[i] = response.re;
                im[i] = response.im;
            }
        });
        Ok(())
    }

    /// Produce `n` samples of the unit impulse response. Only supported when
    /// the bank is owned (spec §4.1): a shared bank may be mutated between
    /// this filter's own `begin`/`end` brackets by a sibling filter.
    pub fn impulse_response(&mut self, out: &mut [f32], n: usize) -> Result<()> {
        if out.len() < n {
            return Err(Error::bad_args("impulse_response buffer shorter than n"));
        }
        if !matches!(self.bank, BankRef::Owned(_)) {
            return Err(Error::BadState);
        }
        self.update_settings()?;
        let mut impulse = vec![0.0f32; n];
        impulse[0] = 1.0;
        if let BankRef::Owned(bank) = &mut self.bank {
            let mut scratch = bank.clone();
            scratch.reset_state();
            scratch.process(out, &impulse, n);
        }
        Ok(())
    }

    pub fn dump(&self, v: &mut dyn crate::dump::StateDumper) {
        v.begin_object("filter");
        v.writei("slope", self.params.map(|p| p.slope as i64).unwrap_or(0));
        v.write("sample_rate", self.sample_rate as f64);
        self.with_coefs(|coefs| v.writei("cascades", coefs.len() as i64));
        v.end_object();
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::params::{FilterType, Prototype, Shape};

    #[test]
    fn bypass_on_unconfigured_filter_is_an_error() {
        let mut f = Filter::new();
        let mut out = [0.0f32; 4];
        let src = [1.0f32; 4];
        assert!(matches!(f.process(&mut out, &src, 4), Err(Error::BadState)));
    }

    #[test]
    fn scenario_a_bwc_lowpass_dc_and_hf() {
        let mut f = Filter::new();
        f.update(
            48000.0,
            FilterParams {
                filter_type: FilterType::new(
                    Prototype::Butterworth,
                    Shape::Lopass,
                    super::super::params::FilterTransform::Bilinear,
                ),
                f1: 1000.0,
                f2: 1000.0,
                gain: 1.0,
                slope: 2,
                quality: 0.7,
            },
        );
        let mut ir = vec![0.0f32; 1024];
        f.impulse_response(&mut ir, 1024).unwrap();
        let dc_sum: f32 = ir.iter().sum();
        assert!((dc_sum - 1.0).abs() < 0.05, "dc sum = {dc_sum}");
    }
}
