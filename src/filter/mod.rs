//! Biquad filter bank and dynamic (per-sample modulated) filter bank.

mod bank;
mod cascade;
mod design;
mod dynamic;
mod filter;
mod params;

pub use bank::FilterBank;
pub use cascade::{DiscreteCascade, FILTER_CHAINS_MAX};
pub use design::design;
pub use dynamic::DynamicFilters;
pub use filter::Filter;
pub use params::{FilterParams, FilterTransform, FilterType, Prototype, Shape, WeightingCurve};
