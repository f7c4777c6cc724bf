//! Gradient-ascent engine: RMS gradient normalization and the per-filter
//! ascent driver.

mod driver;
mod normalize;

pub use driver::{AscentDriver, FilterResult};
pub use normalize::rms_normalize;
