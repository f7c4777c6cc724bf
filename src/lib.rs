//! # Filter Visualizer
//!
//! A diagnostic engine that shows what individual 2-D convolutional filters
//! of a trained network respond to. For each filter it synthesizes an input
//! image by gradient ascent on the filter's mean activation, then converts
//! the optimized tensor into a displayable RGB image.
//!
//! ## Quick Start
//!
//! ```no_run
//! use filter_visualizer::{load_model, visualize_model, AscentConfig};
//! use std::path::Path;
//!
//! let model = load_model("model.json").unwrap();
//! let config = AscentConfig::default();
//! let written = visualize_model(&model, Path::new("out"), &config).unwrap();
//! println!("wrote {} filter images", written);
//! ```
//!
//! ## Core Modules
//!
//! - [`config`] - Ascent configuration via TOML
//! - [`model`] - JSON model format, layer kinds, nested-model flattening
//! - [`graph`] - Channels-last evaluation backend and gradient provider
//! - [`ascent`] - Per-filter gradient-ascent driver and normalization
//! - [`postprocess`] - Tensor-to-byte-image conversion
//! - [`logging`] - JSON line-delimited event logging

pub mod ascent;
pub mod config;
pub mod graph;
pub mod logging;
pub mod model;
pub mod output;
pub mod postprocess;
pub mod visualize;

pub use ascent::{rms_normalize, AscentDriver, FilterResult};
pub use config::AscentConfig;
pub use graph::{GraphError, LayerGradientProvider, LossGradient};
pub use model::{load_model, Activation, Layer, LayerKind, Model, ModelError, Padding};
pub use postprocess::deprocess;
pub use visualize::{visualize_model, VisualizeError};

/// Numeric stability constant shared by gradient normalization and image
/// post-processing.
pub const EPSILON: f32 = 1e-7;
