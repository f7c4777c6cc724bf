//! Flat layer representation with a closed set of layer kinds.

use ndarray::{Array1, Array4};

/// Activation fused into a convolution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Linear,
    Relu,
}

/// Spatial padding scheme for convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    Valid,
    Same,
}

/// One layer of the flattened network graph.
#[derive(Debug, Clone)]
pub struct Layer {
    /// Layer name; restricted to 7-bit printable characters so it can be
    /// embedded in output filenames.
    pub name: String,
    pub kind: LayerKind,
}

/// Closed set of layer kinds the evaluation backend understands.
///
/// Dispatch is an exhaustive match on this enum rather than a type-name
/// string lookup.
#[derive(Debug, Clone)]
pub enum LayerKind {
    Conv2D {
        /// Kernel weights, [kernel_h, kernel_w, in_channels, out_channels].
        /// The trailing dimension is the authoritative filter count.
        weights: Array4<f32>,
        /// Per-filter bias, length equal to the filter count.
        bias: Array1<f32>,
        activation: Activation,
        padding: Padding,
        /// (stride_h, stride_w), both at least 1.
        strides: (usize, usize),
    },
    MaxPool2D {
        /// (pool_h, pool_w); the stride equals the pool size.
        pool: (usize, usize),
    },
}

impl Layer {
    /// Whether activation maximization applies to this layer kind.
    pub fn supports_maximization(&self) -> bool {
        matches!(self.kind, LayerKind::Conv2D { .. })
    }

    /// Number of output filters, taken from the weight tensor's trailing
    /// dimension. Zero for kinds without filters.
    pub fn filter_count(&self) -> usize {
        match &self.kind {
            LayerKind::Conv2D { weights, .. } => weights.dim().3,
            LayerKind::MaxPool2D { .. } => 0,
        }
    }
}
