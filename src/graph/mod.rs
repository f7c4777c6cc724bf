//! Channels-last float32 evaluation backend.
//!
//! `ops` holds the forward and input-gradient kernels; `provider` composes
//! them into a loss/gradient evaluation over a layer prefix.

pub(crate) mod ops;
mod provider;

pub use provider::{LayerGradientProvider, LossGradient};

/// Errors from the evaluation backend. These indicate a structural mismatch
/// between a layer and the engine's assumptions, never legitimate model
/// behavior, so callers propagate them instead of skipping.
#[derive(Debug)]
pub enum GraphError {
    /// The layer prefix handed to the provider was empty.
    EmptyPrefix,
    /// The requested filter index exceeds the layer's filter count.
    FilterOutOfRange {
        layer: String,
        filter: usize,
        count: usize,
    },
    /// A tensor did not have the shape a kernel requires.
    ShapeMismatch { layer: String, detail: String },
}

impl GraphError {
    pub(crate) fn shape(detail: String) -> Self {
        GraphError::ShapeMismatch {
            layer: String::new(),
            detail,
        }
    }

    pub(crate) fn in_layer(mut self, name: &str) -> Self {
        if let GraphError::ShapeMismatch { layer, .. } = &mut self {
            if layer.is_empty() {
                *layer = name.to_string();
            }
        }
        self
    }
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::EmptyPrefix => write!(f, "layer prefix is empty"),
            GraphError::FilterOutOfRange {
                layer,
                filter,
                count,
            } => write!(
                f,
                "filter {} out of range for layer {:?} with {} filters",
                filter, layer, count
            ),
            GraphError::ShapeMismatch { layer, detail } => {
                write!(f, "shape mismatch in layer {:?}: {}", layer, detail)
            }
        }
    }
}

impl std::error::Error for GraphError {}
