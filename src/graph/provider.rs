//! Loss and input-gradient evaluation over a layer prefix.

use ndarray::{Array4, Axis};

use super::ops;
use super::GraphError;
use crate::model::{Activation, Layer, LayerKind, Padding};

type Dim4 = (usize, usize, usize, usize);

/// Loss value and input gradient at a concrete input tensor.
///
/// The ascent driver is generic over this seam, so tests can substitute
/// synthetic providers with prescribed loss behavior.
pub trait LossGradient {
    /// Returns `(loss, gradient)`; the gradient has the input's shape.
    fn evaluate(&self, input: &Array4<f32>) -> Result<(f32, Array4<f32>), GraphError>;
}

/// Evaluates the spatial mean activation of one filter at the end of a
/// layer prefix, together with its gradient with respect to the input, by
/// caching the forward pass and traversing it in reverse.
pub struct LayerGradientProvider<'a> {
    layers: &'a [Layer],
    filter: usize,
}

/// Per-layer forward state retained for the backward traversal.
enum Cache<'w> {
    Conv {
        input_dim: Dim4,
        preact: Array4<f32>,
        weights: &'w Array4<f32>,
        activation: Activation,
        padding: Padding,
        strides: (usize, usize),
    },
    Pool {
        input_dim: Dim4,
        argmax: Array4<usize>,
    },
}

impl<'a> LayerGradientProvider<'a> {
    /// `layers` must end with the target layer; `filter` indexes its output
    /// channels, bounded by the weight tensor's trailing dimension.
    pub fn new(layers: &'a [Layer], filter: usize) -> Result<Self, GraphError> {
        let target = layers.last().ok_or(GraphError::EmptyPrefix)?;
        let count = target.filter_count();
        if filter >= count {
            return Err(GraphError::FilterOutOfRange {
                layer: target.name.clone(),
                filter,
                count,
            });
        }
        Ok(Self { layers, filter })
    }
}

impl LossGradient for LayerGradientProvider<'_> {
    fn evaluate(&self, input: &Array4<f32>) -> Result<(f32, Array4<f32>), GraphError> {
        let mut caches: Vec<Cache> = Vec::with_capacity(self.layers.len());
        let mut current = input.clone();

        for layer in self.layers {
            match &layer.kind {
                LayerKind::Conv2D {
                    weights,
                    bias,
                    activation,
                    padding,
                    strides,
                } => {
                    let input_dim = current.dim();
                    let preact =
                        ops::conv2d_forward(&current, weights, bias, *padding, *strides)
                            .map_err(|err| err.in_layer(&layer.name))?;
                    current = match activation {
                        Activation::Relu => ops::relu(preact.clone()),
                        Activation::Linear => preact.clone(),
                    };
                    caches.push(Cache::Conv {
                        input_dim,
                        preact,
                        weights,
                        activation: *activation,
                        padding: *padding,
                        strides: *strides,
                    });
                }
                LayerKind::MaxPool2D { pool } => {
                    let input_dim = current.dim();
                    let (output, argmax) = ops::maxpool_forward(&current, *pool)
                        .map_err(|err| err.in_layer(&layer.name))?;
                    current = output;
                    caches.push(Cache::Pool { input_dim, argmax });
                }
            }
        }

        // Loss: mean over every activation of the target filter's feature map.
        let (batch, out_h, out_w, _) = current.dim();
        let cells = (batch * out_h * out_w) as f32;
        let loss = current.index_axis(Axis(3), self.filter).sum() / cells;

        // Seed the output gradient and walk the cached layers in reverse.
        let mut grad = Array4::zeros(current.dim());
        grad.index_axis_mut(Axis(3), self.filter).fill(1.0 / cells);

        for cache in caches.iter().rev() {
            grad = match cache {
                Cache::Conv {
                    input_dim,
                    preact,
                    weights,
                    activation,
                    padding,
                    strides,
                } => {
                    let grad_z = match activation {
                        Activation::Relu => ops::relu_mask(grad, preact),
                        Activation::Linear => grad,
                    };
                    ops::conv2d_input_gradient(&grad_z, weights, *input_dim, *padding, *strides)?
                }
                Cache::Pool { input_dim, argmax } => {
                    ops::maxpool_input_gradient(&grad, argmax, *input_dim)
                }
            };
        }

        Ok((loss, grad))
    }
}
