//! Forward and input-gradient kernels for the supported layer kinds.
//!
//! All kernels assume the channels-last convention: [batch, height, width,
//! channel] for activations and [kernel_h, kernel_w, in_channels,
//! out_channels] for convolution weights.

use ndarray::{Array1, Array4, Axis};
use rayon::prelude::*;

use super::GraphError;
use crate::model::Padding;

type Dim4 = (usize, usize, usize, usize);

/// Output spatial size and top/left padding for a convolution.
fn conv_geometry(
    in_h: usize,
    in_w: usize,
    kh: usize,
    kw: usize,
    strides: (usize, usize),
    padding: Padding,
) -> Result<(usize, usize, usize, usize), GraphError> {
    let (sh, sw) = strides;
    match padding {
        Padding::Valid => {
            if in_h < kh || in_w < kw {
                return Err(GraphError::shape(format!(
                    "input {}x{} smaller than kernel {}x{} with valid padding",
                    in_h, in_w, kh, kw
                )));
            }
            Ok(((in_h - kh) / sh + 1, (in_w - kw) / sw + 1, 0, 0))
        }
        Padding::Same => {
            let out_h = (in_h + sh - 1) / sh;
            let out_w = (in_w + sw - 1) / sw;
            let pad_h = ((out_h - 1) * sh + kh).saturating_sub(in_h);
            let pad_w = ((out_w - 1) * sw + kw).saturating_sub(in_w);
            Ok((out_h, out_w, pad_h / 2, pad_w / 2))
        }
    }
}

/// Convolution forward pass, pre-activation.
pub(crate) fn conv2d_forward(
    input: &Array4<f32>,
    weights: &Array4<f32>,
    bias: &Array1<f32>,
    padding: Padding,
    strides: (usize, usize),
) -> Result<Array4<f32>, GraphError> {
    let (batch, in_h, in_w, in_c) = input.dim();
    let (kh, kw, w_in_c, out_c) = weights.dim();
    if in_c != w_in_c {
        return Err(GraphError::shape(format!(
            "input has {} channels but weights expect {}",
            in_c, w_in_c
        )));
    }
    let (sh, sw) = strides;
    let (out_h, out_w, pad_top, pad_left) = conv_geometry(in_h, in_w, kh, kw, strides, padding)?;

    let mut output = Array4::zeros((batch, out_h, out_w, out_c));
    output
        .axis_iter_mut(Axis(1))
        .enumerate()
        .par_bridge()
        .for_each(|(oh, mut row)| {
            for b in 0..batch {
                for ow in 0..out_w {
                    for f in 0..out_c {
                        let mut acc = bias[f];
                        for r in 0..kh {
                            let ih = (oh * sh + r) as isize - pad_top as isize;
                            if ih < 0 || ih >= in_h as isize {
                                continue;
                            }
                            for c in 0..kw {
                                let iw = (ow * sw + c) as isize - pad_left as isize;
                                if iw < 0 || iw >= in_w as isize {
                                    continue;
                                }
                                for ic in 0..in_c {
                                    acc += input[[b, ih as usize, iw as usize, ic]]
                                        * weights[[r, c, ic, f]];
                                }
                            }
                        }
                        row[[b, ow, f]] = acc;
                    }
                }
            }
        });
    Ok(output)
}

/// Gradient of a scalar loss w.r.t. the convolution input, given the loss
/// gradient w.r.t. the pre-activation output.
pub(crate) fn conv2d_input_gradient(
    grad_output: &Array4<f32>,
    weights: &Array4<f32>,
    input_dim: Dim4,
    padding: Padding,
    strides: (usize, usize),
) -> Result<Array4<f32>, GraphError> {
    let (batch, in_h, in_w, in_c) = input_dim;
    let (kh, kw, _, out_c) = weights.dim();
    let (sh, sw) = strides;
    let (out_h, out_w, pad_top, pad_left) = conv_geometry(in_h, in_w, kh, kw, strides, padding)?;
    if grad_output.dim() != (batch, out_h, out_w, out_c) {
        return Err(GraphError::shape(format!(
            "output gradient shape {:?} does not match expected {:?}",
            grad_output.dim(),
            (batch, out_h, out_w, out_c)
        )));
    }

    let mut grad_input = Array4::zeros(input_dim);
    grad_input
        .axis_iter_mut(Axis(1))
        .enumerate()
        .par_bridge()
        .for_each(|(ih, mut row)| {
            for b in 0..batch {
                for iw in 0..in_w {
                    for ic in 0..in_c {
                        let mut acc = 0.0f32;
                        for oh in 0..out_h {
                            let r = ih as isize + pad_top as isize - (oh * sh) as isize;
                            if r < 0 || r >= kh as isize {
                                continue;
                            }
                            for ow in 0..out_w {
                                let c = iw as isize + pad_left as isize - (ow * sw) as isize;
                                if c < 0 || c >= kw as isize {
                                    continue;
                                }
                                for f in 0..out_c {
                                    acc += grad_output[[b, oh, ow, f]]
                                        * weights[[r as usize, c as usize, ic, f]];
                                }
                            }
                        }
                        row[[b, iw, ic]] = acc;
                    }
                }
            }
        });
    Ok(grad_input)
}

/// Rectified linear activation.
pub(crate) fn relu(mut z: Array4<f32>) -> Array4<f32> {
    z.as_slice_mut()
        .expect("ndarray uses contiguous layout")
        .par_iter_mut()
        .for_each(|v| {
            if *v < 0.0 {
                *v = 0.0;
            }
        });
    z
}

/// Zero the gradient where the forward pre-activation was non-positive.
pub(crate) fn relu_mask(mut grad: Array4<f32>, preact: &Array4<f32>) -> Array4<f32> {
    grad.as_slice_mut()
        .expect("ndarray uses contiguous layout")
        .par_iter_mut()
        .zip(
            preact
                .as_slice()
                .expect("ndarray uses contiguous layout")
                .par_iter(),
        )
        .for_each(|(g, z)| {
            if *z <= 0.0 {
                *g = 0.0;
            }
        });
    grad
}

/// Max-pooling forward pass. Returns the pooled output and, per output
/// cell, the flat (row-major) spatial index of the winning input element,
/// needed to route the gradient back.
pub(crate) fn maxpool_forward(
    input: &Array4<f32>,
    pool: (usize, usize),
) -> Result<(Array4<f32>, Array4<usize>), GraphError> {
    let (batch, in_h, in_w, channels) = input.dim();
    let (ph, pw) = pool;
    if in_h < ph || in_w < pw {
        return Err(GraphError::shape(format!(
            "input {}x{} smaller than pool window {}x{}",
            in_h, in_w, ph, pw
        )));
    }
    let out_h = (in_h - ph) / ph + 1;
    let out_w = (in_w - pw) / pw + 1;

    let mut output = Array4::zeros((batch, out_h, out_w, channels));
    let mut argmax = Array4::zeros((batch, out_h, out_w, channels));
    for b in 0..batch {
        for oh in 0..out_h {
            for ow in 0..out_w {
                for c in 0..channels {
                    let mut best = f32::NEG_INFINITY;
                    let mut best_idx = 0usize;
                    for r in 0..ph {
                        for s in 0..pw {
                            let ih = oh * ph + r;
                            let iw = ow * pw + s;
                            let value = input[[b, ih, iw, c]];
                            if value > best {
                                best = value;
                                best_idx = ih * in_w + iw;
                            }
                        }
                    }
                    output[[b, oh, ow, c]] = best;
                    argmax[[b, oh, ow, c]] = best_idx;
                }
            }
        }
    }
    Ok((output, argmax))
}

/// Route the pooled gradient back to each window's winning element. Windows
/// never overlap (stride equals pool size), so the scatter is conflict-free.
pub(crate) fn maxpool_input_gradient(
    grad_output: &Array4<f32>,
    argmax: &Array4<usize>,
    input_dim: Dim4,
) -> Array4<f32> {
    let (batch, _, in_w, _) = input_dim;
    let (_, out_h, out_w, channels) = grad_output.dim();
    let mut grad_input = Array4::zeros(input_dim);
    for b in 0..batch {
        for oh in 0..out_h {
            for ow in 0..out_w {
                for c in 0..channels {
                    let idx = argmax[[b, oh, ow, c]];
                    grad_input[[b, idx / in_w, idx % in_w, c]] += grad_output[[b, oh, ow, c]];
                }
            }
        }
    }
    grad_input
}
