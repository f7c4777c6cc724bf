//! L2-RMS gradient normalization.

use ndarray::{Array, Dimension};

use crate::EPSILON;

/// Rescale a tensor to canonical magnitude: `t / (sqrt(mean(t²)) + ε)`.
///
/// Raw gradient magnitudes vary by orders of magnitude across filters and
/// layers; this makes a fixed step size move pixels by a comparable amount
/// everywhere. The ε term guards the all-zero gradient. No other
/// normalization scheme produces the same visual output.
pub fn rms_normalize<D: Dimension>(mut t: Array<f32, D>) -> Array<f32, D> {
    if t.is_empty() {
        return t;
    }
    let mean_square = t.iter().map(|v| v * v).sum::<f32>() / t.len() as f32;
    let denom = mean_square.sqrt() + EPSILON;
    t.mapv_inplace(|v| v / denom);
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn unit_rms_after_normalization() {
        let t = rms_normalize(arr1(&[3.0f32, -4.0, 0.0, 0.0]));
        let rms = (t.iter().map(|v| v * v).sum::<f32>() / t.len() as f32).sqrt();
        assert!((rms - 1.0).abs() < 1e-4);
    }

    #[test]
    fn scale_covariant_up_to_epsilon() {
        let base = arr1(&[0.5f32, -1.5, 2.5, 0.25]);
        let reference = rms_normalize(base.clone());
        // normalize(k·t) ≈ sign(k) · normalize(t) for |k| large relative to ε
        for k in [2.0f32, -3.0, 1000.0, 0.001] {
            let scaled = rms_normalize(base.mapv(|v| v * k));
            for (a, b) in scaled.iter().zip(reference.iter()) {
                assert!((a - b * k.signum()).abs() < 1e-3, "k = {k}");
            }
        }
    }

    #[test]
    fn zero_tensor_stays_finite() {
        let t = rms_normalize(arr1(&[0.0f32; 8]));
        assert!(t.iter().all(|v| v.is_finite()));
        assert!(t.iter().all(|v| *v == 0.0));
    }
}
