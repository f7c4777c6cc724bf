//! Deterministic conversion of an optimized tensor into a byte image.

use ndarray::Array3;

use crate::EPSILON;

/// Map a raw [height, width, channels] float tensor to unsigned bytes.
///
/// The steps run in a fixed order, each feeding the next: center on the
/// global mean; divide by (standard deviation + ε) and scale the spread to
/// 0.1; shift by +0.5 into mid-range; clip to [0, 1]; scale by 255; clip to
/// [0, 255] and truncate. The ε term makes a zero-variance tensor land on
/// mid-gray instead of dividing by zero. Channels stay in place; the
/// channels-last convention needs no reordering.
pub fn deprocess(tensor: &Array3<f32>) -> Array3<u8> {
    if tensor.is_empty() {
        return Array3::zeros(tensor.dim());
    }
    let count = tensor.len() as f32;
    let mean = tensor.sum() / count;
    let variance = tensor
        .iter()
        .map(|v| {
            let diff = v - mean;
            diff * diff
        })
        .sum::<f32>()
        / count;
    let std = variance.sqrt();

    tensor.mapv(|v| {
        let rescaled = (v - mean) / (std + EPSILON) * 0.1;
        let shifted = (rescaled + 0.5).clamp(0.0, 1.0);
        (shifted * 255.0).clamp(0.0, 255.0) as u8
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn deterministic_for_identical_input() {
        let mut tensor = Array3::zeros((3, 4, 3));
        for (idx, value) in tensor.iter_mut().enumerate() {
            *value = (idx as f32) * 0.37 - 2.0;
        }
        assert_eq!(deprocess(&tensor), deprocess(&tensor.clone()));
    }

    #[test]
    fn preserves_shape_and_byte_range() {
        let tensor = Array3::from_shape_fn((5, 7, 3), |(h, w, c)| {
            (h * 31 + w * 7 + c) as f32 * 13.7 - 100.0
        });
        let image = deprocess(&tensor);
        assert_eq!(image.dim(), (5, 7, 3));
        // u8 covers [0, 255] by construction; check the spread is used.
        assert!(image.iter().any(|v| *v < 128));
        assert!(image.iter().any(|v| *v >= 128));
    }

    #[test]
    fn zero_variance_input_maps_to_mid_gray() {
        let tensor = Array3::from_elem((4, 4, 3), 123.456);
        let image = deprocess(&tensor);
        for value in image.iter() {
            assert_eq!(*value, 127);
        }
    }

    #[test]
    fn output_centers_around_mid_range() {
        // Symmetric input: mean maps to 0.5, so bytes straddle 127.
        let tensor =
            Array3::from_shape_vec((1, 2, 1), vec![-1.0, 1.0]).unwrap();
        let image = deprocess(&tensor);
        assert!(image[[0, 0, 0]] < 128);
        assert!(image[[0, 1, 0]] > 127);
        let sum = image[[0, 0, 0]] as i32 + image[[0, 1, 0]] as i32;
        assert!((sum - 255).abs() <= 1);
    }

    #[test]
    fn outliers_saturate_at_clip_bounds() {
        // Two extreme outliers against a flat background push past the
        // [0, 1] clip on both sides.
        let mut values = vec![0.0f32; 49];
        values.push(1000.0);
        values.push(-1000.0);
        let tensor = Array3::from_shape_vec((51, 1, 1), values).unwrap();
        let image = deprocess(&tensor);
        assert_eq!(image[[49, 0, 0]], 255);
        assert_eq!(image[[50, 0, 0]], 0);
    }
}
