//! Timestamped PNG output for kept filters.

use std::path::{Path, PathBuf};

use chrono::Local;
use image::{Rgb, RgbImage};
use ndarray::Array3;

use crate::ascent::FilterResult;

/// Current local time as `YYYY-MM-DD_HH_MM_SS_ffffff`. Microsecond
/// resolution keeps rapidly written filenames unique.
pub fn timestamp_micros() -> String {
    let now = Local::now();
    format!(
        "{}_{:06}",
        now.format("%Y-%m-%d_%H_%M_%S"),
        now.timestamp_subsec_micros()
    )
}

/// Output path for one kept filter:
/// `{out_dir}/{timestamp}_{layer}_{filter}_{loss}.png`.
pub fn result_path(out_dir: &Path, layer: &str, filter: usize, loss: f32) -> PathBuf {
    out_dir.join(format!(
        "{}_{}_{}_{}.png",
        timestamp_micros(),
        layer,
        filter,
        loss
    ))
}

/// Encode a filter result as a PNG in the output directory.
///
/// The directory must already exist and be writable; it is never created
/// here. Single-channel images are replicated to gray RGB so every output
/// file is a 3-channel raster.
pub fn write_result(
    out_dir: &Path,
    layer: &str,
    filter: usize,
    result: &FilterResult,
) -> Result<PathBuf, OutputError> {
    let path = result_path(out_dir, layer, filter, result.loss);
    let image = to_rgb(&result.image)?;
    image
        .save(&path)
        .map_err(|err| OutputError::Encode(err.to_string()))?;
    Ok(path)
}

fn to_rgb(pixels: &Array3<u8>) -> Result<RgbImage, OutputError> {
    let (height, width, channels) = pixels.dim();
    match channels {
        1 => Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let v = pixels[[y as usize, x as usize, 0]];
            Rgb([v, v, v])
        })),
        3 => Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
            let (h, w) = (y as usize, x as usize);
            Rgb([pixels[[h, w, 0]], pixels[[h, w, 1]], pixels[[h, w, 2]]])
        })),
        other => Err(OutputError::UnsupportedChannels(other)),
    }
}

#[derive(Debug)]
pub enum OutputError {
    Io(std::io::Error),
    Encode(String),
    UnsupportedChannels(usize),
}

impl std::fmt::Display for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputError::Io(err) => write!(f, "IO error: {}", err),
            OutputError::Encode(err) => write!(f, "PNG encoding failed: {}", err),
            OutputError::UnsupportedChannels(channels) => {
                write!(f, "cannot encode an image with {} channels", channels)
            }
        }
    }
}

impl std::error::Error for OutputError {}

impl From<std::io::Error> for OutputError {
    fn from(value: std::io::Error) -> Self {
        OutputError::Io(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn path_embeds_layer_filter_and_loss() {
        let path = result_path(Path::new("/tmp/out"), "conv_1", 7, 1.25);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.ends_with("_conv_1_7_1.25.png"), "got {name}");
    }

    #[test]
    fn timestamp_has_microsecond_field() {
        let stamp = timestamp_micros();
        // YYYY-MM-DD_HH_MM_SS_ffffff
        let parts: Vec<&str> = stamp.split('_').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[4].len(), 6);
        assert!(parts[4].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn gray_images_replicate_to_three_channels() {
        let mut pixels = Array3::zeros((2, 2, 1));
        pixels[[0, 1, 0]] = 200u8;
        let rgb = to_rgb(&pixels).unwrap();
        assert_eq!(rgb.get_pixel(1, 0).0, [200, 200, 200]);
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn rgb_channels_stay_in_place() {
        let pixels =
            Array3::from_shape_vec((1, 1, 3), vec![10u8, 20, 30]).unwrap();
        let rgb = to_rgb(&pixels).unwrap();
        assert_eq!(rgb.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn unsupported_channel_count_is_rejected() {
        let pixels: Array3<u8> = Array3::zeros((1, 1, 4));
        assert!(matches!(
            to_rgb(&pixels),
            Err(OutputError::UnsupportedChannels(4))
        ));
    }
}
