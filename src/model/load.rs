//! JSON model loading, backend precondition checks, and flattening of
//! nested sub-models into an immutable flat layer list.
//!
//! The file format is a header (float type, data layout, input shape) plus
//! a layer list. `Model` and `Sequential` entries carry their own nested
//! `layers`, which are spliced into the top-level traversal.

use std::fs;
use std::path::Path;

use ndarray::{Array1, Array4};
use serde::Deserialize;

use super::layer::{Activation, Layer, LayerKind, Padding};

/// A loaded model: metadata header plus a flat, immutable layer list.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    /// Expected input spatial shape (height, width, channels).
    pub input_shape: (usize, usize, usize),
    pub layers: Vec<Layer>,
}

#[derive(Debug, Deserialize)]
struct ModelFile {
    #[serde(default)]
    name: String,
    float_type: String,
    data_format: String,
    input_shape: [usize; 3],
    layers: Vec<LayerSpec>,
}

#[derive(Debug, Deserialize)]
struct LayerSpec {
    #[serde(rename = "type")]
    layer_type: String,
    #[serde(default)]
    name: String,
    /// Nested sub-model layers for `Model` / `Sequential` entries.
    #[serde(default)]
    layers: Vec<LayerSpec>,
    weights: Option<WeightsSpec>,
    bias: Option<Vec<f32>>,
    activation: Option<String>,
    padding: Option<String>,
    strides: Option<[usize; 2]>,
    pool_size: Option<[usize; 2]>,
}

#[derive(Debug, Deserialize)]
struct WeightsSpec {
    /// [kernel_h, kernel_w, in_channels, out_channels]
    shape: [usize; 4],
    data: Vec<f32>,
}

/// Load a model from a JSON file.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Model, ModelError> {
    let contents = fs::read_to_string(&path)?;
    Model::from_json(&contents)
}

impl Model {
    /// Parse a model from JSON text.
    ///
    /// Checks the backend preconditions once, up front: 32-bit floats,
    /// channels-last layout, and printable-ASCII layer names. Any violation
    /// is fatal for the whole run.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let file: ModelFile =
            serde_json::from_str(json).map_err(|err| ModelError::Parse(err.to_string()))?;

        if file.float_type != "float32" {
            return Err(ModelError::UnsupportedPrecision(file.float_type));
        }
        if file.data_format != "channels_last" {
            return Err(ModelError::UnsupportedLayout(file.data_format));
        }

        let layers = flatten_layers(&file.layers)?;
        for layer in &layers {
            if !is_printable_ascii(&layer.name) {
                return Err(ModelError::NonAsciiName(layer.name.clone()));
            }
        }

        let [h, w, c] = file.input_shape;
        if h == 0 || w == 0 || c == 0 {
            return Err(ModelError::BadShape {
                layer: file.name,
                detail: format!("input shape {:?} has a zero dimension", file.input_shape),
            });
        }

        Ok(Model {
            name: file.name,
            input_shape: (h, w, c),
            layers,
        })
    }
}

/// Produce a new flat layer list, recursing into nested sub-models.
///
/// Pure with respect to its input: the source list is never mutated, so a
/// sub-model referenced from multiple parents flattens identically each time.
fn flatten_layers(specs: &[LayerSpec]) -> Result<Vec<Layer>, ModelError> {
    let mut flat = Vec::new();
    for spec in specs {
        match spec.layer_type.as_str() {
            "Model" | "Sequential" => {
                flat.extend(flatten_layers(&spec.layers)?);
            }
            "InputLayer" => {}
            "Conv2D" => flat.push(build_conv(spec)?),
            "MaxPooling2D" => flat.push(build_pool(spec)?),
            other => {
                return Err(ModelError::UnsupportedLayer {
                    layer: spec.name.clone(),
                    kind: other.to_string(),
                });
            }
        }
    }
    Ok(flat)
}

fn build_conv(spec: &LayerSpec) -> Result<Layer, ModelError> {
    let weights = spec.weights.as_ref().ok_or_else(|| ModelError::BadShape {
        layer: spec.name.clone(),
        detail: "convolution layer has no weights".to_string(),
    })?;

    let [kh, kw, in_c, out_c] = weights.shape;
    let expected = kh * kw * in_c * out_c;
    if expected == 0 || weights.data.len() != expected {
        return Err(ModelError::BadShape {
            layer: spec.name.clone(),
            detail: format!(
                "weight shape {:?} does not match {} data values",
                weights.shape,
                weights.data.len()
            ),
        });
    }
    let weights = Array4::from_shape_vec((kh, kw, in_c, out_c), weights.data.clone())
        .map_err(|err| ModelError::BadShape {
            layer: spec.name.clone(),
            detail: err.to_string(),
        })?;

    let bias = match &spec.bias {
        Some(values) => {
            if values.len() != out_c {
                return Err(ModelError::BadShape {
                    layer: spec.name.clone(),
                    detail: format!("bias length {} != {} filters", values.len(), out_c),
                });
            }
            Array1::from_vec(values.clone())
        }
        None => Array1::zeros(out_c),
    };

    let activation = match spec.activation.as_deref() {
        None | Some("linear") => Activation::Linear,
        Some("relu") => Activation::Relu,
        Some(other) => {
            return Err(ModelError::UnsupportedActivation {
                layer: spec.name.clone(),
                activation: other.to_string(),
            });
        }
    };

    let padding = match spec.padding.as_deref() {
        None | Some("valid") => Padding::Valid,
        Some("same") => Padding::Same,
        Some(other) => {
            return Err(ModelError::BadShape {
                layer: spec.name.clone(),
                detail: format!("unknown padding {:?}", other),
            });
        }
    };

    let strides = spec.strides.unwrap_or([1, 1]);
    if strides[0] == 0 || strides[1] == 0 {
        return Err(ModelError::BadShape {
            layer: spec.name.clone(),
            detail: "strides must be at least 1".to_string(),
        });
    }

    Ok(Layer {
        name: spec.name.clone(),
        kind: LayerKind::Conv2D {
            weights,
            bias,
            activation,
            padding,
            strides: (strides[0], strides[1]),
        },
    })
}

fn build_pool(spec: &LayerSpec) -> Result<Layer, ModelError> {
    let pool = spec.pool_size.unwrap_or([2, 2]);
    if pool[0] == 0 || pool[1] == 0 {
        return Err(ModelError::BadShape {
            layer: spec.name.clone(),
            detail: "pool size must be at least 1".to_string(),
        });
    }
    Ok(Layer {
        name: spec.name.clone(),
        kind: LayerKind::MaxPool2D {
            pool: (pool[0], pool[1]),
        },
    })
}

fn is_printable_ascii(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_graphic() || c == ' ')
}

#[derive(Debug)]
pub enum ModelError {
    Io(std::io::Error),
    Parse(String),
    UnsupportedPrecision(String),
    UnsupportedLayout(String),
    UnsupportedLayer { layer: String, kind: String },
    UnsupportedActivation { layer: String, activation: String },
    NonAsciiName(String),
    BadShape { layer: String, detail: String },
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Io(err) => write!(f, "IO error: {}", err),
            ModelError::Parse(err) => write!(f, "Parse error: {}", err),
            ModelError::UnsupportedPrecision(float_type) => {
                write!(f, "unsupported float type {:?}, expected float32", float_type)
            }
            ModelError::UnsupportedLayout(format) => {
                write!(f, "unsupported data format {:?}, expected channels_last", format)
            }
            ModelError::UnsupportedLayer { layer, kind } => {
                write!(f, "layer {:?} has unsupported kind {:?}", layer, kind)
            }
            ModelError::UnsupportedActivation { layer, activation } => {
                write!(f, "layer {:?} has unsupported activation {:?}", layer, activation)
            }
            ModelError::NonAsciiName(name) => {
                write!(f, "layer name {:?} is not printable ASCII", name)
            }
            ModelError::BadShape { layer, detail } => {
                write!(f, "layer {:?}: {}", layer, detail)
            }
        }
    }
}

impl std::error::Error for ModelError {}

impl From<std::io::Error> for ModelError {
    fn from(value: std::io::Error) -> Self {
        ModelError::Io(value)
    }
}
