//! Layer walk and per-filter dispatch.
//!
//! Walks the flattened layer list, routes every layer that supports
//! activation maximization to the ascent driver once per filter, and writes
//! each kept result to the output directory. Filters run strictly
//! sequentially; no state is shared between them.

use std::path::Path;

use serde_json::json;

use crate::ascent::AscentDriver;
use crate::config::AscentConfig;
use crate::graph::{GraphError, LayerGradientProvider};
use crate::logging;
use crate::model::Model;
use crate::output::{self, OutputError};

/// Visualize every eligible filter of the model, writing one PNG per kept
/// filter into `out_dir`. Returns the number of images written.
///
/// Dead filters (non-positive loss during ascent) are logged and skipped;
/// backend computation errors abort the run.
pub fn visualize_model(
    model: &Model,
    out_dir: &Path,
    config: &AscentConfig,
) -> Result<usize, VisualizeError> {
    let driver = AscentDriver::new(config.clone());
    let mut written = 0usize;

    for (index, layer) in model.layers.iter().enumerate() {
        if !layer.supports_maximization() {
            continue;
        }
        let filters = layer.filter_count();
        println!("Processing layer {} with {} filters", layer.name, filters);
        logging::log_or_warn(
            "layer_started",
            &json!({ "layer": layer.name, "filters": filters }),
        );

        let prefix = &model.layers[..=index];
        for filter in 0..filters {
            println!("Processing filter {}", filter);
            let provider = LayerGradientProvider::new(prefix, filter)?;
            let seed = filter_seed(config.seed, index, filter);

            match driver.maximize(&provider, model.input_shape, seed)? {
                Some(result) => {
                    let path = output::write_result(out_dir, &layer.name, filter, &result)?;
                    logging::log_or_warn(
                        "filter_kept",
                        &json!({
                            "layer": layer.name,
                            "filter": filter,
                            "loss": result.loss,
                            "path": path.display().to_string(),
                        }),
                    );
                    written += 1;
                }
                None => {
                    println!("Skipping filter {} of layer {}", filter, layer.name);
                    logging::log_or_warn(
                        "filter_skipped",
                        &json!({ "layer": layer.name, "filter": filter }),
                    );
                }
            }
        }
    }
    Ok(written)
}

/// Independent noise seed per (layer, filter) pair so reruns are
/// reproducible while filters start from distinct noise.
fn filter_seed(base: u64, layer_index: usize, filter: usize) -> u64 {
    base ^ ((layer_index as u64) << 32) ^ ((filter as u64).wrapping_mul(0x9E37_79B9))
}

#[derive(Debug)]
pub enum VisualizeError {
    Graph(GraphError),
    Output(OutputError),
}

impl std::fmt::Display for VisualizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisualizeError::Graph(err) => write!(f, "graph evaluation failed: {}", err),
            VisualizeError::Output(err) => write!(f, "image output failed: {}", err),
        }
    }
}

impl std::error::Error for VisualizeError {}

impl From<GraphError> for VisualizeError {
    fn from(value: GraphError) -> Self {
        VisualizeError::Graph(value)
    }
}

impl From<OutputError> for VisualizeError {
    fn from(value: OutputError) -> Self {
        VisualizeError::Output(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use std::fs;

    fn tiny_model_json() -> String {
        // One 1x1 conv with a positive and a negative filter on a 4x4
        // gray input: filter 0 keeps a positive loss, filter 1 dies at the
        // first evaluation.
        r#"{
            "name": "tiny",
            "float_type": "float32",
            "data_format": "channels_last",
            "input_shape": [4, 4, 1],
            "layers": [
                {
                    "type": "Conv2D",
                    "name": "conv_1",
                    "weights": { "shape": [1, 1, 1, 2], "data": [0.01, -0.01] },
                    "activation": "linear",
                    "padding": "same"
                }
            ]
        }"#
        .to_string()
    }

    #[test]
    fn end_to_end_writes_only_kept_filters() {
        let model = Model::from_json(&tiny_model_json()).unwrap();
        let out_dir = std::env::temp_dir().join(format!(
            "filter_visualizer_test_{}",
            std::process::id()
        ));
        fs::create_dir_all(&out_dir).unwrap();

        let written = visualize_model(&model, &out_dir, &AscentConfig::default()).unwrap();
        assert_eq!(written, 1);

        let names: Vec<String> = fs::read_dir(&out_dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].contains("_conv_1_0_"));
        assert!(names[0].ends_with(".png"));

        fs::remove_dir_all(&out_dir).unwrap();
    }

    #[test]
    fn filter_seeds_are_distinct() {
        let a = filter_seed(42, 0, 0);
        let b = filter_seed(42, 0, 1);
        let c = filter_seed(42, 1, 0);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }
}
