//! Command-line entry point: visualize every conv filter of a model.

use std::env;
use std::path::Path;
use std::process;

use filter_visualizer::{load_model, visualize_model, AscentConfig};

const USAGE: &str = "usage: visualize-filters [model JSON path] [image output directory]";
const CONFIG_PATH: &str = "visualizer.toml";

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("{USAGE}");
        process::exit(1);
    }
    let model_path = &args[1];
    let out_dir = Path::new(&args[2]);

    let config =
        AscentConfig::load_from_file(CONFIG_PATH).unwrap_or_else(|_| AscentConfig::default());

    println!("loading {}", model_path);
    let model = match load_model(model_path) {
        Ok(model) => model,
        Err(err) => {
            eprintln!("failed to load model: {err}");
            process::exit(1);
        }
    };

    match visualize_model(&model, out_dir, &config) {
        Ok(written) => {
            println!("wrote {} filter images to {}", written, out_dir.display());
        }
        Err(err) => {
            eprintln!("visualization failed: {err}");
            process::exit(1);
        }
    }
}
