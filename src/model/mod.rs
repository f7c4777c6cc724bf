//! Model description: layer kinds, JSON loading, and nested-model flattening.

mod layer;
mod load;

pub use layer::{Activation, Layer, LayerKind, Padding};
pub use load::{load_model, Model, ModelError};
