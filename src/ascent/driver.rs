//! Fixed-iteration gradient-ascent loop with early exit for dead filters.

use ndarray::{Array3, Array4, Axis};
use rayon::prelude::*;

use super::normalize::rms_normalize;
use crate::config::AscentConfig;
use crate::graph::{GraphError, LossGradient};
use crate::postprocess::deprocess;

/// Outcome of one filter's completed ascent run: the post-processed image
/// and the strictly positive terminal loss.
#[derive(Debug, Clone)]
pub struct FilterResult {
    /// Byte image, [height, width, channels].
    pub image: Array3<u8>,
    pub loss: f32,
}

/// Per-filter working state. Created fresh for each filter, mutated each
/// step, and consumed when the loop terminates.
struct AscentState {
    input: Array4<f32>,
    iteration: usize,
    loss: f32,
}

impl AscentState {
    fn seeded(shape: (usize, usize, usize), seed: u64) -> Self {
        Self {
            input: noise_input(shape, seed),
            iteration: 0,
            loss: 0.0,
        }
    }
}

/// Loop phases. A filter transitions to `ConvergedSkipped` the moment a
/// non-positive loss is observed, before the pending update is applied, and
/// to `ConvergedKept` after the final successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Initializing,
    Stepping,
    ConvergedSkipped,
    ConvergedKept,
}

/// Runs the gradient-ascent loop for individual filters.
pub struct AscentDriver {
    config: AscentConfig,
}

impl AscentDriver {
    pub fn new(config: AscentConfig) -> Self {
        Self { config }
    }

    /// Synthesize the input that maximizes one filter's mean activation.
    ///
    /// Starts from seeded mid-gray noise and performs exactly
    /// `config.iterations` steps of `input += normalize(grad) × step_size`.
    /// Returns `None` for dead filters (loss ≤ 0 at any evaluated step,
    /// including a zero loss on the very first evaluation); this is an
    /// expected outcome, not an error. Backend evaluation errors propagate.
    pub fn maximize<P: LossGradient>(
        &self,
        provider: &P,
        input_shape: (usize, usize, usize),
        seed: u64,
    ) -> Result<Option<FilterResult>, GraphError> {
        let mut phase = Phase::Initializing;
        let mut state: Option<AscentState> = None;

        loop {
            match phase {
                Phase::Initializing => {
                    state = Some(AscentState::seeded(input_shape, seed));
                    phase = Phase::Stepping;
                }
                Phase::Stepping => {
                    let state = state.as_mut().expect("state exists while stepping");
                    let (loss, grad) = provider.evaluate(&state.input)?;
                    state.loss = loss;

                    if loss <= 0.0 {
                        phase = Phase::ConvergedSkipped;
                        continue;
                    }

                    let step = rms_normalize(grad);
                    state.input.scaled_add(self.config.step_size, &step);
                    state.iteration += 1;

                    if state.iteration == self.config.iterations {
                        phase = Phase::ConvergedKept;
                    }
                }
                Phase::ConvergedSkipped => return Ok(None),
                Phase::ConvergedKept => {
                    let state = state.expect("state exists once converged");
                    if state.loss <= 0.0 {
                        return Ok(None);
                    }
                    let image = deprocess(&state.input.index_axis_move(Axis(0), 0));
                    return Ok(Some(FilterResult {
                        image,
                        loss: state.loss,
                    }));
                }
            }
        }
    }
}

/// Seeded uniform noise centered near mid-gray: `(noise − 0.5) × 20 + 128`
/// with noise in [0, 1). Starting close to gray with moderate variance
/// avoids saturating activations at the extremes from the first step.
fn noise_input(shape: (usize, usize, usize), seed: u64) -> Array4<f32> {
    let (height, width, channels) = shape;
    let state = if seed == 0 { 1 } else { seed };
    let mut input = Array4::zeros((1, height, width, channels));
    input
        .as_slice_mut()
        .expect("ndarray uses contiguous layout")
        .par_iter_mut()
        .enumerate()
        .for_each(|(idx, value)| {
            let next = lcg(lcg(idx as u64 + state));
            *value = (normalized(next) - 0.5) * 20.0 + 128.0;
        });
    input
}

fn lcg(seed: u64) -> u64 {
    seed.wrapping_mul(1664525).wrapping_add(1013904223)
}

fn normalized(value: u64) -> f32 {
    let fraction = (value & 0xFFFF_FFFF) as f32 / (u32::MAX as f32 + 1.0);
    fraction.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct ConstantLoss {
        loss: f32,
        calls: Cell<usize>,
    }

    impl ConstantLoss {
        fn new(loss: f32) -> Self {
            Self {
                loss,
                calls: Cell::new(0),
            }
        }
    }

    impl LossGradient for ConstantLoss {
        fn evaluate(&self, input: &Array4<f32>) -> Result<(f32, Array4<f32>), GraphError> {
            self.calls.set(self.calls.get() + 1);
            Ok((self.loss, Array4::from_elem(input.dim(), 1.0)))
        }
    }

    struct FailingProvider;

    impl LossGradient for FailingProvider {
        fn evaluate(&self, _input: &Array4<f32>) -> Result<(f32, Array4<f32>), GraphError> {
            Err(GraphError::EmptyPrefix)
        }
    }

    #[test]
    fn constant_positive_loss_runs_all_iterations_and_keeps() {
        let provider = ConstantLoss::new(2.5);
        let driver = AscentDriver::new(AscentConfig::default());
        let result = driver.maximize(&provider, (4, 4, 3), 42).unwrap();

        assert_eq!(provider.calls.get(), 20);
        let result = result.expect("positive loss must produce a result");
        assert_eq!(result.loss, 2.5);
        assert_eq!(result.image.dim(), (4, 4, 3));
    }

    #[test]
    fn zero_loss_terminates_at_first_evaluation() {
        let provider = ConstantLoss::new(0.0);
        let driver = AscentDriver::new(AscentConfig::default());
        let result = driver.maximize(&provider, (4, 4, 3), 42).unwrap();

        assert_eq!(provider.calls.get(), 1);
        assert!(result.is_none());
    }

    #[test]
    fn negative_loss_is_discarded_like_zero() {
        let provider = ConstantLoss::new(-1.0);
        let driver = AscentDriver::new(AscentConfig::default());
        let result = driver.maximize(&provider, (4, 4, 3), 42).unwrap();

        assert_eq!(provider.calls.get(), 1);
        assert!(result.is_none());
    }

    #[test]
    fn never_exceeds_configured_iterations() {
        let provider = ConstantLoss::new(1.0);
        let config = AscentConfig {
            iterations: 7,
            ..AscentConfig::default()
        };
        let driver = AscentDriver::new(config);
        driver.maximize(&provider, (2, 2, 1), 1).unwrap();
        assert_eq!(provider.calls.get(), 7);
    }

    #[test]
    fn uniform_gradient_moves_input_by_step_size() {
        // An all-ones gradient normalizes to (almost exactly) all ones, so
        // each step should raise every pixel by step_size.
        struct MeanRecorder {
            means: std::cell::RefCell<Vec<f32>>,
        }
        impl LossGradient for MeanRecorder {
            fn evaluate(&self, input: &Array4<f32>) -> Result<(f32, Array4<f32>), GraphError> {
                let mean = input.sum() / input.len() as f32;
                self.means.borrow_mut().push(mean);
                Ok((1.0, Array4::from_elem(input.dim(), 1.0)))
            }
        }

        let provider = MeanRecorder {
            means: std::cell::RefCell::new(Vec::new()),
        };
        let config = AscentConfig {
            iterations: 3,
            step_size: 2.0,
            seed: 5,
        };
        let driver = AscentDriver::new(config);
        driver.maximize(&provider, (2, 2, 1), 5).unwrap();

        let means = provider.means.borrow();
        assert_eq!(means.len(), 3);
        assert!((means[1] - means[0] - 2.0).abs() < 1e-3);
        assert!((means[2] - means[1] - 2.0).abs() < 1e-3);
    }

    #[test]
    fn provider_errors_propagate() {
        let driver = AscentDriver::new(AscentConfig::default());
        assert!(driver.maximize(&FailingProvider, (2, 2, 1), 1).is_err());
    }

    #[test]
    fn noise_is_deterministic_per_seed_and_near_mid_gray() {
        let a = noise_input((8, 8, 3), 42);
        let b = noise_input((8, 8, 3), 42);
        let c = noise_input((8, 8, 3), 43);
        assert_eq!(a, b);
        assert_ne!(a, c);
        for value in a.iter() {
            assert!(*value >= 118.0 && *value < 138.0);
        }
    }
}
