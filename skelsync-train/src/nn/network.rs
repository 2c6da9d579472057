//! Single-hidden-layer perceptron with momentum backpropagation
//!
//! Both layers see an extra always-1 input, so the weight matrices are
//! `H x (I+1)` and `O x (H+1)` with the bias weight in the last column.

use crate::math::{Matrix, MatrixError};
use crate::nn::{Activation, Loss};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;
use tracing::debug;

/// Value fed through every bias input.
const BIAS_INPUT: f32 = 1.0;

/// Errors raised while evaluating or training a network.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Matrix error: {0}")]
    Matrix(#[from] MatrixError),

    #[error("Expected {expected} input values, found {found}")]
    InputSize { expected: usize, found: usize },

    #[error("Expected {expected} target values, found {found}")]
    ExpectedSize { expected: usize, found: usize },

    #[error("Batch flush requested while training in online mode")]
    InvalidModeUse,

    #[error("Prediction diverged to NaN or infinity; training is unstable")]
    NumericDivergence,

    #[error("Output weights must end with the bias column: expected {expected} columns, found {found}")]
    BiasLayout { expected: usize, found: usize },

    #[error("Snapshot weights are {found:?}, network expects {expected:?}")]
    SnapshotShape {
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// When weight updates are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
    /// Update after every sample.
    #[default]
    Online,
    /// Accumulate gradients until [`Network::flush_batch`].
    Batch,
}

/// Gaussian weight initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightInit {
    pub mean: f32,
    pub variance: f32,
    pub seed: u64,
}

impl Default for WeightInit {
    fn default() -> Self {
        Self {
            mean: 0.0,
            variance: 1.0,
            seed: 555,
        }
    }
}

fn default_learning_rate() -> f32 {
    0.15
}

fn default_momentum() -> f32 {
    0.1
}

/// Layer sizes and hyperparameters of a [`Network`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub output_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_momentum")]
    pub momentum: f32,
    #[serde(default)]
    pub mode: TrainingMode,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default)]
    pub loss: Loss,
    #[serde(default)]
    pub init: WeightInit,
}

impl NetworkConfig {
    pub fn new(input_size: usize, hidden_size: usize, output_size: usize) -> Self {
        Self {
            input_size,
            hidden_size,
            output_size,
            learning_rate: default_learning_rate(),
            momentum: default_momentum(),
            mode: TrainingMode::default(),
            activation: Activation::default(),
            loss: Loss::default(),
            init: WeightInit::default(),
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_mode(mut self, mode: TrainingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_init(mut self, init: WeightInit) -> Self {
        self.init = init;
        self
    }
}

/// Weight gradients for one sample, shaped like the weight matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub hidden: Matrix,
    pub output: Matrix,
    /// Mean per-element loss of the sample.
    pub loss: f32,
}

/// Serializable weights of a trained network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub config: NetworkConfig,
    pub hidden_weights: Matrix,
    pub output_weights: Matrix,
}

struct BatchAccumulator {
    hidden: Matrix,
    output: Matrix,
    samples: usize,
}

struct ForwardPass {
    input: Matrix,
    hidden: Matrix,
    hidden_biased: Matrix,
    prediction: Matrix,
}

/// Calibration regressor.
pub struct Network {
    config: NetworkConfig,
    hidden_weights: Matrix,
    output_weights: Matrix,
    prev_hidden_delta: Matrix,
    prev_output_delta: Matrix,
    batch: Option<BatchAccumulator>,
}

impl Network {
    /// Create a network with seeded Gaussian weights.
    pub fn new(config: NetworkConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.init.seed);
        let mut hidden_weights = Matrix::zeros(config.hidden_size, config.input_size + 1);
        let mut output_weights = Matrix::zeros(config.output_size, config.hidden_size + 1);
        randomize(&mut hidden_weights, &config.init, &mut rng);
        randomize(&mut output_weights, &config.init, &mut rng);

        debug!(
            "Created {}x{}x{} network ({:?}, lr {}, momentum {}, seed {})",
            config.input_size,
            config.hidden_size,
            config.output_size,
            config.mode,
            config.learning_rate,
            config.momentum,
            config.init.seed
        );

        Self::with_weights(config, hidden_weights, output_weights)
    }

    /// Restore a network from a snapshot. Momentum history starts empty.
    pub fn from_snapshot(snapshot: NetworkSnapshot) -> Result<Self, NetworkError> {
        let NetworkSnapshot {
            config,
            hidden_weights,
            output_weights,
        } = snapshot;

        let hidden_shape = (config.hidden_size, config.input_size + 1);
        if hidden_weights.shape() != hidden_shape {
            return Err(NetworkError::SnapshotShape {
                expected: hidden_shape,
                found: hidden_weights.shape(),
            });
        }
        let output_shape = (config.output_size, config.hidden_size + 1);
        if output_weights.shape() != output_shape {
            return Err(NetworkError::SnapshotShape {
                expected: output_shape,
                found: output_weights.shape(),
            });
        }

        Ok(Self::with_weights(config, hidden_weights, output_weights))
    }

    fn with_weights(config: NetworkConfig, hidden_weights: Matrix, output_weights: Matrix) -> Self {
        let batch = match config.mode {
            TrainingMode::Online => None,
            TrainingMode::Batch => Some(BatchAccumulator {
                hidden: Matrix::zeros(hidden_weights.rows(), hidden_weights.cols()),
                output: Matrix::zeros(output_weights.rows(), output_weights.cols()),
                samples: 0,
            }),
        };

        Self {
            prev_hidden_delta: Matrix::zeros(hidden_weights.rows(), hidden_weights.cols()),
            prev_output_delta: Matrix::zeros(output_weights.rows(), output_weights.cols()),
            config,
            hidden_weights,
            output_weights,
            batch,
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Hidden layer weights, `H x (I+1)`.
    pub fn hidden_weights(&self) -> &Matrix {
        &self.hidden_weights
    }

    /// Output layer weights, `O x (H+1)`.
    pub fn output_weights(&self) -> &Matrix {
        &self.output_weights
    }

    /// Samples accumulated since the last flush. Always 0 in online mode.
    pub fn pending_batch_samples(&self) -> usize {
        self.batch.as_ref().map_or(0, |b| b.samples)
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            config: self.config.clone(),
            hidden_weights: self.hidden_weights.clone(),
            output_weights: self.output_weights.clone(),
        }
    }

    /// Predict the output for `input`.
    pub fn feed_forward(&self, input: &[f32]) -> Result<Vec<f32>, NetworkError> {
        let pass = self.forward(input)?;
        if !pass.prediction.is_finite() {
            return Err(NetworkError::NumericDivergence);
        }
        Ok(pass.prediction.into_vec())
    }

    /// Mean per-element loss of the prediction for `input` against `expected`.
    pub fn loss(&self, input: &[f32], expected: &[f32]) -> Result<f32, NetworkError> {
        self.check_expected(expected)?;
        let prediction = self.feed_forward(input)?;
        Ok(self.mean_loss(&prediction, expected))
    }

    /// Backpropagate one sample without touching the weights.
    pub fn gradients(&self, input: &[f32], expected: &[f32]) -> Result<Gradients, NetworkError> {
        self.check_expected(expected)?;
        let pass = self.forward(input)?;
        if !pass.prediction.is_finite() {
            return Err(NetworkError::NumericDivergence);
        }

        let activation = self.config.activation;
        let loss = self.config.loss;
        let expected = Matrix::column(expected);

        // Output layer: dE/dIn = act'(pred) * dE/dpred
        let loss_grad = pass
            .prediction
            .zip_map(&expected, |p, e| loss.gradient(p, e))?;
        let output_delta = pass
            .prediction
            .map(|y| activation.derivative_from_output(y))
            .hadamard(&loss_grad)?;
        let output_grad = output_delta.mul(&pass.hidden_biased.transpose())?;

        // Hidden layer: the bias column has no upstream neuron, crop it first.
        let hidden_size = self.config.hidden_size;
        if self.output_weights.cols() != hidden_size + 1 {
            return Err(NetworkError::BiasLayout {
                expected: hidden_size + 1,
                found: self.output_weights.cols(),
            });
        }
        let output_weights_no_bias = self
            .output_weights
            .resize(self.output_weights.rows(), hidden_size, 0.0);
        let backprop = output_weights_no_bias.transpose().mul(&output_delta)?;
        let hidden_delta = pass
            .hidden
            .map(|y| activation.derivative_from_output(y))
            .hadamard(&backprop)?;
        let hidden_grad = hidden_delta.mul(&pass.input.transpose())?;

        let prediction = pass.prediction.as_slice();
        Ok(Gradients {
            hidden: hidden_grad,
            output: output_grad,
            loss: self.mean_loss(prediction, expected.as_slice()),
        })
    }

    /// Train on one sample and return its loss before the update.
    ///
    /// Online mode updates the weights immediately; batch mode only
    /// accumulates the gradient.
    pub fn train(&mut self, input: &[f32], expected: &[f32]) -> Result<f32, NetworkError> {
        let gradients = self.gradients(input, expected)?;

        match self.batch.as_mut() {
            None => self.apply_update(&gradients.hidden, &gradients.output)?,
            Some(batch) => {
                batch.hidden.add_assign(&gradients.hidden)?;
                batch.output.add_assign(&gradients.output)?;
                batch.samples += 1;
            }
        }

        Ok(gradients.loss)
    }

    /// Apply the averaged accumulated gradient and reset the accumulators.
    ///
    /// Returns the number of samples the update covered; an empty batch is a
    /// no-op.
    pub fn flush_batch(&mut self) -> Result<usize, NetworkError> {
        let Some(batch) = self.batch.as_mut() else {
            return Err(NetworkError::InvalidModeUse);
        };

        let samples = batch.samples;
        if samples == 0 {
            return Ok(0);
        }

        let n = samples as f32;
        let hidden = batch.hidden.map(|g| g / n);
        let output = batch.output.map(|g| g / n);
        batch.hidden.fill(0.0);
        batch.output.fill(0.0);
        batch.samples = 0;

        self.apply_update(&hidden, &output)?;
        debug!("Flushed batch of {} samples", samples);
        Ok(samples)
    }

    // delta = grad * -lr + prev_delta * momentum; weights += delta
    fn apply_update(&mut self, hidden_grad: &Matrix, output_grad: &Matrix) -> Result<(), NetworkError> {
        let lr = -self.config.learning_rate;
        let momentum = self.config.momentum;

        let output_delta = output_grad
            .scale(lr)
            .add(&self.prev_output_delta.scale(momentum))?;
        let hidden_delta = hidden_grad
            .scale(lr)
            .add(&self.prev_hidden_delta.scale(momentum))?;

        self.output_weights.add_assign(&output_delta)?;
        self.hidden_weights.add_assign(&hidden_delta)?;
        self.prev_output_delta = output_delta;
        self.prev_hidden_delta = hidden_delta;
        Ok(())
    }

    fn forward(&self, input: &[f32]) -> Result<ForwardPass, NetworkError> {
        if input.len() != self.config.input_size {
            return Err(NetworkError::InputSize {
                expected: self.config.input_size,
                found: input.len(),
            });
        }

        let activation = self.config.activation;
        let mut biased_input = Matrix::filled(self.config.input_size + 1, 1, BIAS_INPUT);
        biased_input.init(input)?;

        let hidden = self
            .hidden_weights
            .mul(&biased_input)?
            .map(|x| activation.apply(x));
        let hidden_biased = hidden.resize(self.config.hidden_size + 1, 1, BIAS_INPUT);
        let prediction = self
            .output_weights
            .mul(&hidden_biased)?
            .map(|x| activation.apply(x));

        Ok(ForwardPass {
            input: biased_input,
            hidden,
            hidden_biased,
            prediction,
        })
    }

    fn check_expected(&self, expected: &[f32]) -> Result<(), NetworkError> {
        if expected.len() != self.config.output_size {
            return Err(NetworkError::ExpectedSize {
                expected: self.config.output_size,
                found: expected.len(),
            });
        }
        Ok(())
    }

    fn mean_loss(&self, prediction: &[f32], expected: &[f32]) -> f32 {
        let loss = self.config.loss;
        let total: f32 = prediction
            .iter()
            .zip(expected)
            .map(|(&p, &e)| loss.value(p, e))
            .sum();
        total / prediction.len().max(1) as f32
    }
}

fn randomize(weights: &mut Matrix, init: &WeightInit, rng: &mut StdRng) {
    let std_dev = init.variance.max(0.0).sqrt();
    for i in 0..weights.rows() {
        for j in 0..weights.cols() {
            weights[(i, j)] = init.mean + std_dev * gaussian(rng);
        }
    }
}

// Box-Muller transform over two uniforms in (0, 1].
fn gaussian(rng: &mut StdRng) -> f32 {
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = 1.0 - rng.random::<f64>();
    ((-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).sin()) as f32
}
