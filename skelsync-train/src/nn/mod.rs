//! Feed-forward calibration networks
//!
//! A bias-augmented single-hidden-layer perceptron trained by backpropagation
//! with momentum, in online or batch mode.

pub mod activation;
pub mod network;

pub use activation::{Activation, Loss};
pub use network::{
    Gradients, Network, NetworkConfig, NetworkError, NetworkSnapshot, TrainingMode, WeightInit,
};
