//! Two-layer sigmoid MLP trained by full-batch gradient descent, with the
//! step size of every iteration found by an exact bracket-and-bisect line
//! search on the directional derivative.

pub mod config;
pub mod dataset;
pub mod error;
pub mod network;
pub mod optimization;
pub mod report;
pub mod training;

pub use error::{MlpError, Result};
pub use training::{CONVERGENCE_THRESHOLD, Termination, TrainReport, TrainingSession};
