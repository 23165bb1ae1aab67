//! # Error
//!
//! $$
//! \text{run}:(\text{market},\theta)\to\text{OpsResult}\ \cup\ \text{OpsError}
//! $$
//!
//! Error taxonomy shared by every algorithm entry point.

use thiserror::Error;

/// Errors reported synchronously by algorithm entry points and services.
#[derive(Debug, Error)]
pub enum OpsError {
  /// A hyperparameter lies outside its documented domain.
  #[error("invalid hyperparameter `{name}`: got {value}, expected {expected}")]
  InvalidHyperparameter {
    name: &'static str,
    value: String,
    expected: &'static str,
  },
  /// The data is too short for the requested horizon/window combination.
  #[error("{algorithm}: insufficient data, requires {requirement} (available: {available})")]
  InsufficientData {
    algorithm: &'static str,
    requirement: String,
    available: usize,
  },
  /// The input matrix is empty, non-finite, non-positive or mis-shaped.
  #[error("invalid market data: {0}")]
  InvalidMarketData(String),
  /// A numerical service failed to produce a usable solution.
  #[error("solver failure: {0}")]
  Solver(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OpsError>;

impl OpsError {
  /// Whether the error was raised by hyperparameter validation.
  pub fn is_invalid_hyperparameter(&self) -> bool {
    matches!(self, OpsError::InvalidHyperparameter { .. })
  }

  /// Whether the error was raised by the data sufficiency check.
  pub fn is_insufficient_data(&self) -> bool {
    matches!(self, OpsError::InsufficientData { .. })
  }
}
