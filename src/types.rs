//! # Types
//!
//! $$
//! \mathbf B=[\mathbf b_1,\dots,\mathbf b_H]\in\Delta_n^{H}
//! $$
//!
//! Result container returned by every strategy.

use ndarray::Array2;
use ndarray::ArrayView1;

/// Output of a strategy run.
#[derive(Clone, Debug)]
pub struct OpsResult {
  /// Number of assets (rows of `weights`).
  pub n_assets: usize,
  /// Portfolio trajectory, one simplex column per investment period.
  pub weights: Array2<f64>,
  /// Algorithm that produced the trajectory.
  pub name: &'static str,
}

impl OpsResult {
  pub fn horizon(&self) -> usize {
    self.weights.ncols()
  }

  /// Weights held during investment period `day` (0-based).
  pub fn column(&self, day: usize) -> ArrayView1<'_, f64> {
    self.weights.column(day)
  }
}
