//! # Schedule
//!
//! $$
//! s_d=T-H+d,\qquad d=0,\dots,H-1
//! $$
//!
//! Investment calendar and weight trajectory shared by every strategy loop.
//! The investment periods are the last `horizon` relative periods; earlier
//! data only feeds the estimators.

use std::ops::Range;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;

use crate::error::Result;
use crate::macros::ensure_data;
use crate::macros::ensure_param;
use crate::market::Market;
use crate::simplex::repair_weights;
use crate::types::OpsResult;

const SUM_TOLERANCE: f64 = 1e-6;

/// Maps investment days onto relative-period indices.
#[derive(Clone, Copy, Debug)]
pub struct Schedule {
  n_assets: usize,
  first: usize,
  horizon: usize,
}

impl Schedule {
  pub fn new(market: &Market, horizon: usize, algorithm: &'static str) -> Result<Self> {
    ensure_param!(horizon >= 1, "horizon", horizon, "horizon >= 1");
    let n_periods = market.n_periods();
    ensure_data!(
      horizon <= n_periods,
      algorithm,
      n_periods,
      "horizon ({horizon}) <= number of relative periods"
    );

    Ok(Self {
      n_assets: market.n_assets(),
      first: n_periods - horizon,
      horizon,
    })
  }

  pub fn n_assets(&self) -> usize {
    self.n_assets
  }

  pub fn horizon(&self) -> usize {
    self.horizon
  }

  /// Relative period of the first investment day, i.e. the number of
  /// relative periods available purely as history.
  pub fn first_period(&self) -> usize {
    self.first
  }

  /// Relative period invested in on `day`.
  pub fn period(&self, day: usize) -> usize {
    self.first + day
  }

  pub fn days(&self) -> Range<usize> {
    0..self.horizon
  }

  /// Check a caller-supplied first-period portfolio.
  pub fn initial_weights(&self, initial: Option<&Array1<f64>>) -> Result<Option<Array1<f64>>> {
    let Some(w) = initial else {
      return Ok(None);
    };
    ensure_param!(
      w.len() == self.n_assets,
      "initial_weights",
      w.len(),
      "one weight per asset"
    );
    ensure_param!(
      w.iter().all(|v| v.is_finite() && *v >= 0.0),
      "initial_weights",
      w,
      "non-negative finite weights"
    );
    ensure_param!(
      (w.sum() - 1.0).abs() <= SUM_TOLERANCE,
      "initial_weights",
      w.sum(),
      "weights summing to 1"
    );
    Ok(Some(w.clone()))
  }
}

/// Weights written column by column while a strategy advances.
#[derive(Debug)]
pub struct Trajectory {
  name: &'static str,
  weights: Array2<f64>,
  written: usize,
}

impl Trajectory {
  pub fn new(name: &'static str, schedule: &Schedule) -> Self {
    tracing::debug!(
      algorithm = name,
      n_assets = schedule.n_assets(),
      horizon = schedule.horizon(),
      first_period = schedule.first_period(),
      "starting run"
    );
    Self {
      name,
      weights: Array2::zeros((schedule.n_assets(), schedule.horizon())),
      written: 0,
    }
  }

  /// Append the raw weights of the next day.
  pub fn push(&mut self, column: ArrayView1<f64>) {
    tracing::trace!(algorithm = self.name, day = self.written, weights = ?column, "rebalanced");
    self.weights.column_mut(self.written).assign(&column);
    self.written += 1;
  }

  /// Weights of the most recently written day.
  pub fn previous(&self) -> Option<ArrayView1<'_, f64>> {
    self.written.checked_sub(1).map(|d| self.weights.column(d))
  }

  /// Apply the global positivity repair and seal the result.
  pub fn finish(mut self) -> OpsResult {
    let repaired = repair_weights(&mut self.weights);
    tracing::debug!(
      algorithm = self.name,
      days = self.written,
      repaired,
      "finished run"
    );
    OpsResult {
      n_assets: self.weights.nrows(),
      weights: self.weights,
      name: self.name,
    }
  }
}

#[cfg(test)]
mod tests {
  use ndarray::array;
  use ndarray::Array2;

  use super::*;

  fn market() -> Market {
    Market::from_relatives(Array2::from_elem((2, 5), 1.01)).unwrap()
  }

  #[test]
  fn days_map_onto_trailing_periods() {
    let schedule = Schedule::new(&market(), 3, "test").unwrap();
    assert_eq!(schedule.first_period(), 2);
    assert_eq!(schedule.period(0), 2);
    assert_eq!(schedule.period(2), 4);
  }

  #[test]
  fn horizon_is_validated() {
    assert!(Schedule::new(&market(), 0, "test").unwrap_err().is_invalid_hyperparameter());
    assert!(Schedule::new(&market(), 6, "test").unwrap_err().is_insufficient_data());
  }

  #[test]
  fn initial_weights_are_validated() {
    let schedule = Schedule::new(&market(), 5, "test").unwrap();
    assert!(schedule.initial_weights(None).unwrap().is_none());
    assert!(schedule.initial_weights(Some(&array![0.3, 0.7])).unwrap().is_some());
    assert!(schedule.initial_weights(Some(&array![0.3, 0.6])).is_err());
    assert!(schedule.initial_weights(Some(&array![1.0])).is_err());
    assert!(schedule.initial_weights(Some(&array![1.5, -0.5])).is_err());
  }

  #[test]
  fn finish_repairs_negative_columns() {
    let schedule = Schedule::new(&market(), 2, "test").unwrap();
    let mut trajectory = Trajectory::new("test", &schedule);
    trajectory.push(array![0.5, 0.5].view());
    assert_eq!(trajectory.previous().unwrap().to_owned(), array![0.5, 0.5]);
    trajectory.push(array![1.5, -0.5].view());

    let result = trajectory.finish();
    assert_eq!(result.n_assets, 2);
    assert_eq!(result.horizon(), 2);
    assert_eq!(result.column(1).to_owned(), array![1.0, 0.0]);
  }
}
