//! # Sparse Regression
//!
//! $$
//! \hat\beta=\arg\min_{\beta,b}\ \frac{1}{2n}\lVert y-X\beta-b\mathbf 1\rVert_2^2+\alpha\lVert\beta\rVert_1
//! $$
//!
//! Lasso regression behind the [`SparseRegressor`] service.

use anyhow::anyhow;
use impl_new_derive::ImplNew;
use ndarray::Array1;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;

use crate::error::OpsError;
use crate::error::Result;
use crate::macros::ensure_param;

/// Fitted linear model `y ≈ Xβ + b`.
#[derive(Clone, Debug)]
pub struct RegressionFit {
  pub coefficients: Array1<f64>,
  pub intercept: f64,
}

impl RegressionFit {
  /// Predictions for every row of `design`.
  pub fn predict(&self, design: ArrayView2<f64>) -> Array1<f64> {
    design.dot(&self.coefficients) + self.intercept
  }

  /// Prediction for a single feature vector.
  pub fn predict_one(&self, features: ArrayView1<f64>) -> f64 {
    features.dot(&self.coefficients) + self.intercept
  }
}

/// Sparse linear regression service.
pub trait SparseRegressor: Send + Sync {
  /// Fit `target` on the rows of `design` (`n_obs × n_features`).
  fn fit(&self, design: ArrayView2<f64>, target: ArrayView1<f64>) -> Result<RegressionFit>;
}

fn soft_threshold(x: f64, lambda: f64) -> f64 {
  x.signum() * (x.abs() - lambda).max(0.0)
}

/// Lasso by cyclic coordinate descent on centered data.
#[derive(ImplNew, Clone, Debug)]
pub struct Lasso {
  /// L1 penalty.
  pub alpha: f64,
  pub max_iters: usize,
  /// Largest coefficient change accepted as converged.
  pub tol: f64,
}

impl Default for Lasso {
  fn default() -> Self {
    Self {
      alpha: 1e-3,
      max_iters: 1000,
      tol: 1e-8,
    }
  }
}

impl SparseRegressor for Lasso {
  fn fit(&self, design: ArrayView2<f64>, target: ArrayView1<f64>) -> Result<RegressionFit> {
    ensure_param!(self.alpha >= 0.0 && self.alpha.is_finite(), "alpha", self.alpha, "alpha >= 0");
    ensure_param!(self.tol > 0.0, "tol", self.tol, "tol > 0");

    let (n, p) = design.dim();
    if n == 0 || n != target.len() {
      return Err(OpsError::Solver(anyhow!(
        "lasso needs one target per design row, got {n} rows and {} targets",
        target.len()
      )));
    }
    if design.iter().chain(target.iter()).any(|v| !v.is_finite()) {
      return Err(OpsError::Solver(anyhow!("lasso inputs are not finite")));
    }

    let x_mean = design.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));
    let y_mean = target.sum() / n as f64;
    let x = &design - &x_mean;
    let y = &target - y_mean;
    let scale: Array1<f64> = x.map_axis(Axis(0), |col| col.dot(&col) / n as f64);

    let mut beta = Array1::<f64>::zeros(p);
    let mut residual = y.clone();
    let mut converged = false;

    for _ in 0..self.max_iters {
      let mut max_change = 0.0_f64;
      for j in 0..p {
        if scale[j] <= 0.0 {
          continue;
        }
        let col = x.column(j);
        let old = beta[j];
        let rho = col.dot(&residual) / n as f64 + scale[j] * old;
        let new = soft_threshold(rho, self.alpha) / scale[j];
        if new != old {
          residual.scaled_add(old - new, &col);
          beta[j] = new;
          max_change = max_change.max((new - old).abs());
        }
      }
      if max_change <= self.tol {
        converged = true;
        break;
      }
    }

    if !converged {
      tracing::warn!(
        max_iters = self.max_iters,
        "lasso coordinate descent stopped before reaching tolerance"
      );
    }

    let intercept = y_mean - x_mean.dot(&beta);
    Ok(RegressionFit {
      coefficients: beta,
      intercept,
    })
  }
}
