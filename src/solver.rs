//! # Solver
//!
//! $$
//! \max_{\mathbf w}\ \sum_i c_i\log(\mathbf w^\top\mathbf x_i)\quad\text{s.t.}\quad l\le w_j\le u,\ \mathbf 1^\top\mathbf w=1
//! $$
//!
//! Constrained projection / log-utility service used by every rebalance
//! step. Calls are stateless; failures propagate as [`OpsError::Solver`].

pub mod nelder_mead;
pub mod projected_gradient;

use anyhow::anyhow;
use ndarray::Array1;
use ndarray::ArrayView1;
use ndarray::ArrayView2;

pub use nelder_mead::NelderMeadSolver;
pub use projected_gradient::ProjectedGradient;

use crate::error::OpsError;
use crate::error::Result;
use crate::macros::ensure_param;
use crate::simplex::project_simplex;

/// Per-asset box constraints intersected with the simplex.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
  pub lower: f64,
  pub upper: f64,
}

impl Default for Bounds {
  fn default() -> Self {
    Self {
      lower: 0.0,
      upper: 1.0,
    }
  }
}

impl Bounds {
  pub fn new(lower: f64, upper: f64) -> Self {
    Self { lower, upper }
  }

  /// Check that `{lower ≤ w ≤ upper, Σw = 1}` is a non-empty set for `n_assets`.
  pub fn validate(&self, n_assets: usize) -> Result<()> {
    ensure_param!(
      self.lower >= 0.0 && self.lower < self.upper && self.upper <= 1.0,
      "bounds",
      (self.lower, self.upper),
      "0 <= lower < upper <= 1"
    );
    let n = n_assets as f64;
    ensure_param!(
      n * self.lower <= 1.0 + 1e-12 && n * self.upper >= 1.0 - 1e-12,
      "bounds",
      (self.lower, self.upper),
      "n_assets * lower <= 1 <= n_assets * upper"
    );
    Ok(())
  }
}

/// Numerical optimization service behind the rebalance steps.
pub trait SimplexSolver: Send + Sync {
  /// Identifier used in log events.
  fn name(&self) -> &'static str;

  /// `argmin ‖w − target‖²` over the simplex.
  fn project(&self, target: ArrayView1<f64>) -> Result<Array1<f64>> {
    if target.iter().any(|v| !v.is_finite()) {
      return Err(OpsError::Solver(anyhow!("projection target is not finite")));
    }
    Ok(project_simplex(target))
  }

  /// `argmin (w − target)ᵀ A (w − target)` over the simplex.
  fn project_in_norm(&self, target: ArrayView1<f64>, metric: ArrayView2<f64>) -> Result<Array1<f64>>;

  /// `argmax Σᵢ cᵢ log(Σⱼ wⱼ supportⱼᵢ)` under `bounds` and `Σw = 1`.
  ///
  /// `support` is `n_assets × n_obs`, `coefficients` has `n_obs` entries.
  fn maximize_log_utility(
    &self,
    support: ArrayView2<f64>,
    coefficients: ArrayView1<f64>,
    bounds: Bounds,
  ) -> Result<Array1<f64>>;
}

/// Built-in [`SimplexSolver`] backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SolverKind {
  /// Projected gradient ascent / accelerated projected gradient.
  #[default]
  ProjectedGradient,
  /// Derivative-free Nelder–Mead (argmin) over a feasible reparameterization.
  NelderMead,
}

impl SolverKind {
  /// Parse a string into a [`SolverKind`].
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "nelder-mead" | "neldermead" | "nm" => Self::NelderMead,
      _ => Self::ProjectedGradient,
    }
  }
}

pub(crate) fn check_log_utility_inputs(
  support: ArrayView2<f64>,
  coefficients: ArrayView1<f64>,
) -> Result<()> {
  if support.nrows() == 0 || support.ncols() == 0 {
    return Err(OpsError::Solver(anyhow!(
      "log-utility support must be non-empty, got shape {:?}",
      support.dim()
    )));
  }
  if support.ncols() != coefficients.len() {
    return Err(OpsError::Solver(anyhow!(
      "support has {} observations but {} coefficients were given",
      support.ncols(),
      coefficients.len()
    )));
  }
  Ok(())
}

pub(crate) fn check_metric_inputs(target: ArrayView1<f64>, metric: ArrayView2<f64>) -> Result<()> {
  let n = target.len();
  if metric.dim() != (n, n) {
    return Err(OpsError::Solver(anyhow!(
      "metric must be {n}x{n}, got {:?}",
      metric.dim()
    )));
  }
  if target.iter().chain(metric.iter()).any(|v| !v.is_finite()) {
    return Err(OpsError::Solver(anyhow!("projection inputs are not finite")));
  }
  Ok(())
}

/// `Σᵢ cᵢ log(w · xᵢ)`.
pub(crate) fn log_utility(
  w: ArrayView1<f64>,
  support: ArrayView2<f64>,
  coefficients: ArrayView1<f64>,
) -> f64 {
  w.dot(&support)
    .iter()
    .zip(coefficients.iter())
    .map(|(growth, c)| c * growth.ln())
    .sum()
}

/// Gradient of [`log_utility`] with respect to `w`.
pub(crate) fn log_utility_gradient(
  w: ArrayView1<f64>,
  support: ArrayView2<f64>,
  coefficients: ArrayView1<f64>,
) -> Array1<f64> {
  let growth = w.dot(&support);
  let scaled = &coefficients / &growth;
  support.dot(&scaled)
}
