//! # Projected Gradient
//!
//! $$
//! \mathbf w_{k+1}=\Pi_{\mathcal C}\big(\mathbf w_k+\alpha_k\nabla f(\mathbf w_k)\big)
//! $$
//!
//! Default [`SimplexSolver`]: Armijo projected gradient ascent for the
//! log-utility problem and FISTA with adaptive restart for metric
//! projections.

use anyhow::anyhow;
use impl_new_derive::ImplNew;
use ndarray::Array1;
use ndarray::ArrayView1;
use ndarray::ArrayView2;

use super::check_log_utility_inputs;
use super::check_metric_inputs;
use super::log_utility;
use super::log_utility_gradient;
use super::Bounds;
use super::SimplexSolver;
use crate::error::OpsError;
use crate::error::Result;
use crate::simplex::project_box_simplex;
use crate::simplex::project_simplex;
use crate::simplex::uniform;

const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;
const MAX_STEP: f64 = 1e8;

fn l1_distance(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Projected gradient solver.
#[derive(ImplNew, Clone, Debug)]
pub struct ProjectedGradient {
  /// Iteration cap; hitting it is reported as non-convergence.
  pub max_iters: usize,
  /// L1 tolerance on successive iterates.
  pub tol: f64,
}

impl Default for ProjectedGradient {
  fn default() -> Self {
    Self {
      max_iters: 10_000,
      tol: 1e-10,
    }
  }
}

impl SimplexSolver for ProjectedGradient {
  fn name(&self) -> &'static str {
    "projected-gradient"
  }

  fn project_in_norm(&self, target: ArrayView1<f64>, metric: ArrayView2<f64>) -> Result<Array1<f64>> {
    check_metric_inputs(target, metric)?;

    // Gershgorin bound on the largest eigenvalue of 2A
    let lipschitz = 2.0
      * metric
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max);
    if lipschitz <= 0.0 {
      return Ok(project_simplex(target));
    }

    let mut w = project_simplex(target);
    let mut y = w.clone();
    let mut t = 1.0_f64;

    for _ in 0..self.max_iters {
      let grad = metric.dot(&(&y - &target)) * 2.0;
      let next = project_simplex((&y - &(grad / lipschitz)).view());
      if l1_distance(&next, &w) <= self.tol {
        return Ok(next);
      }

      // gradient restart keeps the momentum from overshooting
      if (&y - &next).dot(&(&next - &w)) > 0.0 {
        t = 1.0;
        y = next.clone();
      } else {
        let t_next = 0.5 * (1.0 + (1.0 + 4.0 * t * t).sqrt());
        y = &next + &((&next - &w) * ((t - 1.0) / t_next));
        t = t_next;
      }
      w = next;
    }

    Err(OpsError::Solver(anyhow!(
      "metric projection did not converge in {} iterations",
      self.max_iters
    )))
  }

  fn maximize_log_utility(
    &self,
    support: ArrayView2<f64>,
    coefficients: ArrayView1<f64>,
    bounds: Bounds,
  ) -> Result<Array1<f64>> {
    check_log_utility_inputs(support, coefficients)?;
    let (lower, upper) = (bounds.lower, bounds.upper);

    let mut w = project_box_simplex(uniform(support.nrows()).view(), lower, upper);
    let mut f = log_utility(w.view(), support, coefficients);
    if !f.is_finite() {
      return Err(OpsError::Solver(anyhow!("log-utility is not finite at the starting point")));
    }

    let mut step = 1.0;
    for _ in 0..self.max_iters {
      let grad = log_utility_gradient(w.view(), support, coefficients);

      let mut trial = step;
      let mut accepted = None;
      for _ in 0..MAX_BACKTRACKS {
        let candidate = project_box_simplex((&w + &(&grad * trial)).view(), lower, upper);
        let value = log_utility(candidate.view(), support, coefficients);
        let ascent = grad.dot(&(&candidate - &w));
        if value.is_finite() && value >= f + ARMIJO * ascent {
          accepted = Some((candidate, value));
          break;
        }
        trial *= 0.5;
      }

      // no ascent direction left within machine precision
      let Some((candidate, value)) = accepted else {
        return Ok(w);
      };

      let moved = l1_distance(&candidate, &w);
      let gain = value - f;
      step = if trial == step {
        (2.0 * step).min(MAX_STEP)
      } else {
        trial
      };
      w = candidate;
      f = value;

      if moved <= self.tol || gain <= f64::EPSILON * (1.0 + f.abs()) {
        return Ok(w);
      }
    }

    Err(OpsError::Solver(anyhow!(
      "log-utility maximization did not converge in {} iterations",
      self.max_iters
    )))
  }
}
