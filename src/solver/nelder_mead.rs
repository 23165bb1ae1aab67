//! # Nelder–Mead
//!
//! $$
//! \min_{\mathbf z\in\mathbb R^n} g\big(\Pi_{\mathcal C}(\mathbf z)\big)
//! $$
//!
//! Derivative-free [`SimplexSolver`] on top of argmin. The search runs over
//! an unconstrained parameter that is mapped onto the feasible set by
//! projection, so every vertex of the Nelder–Mead simplex is a valid
//! portfolio.

use anyhow::anyhow;
use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::State;
use argmin::core::TerminationReason;
use argmin::solver::neldermead::NelderMead;
use impl_new_derive::ImplNew;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;

use super::check_log_utility_inputs;
use super::check_metric_inputs;
use super::log_utility;
use super::Bounds;
use super::SimplexSolver;
use crate::error::OpsError;
use crate::error::Result;
use crate::simplex::project_box_simplex;
use crate::simplex::uniform;

/// Penalty returned for parameters whose objective is not finite.
const INFEASIBLE: f64 = 1e100;

fn initial_simplex(x0: &[f64], scale: f64) -> Vec<Vec<f64>> {
  let mut simplex = Vec::with_capacity(x0.len() + 1);
  simplex.push(x0.to_vec());
  for i in 0..x0.len() {
    let mut point = x0.to_vec();
    point[i] += scale;
    simplex.push(point);
  }
  simplex
}

struct LogUtilityCost {
  support: Array2<f64>,
  coefficients: Array1<f64>,
  bounds: Bounds,
}

impl LogUtilityCost {
  fn feasible(&self, x: &[f64]) -> Array1<f64> {
    project_box_simplex(ArrayView1::from(x), self.bounds.lower, self.bounds.upper)
  }
}

impl CostFunction for LogUtilityCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let w = self.feasible(x);
    let value = log_utility(w.view(), self.support.view(), self.coefficients.view());
    Ok(if value.is_finite() { -value } else { INFEASIBLE })
  }
}

struct MetricCost {
  target: Array1<f64>,
  metric: Array2<f64>,
}

impl CostFunction for MetricCost {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let w = project_box_simplex(ArrayView1::from(x), 0.0, 1.0);
    let diff = &w - &self.target;
    Ok(diff.dot(&self.metric.dot(&diff)))
  }
}

/// argmin Nelder–Mead solver.
#[derive(ImplNew, Clone, Debug)]
pub struct NelderMeadSolver {
  pub max_iters: u64,
  pub sd_tolerance: f64,
}

impl Default for NelderMeadSolver {
  fn default() -> Self {
    Self {
      max_iters: 10_000,
      sd_tolerance: 1e-12,
    }
  }
}

impl NelderMeadSolver {
  fn minimize<C>(&self, cost: C, x0: Vec<f64>) -> Result<Vec<f64>>
  where
    C: CostFunction<Param = Vec<f64>, Output = f64>,
  {
    let simplex = initial_simplex(&x0, 0.5);
    let solver = NelderMead::new(simplex).with_sd_tolerance(self.sd_tolerance)?;
    let res = Executor::new(cost, solver)
      .configure(|state| state.max_iters(self.max_iters))
      .run()?;
    if let Some(TerminationReason::MaxItersReached) = res.state.get_termination_reason() {
      return Err(OpsError::Solver(anyhow!(
        "nelder-mead did not converge in {} iterations",
        self.max_iters
      )));
    }
    Ok(res.state.best_param.unwrap_or(x0))
  }
}

impl SimplexSolver for NelderMeadSolver {
  fn name(&self) -> &'static str {
    "nelder-mead"
  }

  fn project_in_norm(&self, target: ArrayView1<f64>, metric: ArrayView2<f64>) -> Result<Array1<f64>> {
    check_metric_inputs(target, metric)?;
    let x0 = project_box_simplex(target, 0.0, 1.0).to_vec();
    let best = self.minimize(
      MetricCost {
        target: target.to_owned(),
        metric: metric.to_owned(),
      },
      x0,
    )?;
    Ok(project_box_simplex(ArrayView1::from(&best[..]), 0.0, 1.0))
  }

  fn maximize_log_utility(
    &self,
    support: ArrayView2<f64>,
    coefficients: ArrayView1<f64>,
    bounds: Bounds,
  ) -> Result<Array1<f64>> {
    check_log_utility_inputs(support, coefficients)?;
    let cost = LogUtilityCost {
      support: support.to_owned(),
      coefficients: coefficients.to_owned(),
      bounds,
    };
    let x0 = cost.feasible(uniform(support.nrows()).as_slice().unwrap_or(&[])).to_vec();
    let best = self.minimize(cost, x0)?;
    Ok(project_box_simplex(
      ArrayView1::from(&best[..]),
      bounds.lower,
      bounds.upper,
    ))
  }
}
