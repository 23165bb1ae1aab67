//! # ONS
//!
//! $$
//! \mathbf b_{t+1}=(1-\eta)\,\Pi^{A_t}_{\Delta_n}\big(\delta A_t^{-1}\tilde\beta_t\big)+\frac{\eta}{n}\mathbf 1
//! $$
//!
//! Online Newton step (Agarwal et al.) with
//! `A_t = I + Σ ∇ᵢ∇ᵢᵀ` and `β̃_t = (1 + 1/β) Σ ∇ᵢ`, `∇ᵢ = xᵢ / (bᵢ · xᵢ)`.

use anyhow::anyhow;
use impl_new_derive::ImplNew;
use nalgebra::DMatrix;
use ndarray::Array1;
use ndarray::Array2;

use super::initial_or_uniform;
use crate::engine::Services;
use crate::engine::Strategy;
use crate::error::OpsError;
use crate::error::Result;
use crate::macros::ensure_param;
use crate::market::Market;
use crate::schedule::Schedule;
use crate::schedule::Trajectory;
use crate::types::OpsResult;

#[derive(ImplNew, Clone, Debug)]
pub struct Ons {
  /// Mixing weight with the uniform portfolio, `0 <= η < 1`.
  pub eta: f64,
  /// Trade-off parameter `β`.
  pub beta: f64,
  /// Heuristic tuning parameter `δ`.
  pub delta: f64,
}

impl Default for Ons {
  fn default() -> Self {
    Self {
      eta: 0.0,
      beta: 1.0,
      delta: 0.125,
    }
  }
}

fn inverse(a: &Array2<f64>) -> Result<Array2<f64>> {
  let n = a.nrows();
  let m = DMatrix::from_fn(n, n, |i, j| a[[i, j]]);
  let inv = m
    .try_inverse()
    .ok_or_else(|| OpsError::Solver(anyhow!("ONS curvature matrix is singular")))?;
  Ok(Array2::from_shape_fn((n, n), |(i, j)| inv[(i, j)]))
}

impl Strategy for Ons {
  fn name(&self) -> &'static str {
    "ons"
  }

  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    services: &Services,
  ) -> Result<OpsResult> {
    ensure_param!((0.0..1.0).contains(&self.eta), "eta", self.eta, "0 <= eta < 1");
    ensure_param!(self.beta > 0.0, "beta", self.beta, "beta > 0");
    ensure_param!(self.delta > 0.0, "delta", self.delta, "delta > 0");
    let schedule = Schedule::new(market, horizon, self.name())?;

    let n = market.n_assets();
    let relatives = market.relatives();
    let mut curvature = Array2::<f64>::eye(n);
    let mut accumulated = Array1::<f64>::zeros(n);

    let mut trajectory = Trajectory::new(self.name(), &schedule);
    let mut weights = initial_or_uniform(schedule.initial_weights(initial)?, n);
    trajectory.push(weights.view());

    for day in 1..schedule.horizon() {
      let x = relatives.column(schedule.period(day) - 1);
      let grad = &x / weights.dot(&x);

      for i in 0..n {
        for j in 0..n {
          curvature[[i, j]] += grad[i] * grad[j];
        }
      }
      accumulated.scaled_add(1.0 + 1.0 / self.beta, &grad);

      let target = inverse(&curvature)?.dot(&accumulated) * self.delta;
      let projected = services
        .solver
        .project_in_norm(target.view(), curvature.view())?;
      weights = projected * (1.0 - self.eta) + self.eta / n as f64;
      trajectory.push(weights.view());
    }

    Ok(trajectory.finish())
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;
  use crate::algorithms::testing::assert_on_simplex;
  use crate::algorithms::testing::trending;

  #[test]
  fn inverse_round_trips_through_nalgebra() {
    let a = array![[2.0, 1.0], [1.0, 3.0]];
    let inv = inverse(&a).unwrap();
    assert_abs_diff_eq!(a.dot(&inv), Array2::<f64>::eye(2), epsilon = 1e-12);
  }

  #[test]
  fn persistent_winner_gains_weight() {
    let rel = Array2::from_shape_fn((2, 30), |(i, _)| if i == 0 { 1.05 } else { 0.97 });
    let market = Market::from_relatives(rel).unwrap();
    // full Newton step
    let result = Ons::new(0.0, 1.0, 1.0)
      .run(&market, 30, None, &Services::default())
      .unwrap();
    assert!(result.column(29)[0] > result.column(1)[0]);
    assert!(result.column(29)[0] > 0.5);
  }

  #[test]
  fn mixing_keeps_a_floor_on_every_asset() {
    let result = Ons::new(0.3, 1.0, 0.125)
      .run(&trending(20), 15, None, &Services::default())
      .unwrap();
    assert_on_simplex(&result);
    assert!(result.weights.iter().all(|&w| w >= 0.1 - 1e-9));
  }

  #[test]
  fn eta_of_one_is_rejected() {
    let err = Ons::new(1.0, 1.0, 0.125)
      .run(&trending(10), 5, None, &Services::default())
      .unwrap_err();
    assert!(err.is_invalid_hyperparameter());
  }
}
