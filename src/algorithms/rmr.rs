//! # RMR
//!
//! $$
//! \hat{\mathbf x}_{t+1}=\frac{L_1\text{-}\operatorname{median}(\mathbf p_{t-w+1},\dots,\mathbf p_t)}{\mathbf p_t}
//! $$
//!
//! Robust median reversion (Huang et al.): a passive-aggressive step
//! toward the robust median price forecast.

use impl_new_derive::ImplNew;
use ndarray::Array1;

use super::initial_or_uniform;
use crate::engine::Services;
use crate::engine::Strategy;
use crate::error::Result;
use crate::estimators::passive_aggressive;
use crate::estimators::price_to_relative;
use crate::estimators::robust_median;
use crate::macros::ensure_data;
use crate::macros::ensure_param;
use crate::market::Market;
use crate::schedule::Schedule;
use crate::schedule::Trajectory;
use crate::types::OpsResult;

#[derive(ImplNew, Clone, Debug)]
pub struct Rmr {
  /// Price vectors in the median window.
  pub window: usize,
  /// Reversion threshold `ϵ`.
  pub epsilon: f64,
  /// Weiszfeld iteration cap `m`.
  pub max_iters: usize,
  /// Relative tolerance `τ` of the median iteration.
  pub tol: f64,
}

impl Default for Rmr {
  fn default() -> Self {
    Self {
      window: 5,
      epsilon: 5.0,
      max_iters: 200,
      tol: 1e-9,
    }
  }
}

impl Strategy for Rmr {
  fn name(&self) -> &'static str {
    "rmr"
  }

  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    services: &Services,
  ) -> Result<OpsResult> {
    ensure_param!(self.window >= 2, "window", self.window, "window >= 2");
    ensure_param!(self.epsilon > 0.0, "epsilon", self.epsilon, "epsilon > 0");
    ensure_param!(self.max_iters >= 1, "max_iters", self.max_iters, "max_iters >= 1");
    ensure_param!(self.tol > 0.0, "tol", self.tol, "tol > 0");
    let schedule = Schedule::new(market, horizon, self.name())?;
    ensure_data!(
      schedule.first_period() + 1 >= self.window,
      self.name(),
      schedule.first_period() + 1,
      "{} price observations up to the first investment period",
      self.window
    );

    let prices = market.prices();
    let mut trajectory = Trajectory::new(self.name(), &schedule);
    let mut weights = initial_or_uniform(schedule.initial_weights(initial)?, market.n_assets());
    trajectory.push(weights.view());

    for day in 1..schedule.horizon() {
      let s = schedule.period(day);
      let median = robust_median(prices.trailing(s, self.window), self.max_iters, self.tol);
      let predicted = price_to_relative(median.view(), prices.column(s));
      let step = passive_aggressive(weights.view(), predicted.view(), self.epsilon);
      weights = services.solver.project(step.view())?;
      trajectory.push(weights.view());
    }

    Ok(trajectory.finish())
  }
}
