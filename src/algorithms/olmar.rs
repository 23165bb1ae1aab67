//! # OLMAR
//!
//! $$
//! \hat{\mathbf x}_{t+1}=\frac{1}{w}\sum_{i=0}^{w-1}\frac{\mathbf p_{t-i}}{\mathbf p_t}
//! $$
//!
//! On-line moving average reversion (Li and Hoi).

use impl_new_derive::ImplNew;
use ndarray::Array1;

use super::initial_or_uniform;
use crate::engine::Services;
use crate::engine::Strategy;
use crate::error::Result;
use crate::estimators::moving_average_relative;
use crate::estimators::passive_aggressive;
use crate::macros::ensure_param;
use crate::market::Market;
use crate::schedule::Schedule;
use crate::schedule::Trajectory;
use crate::types::OpsResult;

#[derive(ImplNew, Clone, Debug)]
pub struct Olmar {
  pub window: usize,
  /// Reversion threshold `ϵ`.
  pub epsilon: f64,
}

impl Default for Olmar {
  fn default() -> Self {
    Self {
      window: 5,
      epsilon: 10.0,
    }
  }
}

impl Strategy for Olmar {
  fn name(&self) -> &'static str {
    "olmar"
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
    let schedule = Schedule::new(market, horizon, self.name())?;

    let prices = market.prices();
    let mut trajectory = Trajectory::new(self.name(), &schedule);
    let mut weights = initial_or_uniform(schedule.initial_weights(initial)?, market.n_assets());
    trajectory.push(weights.view());

    for day in 1..schedule.horizon() {
      let s = schedule.period(day);
      let predicted = moving_average_relative(prices.trailing(s, self.window));
      let step = passive_aggressive(weights.view(), predicted.view(), self.epsilon);
      weights = services.solver.project(step.view())?;
      trajectory.push(weights.view());
    }

    Ok(trajectory.finish())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::algorithms::testing::assert_on_simplex;
  use crate::algorithms::testing::oscillating;

  #[test]
  fn window_is_clipped_on_the_first_days() {
    let result = Olmar::new(10, 10.0)
      .run(&oscillating(6), 6, None, &Services::default())
      .unwrap();
    assert_eq!(result.weights.dim(), (2, 6));
    assert_on_simplex(&result);
  }

  #[test]
  fn buys_below_the_moving_average() {
    let prices = ndarray::array![[1.0, 1.0, 1.0, 0.8, 0.8], [1.0, 1.0, 1.0, 1.2, 1.2]];
    let market = Market::from_prices(prices).unwrap();
    let result = Olmar::new(3, 10.0)
      .run(&market, 2, None, &Services::default())
      .unwrap();
    assert!(result.column(1)[0] > 0.99);
  }

  #[test]
  fn window_of_one_is_rejected() {
    assert!(Olmar::new(1, 10.0)
      .run(&oscillating(6), 3, None, &Services::default())
      .unwrap_err()
      .is_invalid_hyperparameter());
  }
}
