//! # TCO
//!
//! $$
//! \mathbf b_{t+1}=\tilde{\mathbf b}_t+\operatorname{sign}(\mathbf v_c)\odot\max\big(|\eta\mathbf v_c|-\lambda,0\big),\qquad
//! \mathbf v=\frac{\hat{\mathbf x}_{t+1}}{\tilde{\mathbf b}_t^\top\hat{\mathbf x}_{t+1}}
//! $$
//!
//! Transaction cost optimization (Li et al.). The soft threshold
//! `λ = 10γ` keeps the portfolio where it drifted unless the forecast
//! edge beats the proportional cost `γ`.

use impl_new_derive::ImplNew;
use ndarray::Array1;

use super::drift;
use super::initial_or_uniform;
use crate::engine::Services;
use crate::engine::Strategy;
use crate::error::Result;
use crate::estimators::last_price_relative;
use crate::estimators::moving_average_relative;
use crate::macros::ensure_param;
use crate::market::Market;
use crate::schedule::Schedule;
use crate::schedule::Trajectory;
use crate::simplex::repair_column;
use crate::types::OpsResult;

/// Price forecast used by [`Tco`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TcoVariant {
  /// Prices return to the previous observation.
  Tco1,
  /// Prices return to their moving average over `window` observations.
  Tco2 { window: usize },
}

#[derive(ImplNew, Clone, Debug)]
pub struct Tco {
  pub variant: TcoVariant,
  /// Step size `η`.
  pub eta: f64,
  /// Proportional transaction cost rate `γ`.
  pub gamma: f64,
}

impl Default for Tco {
  fn default() -> Self {
    Self {
      variant: TcoVariant::Tco1,
      eta: 10.0,
      gamma: 0.01,
    }
  }
}

impl Tco {
  fn window(&self) -> usize {
    match self.variant {
      TcoVariant::Tco1 => 2,
      TcoVariant::Tco2 { window } => window,
    }
  }
}

impl Strategy for Tco {
  fn name(&self) -> &'static str {
    match self.variant {
      TcoVariant::Tco1 => "tco1",
      TcoVariant::Tco2 { .. } => "tco2",
    }
  }

  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    _services: &Services,
  ) -> Result<OpsResult> {
    ensure_param!(self.window() >= 2, "window", self.window(), "window >= 2");
    ensure_param!(self.eta > 0.0, "eta", self.eta, "eta > 0");
    ensure_param!(
      (0.0..1.0).contains(&self.gamma),
      "gamma",
      self.gamma,
      "0 <= gamma < 1"
    );
    let schedule = Schedule::new(market, horizon, self.name())?;

    let prices = market.prices();
    let relatives = market.relatives();
    let lambda = 10.0 * self.gamma;
    let mut trajectory = Trajectory::new(self.name(), &schedule);
    let mut weights = initial_or_uniform(schedule.initial_weights(initial)?, market.n_assets());
    trajectory.push(weights.view());

    for day in 1..schedule.horizon() {
      let s = schedule.period(day);
      let window = prices.trailing(s, self.window());
      let predicted = match self.variant {
        TcoVariant::Tco1 => last_price_relative(window),
        TcoVariant::Tco2 { .. } => moving_average_relative(window),
      };

      let drifted = drift(weights.view(), relatives.column(s - 1));
      let v = &predicted / drifted.dot(&predicted);
      let centered = &v - v.mean().unwrap_or(0.0);
      let trade = centered.mapv(|c| c.signum() * ((self.eta * c).abs() - lambda).max(0.0));

      weights = repair_column((&drifted + &trade).view());
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
  use crate::algorithms::testing::oscillating;

  #[test]
  fn high_cost_freezes_the_drifting_portfolio() {
    let market = oscillating(10);
    let result = Tco::new(TcoVariant::Tco1, 1.0, 0.9)
      .run(&market, 3, None, &Services::default())
      .unwrap();
    let expected = drift(result.column(0), market.relatives().column(7));
    assert_abs_diff_eq!(result.column(1).to_owned(), expected, epsilon = 1e-12);
  }

  #[test]
  fn tco1_buys_the_asset_that_just_fell() {
    let prices = array![[1.0, 1.0, 1.2, 1.2], [1.0, 1.0, 0.8, 0.8]];
    let market = Market::from_prices(prices).unwrap();
    let result = Tco::new(TcoVariant::Tco1, 10.0, 0.0)
      .run(&market, 2, None, &Services::default())
      .unwrap();
    assert!(result.column(1)[1] > result.column(1)[0]);
  }

  #[test]
  fn moving_average_window_is_clipped_near_the_start() {
    let result = Tco::new(TcoVariant::Tco2 { window: 20 }, 10.0, 0.001)
      .run(&oscillating(8), 8, None, &Services::default())
      .unwrap();
    assert_eq!(result.name, "tco2");
    assert_on_simplex(&result);
  }

  #[test]
  fn short_moving_average_is_rejected() {
    let err = Tco::new(TcoVariant::Tco2 { window: 1 }, 10.0, 0.001)
      .run(&oscillating(8), 4, None, &Services::default())
      .unwrap_err();
    assert!(err.is_invalid_hyperparameter());
  }
}
