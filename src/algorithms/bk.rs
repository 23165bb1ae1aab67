//! # BK
//!
//! $$
//! \mathbf b_t=\frac{\sum_{k,l}q_{k,l}\,S_{t-1}(\mathbf h_{k,l})\,\mathbf h_{k,l}}{\sum_{k,l}q_{k,l}\,S_{t-1}(\mathbf h_{k,l})}
//! $$
//!
//! Nonparametric kernel-based moving window strategy (Györfi, Lugosi and
//! Udina). Expert `(k, l)` looks for past periods whose preceding `k`
//! relatives lie within `c / l` of the latest `k` relatives and holds the
//! log-optimal portfolio over what followed them.

use impl_new_derive::ImplNew;
use ndarray::Array1;
use ndarray::ArrayView2;
use ndarray::Axis;
use rayon::prelude::*;

use super::initial_or_uniform;
use crate::engine::Services;
use crate::engine::Strategy;
use crate::error::Result;
use crate::experts::ExpertPool;
use crate::macros::ensure_param;
use crate::market::Market;
use crate::schedule::Schedule;
use crate::schedule::Trajectory;
use crate::similarity::locate_similar_windows;
use crate::similarity::WindowMetric;
use crate::simplex::uniform;
use crate::solver::Bounds;
use crate::solver::SimplexSolver;
use crate::types::OpsResult;

#[derive(ImplNew, Clone, Debug)]
pub struct Bk {
  /// Largest window length `K`.
  pub k: usize,
  /// Number of radii `L`; expert `(k, l)` uses radius `c / l`.
  pub l: usize,
  /// Base radius, `0 < c <= 1`.
  pub c: f64,
}

impl Default for Bk {
  fn default() -> Self {
    Self { k: 5, l: 10, c: 1.0 }
  }
}

/// `(window, radius index)`; `(0, 0)` is the unconditional expert.
type Expert = (usize, usize);

impl Bk {
  fn validate(&self) -> Result<()> {
    ensure_param!(self.k >= 1, "k", self.k, "k >= 1");
    ensure_param!(self.l >= 1, "l", self.l, "l >= 1");
    ensure_param!(self.c > 0.0 && self.c <= 1.0, "c", self.c, "0 < c <= 1");
    Ok(())
  }

  fn experts(&self) -> Vec<Expert> {
    let mut experts = vec![(0, 0)];
    for k in 1..=self.k {
      for l in 1..=self.l {
        experts.push((k, l));
      }
    }
    experts
  }

  fn expert_portfolio(
    &self,
    expert: Expert,
    relatives: ArrayView2<f64>,
    s: usize,
    solver: &dyn SimplexSolver,
  ) -> Result<Array1<f64>> {
    let n = relatives.nrows();
    let followers: Vec<usize> = match expert {
      (0, _) => (0..s).collect(),
      (k, _) if s <= k => Vec::new(),
      (k, l) => locate_similar_windows(
        relatives,
        s,
        k,
        WindowMetric::Euclidean,
        self.c / l as f64,
      ),
    };

    if followers.is_empty() {
      return Ok(uniform(n));
    }

    let support = relatives.select(Axis(1), &followers);
    let coefficients = Array1::ones(followers.len());
    solver.maximize_log_utility(support.view(), coefficients.view(), Bounds::default())
  }
}

impl Strategy for Bk {
  fn name(&self) -> &'static str {
    "bk"
  }

  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    services: &Services,
  ) -> Result<OpsResult> {
    self.validate()?;
    let schedule = Schedule::new(market, horizon, self.name())?;
    let mut initial = schedule.initial_weights(initial)?;

    let relatives = market.relatives().view();
    let experts = self.experts();
    let mut pool = ExpertPool::new(market.n_assets(), experts.len());
    let mut trajectory = Trajectory::new(self.name(), &schedule);

    for day in schedule.days() {
      let s = schedule.period(day);
      let portfolios = experts
        .par_iter()
        .map(|&expert| self.expert_portfolio(expert, relatives, s, services.solver.as_ref()))
        .collect::<Result<Vec<_>>>()?;
      for (e, portfolio) in portfolios.iter().enumerate() {
        pool.set_portfolio(e, portfolio.view());
      }

      let weights = if day == 0 && initial.is_some() {
        initial_or_uniform(initial.take(), market.n_assets())
      } else {
        pool.mix()
      };
      trajectory.push(weights.view());
      pool.update(relatives.column(s));
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
  use crate::algorithms::testing::relatives_3x10;

  fn market() -> Market {
    Market::from_relatives(relatives_3x10()).unwrap()
  }

  #[test]
  fn small_literal_market_gives_simplex_columns() {
    let result = Bk::new(2, 2, 0.1)
      .run(&market(), 10, None, &Services::default())
      .unwrap();

    assert_eq!(result.weights.dim(), (3, 10));
    assert_eq!(result.name, "bk");
    assert_on_simplex(&result);
    for column in result.weights.columns() {
      assert_abs_diff_eq!(column.sum(), 1.0, epsilon = 1e-6);
    }
  }

  #[test]
  fn three_asset_scenario_with_two_by_two_experts() {
    let relatives = array![
      [1.01774, 1.00422, 1.01267, 1.00338, 0.978882, 1.00591, 1.00929, 1.00507, 0.982264, 0.991551],
      [0.994283, 1.0, 0.988085, 0.995235, 0.968543, 0.987609, 1.00763, 1.0, 1.00906, 1.03146],
      [1.00952, 1.01587, 1.0127, 0.998415, 0.969844, 1.00317, 1.00317, 1.00794, 1.01429, 1.01905]
    ];
    let market = Market::from_relatives(relatives).unwrap();
    let services = Services::default();

    let result = Bk::new(2, 2, 0.1).run(&market, 10, None, &services).unwrap();
    assert_eq!(result.weights.dim(), (3, 10));
    for column in result.weights.columns() {
      assert_abs_diff_eq!(column.sum(), 1.0, epsilon = 1e-9);
    }

    for bk in [
      Bk::new(2, 2, 1.1),
      Bk::new(2, 2, -0.1),
      Bk::new(0, 2, 0.1),
      Bk::new(2, 0, 0.1),
    ] {
      assert!(bk.run(&market, 10, None, &services).unwrap_err().is_invalid_hyperparameter());
    }
  }

  #[test]
  fn first_day_without_history_is_uniform() {
    let result = Bk::new(2, 2, 0.1)
      .run(&market(), 10, None, &Services::default())
      .unwrap();
    assert_abs_diff_eq!(result.column(0).to_owned(), uniform(3), epsilon = 1e-12);
  }

  #[test]
  fn out_of_range_hyperparameters_are_rejected() {
    let services = Services::default();
    for bk in [
      Bk::new(2, 2, 1.1),
      Bk::new(2, 2, -0.1),
      Bk::new(0, 2, 0.1),
      Bk::new(2, 0, 0.1),
    ] {
      let err = bk.run(&market(), 10, None, &services).unwrap_err();
      assert!(err.is_invalid_hyperparameter(), "{bk:?}: {err}");
    }
  }

  #[test]
  fn long_windows_are_clipped_at_the_start_of_history() {
    let result = Bk::new(8, 1, 1.0)
      .run(&market(), 10, None, &Services::default())
      .unwrap();
    assert_on_simplex(&result);
  }

  #[test]
  fn history_before_the_horizon_informs_the_first_day() {
    // asset 0 always wins: the unconditional expert goes all in
    let rel = array![[1.1, 1.1, 1.1, 1.1], [0.9, 0.9, 0.9, 0.9]];
    let market = Market::from_relatives(rel).unwrap();
    let result = Bk::new(1, 1, 1.0)
      .run(&market, 1, None, &Services::default())
      .unwrap();
    assert!(result.column(0)[0] > 0.99);
  }
}
