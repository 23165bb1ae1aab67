//! # CORN
//!
//! $$
//! \mathbf b_{t+1}=\arg\max_{\mathbf b\in\Delta_n}\prod_{i\in C_t(w,\rho)}\mathbf b^\top\mathbf x_i,\qquad
//! C_t(w,\rho)=\{i:\ \operatorname{corr}(X_{i-w}^{i-1},X_{t-w+1}^{t})\ge\rho\}
//! $$
//!
//! Correlation-driven nonparametric learning (Li, Hoi and Gopalkrishnan),
//! as a single expert ([`Corn`]) and as the top-K expert ensemble
//! ([`CornK`]).

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

/// Log-optimal portfolio over the periods following windows correlated
/// with the latest one; uniform when none qualify.
fn corn_portfolio(
  relatives: ArrayView2<f64>,
  s: usize,
  window: usize,
  rho: f64,
  solver: &dyn SimplexSolver,
) -> Result<Array1<f64>> {
  let n = relatives.nrows();
  if s <= window {
    return Ok(uniform(n));
  }

  let followers = locate_similar_windows(relatives, s, window, WindowMetric::Pearson, rho);
  if followers.is_empty() {
    return Ok(uniform(n));
  }

  let support = relatives.select(Axis(1), &followers);
  let coefficients = Array1::ones(followers.len());
  solver.maximize_log_utility(support.view(), coefficients.view(), Bounds::default())
}

/// CORN-U: one `(window, ρ)` expert.
#[derive(ImplNew, Clone, Debug)]
pub struct Corn {
  pub window: usize,
  /// Correlation threshold in `[0, 1)`.
  pub rho: f64,
}

impl Default for Corn {
  fn default() -> Self {
    Self {
      window: 5,
      rho: 0.1,
    }
  }
}

impl Strategy for Corn {
  fn name(&self) -> &'static str {
    "corn"
  }

  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    services: &Services,
  ) -> Result<OpsResult> {
    ensure_param!(self.window >= 1, "window", self.window, "window >= 1");
    ensure_param!((0.0..1.0).contains(&self.rho), "rho", self.rho, "0 <= rho < 1");
    let schedule = Schedule::new(market, horizon, self.name())?;
    let mut initial = schedule.initial_weights(initial)?;

    let relatives = market.relatives().view();
    let mut trajectory = Trajectory::new(self.name(), &schedule);
    for day in schedule.days() {
      let weights = if day == 0 && initial.is_some() {
        initial_or_uniform(initial.take(), market.n_assets())
      } else {
        corn_portfolio(
          relatives,
          schedule.period(day),
          self.window,
          self.rho,
          services.solver.as_ref(),
        )?
      };
      trajectory.push(weights.view());
    }

    Ok(trajectory.finish())
  }
}

/// CORN-K: experts `(w, ρ)` for `w ∈ 1..=W`, `ρ ∈ {0, 1/P, …, (P−1)/P}`,
/// combined through the `K` wealthiest.
#[derive(ImplNew, Clone, Debug)]
pub struct CornK {
  /// Largest window `W`.
  pub max_window: usize,
  /// Number of correlation thresholds `P`.
  pub n_rho: usize,
  /// Experts kept in the combination `K`.
  pub top_k: usize,
}

impl Default for CornK {
  fn default() -> Self {
    Self {
      max_window: 5,
      n_rho: 10,
      top_k: 5,
    }
  }
}

impl CornK {
  fn experts(&self) -> Vec<(usize, f64)> {
    let mut experts = Vec::with_capacity(self.max_window * self.n_rho);
    for w in 1..=self.max_window {
      for p in 0..self.n_rho {
        experts.push((w, p as f64 / self.n_rho as f64));
      }
    }
    experts
  }
}

impl Strategy for CornK {
  fn name(&self) -> &'static str {
    "corn-k"
  }

  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    services: &Services,
  ) -> Result<OpsResult> {
    ensure_param!(self.max_window >= 1, "max_window", self.max_window, "max_window >= 1");
    ensure_param!(self.n_rho >= 1, "n_rho", self.n_rho, "n_rho >= 1");
    ensure_param!(
      self.top_k >= 1 && self.top_k <= self.max_window * self.n_rho,
      "top_k",
      self.top_k,
      "1 <= top_k <= max_window * n_rho"
    );
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
        .map(|&(w, rho)| corn_portfolio(relatives, s, w, rho, services.solver.as_ref()))
        .collect::<Result<Vec<_>>>()?;
      for (e, portfolio) in portfolios.iter().enumerate() {
        pool.set_portfolio(e, portfolio.view());
      }

      let weights = if day == 0 && initial.is_some() {
        initial_or_uniform(initial.take(), market.n_assets())
      } else {
        pool.top_k_mix(self.top_k)
      };
      trajectory.push(weights.view());
      pool.update(relatives.column(s));
    }

    Ok(trajectory.finish())
  }
}
