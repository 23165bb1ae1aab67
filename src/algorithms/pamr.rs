//! # PAMR
//!
//! $$
//! \mathbf b_{t+1}=\Pi_{\Delta_n}\big(\mathbf b_t-\tau_t(\mathbf x_t-\bar x_t\mathbf 1)\big),\qquad
//! \tau_t=\frac{\max(0,\mathbf b_t^\top\mathbf x_t-\epsilon)}{\lVert\mathbf x_t-\bar x_t\mathbf 1\rVert^2}
//! $$
//!
//! Passive-aggressive mean reversion (Li et al.) with its two soft-margin
//! variants.

use impl_new_derive::ImplNew;
use ndarray::Array1;

use super::initial_or_uniform;
use crate::engine::Services;
use crate::engine::Strategy;
use crate::error::Result;
use crate::macros::ensure_param;
use crate::market::Market;
use crate::schedule::Schedule;
use crate::schedule::Trajectory;
use crate::types::OpsResult;

/// Step size rule.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum PamrVariant {
  #[default]
  Pamr,
  /// Step capped at `c`.
  Pamr1 { c: f64 },
  /// Denominator regularized by `1 / (2c)`.
  Pamr2 { c: f64 },
}

impl PamrVariant {
  fn step(self, loss: f64, norm2: f64) -> f64 {
    let tau = match self {
      Self::Pamr if norm2 > 0.0 => loss / norm2,
      Self::Pamr1 { c } if norm2 > 0.0 => (loss / norm2).min(c),
      Self::Pamr2 { c } => loss / (norm2 + 0.5 / c),
      _ => 0.0,
    };
    if tau.is_finite() {
      tau
    } else {
      0.0
    }
  }
}

#[derive(ImplNew, Clone, Debug)]
pub struct Pamr {
  /// Sensitivity `ϵ` of the loss.
  pub epsilon: f64,
  pub variant: PamrVariant,
}

impl Default for Pamr {
  fn default() -> Self {
    Self {
      epsilon: 0.5,
      variant: PamrVariant::Pamr,
    }
  }
}

impl Strategy for Pamr {
  fn name(&self) -> &'static str {
    match self.variant {
      PamrVariant::Pamr => "pamr",
      PamrVariant::Pamr1 { .. } => "pamr-1",
      PamrVariant::Pamr2 { .. } => "pamr-2",
    }
  }

  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    services: &Services,
  ) -> Result<OpsResult> {
    ensure_param!(self.epsilon >= 0.0, "epsilon", self.epsilon, "epsilon >= 0");
    if let PamrVariant::Pamr1 { c } | PamrVariant::Pamr2 { c } = self.variant {
      ensure_param!(c > 0.0, "c", c, "c > 0");
    }
    let schedule = Schedule::new(market, horizon, self.name())?;

    let relatives = market.relatives();
    let mut trajectory = Trajectory::new(self.name(), &schedule);
    let mut weights = initial_or_uniform(schedule.initial_weights(initial)?, market.n_assets());
    trajectory.push(weights.view());

    for day in 1..schedule.horizon() {
      let x = relatives.column(schedule.period(day) - 1);
      let mean = x.mean().unwrap_or(1.0);
      let deviation = x.mapv(|xi| xi - mean);
      let loss = (weights.dot(&x) - self.epsilon).max(0.0);
      let tau = self.variant.step(loss, deviation.dot(&deviation));

      weights = services
        .solver
        .project((&weights - &(deviation * tau)).view())?;
      trajectory.push(weights.view());
    }

    Ok(trajectory.finish())
  }
}
