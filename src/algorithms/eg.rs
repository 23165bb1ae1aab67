//! # EG
//!
//! $$
//! b_{t+1,i}\propto b_{t,i}\exp\Big(\eta\frac{x_{t,i}}{\mathbf b_t^\top\mathbf x_t}\Big)
//! $$
//!
//! Exponentiated gradient (Helmbold et al.).

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
use crate::simplex::repair_column;
use crate::types::OpsResult;

#[derive(ImplNew, Clone, Debug)]
pub struct Eg {
  /// Learning rate `η`.
  pub eta: f64,
}

impl Default for Eg {
  fn default() -> Self {
    Self { eta: 0.05 }
  }
}

impl Strategy for Eg {
  fn name(&self) -> &'static str {
    "eg"
  }

  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    _services: &Services,
  ) -> Result<OpsResult> {
    ensure_param!(self.eta > 0.0, "eta", self.eta, "eta > 0");
    let schedule = Schedule::new(market, horizon, self.name())?;

    let relatives = market.relatives();
    let mut trajectory = Trajectory::new(self.name(), &schedule);
    let mut weights = initial_or_uniform(schedule.initial_weights(initial)?, market.n_assets());
    trajectory.push(weights.view());

    for day in 1..schedule.horizon() {
      let x = relatives.column(schedule.period(day) - 1);
      let growth = weights.dot(&x);
      // subtract the largest exponent before exponentiating
      let exponents = x.mapv(|xi| self.eta * xi / growth);
      let top = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
      let scaled = &weights * &exponents.mapv(|e| (e - top).exp());
      weights = repair_column(scaled.view());
      trajectory.push(weights.view());
    }

    Ok(trajectory.finish())
  }
}
