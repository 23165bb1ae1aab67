//! # KTPT
//!
//! $$
//! \hat{\mathbf p}_{t+1}=\boldsymbol\lambda\odot\mathbf p^{\max}_t+(1-\boldsymbol\lambda)\odot\big(\nu\,\mathbf p^{\max}_t+(1-\nu)\,\mathbf p^{\mathrm{reg}}_t\big),\qquad
//! \mathbf b_{t+1}=\Pi_{\Delta_n}\big(\mathbf b_t+\eta\,\kappa(\hat{\mathbf x}_{t+1}/\mathbf 1^\top\hat{\mathbf x}_{t+1}-\mathbf b_t)\big)
//! $$
//!
//! Kernel-based trend pattern tracking (Lai et al.). The forecast mixes the
//! recent peak price with a sparse regression of the next peak on the
//! preceding window, weighted by how consistently each asset has been
//! rising; the portfolio tracks the forecast through a saturating kernel.

use impl_new_derive::ImplNew;
use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;

use super::initial_or_uniform;
use crate::engine::Services;
use crate::engine::Strategy;
use crate::error::Result;
use crate::estimators::kernel_correction;
use crate::estimators::peak_price;
use crate::estimators::price_to_relative;
use crate::estimators::relative_share;
use crate::estimators::trend_signal;
use crate::macros::ensure_data;
use crate::macros::ensure_param;
use crate::market::Market;
use crate::regression::SparseRegressor;
use crate::schedule::Schedule;
use crate::schedule::Trajectory;
use crate::types::OpsResult;

#[derive(ImplNew, Clone, Debug)]
pub struct Ktpt {
  /// Window length `w`; the estimators read the last `2w` prices.
  pub window: usize,
  /// Weight `ν` of the peak predictor against the regression predictor.
  pub nu: f64,
  /// Kernel exponent `q`.
  pub q: f64,
  /// Tracking step `η`.
  pub eta: f64,
}

impl Default for Ktpt {
  fn default() -> Self {
    Self {
      window: 5,
      nu: 0.5,
      q: 2.0,
      eta: 1000.0,
    }
  }
}

/// Each row divided by its last entry.
fn scale_by_last(window: ArrayView2<f64>) -> Array2<f64> {
  let last = window.column(window.ncols() - 1).to_owned();
  &window / &last.insert_axis(Axis(1))
}

impl Ktpt {
  /// Sparse-regression forecast of the next peak price.
  ///
  /// Rows are assets. The model maps the (scaled) earlier window onto the
  /// peak of the later window and is then applied to the latest window.
  fn regression_peak(
    &self,
    history: ArrayView2<f64>,
    regressor: &dyn SparseRegressor,
  ) -> Result<Array1<f64>> {
    let m = history.ncols();
    let w = self.window;
    if m < 2 * w {
      return Ok(peak_price(history.slice(s![.., m.saturating_sub(w)..])));
    }

    let earlier = history.slice(s![.., m - 2 * w..m - w]);
    let later = history.slice(s![.., m - w..]);

    let design = scale_by_last(earlier);
    let anchor = earlier.column(w - 1);
    let target = &peak_price(later) / &anchor;
    let fit = regressor.fit(design.view(), target.view())?;

    let latest = scale_by_last(later);
    Ok(&fit.predict(latest.view()) * &later.column(w - 1))
  }
}

impl Strategy for Ktpt {
  fn name(&self) -> &'static str {
    "ktpt"
  }

  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    services: &Services,
  ) -> Result<OpsResult> {
    ensure_param!(self.window >= 2, "window", self.window, "window >= 2");
    ensure_param!((0.0..=1.0).contains(&self.nu), "nu", self.nu, "0 <= nu <= 1");
    ensure_param!(self.q > 0.0, "q", self.q, "q > 0");
    ensure_param!(self.eta > 0.0, "eta", self.eta, "eta > 0");
    let schedule = Schedule::new(market, horizon, self.name())?;
    let n_samples = market.n_samples();
    ensure_data!(
      n_samples + 1 > horizon + 2 * self.window,
      self.name(),
      n_samples,
      "n_samples - horizon + 1 - 2 * window > 0 (horizon = {horizon}, window = {})",
      self.window
    );

    let prices = market.prices();
    let w = self.window;
    let mut trajectory = Trajectory::new(self.name(), &schedule);
    let mut weights = initial_or_uniform(schedule.initial_weights(initial)?, market.n_assets());
    trajectory.push(weights.view());

    for day in 1..schedule.horizon() {
      let s = schedule.period(day);
      let history = prices.trailing(s, 2 * w);
      let recent = prices.trailing(s, w);

      let peak = peak_price(recent);
      let regression = self.regression_peak(history, services.regressor.as_ref())?;
      let blended = &peak * self.nu + &regression * (1.0 - self.nu);
      let lambda = trend_signal(history);
      let predicted_price = &lambda * &peak + &(1.0 - &lambda) * &blended;

      let predicted = price_to_relative(predicted_price.view(), prices.column(s));
      let delta = &relative_share(predicted.view()) - &weights;
      let step = &weights + &(kernel_correction(delta.view(), self.q) * self.eta);
      weights = services.solver.project(step.view())?;
      trajectory.push(weights.view());
    }

    Ok(trajectory.finish())
  }
}
