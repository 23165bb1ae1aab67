//! # CW-OGD
//!
//! $$
//! \boldsymbol\omega_{t+1}=\Pi_{\Delta_m}\Big(\boldsymbol\omega_t-\frac{\boldsymbol\ell_t}{H}\Big),\qquad
//! \ell_{t,e}=-\log(\mathbf x_t^\top\mathbf o_e)+\gamma\lVert\mathbf o_e\rVert_2^2
//! $$
//!
//! Combination weights over a fixed set of expert opinions, learned by
//! online gradient descent. The portfolio is `O ω`.

use impl_new_derive::ImplNew;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::Axis;

use crate::engine::Services;
use crate::engine::Strategy;
use crate::error::Result;
use crate::experts::mix_opinions;
use crate::macros::ensure_param;
use crate::market::Market;
use crate::schedule::Schedule;
use crate::schedule::Trajectory;
use crate::simplex::uniform;
use crate::types::OpsResult;

#[derive(ImplNew, Clone, Debug)]
pub struct CwOgd {
  /// Concentration penalty `γ`.
  pub gamma: f64,
  /// Step denominator `H`.
  pub h: f64,
  /// Expert opinion matrix `O` (`n_assets × m`, one-hot columns); the
  /// identity when absent.
  pub experts: Option<Array2<f64>>,
}

impl Default for CwOgd {
  fn default() -> Self {
    Self {
      gamma: 0.01,
      h: 10.0,
      experts: None,
    }
  }
}

/// Column holds a single 1 and zeros elsewhere.
fn is_one_hot(column: ArrayView1<f64>) -> bool {
  column.iter().filter(|&&v| v == 1.0).count() == 1 && column.iter().all(|&v| v == 0.0 || v == 1.0)
}

impl CwOgd {
  fn opinions(&self, n_assets: usize) -> Result<Array2<f64>> {
    let Some(experts) = &self.experts else {
      return Ok(Array2::eye(n_assets));
    };
    ensure_param!(
      experts.nrows() == n_assets && experts.ncols() >= 1,
      "experts",
      experts.dim(),
      "n_assets rows and at least one column"
    );
    ensure_param!(
      experts.axis_iter(Axis(1)).all(is_one_hot),
      "experts",
      experts,
      "one-hot columns"
    );
    Ok(experts.clone())
  }
}

impl Strategy for CwOgd {
  fn name(&self) -> &'static str {
    "cwogd"
  }

  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    services: &Services,
  ) -> Result<OpsResult> {
    ensure_param!(self.gamma >= 0.0, "gamma", self.gamma, "gamma >= 0");
    ensure_param!(self.h > 0.0, "h", self.h, "h > 0");
    let opinions = self.opinions(market.n_assets())?;
    let schedule = Schedule::new(market, horizon, self.name())?;
    let initial = schedule.initial_weights(initial)?;

    let relatives = market.relatives();
    let penalty = opinions.map_axis(Axis(0), |o| self.gamma * o.dot(&o));
    let mut mixture = uniform(opinions.ncols());
    let mut trajectory = Trajectory::new(self.name(), &schedule);
    let first = initial.unwrap_or_else(|| mix_opinions(opinions.view(), mixture.view()));
    trajectory.push(first.view());

    for day in 1..schedule.horizon() {
      let x = relatives.column(schedule.period(day) - 1);
      let loss = &x.dot(&opinions).mapv(|g| -g.ln()) + &penalty;
      mixture = services.solver.project((&mixture - &(loss / self.h)).view())?;
      trajectory.push(mix_opinions(opinions.view(), mixture.view()).view());
    }

    Ok(trajectory.finish())
  }
}
