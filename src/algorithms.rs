//! # Algorithms
//!
//! $$
//! \mathbf b_{t+1}=\Pi_{\Delta_n}\big(F(\mathbf b_t,\mathbf x_{1:t})\big)
//! $$
//!
//! One module per online portfolio selection strategy. Every strategy is a
//! validated parameter struct implementing [`Strategy`](crate::engine::Strategy).

pub mod bk;
pub mod cluslog;
pub mod corn;
pub mod cwogd;
pub mod eg;
pub mod ktpt;
pub mod olmar;
pub mod ons;
pub mod pamr;
pub mod rmr;
pub mod tco;

use ndarray::Array1;
use ndarray::ArrayView1;

pub use bk::Bk;
pub use cluslog::ClusLog;
pub use corn::Corn;
pub use corn::CornK;
pub use cwogd::CwOgd;
pub use eg::Eg;
pub use ktpt::Ktpt;
pub use olmar::Olmar;
pub use ons::Ons;
pub use pamr::Pamr;
pub use pamr::PamrVariant;
pub use rmr::Rmr;
pub use tco::Tco;
pub use tco::TcoVariant;

use crate::simplex::uniform;

/// Portfolio after one period of price moves without rebalancing:
/// `b ⊙ x / (b · x)`.
pub(crate) fn drift(weights: ArrayView1<f64>, relatives: ArrayView1<f64>) -> Array1<f64> {
  let growth = weights.dot(&relatives);
  if growth > 0.0 && growth.is_finite() {
    &weights * &relatives / growth
  } else {
    weights.to_owned()
  }
}

/// Supplied initial weights or the uniform portfolio.
pub(crate) fn initial_or_uniform(initial: Option<Array1<f64>>, n_assets: usize) -> Array1<f64> {
  initial.unwrap_or_else(|| uniform(n_assets))
}

#[cfg(test)]
pub(crate) mod testing {
  use ndarray::array;
  use ndarray::Array2;

  use crate::market::Market;
  use crate::simplex::is_on_simplex;
  use crate::types::OpsResult;

  /// 3 assets, 10 relative periods.
  pub fn relatives_3x10() -> Array2<f64> {
    array![
      [1.02, 0.98, 1.01, 1.03, 0.97, 1.00, 1.02, 0.99, 1.01, 1.02],
      [0.99, 1.01, 1.00, 0.98, 1.02, 1.01, 0.99, 1.00, 1.02, 0.98],
      [1.01, 1.00, 0.99, 1.02, 1.01, 0.98, 1.01, 1.02, 0.99, 1.00]
    ]
  }

  /// Oscillating two-asset market with `n` relative periods.
  pub fn oscillating(n: usize) -> Market {
    let rel = Array2::from_shape_fn((2, n), |(i, t)| {
      let up = (t + i) % 2 == 0;
      let wobble = 0.005 * ((t * 7 + i * 3) % 5) as f64;
      if up {
        1.05 + wobble
      } else {
        0.96 - wobble
      }
    });
    Market::from_relatives(rel).unwrap()
  }

  /// Three drifting assets with `n` relative periods.
  pub fn trending(n: usize) -> Market {
    let rel = Array2::from_shape_fn((3, n), |(i, t)| {
      let base = [1.01, 0.995, 1.0][i];
      base + 0.02 * (((t * (i + 2)) % 7) as f64 - 3.0) / 3.0
    });
    Market::from_relatives(rel).unwrap()
  }

  pub fn assert_on_simplex(result: &OpsResult) {
    for (day, column) in result.weights.columns().into_iter().enumerate() {
      assert!(
        is_on_simplex(column, 1e-6),
        "{}: day {day} is not on the simplex: {column}",
        result.name
      );
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn drift_follows_relative_prices() {
    let b = drift(array![0.5, 0.5].view(), array![1.5, 0.5].view());
    assert_abs_diff_eq!(b, array![0.75, 0.25], epsilon = 1e-12);
  }
}
