//! # Estimators
//!
//! $$
//! \hat{\mathbf x}_{t+1}=\frac{\hat{\mathbf p}_{t+1}}{\mathbf p_t}
//! $$
//!
//! Price predictors and update kernels used by the mean-reversion and
//! trend-following strategies. Every function reads a window that has
//! already been clipped to the available history.

use ndarray::Array1;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::QuantileExt;

use crate::simplex::uniform;

/// Points closer than this to the current estimate count as exact matches.
const COINCIDENT: f64 = 1e-12;

/// L1 median of the columns of `window` (Weiszfeld iterations started at
/// the column mean).
///
/// When the estimate coincides with `η` data points the plain Weiszfeld
/// map is undefined; the update blends the map over the remaining points
/// with the current estimate:
///
/// $$
/// \mu\leftarrow\max\Big(0,1-\tfrac{\eta}{\gamma}\Big)\tilde T(\mu)+\min\Big(1,\tfrac{\eta}{\gamma}\Big)\mu
/// $$
pub fn robust_median(window: ArrayView2<f64>, max_iters: usize, tol: f64) -> Array1<f64> {
  let n = window.nrows();
  let Some(mut mu) = window.mean_axis(Axis(1)) else {
    return Array1::zeros(n);
  };

  for _ in 0..max_iters {
    let mut weighted = Array1::<f64>::zeros(n);
    let mut residual = Array1::<f64>::zeros(n);
    let mut inv_total = 0.0;
    let mut matches = 0usize;

    for point in window.axis_iter(Axis(1)) {
      let diff = &point - &mu;
      let dist = diff.dot(&diff).sqrt();
      if dist <= COINCIDENT {
        matches += 1;
        continue;
      }
      weighted.scaled_add(1.0 / dist, &point);
      residual.scaled_add(1.0 / dist, &diff);
      inv_total += 1.0 / dist;
    }

    if inv_total == 0.0 {
      // every point coincides with the estimate
      break;
    }

    let mapped = weighted / inv_total;
    let next = if matches == 0 {
      mapped
    } else {
      let gamma = residual.dot(&residual).sqrt();
      if gamma <= 0.0 {
        break;
      }
      let ratio = matches as f64 / gamma;
      mapped * (1.0 - ratio).max(0.0) + &mu * ratio.min(1.0)
    };

    let step: f64 = (&next - &mu).mapv(f64::abs).sum();
    let size: f64 = next.mapv(f64::abs).sum();
    mu = next;
    if step <= tol * size {
      break;
    }
  }

  mu
}

/// `p̂ / pₜ` for a predicted price vector.
pub fn price_to_relative(predicted: ArrayView1<f64>, last: ArrayView1<f64>) -> Array1<f64> {
  &predicted / &last
}

/// Moving-average predictor: mean of the window's columns over its last one.
pub fn moving_average_relative(window: ArrayView2<f64>) -> Array1<f64> {
  let last = window.column(window.ncols() - 1);
  match window.mean_axis(Axis(1)) {
    Some(mean) => price_to_relative(mean.view(), last),
    None => Array1::ones(window.nrows()),
  }
}

/// Return-to-previous-price predictor: `pₜ₋₁ / pₜ`. A one-column window
/// predicts no change.
pub fn last_price_relative(window: ArrayView2<f64>) -> Array1<f64> {
  let m = window.ncols();
  if m < 2 {
    return Array1::ones(window.nrows());
  }
  price_to_relative(window.column(m - 2), window.column(m - 1))
}

/// Passive-aggressive reversion step (unprojected):
///
/// $$
/// \mathbf b+\alpha(\hat{\mathbf x}-\bar x\mathbf 1),\quad
/// \alpha=\max\Big(0,\frac{\epsilon-\mathbf b^\top\hat{\mathbf x}}{\lVert\hat{\mathbf x}-\bar x\mathbf 1\rVert^2}\Big)
/// $$
pub fn passive_aggressive(
  weights: ArrayView1<f64>,
  predicted: ArrayView1<f64>,
  epsilon: f64,
) -> Array1<f64> {
  let n = predicted.len();
  let mean = predicted.sum() / n as f64;
  let deviation = predicted.mapv(|x| x - mean);
  let norm2 = deviation.dot(&deviation);

  let alpha = if norm2 > 0.0 {
    ((epsilon - weights.dot(&predicted)) / norm2).max(0.0)
  } else {
    0.0
  };

  &weights + &(deviation * alpha)
}

/// Per-asset maximum price over the window.
pub fn peak_price(window: ArrayView2<f64>) -> Array1<f64> {
  window.map_axis(Axis(1), |row| row.max().map_or(f64::NAN, |v| *v))
}

/// Trend confirmation: share of upward moves among the window's
/// consecutive differences, `clip(Σ sign(Δp) / (m − 1), 0, 1)`.
pub fn trend_signal(window: ArrayView2<f64>) -> Array1<f64> {
  let m = window.ncols();
  if m < 2 {
    return Array1::zeros(window.nrows());
  }
  window.map_axis(Axis(1), |row| {
    let votes: f64 = row
      .windows(2)
      .into_iter()
      .map(|pair| {
        let d = pair[1] - pair[0];
        if d > 0.0 {
          1.0
        } else if d < 0.0 {
          -1.0
        } else {
          0.0
        }
      })
      .sum();
    (votes / (m - 1) as f64).clamp(0.0, 1.0)
  })
}

/// Saturating exponential kernel `sign(δ)(1 − exp(−|δ|^q))`.
pub fn kernel_correction(delta: ArrayView1<f64>, q: f64) -> Array1<f64> {
  delta.mapv(|d| d.signum() * (1.0 - (-d.abs().powf(q)).exp()))
}

/// Normalized predicted relatives `x̂ / Σx̂`; uniform when the sum is not
/// positive.
pub fn relative_share(predicted: ArrayView1<f64>) -> Array1<f64> {
  let total = predicted.sum();
  if total > 0.0 && total.is_finite() {
    predicted.mapv(|x| x / total)
  } else {
    uniform(predicted.len())
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn median_of_collinear_points_is_the_middle_one() {
    let window = array![[1.0, 2.0, 10.0], [1.0, 2.0, 10.0]];
    let mu = robust_median(window.view(), 500, 1e-12);
    assert_abs_diff_eq!(mu, array![2.0, 2.0], epsilon = 1e-6);
  }

  #[test]
  fn median_ignores_a_single_outlier() {
    let window = array![[1.0, 1.1, 0.9, 1.0, 50.0], [2.0, 2.1, 1.9, 2.0, -40.0]];
    let mu = robust_median(window.view(), 1000, 1e-12);
    let mean = window.mean_axis(Axis(1)).unwrap();
    assert!((mu[0] - 1.0).abs() < 0.2);
    assert!((mean[0] - 1.0).abs() > 5.0);
  }

  #[test]
  fn identical_points_are_their_own_median() {
    let window = array![[3.0, 3.0, 3.0], [4.0, 4.0, 4.0]];
    assert_abs_diff_eq!(robust_median(window.view(), 50, 1e-9), array![3.0, 4.0]);
  }

  #[test]
  fn predictors_on_a_short_price_path() {
    let window = array![[1.0, 2.0, 3.0], [4.0, 4.0, 2.0]];
    assert_abs_diff_eq!(moving_average_relative(window.view()), array![2.0 / 3.0, 5.0 / 3.0], epsilon = 1e-12);
    assert_abs_diff_eq!(last_price_relative(window.view()), array![2.0 / 3.0, 2.0], epsilon = 1e-12);
    assert_abs_diff_eq!(last_price_relative(window.slice(ndarray::s![.., ..1])), array![1.0, 1.0]);
    assert_abs_diff_eq!(peak_price(window.view()), array![3.0, 4.0]);
  }

  #[test]
  fn passive_aggressive_is_passive_above_epsilon() {
    let b = array![0.5, 0.5];
    let x = array![1.2, 1.0];
    assert_abs_diff_eq!(passive_aggressive(b.view(), x.view(), 1.0), b);
  }

  #[test]
  fn passive_aggressive_moves_toward_the_predicted_winner() {
    let b = array![0.5, 0.5];
    let x = array![1.2, 1.0];
    let next = passive_aggressive(b.view(), x.view(), 10.0);
    // alpha = (10 - 1.1) / 0.02
    assert_abs_diff_eq!(next[0], 0.5 + 445.0 * 0.1, epsilon = 1e-9);
    assert_abs_diff_eq!(next.sum(), 1.0, epsilon = 1e-9);
  }

  #[test]
  fn trend_signal_counts_upward_moves() {
    let window = array![[1.0, 2.0, 3.0, 4.0], [4.0, 3.0, 2.0, 1.0], [1.0, 2.0, 1.0, 2.0]];
    assert_abs_diff_eq!(trend_signal(window.view()), array![1.0, 0.0, 1.0 / 3.0], epsilon = 1e-12);
  }

  #[test]
  fn kernel_saturates_and_keeps_sign() {
    let k = kernel_correction(array![-100.0, 0.0, 0.5].view(), 2.0);
    assert_abs_diff_eq!(k[0], -1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(k[1], 0.0);
    assert_abs_diff_eq!(k[2], 1.0 - (-0.25_f64).exp(), epsilon = 1e-12);
  }
}
