//! # Simplex
//!
//! $$
//! \Delta_n=\{\mathbf w\in\mathbb R^n:\ w_i\ge 0,\ \textstyle\sum_i w_i=1\}
//! $$
//!
//! Positivity repair, renormalization and Euclidean projections onto the
//! probability simplex (optionally intersected with a box).

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayViewMut1;
use ndarray::Axis;
use ordered_float::OrderedFloat;

/// Equal weights `1/n`.
pub fn uniform(n: usize) -> Array1<f64> {
  Array1::from_elem(n, 1.0 / n as f64)
}

/// Zero every negative entry in place.
pub fn positify(mut column: ArrayViewMut1<f64>) {
  column.mapv_inplace(|v| if v < 0.0 { 0.0 } else { v });
}

/// Divide by the column sum in place. Returns `false` (leaving the column
/// untouched) when the sum is not strictly positive and finite.
pub fn normalize(mut column: ArrayViewMut1<f64>) -> bool {
  let total = column.sum();
  if !(total.is_finite() && total > 0.0) {
    return false;
  }
  column.mapv_inplace(|v| v / total);
  true
}

/// Positify then normalize a single column. A column with no positive mass
/// left is replaced by the uniform vector.
pub fn repair_column(column: ArrayView1<f64>) -> Array1<f64> {
  let mut out = column.to_owned();
  positify(out.view_mut());
  if !normalize(out.view_mut()) {
    tracing::warn!(
      n_assets = out.len(),
      "degenerate weight column after positivity repair, using uniform weights"
    );
    return uniform(out.len());
  }
  out
}

/// Global post-pass over a weights matrix (columns are periods).
///
/// Runs only when at least one negative entry exists anywhere; returns the
/// number of columns that had to be replaced by uniform weights.
pub fn repair_weights(weights: &mut Array2<f64>) -> usize {
  if !weights.iter().any(|&v| v < 0.0) {
    return 0;
  }

  let mut degenerate = 0;
  for mut column in weights.axis_iter_mut(Axis(1)) {
    positify(column.view_mut());
    if !normalize(column.view_mut()) {
      degenerate += 1;
      column.fill(1.0 / column.len() as f64);
    }
  }

  if degenerate > 0 {
    tracing::warn!(
      degenerate,
      "degenerate weight columns after positivity repair, using uniform weights"
    );
  }
  degenerate
}

/// Whether `column` is non-negative and sums to one within `tol`.
pub fn is_on_simplex(column: ArrayView1<f64>, tol: f64) -> bool {
  column.iter().all(|&v| v.is_finite() && v >= -tol) && (column.sum() - 1.0).abs() <= tol
}

/// Exact Euclidean projection onto the probability simplex (sort-based).
pub fn project_simplex(v: ArrayView1<f64>) -> Array1<f64> {
  let n = v.len();
  if n == 0 {
    return Array1::zeros(0);
  }

  let mut u: Vec<OrderedFloat<f64>> = v.iter().copied().map(OrderedFloat).collect();
  u.sort_unstable_by(|a, b| b.cmp(a));

  let mut cssv = 0.0;
  let mut rho = 0;
  let mut theta = 0.0;
  for (i, ui) in u.iter().enumerate() {
    cssv += ui.0;
    let candidate = (cssv - 1.0) / (i + 1) as f64;
    if ui.0 - candidate > 0.0 {
      rho = i + 1;
      theta = candidate;
    }
  }

  if rho == 0 {
    return uniform(n);
  }

  v.mapv(|x| (x - theta).max(0.0))
}

/// Euclidean projection onto `{lower ≤ w ≤ upper, Σw = 1}`.
///
/// The projection is `clamp(v - θ, lower, upper)` for the unique shift `θ`
/// that restores the unit sum; `θ` is found by bisection. Feasibility
/// (`n·lower ≤ 1 ≤ n·upper`) is the caller's responsibility.
pub fn project_box_simplex(v: ArrayView1<f64>, lower: f64, upper: f64) -> Array1<f64> {
  let n = v.len();
  if n == 0 {
    return Array1::zeros(0);
  }
  if lower <= 0.0 && upper >= 1.0 {
    return project_simplex(v);
  }

  let mass = |theta: f64| -> f64 { v.iter().map(|&x| (x - theta).clamp(lower, upper)).sum() };

  let mut lo = v.iter().copied().fold(f64::INFINITY, f64::min) - upper;
  let mut hi = v.iter().copied().fold(f64::NEG_INFINITY, f64::max) - lower;
  for _ in 0..200 {
    let mid = 0.5 * (lo + hi);
    if mass(mid) > 1.0 {
      lo = mid;
    } else {
      hi = mid;
    }
    if hi - lo <= 1e-15 {
      break;
    }
  }

  let theta = 0.5 * (lo + hi);
  v.mapv(|x| (x - theta).clamp(lower, upper))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn projection_keeps_points_already_on_simplex() {
    let w = array![0.2, 0.3, 0.5];
    assert_abs_diff_eq!(project_simplex(w.view()), w, epsilon = 1e-12);
  }

  #[test]
  fn projection_of_far_point_hits_a_vertex() {
    let p = project_simplex(array![5.0, 0.0, -1.0].view());
    assert_abs_diff_eq!(p, array![1.0, 0.0, 0.0], epsilon = 1e-12);
  }

  #[test]
  fn projection_shifts_uniformly_in_the_interior() {
    let p = project_simplex(array![0.5, 0.5, 0.3].view());
    assert_abs_diff_eq!(p, array![0.4, 0.4, 0.2], epsilon = 1e-12);
  }

  #[test]
  fn box_projection_respects_bounds() {
    let p = project_box_simplex(array![3.0, 0.0, 0.0].view(), 0.1, 0.6);
    assert!(p.iter().all(|&w| w >= 0.1 - 1e-12 && w <= 0.6 + 1e-12));
    assert_abs_diff_eq!(p.sum(), 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(p[0], 0.6, epsilon = 1e-9);
    assert_abs_diff_eq!(p[1], 0.2, epsilon = 1e-9);
  }

  #[test]
  fn repair_positifies_and_normalizes() {
    let col = repair_column(array![0.6, -0.2, 0.6].view());
    assert_abs_diff_eq!(col, array![0.5, 0.0, 0.5], epsilon = 1e-12);
  }

  #[test]
  fn repair_of_all_negative_column_falls_back_to_uniform() {
    let col = repair_column(array![-0.6, -0.2, 0.0].view());
    assert_abs_diff_eq!(col, uniform(3), epsilon = 1e-12);
  }

  #[test]
  fn matrix_repair_is_skipped_without_negatives() {
    let mut w = array![[0.5, 0.2], [0.6, 0.8]];
    let before = w.clone();
    assert_eq!(repair_weights(&mut w), 0);
    assert_eq!(w, before);
  }

  #[test]
  fn matrix_repair_fixes_every_column() {
    let mut w = array![[0.5, -1.0], [-0.5, -2.0], [1.0, 0.0]];
    let degenerate = repair_weights(&mut w);

    assert_eq!(degenerate, 1);
    assert_abs_diff_eq!(w.column(0).to_owned(), array![1.0 / 3.0, 0.0, 2.0 / 3.0], epsilon = 1e-12);
    assert_abs_diff_eq!(w.column(1).to_owned(), uniform(3), epsilon = 1e-12);
  }
}
