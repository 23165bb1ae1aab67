//! # Window Similarity
//!
//! $$
//! \rho(W_a,W_b)=\frac{\operatorname{Cov}(\operatorname{vec}W_a,\operatorname{vec}W_b)}{\sigma_{W_a}\sigma_{W_b}}
//! $$
//!
//! Pairwise similarity between fixed-length windows of relative prices.
//! Windows exist only where a full slice fits; nothing is cached between
//! periods.

use std::ops::Range;

use ndarray::s;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use rayon::prelude::*;

/// Similarity/distance measure between two windows of equal shape.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WindowMetric {
  /// Pearson correlation of the flattened windows (a similarity).
  #[default]
  Pearson,
  /// Euclidean distance of the flattened windows.
  Euclidean,
  /// Euclidean distance between per-window mean relative vectors.
  Centroid,
}

impl WindowMetric {
  /// Parse a metric name, defaulting to [`WindowMetric::Pearson`].
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "euclidean" | "l2" => Self::Euclidean,
      "centroid" | "centroid-euclidean" => Self::Centroid,
      _ => Self::Pearson,
    }
  }

  /// `true` when larger values mean "more alike".
  pub fn is_similarity(self) -> bool {
    matches!(self, Self::Pearson)
  }

  /// Score between two windows.
  pub fn between(self, a: ArrayView2<f64>, b: ArrayView2<f64>) -> f64 {
    match self {
      Self::Pearson => pearson(a, b),
      Self::Euclidean => a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt(),
      Self::Centroid => {
        let (Some(ca), Some(cb)) = (a.mean_axis(Axis(1)), b.mean_axis(Axis(1))) else {
          return 0.0;
        };
        (&ca - &cb).mapv(|d| d * d).sum().sqrt()
      }
    }
  }

  /// Score of a window with itself.
  pub fn identity(self) -> f64 {
    if self.is_similarity() {
      1.0
    } else {
      0.0
    }
  }

  /// Map a score to a dissimilarity (`1 - ρ` for correlations).
  pub fn to_distance(self, score: f64) -> f64 {
    if self.is_similarity() {
      1.0 - score
    } else {
      score
    }
  }

  /// Whether `score` passes `threshold` in this metric's direction.
  pub fn accepts(self, score: f64, threshold: f64) -> bool {
    if self.is_similarity() {
      score >= threshold
    } else {
      score <= threshold
    }
  }
}

/// Pearson correlation of two equally shaped windows, flattened row-major.
/// Zero-variance inputs have correlation 0.
pub fn pearson(a: ArrayView2<f64>, b: ArrayView2<f64>) -> f64 {
  let n = a.len().min(b.len());
  if n < 2 {
    return 0.0;
  }

  let ma = a.iter().take(n).sum::<f64>() / n as f64;
  let mb = b.iter().take(n).sum::<f64>() / n as f64;

  let mut cov = 0.0;
  let mut sa = 0.0;
  let mut sb = 0.0;
  for (x, y) in a.iter().zip(b.iter()) {
    let dx = x - ma;
    let dy = y - mb;
    cov += dx * dy;
    sa += dx * dx;
    sb += dy * dy;
  }

  let denom = (sa * sb).sqrt();
  if denom < 1e-15 {
    0.0
  } else {
    (cov / denom).clamp(-1.0, 1.0)
  }
}

/// Start indices of every complete window of `len` columns inside `0..end`.
pub fn window_starts(end: usize, len: usize) -> Range<usize> {
  if len == 0 || end < len {
    0..0
  } else {
    0..end - len + 1
  }
}

/// Columns `start..start + len`.
pub fn window(relatives: ArrayView2<'_, f64>, start: usize, len: usize) -> ArrayView2<'_, f64> {
  relatives.slice_move(s![.., start..start + len])
}

/// Symmetric matrix of scores between all complete windows inside `0..end`,
/// indexed by window start. The last row/column is the latest window.
pub fn similarity_matrix(
  relatives: ArrayView2<f64>,
  end: usize,
  len: usize,
  metric: WindowMetric,
) -> Array2<f64> {
  let m = window_starts(end, len).len();
  let rows: Vec<Vec<f64>> = (0..m)
    .into_par_iter()
    .map(|i| {
      let wi = window(relatives, i, len);
      ((i + 1)..m)
        .map(|j| metric.between(wi, window(relatives, j, len)))
        .collect()
    })
    .collect();

  let mut out = Array2::<f64>::from_elem((m, m), metric.identity());
  for (i, row) in rows.into_iter().enumerate() {
    for (offset, v) in row.into_iter().enumerate() {
      let j = i + 1 + offset;
      out[[i, j]] = v;
      out[[j, i]] = v;
    }
  }
  out
}

/// Scores between the latest window `end - len..end` and every earlier
/// window that is followed by an observed period (starts `0..end - len`).
pub fn similarity_to_latest(
  relatives: ArrayView2<f64>,
  end: usize,
  len: usize,
  metric: WindowMetric,
) -> Array1<f64> {
  if len == 0 || end <= len {
    return Array1::zeros(0);
  }
  let latest = window(relatives, end - len, len);
  Array1::from_iter((0..end - len).map(|j| metric.between(window(relatives, j, len), latest)))
}

/// Periods that immediately follow each window similar to the latest one.
///
/// A candidate window starting at `j` is followed by period `j + len`; it is
/// kept when its score passes `threshold` in the metric's direction.
pub fn locate_similar_windows(
  relatives: ArrayView2<f64>,
  end: usize,
  len: usize,
  metric: WindowMetric,
  threshold: f64,
) -> Vec<usize> {
  similarity_to_latest(relatives, end, len, metric)
    .iter()
    .enumerate()
    .filter(|(_, score)| metric.accepts(**score, threshold))
    .map(|(j, _)| j + len)
    .collect()
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  fn relatives() -> Array2<f64> {
    array![
      [1.01, 0.99, 1.02, 0.98, 1.01, 0.99],
      [0.98, 1.02, 0.97, 1.03, 0.98, 1.02]
    ]
  }

  #[test]
  fn window_starts_exclude_partial_windows() {
    assert_eq!(window_starts(6, 2), 0..5);
    assert_eq!(window_starts(1, 2), 0..0);
    assert_eq!(window_starts(3, 3), 0..1);
  }

  #[test]
  fn similarity_matrix_is_symmetric_with_unit_diagonal() {
    let rel = relatives();
    let m = similarity_matrix(rel.view(), 6, 2, WindowMetric::Pearson);

    assert_eq!(m.dim(), (5, 5));
    for i in 0..5 {
      assert_abs_diff_eq!(m[[i, i]], 1.0);
      for j in 0..5 {
        assert_abs_diff_eq!(m[[i, j]], m[[j, i]]);
        assert!(m[[i, j]] <= 1.0 && m[[i, j]] >= -1.0);
      }
    }
  }

  #[test]
  fn alternating_pattern_matches_every_other_window() {
    let rel = relatives();
    let followers = locate_similar_windows(rel.view(), 6, 2, WindowMetric::Pearson, 0.9);

    // latest window starts at 4; windows 0 and 2 share its shape
    assert_eq!(followers, vec![2, 4]);
  }

  #[test]
  fn distance_metrics_have_zero_identity() {
    let rel = relatives();
    let m = similarity_matrix(rel.view(), 6, 3, WindowMetric::Centroid);
    assert_abs_diff_eq!(m[[0, 0]], 0.0);
    assert!(m[[0, 1]] > 0.0);
    assert_abs_diff_eq!(WindowMetric::Euclidean.to_distance(0.3), 0.3);
    assert_abs_diff_eq!(WindowMetric::Pearson.to_distance(0.3), 0.7, epsilon = 1e-12);
  }

  #[test]
  fn constant_windows_have_zero_correlation() {
    let flat = Array2::<f64>::ones((2, 4));
    let row = similarity_to_latest(flat.view(), 4, 2, WindowMetric::Pearson);
    assert_eq!(row.len(), 2);
    assert!(row.iter().all(|&v| v == 0.0));
  }

  #[test]
  fn short_history_yields_no_candidates() {
    let rel = relatives();
    assert!(similarity_to_latest(rel.view(), 2, 2, WindowMetric::Euclidean).is_empty());
    assert!(locate_similar_windows(rel.view(), 1, 3, WindowMetric::Euclidean, 1.0).is_empty());
  }
}
