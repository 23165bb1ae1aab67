//! # Cluster
//!
//! $$
//! s(i)=\frac{b(i)-a(i)}{\max\{a(i),b(i)\}}
//! $$
//!
//! Clustering service used to group historical windows, plus silhouette
//! based selection of the cluster count.

pub mod kmeans;
pub mod kmedoids;

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::Rng;

pub use kmeans::KMeans;
pub use kmedoids::KMedoids;

use crate::error::Result;

/// Assigns observations to `k` clusters.
pub trait Clusterer: Send + Sync {
  /// Identifier used in log events.
  fn name(&self) -> &'static str;

  /// Cluster labels in `0..k` for every observation.
  ///
  /// `points` holds one observation per row and `distances` their pairwise
  /// distance matrix; implementations use whichever representation they need.
  fn assign(
    &self,
    points: ArrayView2<f64>,
    distances: ArrayView2<f64>,
    k: usize,
    seed: u64,
  ) -> Result<Vec<usize>>;
}

/// Built-in clustering methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClusterMethod {
  /// Lloyd's k-means on the raw window vectors.
  #[default]
  KMeans,
  /// k-medoids on a precomputed distance matrix.
  KMedoids,
}

impl ClusterMethod {
  /// Parse a string into a [`ClusterMethod`].
  pub fn from_str(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "kmedoids" | "k-medoids" | "pam" => Self::KMedoids,
      _ => Self::KMeans,
    }
  }
}

/// k-means++ style seeding: distinct observation indices, each new one drawn
/// with probability proportional to its squared distance to the nearest
/// index already chosen.
pub(crate) fn plus_plus_seeds<F>(n: usize, k: usize, rng: &mut StdRng, distance: F) -> Vec<usize>
where
  F: Fn(usize, usize) -> f64,
{
  let mut seeds = Vec::with_capacity(k);
  if n == 0 || k == 0 {
    return seeds;
  }
  seeds.push(rng.gen_range(0..n));

  let mut nearest: Vec<f64> = (0..n).map(|i| distance(i, seeds[0]).powi(2)).collect();
  while seeds.len() < k.min(n) {
    let total: f64 = nearest.iter().sum();
    let next = if total > 0.0 && total.is_finite() {
      let mut target = rng.gen::<f64>() * total;
      let mut pick = None;
      for (i, &d) in nearest.iter().enumerate() {
        if d <= 0.0 {
          continue;
        }
        pick = Some(i);
        if target < d {
          break;
        }
        target -= d;
      }
      pick
    } else {
      None
    };

    // coincident observations: take the first unused index
    let next = next.unwrap_or_else(|| (0..n).find(|i| !seeds.contains(i)).unwrap_or(0));
    seeds.push(next);
    for (i, d) in nearest.iter_mut().enumerate() {
      *d = d.min(distance(i, next).powi(2));
    }
  }
  seeds
}

/// Mean silhouette coefficient of a labelling. Singleton clusters contribute
/// 0; a labelling with fewer than two clusters scores 0.
pub fn silhouette_score(distances: ArrayView2<f64>, labels: &[usize]) -> f64 {
  let n = labels.len();
  let k = labels.iter().copied().max().map_or(0, |m| m + 1);
  if n < 2 || k < 2 {
    return 0.0;
  }

  let mut sizes = vec![0usize; k];
  for &l in labels {
    sizes[l] += 1;
  }
  if sizes.iter().filter(|&&s| s > 0).count() < 2 {
    return 0.0;
  }

  let mut total = 0.0;
  for i in 0..n {
    let own = labels[i];
    if sizes[own] <= 1 {
      continue;
    }

    let mut sums = vec![0.0; k];
    for j in 0..n {
      if j != i {
        sums[labels[j]] += distances[[i, j]];
      }
    }

    let a = sums[own] / (sizes[own] - 1) as f64;
    let b = (0..k)
      .filter(|&c| c != own && sizes[c] > 0)
      .map(|c| sums[c] / sizes[c] as f64)
      .fold(f64::INFINITY, f64::min);

    let denom = a.max(b);
    if denom > 0.0 && denom.is_finite() {
      total += (b - a) / denom;
    }
  }

  total / n as f64
}

/// Cluster with every `k ∈ 2..=max_k` (capped at `n − 1`) and keep the
/// labelling with the highest mean silhouette. `None` when fewer than three
/// observations are available.
pub fn best_cluster_count(
  clusterer: &dyn Clusterer,
  points: ArrayView2<f64>,
  distances: ArrayView2<f64>,
  max_k: usize,
  seed: u64,
) -> Result<Option<(usize, Vec<usize>)>> {
  let n = points.nrows();
  if n < 3 {
    return Ok(None);
  }

  let mut best: Option<(f64, usize, Vec<usize>)> = None;
  for k in 2..=max_k.min(n - 1) {
    let labels = clusterer.assign(points, distances, k, seed)?;
    let score = silhouette_score(distances, &labels);
    if best.as_ref().map_or(true, |(s, ..)| score > *s) {
      best = Some((score, k, labels));
    }
  }

  Ok(best.map(|(_, k, labels)| (k, labels)))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use ndarray::Array2;

  use super::*;

  pub(super) fn euclidean_distances(points: &Array2<f64>) -> Array2<f64> {
    let n = points.nrows();
    Array2::from_shape_fn((n, n), |(i, j)| {
      (&points.row(i) - &points.row(j))
        .mapv(|d| d * d)
        .sum()
        .sqrt()
    })
  }

  fn two_blobs() -> Array2<f64> {
    array![
      [0.0, 0.0],
      [0.1, 0.0],
      [0.0, 0.1],
      [5.0, 5.0],
      [5.1, 5.0],
      [5.0, 5.1]
    ]
  }

  #[test]
  fn silhouette_of_well_separated_blobs_is_close_to_one() {
    let points = two_blobs();
    let d = euclidean_distances(&points);
    let s = silhouette_score(d.view(), &[0, 0, 0, 1, 1, 1]);
    assert!(s > 0.95);

    let bad = silhouette_score(d.view(), &[0, 1, 0, 1, 0, 1]);
    assert!(bad < s);
  }

  #[test]
  fn silhouette_of_single_cluster_is_zero() {
    let points = two_blobs();
    let d = euclidean_distances(&points);
    assert_abs_diff_eq!(silhouette_score(d.view(), &[0; 6]), 0.0);
  }

  #[test]
  fn best_cluster_count_finds_two_blobs() {
    let points = two_blobs();
    let d = euclidean_distances(&points);
    for clusterer in [
      &KMeans::default() as &dyn Clusterer,
      &KMedoids::default() as &dyn Clusterer,
    ] {
      let (k, labels) = best_cluster_count(clusterer, points.view(), d.view(), 4, 7)
        .unwrap()
        .unwrap();
      assert_eq!(k, 2, "{}", clusterer.name());
      assert_eq!(labels[0], labels[1]);
      assert_eq!(labels[0], labels[2]);
      assert_eq!(labels[3], labels[5]);
      assert_ne!(labels[0], labels[3]);
    }
  }

  #[test]
  fn too_few_points_are_not_clustered() {
    let points = array![[0.0], [1.0]];
    let d = euclidean_distances(&points);
    assert!(best_cluster_count(&KMeans::default(), points.view(), d.view(), 3, 0)
      .unwrap()
      .is_none());
  }

  #[test]
  fn method_parsing() {
    assert_eq!(ClusterMethod::from_str("PAM"), ClusterMethod::KMedoids);
    assert_eq!(ClusterMethod::from_str("kmeans"), ClusterMethod::KMeans);
  }
}
