//! # k-means
//!
//! $$
//! \min_{C_1..C_k}\sum_{c}\sum_{i\in C_c}\lVert \mathbf x_i-\boldsymbol\mu_c\rVert^2
//! $$
//!
//! Lloyd iterations over the rows of a point matrix.

use impl_new_derive::ImplNew;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::plus_plus_seeds;
use super::Clusterer;
use crate::error::Result;
use crate::macros::ensure_param;

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Lloyd's algorithm with seeded k-means++ initialization.
#[derive(ImplNew, Clone, Debug)]
pub struct KMeans {
  pub max_iters: usize,
}

impl Default for KMeans {
  fn default() -> Self {
    Self { max_iters: 300 }
  }
}

impl Clusterer for KMeans {
  fn name(&self) -> &'static str {
    "k-means"
  }

  fn assign(
    &self,
    points: ArrayView2<f64>,
    _distances: ArrayView2<f64>,
    k: usize,
    seed: u64,
  ) -> Result<Vec<usize>> {
    let n = points.nrows();
    ensure_param!(k >= 1 && k <= n, "k", k, "1 <= k <= number of observations");
    ensure_param!(self.max_iters >= 1, "max_iters", self.max_iters, "max_iters >= 1");

    let mut rng = StdRng::seed_from_u64(seed);
    let seeds = plus_plus_seeds(n, k, &mut rng, |i, j| {
      squared_distance(points.row(i), points.row(j)).sqrt()
    });
    let mut centers = Array2::<f64>::zeros((k, points.ncols()));
    for (c, &i) in seeds.iter().enumerate() {
      centers.row_mut(c).assign(&points.row(i));
    }

    let mut labels = vec![usize::MAX; n];
    for _ in 0..self.max_iters {
      let mut changed = false;
      for (i, point) in points.axis_iter(Axis(0)).enumerate() {
        let mut best = 0;
        let mut best_d = f64::INFINITY;
        for (c, center) in centers.axis_iter(Axis(0)).enumerate() {
          let d = squared_distance(point, center);
          if d < best_d {
            best_d = d;
            best = c;
          }
        }
        if labels[i] != best {
          labels[i] = best;
          changed = true;
        }
      }

      if !changed {
        break;
      }

      let mut sums = Array2::<f64>::zeros(centers.dim());
      let mut counts = vec![0usize; k];
      for (i, point) in points.axis_iter(Axis(0)).enumerate() {
        let mut row = sums.row_mut(labels[i]);
        row += &point;
        counts[labels[i]] += 1;
      }
      for c in 0..k {
        // empty clusters keep their previous center
        if counts[c] > 0 {
          let mean = &sums.row(c) / counts[c] as f64;
          centers.row_mut(c).assign(&mean);
        }
      }
    }

    Ok(labels)
  }
}

#[cfg(test)]
mod tests {
  use ndarray::array;

  use super::*;

  #[test]
  fn same_seed_gives_same_labels() {
    let points = array![[0.0, 0.1], [0.2, 0.0], [1.0, 1.1], [1.2, 0.9], [0.6, 0.5], [0.1, 0.9]];
    let d = Array2::<f64>::zeros((6, 6));
    let a = KMeans::default().assign(points.view(), d.view(), 3, 42).unwrap();
    let b = KMeans::default().assign(points.view(), d.view(), 3, 42).unwrap();
    assert_eq!(a, b);
    assert!(a.iter().all(|&l| l < 3));
  }

  #[test]
  fn identical_points_share_one_cluster() {
    let points = Array2::<f64>::ones((4, 3));
    let d = Array2::<f64>::zeros((4, 4));
    let labels = KMeans::default().assign(points.view(), d.view(), 2, 1).unwrap();
    assert!(labels.iter().all(|&l| l == labels[0]));
  }

  #[test]
  fn k_larger_than_points_is_rejected() {
    let points = array![[0.0], [1.0]];
    let d = Array2::<f64>::zeros((2, 2));
    assert!(KMeans::default()
      .assign(points.view(), d.view(), 3, 0)
      .unwrap_err()
      .is_invalid_hyperparameter());
  }

  #[test]
  fn zero_iterations_are_rejected() {
    let points = array![[0.0], [1.0], [2.0]];
    let d = Array2::<f64>::zeros((3, 3));
    assert!(KMeans::new(0)
      .assign(points.view(), d.view(), 2, 0)
      .unwrap_err()
      .is_invalid_hyperparameter());
  }
}
