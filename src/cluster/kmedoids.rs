//! # k-medoids
//!
//! $$
//! \min_{m_1..m_k}\sum_i \min_c d(i,m_c)
//! $$
//!
//! Alternating (Voronoi iteration) k-medoids on a distance matrix.

use anyhow::anyhow;
use impl_new_derive::ImplNew;
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::plus_plus_seeds;
use super::Clusterer;
use crate::error::OpsError;
use crate::error::Result;
use crate::macros::ensure_param;

fn nearest_medoid(distances: ArrayView2<f64>, i: usize, medoids: &[usize]) -> usize {
  let mut best = 0;
  let mut best_d = f64::INFINITY;
  for (c, &m) in medoids.iter().enumerate() {
    let d = distances[[i, m]];
    if d < best_d {
      best_d = d;
      best = c;
    }
  }
  best
}

#[derive(ImplNew, Clone, Debug)]
pub struct KMedoids {
  pub max_iters: usize,
}

impl Default for KMedoids {
  fn default() -> Self {
    Self { max_iters: 100 }
  }
}

impl Clusterer for KMedoids {
  fn name(&self) -> &'static str {
    "k-medoids"
  }

  fn assign(
    &self,
    _points: ArrayView2<f64>,
    distances: ArrayView2<f64>,
    k: usize,
    seed: u64,
  ) -> Result<Vec<usize>> {
    let n = distances.nrows();
    if distances.ncols() != n {
      return Err(OpsError::Solver(anyhow!(
        "k-medoids needs a square distance matrix, got {:?}",
        distances.dim()
      )));
    }
    ensure_param!(k >= 1 && k <= n, "k", k, "1 <= k <= number of observations");

    let mut rng = StdRng::seed_from_u64(seed);
    let mut medoids = plus_plus_seeds(n, k, &mut rng, |i, j| distances[[i, j]]);
    let mut labels: Vec<usize> = (0..n).map(|i| nearest_medoid(distances, i, &medoids)).collect();

    for _ in 0..self.max_iters {
      let mut next = medoids.clone();
      for (c, medoid) in next.iter_mut().enumerate() {
        let members: Vec<usize> = (0..n).filter(|&i| labels[i] == c).collect();
        let best = members.iter().copied().min_by(|&a, &b| {
          let ca: f64 = members.iter().map(|&j| distances[[a, j]]).sum();
          let cb: f64 = members.iter().map(|&j| distances[[b, j]]).sum();
          ca.total_cmp(&cb)
        });
        if let Some(best) = best {
          *medoid = best;
        }
      }

      if next == medoids {
        break;
      }
      medoids = next;
      labels = (0..n).map(|i| nearest_medoid(distances, i, &medoids)).collect();
    }

    Ok(labels)
  }
}
