//! # ClusLog
//!
//! $$
//! \mathbf b_{t+1}=\arg\max_{l\le b_j\le u,\ \mathbf 1^\top\mathbf b=1}\ \sum_{i\in\mathcal S_t}m_i\log(\mathbf b^\top\mathbf x_i)
//! $$
//!
//! Cluster-driven log-optimal strategy. For every window length the past
//! windows are clustered repeatedly; windows that keep landing in the same
//! cluster as the latest window vote for the period that followed them.
//! `mᵢ` counts the votes of period `i` pooled over every window length.

use std::collections::BTreeMap;

use impl_new_derive::ImplNew;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;

use super::drift;
use super::initial_or_uniform;
use crate::cluster::best_cluster_count;
use crate::cluster::ClusterMethod;
use crate::engine::Services;
use crate::engine::Strategy;
use crate::error::Result;
use crate::experts::CoClusterVotes;
use crate::macros::ensure_data;
use crate::macros::ensure_param;
use crate::market::Market;
use crate::schedule::Schedule;
use crate::schedule::Trajectory;
use crate::similarity::similarity_matrix;
use crate::similarity::window;
use crate::similarity::window_starts;
use crate::similarity::WindowMetric;
use crate::simplex::project_box_simplex;
use crate::simplex::uniform;
use crate::solver::Bounds;
use crate::types::OpsResult;

/// Windows needed before clustering is attempted.
const MIN_WINDOWS: usize = 3;

#[derive(ImplNew, Clone, Debug)]
pub struct ClusLog {
  /// Largest window length `TW`; lengths `2..=TW` are used.
  pub max_window: usize,
  /// Largest cluster count tried by the silhouette search.
  pub n_clusters: usize,
  /// Repeated clusterings per window length.
  pub n_clusterings: usize,
  pub method: ClusterMethod,
  pub bounds: Bounds,
}

impl Default for ClusLog {
  fn default() -> Self {
    Self {
      max_window: 5,
      n_clusters: 5,
      n_clusterings: 10,
      method: ClusterMethod::KMeans,
      bounds: Bounds::default(),
    }
  }
}

impl ClusLog {
  fn validate(&self, n_assets: usize) -> Result<()> {
    ensure_param!(self.max_window >= 2, "max_window", self.max_window, "max_window >= 2");
    ensure_param!(self.n_clusters >= 2, "n_clusters", self.n_clusters, "n_clusters >= 2");
    ensure_param!(
      self.n_clusterings >= 1,
      "n_clusterings",
      self.n_clusterings,
      "n_clusterings >= 1"
    );
    self.bounds.validate(n_assets)
  }

  /// Co-clustering votes needed to call a window similar.
  fn vote_threshold(&self) -> usize {
    (0.8 * self.n_clusterings as f64).ceil() as usize
  }

  /// Follow-up periods of windows similar to the latest one, with their
  /// multiplicity across window lengths.
  fn similar_periods(
    &self,
    relatives: ArrayView2<f64>,
    s: usize,
    services: &Services,
  ) -> Result<BTreeMap<usize, usize>> {
    let clusterer = services.clusterer(self.method);
    let mut periods = BTreeMap::new();

    for tw in 2..=self.max_window {
      let starts = window_starts(s, tw);
      let n_windows = starts.len();
      if n_windows < MIN_WINDOWS {
        continue;
      }

      let mut points = Array2::<f64>::zeros((n_windows, relatives.nrows() * tw));
      for (row, start) in starts.enumerate() {
        let flat = Array1::from_iter(window(relatives, start, tw).iter().copied());
        points.row_mut(row).assign(&flat);
      }
      let distances = similarity_matrix(relatives, s, tw, WindowMetric::Pearson)
        .mapv(|r| WindowMetric::Pearson.to_distance(r));

      let mut votes = CoClusterVotes::new(n_windows, n_windows - 1);
      for rep in 0..self.n_clusterings {
        let seed = services.seed.wrapping_add(rep as u64);
        if let Some((_, labels)) =
          best_cluster_count(clusterer, points.view(), distances.view(), self.n_clusters, seed)?
        {
          votes.record(&labels);
        }
      }

      for start in votes.similar(self.vote_threshold()) {
        *periods.entry(start + tw).or_insert(0) += 1;
      }
    }

    Ok(periods)
  }
}

impl Strategy for ClusLog {
  fn name(&self) -> &'static str {
    "cluslog"
  }

  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    services: &Services,
  ) -> Result<OpsResult> {
    let n_assets = market.n_assets();
    self.validate(n_assets)?;
    let schedule = Schedule::new(market, horizon, self.name())?;
    ensure_data!(
      schedule.first_period() >= self.max_window,
      self.name(),
      schedule.first_period(),
      "{} relative periods of history before the first investment period",
      self.max_window
    );
    let mut initial = schedule.initial_weights(initial)?;

    let relatives = market.relatives().view();
    let mut trajectory = Trajectory::new(self.name(), &schedule);

    for day in schedule.days() {
      let s = schedule.period(day);
      if day == 0 && initial.is_some() {
        trajectory.push(initial_or_uniform(initial.take(), n_assets).view());
        continue;
      }

      let periods = self.similar_periods(relatives, s, services)?;
      let weights = if periods.is_empty() {
        tracing::debug!(day, period = s, "no similar windows, keeping previous weights");
        match trajectory.previous() {
          Some(prev) => project_box_simplex(
            drift(prev, relatives.column(s - 1)).view(),
            self.bounds.lower,
            self.bounds.upper,
          ),
          None => uniform(n_assets),
        }
      } else {
        let followers: Vec<usize> = periods.keys().copied().collect();
        let support = relatives.select(Axis(1), &followers);
        let coefficients = Array1::from_iter(periods.values().map(|&m| m as f64));
        services
          .solver
          .maximize_log_utility(support.view(), coefficients.view(), self.bounds)?
      };
      trajectory.push(weights.view());
    }

    Ok(trajectory.finish())
  }
}
