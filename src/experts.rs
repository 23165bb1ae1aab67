//! # Experts
//!
//! $$
//! \mathbf b_t=\frac{\sum_e q_e S_{e,t-1}\,\mathbf h_{e,t}}{\sum_e q_e S_{e,t-1}},\qquad S_{e,t}=S_{e,t-1}\,\mathbf h_{e,t}^\top\mathbf x_t
//! $$
//!
//! Expert bookkeeping shared by the meta-algorithms: wealth-weighted
//! mixtures, co-cluster voting and opinion combination.

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ordered_float::OrderedFloat;

use crate::simplex::uniform;

/// Per-expert portfolios (one column per expert) and cumulative wealth.
#[derive(Clone, Debug)]
pub struct ExpertPool {
  portfolios: Array2<f64>,
  wealth: Array1<f64>,
}

impl ExpertPool {
  /// Every expert starts with uniform weights and unit wealth.
  pub fn new(n_assets: usize, n_experts: usize) -> Self {
    Self {
      portfolios: Array2::from_elem((n_assets, n_experts), 1.0 / n_assets as f64),
      wealth: Array1::ones(n_experts),
    }
  }

  pub fn n_experts(&self) -> usize {
    self.wealth.len()
  }

  pub fn portfolios(&self) -> ArrayView2<'_, f64> {
    self.portfolios.view()
  }

  pub fn wealth(&self) -> ArrayView1<'_, f64> {
    self.wealth.view()
  }

  pub fn set_portfolio(&mut self, expert: usize, weights: ArrayView1<f64>) {
    self.portfolios.column_mut(expert).assign(&weights);
  }

  /// Wealth-weighted mixture of every expert portfolio (uniform prior).
  pub fn mix(&self) -> Array1<f64> {
    let experts: Vec<usize> = (0..self.n_experts()).collect();
    self.mix_of(&experts)
  }

  /// Wealth-weighted mixture of the `k` wealthiest experts. Ties keep the
  /// lower expert index.
  pub fn top_k_mix(&self, k: usize) -> Array1<f64> {
    let mut order: Vec<usize> = (0..self.n_experts()).collect();
    order.sort_by_key(|&e| std::cmp::Reverse(OrderedFloat(self.wealth[e])));
    order.truncate(k.max(1));
    self.mix_of(&order)
  }

  fn mix_of(&self, experts: &[usize]) -> Array1<f64> {
    let n_assets = self.portfolios.nrows();
    let total: f64 = experts.iter().map(|&e| self.wealth[e]).sum();
    if !(total.is_finite() && total > 0.0) {
      return uniform(n_assets);
    }

    let mut mixed = Array1::<f64>::zeros(n_assets);
    for &e in experts {
      mixed.scaled_add(self.wealth[e] / total, &self.portfolios.column(e));
    }
    mixed
  }

  /// Multiply each expert's wealth by its realized growth `hₑ · x`.
  pub fn update(&mut self, relatives: ArrayView1<f64>) {
    let growth = relatives.dot(&self.portfolios);
    self.wealth *= &growth;

    // rescale so wealth never underflows over long horizons
    let max = self.wealth.iter().copied().fold(0.0, f64::max);
    if max > 0.0 && max.is_finite() {
      self.wealth /= max;
    }
  }
}

/// Co-cluster counts of every window with a reference window across
/// repeated clusterings.
#[derive(Clone, Debug)]
pub struct CoClusterVotes {
  reference: usize,
  counts: Vec<usize>,
  rounds: usize,
}

impl CoClusterVotes {
  pub fn new(n_windows: usize, reference: usize) -> Self {
    Self {
      reference,
      counts: vec![0; n_windows],
      rounds: 0,
    }
  }

  /// Count one labelling.
  pub fn record(&mut self, labels: &[usize]) {
    let own = labels[self.reference];
    for (count, &label) in self.counts.iter_mut().zip(labels) {
      if label == own {
        *count += 1;
      }
    }
    self.rounds += 1;
  }

  pub fn rounds(&self) -> usize {
    self.rounds
  }

  /// Windows co-clustered with the reference in at least `threshold`
  /// rounds, excluding the reference itself.
  pub fn similar(&self, threshold: usize) -> Vec<usize> {
    self
      .counts
      .iter()
      .enumerate()
      .filter(|&(i, &c)| i != self.reference && c >= threshold && c > 0)
      .map(|(i, _)| i)
      .collect()
  }
}

/// Portfolio implied by mixing expert opinions: `O ω`.
pub fn mix_opinions(opinions: ArrayView2<f64>, mixture: ArrayView1<f64>) -> Array1<f64> {
  opinions.dot(&mixture)
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn mixture_weights_experts_by_wealth() {
    let mut pool = ExpertPool::new(2, 2);
    pool.set_portfolio(0, array![1.0, 0.0].view());
    pool.set_portfolio(1, array![0.0, 1.0].view());
    assert_abs_diff_eq!(pool.mix(), array![0.5, 0.5], epsilon = 1e-12);

    // asset 0 triples, asset 1 flat: wealth 3 vs 1
    pool.update(array![3.0, 1.0].view());
    assert_abs_diff_eq!(pool.mix(), array![0.75, 0.25], epsilon = 1e-12);
    assert_abs_diff_eq!(pool.wealth()[0] / pool.wealth()[1], 3.0, epsilon = 1e-12);
  }

  #[test]
  fn top_k_keeps_the_wealthiest() {
    let mut pool = ExpertPool::new(3, 3);
    for e in 0..3 {
      let mut w = Array1::zeros(3);
      w[e] = 1.0;
      pool.set_portfolio(e, w.view());
    }
    pool.update(array![1.0, 2.0, 4.0].view());

    assert_abs_diff_eq!(pool.top_k_mix(1), array![0.0, 0.0, 1.0], epsilon = 1e-12);
    assert_abs_diff_eq!(pool.top_k_mix(2), array![0.0, 1.0 / 3.0, 2.0 / 3.0], epsilon = 1e-12);
  }

  #[test]
  fn votes_respect_threshold_and_exclude_reference() {
    let mut votes = CoClusterVotes::new(4, 3);
    votes.record(&[0, 1, 0, 0]);
    votes.record(&[1, 1, 0, 1]);
    votes.record(&[0, 0, 1, 0]);

    assert_eq!(votes.rounds(), 3);
    assert_eq!(votes.similar(3), vec![0]);
    assert_eq!(votes.similar(2), vec![0, 1]);
    assert_eq!(votes.similar(1), vec![0, 1, 2]);
  }

  #[test]
  fn identity_opinions_return_the_mixture() {
    let omega = array![0.2, 0.8];
    assert_abs_diff_eq!(
      mix_opinions(Array2::<f64>::eye(2).view(), omega.view()),
      omega,
      epsilon = 1e-12
    );
  }
}
