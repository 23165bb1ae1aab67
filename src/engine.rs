//! # OPS Engine
//!
//! $$
//! \mathbf B=\operatorname{Run}_{\mathcal A}(\mathbf X, H, \mathbf b_1)
//! $$
//!
//! Strategy trait, injected numerical services and the high-level engine
//! that dispatches over every built-in algorithm.

use ndarray::Array1;

use crate::algorithms::Bk;
use crate::algorithms::ClusLog;
use crate::algorithms::Corn;
use crate::algorithms::CornK;
use crate::algorithms::CwOgd;
use crate::algorithms::Eg;
use crate::algorithms::Ktpt;
use crate::algorithms::Olmar;
use crate::algorithms::Ons;
use crate::algorithms::Pamr;
use crate::algorithms::Rmr;
use crate::algorithms::Tco;
use crate::algorithms::TcoVariant;
use crate::cluster::ClusterMethod;
use crate::cluster::Clusterer;
use crate::cluster::KMeans;
use crate::cluster::KMedoids;
use crate::error::Result;
use crate::market::Market;
use crate::regression::Lasso;
use crate::regression::SparseRegressor;
use crate::solver::NelderMeadSolver;
use crate::solver::ProjectedGradient;
use crate::solver::SimplexSolver;
use crate::solver::SolverKind;
use crate::types::OpsResult;

/// Numerical collaborators handed to every strategy run.
pub struct Services {
  pub solver: Box<dyn SimplexSolver>,
  pub kmeans: Box<dyn Clusterer>,
  pub kmedoids: Box<dyn Clusterer>,
  pub regressor: Box<dyn SparseRegressor>,
  /// Base seed for randomized clustering.
  pub seed: u64,
}

impl Default for Services {
  fn default() -> Self {
    Self::from_config(&OpsEngineConfig::default())
  }
}

impl Services {
  /// Default service implementations selected by `config`.
  pub fn from_config(config: &OpsEngineConfig) -> Self {
    let solver: Box<dyn SimplexSolver> = match config.solver {
      SolverKind::ProjectedGradient => Box::new(ProjectedGradient::default()),
      SolverKind::NelderMead => Box::new(NelderMeadSolver::default()),
    };
    Self {
      solver,
      kmeans: Box::new(KMeans::default()),
      kmedoids: Box::new(KMedoids::default()),
      regressor: Box::new(Lasso {
        alpha: config.lasso_alpha,
        ..Lasso::default()
      }),
      seed: config.seed,
    }
  }

  pub fn clusterer(&self, method: ClusterMethod) -> &dyn Clusterer {
    match method {
      ClusterMethod::KMeans => self.kmeans.as_ref(),
      ClusterMethod::KMedoids => self.kmedoids.as_ref(),
    }
  }
}

/// An online portfolio selection strategy.
pub trait Strategy {
  /// Identifier stored in the [`OpsResult`].
  fn name(&self) -> &'static str;

  /// Weights for the last `horizon` relative periods of `market`.
  ///
  /// `initial`, when given, is the first day's portfolio; it must have one
  /// entry per asset and sum to 1.
  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    services: &Services,
  ) -> Result<OpsResult>;
}

/// Every built-in strategy.
#[derive(Clone, Debug)]
pub enum Algorithm {
  Bk(Bk),
  Corn(Corn),
  CornK(CornK),
  ClusLog(ClusLog),
  Rmr(Rmr),
  Tco(Tco),
  Ons(Ons),
  Ktpt(Ktpt),
  CwOgd(CwOgd),
  Eg(Eg),
  Pamr(Pamr),
  Olmar(Olmar),
}

impl Algorithm {
  /// Parse an algorithm name into its default parameterization.
  pub fn from_name(s: &str) -> Option<Self> {
    let algorithm = match s.to_lowercase().as_str() {
      "bk" => Self::Bk(Bk::default()),
      "corn" | "corn-u" | "cornu" => Self::Corn(Corn::default()),
      "corn-k" | "cornk" => Self::CornK(CornK::default()),
      "cluslog" => Self::ClusLog(ClusLog::default()),
      "rmr" => Self::Rmr(Rmr::default()),
      "tco1" | "tco" => Self::Tco(Tco::default()),
      "tco2" => Self::Tco(Tco {
        variant: TcoVariant::Tco2 { window: 5 },
        ..Tco::default()
      }),
      "ons" => Self::Ons(Ons::default()),
      "ktpt" => Self::Ktpt(Ktpt::default()),
      "cwogd" | "cw-ogd" => Self::CwOgd(CwOgd::default()),
      "eg" => Self::Eg(Eg::default()),
      "pamr" => Self::Pamr(Pamr::default()),
      "olmar" => Self::Olmar(Olmar::default()),
      _ => return None,
    };
    Some(algorithm)
  }

  fn strategy(&self) -> &dyn Strategy {
    match self {
      Self::Bk(a) => a,
      Self::Corn(a) => a,
      Self::CornK(a) => a,
      Self::ClusLog(a) => a,
      Self::Rmr(a) => a,
      Self::Tco(a) => a,
      Self::Ons(a) => a,
      Self::Ktpt(a) => a,
      Self::CwOgd(a) => a,
      Self::Eg(a) => a,
      Self::Pamr(a) => a,
      Self::Olmar(a) => a,
    }
  }
}

impl Strategy for Algorithm {
  fn name(&self) -> &'static str {
    self.strategy().name()
  }

  fn run(
    &self,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
    services: &Services,
  ) -> Result<OpsResult> {
    self.strategy().run(market, horizon, initial, services)
  }
}

/// Runtime configuration for [`OpsEngine`].
#[derive(Clone, Debug)]
pub struct OpsEngineConfig {
  /// Backend behind [`SimplexSolver`].
  pub solver: SolverKind,
  /// Base seed for clustering; repetition `r` uses `seed + r`.
  pub seed: u64,
  /// L1 penalty of the default sparse regressor.
  pub lasso_alpha: f64,
}

impl Default for OpsEngineConfig {
  fn default() -> Self {
    Self {
      solver: SolverKind::ProjectedGradient,
      seed: 0,
      lasso_alpha: 1e-3,
    }
  }
}

/// Single entry point owning configuration and services.
pub struct OpsEngine {
  config: OpsEngineConfig,
  services: Services,
}

impl OpsEngine {
  /// Construct a new engine with explicit configuration.
  pub fn new(config: OpsEngineConfig) -> Self {
    let services = Services::from_config(&config);
    Self { config, services }
  }

  /// Construct an engine around custom services.
  pub fn with_services(config: OpsEngineConfig, services: Services) -> Self {
    Self { config, services }
  }

  pub fn config(&self) -> &OpsEngineConfig {
    &self.config
  }

  pub fn services(&self) -> &Services {
    &self.services
  }

  /// Run `algorithm` over the last `horizon` periods of `market`.
  pub fn run(
    &self,
    algorithm: &Algorithm,
    market: &Market,
    horizon: usize,
    initial: Option<&Array1<f64>>,
  ) -> Result<OpsResult> {
    algorithm.run(market, horizon, initial, &self.services)
  }
}

impl Default for OpsEngine {
  fn default() -> Self {
    Self::new(OpsEngineConfig::default())
  }
}

#[cfg(test)]
mod tests {
  use ndarray::array;

  use super::*;
  use crate::algorithms::testing::assert_on_simplex;
  use crate::algorithms::testing::oscillating;
  use crate::algorithms::testing::trending;

  const NAMES: [&str; 13] = [
    "bk", "corn", "corn-k", "cluslog", "rmr", "tco1", "tco2", "ons", "ktpt", "cwogd", "eg",
    "pamr", "olmar",
  ];

  #[test]
  fn every_algorithm_returns_simplex_columns_of_the_right_shape() {
    let engine = OpsEngine::default();
    for market in [oscillating(30), trending(30)] {
      for name in NAMES {
        let algorithm = Algorithm::from_name(name).unwrap();
        let result = engine.run(&algorithm, &market, 12, None).unwrap();
        assert_eq!(result.weights.dim(), (market.n_assets(), 12), "{name}");
        assert_eq!(result.n_assets, market.n_assets());
        assert_on_simplex(&result);
      }
    }
  }

  #[test]
  fn repeated_runs_are_identical() {
    let engine = OpsEngine::default();
    let market = trending(25);
    for name in NAMES {
      let algorithm = Algorithm::from_name(name).unwrap();
      let a = engine.run(&algorithm, &market, 10, None).unwrap();
      let b = engine.run(&algorithm, &market, 10, None).unwrap();
      assert_eq!(a.weights, b.weights, "{name}");
    }
  }

  #[test]
  fn zero_horizon_is_rejected_by_every_algorithm() {
    let engine = OpsEngine::default();
    let market = oscillating(20);
    for name in NAMES {
      let algorithm = Algorithm::from_name(name).unwrap();
      let err = engine.run(&algorithm, &market, 0, None).unwrap_err();
      assert!(err.is_invalid_hyperparameter(), "{name}: {err}");
    }
  }

  #[test]
  fn supplied_initial_weights_are_used_on_the_first_day() {
    let engine = OpsEngine::default();
    let market = oscillating(20);
    let initial = array![0.8, 0.2];
    for name in NAMES {
      let algorithm = Algorithm::from_name(name).unwrap();
      let result = engine.run(&algorithm, &market, 8, Some(&initial)).unwrap();
      assert_eq!(result.column(0).to_owned(), initial, "{name}");
    }
  }

  #[test]
  fn nelder_mead_backend_runs_log_optimal_strategies() {
    let engine = OpsEngine::new(OpsEngineConfig {
      solver: SolverKind::NelderMead,
      ..OpsEngineConfig::default()
    });
    let market = trending(15);
    let result = engine
      .run(&Algorithm::from_name("corn").unwrap(), &market, 5, None)
      .unwrap();
    assert_on_simplex(&result);
  }

  #[test]
  fn unknown_names_are_not_parsed() {
    assert!(Algorithm::from_name("nope").is_none());
    assert_eq!(Algorithm::from_name("TCO2").unwrap().name(), "tco2");
  }
}
