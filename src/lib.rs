//! # olps
//!
//! Online portfolio selection: sequential strategies that turn a price
//! history into one simplex portfolio per trading period.
//!
//! ## Modules
//!
//! | Module           | Description                                                                 |
//! |------------------|-----------------------------------------------------------------------------|
//! | [`algorithms`]   | BK, CORN, ClusLog, RMR, TCO, ONS, KTPT, CW-OGD, EG, PAMR and OLMAR.          |
//! | [`engine`]       | `Strategy` trait, injected `Services` and the `OpsEngine` dispatcher.       |
//! | [`market`]       | Validated price and relative-price matrices.                                |
//! | [`simplex`]      | Simplex projections and positivity repair.                                  |
//! | [`similarity`]   | Windowed Pearson / Euclidean similarity search.                             |
//! | [`solver`]       | Constrained projection and log-utility solvers.                             |
//! | [`cluster`]      | k-means, k-medoids and silhouette-based cluster counts.                     |
//! | [`regression`]   | Lasso behind the `SparseRegressor` service.                                 |
//! | [`experts`]      | Wealth-weighted expert pools and co-cluster voting.                         |
//! | [`estimators`]   | Median, moving-average, peak and trend price predictors.                    |
//!
//! ## Parallelism
//!
//! Expert-based strategies (BK, CORN-K) evaluate their experts with `rayon`
//! inside each period; periods themselves are sequential.

mod macros;

pub mod algorithms;
pub mod cluster;
pub mod engine;
pub mod error;
pub mod estimators;
pub mod experts;
pub mod market;
pub mod regression;
pub mod schedule;
pub mod similarity;
pub mod simplex;
pub mod solver;
pub mod types;

pub use engine::Algorithm;
pub use engine::OpsEngine;
pub use engine::OpsEngineConfig;
pub use engine::Services;
pub use engine::Strategy;
pub use error::OpsError;
pub use error::Result;
pub use market::Market;
pub use types::OpsResult;
