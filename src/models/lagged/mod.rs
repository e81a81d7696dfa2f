//! Tree-ensemble regressors over lagged windows.
//!
//! - [`lagged_windows`] turns a series into supervised rows
//! - [`RandomForest`] bags least-squares trees
//! - [`GradientBoostedTrees`] boosts regularised trees on squared loss
//! - [`LaggedForecaster`] wraps any [`Regressor`] into a [`Forecaster`](crate::models::Forecaster)

mod boosting;
mod forest;
mod model;
mod tree;
mod window;

pub use boosting::{BoostingConfig, GradientBoostedTrees};
pub use forest::{RandomForest, RandomForestConfig};
pub use model::{LaggedConfig, LaggedForecaster, Regressor, Rollout};
pub use tree::{RegressionTree, TreeConfig};
pub use window::{lagged_windows, LagMatrix};
