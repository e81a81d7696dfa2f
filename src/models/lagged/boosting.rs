//! Gradient boosted trees under squared loss.
//!
//! Each round fits a tree to the gradient statistics of the current
//! ensemble (`g = prediction - y`, `h = 1`) with leaf weights
//! `-G / (H + lambda)` and adds it scaled by the learning rate. The
//! ensemble starts from the label mean.

use super::forest::validate_training_set;
use super::model::Regressor;
use super::tree::{RegressionTree, TreeConfig};
use crate::error::{ForecastError, Result};
use crate::utils::stats::mean;
use crate::utils::CancelFlag;

/// Boosting hyperparameters.
#[derive(Debug, Clone)]
pub struct BoostingConfig {
    /// Number of boosting rounds.
    pub n_estimators: usize,
    /// Shrinkage applied to each tree (eta).
    pub learning_rate: f64,
    pub max_depth: usize,
    /// L2 penalty on leaf weights.
    pub lambda: f64,
    /// Minimum loss reduction to split.
    pub gamma: f64,
    pub min_child_weight: f64,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
        }
    }
}

impl BoostingConfig {
    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "n_estimators must be positive".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.lambda < 0.0 || self.gamma < 0.0 || self.min_child_weight < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "lambda, gamma and min_child_weight must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: Some(self.max_depth),
            min_samples_split: 2,
            min_samples_leaf: 1,
            min_child_weight: self.min_child_weight,
            lambda: self.lambda,
            gamma: self.gamma,
        }
    }
}

/// Additive tree ensemble fitted by Newton boosting on squared error.
#[derive(Debug, Clone)]
pub struct GradientBoostedTrees {
    config: BoostingConfig,
    base_score: f64,
    trees: Vec<RegressionTree>,
    width: Option<usize>,
    cancel: CancelFlag,
}

impl GradientBoostedTrees {
    pub fn new(config: BoostingConfig) -> Self {
        Self {
            config,
            base_score: 0.0,
            trees: Vec::new(),
            width: None,
            cancel: CancelFlag::default(),
        }
    }

    /// Stop boosting with [`ForecastError::Cancelled`] once `cancel` is set.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &BoostingConfig {
        &self.config
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn raw_predict(&self, row: &[f64]) -> f64 {
        self.trees.iter().fold(self.base_score, |acc, tree| {
            acc + self.config.learning_rate * tree.predict(row)
        })
    }
}

impl Default for GradientBoostedTrees {
    fn default() -> Self {
        Self::new(BoostingConfig::default())
    }
}

impl Regressor for GradientBoostedTrees {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        let width = validate_training_set(features, targets)?;
        self.config.validate()?;

        let n = targets.len();
        self.base_score = mean(targets);
        self.trees.clear();

        let tree_config = self.config.tree_config();
        let hessians = vec![1.0; n];
        let mut predictions = vec![self.base_score; n];

        for _ in 0..self.config.n_estimators {
            if self.cancel.is_cancelled() {
                self.trees.clear();
                self.width = None;
                return Err(ForecastError::Cancelled);
            }
            let gradients: Vec<f64> = predictions
                .iter()
                .zip(targets)
                .map(|(p, y)| p - y)
                .collect();
            let tree = RegressionTree::fit(features, &gradients, &hessians, (0..n).collect(), &tree_config);
            for (p, row) in predictions.iter_mut().zip(features) {
                *p += self.config.learning_rate * tree.predict(row);
            }
            self.trees.push(tree);
        }

        if predictions.iter().any(|p| !p.is_finite()) {
            return Err(ForecastError::ModelFitFailure(
                "boosting produced non-finite predictions".to_string(),
            ));
        }
        self.width = Some(width);
        Ok(())
    }

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let width = self.width.ok_or(ForecastError::FitRequired)?;
        if row.len() != width {
            return Err(ForecastError::LengthMismatch {
                expected: width,
                got: row.len(),
            });
        }
        Ok(self.raw_predict(row))
    }

    fn name(&self) -> &str {
        "XGBoost"
    }
}
