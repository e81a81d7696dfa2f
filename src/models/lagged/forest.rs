//! Bagged ensemble of least-squares regression trees.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::model::Regressor;
use super::tree::{RegressionTree, TreeConfig};
use crate::error::{ForecastError, Result};
use crate::utils::CancelFlag;

/// Random forest hyperparameters.
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    /// Number of trees.
    pub n_estimators: usize,
    /// Maximum tree depth (None for fully grown trees).
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Seed for bootstrap sampling; None draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: None,
        }
    }
}

impl RandomForestConfig {
    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            ..Default::default()
        }
    }
}

/// Random forest regressor: every tree sees a bootstrap resample of the
/// training rows and the prediction is the mean over trees.
#[derive(Debug, Clone)]
pub struct RandomForest {
    config: RandomForestConfig,
    trees: Vec<RegressionTree>,
    width: Option<usize>,
    cancel: CancelFlag,
}

impl RandomForest {
    pub fn new(config: RandomForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            width: None,
            cancel: CancelFlag::default(),
        }
    }

    /// Stop growing trees with [`ForecastError::Cancelled`] once `cancel` is set.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &RandomForestConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(RandomForestConfig::default())
    }
}

impl Regressor for RandomForest {
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()> {
        let width = validate_training_set(features, targets)?;
        if self.config.n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "n_estimators must be positive".to_string(),
            ));
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let tree_config = self.config.tree_config();
        let n = targets.len();

        let mut trees = Vec::with_capacity(self.config.n_estimators);
        for _ in 0..self.config.n_estimators {
            if self.cancel.is_cancelled() {
                return Err(ForecastError::Cancelled);
            }
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            trees.push(RegressionTree::fit_least_squares(features, targets, sample, &tree_config));
        }
        self.trees = trees;
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
        let total: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        Ok(total / self.trees.len() as f64)
    }

    fn name(&self) -> &str {
        "RandomForest"
    }
}

/// Check that the training rows are non-empty, rectangular and aligned with
/// the labels. Returns the row width.
pub(crate) fn validate_training_set(features: &[Vec<f64>], targets: &[f64]) -> Result<usize> {
    if targets.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if features.len() != targets.len() {
        return Err(ForecastError::LengthMismatch {
            expected: targets.len(),
            got: features.len(),
        });
    }
    let width = features[0].len();
    if let Some(row) = features.iter().find(|row| row.len() != width) {
        return Err(ForecastError::LengthMismatch {
            expected: width,
            got: row.len(),
        });
    }
    Ok(width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linear_data(n: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
        let features = (0..n).map(|i| vec![i as f64, (i * 2) as f64]).collect();
        let targets = (0..n).map(|i| 3.0 * i as f64 + 1.0).collect();
        (features, targets)
    }

    #[test]
    fn seeded_forest_is_reproducible() {
        let (x, y) = linear_data(40);
        let config = RandomForestConfig::default().with_n_estimators(10).with_seed(7);

        let mut a = RandomForest::new(config.clone());
        let mut b = RandomForest::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        for row in &x {
            assert_eq!(a.predict_row(row).unwrap(), b.predict_row(row).unwrap());
        }
        assert_eq!(a.n_trees(), 10);
    }

    #[test]
    fn forest_tracks_training_signal() {
        let (x, y) = linear_data(60);
        let mut forest = RandomForest::new(RandomForestConfig::default().with_n_estimators(30).with_seed(3));
        forest.fit(&x, &y).unwrap();

        let pred = forest.predict_row(&[30.0, 60.0]).unwrap();
        assert_relative_eq!(pred, 91.0, epsilon = 6.0);
    }

    #[test]
    fn predictions_stay_within_label_range() {
        let (x, y) = linear_data(30);
        let mut forest = RandomForest::new(RandomForestConfig::default().with_n_estimators(20).with_seed(11));
        forest.fit(&x, &y).unwrap();

        let far = forest.predict_row(&[1000.0, 2000.0]).unwrap();
        assert!(far <= 88.0 + 1e-9);
        assert!(far >= 1.0);
    }

    #[test]
    fn cancelled_forest_grows_no_trees() {
        let (x, y) = linear_data(20);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let mut forest = RandomForest::default().with_cancel_flag(cancel);
        assert_eq!(forest.fit(&x, &y), Err(ForecastError::Cancelled));
        assert_eq!(forest.n_trees(), 0);
    }

    #[test]
    fn unfitted_forest_refuses_to_predict() {
        let forest = RandomForest::default();
        assert_eq!(forest.predict_row(&[1.0]), Err(ForecastError::FitRequired));
    }

    #[test]
    fn row_width_is_checked() {
        let (x, y) = linear_data(10);
        let mut forest = RandomForest::new(RandomForestConfig::default().with_n_estimators(2).with_seed(1));
        forest.fit(&x, &y).unwrap();
        assert_eq!(
            forest.predict_row(&[1.0]),
            Err(ForecastError::LengthMismatch { expected: 2, got: 1 })
        );
    }

    #[test]
    fn training_set_validation() {
        assert_eq!(validate_training_set(&[], &[]), Err(ForecastError::EmptyData));
        assert!(validate_training_set(&[vec![1.0]], &[1.0, 2.0]).is_err());
        assert!(validate_training_set(&[vec![1.0], vec![1.0, 2.0]], &[1.0, 2.0]).is_err());
        assert_eq!(validate_training_set(&[vec![1.0, 2.0]], &[1.0]), Ok(2));
    }
}
