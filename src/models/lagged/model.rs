//! Lagged-window regression forecaster with recursive multi-step rollout.

use std::collections::VecDeque;

use super::window::lagged_windows;
use crate::core::{Forecast, Series};
use crate::error::{ForecastError, Result};
use crate::models::Forecaster;
use crate::utils::CancelFlag;

/// Supervised learner that maps a fixed-width feature row to one value.
pub trait Regressor: Send {
    /// Train on `features` (one row per label) and `targets`.
    fn fit(&mut self, features: &[Vec<f64>], targets: &[f64]) -> Result<()>;

    /// Predict a single row. Fails before `fit` or on a width mismatch.
    fn predict_row(&self, row: &[f64]) -> Result<f64>;

    fn name(&self) -> &str;
}

/// Window configuration for lagged forecasters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaggedConfig {
    /// Number of past values used as features.
    pub lag: usize,
}

impl Default for LaggedConfig {
    fn default() -> Self {
        Self { lag: 10 }
    }
}

impl LaggedConfig {
    pub fn with_lag(mut self, lag: usize) -> Self {
        self.lag = lag;
        self
    }
}

/// Forecaster that regresses each value on the `lag` values before it.
///
/// Multi-step forecasts are produced recursively: each prediction is pushed
/// into the window and the oldest value drops out.
#[derive(Debug, Clone)]
pub struct LaggedForecaster<R> {
    regressor: R,
    config: LaggedConfig,
    window: Option<Vec<f64>>,
    fitted: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
    cancel: CancelFlag,
}

impl<R: Regressor> LaggedForecaster<R> {
    pub fn new(regressor: R, config: LaggedConfig) -> Self {
        Self {
            regressor,
            config,
            window: None,
            fitted: None,
            residuals: None,
            cancel: CancelFlag::default(),
        }
    }

    /// End rollouts with [`ForecastError::Cancelled`] once `cancel` is set.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> LaggedConfig {
        self.config
    }

    pub fn regressor(&self) -> &R {
        &self.regressor
    }

    /// Lazily roll the fitted model forward `steps` times.
    pub fn rollout(&self, steps: usize) -> Result<Rollout<'_, R>> {
        let window = self.window.as_ref().ok_or(ForecastError::FitRequired)?;
        Ok(Rollout::new(&self.regressor, window, steps, &self.cancel))
    }
}

impl<R: Regressor> Forecaster for LaggedForecaster<R> {
    fn fit(&mut self, series: &Series) -> Result<()> {
        let values = series.values();
        let matrix = lagged_windows(values, self.config.lag)?;

        self.regressor.fit(&matrix.features, &matrix.targets)?;

        let fitted = matrix
            .features
            .iter()
            .map(|row| self.regressor.predict_row(row))
            .collect::<Result<Vec<_>>>()?;
        let residuals = matrix
            .targets
            .iter()
            .zip(&fitted)
            .map(|(y, f)| y - f)
            .collect();

        self.window = Some(values[values.len() - self.config.lag..].to_vec());
        self.fitted = Some(fitted);
        self.residuals = Some(residuals);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let values = self.rollout(horizon)?.collect::<Result<Vec<_>>>()?;
        let forecast = Forecast::from_values(values);
        if !forecast.is_finite() {
            return Err(ForecastError::ModelFitFailure(format!(
                "non-finite {} forecast",
                self.regressor.name()
            )));
        }
        Ok(forecast)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        self.regressor.name()
    }
}

/// Iterator over recursive one-step predictions.
///
/// Holds a window of exactly `lag` values; every step predicts from the
/// window, evicts the oldest value and appends the prediction. Stops after
/// the requested number of steps, after the first error, or once its
/// cancel flag is set.
pub struct Rollout<'a, R> {
    regressor: &'a R,
    window: VecDeque<f64>,
    remaining: usize,
    cancel: &'a CancelFlag,
}

impl<'a, R: Regressor> Rollout<'a, R> {
    fn new(regressor: &'a R, window: &[f64], steps: usize, cancel: &'a CancelFlag) -> Self {
        Self {
            regressor,
            window: window.iter().copied().collect(),
            remaining: steps,
            cancel,
        }
    }
}

impl<R: Regressor> Iterator for Rollout<'_, R> {
    type Item = Result<f64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        if self.cancel.is_cancelled() {
            self.remaining = 0;
            return Some(Err(ForecastError::Cancelled));
        }
        let row: Vec<f64> = self.window.iter().copied().collect();
        match self.regressor.predict_row(&row) {
            Ok(value) => {
                self.remaining -= 1;
                self.window.pop_front();
                self.window.push_back(value);
                Some(Ok(value))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
