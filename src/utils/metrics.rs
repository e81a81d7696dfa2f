//! Accuracy metrics for forecast evaluation.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Point-forecast accuracy against observed values.
///
/// All fields are finite and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Mean Absolute Error
    #[serde(rename = "MAE")]
    pub mae: f64,
    /// Root Mean Squared Error
    #[serde(rename = "RMSE")]
    pub rmse: f64,
    /// Mean Absolute Percentage Error over non-zero actuals
    #[serde(rename = "MAPE")]
    pub mape: f64,
}

/// Metrics for one strategy, or the reason they could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricsOutcome {
    Scored(Metrics),
    Failure {
        #[serde(rename = "error")]
        reason: String,
    },
}

impl MetricsOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        MetricsOutcome::Failure {
            reason: reason.into(),
        }
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        match self {
            MetricsOutcome::Scored(m) => Some(m),
            MetricsOutcome::Failure { .. } => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, MetricsOutcome::Failure { .. })
    }
}

impl From<Result<Metrics>> for MetricsOutcome {
    fn from(result: Result<Metrics>) -> Self {
        match result {
            Ok(m) => MetricsOutcome::Scored(m),
            Err(e) => MetricsOutcome::failure(e.to_string()),
        }
    }
}

/// Calculate MAE, RMSE and MAPE between actual and predicted values.
///
/// Both slices must be non-empty and of equal length. MAPE skips indices
/// where the actual value is exactly zero and is 0 when every index is
/// skipped. A non-finite MAE or RMSE is reported as an error rather than
/// returned.
pub fn calculate_metrics(actual: &[f64], predicted: &[f64]) -> Result<Metrics> {
    if actual.is_empty() || predicted.is_empty() {
        return Err(ForecastError::EmptyData);
    }

    if actual.len() != predicted.len() {
        return Err(ForecastError::LengthMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }

    let mae = mae(actual, predicted);
    let rmse = rmse(actual, predicted);

    if !mae.is_finite() || !rmse.is_finite() {
        return Err(ForecastError::ModelFitFailure(
            "non-finite forecast error".to_string(),
        ));
    }

    Ok(Metrics {
        mae,
        rmse,
        mape: mape(actual, predicted),
    })
}

/// Calculate MAE between two slices.
pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Calculate MSE between two slices.
pub fn mse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

/// Calculate RMSE between two slices.
pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    mse(actual, predicted).sqrt()
}

/// Calculate MAPE (in percent) between two slices.
///
/// Terms with a zero actual are excluded from the mean. The result is
/// always finite: 0 if no term survives or anything non-finite slips in.
pub fn mape(actual: &[f64], predicted: &[f64]) -> f64 {
    let (sum, count) = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| **a != 0.0)
        .fold((0.0, 0usize), |(sum, count), (a, p)| {
            (sum + ((a - p) / a).abs(), count + 1)
        });

    if count == 0 {
        return 0.0;
    }
    let value = 100.0 * sum / count as f64;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
