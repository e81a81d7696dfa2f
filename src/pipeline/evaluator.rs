//! Scoring of strategy forecasts against the most recent observations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::orchestrator::{ModelOutcomes, Orchestrator};
use super::ranking::rank_models;
use super::strategy::StrategyKind;
use crate::core::Observation;
use crate::error::{ForecastError, Result};
use crate::provider::{Record, SeriesProvider};
use crate::utils::{calculate_metrics, Metrics, MetricsOutcome};

/// Reason recorded for a strategy with no usable forecast.
pub const FORECAST_FAILED: &str = "forecast generation failed";

/// Evaluation settings.
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Number of most recent observations scored.
    pub horizon: usize,
    /// Initial fetch size as a multiple of the horizon. The request is
    /// doubled while duplicates leave fewer than `horizon` timestamps.
    pub fetch_multiplier: usize,
    /// Train only on observations older than the scored window.
    pub holdout: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            horizon: 10,
            fetch_multiplier: 2,
            holdout: false,
        }
    }
}

impl EvaluationConfig {
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn with_fetch_multiplier(mut self, fetch_multiplier: usize) -> Self {
        self.fetch_multiplier = fetch_multiplier;
        self
    }

    pub fn with_holdout(mut self, holdout: bool) -> Self {
        self.holdout = holdout;
        self
    }
}

/// Metrics per strategy and the resulting ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(rename = "ranked_models")]
    pub ranked: Vec<(StrategyKind, MetricsOutcome)>,
    pub metrics: BTreeMap<StrategyKind, MetricsOutcome>,
}

impl Evaluation {
    /// Best scored strategy, if any strategy could be scored.
    pub fn best(&self) -> Option<(StrategyKind, &Metrics)> {
        self.ranked
            .first()
            .and_then(|(kind, outcome)| outcome.metrics().map(|m| (*kind, m)))
    }

    pub fn order(&self) -> Vec<StrategyKind> {
        self.ranked.iter().map(|(kind, _)| *kind).collect()
    }
}

/// Score every outcome against `actual`.
///
/// A strategy whose forecast is a failure or shorter than `actual` gets
/// [`FORECAST_FAILED`]; longer forecasts are cut to `actual.len()`.
pub fn score_outcomes(actual: &[f64], outcomes: &ModelOutcomes) -> Evaluation {
    let horizon = actual.len();
    let metrics: BTreeMap<StrategyKind, MetricsOutcome> = outcomes
        .iter()
        .map(|(&kind, result)| {
            let outcome = match result.point_values() {
                Some(values) if values.len() >= horizon => {
                    MetricsOutcome::from(calculate_metrics(actual, &values[..horizon]))
                }
                _ => MetricsOutcome::failure(FORECAST_FAILED),
            };
            match &outcome {
                MetricsOutcome::Scored(m) => {
                    tracing::debug!(strategy = %kind, mae = m.mae, rmse = m.rmse, mape = m.mape, "strategy scored")
                }
                MetricsOutcome::Failure { reason } => {
                    tracing::warn!(strategy = %kind, error = %reason, "strategy could not be scored")
                }
            }
            (kind, outcome)
        })
        .collect();

    let ranked = rank_models(metrics.iter().map(|(k, m)| (*k, m.clone())));
    Evaluation { ranked, metrics }
}

/// Forecasts a column with every strategy and ranks the strategies by how
/// well they match the column's latest observations.
#[derive(Debug)]
pub struct Evaluator<P> {
    provider: P,
    orchestrator: Orchestrator,
    config: EvaluationConfig,
}

impl<P: SeriesProvider> Evaluator<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            orchestrator: Orchestrator::new(),
            config: EvaluationConfig::default(),
        }
    }

    pub fn with_orchestrator(mut self, orchestrator: Orchestrator) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn with_config(mut self, config: EvaluationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The `horizon` most recent numeric observations, oldest first.
    ///
    /// Rows sharing a timestamp count once and the one stored last wins,
    /// as in [`Series::new`](crate::core::Series::new). Fails with
    /// [`ForecastError::InsufficientData`] when fewer than `horizon` numeric
    /// values remain, or [`ForecastError::ColumnNotNumeric`] when the column
    /// holds no numeric cell at all.
    pub fn fetch_actuals(&self, dataset: &str, column: &str) -> Result<Vec<Observation>> {
        let horizon = self.config.horizon;
        let mut limit = horizon.saturating_mul(self.config.fetch_multiplier.max(1));

        let mut unique = loop {
            let mut rows = self.provider.recent(dataset, column, limit)?;
            let fetched = rows.len();
            rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            rows.dedup_by_key(|r| r.timestamp);

            if rows.len() >= horizon || fetched < limit || limit == usize::MAX {
                break rows;
            }
            tracing::debug!(limit, unique = rows.len(), "duplicate timestamps, widening fetch");
            limit = limit.saturating_mul(2);
        };

        unique.truncate(horizon);
        unique.reverse();
        let actual: Vec<Observation> = unique
            .iter()
            .filter_map(|r: &Record| r.numeric().map(|v| Observation::new(r.timestamp, v)))
            .collect();

        if actual.len() < horizon {
            if actual.is_empty() {
                self.provider.series(dataset, column)?;
            }
            return Err(ForecastError::InsufficientData {
                needed: horizon,
                got: actual.len(),
            });
        }
        Ok(actual)
    }

    /// Forecast `column` of `dataset` `horizon` steps ahead with every
    /// strategy and score each against the latest `horizon` observations.
    pub fn evaluate(&self, dataset: &str, column: &str) -> Result<Evaluation> {
        let span = tracing::info_span!("evaluate", dataset, column, horizon = self.config.horizon);
        let _guard = span.enter();

        let horizon = self.config.horizon;
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "horizon must be positive".to_string(),
            ));
        }

        let actual = self.fetch_actuals(dataset, column).map_err(|e| {
            tracing::error!(error = %e, "cannot evaluate");
            e
        })?;

        let mut series = self.provider.series(dataset, column)?;
        if self.config.holdout {
            if let Some(first) = actual.first() {
                series = series.before(first.timestamp);
            }
        }
        tracing::info!(rows = series.len(), holdout = self.config.holdout, "series loaded");

        let outcomes = self.orchestrator.run_all(&series, horizon);
        let values: Vec<f64> = actual.iter().map(|o| o.value).collect();
        let evaluation = score_outcomes(&values, &outcomes);

        match evaluation.best() {
            Some((kind, m)) => tracing::info!(best = %kind, mae = m.mae, rmse = m.rmse, "evaluation complete"),
            None => tracing::warn!("no strategy could be scored"),
        }
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::strategy::{ForecastPoint, ForecastResult};
    use crate::provider::MemoryStore;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i)
    }

    fn points(values: &[f64]) -> ForecastResult {
        ForecastResult::Points(
            values
                .iter()
                .enumerate()
                .map(|(i, &point)| ForecastPoint {
                    step: i + 1,
                    point,
                    lower: None,
                    upper: None,
                })
                .collect(),
        )
    }

    #[test]
    fn short_and_failed_forecasts_are_not_scored() {
        let outcomes: ModelOutcomes = vec![
            (StrategyKind::Arima, points(&[1.0, 2.0, 3.0])),
            (StrategyKind::Sarima, points(&[1.0, 2.0])),
            (StrategyKind::XGBoostLagged, ForecastResult::failure("not enough data")),
            (StrategyKind::RandomForestLagged, points(&[2.0, 3.0, 4.0, 99.0])),
        ]
        .into_iter()
        .collect();

        let eval = score_outcomes(&[1.0, 2.0, 3.0], &outcomes);

        assert_eq!(
            eval.order(),
            vec![
                StrategyKind::Arima,
                StrategyKind::RandomForestLagged,
                StrategyKind::Sarima,
                StrategyKind::XGBoostLagged,
            ]
        );
        assert_eq!(
            eval.metrics[&StrategyKind::Sarima],
            MetricsOutcome::failure(FORECAST_FAILED)
        );
        let rf = eval.metrics[&StrategyKind::RandomForestLagged].metrics().unwrap();
        assert_relative_eq!(rf.mae, 1.0, epsilon = 1e-12);
        assert_eq!(eval.best().map(|(k, _)| k), Some(StrategyKind::Arima));
    }

    #[test]
    fn duplicates_widen_the_fetch() {
        let store = MemoryStore::new();
        for i in 0..6 {
            store.insert_row("d", ts(i), json!({"v": i as f64}));
        }
        // Four copies of the newest timestamp fill the first page
        for copy in 0..3 {
            store.insert_row("d", ts(5), json!({"v": 100.0 + copy as f64}));
        }

        let evaluator = Evaluator::new(&store).with_config(
            EvaluationConfig::default()
                .with_horizon(2)
                .with_fetch_multiplier(2),
        );
        let actual = evaluator.fetch_actuals("d", "v").unwrap();

        assert_eq!(actual.len(), 2);
        assert_eq!(actual[0], Observation::new(ts(4), 4.0));
        assert_eq!(actual[1], Observation::new(ts(5), 102.0));
    }

    #[test]
    fn corrected_row_is_scored_and_trained_on() {
        let store = MemoryStore::new();
        for i in 0..30 {
            store.insert_row("d", ts(i), json!({"v": i as f64}));
        }
        store.insert_row("d", ts(29), json!({"v": 1000.0}));

        let evaluator = Evaluator::new(&store).with_config(EvaluationConfig::default().with_horizon(3));
        let actual = evaluator.fetch_actuals("d", "v").unwrap();
        let series = store.series("d", "v").unwrap();

        assert_eq!(actual.last().map(|o| o.value), Some(1000.0));
        assert_eq!(series.values().last().copied(), Some(1000.0));
        assert_eq!(actual[0], Observation::new(ts(27), 27.0));
    }

    #[test]
    fn text_column_is_not_numeric() {
        let store = MemoryStore::new();
        for i in 0..12 {
            store.insert_row("d", ts(i), json!({"v": i, "label": format!("row {i}")}));
        }

        let evaluator = Evaluator::new(&store).with_config(EvaluationConfig::default().with_horizon(3));
        let err = evaluator.fetch_actuals("d", "label").unwrap_err();
        assert_eq!(
            err,
            ForecastError::ColumnNotNumeric {
                dataset: "d".to_string(),
                column: "label".to_string(),
            }
        );
        assert!(err.is_request_fatal());
    }

    #[test]
    fn non_numeric_actuals_are_insufficient() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.insert_row("d", ts(i), json!({"v": i}));
        }
        store.insert_row("d", ts(5), json!({"v": "missing"}));

        let evaluator = Evaluator::new(&store).with_config(EvaluationConfig::default().with_horizon(3));
        assert_eq!(
            evaluator.fetch_actuals("d", "v"),
            Err(ForecastError::InsufficientData { needed: 3, got: 2 })
        );
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let store = MemoryStore::new();
        let evaluator = Evaluator::new(&store).with_config(EvaluationConfig::default().with_horizon(0));
        assert!(matches!(
            evaluator.evaluate("d", "v"),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn missing_dataset_is_request_fatal() {
        let store = MemoryStore::new();
        let err = Evaluator::new(&store).evaluate("nope", "v").unwrap_err();
        assert!(err.is_request_fatal());
    }

    #[test]
    fn evaluation_json_shape() {
        let outcomes: ModelOutcomes = vec![
            (StrategyKind::Arima, points(&[2.0])),
            (StrategyKind::Sarima, ForecastResult::failure("SARIMA failed")),
        ]
        .into_iter()
        .collect();
        let eval = score_outcomes(&[1.0], &outcomes);

        let json = serde_json::to_value(&eval).unwrap();
        assert_eq!(
            json,
            json!({
                "ranked_models": [
                    ["ARIMA", {"MAE": 1.0, "RMSE": 1.0, "MAPE": 100.0}],
                    ["SARIMA", {"error": "forecast generation failed"}]
                ],
                "metrics": {
                    "ARIMA": {"MAE": 1.0, "RMSE": 1.0, "MAPE": 100.0},
                    "SARIMA": {"error": "forecast generation failed"}
                }
            })
        );
    }
}
