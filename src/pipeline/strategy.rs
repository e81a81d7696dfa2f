//! Forecast strategies: one fixed model configuration per variant.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::{Forecast, Series};
use crate::error::{ForecastError, Result};
use crate::models::arima::{ARIMASpec, SARIMASpec, ARIMA, SARIMA};
use crate::models::lagged::{
    BoostingConfig, GradientBoostedTrees, LaggedConfig, LaggedForecaster, RandomForest,
    RandomForestConfig,
};
use crate::models::BoxedForecaster;
use crate::utils::CancelFlag;

/// The four forecasting strategies the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(rename = "ARIMA")]
    Arima,
    #[serde(rename = "SARIMA")]
    Sarima,
    #[serde(rename = "XGBoost")]
    XGBoostLagged,
    #[serde(rename = "RandomForest")]
    RandomForestLagged,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Arima,
        StrategyKind::Sarima,
        StrategyKind::XGBoostLagged,
        StrategyKind::RandomForestLagged,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Arima => "ARIMA",
            StrategyKind::Sarima => "SARIMA",
            StrategyKind::XGBoostLagged => "XGBoost",
            StrategyKind::RandomForestLagged => "RandomForest",
        }
    }

    /// Whether forecasts come with analytic prediction intervals.
    pub fn is_statistical(&self) -> bool {
        matches!(self, StrategyKind::Arima | StrategyKind::Sarima)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of a forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// 1-based step ahead of the last observation. Not serialized; a
    /// deserialized [`ForecastResult`] renumbers its points by position.
    #[serde(skip)]
    pub step: usize,
    #[serde(rename = "forecast")]
    pub point: f64,
    #[serde(rename = "lower_conf_int")]
    pub lower: Option<f64>,
    #[serde(rename = "upper_conf_int")]
    pub upper: Option<f64>,
}

/// What a strategy produced: a full forecast or the reason it has none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ForecastResult {
    Points(Vec<ForecastPoint>),
    Failure {
        #[serde(rename = "error")]
        reason: String,
    },
}

impl ForecastResult {
    pub fn failure(reason: impl Into<String>) -> Self {
        ForecastResult::Failure {
            reason: reason.into(),
        }
    }

    /// Number each forecast step and attach interval bounds when present.
    pub fn from_forecast(forecast: &Forecast) -> Self {
        let points = forecast
            .primary()
            .iter()
            .enumerate()
            .map(|(i, &point)| ForecastPoint {
                step: i + 1,
                point,
                lower: forecast.lower().map(|l| l[i]),
                upper: forecast.upper().map(|u| u[i]),
            })
            .collect();
        ForecastResult::Points(points)
    }

    pub fn points(&self) -> Option<&[ForecastPoint]> {
        match self {
            ForecastResult::Points(points) => Some(points),
            ForecastResult::Failure { .. } => None,
        }
    }

    /// The point forecasts, or None for a failure.
    pub fn point_values(&self) -> Option<Vec<f64>> {
        self.points()
            .map(|points| points.iter().map(|p| p.point).collect())
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ForecastResult::Points(_) => None,
            ForecastResult::Failure { reason } => Some(reason),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ForecastResult::Failure { .. })
    }
}

impl<'de> Deserialize<'de> for ForecastResult {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Points(Vec<ForecastPoint>),
            Failure { error: String },
        }

        Ok(match Wire::deserialize(deserializer)? {
            Wire::Points(mut points) => {
                for (i, point) in points.iter_mut().enumerate() {
                    point.step = i + 1;
                }
                ForecastResult::Points(points)
            }
            Wire::Failure { error } => ForecastResult::failure(error),
        })
    }
}

/// A forecasting strategy the orchestrator can run in isolation.
pub trait ForecastStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Fit on the whole `series` and forecast `steps` values ahead.
    ///
    /// Never fails: problems are reported as [`ForecastResult::Failure`].
    fn forecast(&self, series: &Series, steps: usize) -> ForecastResult;

    /// Like [`forecast`](Self::forecast), but gives up early once `cancel`
    /// is set. Strategies that cannot be interrupted run to completion.
    fn forecast_with_cancel(&self, series: &Series, steps: usize, _cancel: &CancelFlag) -> ForecastResult {
        self.forecast(series, steps)
    }
}

#[derive(Debug, Clone)]
enum ModelConfig {
    Arima(ARIMASpec),
    Sarima(SARIMASpec),
    XGBoost {
        lagged: LaggedConfig,
        boosting: BoostingConfig,
    },
    RandomForest {
        lagged: LaggedConfig,
        forest: RandomForestConfig,
    },
}

/// Built-in strategy: a fixed model configuration plus the interval level
/// used by statistical models.
#[derive(Debug, Clone)]
pub struct ModelStrategy {
    config: ModelConfig,
    level: f64,
}

impl ModelStrategy {
    const DEFAULT_LEVEL: f64 = 0.95;

    fn from_config(config: ModelConfig) -> Self {
        Self {
            config,
            level: Self::DEFAULT_LEVEL,
        }
    }

    /// ARIMA(5, 1, 0) unless given another order.
    pub fn arima(spec: ARIMASpec) -> Self {
        Self::from_config(ModelConfig::Arima(spec))
    }

    /// SARIMA(1, 1, 1)(1, 1, 1)[12] unless given another order.
    pub fn sarima(spec: SARIMASpec) -> Self {
        Self::from_config(ModelConfig::Sarima(spec))
    }

    pub fn xgboost(lagged: LaggedConfig, boosting: BoostingConfig) -> Self {
        Self::from_config(ModelConfig::XGBoost { lagged, boosting })
    }

    pub fn random_forest(lagged: LaggedConfig, forest: RandomForestConfig) -> Self {
        Self::from_config(ModelConfig::RandomForest { lagged, forest })
    }

    /// Default configuration for `kind`.
    pub fn for_kind(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Arima => Self::arima(ARIMASpec::default()),
            StrategyKind::Sarima => Self::sarima(SARIMASpec::default()),
            StrategyKind::XGBoostLagged => {
                Self::xgboost(LaggedConfig::default(), BoostingConfig::default())
            }
            StrategyKind::RandomForestLagged => {
                Self::random_forest(LaggedConfig::default(), RandomForestConfig::default())
            }
        }
    }

    /// Set the two-sided interval level (0 < level < 1).
    pub fn with_level(mut self, level: f64) -> Self {
        self.level = level;
        self
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    fn build(&self, cancel: &CancelFlag) -> BoxedForecaster {
        match &self.config {
            ModelConfig::Arima(spec) => {
                Box::new(ARIMA::with_spec(*spec).with_cancel_flag(cancel.clone()))
            }
            ModelConfig::Sarima(spec) => {
                Box::new(SARIMA::with_spec(*spec).with_cancel_flag(cancel.clone()))
            }
            ModelConfig::XGBoost { lagged, boosting } => Box::new(
                LaggedForecaster::new(
                    GradientBoostedTrees::new(boosting.clone()).with_cancel_flag(cancel.clone()),
                    *lagged,
                )
                .with_cancel_flag(cancel.clone()),
            ),
            ModelConfig::RandomForest { lagged, forest } => Box::new(
                LaggedForecaster::new(
                    RandomForest::new(forest.clone()).with_cancel_flag(cancel.clone()),
                    *lagged,
                )
                .with_cancel_flag(cancel.clone()),
            ),
        }
    }

    /// Fit and forecast, keeping the underlying error.
    pub fn try_forecast(&self, series: &Series, steps: usize) -> Result<Forecast> {
        self.try_forecast_with_cancel(series, steps, &CancelFlag::default())
    }

    /// [`try_forecast`](Self::try_forecast) that stops with
    /// [`ForecastError::Cancelled`] once `cancel` is set.
    pub fn try_forecast_with_cancel(
        &self,
        series: &Series,
        steps: usize,
        cancel: &CancelFlag,
    ) -> Result<Forecast> {
        if steps == 0 {
            return Err(ForecastError::InvalidParameter(
                "steps must be positive".to_string(),
            ));
        }
        if self.kind().is_statistical() && !(self.level > 0.0 && self.level < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "interval level must be in (0, 1), got {}",
                self.level
            )));
        }

        let mut model = self.build(cancel);
        model.fit(series)?;
        let forecast = if self.kind().is_statistical() {
            model.predict_with_intervals(steps, self.level)?
        } else {
            model.predict(steps)?
        };

        if forecast.horizon() != steps {
            return Err(ForecastError::LengthMismatch {
                expected: steps,
                got: forecast.horizon(),
            });
        }
        Ok(forecast)
    }

    fn failure_reason(&self, error: &ForecastError) -> String {
        match error {
            ForecastError::InsufficientData { .. } if !self.kind().is_statistical() => {
                "not enough data".to_string()
            }
            _ => format!("{} failed", self.kind()),
        }
    }
}

impl ForecastStrategy for ModelStrategy {
    fn kind(&self) -> StrategyKind {
        match self.config {
            ModelConfig::Arima(_) => StrategyKind::Arima,
            ModelConfig::Sarima(_) => StrategyKind::Sarima,
            ModelConfig::XGBoost { .. } => StrategyKind::XGBoostLagged,
            ModelConfig::RandomForest { .. } => StrategyKind::RandomForestLagged,
        }
    }

    fn forecast(&self, series: &Series, steps: usize) -> ForecastResult {
        self.forecast_with_cancel(series, steps, &CancelFlag::default())
    }

    fn forecast_with_cancel(&self, series: &Series, steps: usize, cancel: &CancelFlag) -> ForecastResult {
        match self.try_forecast_with_cancel(series, steps, cancel) {
            Ok(forecast) => ForecastResult::from_forecast(&forecast),
            Err(ForecastError::Cancelled) => {
                tracing::debug!(strategy = %self.kind(), "strategy cancelled");
                ForecastResult::failure(format!("{} cancelled", self.kind()))
            }
            Err(e) => {
                tracing::warn!(strategy = %self.kind(), error = %e, "strategy failed");
                ForecastResult::failure(self.failure_reason(&e))
            }
        }
    }
}

/// The reference strategy set, one per [`StrategyKind`].
pub fn default_strategies() -> Vec<ModelStrategy> {
    StrategyKind::ALL
        .iter()
        .map(|&kind| ModelStrategy::for_kind(kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn linear_series(n: usize) -> Series {
        let start = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();
        let values: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
        Series::regular(start, Duration::days(1), &values)
    }

    #[test]
    fn kind_names_round_trip_through_json() {
        for kind in StrategyKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, json!(kind.name()));
            assert_eq!(serde_json::from_value::<StrategyKind>(json).unwrap(), kind);
        }
    }

    #[test]
    fn default_set_covers_every_kind_once() {
        let kinds: Vec<StrategyKind> = default_strategies().iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, StrategyKind::ALL.to_vec());
    }

    #[test]
    fn statistical_points_carry_intervals() {
        let result = ModelStrategy::for_kind(StrategyKind::Arima).forecast(&linear_series(60), 5);
        let points = result.points().unwrap();

        assert_eq!(points.len(), 5);
        for (i, p) in points.iter().enumerate() {
            assert_eq!(p.step, i + 1);
            let (lo, hi) = (p.lower.unwrap(), p.upper.unwrap());
            assert!(lo <= p.point && p.point <= hi);
        }
    }

    #[test]
    fn lagged_points_have_no_intervals() {
        let strategy = ModelStrategy::random_forest(
            LaggedConfig::default(),
            RandomForestConfig::default().with_n_estimators(10).with_seed(2),
        );
        let result = strategy.forecast(&linear_series(40), 3);
        let points = result.points().unwrap();
        assert_eq!(points.len(), 3);
        assert!(points.iter().all(|p| p.lower.is_none() && p.upper.is_none()));
    }

    #[test]
    fn short_series_reasons() {
        let series = linear_series(10);
        let xgb = ModelStrategy::for_kind(StrategyKind::XGBoostLagged).forecast(&series, 3);
        let rf = ModelStrategy::for_kind(StrategyKind::RandomForestLagged).forecast(&series, 3);
        let sarima = ModelStrategy::for_kind(StrategyKind::Sarima).forecast(&series, 3);

        assert_eq!(xgb, ForecastResult::failure("not enough data"));
        assert_eq!(rf, ForecastResult::failure("not enough data"));
        assert_eq!(sarima, ForecastResult::failure("SARIMA failed"));
    }

    #[test]
    fn zero_steps_is_a_failure_not_a_panic() {
        let result = ModelStrategy::for_kind(StrategyKind::Arima).forecast(&linear_series(30), 0);
        assert_eq!(result.reason(), Some("ARIMA failed"));
    }

    #[test]
    fn cancelled_strategies_stop_early() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let series = linear_series(60);

        for strategy in default_strategies() {
            let kind = strategy.kind();
            assert_eq!(
                strategy.try_forecast_with_cancel(&series, 3, &cancel),
                Err(ForecastError::Cancelled),
                "{kind}"
            );
            let result = strategy.forecast_with_cancel(&series, 3, &cancel);
            assert_eq!(result.reason(), Some(format!("{kind} cancelled").as_str()));
        }
    }

    #[test]
    fn invalid_level_is_rejected() {
        let strategy = ModelStrategy::for_kind(StrategyKind::Arima).with_level(1.5);
        assert!(matches!(
            strategy.try_forecast(&linear_series(30), 2),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn result_serialization_shapes() {
        let forecast =
            Forecast::from_values_with_intervals(vec![1.0], vec![0.5], vec![1.5]).unwrap();
        let json = serde_json::to_value(ForecastResult::from_forecast(&forecast)).unwrap();
        assert_eq!(
            json,
            json!([{"forecast": 1.0, "lower_conf_int": 0.5, "upper_conf_int": 1.5}])
        );

        let json = serde_json::to_value(ForecastResult::from_forecast(&Forecast::from_values(vec![2.0]))).unwrap();
        assert_eq!(
            json,
            json!([{"forecast": 2.0, "lower_conf_int": null, "upper_conf_int": null}])
        );

        let json = serde_json::to_value(ForecastResult::failure("XGBoost failed")).unwrap();
        assert_eq!(json, json!({"error": "XGBoost failed"}));
    }

    #[test]
    fn deserialized_points_are_numbered_from_one() {
        let forecast = Forecast::from_values_with_intervals(
            vec![3.0, 4.0, 5.0],
            vec![2.0, 3.0, 4.0],
            vec![4.0, 5.0, 6.0],
        )
        .unwrap();
        let original = ForecastResult::from_forecast(&forecast);

        let json = serde_json::to_string(&original).unwrap();
        let back: ForecastResult = serde_json::from_str(&json).unwrap();

        assert_eq!(back, original);
        let steps: Vec<usize> = back.points().unwrap().iter().map(|p| p.step).collect();
        assert_eq!(steps, [1, 2, 3]);

        let failure: ForecastResult = serde_json::from_value(json!({"error": "SARIMA failed"})).unwrap();
        assert_eq!(failure, ForecastResult::failure("SARIMA failed"));
    }
}
