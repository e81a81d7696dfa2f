//! End-to-end evaluation against an in-memory store.

use approx::assert_relative_eq;
use chrono::{DateTime, Duration, TimeZone, Utc};
use multiforecast::models::arima::{ARIMASpec, SARIMASpec};
use multiforecast::models::lagged::{BoostingConfig, LaggedConfig, RandomForestConfig};
use multiforecast::pipeline::FORECAST_FAILED;
use multiforecast::prelude::*;
use serde_json::json;

fn ts(i: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap() + Duration::days(i)
}

fn linear_store(n: i64) -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_rows(
        "linear",
        (0..n).map(|i| (ts(i), json!({"value": 100.0 + i as f64, "label": "x"}))),
    );
    store
}

/// ARIMA, SARIMA, a seeded forest and a boosted model with one tiny step,
/// which barely moves off the label mean.
fn orchestrator_with_weak_baseline() -> Orchestrator {
    let mut orchestrator = Orchestrator::empty();
    orchestrator
        .register(ModelStrategy::arima(ARIMASpec::default()))
        .register(ModelStrategy::sarima(SARIMASpec::default()))
        .register(ModelStrategy::random_forest(
            LaggedConfig::default(),
            RandomForestConfig::default().with_seed(42),
        ))
        .register(ModelStrategy::xgboost(
            LaggedConfig::default(),
            BoostingConfig::default()
                .with_n_estimators(1)
                .with_learning_rate(0.01),
        ));
    orchestrator
}

#[test]
fn linear_trend_holdout_ranks_models() {
    // 100..159 for training, 160..164 held out
    let store = linear_store(65);
    let evaluator = Evaluator::new(&store)
        .with_orchestrator(orchestrator_with_weak_baseline())
        .with_config(EvaluationConfig::default().with_horizon(5).with_holdout(true));

    let eval = evaluator.evaluate("linear", "value").unwrap();
    let order = eval.order();

    assert_eq!(order.len(), 4);
    assert!(order[0].is_statistical());
    assert_eq!(order[3], StrategyKind::XGBoostLagged);
    assert!(
        order.iter().position(|k| *k == StrategyKind::RandomForestLagged)
            < order.iter().position(|k| *k == StrategyKind::XGBoostLagged)
    );

    let (_, best) = eval.best().unwrap();
    assert!(best.mae < 0.5);
    assert!(best.rmse < 0.5);

    let forest = eval.metrics[&StrategyKind::RandomForestLagged].metrics().unwrap();
    assert!(forest.mae < 7.0, "forest mae {}", forest.mae);

    let weak = eval.metrics[&StrategyKind::XGBoostLagged].metrics().unwrap();
    assert!(weak.mae > 20.0, "baseline mae {}", weak.mae);
}

#[test]
fn lagged_forecast_stays_close_to_trend() {
    let store = linear_store(60);
    let mut orchestrator = Orchestrator::empty();
    orchestrator.register(ModelStrategy::random_forest(
        LaggedConfig::default(),
        RandomForestConfig::default().with_seed(7),
    ));

    let outcomes = orchestrator.forecast(&store, "linear", "value", 5).unwrap();
    let points = outcomes
        .get(StrategyKind::RandomForestLagged)
        .and_then(|r| r.point_values())
        .unwrap();

    assert_eq!(points.len(), 5);
    for (i, p) in points.iter().enumerate() {
        let target = 160.0 + i as f64;
        assert!((p - target).abs() < 10.0, "step {}: {p}", i + 1);
    }
}

#[test]
fn default_evaluation_scores_all_four() {
    let store = linear_store(60);
    let eval = Evaluator::new(&store).evaluate("linear", "value").unwrap();

    assert_eq!(eval.metrics.len(), 4);
    assert_eq!(eval.ranked.len(), 4);
    for outcome in eval.metrics.values() {
        let m = outcome.metrics().unwrap();
        assert!(m.mae.is_finite() && m.rmse.is_finite() && m.mape.is_finite());
    }
}

#[test]
fn five_actuals_with_horizon_ten_is_insufficient() {
    let store = linear_store(5);
    let result = Evaluator::new(&store).evaluate("linear", "value");
    assert_eq!(
        result,
        Err(ForecastError::InsufficientData { needed: 10, got: 5 })
    );
}

#[test]
fn request_fatal_errors() {
    let store = linear_store(30);
    let evaluator = Evaluator::new(&store);

    assert!(matches!(
        evaluator.evaluate("missing", "value"),
        Err(ForecastError::DataUnavailable { .. })
    ));
    assert!(matches!(
        evaluator.evaluate("linear", "volume"),
        Err(ForecastError::DataUnavailable { .. })
    ));
    assert_eq!(
        evaluator.evaluate("linear", "label"),
        Err(ForecastError::ColumnNotNumeric {
            dataset: "linear".to_string(),
            column: "label".to_string(),
        })
    );
}

#[test]
fn short_history_fails_per_strategy_only() {
    // Enough actuals to score, too few rows for SARIMA or the lag window
    let store = linear_store(10);
    let evaluator =
        Evaluator::new(&store).with_config(EvaluationConfig::default().with_horizon(5));
    let eval = evaluator.evaluate("linear", "value").unwrap();

    for kind in [
        StrategyKind::Sarima,
        StrategyKind::XGBoostLagged,
        StrategyKind::RandomForestLagged,
    ] {
        assert_eq!(eval.metrics[&kind], MetricsOutcome::failure(FORECAST_FAILED));
    }
    assert!(eval.metrics[&StrategyKind::Arima].metrics().is_some());
    assert_eq!(eval.order()[0], StrategyKind::Arima);
}

#[test]
fn zero_actual_does_not_poison_mape() {
    let store = MemoryStore::new();
    store.insert_rows(
        "flat",
        (0..40).map(|i| (ts(i), json!({"v": if i == 39 { 0.0 } else { 1.0 }}))),
    );
    let evaluator = Evaluator::new(&store).with_config(EvaluationConfig::default().with_horizon(4));
    let eval = evaluator.evaluate("flat", "v").unwrap();

    for outcome in eval.metrics.values() {
        if let Some(m) = outcome.metrics() {
            assert!(m.mape.is_finite());
            assert!(m.mape >= 0.0);
        }
    }
}

#[test]
fn evaluation_serializes_like_the_http_payload() {
    let store = linear_store(65);
    let evaluator = Evaluator::new(&store)
        .with_orchestrator(orchestrator_with_weak_baseline())
        .with_config(EvaluationConfig::default().with_horizon(5).with_holdout(true));
    let eval = evaluator.evaluate("linear", "value").unwrap();

    let json = serde_json::to_value(&eval).unwrap();
    let ranked = json["ranked_models"].as_array().unwrap();
    assert_eq!(ranked.len(), 4);
    assert_eq!(ranked[3][0], json!("XGBoost"));
    for key in ["ARIMA", "SARIMA", "XGBoost", "RandomForest"] {
        let metrics = &json["metrics"][key];
        assert!(metrics["MAE"].is_number(), "{key}: {metrics}");
        assert!(metrics["RMSE"].is_number());
        assert!(metrics["MAPE"].is_number());
    }

    let back: Evaluation = serde_json::from_value(json).unwrap();
    assert_eq!(back.order(), eval.order());
    assert_relative_eq!(
        back.best().unwrap().1.mae,
        eval.best().unwrap().1.mae,
        epsilon = 1e-12
    );
}
