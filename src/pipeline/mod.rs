//! Forecast orchestration and evaluation.
//!
//! [`Orchestrator`] runs every [`ForecastStrategy`] on one series with
//! per-strategy fault isolation; [`Evaluator`] scores the results against
//! the latest observations and ranks them.

mod evaluator;
mod orchestrator;
mod ranking;
mod strategy;

pub use evaluator::{score_outcomes, EvaluationConfig, Evaluation, Evaluator, FORECAST_FAILED};
pub use orchestrator::{ModelOutcomes, Orchestrator, OrchestratorConfig};
pub use ranking::rank_models;
pub use strategy::{
    default_strategies, ForecastPoint, ForecastResult, ForecastStrategy, ModelStrategy,
    StrategyKind,
};
