//! # multiforecast
//!
//! Multi-model time series forecasting with side-by-side evaluation.
//!
//! Four strategies forecast the same numeric column: ARIMA(5,1,0),
//! SARIMA(1,1,1)(1,1,1)\[12\], and gradient-boosted and random-forest
//! regressors over a 10-value lag window. The [`pipeline::Evaluator`]
//! scores their forecasts against the latest observations and ranks them
//! by MAE, then RMSE.
//!
//! ```
//! use chrono::{Duration, TimeZone, Utc};
//! use multiforecast::prelude::*;
//! use serde_json::json;
//!
//! let store = MemoryStore::new();
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! for i in 0..40 {
//!     store.insert_row("sales", start + Duration::days(i), json!({"units": 50.0 + i as f64}));
//! }
//!
//! let outcomes = Orchestrator::new().forecast(&store, "sales", "units", 5).unwrap();
//! assert_eq!(outcomes.len(), 4);
//! ```

#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::needless_range_loop)]

pub mod core;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod provider;
pub mod utils;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::core::{Forecast, Observation, Series};
    pub use crate::error::{ForecastError, Result};
    pub use crate::models::Forecaster;
    pub use crate::pipeline::{
        EvaluationConfig, Evaluation, Evaluator, ForecastResult, ForecastStrategy, ModelOutcomes,
        ModelStrategy, Orchestrator, OrchestratorConfig, StrategyKind,
    };
    pub use crate::provider::{MemoryStore, Record, SeriesProvider};
    pub use crate::utils::{calculate_metrics, CancelFlag, Metrics, MetricsOutcome};
}
