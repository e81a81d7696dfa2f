//! Utility functions for forecasting models.

pub mod cancel;
pub mod metrics;
pub mod optimization;
pub mod stats;

pub use cancel::CancelFlag;
pub use metrics::{calculate_metrics, Metrics, MetricsOutcome};
pub use optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use stats::quantile_normal;
