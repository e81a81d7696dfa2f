//! Error types for the multiforecast library.

use thiserror::Error;

/// Result type alias for forecasting and evaluation operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while loading series, fitting models or scoring them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Dataset is missing or empty, or the column does not exist in it.
    #[error("no data available for dataset '{dataset}', column '{column}'")]
    DataUnavailable { dataset: String, column: String },

    /// Column exists but none of its cells hold a finite number.
    #[error("column '{column}' in dataset '{dataset}' has no numeric values")]
    ColumnNotNumeric { dataset: String, column: String },

    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Model fitting or prediction produced an unusable result.
    #[error("model fit failed: {0}")]
    ModelFitFailure(String),

    /// Two sequences that must line up do not.
    #[error("length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// The series provider failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// Work was abandoned because its [`CancelFlag`](crate::utils::CancelFlag) was set.
    #[error("operation cancelled")]
    Cancelled,
}

impl ForecastError {
    /// Whether this error aborts a request wherever it is raised.
    ///
    /// `InsufficientData` depends on where it comes from: a strategy that
    /// raises it reports its own failure, while
    /// [`Evaluator::evaluate`](crate::pipeline::Evaluator::evaluate) returns
    /// it when there are fewer actual values than the horizon.
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            ForecastError::DataUnavailable { .. }
                | ForecastError::ColumnNotNumeric { .. }
                | ForecastError::Provider(_)
        )
    }
}
