//! Forecasting models.

mod traits;

pub mod arima;
pub mod lagged;

pub use traits::{BoxedForecaster, Forecaster};
