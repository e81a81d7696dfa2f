//! ARIMA and SARIMA (Autoregressive Integrated Moving Average) models.
//!
//! This module provides:
//! - ARIMA models with (p, d, q) specifications
//! - SARIMA models with multiplicative seasonal components (P, D, Q)\[s\]
//! - Interval construction from the MA(infinity) representation

mod diff;
mod model;
mod poly;
mod sarima;

pub use diff::{difference, integrate, seasonal_difference};
pub use model::{ARIMASpec, ARIMA};
pub use poly::{forecast_std_errors, psi_weights};
pub use sarima::{SARIMASpec, SARIMA};
