//! Forecaster trait defining the common interface for all models.

use crate::core::{Forecast, Series};
use crate::error::Result;

/// Common interface for all forecasting models.
///
/// This trait is object-safe and can be used with `Box<dyn Forecaster>`.
pub trait Forecaster {
    /// Fit the model to the series.
    fn fit(&mut self, series: &Series) -> Result<()>;

    /// Generate point predictions for the specified horizon.
    fn predict(&self, horizon: usize) -> Result<Forecast>;

    /// Generate predictions with two-sided intervals at `level`.
    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        // Models without a predictive distribution fall back to points only
        let _ = level;
        self.predict(horizon)
    }

    /// In-sample one-step predictions.
    fn fitted_values(&self) -> Option<&[f64]>;

    /// In-sample residuals.
    fn residuals(&self) -> Option<&[f64]>;

    fn name(&self) -> &str;

    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}

/// Boxed forecaster that can be moved onto a worker thread.
pub type BoxedForecaster = Box<dyn Forecaster + Send>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::arima::ARIMA;
    use crate::models::lagged::{LaggedConfig, LaggedForecaster, RandomForest, RandomForestConfig};
    use chrono::{Duration, TimeZone, Utc};

    fn make_test_series(n: usize) -> Series {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let values: Vec<f64> = (1..=n).map(|i| i as f64 + (i as f64 * 0.7).sin()).collect();
        Series::regular(start, Duration::days(1), &values)
    }

    #[test]
    fn boxed_forecasters_share_one_interface() {
        let models: Vec<BoxedForecaster> = vec![
            Box::new(ARIMA::new(1, 1, 0)),
            Box::new(LaggedForecaster::new(
                RandomForest::new(RandomForestConfig::default().with_n_estimators(5).with_seed(1)),
                LaggedConfig::default(),
            )),
        ];
        let series = make_test_series(40);

        for mut model in models {
            assert!(!model.is_fitted());
            model.fit(&series).unwrap();
            assert!(model.is_fitted());
            assert!(model.residuals().is_some());

            let forecast = model.predict(5).unwrap();
            assert_eq!(forecast.horizon(), 5);
        }
    }

    #[test]
    fn default_interval_prediction_returns_points() {
        let mut model = LaggedForecaster::new(
            RandomForest::new(RandomForestConfig::default().with_n_estimators(3).with_seed(7)),
            LaggedConfig::default(),
        );
        model.fit(&make_test_series(30)).unwrap();

        let forecast = model.predict_with_intervals(4, 0.95).unwrap();
        assert_eq!(forecast.horizon(), 4);
        assert!(!forecast.has_intervals());
    }
}
