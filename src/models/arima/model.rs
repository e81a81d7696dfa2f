//! ARIMA (Autoregressive Integrated Moving Average) model.

use crate::core::{Forecast, Series};
use crate::error::{ForecastError, Result};
use crate::models::arima::diff::{difference, integrate};
use crate::models::arima::poly::{
    ar_polynomial, differencing_polynomial, forecast_std_errors, ma_polynomial, multiply,
};
use crate::models::Forecaster;
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use crate::utils::CancelFlag;
use crate::utils::stats::two_sided_z;

/// ARIMA model specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ARIMASpec {
    /// AR order (p)
    pub p: usize,
    /// Differencing order (d)
    pub d: usize,
    /// MA order (q)
    pub q: usize,
}

impl ARIMASpec {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self { p, d, q }
    }

    /// Whether a mean is estimated. Differenced models carry no constant.
    pub fn has_mean(&self) -> bool {
        self.d == 0
    }

    /// Total number of estimated parameters.
    pub fn num_params(&self) -> usize {
        self.p + self.q + usize::from(self.has_mean())
    }

    /// Shortest series the model can be fitted to.
    pub fn min_length(&self) -> usize {
        self.d + self.p.max(self.q) + 2
    }
}

impl Default for ARIMASpec {
    fn default() -> Self {
        Self::new(5, 1, 0)
    }
}

/// ARIMA forecasting model.
///
/// ARIMA(p, d, q) combines:
/// - AR(p): Autoregressive component
/// - I(d): Differencing for stationarity
/// - MA(q): Moving average component
///
/// Parameters are estimated by conditional sum of squares. A mean is
/// estimated only for `d = 0`; differenced models have no constant and
/// therefore no drift.
#[derive(Debug, Clone)]
pub struct ARIMA {
    spec: ARIMASpec,
    ar_coefficients: Vec<f64>,
    ma_coefficients: Vec<f64>,
    intercept: f64,
    original: Option<Vec<f64>>,
    differenced: Option<Vec<f64>>,
    fitted_diff: Option<Vec<f64>>,
    residuals: Option<Vec<f64>>,
    residual_variance: Option<f64>,
    aic: Option<f64>,
    converged: bool,
    cancel: CancelFlag,
}

impl ARIMA {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self::with_spec(ARIMASpec::new(p, d, q))
    }

    pub fn with_spec(spec: ARIMASpec) -> Self {
        Self {
            spec,
            ar_coefficients: vec![],
            ma_coefficients: vec![],
            intercept: 0.0,
            original: None,
            differenced: None,
            fitted_diff: None,
            residuals: None,
            residual_variance: None,
            aic: None,
            converged: false,
            cancel: CancelFlag::default(),
        }
    }

    /// Abandon estimation with [`ForecastError::Cancelled`] once `cancel` is set.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn spec(&self) -> ARIMASpec {
        self.spec
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar_coefficients
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma_coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn residual_variance(&self) -> Option<f64> {
        self.residual_variance
    }

    pub fn aic(&self) -> Option<f64> {
        self.aic
    }

    /// Whether the CSS optimiser converged during the last fit.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// One-step predictions on the differenced scale, with residuals.
    fn filter(
        diff_series: &[f64],
        ar: &[f64],
        ma: &[f64],
        intercept: f64,
    ) -> (Vec<f64>, Vec<f64>) {
        let n = diff_series.len();
        let start = ar.len().max(ma.len());
        let mut fitted = vec![f64::NAN; n];
        let mut residuals = vec![0.0; n];

        for t in start..n {
            let mut pred = intercept;
            for (i, phi) in ar.iter().enumerate() {
                pred += phi * (diff_series[t - 1 - i] - intercept);
            }
            for (i, theta) in ma.iter().enumerate() {
                pred += theta * residuals[t - 1 - i];
            }
            fitted[t] = pred;
            residuals[t] = diff_series[t] - pred;
        }

        (fitted, residuals)
    }

    fn css(diff_series: &[f64], ar: &[f64], ma: &[f64], intercept: f64) -> f64 {
        let start = ar.len().max(ma.len());
        if diff_series.len() <= start {
            return f64::MAX;
        }
        let (_, residuals) = Self::filter(diff_series, ar, ma, intercept);
        residuals[start..].iter().map(|e| e * e).sum()
    }

    fn estimate_parameters(&mut self, diff_series: &[f64]) {
        let p = self.spec.p;
        let q = self.spec.q;
        let offset = usize::from(self.spec.has_mean());
        let mean = if self.spec.has_mean() {
            diff_series.iter().sum::<f64>() / diff_series.len() as f64
        } else {
            0.0
        };

        if p == 0 && q == 0 {
            self.intercept = mean;
            self.ar_coefficients = vec![];
            self.ma_coefficients = vec![];
            self.converged = true;
            return;
        }

        // [mean if d == 0, ar.., ma..]
        let mut initial = Vec::with_capacity(offset + p + q);
        let mut bounds = Vec::with_capacity(offset + p + q);
        if offset == 1 {
            initial.push(mean);
            bounds.push((f64::NEG_INFINITY, f64::INFINITY));
        }
        initial.extend((0..p).map(|i| 0.1 / (i + 1) as f64));
        initial.extend((0..q).map(|i| 0.1 / (i + 1) as f64));
        bounds.extend(std::iter::repeat((-0.99, 0.99)).take(p + q));

        let intercept_of = |params: &[f64]| if offset == 1 { params[0] } else { 0.0 };
        let result = nelder_mead(
            |params| {
                Self::css(
                    diff_series,
                    &params[offset..offset + p],
                    &params[offset + p..],
                    intercept_of(params),
                )
            },
            &initial,
            Some(&bounds),
            NelderMeadConfig::default().with_cancel_flag(self.cancel.clone()),
        );

        let point = &result.optimal_point;
        self.intercept = intercept_of(point);
        self.ar_coefficients = point[offset..offset + p].to_vec();
        self.ma_coefficients = point[offset + p..].to_vec();
        self.converged = result.converged;
    }

    fn calculate_fitted(&mut self, diff_series: &[f64]) -> Result<()> {
        let start = self.spec.p.max(self.spec.q);
        let (fitted, residuals) = Self::filter(
            diff_series,
            &self.ar_coefficients,
            &self.ma_coefficients,
            self.intercept,
        );

        let valid = &residuals[start..];
        let variance = valid.iter().map(|r| r * r).sum::<f64>() / valid.len() as f64;
        if !variance.is_finite() {
            return Err(ForecastError::ModelFitFailure(
                "non-finite residual variance".to_string(),
            ));
        }

        let n_eff = valid.len() as f64;
        let k = self.spec.num_params() as f64;
        // Perfect fits give ln(0); keep AIC finite for comparisons
        let ll = -0.5 * n_eff * (1.0 + variance.max(1e-300).ln() + (2.0 * std::f64::consts::PI).ln());

        self.residual_variance = Some(variance);
        self.aic = Some(-2.0 * ll + 2.0 * k);
        self.fitted_diff = Some(fitted);
        self.residuals = Some(residuals);
        Ok(())
    }
}

impl Default for ARIMA {
    fn default() -> Self {
        Self::with_spec(ARIMASpec::default())
    }
}

impl Forecaster for ARIMA {
    fn fit(&mut self, series: &Series) -> Result<()> {
        let values = series.values();
        let min_len = self.spec.min_length();

        if values.len() < min_len {
            return Err(ForecastError::InsufficientData {
                needed: min_len,
                got: values.len(),
            });
        }

        let diff_series = difference(values, self.spec.d);
        self.estimate_parameters(&diff_series);
        if self.cancel.is_cancelled() {
            return Err(ForecastError::Cancelled);
        }

        let params_finite = self.intercept.is_finite()
            && self
                .ar_coefficients
                .iter()
                .chain(&self.ma_coefficients)
                .all(|c| c.is_finite());
        if !params_finite {
            return Err(ForecastError::ModelFitFailure(
                "non-finite ARIMA parameters".to_string(),
            ));
        }

        self.calculate_fitted(&diff_series)?;
        self.original = Some(values.to_vec());
        self.differenced = Some(diff_series);

        if !self.converged {
            tracing::debug!(spec = ?self.spec, "ARIMA estimation stopped at iteration limit");
        }
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let original = self.original.as_ref().ok_or(ForecastError::FitRequired)?;
        let diff_series = self
            .differenced
            .as_ref()
            .ok_or(ForecastError::FitRequired)?;
        let residuals = self.residuals.as_ref().ok_or(ForecastError::FitRequired)?;

        if horizon == 0 {
            return Ok(Forecast::new());
        }

        let mut extended_diff = diff_series.clone();
        let mut extended_residuals = residuals.clone();

        for _ in 0..horizon {
            let t = extended_diff.len();
            let mut pred = self.intercept;

            for (i, phi) in self.ar_coefficients.iter().enumerate() {
                if t > i {
                    pred += phi * (extended_diff[t - 1 - i] - self.intercept);
                }
            }
            // Future shocks are zero in expectation
            for (i, theta) in self.ma_coefficients.iter().enumerate() {
                if t > i {
                    pred += theta * extended_residuals[t - 1 - i];
                }
            }

            extended_diff.push(pred);
            extended_residuals.push(0.0);
        }

        let forecast_diff = &extended_diff[diff_series.len()..];
        let predictions = integrate(forecast_diff, original, self.spec.d);

        let forecast = Forecast::from_values(predictions);
        if !forecast.is_finite() {
            return Err(ForecastError::ModelFitFailure(
                "non-finite ARIMA forecast".to_string(),
            ));
        }
        Ok(forecast)
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        let forecast = self.predict(horizon)?;
        let sigma2 = self.residual_variance.ok_or(ForecastError::FitRequired)?;

        if horizon == 0 {
            return Ok(forecast);
        }

        let ar = multiply(
            &ar_polynomial(&self.ar_coefficients, 1),
            &differencing_polynomial(self.spec.d, 1),
        );
        let ma = ma_polynomial(&self.ma_coefficients, 1);
        let se = forecast_std_errors(&ar, &ma, sigma2, horizon);
        let z = two_sided_z(level);

        let preds = forecast.primary().to_vec();
        let lower = preds.iter().zip(&se).map(|(p, s)| p - z * s).collect();
        let upper = preds.iter().zip(&se).map(|(p, s)| p + z * s).collect();

        let forecast = Forecast::from_values_with_intervals(preds, lower, upper)?;
        if !forecast.is_finite() {
            return Err(ForecastError::ModelFitFailure(
                "non-finite ARIMA interval".to_string(),
            ));
        }
        Ok(forecast)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted_diff.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.residuals.as_deref()
    }

    fn name(&self) -> &str {
        "ARIMA"
    }
}
