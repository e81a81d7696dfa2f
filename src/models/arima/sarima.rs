//! Seasonal ARIMA, SARIMA(p, d, q)(P, D, Q)\[s\].

use crate::core::{Forecast, Series};
use crate::error::{ForecastError, Result};
use crate::models::arima::diff::{difference, seasonal_difference};
use crate::models::arima::poly::{
    ar_polynomial, differencing_polynomial, forecast_std_errors, ma_polynomial, multiply,
};
use crate::models::Forecaster;
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use crate::utils::CancelFlag;
use crate::utils::stats::two_sided_z;

/// SARIMA model specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SARIMASpec {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    /// Seasonal AR order (P)
    pub cap_p: usize,
    /// Seasonal differencing order (D)
    pub cap_d: usize,
    /// Seasonal MA order (Q)
    pub cap_q: usize,
    /// Season length (s)
    pub period: usize,
}

impl SARIMASpec {
    pub fn new(
        p: usize,
        d: usize,
        q: usize,
        cap_p: usize,
        cap_d: usize,
        cap_q: usize,
        period: usize,
    ) -> Self {
        Self {
            p,
            d,
            q,
            cap_p,
            cap_d,
            cap_q,
            period,
        }
    }

    pub fn num_params(&self) -> usize {
        self.p + self.q + self.cap_p + self.cap_q
    }

    /// Lag spacing of the seasonal terms.
    pub fn stride(&self) -> usize {
        self.period.max(1)
    }

    /// Observations lost to regular and seasonal differencing.
    pub fn differencing_offset(&self) -> usize {
        self.d + self.cap_d * self.stride()
    }

    /// Shortest series the model can be fitted to.
    pub fn min_length(&self) -> usize {
        let ar_span = self.p + self.cap_p * self.stride();
        let ma_span = self.q + self.cap_q * self.stride();
        self.differencing_offset() + ar_span.max(ma_span) + 2
    }
}

impl Default for SARIMASpec {
    fn default() -> Self {
        Self::new(1, 1, 1, 1, 1, 1, 12)
    }
}

/// Multiplicative seasonal ARIMA without a constant term.
///
/// The model is
/// `phi(B) Phi(B^s) (1-B)^d (1-B^s)^D y_t = theta(B) Theta(B^s) e_t`.
/// Coefficients are estimated by conditional sum of squares on the
/// differenced series; forecasts run the expanded recursion directly on the
/// original scale, so no separate integration step is needed.
#[derive(Debug, Clone)]
pub struct SARIMA {
    spec: SARIMASpec,
    ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ar: Vec<f64>,
    seasonal_ma: Vec<f64>,
    /// Full AR-side polynomial including differencing.
    full_ar: Vec<f64>,
    /// Full MA-side polynomial.
    full_ma: Vec<f64>,
    original: Option<Vec<f64>>,
    /// Innovations aligned with the original series (zero before the first
    /// identifiable one).
    innovations: Option<Vec<f64>>,
    fitted: Option<Vec<f64>>,
    residual_variance: Option<f64>,
    cancel: CancelFlag,
}

impl SARIMA {
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self::with_spec(SARIMASpec::new(p, d, q, 0, 0, 0, 0))
    }

    /// Add a seasonal component.
    pub fn with_seasonal(mut self, cap_p: usize, cap_d: usize, cap_q: usize, period: usize) -> Self {
        self.spec.cap_p = cap_p;
        self.spec.cap_d = cap_d;
        self.spec.cap_q = cap_q;
        self.spec.period = period;
        self
    }

    pub fn with_spec(spec: SARIMASpec) -> Self {
        Self {
            spec,
            ar: vec![],
            ma: vec![],
            seasonal_ar: vec![],
            seasonal_ma: vec![],
            full_ar: vec![1.0],
            full_ma: vec![1.0],
            original: None,
            innovations: None,
            fitted: None,
            residual_variance: None,
            cancel: CancelFlag::default(),
        }
    }

    /// Abandon estimation with [`ForecastError::Cancelled`] once `cancel` is set.
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn spec(&self) -> SARIMASpec {
        self.spec
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.ma
    }

    pub fn seasonal_ar_coefficients(&self) -> &[f64] {
        &self.seasonal_ar
    }

    pub fn seasonal_ma_coefficients(&self) -> &[f64] {
        &self.seasonal_ma
    }

    pub fn residual_variance(&self) -> Option<f64> {
        self.residual_variance
    }

    fn seasonal_stride(&self) -> usize {
        self.spec.stride()
    }

    /// Split a flat parameter vector into (ar, ma, seasonal ar, seasonal ma).
    fn split<'a>(&self, params: &'a [f64]) -> (&'a [f64], &'a [f64], &'a [f64], &'a [f64]) {
        let SARIMASpec { p, q, cap_p, .. } = self.spec;
        let (ar, rest) = params.split_at(p);
        let (ma, rest) = rest.split_at(q);
        let (sar, sma) = rest.split_at(cap_p);
        (ar, ma, sar, sma)
    }

    /// Stationary-part polynomials `phi(B)Phi(B^s)` and `theta(B)Theta(B^s)`.
    fn arma_polynomials(&self, ar: &[f64], ma: &[f64], sar: &[f64], sma: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let s = self.seasonal_stride();
        (
            multiply(&ar_polynomial(ar, 1), &ar_polynomial(sar, s)),
            multiply(&ma_polynomial(ma, 1), &ma_polynomial(sma, s)),
        )
    }

    /// Innovations of the ARMA recursion `ar(B) w = ma(B) e` on a stationary series.
    fn innovations_of(w: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
        let start = ar.len() - 1;
        let mut e = vec![0.0; w.len()];
        for t in start..w.len() {
            let mut pred = 0.0;
            for (i, a) in ar.iter().enumerate().skip(1) {
                pred -= a * w[t - i];
            }
            for (j, m) in ma.iter().enumerate().skip(1) {
                if t >= j {
                    pred += m * e[t - j];
                }
            }
            e[t] = w[t] - pred;
        }
        e
    }

    fn css(&self, w: &[f64], params: &[f64]) -> f64 {
        let (ar, ma, sar, sma) = self.split(params);
        let (ar_poly, ma_poly) = self.arma_polynomials(ar, ma, sar, sma);
        let start = ar_poly.len() - 1;
        if w.len() <= start {
            return f64::MAX;
        }
        let e = Self::innovations_of(w, &ar_poly, &ma_poly);
        e[start..].iter().map(|x| x * x).sum()
    }
}

impl Default for SARIMA {
    fn default() -> Self {
        Self::with_spec(SARIMASpec::default())
    }
}

impl Forecaster for SARIMA {
    fn fit(&mut self, series: &Series) -> Result<()> {
        let values = series.values();
        let min_len = self.spec.min_length();
        if values.len() < min_len {
            return Err(ForecastError::InsufficientData {
                needed: min_len,
                got: values.len(),
            });
        }

        let w = seasonal_difference(
            &difference(values, self.spec.d),
            self.spec.cap_d,
            self.seasonal_stride(),
        );

        let n_params = self.spec.num_params();
        let params = if n_params == 0 {
            vec![]
        } else {
            let initial = vec![0.1; n_params];
            let bounds = vec![(-0.99, 0.99); n_params];
            let result = nelder_mead(
                |params| self.css(&w, params),
                &initial,
                Some(&bounds),
                NelderMeadConfig::default().with_cancel_flag(self.cancel.clone()),
            );
            if self.cancel.is_cancelled() {
                return Err(ForecastError::Cancelled);
            }
            if !result.converged {
                tracing::debug!(spec = ?self.spec, "SARIMA estimation stopped at iteration limit");
            }
            result.optimal_point
        };
        if params.iter().any(|p| !p.is_finite()) {
            return Err(ForecastError::ModelFitFailure(
                "non-finite SARIMA parameters".to_string(),
            ));
        }

        let (ar, ma, sar, sma) = self.split(&params);
        let (ar_poly, ma_poly) = self.arma_polynomials(ar, ma, sar, sma);
        let start = ar_poly.len() - 1;
        let e = Self::innovations_of(&w, &ar_poly, &ma_poly);

        let valid = &e[start..];
        let variance = valid.iter().map(|x| x * x).sum::<f64>() / valid.len() as f64;
        if !variance.is_finite() {
            return Err(ForecastError::ModelFitFailure(
                "non-finite SARIMA residual variance".to_string(),
            ));
        }

        let offset = self.spec.differencing_offset();
        let mut innovations = vec![0.0; offset];
        innovations.extend_from_slice(&e);

        let integration = multiply(
            &differencing_polynomial(self.spec.d, 1),
            &differencing_polynomial(self.spec.cap_d, self.seasonal_stride()),
        );

        self.ar = ar.to_vec();
        self.ma = ma.to_vec();
        self.seasonal_ar = sar.to_vec();
        self.seasonal_ma = sma.to_vec();
        self.full_ar = multiply(&ar_poly, &integration);
        self.full_ma = ma_poly;
        self.fitted = Some(
            values
                .iter()
                .zip(&innovations)
                .map(|(y, e)| y - e)
                .collect(),
        );
        self.innovations = Some(innovations);
        self.original = Some(values.to_vec());
        self.residual_variance = Some(variance);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let original = self.original.as_ref().ok_or(ForecastError::FitRequired)?;
        let innovations = self.innovations.as_ref().ok_or(ForecastError::FitRequired)?;

        let mut y = original.clone();
        let mut e = innovations.clone();
        for _ in 0..horizon {
            let t = y.len();
            let mut pred = 0.0;
            for (i, a) in self.full_ar.iter().enumerate().skip(1) {
                if t >= i {
                    pred -= a * y[t - i];
                }
            }
            for (j, m) in self.full_ma.iter().enumerate().skip(1) {
                if t >= j {
                    pred += m * e[t - j];
                }
            }
            y.push(pred);
            e.push(0.0);
        }

        let forecast = Forecast::from_values(y[original.len()..].to_vec());
        if !forecast.is_finite() {
            return Err(ForecastError::ModelFitFailure(
                "non-finite SARIMA forecast".to_string(),
            ));
        }
        Ok(forecast)
    }

    fn predict_with_intervals(&self, horizon: usize, level: f64) -> Result<Forecast> {
        let forecast = self.predict(horizon)?;
        let sigma2 = self.residual_variance.ok_or(ForecastError::FitRequired)?;

        let se = forecast_std_errors(&self.full_ar, &self.full_ma, sigma2, horizon);
        let z = two_sided_z(level);
        let preds = forecast.primary().to_vec();
        let lower = preds.iter().zip(&se).map(|(p, s)| p - z * s).collect();
        let upper = preds.iter().zip(&se).map(|(p, s)| p + z * s).collect();

        let forecast = Forecast::from_values_with_intervals(preds, lower, upper)?;
        if !forecast.is_finite() {
            return Err(ForecastError::ModelFitFailure(
                "non-finite SARIMA interval".to_string(),
            ));
        }
        Ok(forecast)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.fitted.as_deref()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.innovations.as_deref()
    }

    fn name(&self) -> &str {
        "SARIMA"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn make_series(values: &[f64]) -> Series {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Series::regular(base, Duration::days(1), values)
    }

    fn seasonal_values(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                50.0 + 0.3 * i as f64
                    + 8.0 * (2.0 * std::f64::consts::PI * i as f64 / 12.0).sin()
                    + (i as f64 * 1.7).cos() * 0.2
            })
            .collect()
    }

    #[test]
    fn default_spec_is_111_111_12() {
        let model = SARIMA::default();
        assert_eq!(model.spec(), SARIMASpec::new(1, 1, 1, 1, 1, 1, 12));
        assert_eq!(model.spec().min_length(), 28);
        assert_eq!(model.spec().num_params(), 4);
    }

    #[test]
    fn sarima_linear_series_continues_trend() {
        let values: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let mut model = SARIMA::default();
        model.fit(&make_series(&values)).unwrap();

        let forecast = model.predict_with_intervals(5, 0.95).unwrap();
        for (i, p) in forecast.primary().iter().enumerate() {
            assert_relative_eq!(*p, 160.0 + i as f64, epsilon = 1e-6);
        }
    }

    #[test]
    fn sarima_tracks_seasonal_pattern() {
        let values = seasonal_values(120);
        let mut model = SARIMA::default();
        model.fit(&make_series(&values)).unwrap();

        let future = seasonal_values(132);
        let forecast = model.predict(12).unwrap();
        for (p, actual) in forecast.primary().iter().zip(&future[120..]) {
            assert!((p - actual).abs() < 3.0, "forecast {p} vs actual {actual}");
        }
    }

    #[test]
    fn sarima_intervals_bracket_points_and_widen() {
        let mut model = SARIMA::default();
        model.fit(&make_series(&seasonal_values(96))).unwrap();

        let forecast = model.predict_with_intervals(10, 0.95).unwrap();
        let lower = forecast.lower().unwrap();
        let upper = forecast.upper().unwrap();
        for (i, p) in forecast.primary().iter().enumerate() {
            assert!(lower[i] < *p && *p < upper[i]);
        }
        assert!(upper[9] - lower[9] > upper[0] - lower[0]);
    }

    #[test]
    fn sarima_insufficient_data() {
        let mut model = SARIMA::default();
        let result = model.fit(&make_series(&seasonal_values(20)));
        assert_eq!(
            result,
            Err(ForecastError::InsufficientData { needed: 28, got: 20 })
        );
    }

    #[test]
    fn non_seasonal_sarima_matches_random_walk() {
        let mut model = SARIMA::new(0, 1, 0);
        model.fit(&make_series(&[1.0, 3.0, 2.0, 4.0, 3.0])).unwrap();

        let forecast = model.predict(3).unwrap();
        assert_eq!(forecast.primary(), &[3.0, 3.0, 3.0]);
    }

    #[test]
    fn sarima_cancelled_during_estimation() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let mut model = SARIMA::default().with_cancel_flag(cancel);
        assert_eq!(
            model.fit(&make_series(&seasonal_values(60))),
            Err(ForecastError::Cancelled)
        );
    }

    #[test]
    fn sarima_requires_fit() {
        let model = SARIMA::default();
        assert!(matches!(model.predict(3), Err(ForecastError::FitRequired)));
        assert_eq!(model.name(), "SARIMA");
    }
}
