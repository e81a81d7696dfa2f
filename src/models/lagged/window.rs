//! Supervised training windows over a univariate series.

use crate::error::{ForecastError, Result};

/// Feature rows and labels built by sliding a `lag`-wide window.
#[derive(Debug, Clone, PartialEq)]
pub struct LagMatrix {
    /// `features[k]` holds `series[k..k + lag]`.
    pub features: Vec<Vec<f64>>,
    /// `targets[k]` is `series[k + lag]`.
    pub targets: Vec<f64>,
}

impl LagMatrix {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Build lagged training examples: the `lag` values preceding each
/// observation are its features, the observation is its label.
///
/// Needs at least one full window, i.e. `series.len() > lag`.
///
/// # Example
/// ```
/// use multiforecast::models::lagged::lagged_windows;
///
/// let m = lagged_windows(&[1.0, 2.0, 3.0, 4.0], 2).unwrap();
/// assert_eq!(m.features, vec![vec![1.0, 2.0], vec![2.0, 3.0]]);
/// assert_eq!(m.targets, vec![3.0, 4.0]);
/// ```
pub fn lagged_windows(series: &[f64], lag: usize) -> Result<LagMatrix> {
    if lag == 0 {
        return Err(ForecastError::InvalidParameter(
            "lag must be positive".to_string(),
        ));
    }
    if series.len() <= lag {
        return Err(ForecastError::InsufficientData {
            needed: lag + 1,
            got: series.len(),
        });
    }

    let (features, targets) = series
        .windows(lag + 1)
        .map(|w| (w[..lag].to_vec(), w[lag]))
        .unzip();

    Ok(LagMatrix { features, targets })
}
