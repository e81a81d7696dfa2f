//! Lag polynomials in the backshift operator `B`.
//!
//! A polynomial is stored as its coefficient vector `[c0, c1, ..., ck]`
//! meaning `c0 + c1 B + ... + ck B^k`. AR-side polynomials carry the sign
//! convention `1 - phi_1 B - ...`, MA-side ones `1 + theta_1 B + ...`.

/// `1 - c_1 B - c_2 B^2 - ...` with coefficients spaced every `stride` lags.
pub fn ar_polynomial(coefficients: &[f64], stride: usize) -> Vec<f64> {
    let mut poly = vec![0.0; coefficients.len() * stride + 1];
    poly[0] = 1.0;
    for (i, c) in coefficients.iter().enumerate() {
        poly[(i + 1) * stride] = -c;
    }
    poly
}

/// `1 + c_1 B + c_2 B^2 + ...` with coefficients spaced every `stride` lags.
pub fn ma_polynomial(coefficients: &[f64], stride: usize) -> Vec<f64> {
    let mut poly = vec![0.0; coefficients.len() * stride + 1];
    poly[0] = 1.0;
    for (i, c) in coefficients.iter().enumerate() {
        poly[(i + 1) * stride] = *c;
    }
    poly
}

/// `(1 - B^period)^order`.
pub fn differencing_polynomial(order: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    if period == 0 {
        return poly;
    }
    let mut factor = vec![0.0; period + 1];
    factor[0] = 1.0;
    factor[period] = -1.0;
    for _ in 0..order {
        poly = multiply(&poly, &factor);
    }
    poly
}

/// Product of two lag polynomials.
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return vec![];
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// MA(infinity) weights `psi_0..psi_{n-1}` of `ar(B) y = ma(B) e`.
///
/// `ar` may include unit roots from differencing; the weights then describe
/// how shocks accumulate on the integrated scale.
pub fn psi_weights(ar: &[f64], ma: &[f64], n: usize) -> Vec<f64> {
    let mut psi = Vec::with_capacity(n);
    for j in 0..n {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let mut value = ma.get(j).copied().unwrap_or(0.0);
        for i in 1..=j.min(ar.len().saturating_sub(1)) {
            value -= ar[i] * psi[j - i];
        }
        psi.push(value);
    }
    psi
}

/// Forecast standard errors for steps `1..=horizon` given innovation variance.
pub fn forecast_std_errors(ar: &[f64], ma: &[f64], sigma2: f64, horizon: usize) -> Vec<f64> {
    psi_weights(ar, ma, horizon)
        .iter()
        .scan(0.0, |acc, psi| {
            *acc += psi * psi;
            Some((sigma2 * *acc).sqrt())
        })
        .collect()
}
