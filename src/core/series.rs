//! Univariate observation series and numeric coercion of raw cells.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single timestamped numeric observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Observation {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Coerce a raw JSON cell into a finite number.
///
/// Numbers pass through, strings are trimmed and parsed. Everything else,
/// including NaN/Inf spelled out in strings, is rejected.
pub fn coerce_numeric(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Chronologically ordered series for one `(dataset, column)` pair.
///
/// Construction enforces the invariants every model relies on: values are
/// finite, timestamps strictly increase, and no timestamp appears twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<f64>,
}

impl Series {
    /// Build a series from observations in any order.
    ///
    /// Non-finite values are dropped. When a timestamp repeats, the
    /// observation that came last in the input wins.
    pub fn new(observations: impl IntoIterator<Item = Observation>) -> Self {
        let mut obs: Vec<Observation> = observations
            .into_iter()
            .filter(|o| o.value.is_finite())
            .collect();
        obs.sort_by_key(|o| o.timestamp);

        let mut timestamps: Vec<DateTime<Utc>> = Vec::with_capacity(obs.len());
        let mut values: Vec<f64> = Vec::with_capacity(obs.len());
        for o in obs {
            if timestamps.last() == Some(&o.timestamp) {
                if let Some(last) = values.last_mut() {
                    *last = o.value;
                }
                continue;
            }
            timestamps.push(o.timestamp);
            values.push(o.value);
        }

        Self { timestamps, values }
    }

    /// Build an evenly spaced series starting at `start`.
    pub fn regular(start: DateTime<Utc>, step: Duration, values: &[f64]) -> Self {
        Self::new(
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| Observation::new(start + step * i as i32, v)),
        )
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    pub fn observations(&self) -> impl Iterator<Item = Observation> + '_ {
        self.timestamps
            .iter()
            .zip(self.values.iter())
            .map(|(&t, &v)| Observation::new(t, v))
    }

    /// The observations strictly older than `cutoff`.
    pub fn before(&self, cutoff: DateTime<Utc>) -> Series {
        let end = self.timestamps.partition_point(|t| *t < cutoff);
        Series {
            timestamps: self.timestamps[..end].to_vec(),
            values: self.values[..end].to_vec(),
        }
    }

    /// The last `n` observations (or all of them if shorter).
    pub fn tail(&self, n: usize) -> Series {
        let start = self.len().saturating_sub(n);
        Series {
            timestamps: self.timestamps[start..].to_vec(),
            values: self.values[start..].to_vec(),
        }
    }
}
