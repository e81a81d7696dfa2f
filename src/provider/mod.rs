//! Read access to stored observations.
//!
//! The pipeline never talks to storage directly; it is handed a
//! [`SeriesProvider`] and asks it for raw records of one column.

mod memory;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{coerce_numeric, Observation, Series};
use crate::error::{ForecastError, Result};

pub use memory::MemoryStore;

/// One raw cell of a dataset column, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub value: Value,
}

impl Record {
    pub fn new(timestamp: DateTime<Utc>, value: impl Into<Value>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }

    /// The cell as a finite number, if it is one.
    pub fn numeric(&self) -> Option<f64> {
        coerce_numeric(&self.value)
    }
}

/// Source of historical records for `(dataset, column)` pairs.
pub trait SeriesProvider: Send + Sync {
    /// Every stored record of `column` in `dataset`, in storage order.
    ///
    /// Fails with [`ForecastError::DataUnavailable`] when the dataset is
    /// missing or empty or no row carries the column.
    fn records(&self, dataset: &str, column: &str) -> Result<Vec<Record>>;

    /// Up to `limit` most recent records, newest first.
    ///
    /// Rows sharing a timestamp are all returned, the one stored last
    /// first, so the result may hold fewer distinct timestamps than `limit`.
    fn recent(&self, dataset: &str, column: &str, limit: usize) -> Result<Vec<Record>> {
        let mut records = self.records(dataset, column)?;
        records.reverse();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        Ok(records)
    }

    /// The numeric series for `column`: non-numeric cells dropped,
    /// ascending by time, one value per timestamp.
    fn series(&self, dataset: &str, column: &str) -> Result<Series> {
        let observations: Vec<Observation> = self
            .records(dataset, column)?
            .iter()
            .filter_map(|r| r.numeric().map(|v| Observation::new(r.timestamp, v)))
            .collect();

        if observations.is_empty() {
            return Err(ForecastError::ColumnNotNumeric {
                dataset: dataset.to_string(),
                column: column.to_string(),
            });
        }
        Ok(Series::new(observations))
    }
}

impl<T: SeriesProvider + ?Sized> SeriesProvider for &T {
    fn records(&self, dataset: &str, column: &str) -> Result<Vec<Record>> {
        (**self).records(dataset, column)
    }

    fn recent(&self, dataset: &str, column: &str, limit: usize) -> Result<Vec<Record>> {
        (**self).recent(dataset, column, limit)
    }
}

impl<T: SeriesProvider + ?Sized> SeriesProvider for Arc<T> {
    fn records(&self, dataset: &str, column: &str) -> Result<Vec<Record>> {
        (**self).records(dataset, column)
    }

    fn recent(&self, dataset: &str, column: &str, limit: usize) -> Result<Vec<Record>> {
        (**self).recent(dataset, column, limit)
    }
}
