//! In-memory provider holding JSON object rows per dataset.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use super::{Record, SeriesProvider};
use crate::error::{ForecastError, Result};

#[derive(Debug, Clone)]
struct Row {
    timestamp: DateTime<Utc>,
    data: Map<String, Value>,
}

/// Thread-safe table of `(dataset, timestamp, row)` entries.
///
/// Rows are free-form JSON objects; any key present in a row is a column.
/// Repeated timestamps are kept as separate rows, the way an append-only
/// ingestion log would store them.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<BTreeMap<String, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one row. Non-object values are stored under the key `"value"`.
    pub fn insert_row(&self, dataset: &str, timestamp: DateTime<Utc>, row: Value) {
        let data = match row {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        self.tables
            .write()
            .entry(dataset.to_string())
            .or_default()
            .push(Row { timestamp, data });
    }

    pub fn insert_rows<I>(&self, dataset: &str, rows: I)
    where
        I: IntoIterator<Item = (DateTime<Utc>, Value)>,
    {
        for (timestamp, row) in rows {
            self.insert_row(dataset, timestamp, row);
        }
    }

    /// Names of all datasets with at least one row.
    pub fn datasets(&self) -> Vec<String> {
        self.tables
            .read()
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Union of column names across the rows of `dataset`.
    pub fn columns(&self, dataset: &str) -> Vec<String> {
        let tables = self.tables.read();
        let Some(rows) = tables.get(dataset) else {
            return Vec::new();
        };
        rows.iter()
            .flat_map(|row| row.data.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self, dataset: &str) -> usize {
        self.tables.read().get(dataset).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().values().all(Vec::is_empty)
    }
}

impl SeriesProvider for MemoryStore {
    fn records(&self, dataset: &str, column: &str) -> Result<Vec<Record>> {
        let unavailable = || ForecastError::DataUnavailable {
            dataset: dataset.to_string(),
            column: column.to_string(),
        };

        let tables = self.tables.read();
        let rows = tables.get(dataset).ok_or_else(unavailable)?;
        let records: Vec<Record> = rows
            .iter()
            .filter_map(|row| {
                row.data
                    .get(column)
                    .map(|value| Record::new(row.timestamp, value.clone()))
            })
            .collect();

        if records.is_empty() {
            return Err(unavailable());
        }
        Ok(records)
    }
}
