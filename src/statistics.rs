//! Query-shape statistics.
//!
//! A shape is the filter with every scalar leaf replaced by a marker, so
//! `{a: 5}` and `{a: "x"}` count as the same query. Each shape keeps a total
//! count and a frequency histogram bucketed at the configured resolution.

use crate::document::{Document, Value};
use crate::error::{Error, Result};
use crate::operation::{Operation, OperationKind, UNKNOWN_METRIC};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::trace;

/// Width of a frequency bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeResolution {
    Millisecond,
    Second,
    #[default]
    Minute,
    Hour,
    Day,
}

impl TimeResolution {
    fn unit_millis(self) -> i64 {
        match self {
            TimeResolution::Millisecond => 1,
            TimeResolution::Second => 1_000,
            TimeResolution::Minute => 60_000,
            TimeResolution::Hour => 3_600_000,
            TimeResolution::Day => 86_400_000,
        }
    }

    /// Start of the bucket `timestamp` falls into.
    pub fn truncate(self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let millis = timestamp.timestamp_millis();
        let floored = millis - millis.rem_euclid(self.unit_millis());
        DateTime::from_timestamp_millis(floored).unwrap_or(timestamp)
    }
}

impl std::str::FromStr for TimeResolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "millisecond" | "ms" => Ok(TimeResolution::Millisecond),
            "second" | "s" => Ok(TimeResolution::Second),
            "minute" | "m" => Ok(TimeResolution::Minute),
            "hour" | "h" => Ok(TimeResolution::Hour),
            "day" | "d" => Ok(TimeResolution::Day),
            other => Err(Error::Config(format!("unknown time resolution: {}", other))),
        }
    }
}

/// Replace scalar leaves with markers: `true` inside documents, `1` inside
/// arrays. Idempotent.
pub fn normalize_shape(filter: &Document) -> Document {
    filter
        .iter()
        .map(|(key, value)| {
            let normalized = match value {
                Value::Document(doc) => Value::Document(normalize_shape(doc)),
                Value::Array(items) => Value::Array(normalize_array(items)),
                _ => Value::Boolean(true),
            };
            (key.to_string(), normalized)
        })
        .collect()
}

fn normalize_array(items: &[Value]) -> Vec<Value> {
    items
        .iter()
        .map(|item| match item {
            Value::Document(doc) => Value::Document(normalize_shape(doc)),
            Value::Array(inner) => Value::Array(normalize_array(inner)),
            _ => Value::Int32(1),
        })
        .collect()
}

/// Aggregated counters for one query shape.
#[derive(Debug, Clone, Serialize)]
pub struct ShapeStatistics {
    pub shape: Document,
    pub count: u64,
    pub frequency: BTreeMap<DateTime<Utc>, u64>,
    /// Sum of execution times over operations that reported one.
    pub total_millis: i64,
    /// Operations without a recorded execution time.
    pub unknown_millis: u64,
}

impl ShapeStatistics {
    fn new(shape: Document) -> Self {
        Self {
            shape,
            count: 0,
            frequency: BTreeMap::new(),
            total_millis: 0,
            unknown_millis: 0,
        }
    }

    fn record(&mut self, bucket: DateTime<Utc>, millis: i64) {
        self.count += 1;
        *self.frequency.entry(bucket).or_insert(0) += 1;
        if millis == UNKNOWN_METRIC {
            self.unknown_millis += 1;
        } else {
            self.total_millis += millis;
        }
    }

    /// Mean execution time over operations that reported one.
    pub fn average_millis(&self) -> Option<f64> {
        let known = self.count - self.unknown_millis;
        (known > 0).then(|| self.total_millis as f64 / known as f64)
    }
}

impl PartialEq for ShapeStatistics {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatisticsProcessor {
    resolution: TimeResolution,
    stats: Vec<ShapeStatistics>,
    by_shape: HashMap<String, usize>,
}

impl StatisticsProcessor {
    pub fn new(resolution: TimeResolution) -> Self {
        Self {
            resolution,
            ..Self::default()
        }
    }

    pub fn resolution(&self) -> TimeResolution {
        self.resolution
    }

    pub fn process(&mut self, operation: &Operation) -> Result<()> {
        match operation.kind() {
            OperationKind::Query(shape) => {
                self.record(&shape.filter, operation.timestamp(), operation.millis());
                Ok(())
            }
            OperationKind::Aggregation { .. } => Err(Error::NotImplemented(
                "statistics for aggregation operations".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn record(&mut self, filter: &Document, timestamp: DateTime<Utc>, millis: i64) {
        let shape = normalize_shape(filter);
        // the shell rendering distinguishes value types, so it works as a key
        let key = shape.to_string();
        let bucket = self.resolution.truncate(timestamp);
        let idx = match self.by_shape.get(&key) {
            Some(&idx) => idx,
            None => {
                trace!(shape = %key, "New query shape");
                self.stats.push(ShapeStatistics::new(shape));
                self.by_shape.insert(key, self.stats.len() - 1);
                self.stats.len() - 1
            }
        };
        self.stats[idx].record(bucket, millis);
    }

    /// Snapshot of all shapes in first-seen order.
    pub fn statistics(&self) -> Vec<ShapeStatistics> {
        self.stats.clone()
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}
