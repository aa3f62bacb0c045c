use std::time::Duration;

use super::correlate::CompletedRequest;
use super::table::BoundedTable;

/// Aggregation key: port-stripped source host, label-preferred destination,
/// request path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub source: String,
    pub destination: String,
    pub path: String,
}

impl RowKey {
    /// Derives the key for a completed request. Deterministic: the same
    /// record always maps to the same key.
    pub fn for_request(record: &CompletedRequest) -> Self {
        Self {
            source: strip_port(&record.source).to_string(),
            destination: strip_port(&record.destination).to_string(),
            path: record.path.clone(),
        }
    }
}

/// Rolling statistics for one aggregation key.
#[derive(Debug, Clone, Copy)]
struct RowStats {
    count: u64,
    best: Duration,
    worst: Duration,
    last: Duration,
    successes: u64,
    failures: u64,
}

/// One row of the rendered snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateRow {
    pub source: String,
    pub destination: String,
    pub path: String,
    pub count: u64,
    pub best: Duration,
    pub worst: Duration,
    pub last: Duration,
    pub successes: u64,
    pub failures: u64,
}

impl AggregateRow {
    /// Fraction of requests that succeeded, in [0, 1].
    pub fn success_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            return 0.0;
        }
        self.successes as f64 / total as f64
    }
}

/// Folds completed requests into a bounded table of per-key statistics.
///
/// Owned by the render loop; records arrive over a channel in the order
/// the correlator emitted them.
pub struct Aggregator {
    rows: BoundedTable<RowKey, RowStats>,
}

impl Aggregator {
    /// Creates an aggregator keeping at most `max_rows` keys.
    pub fn new(max_rows: usize) -> Self {
        Self {
            rows: BoundedTable::new(max_rows),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Folds one completed request into its row, creating the row (and
    /// evicting the least-recently-updated one at capacity) when absent.
    pub fn fold(&mut self, record: &CompletedRequest) {
        let key = RowKey::for_request(record);

        if let Some(stats) = self.rows.get_mut(&key) {
            stats.count += 1;
            stats.best = stats.best.min(record.latency);
            stats.worst = stats.worst.max(record.latency);
            stats.last = record.latency;
            if record.success {
                stats.successes += 1;
            } else {
                stats.failures += 1;
            }
            return;
        }

        self.rows.insert(
            key,
            RowStats {
                count: 1,
                best: record.latency,
                worst: record.latency,
                last: record.latency,
                successes: u64::from(record.success),
                failures: u64::from(!record.success),
            },
        );
    }

    /// Returns all rows sorted by count descending.
    ///
    /// The sort is stable over the table's insertion order, so rows with
    /// equal counts keep their relative position across ticks.
    pub fn snapshot(&self) -> Vec<AggregateRow> {
        let mut rows: Vec<AggregateRow> = self
            .rows
            .iter()
            .map(|(key, stats)| AggregateRow {
                source: key.source.clone(),
                destination: key.destination.clone(),
                path: key.path.clone(),
                count: stats.count,
                best: stats.best,
                worst: stats.worst,
                last: stats.last,
                successes: stats.successes,
                failures: stats.failures,
            })
            .collect();

        rows.sort_by(|a, b| b.count.cmp(&a.count));
        rows
    }
}

/// Drops the port from a `host:port` address. Bare hosts and workload
/// labels pass through unchanged.
pub fn strip_port(address: &str) -> &str {
    address.split(':').next().unwrap_or(address)
}
