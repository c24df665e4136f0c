//! Rolling spend accounting
//!
//! The ledger buckets recorded spend by UTC calendar day and month, and keeps
//! the timestamp of the last recorded transaction for cooldown checks. It
//! lives only in memory: created with the engine, mutated by `record`,
//! cleared by `reset`, never persisted.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Utc};

/// In-memory daily/monthly spend buckets plus the last-transaction timestamp
#[derive(Debug, Default)]
pub struct SpendLedger {
    daily: HashMap<String, f64>,
    monthly: HashMap<String, f64>,
    last_transaction_ms: Option<i64>,
}

/// UTC day key, the first 10 characters of the ISO-8601 timestamp
pub fn day_key(timestamp_ms: i64) -> String {
    to_utc(timestamp_ms).format("%Y-%m-%d").to_string()
}

/// UTC month key, the first 7 characters of the ISO-8601 timestamp
pub fn month_key(timestamp_ms: i64) -> String {
    to_utc(timestamp_ms).format("%Y-%m").to_string()
}

fn to_utc(timestamp_ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms).unwrap_or_default()
}

impl SpendLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total recorded on the UTC day containing `timestamp_ms`
    pub fn daily_total(&self, timestamp_ms: i64) -> f64 {
        self.daily.get(&day_key(timestamp_ms)).copied().unwrap_or(0.0)
    }

    /// Total recorded in the UTC month containing `timestamp_ms`
    pub fn monthly_total(&self, timestamp_ms: i64) -> f64 {
        self.monthly
            .get(&month_key(timestamp_ms))
            .copied()
            .unwrap_or(0.0)
    }

    /// Epoch ms of the last recorded transaction
    pub fn last_transaction_ms(&self) -> Option<i64> {
        self.last_transaction_ms
    }

    /// Add a spend to the buckets for `timestamp_ms` and advance the
    /// last-transaction marker
    ///
    /// Buckets older than one full calendar month are dropped on every call
    /// so a long-lived process stays bounded.
    pub fn record(&mut self, amount: f64, timestamp_ms: i64) {
        *self.daily.entry(day_key(timestamp_ms)).or_insert(0.0) += amount;
        *self.monthly.entry(month_key(timestamp_ms)).or_insert(0.0) += amount;
        self.last_transaction_ms = Some(timestamp_ms);
        self.prune(timestamp_ms);
    }

    /// Clear all buckets and the last-transaction marker
    pub fn reset(&mut self) {
        self.daily.clear();
        self.monthly.clear();
        self.last_transaction_ms = None;
    }

    // Keys compare lexicographically for both "YYYY-MM-DD" and "YYYY-MM", so
    // the previous month's key is a valid cutoff for both maps.
    fn prune(&mut self, timestamp_ms: i64) {
        let now = to_utc(timestamp_ms);
        let (prev_year, prev_month) = if now.month() == 1 {
            (now.year() - 1, 12)
        } else {
            (now.year(), now.month() - 1)
        };
        let cutoff = format!("{:04}-{:02}", prev_year, prev_month);
        self.daily.retain(|key, _| key.as_str() >= cutoff.as_str());
        self.monthly.retain(|key, _| key.as_str() >= cutoff.as_str());
    }
}
