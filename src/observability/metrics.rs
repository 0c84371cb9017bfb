//! Metrics collection.
//!
//! # Metrics
//! - `config_fetch_total` (counter): updater runs by outcome
//! - `config_fetch_duration_seconds` (histogram): updater latency
//! - `config_fetch_retries_total` (counter): retried attempts
//! - `config_persist_total` (counter): snapshot writes by outcome
//! - `config_restore_total` (counter): restore attempts by outcome
//! - `config_cache_entries` (gauge): live entries in a query client

use std::time::Duration;

pub fn record_fetch(outcome: &'static str, elapsed: Duration) {
    metrics::counter!("config_fetch_total", "outcome" => outcome).increment(1);
    metrics::histogram!("config_fetch_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_retry() {
    metrics::counter!("config_fetch_retries_total").increment(1);
}

pub fn record_persist(outcome: &'static str) {
    metrics::counter!("config_persist_total", "outcome" => outcome).increment(1);
}

pub fn record_restore(outcome: &'static str) {
    metrics::counter!("config_restore_total", "outcome" => outcome).increment(1);
}

pub fn record_cache_entries(count: usize) {
    metrics::gauge!("config_cache_entries").set(count as f64);
}
