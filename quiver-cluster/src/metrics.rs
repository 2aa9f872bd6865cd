//! Rebalancing observability metrics
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the embedding application.
//! - Planned transfers per operation
//! - Issued and failed transfers
//! - Operation completion and duration

use std::time::Duration;

/// Record the size of a computed plan
pub fn record_planned_transfers(operation: &str, count: usize) {
    metrics::counter!(
        "quiver_rebalance_planned_transfers_total",
        "operation" => operation.to_string(),
    )
    .increment(count as u64);
}

/// Record a transfer sent to the cluster
pub fn record_transfer_issued(collection: &str, is_move: bool) {
    metrics::counter!(
        "quiver_shard_transfers_total",
        "collection" => collection.to_string(),
        "kind" => if is_move { "move" } else { "replicate" },
    )
    .increment(1);
}

/// Record a transfer the cluster did not accept
pub fn record_transfer_failed(collection: &str, error_type: &str) {
    metrics::counter!(
        "quiver_shard_transfer_errors_total",
        "collection" => collection.to_string(),
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Record round-trip time of one transfer command
pub fn record_transfer_duration(duration: Duration) {
    metrics::histogram!("quiver_shard_transfer_request_duration_seconds")
        .record(duration.as_secs_f64());
}

/// Record compound operation completion
pub fn record_rebalance_completion(operation: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "failure" };
    metrics::counter!(
        "quiver_rebalance_completed_total",
        "operation" => operation.to_string(),
        "status" => status,
    )
    .increment(1);

    metrics::histogram!(
        "quiver_rebalance_duration_seconds",
        "operation" => operation.to_string(),
    )
    .record(duration.as_secs_f64());
}
