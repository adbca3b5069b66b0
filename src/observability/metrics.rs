//! Metrics collection.
//!
//! # Responsibilities
//! - Define relay metrics (tracked requests, deliveries, faults)
//! - Record them through the metrics facade
//!
//! # Metrics
//! - `relay_requests_tracked_total` (counter): requests entering the
//!   in-flight table
//! - `relay_records_delivered_total` (counter): successful deliveries by kind
//! - `relay_delivery_failures_total` (counter): failed deliveries by kind
//!   and failure class
//! - `relay_listener_faults_total` (counter): listener panics by event
//! - `relay_known_endpoints` (gauge): size of the current endpoint set
//!
//! # Design Decisions
//! - Facade only; the host picks the exporter
//! - Low-overhead updates (atomic operations)

use metrics::{counter, gauge};

pub fn record_request_tracked() {
    counter!("relay_requests_tracked_total").increment(1);
}

pub fn record_delivered(kind: &str) {
    counter!("relay_records_delivered_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_delivery_failure(kind: &str, class: &str) {
    counter!(
        "relay_delivery_failures_total",
        "kind" => kind.to_string(),
        "class" => class.to_string()
    )
    .increment(1);
}

pub fn record_listener_fault(event: &str) {
    counter!("relay_listener_faults_total", "event" => event.to_string()).increment(1);
}

pub fn record_endpoint_count(count: usize) {
    gauge!("relay_known_endpoints").set(count as f64);
}
