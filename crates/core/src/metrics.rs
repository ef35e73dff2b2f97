//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Ticket lifecycle (created, closed, channels deleted)
//! - Interaction handling by action and result
//! - Platform (Discord REST) requests

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Ticket Metrics
// =============================================================================

/// Tickets created total.
pub static TICKETS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ticketbot_tickets_created_total", "Total tickets created").unwrap()
});

/// Tickets closed total.
pub static TICKETS_CLOSED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("ticketbot_tickets_closed_total", "Total tickets closed").unwrap()
});

/// Ticket channels deleted total.
pub static TICKET_CHANNELS_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "ticketbot_ticket_channels_deleted_total",
        "Total ticket channels deleted",
    )
    .unwrap()
});

// =============================================================================
// Interaction Metrics
// =============================================================================

/// Interactions handled by action and result.
pub static INTERACTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketbot_interactions_total", "Total interactions handled"),
        &["action", "result"], // result: "success", "failed", "ignored"
    )
    .unwrap()
});

// =============================================================================
// Platform Metrics
// =============================================================================

/// Platform request duration.
pub static PLATFORM_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ticketbot_platform_request_duration_seconds",
            "Duration of platform API calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["operation"],
    )
    .unwrap()
});

/// Platform requests total.
pub static PLATFORM_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketbot_platform_requests_total",
            "Total platform API requests",
        ),
        &["operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Record the outcome of a platform call.
pub fn record_platform_request(operation: &str, duration_secs: f64, success: bool) {
    PLATFORM_REQUEST_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
    let status = if success { "success" } else { "error" };
    PLATFORM_REQUESTS
        .with_label_values(&[operation, status])
        .inc();
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Tickets
        Box::new(TICKETS_CREATED.clone()),
        Box::new(TICKETS_CLOSED.clone()),
        Box::new(TICKET_CHANNELS_DELETED.clone()),
        // Interactions
        Box::new(INTERACTIONS.clone()),
        // Platform
        Box::new(PLATFORM_REQUEST_DURATION.clone()),
        Box::new(PLATFORM_REQUESTS.clone()),
    ]
}
