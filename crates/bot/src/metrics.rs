//! Prometheus metrics for observability.
//!
//! The registry holds the core counters (tickets, interactions, platform
//! requests) plus gauges refreshed from application state on every scrape.

use once_cell::sync::Lazy;
use prometheus::{self, Encoder, IntGauge, Registry, TextEncoder};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Open tickets (collected dynamically).
pub static OPEN_TICKETS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("ticketbot_open_tickets", "Number of currently open tickets").unwrap()
});

fn register_metrics(registry: &Registry) {
    registry.register(Box::new(OPEN_TICKETS.clone())).unwrap();

    for metric in ticketbot_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Refresh gauges from current application state.
pub fn collect_dynamic_metrics(state: &AppState) {
    match state.ticket_service().get_open_tickets() {
        Ok(open) => OPEN_TICKETS.set(open.len() as i64),
        Err(e) => tracing::warn!("Failed to count open tickets: {}", e),
    }
}
