//! Prometheus metrics for observability.
//!
//! - HTTP request metrics (latency, counts, auth failures)
//! - Ticket creation and state transition counters
//! - Standby queue triage outcomes
//! - Tickets by state and pending queue size (collected on scrape)

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use ticketdesk_core::{QueueFilter, TicketFilter, TicketState};

use crate::state::AppState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "ticketdesk_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .expect("metric definition is valid")
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("ticketdesk_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("metric definition is valid")
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "ticketdesk_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .expect("metric definition is valid")
});

/// Authentication failures.
pub static AUTH_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketdesk_auth_failures_total",
            "Total authentication failures",
        ),
        &["reason"],
    )
    .expect("metric definition is valid")
});

// =============================================================================
// Ticket Metrics
// =============================================================================

/// Tickets by current state (collected dynamically).
pub static TICKETS_BY_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("ticketdesk_tickets_by_state", "Current ticket count by state"),
        &["state"],
    )
    .expect("metric definition is valid")
});

/// Ticket state transitions.
pub static TICKET_STATE_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketdesk_ticket_state_transitions_total",
            "Ticket state transitions",
        ),
        &["from_state", "to_state"],
    )
    .expect("metric definition is valid")
});

/// Tickets created, by source.
pub static TICKETS_CREATED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketdesk_tickets_created_total",
            "Total tickets created since startup",
        ),
        &["source"],
    )
    .expect("metric definition is valid")
});

// =============================================================================
// Standby Queue Metrics
// =============================================================================

/// Triage attempts by action and outcome.
pub static QUEUE_DISPOSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "ticketdesk_queue_dispositions_total",
            "Standby queue triage attempts by action and outcome",
        ),
        &["action", "outcome"],
    )
    .expect("metric definition is valid")
});

/// Pending standby queue items (collected dynamically).
pub static QUEUE_PENDING: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "ticketdesk_queue_pending_items",
            "Pending standby queue items",
        ),
        &["sync_failed"],
    )
    .expect("metric definition is valid")
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // HTTP
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(AUTH_FAILURES_TOTAL.clone()),
        // Tickets
        Box::new(TICKETS_BY_STATE.clone()),
        Box::new(TICKET_STATE_TRANSITIONS.clone()),
        Box::new(TICKETS_CREATED_TOTAL.clone()),
        // Standby queue
        Box::new(QUEUE_DISPOSITIONS.clone()),
        Box::new(QUEUE_PENDING.clone()),
    ];

    for collector in collectors {
        registry
            .register(collector)
            .expect("metric names are unique");
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Refresh the gauges that mirror stored data.
///
/// Called on every scrape; store errors leave the previous value in place.
pub fn collect_dynamic_metrics(state: &AppState) {
    let ticket_store = state.ticket_store();
    for ticket_state in TicketState::ALL {
        let filter = TicketFilter::new().with_state(ticket_state);
        if let Ok(count) = ticket_store.count(&filter) {
            TICKETS_BY_STATE
                .with_label_values(&[ticket_state.as_str()])
                .set(count);
        }
    }

    let queue_store = state.queue_store();
    for failed in [true, false] {
        let filter = QueueFilter::new().with_sync_failed(failed);
        if let Ok(count) = queue_store.count(&filter) {
            QUEUE_PENDING
                .with_label_values(&[if failed { "true" } else { "false" }])
                .set(count);
        }
    }
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .expect("uuid pattern is valid")
});

static NUMERIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+(/|$)").expect("numeric pattern is valid"));

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_RE.replace_all(path, "{id}");
    // Applied twice: adjacent ids share a slash, so one pass skips every other one
    let result = NUMERIC_RE.replace_all(&result, "/{id}$1");
    let result = NUMERIC_RE.replace_all(&result, "/{id}$1");
    result.to_string()
}
