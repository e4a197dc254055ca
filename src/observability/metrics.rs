//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_gate_decisions_total` (counter): gate outcomes by decision, reason
//! - `gateway_relay_sessions_active` (gauge): live relay sessions
//! - `gateway_relay_sessions_total` (counter): finished sessions by termination
//! - `gateway_relay_frames_total` (counter): relayed frames by direction
//! - `gateway_relay_dial_seconds` (histogram): upstream dial latency
//! - `gateway_http_requests_total` (counter): HTTP requests by endpoint, status
//! - `gateway_degraded_responses_total` (counter): synthetic responses by failure
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Exporter failure is logged, never fatal

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_gate_decision(decision: &'static str, reason: &'static str) {
    counter!("gateway_gate_decisions_total", "decision" => decision, "reason" => reason).increment(1);
}

pub fn record_session_opened() {
    gauge!("gateway_relay_sessions_active").increment(1.0);
}

pub fn record_session_closed(termination: &'static str) {
    gauge!("gateway_relay_sessions_active").decrement(1.0);
    counter!("gateway_relay_sessions_total", "termination" => termination).increment(1);
}

pub fn record_frame(direction: &'static str) {
    counter!("gateway_relay_frames_total", "direction" => direction).increment(1);
}

pub fn record_dial(start: Instant) {
    histogram!("gateway_relay_dial_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_request(endpoint: &'static str, status: u16) {
    counter!("gateway_http_requests_total", "endpoint" => endpoint, "status" => status.to_string())
        .increment(1);
}

pub fn record_degraded(failure: &'static str) {
    counter!("gateway_degraded_responses_total", "failure" => failure).increment(1);
}
