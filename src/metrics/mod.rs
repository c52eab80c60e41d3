//! Prometheus metrics module
//!
//! Recording goes through the `metrics` facade, so shards record without a
//! handle and without an installed recorder (tests). [`GatewayMetrics`]
//! installs the Prometheus recorder and renders it.

use crate::error::GatewayError;
use ::metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;

/// Gateway metrics exporter
#[derive(Clone)]
pub struct GatewayMetrics {
    handle: Arc<PrometheusHandle>,
}

impl GatewayMetrics {
    /// Install the Prometheus recorder and register descriptions
    pub fn install() -> Result<Self, GatewayError> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| GatewayError::MetricsInstall(Box::new(e)))?;

        Self::register_metrics();

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    /// Register metric descriptions
    fn register_metrics() {
        describe_counter!(
            "gateway_dispatches_received_total",
            Unit::Count,
            "Total dispatch events received from the gateway"
        );
        describe_counter!(
            "gateway_heartbeats_sent_total",
            Unit::Count,
            "Total heartbeats sent"
        );
        describe_counter!(
            "gateway_zombie_connections_total",
            Unit::Count,
            "Heartbeats that went unacknowledged"
        );
        describe_counter!(
            "gateway_reconnects_total",
            Unit::Count,
            "Reconnects scheduled, by reason"
        );
        describe_counter!(
            "gateway_payloads_dropped_total",
            Unit::Count,
            "Inbound payloads dropped because they could not be decoded"
        );
        describe_counter!(
            "gateway_errors_total",
            Unit::Count,
            "Total gateway errors"
        );

        describe_histogram!(
            "gateway_heartbeat_latency_seconds",
            Unit::Seconds,
            "Time between heartbeat and acknowledgement"
        );

        describe_gauge!(
            "gateway_shards_ready",
            Unit::Count,
            "Number of shards in ready state"
        );
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Record a dispatch received
pub fn record_dispatch(shard_id: u32, event_type: &str) {
    counter!(
        "gateway_dispatches_received_total",
        "shard_id" => shard_id.to_string(),
        "event_type" => event_type.to_owned()
    )
    .increment(1);
}

/// Record a heartbeat sent
pub fn record_heartbeat(shard_id: u32) {
    counter!(
        "gateway_heartbeats_sent_total",
        "shard_id" => shard_id.to_string()
    )
    .increment(1);
}

/// Record a heartbeat acknowledgement
pub fn record_heartbeat_ack(shard_id: u32, latency: Duration) {
    histogram!(
        "gateway_heartbeat_latency_seconds",
        "shard_id" => shard_id.to_string()
    )
    .record(latency.as_secs_f64());
}

/// Record an unacknowledged heartbeat
pub fn record_zombie(shard_id: u32) {
    counter!(
        "gateway_zombie_connections_total",
        "shard_id" => shard_id.to_string()
    )
    .increment(1);
}

/// Record a scheduled reconnect
pub fn record_reconnect(shard_id: u32, reason: &'static str) {
    counter!(
        "gateway_reconnects_total",
        "shard_id" => shard_id.to_string(),
        "reason" => reason
    )
    .increment(1);
}

/// Record a dropped payload
pub fn record_payload_dropped(shard_id: u32) {
    counter!(
        "gateway_payloads_dropped_total",
        "shard_id" => shard_id.to_string()
    )
    .increment(1);
}

/// Record gateway error
pub fn record_error(shard_id: u32, error_type: &'static str) {
    counter!(
        "gateway_errors_total",
        "shard_id" => shard_id.to_string(),
        "error_type" => error_type
    )
    .increment(1);
}

/// Set shards ready count
pub fn set_shards_ready(count: usize) {
    gauge!("gateway_shards_ready").set(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        record_dispatch(0, "READY");
        record_heartbeat(0);
        record_heartbeat_ack(0, Duration::from_millis(40));
        record_zombie(0);
        record_reconnect(0, "server_close");
        record_payload_dropped(0);
        record_error(0, "connect");
        set_shards_ready(1);
    }
}
