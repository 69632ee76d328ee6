use std::time::Duration;

use once_cell::sync::OnceCell;
use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::{KeyValue, global};
use tracing::info;

use crate::lanes::{Lane, Slot};

struct PipelineMetrics {
    worker_calls: Counter<u64>,
    worker_duration_ms: Histogram<f64>,
    degraded_lanes: Counter<u64>,
    verifications: Counter<u64>,
}

static METRICS: OnceCell<PipelineMetrics> = OnceCell::new();

fn handles() -> &'static PipelineMetrics {
    METRICS.get_or_init(|| {
        let meter: Meter = global::meter("claimcheck.pipeline");
        PipelineMetrics {
            worker_calls: meter
                .u64_counter("claimcheck_worker_calls_total")
                .with_description("Data-source worker invocations by lane, slot and status")
                .init(),
            worker_duration_ms: meter
                .f64_histogram("claimcheck_worker_duration_ms")
                .with_description("Worker latency in milliseconds")
                .init(),
            degraded_lanes: meter
                .u64_counter("claimcheck_degraded_lanes_total")
                .with_description("Lanes whose every worker failed")
                .init(),
            verifications: meter
                .u64_counter("claimcheck_verifications_total")
                .with_description("Completed verifications by overall assessment")
                .init(),
        }
    })
}

/// Log a hint when an OTLP endpoint is configured; exporters are wired by the deployment.
pub fn init_metrics_from_env(service_name: &str) {
    if let Ok(endpoint) = std::env::var("CLAIMCHECK_OTEL_METRICS_ENDPOINT") {
        info!(
            target = "telemetry",
            %endpoint,
            "metrics endpoint configured for {service_name}; install an OTLP meter provider to export pipeline metrics"
        );
    }
}

/// Record one worker call (no-op without an installed meter provider).
pub fn record_worker_call(slot: Slot, status: &'static str, elapsed: Duration) {
    let metrics = handles();
    let attrs = [
        KeyValue::new("lane", slot.lane().as_str()),
        KeyValue::new("slot", slot.name()),
        KeyValue::new("status", status),
    ];
    metrics.worker_calls.add(1, &attrs);
    metrics
        .worker_duration_ms
        .record(elapsed.as_secs_f64() * 1_000.0, &attrs);
}

pub fn record_degraded_lane(lane: Lane) {
    handles()
        .degraded_lanes
        .add(1, &[KeyValue::new("lane", lane.as_str())]);
}

pub fn record_verification(assessment: &'static str, lanes: usize) {
    handles().verifications.add(
        1,
        &[
            KeyValue::new("assessment", assessment),
            KeyValue::new("lanes", lanes as i64),
        ],
    );
}
