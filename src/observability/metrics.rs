//! Metrics collection for `strongman`.
//!
//! Counters and gauges are recorded through the `metrics` facade. Nothing
//! is exported unless [`init_metrics`] installs a Prometheus recorder;
//! without one every call below is a cheap no-op.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::StrongmanError;
use crate::game::phase::{Phase, Player};

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Every phase label the gauge can carry, used to zero stale labels.
const PHASE_LABELS: [&str; 5] = ["idle", "countdown", "active", "winner_p1", "winner_p2"];

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `StrongmanError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), StrongmanError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| StrongmanError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "strongman_packets_total",
        "Control packets processed, by kind"
    );
    describe_counter!(
        "strongman_bus_read_errors_total",
        "Failed sensor bus reads (retried)"
    );
    describe_counter!(
        "strongman_bus_dropped_frames_total",
        "Partial bus frames abandoned on an early header byte"
    );
    describe_counter!(
        "strongman_start_requests_total",
        "Start presses, by whether they were accepted"
    );
    describe_counter!(
        "strongman_phase_transitions_total",
        "Match phase transitions"
    );
    describe_gauge!("strongman_current_phase", "Current match phase (1 = active)");
    describe_counter!("strongman_matches_total", "Completed matches, by winner");
    describe_histogram!("strongman_weighted_score", "Settled weighted scores");
    describe_counter!("strongman_overlay_swaps_total", "Overlay layer swaps");
    describe_counter!(
        "strongman_loop_boundaries_total",
        "Playback loop boundaries signalled by the media player"
    );
}

/// Records a processed control packet.
pub fn record_packet(kind: &'static str) {
    counter!("strongman_packets_total", "kind" => kind).increment(1);
}

/// Records a failed bus read.
pub fn record_bus_read_error() {
    counter!("strongman_bus_read_errors_total").increment(1);
}

/// Records partial frames abandoned by the framer.
pub fn record_dropped_frames(count: u64) {
    counter!("strongman_bus_dropped_frames_total").increment(count);
}

/// Records a start press and whether it was accepted.
pub fn record_start_request(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "ignored" };
    counter!("strongman_start_requests_total", "outcome" => outcome).increment(1);
}

/// Records a phase transition and updates the current-phase gauge.
pub fn record_phase_transition(from: Phase, to: Phase) {
    counter!(
        "strongman_phase_transitions_total",
        "from" => from.as_str(),
        "to" => to.as_str(),
    )
    .increment(1);
    for label in PHASE_LABELS {
        let value = if label == to.as_str() { 1.0 } else { 0.0 };
        gauge!("strongman_current_phase", "phase" => label).set(value);
    }
}

/// Records a decided match.
pub fn record_match(winner: Player, scores: [u8; 2]) {
    counter!("strongman_matches_total", "winner" => winner.as_str()).increment(1);
    for (player, score) in Player::ALL.iter().zip(scores) {
        histogram!("strongman_weighted_score", "player" => player.as_str())
            .record(f64::from(score));
    }
}

/// Records one overlay layer swap.
pub fn record_overlay_swap() {
    counter!("strongman_overlay_swaps_total").increment(1);
}

/// Records a playback loop boundary.
pub fn record_loop_boundary() {
    counter!("strongman_loop_boundaries_total").increment(1);
}
