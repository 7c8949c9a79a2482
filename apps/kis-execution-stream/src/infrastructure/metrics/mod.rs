//! Prometheus Metrics
//!
//! Counters and gauges for the execution stream client. Recording is a no-op
//! until a recorder is installed, so library code and tests can call these
//! functions freely.
//!
//! # Metrics
//!
//! - `kis_stream_frames_received_total`: inbound frames by classification
//! - `kis_stream_executions_forwarded_total`: fills handed to the handler
//! - `kis_stream_handler_errors_total`: handler failures (feed kept alive)
//! - `kis_stream_connect_attempts_total` / `kis_stream_connect_failures_total`
//! - `kis_stream_approval_keys_issued_total`: issuance by reason
//! - `kis_stream_connection_state`: current [`ConnectionState`] as a number

use std::net::SocketAddr;
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::connection::ConnectionState;
use crate::domain::execution::Side;
use crate::domain::stream::Market;

static INSTALLED: OnceLock<()> = OnceLock::new();

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
///
/// Must be called from within a Tokio runtime. Calling it again is a no-op.
///
/// # Errors
///
/// Returns `BuildError` if the listener cannot bind or a recorder is
/// already installed.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();
    let _ = INSTALLED.set(());
    Ok(())
}

fn register_metrics() {
    describe_counter!(
        "kis_stream_frames_received_total",
        "Frames read from the execution feed, by classification"
    );
    describe_counter!(
        "kis_stream_executions_forwarded_total",
        "Execution events handed to the downstream handler"
    );
    describe_counter!(
        "kis_stream_handler_errors_total",
        "Execution handler failures"
    );
    describe_counter!(
        "kis_stream_connect_attempts_total",
        "Connect-and-subscribe attempts"
    );
    describe_counter!(
        "kis_stream_connect_failures_total",
        "Failed connect-and-subscribe attempts, by reason"
    );
    describe_counter!(
        "kis_stream_approval_keys_issued_total",
        "Approval keys issued by the remote endpoint, by reason"
    );
    describe_gauge!(
        "kis_stream_connection_state",
        "0=disconnected 1=connecting 2=subscribing 3=connected 4=shutting_down"
    );
}

/// How an inbound frame was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Keepalive token (echoed back).
    Keepalive,
    /// JSON control frame.
    Control,
    /// Decoded execution event.
    Execution,
    /// Unparseable or undecryptable; skipped.
    Dropped,
}

impl FrameKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Keepalive => "keepalive",
            Self::Control => "control",
            Self::Execution => "execution",
            Self::Dropped => "dropped",
        }
    }
}

/// Why an approval key was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueReason {
    /// Nothing usable was cached.
    CacheMiss,
    /// The server rejected the current key.
    Reissue,
}

impl IssueReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::CacheMiss => "cache_miss",
            Self::Reissue => "reissue",
        }
    }
}

/// Record an inbound frame.
pub fn record_frame(kind: FrameKind) {
    counter!(
        "kis_stream_frames_received_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record an execution event forwarded to the handler.
pub fn record_execution_forwarded(market: Market, side: Side) {
    counter!(
        "kis_stream_executions_forwarded_total",
        "market" => market.as_str(),
        "side" => side.as_str()
    )
    .increment(1);
}

/// Record an execution handler failure.
pub fn record_handler_error() {
    counter!("kis_stream_handler_errors_total").increment(1);
}

/// Record a connect-and-subscribe attempt.
pub fn record_connect_attempt() {
    counter!("kis_stream_connect_attempts_total").increment(1);
}

/// Record a failed connect-and-subscribe attempt.
pub fn record_connect_failure(reason: &'static str) {
    counter!(
        "kis_stream_connect_failures_total",
        "reason" => reason
    )
    .increment(1);
}

/// Record an approval key issuance.
pub fn record_approval_key_issued(reason: IssueReason) {
    counter!(
        "kis_stream_approval_keys_issued_total",
        "reason" => reason.as_str()
    )
    .increment(1);
}

/// Publish the current connection state.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("kis_stream_connection_state").set(state.as_gauge());
}
