#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! KIS Execution Stream - Real-time Fill Notifications
//!
//! Keeps an authenticated, encrypted subscription to the Korea Investment &
//! Securities execution-report feed and hands each decoded fill to a
//! downstream [`ExecutionHandler`].
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: stream catalog, execution events, connection state, approval key
//! - **Application**: ports (cache, issuer, transport, handler) and the
//!   approval key manager
//! - **Infrastructure**: Redis cache, HTTP issuer, WebSocket transport,
//!   frame codec, stream client, config, metrics, telemetry
//!
//! # Data Flow
//!
//! ```text
//!  Redis ◄──► ApprovalKeyManager ◄──► POST /oauth2/Approval
//!                    │
//!                    ▼
//!  KIS WS ──► ExecutionStreamClient ──► FrameCodec ──► ExecutionHandler
//!     ▲               │
//!     └── pingpong ───┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Port definitions and services.
pub mod application;

/// Infrastructure layer - Adapters and the stream client.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::connection::ConnectionState;
pub use domain::credential::ApprovalKey;
pub use domain::execution::{ExecutionEvent, Side};
pub use domain::stream::{Environment, Market, StreamKind, StreamSubscription};

// Ports and services
pub use application::ports::{
    ApprovalKeyIssuer, ApprovalKeyStore, CacheError, CredentialIssuanceError, ExecutionHandler,
    FrameTransport, HandlerError, TransportConnector, TransportError, WireFrame,
};
pub use application::services::ApprovalKeyManager;

// Stream client
pub use infrastructure::kis::{
    ClientConfig, ExecutionStreamClient, Frame, FrameCodec, HttpApprovalKeyIssuer,
    StreamClientError, StreamEncryptionContext, SubscriptionAckError, WebSocketConnector,
};

// Adapters and config
pub use infrastructure::cache::RedisApprovalKeyStore;
pub use infrastructure::config::{ConfigError, StreamConfig};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
