//! Connection Lifecycle State
//!
//! ```text
//! Disconnected ──► Connecting ──► Subscribing ──► Connected
//!      ▲               │               │              │
//!      └───────────────┴───────────────┴──────────────┘  (any failure)
//!
//! any state ──stop()──► ShuttingDown   (terminal)
//! ```

use std::fmt;

/// State of the execution stream client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport. Initial state, and re-entered after any failure.
    #[default]
    Disconnected,
    /// Fetching the approval key and opening the transport.
    Connecting,
    /// Transport open, per-stream subscription acks in flight.
    Subscribing,
    /// All streams acknowledged, listener active.
    Connected,
    /// `stop()` was called. Terminal.
    ShuttingDown,
}

impl ConnectionState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Connected => "connected",
            Self::ShuttingDown => "shutting_down",
        }
    }

    /// Numeric value exported on the connection state gauge.
    #[must_use]
    pub const fn as_gauge(&self) -> f64 {
        match self {
            Self::Disconnected => 0.0,
            Self::Connecting => 1.0,
            Self::Subscribing => 2.0,
            Self::Connected => 3.0,
            Self::ShuttingDown => 4.0,
        }
    }

    /// Check if no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::ShuttingDown)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }

    #[test]
    fn only_shutting_down_is_terminal() {
        assert!(ConnectionState::ShuttingDown.is_terminal());
        assert!(!ConnectionState::Disconnected.is_terminal());
        assert!(!ConnectionState::Connected.is_terminal());
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(ConnectionState::Subscribing.to_string(), "subscribing");
    }
}
