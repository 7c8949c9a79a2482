//! Transport Keepalive
//!
//! The listener sends a transport-level ping every `ping_interval`. Any
//! inbound traffic proves the peer is alive; if nothing arrives within
//! `pong_timeout` of an outstanding ping the connection is treated as dead.
//!
//! This is separate from the feed's own `pingpong` text frames, which are
//! echoed by the listener and also count as inbound traffic here.

use std::time::{Duration, Instant};

use crate::infrastructure::config::ConnectionSettings;

/// Configuration for keepalive behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepaliveConfig {
    /// Interval between transport pings.
    pub ping_interval: Duration,
    /// How long an outstanding ping may go unanswered.
    pub pong_timeout: Duration,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(30),
        }
    }
}

impl KeepaliveConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
        }
    }

    /// Create configuration from `ConnectionSettings`.
    #[must_use]
    pub const fn from_connection_settings(settings: &ConnectionSettings) -> Self {
        Self::new(settings.ping_interval, settings.ping_timeout)
    }
}

/// What the listener should do on a keepalive tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    /// Send a transport ping.
    SendPing,
    /// The outstanding ping went unanswered for this long.
    TimedOut(Duration),
}

/// Liveness bookkeeping for one connection. Owned by the listener.
#[derive(Debug, Clone)]
pub struct KeepaliveState {
    last_activity: Instant,
    ping_sent_at: Option<Instant>,
}

impl Default for KeepaliveState {
    fn default() -> Self {
        Self::new()
    }
}

impl KeepaliveState {
    /// Create state for a fresh connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_activity: Instant::now(),
            ping_sent_at: None,
        }
    }

    /// Record inbound traffic of any kind.
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
        self.ping_sent_at = None;
    }

    /// Record that a ping went out.
    pub fn mark_ping_sent(&mut self) {
        self.ping_sent_at.get_or_insert_with(Instant::now);
    }

    /// Check if a ping is outstanding.
    #[must_use]
    pub const fn is_waiting_for_pong(&self) -> bool {
        self.ping_sent_at.is_some()
    }

    /// Time since the last inbound traffic.
    #[must_use]
    pub fn time_since_activity(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Decide what a keepalive tick should do.
    #[must_use]
    pub fn on_tick(&self, config: &KeepaliveConfig) -> KeepaliveAction {
        match self.ping_sent_at {
            Some(sent) if sent.elapsed() >= config.pong_timeout => {
                KeepaliveAction::TimedOut(sent.elapsed())
            }
            _ => KeepaliveAction::SendPing,
        }
    }
}
