//! Report Stream Types
//!
//! A report stream ("TR") is one independently subscribed channel on the
//! execution feed. Every stream has a live and a paper-trading identifier;
//! the identifier is resolved once from the [`Environment`] when the
//! subscription list is built.

use serde::{Deserialize, Serialize};

// =============================================================================
// Environment
// =============================================================================

/// Trading environment (paper vs live).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Environment {
    /// Paper trading environment (simulated).
    #[default]
    Paper,
    /// Live trading environment (real money).
    Live,
}

impl Environment {
    /// Parse environment from string. Anything other than `live` is paper.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "LIVE" | "REAL" | "PROD" => Self::Live,
            _ => Self::Paper,
        }
    }

    /// Check if this is the live environment.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }

    /// Get the environment name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paper => "paper",
            Self::Live => "live",
        }
    }
}

// =============================================================================
// Market
// =============================================================================

/// Market tag attached to every execution event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    /// Domestic (KRX) equities.
    Domestic,
    /// Overseas equities.
    Overseas,
    /// Frame arrived on a stream id this client does not track.
    Unknown,
}

impl Market {
    /// Get the market label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Domestic => "domestic",
            Self::Overseas => "overseas",
            Self::Unknown => "unknown",
        }
    }
}

// =============================================================================
// Stream Kind
// =============================================================================

/// The execution-report streams this client knows how to subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// Domestic equity fill notifications.
    DomesticFills,
    /// Overseas equity fill notifications.
    OverseasFills,
}

impl StreamKind {
    /// Every tracked stream, in subscription order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::DomesticFills, Self::OverseasFills]
    }

    /// Resolve the stream identifier for an environment.
    #[must_use]
    pub const fn stream_id(&self, environment: Environment) -> &'static str {
        match (self, environment) {
            (Self::DomesticFills, Environment::Live) => "H0STCNI0",
            (Self::DomesticFills, Environment::Paper) => "H0STCNI9",
            (Self::OverseasFills, Environment::Live) => "H0GSCNI0",
            (Self::OverseasFills, Environment::Paper) => "H0GSCNI9",
        }
    }

    /// Market tag for events on this stream.
    #[must_use]
    pub const fn market(&self) -> Market {
        match self {
            Self::DomesticFills => Market::Domestic,
            Self::OverseasFills => Market::Overseas,
        }
    }
}

// =============================================================================
// Stream Subscription
// =============================================================================

/// One logical report stream to subscribe to on every connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSubscription {
    /// Which report stream this is.
    pub kind: StreamKind,
    /// Environment-specific stream identifier (`tr_id`).
    pub stream_id: String,
    /// Subscriber key (`tr_key`), the operator's HTS id.
    pub subscriber_key: String,
}

impl StreamSubscription {
    /// Build a subscription with the stream id resolved for `environment`.
    #[must_use]
    pub fn new(kind: StreamKind, environment: Environment, subscriber_key: impl Into<String>) -> Self {
        Self {
            kind,
            stream_id: kind.stream_id(environment).to_string(),
            subscriber_key: subscriber_key.into(),
        }
    }

    /// Build the full subscription list for an environment.
    #[must_use]
    pub fn all_for(environment: Environment, subscriber_key: &str) -> Vec<Self> {
        StreamKind::all()
            .iter()
            .map(|kind| Self::new(*kind, environment, subscriber_key))
            .collect()
    }

    /// Market tag for events on this subscription.
    #[must_use]
    pub const fn market(&self) -> Market {
        self.kind.market()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("live", Environment::Live)]
    #[test_case("LIVE", Environment::Live)]
    #[test_case(" real ", Environment::Live)]
    #[test_case("paper", Environment::Paper)]
    #[test_case("vps", Environment::Paper)]
    #[test_case("", Environment::Paper)]
    fn environment_parsing(input: &str, expected: Environment) {
        assert_eq!(Environment::from_str_case_insensitive(input), expected);
    }

    #[test]
    fn stream_ids_differ_between_environments() {
        for kind in StreamKind::all() {
            assert_ne!(
                kind.stream_id(Environment::Live),
                kind.stream_id(Environment::Paper)
            );
        }
    }

    #[test]
    fn subscriptions_are_domestic_first() {
        let subs = StreamSubscription::all_for(Environment::Paper, "hts-user");
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].kind, StreamKind::DomesticFills);
        assert_eq!(subs[0].stream_id, "H0STCNI9");
        assert_eq!(subs[1].kind, StreamKind::OverseasFills);
        assert_eq!(subs[1].stream_id, "H0GSCNI9");
        assert!(subs.iter().all(|s| s.subscriber_key == "hts-user"));
    }

    #[test]
    fn live_subscription_ids() {
        let subs = StreamSubscription::all_for(Environment::Live, "hts-user");
        assert_eq!(subs[0].stream_id, "H0STCNI0");
        assert_eq!(subs[1].stream_id, "H0GSCNI0");
        assert_eq!(subs[1].market(), Market::Overseas);
    }
}
