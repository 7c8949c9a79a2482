//! Execution Event Types
//!
//! The normalized output of the frame codec. One event is produced per
//! decoded fill frame and handed straight to the execution handler; nothing
//! here is retained by the client.

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::stream::Market;

/// Order side of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy fill.
    Buy,
    /// Sell fill.
    Sell,
    /// Side code was not one of the two known values.
    Unknown,
}

impl Side {
    /// Map the feed's two-value side discriminator (`01` sell, `02` buy).
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "02" => Self::Buy,
            "01" => Self::Sell,
            _ => Self::Unknown,
        }
    }

    /// Get the side label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Unknown => "unknown",
        }
    }
}

/// A decoded fill from the execution-report feed.
///
/// Numeric fields are best-effort: a value the upstream sent in an
/// unexpected format is left as `None` rather than failing the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionEvent {
    /// Stream identifier the frame arrived on.
    pub stream_id: String,
    /// Market tag of the originating stream.
    pub market: Market,
    /// Instrument symbol.
    pub symbol: String,
    /// Fill side.
    pub side: Side,
    /// Broker order identifier.
    pub order_id: Option<String>,
    /// Filled price.
    #[serde(with = "rust_decimal::serde::str_option")]
    pub filled_price: Option<Decimal>,
    /// Filled quantity.
    #[serde(with = "rust_decimal::serde::str_option")]
    pub filled_quantity: Option<Decimal>,
    /// Exchange-local fill time.
    pub fill_time: Option<NaiveTime>,
    /// When this client decoded the frame.
    pub received_at: DateTime<Utc>,
}

impl ExecutionEvent {
    /// Notional value of the fill, when both price and quantity are known.
    #[must_use]
    pub fn notional(&self) -> Option<Decimal> {
        Some(self.filled_price? * self.filled_quantity?)
    }
}
