//! Frame Codec
//!
//! Classifies and decodes inbound frames. Decoding never fails loudly: any
//! frame that cannot be understood right now is `None` and the listener
//! skips it, because one malformed frame must not take down a live feed.
//!
//! # Frame shapes
//!
//! - Keepalive: any frame containing `pingpong` (case-insensitive)
//! - JSON control frame: text starting with `{`
//! - Plaintext envelope: `0|<stream-id>|<field>|...`
//! - Encrypted envelope: `1|<stream-id>|<symbol>|<base64 ciphertext>`
//!
//! Envelope fields are separated by `|`; the fill payload inside an envelope
//! field is separated by `^`.

use std::collections::HashMap;

use chrono::{NaiveTime, Utc};
use rust_decimal::Decimal;

use super::cipher::StreamEncryptionContext;
use crate::domain::execution::{ExecutionEvent, Side};
use crate::domain::stream::{Market, StreamSubscription};

/// Envelope field separator.
pub const ENVELOPE_SEPARATOR: char = '|';

/// Payload field separator inside an envelope field.
pub const PAYLOAD_SEPARATOR: char = '^';

/// Keepalive token.
pub const KEEPALIVE_TOKEN: &str = "pingpong";

/// Envelopes with fewer fields than this are malformed.
pub const MIN_ENVELOPE_FIELDS: usize = 3;

const FLAG_PLAINTEXT: &str = "0";
const FLAG_ENCRYPTED: &str = "1";

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Liveness frame; must be echoed back verbatim.
    Keepalive {
        /// The frame text exactly as received.
        raw: String,
    },
    /// JSON control/diagnostic frame.
    Control(serde_json::Value),
    /// Decoded fill.
    Execution(ExecutionEvent),
}

/// Decoder for one connection.
///
/// Holds the stream catalog (stream id → market) and the encryption
/// contexts recorded from this connection's subscription acks.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    markets: HashMap<String, Market>,
    contexts: HashMap<String, StreamEncryptionContext>,
}

impl FrameCodec {
    /// Create a codec that knows the markets of `subscriptions`.
    #[must_use]
    pub fn new(subscriptions: &[StreamSubscription]) -> Self {
        Self {
            markets: subscriptions
                .iter()
                .map(|s| (s.stream_id.clone(), s.market()))
                .collect(),
            contexts: HashMap::new(),
        }
    }

    /// Record the decryption context for a stream.
    pub fn register_context(&mut self, stream_id: impl Into<String>, context: StreamEncryptionContext) {
        self.contexts.insert(stream_id.into(), context);
    }

    /// Check whether a stream has a recorded context.
    #[must_use]
    pub fn has_context(&self, stream_id: &str) -> bool {
        self.contexts.contains_key(stream_id)
    }

    /// Number of streams with recorded contexts.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Forget every recorded context.
    pub fn clear_contexts(&mut self) {
        self.contexts.clear();
    }

    /// Classify and decode one raw frame.
    #[must_use]
    pub fn parse_message(&self, raw: impl AsRef<[u8]>) -> Option<Frame> {
        let text = std::str::from_utf8(raw.as_ref()).ok()?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        if trimmed.to_ascii_lowercase().contains(KEEPALIVE_TOKEN) {
            return Some(Frame::Keepalive {
                raw: text.to_string(),
            });
        }

        if trimmed.starts_with('{') {
            return serde_json::from_str(trimmed).ok().map(Frame::Control);
        }

        self.parse_envelope(trimmed).map(Frame::Execution)
    }

    fn parse_envelope(&self, text: &str) -> Option<ExecutionEvent> {
        let fields: Vec<&str> = text.split(ENVELOPE_SEPARATOR).collect();
        if fields.len() < MIN_ENVELOPE_FIELDS {
            tracing::debug!(fields = fields.len(), "Dropping malformed envelope");
            return None;
        }

        let stream_id = fields[1].trim();
        match fields[0].trim() {
            FLAG_PLAINTEXT => {
                let (fallback_symbol, payload) = match fields.get(3) {
                    Some(payload) => (Some(fields[2]), *payload),
                    None => (None, fields[2]),
                };
                self.build_event(stream_id, payload, fallback_symbol)
            }
            FLAG_ENCRYPTED => {
                let (symbol, ciphertext) = (fields.get(2)?, fields.get(3)?);
                let Some(context) = self.contexts.get(stream_id) else {
                    tracing::debug!(stream_id, "No encryption context for stream, dropping frame");
                    return None;
                };
                let payload = context
                    .decrypt_base64(ciphertext)
                    .map_err(|e| tracing::debug!(stream_id, error = %e, "Dropping undecryptable frame"))
                    .ok()?;
                self.build_event(stream_id, &payload, Some(*symbol))
            }
            other => {
                tracing::debug!(flag = other, "Dropping envelope with unknown flag");
                None
            }
        }
    }

    /// Map payload fields positionally: symbol, side code, order id, filled
    /// price, filled quantity, fill time.
    fn build_event(
        &self,
        stream_id: &str,
        payload: &str,
        fallback_symbol: Option<&str>,
    ) -> Option<ExecutionEvent> {
        let fields: Vec<&str> = payload.split(PAYLOAD_SEPARATOR).map(str::trim).collect();
        let field = |index: usize| fields.get(index).copied().filter(|v| !v.is_empty());

        let symbol = field(0)
            .or_else(|| fallback_symbol.map(str::trim).filter(|s| !s.is_empty()))?
            .to_string();

        Some(ExecutionEvent {
            stream_id: stream_id.to_string(),
            market: self.markets.get(stream_id).copied().unwrap_or(Market::Unknown),
            symbol,
            side: field(1).map_or(Side::Unknown, Side::from_code),
            order_id: field(2).map(ToString::to_string),
            filled_price: field(3).and_then(parse_decimal),
            filled_quantity: field(4).and_then(parse_decimal),
            fill_time: field(5).and_then(parse_fill_time),
            received_at: Utc::now(),
        })
    }
}

fn parse_decimal(value: &str) -> Option<Decimal> {
    value.replace(',', "").parse().ok()
}

fn parse_fill_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H%M%S").ok()
}
