//! Configuration Module
//!
//! Environment-driven configuration for the execution stream client.

mod settings;

pub use crate::domain::stream::Environment;
pub use settings::{
    AppCredentials, CacheSettings, ConfigError, ConnectionSettings, DEFAULT_APPROVAL_KEY_CACHE_KEY,
    DEFAULT_REISSUE_MESSAGE_CODES, LIVE_REST_URL, LIVE_WS_URL, PAPER_REST_URL, PAPER_WS_URL,
    StreamConfig,
};
