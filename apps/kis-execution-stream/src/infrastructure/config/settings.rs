//! Client Configuration Settings
//!
//! Configuration types for the execution stream client, loaded from
//! environment variables.

use std::time::Duration;

use crate::domain::stream::{Environment, StreamSubscription};

/// Live stream endpoint.
pub const LIVE_WS_URL: &str = "ws://ops.koreainvestment.com:21000";

/// Paper-trading stream endpoint (same host, different port).
pub const PAPER_WS_URL: &str = "ws://ops.koreainvestment.com:31000";

/// Live REST base URL (approval key issuance).
pub const LIVE_REST_URL: &str = "https://openapi.koreainvestment.com:9443";

/// Paper-trading REST base URL (approval key issuance).
pub const PAPER_REST_URL: &str = "https://openapivts.koreainvestment.com:29443";

/// Cache key under which the approval key is stored.
pub const DEFAULT_APPROVAL_KEY_CACHE_KEY: &str = "kis:websocket:approval_key";

/// Ack message codes that mean "approval key invalid" or "approval key
/// already in use elsewhere". Only these trigger a forced reissue.
pub const DEFAULT_REISSUE_MESSAGE_CODES: &[&str] = &["OPSP0011", "OPSP8996"];

/// Application identity used to issue approval keys.
#[derive(Clone)]
pub struct AppCredentials {
    app_key: String,
    app_secret: String,
}

impl AppCredentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(app_key: String, app_secret: String) -> Self {
        Self {
            app_key,
            app_secret,
        }
    }

    /// Get the application key.
    #[must_use]
    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    /// Get the application secret.
    #[must_use]
    pub fn app_secret(&self) -> &str {
        &self.app_secret
    }
}

impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_key", &"[REDACTED]")
            .field("app_secret", &"[REDACTED]")
            .finish()
    }
}

/// Transport and retry settings.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Transport keepalive ping interval.
    pub ping_interval: Duration,
    /// How long an unanswered ping may stay outstanding.
    pub ping_timeout: Duration,
    /// Upper bound on a graceful transport close.
    pub close_timeout: Duration,
    /// Upper bound on opening the transport.
    pub connect_timeout: Duration,
    /// Upper bound on waiting for one subscription ack.
    pub ack_timeout: Duration,
    /// Fixed delay between connect attempts.
    pub reconnect_delay: Duration,
    /// Connect attempts before giving up. Always at least 1.
    pub max_reconnect_attempts: u32,
    /// Randomization applied to `reconnect_delay`, as a fraction in `[0, 1]`.
    pub reconnect_jitter: f64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
            ack_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            reconnect_jitter: 0.0,
        }
    }
}

/// Credential cache settings.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Redis connection URL.
    pub redis_url: String,
    /// Key the approval key is cached under.
    pub approval_key_cache_key: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            approval_key_cache_key: DEFAULT_APPROVAL_KEY_CACHE_KEY.to_string(),
        }
    }
}

/// Complete client configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Trading environment.
    pub environment: Environment,
    /// Application identity for approval key issuance.
    pub credentials: AppCredentials,
    /// Subscriber key sent with every subscription (HTS id).
    pub subscriber_key: String,
    /// Stream endpoint override.
    pub ws_url: Option<String>,
    /// REST endpoint override.
    pub rest_url: Option<String>,
    /// Transport and retry settings.
    pub connection: ConnectionSettings,
    /// Credential cache settings.
    pub cache: CacheSettings,
    /// Ack message codes that trigger a forced approval key reissue.
    pub reissue_message_codes: Vec<String>,
    /// Prometheus listener port (0 = disabled).
    pub metrics_port: u16,
}

impl StreamConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing,
    /// empty, or out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`StreamConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
            let value = value.trim().to_string();
            if value.is_empty() {
                return Err(ConfigError::EmptyValue(key.to_string()));
            }
            Ok(value)
        };
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let app_key = required("KIS_APP_KEY")?;
        let app_secret = required("KIS_APP_SECRET")?;
        let subscriber_key = required("KIS_HTS_ID")?;

        let environment = optional("KIS_ENV")
            .map(|s| Environment::from_str_case_insensitive(&s))
            .unwrap_or_default();

        let defaults = ConnectionSettings::default();
        let connection = ConnectionSettings {
            ping_interval: parse_secs(optional("KIS_PING_INTERVAL_SECS"), defaults.ping_interval),
            ping_timeout: parse_secs(optional("KIS_PING_TIMEOUT_SECS"), defaults.ping_timeout),
            close_timeout: parse_secs(optional("KIS_CLOSE_TIMEOUT_SECS"), defaults.close_timeout),
            connect_timeout: parse_secs(
                optional("KIS_CONNECT_TIMEOUT_SECS"),
                defaults.connect_timeout,
            ),
            ack_timeout: parse_secs(optional("KIS_ACK_TIMEOUT_SECS"), defaults.ack_timeout),
            reconnect_delay: optional("KIS_RECONNECT_DELAY_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .map_or(defaults.reconnect_delay, Duration::from_millis),
            max_reconnect_attempts: optional("KIS_MAX_RECONNECT_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_reconnect_attempts),
            reconnect_jitter: optional("KIS_RECONNECT_JITTER")
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(defaults.reconnect_jitter),
        };

        if connection.max_reconnect_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "KIS_MAX_RECONNECT_ATTEMPTS".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&connection.reconnect_jitter) {
            return Err(ConfigError::InvalidValue {
                key: "KIS_RECONNECT_JITTER".to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }

        let cache_defaults = CacheSettings::default();
        let cache = CacheSettings {
            redis_url: optional("REDIS_URL").unwrap_or(cache_defaults.redis_url),
            approval_key_cache_key: optional("KIS_APPROVAL_KEY_CACHE_KEY")
                .unwrap_or(cache_defaults.approval_key_cache_key),
        };

        let reissue_message_codes = optional("KIS_REISSUE_MESSAGE_CODES").map_or_else(
            || {
                DEFAULT_REISSUE_MESSAGE_CODES
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            },
            |list| parse_code_list(&list),
        );

        Ok(Self {
            environment,
            credentials: AppCredentials::new(app_key, app_secret),
            subscriber_key,
            ws_url: optional("KIS_WS_URL"),
            rest_url: optional("KIS_REST_URL"),
            connection,
            cache,
            reissue_message_codes,
            metrics_port: optional("KIS_METRICS_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        })
    }

    /// Get the stream endpoint for the configured environment.
    #[must_use]
    pub fn websocket_url(&self) -> String {
        self.ws_url.clone().unwrap_or_else(|| {
            if self.environment.is_live() {
                LIVE_WS_URL.to_string()
            } else {
                PAPER_WS_URL.to_string()
            }
        })
    }

    /// Get the REST base URL for the configured environment.
    #[must_use]
    pub fn rest_base_url(&self) -> String {
        self.rest_url.clone().unwrap_or_else(|| {
            if self.environment.is_live() {
                LIVE_REST_URL.to_string()
            } else {
                PAPER_REST_URL.to_string()
            }
        })
    }

    /// The report streams to subscribe to, domestic first.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<StreamSubscription> {
        StreamSubscription::all_for(self.environment, &self.subscriber_key)
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable is set but unusable.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Why it was rejected.
        reason: String,
    },
}

fn parse_secs(value: Option<String>, default: Duration) -> Duration {
    value
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_code_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_uppercase)
        .collect()
}
