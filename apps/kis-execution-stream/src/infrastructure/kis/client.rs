//! Execution Stream Client
//!
//! Owns the connection lifecycle for the execution-report feed:
//!
//! 1. Obtain an approval key (cache first, issuance on miss)
//! 2. Open the transport and subscribe to each report stream in order,
//!    reading exactly one ack per request
//! 3. Record the per-stream AES key/IV from each ack
//! 4. Listen: echo keepalives, decode fills, hand them to the handler
//!
//! Failures during 1-3 are retried by [`ExecutionStreamClient::connect_and_subscribe`]
//! up to the configured attempt budget. A listener failure is reported to
//! the caller; [`ExecutionStreamClient::run`] loops back into
//! `connect_and_subscribe` on its own.
//!
//! Encryption contexts live in the session and are discarded with it, so a
//! reconnect always starts from fresh acks.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use super::cipher::StreamEncryptionContext;
use super::codec::{Frame, FrameCodec};
use super::error::{StreamClientError, SubscriptionAckError};
use super::keepalive::{KeepaliveAction, KeepaliveConfig, KeepaliveState};
use super::messages::{SubscriptionAck, SubscriptionRequest};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{
    ExecutionHandler, FrameTransport, TransportConnector, TransportError, WireFrame,
};
use crate::application::services::ApprovalKeyManager;
use crate::domain::connection::ConnectionState;
use crate::domain::credential::ApprovalKey;
use crate::domain::stream::StreamSubscription;
use crate::infrastructure::config::{
    ConnectionSettings, DEFAULT_REISSUE_MESSAGE_CODES, StreamConfig,
};
use crate::infrastructure::metrics::{self, FrameKind};

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the execution stream client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Stream endpoint.
    pub url: String,
    /// Streams to subscribe to, in order.
    pub subscriptions: Vec<StreamSubscription>,
    /// Attempt budget and delay.
    pub reconnect: ReconnectConfig,
    /// Transport keepalive.
    pub keepalive: KeepaliveConfig,
    /// Upper bound on opening the transport.
    pub connect_timeout: Duration,
    /// Upper bound on waiting for one ack.
    pub ack_timeout: Duration,
    /// Upper bound on a graceful close.
    pub close_timeout: Duration,
    /// Ack message codes that force an approval key reissue.
    pub reissue_message_codes: Vec<String>,
}

impl ClientConfig {
    /// Create a configuration with default timings.
    #[must_use]
    pub fn new(url: impl Into<String>, subscriptions: Vec<StreamSubscription>) -> Self {
        Self::with_settings(url, subscriptions, &ConnectionSettings::default())
    }

    /// Create a configuration from `StreamConfig`.
    #[must_use]
    pub fn from_stream_config(config: &StreamConfig) -> Self {
        Self {
            reissue_message_codes: config.reissue_message_codes.clone(),
            ..Self::with_settings(
                config.websocket_url(),
                config.subscriptions(),
                &config.connection,
            )
        }
    }

    fn with_settings(
        url: impl Into<String>,
        subscriptions: Vec<StreamSubscription>,
        settings: &ConnectionSettings,
    ) -> Self {
        Self {
            url: url.into(),
            subscriptions,
            reconnect: ReconnectConfig::from_connection_settings(settings),
            keepalive: KeepaliveConfig::from_connection_settings(settings),
            connect_timeout: settings.connect_timeout,
            ack_timeout: settings.ack_timeout,
            close_timeout: settings.close_timeout,
            reissue_message_codes: DEFAULT_REISSUE_MESSAGE_CODES
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// One open, fully subscribed connection.
struct Session {
    transport: Box<dyn FrameTransport>,
    codec: FrameCodec,
}

// =============================================================================
// Client
// =============================================================================

/// Execution-report stream client.
///
/// Shared behind an `Arc` so `stop()` can be called from a signal task while
/// another task runs the feed.
pub struct ExecutionStreamClient {
    config: ClientConfig,
    approval: ApprovalKeyManager,
    connector: Arc<dyn TransportConnector>,
    handler: Arc<dyn ExecutionHandler>,
    state: RwLock<ConnectionState>,
    session: Mutex<Option<Session>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ExecutionStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionStreamClient")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .field("stopped", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ExecutionStreamClient {
    /// Create a client. Nothing is opened until `connect_and_subscribe`.
    #[must_use]
    pub fn new(
        config: ClientConfig,
        approval: ApprovalKeyManager,
        connector: Arc<dyn TransportConnector>,
        handler: Arc<dyn ExecutionHandler>,
    ) -> Self {
        Self {
            config,
            approval,
            connector,
            handler,
            state: RwLock::new(ConnectionState::Disconnected),
            session: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Check whether `stop()` has been called.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Check whether a subscribed session is waiting for `listen()`.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.lock().is_some()
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.write();
        if state.is_terminal() || *state == next {
            return;
        }
        tracing::debug!(from = state.as_str(), to = next.as_str(), "Connection state change");
        *state = next;
        metrics::set_connection_state(next);
    }

    // -------------------------------------------------------------------------
    // Supervisor
    // -------------------------------------------------------------------------

    /// Connect and subscribe to every configured stream, retrying failures.
    ///
    /// At most `max_attempts` connection attempts are made. An ack rejected
    /// with one of the configured message codes triggers exactly one forced
    /// approval key reissue before the next attempt.
    ///
    /// # Errors
    ///
    /// - `ConnectionNotEstablished` once the attempt budget is spent
    /// - `Stopped` if `stop()` is called first
    pub async fn connect_and_subscribe(&self) -> Result<(), StreamClientError> {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());
        let mut reissued: Option<ApprovalKey> = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(StreamClientError::Stopped);
            }

            self.set_state(ConnectionState::Connecting);
            metrics::record_connect_attempt();
            tracing::info!(
                url = %self.config.url,
                attempt = policy.attempt_count() + 1,
                max_attempts = policy.max_attempts(),
                "Connecting to execution stream"
            );

            let outcome = tokio::select! {
                () = self.cancel.cancelled() => return Err(StreamClientError::Stopped),
                outcome = self.attempt(reissued.take()) => outcome,
            };

            let error = match outcome {
                Ok(session) => return self.park_session(session).await,
                Err(e) => e,
            };

            self.set_state(ConnectionState::Disconnected);
            metrics::record_connect_failure(error.reason());
            tracing::warn!(
                error = %error,
                attempt = policy.attempt_count() + 1,
                "Execution stream connection attempt failed"
            );

            if let StreamClientError::SubscriptionAck(ack) = &error
                && ack.has_message_code(&self.config.reissue_message_codes)
            {
                reissued = self.force_reissue(ack).await;
            }

            let Some(delay) = policy.on_failure() else {
                return Err(StreamClientError::ConnectionNotEstablished {
                    attempts: policy.attempt_count(),
                });
            };

            tracing::info!(delay_ms = delay.as_millis(), "Retrying execution stream connection");
            tokio::select! {
                () = self.cancel.cancelled() => return Err(StreamClientError::Stopped),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Run the feed until `stop()` is called.
    ///
    /// Connects, listens, and reconnects whenever the listener fails.
    ///
    /// # Errors
    ///
    /// Returns the terminal error from `connect_and_subscribe`.
    pub async fn run(self: Arc<Self>) -> Result<(), StreamClientError> {
        loop {
            match self.connect_and_subscribe().await {
                Ok(()) => {}
                Err(StreamClientError::Stopped) => return Ok(()),
                Err(e) => return Err(e),
            }

            match self.listen().await {
                Ok(()) => {
                    tracing::info!("Execution stream listener stopped");
                    return Ok(());
                }
                Err(_) if self.cancel.is_cancelled() => return Ok(()),
                Err(e) => {
                    tracing::warn!(error = %e, "Execution stream listener failed, reconnecting");
                }
            }
        }
    }

    /// Stop the client. Safe to call more than once.
    ///
    /// Cancels any attempt or listener in flight, closes a session that has
    /// not been handed to the listener yet, and releases the credential
    /// cache connection.
    pub async fn stop(&self) {
        self.cancel.cancel();
        {
            let mut state = self.state.write();
            if !state.is_terminal() {
                *state = ConnectionState::ShuttingDown;
                metrics::set_connection_state(ConnectionState::ShuttingDown);
            }
        }

        let parked = self.session.lock().take();
        if let Some(mut session) = parked {
            self.close_transport(session.transport.as_mut()).await;
        }

        self.approval.release().await;
        tracing::info!("Execution stream client stopped");
    }

    async fn park_session(&self, session: Session) -> Result<(), StreamClientError> {
        let encrypted_streams = session.codec.context_count();
        let replaced = self.session.lock().replace(session);
        if let Some(mut old) = replaced {
            self.close_transport(old.transport.as_mut()).await;
        }

        if self.cancel.is_cancelled() {
            let parked = self.session.lock().take();
            if let Some(mut session) = parked {
                self.close_transport(session.transport.as_mut()).await;
            }
            return Err(StreamClientError::Stopped);
        }

        self.set_state(ConnectionState::Connected);
        tracing::info!(
            streams = self.config.subscriptions.len(),
            encrypted_streams,
            "Execution stream subscribed"
        );
        Ok(())
    }

    /// The fresh key is carried into the next attempt so a failed cache
    /// write cannot hand back the rejected one.
    async fn force_reissue(&self, ack: &SubscriptionAckError) -> Option<ApprovalKey> {
        tracing::warn!(
            stream_id = %ack.stream_id,
            message_code = %ack.message_code,
            "Approval key rejected, forcing reissue"
        );
        match self.approval.reissue_approval_key().await {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(error = %e, "Approval key reissue failed");
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Connect & Subscribe
    // -------------------------------------------------------------------------

    async fn attempt(&self, reissued: Option<ApprovalKey>) -> Result<Session, StreamClientError> {
        let approval_key = match reissued {
            Some(key) => key,
            None => self.approval.get_approval_key().await?,
        };
        self.connect_once(&approval_key).await
    }

    /// Open one transport and subscribe to every stream on it.
    async fn connect_once(&self, approval_key: &ApprovalKey) -> Result<Session, StreamClientError> {
        let mut transport =
            tokio::time::timeout(self.config.connect_timeout, self.connector.connect(&self.config.url))
                .await
                .map_err(|_| TransportError::ConnectTimeout)??;

        self.set_state(ConnectionState::Subscribing);
        let mut codec = FrameCodec::new(&self.config.subscriptions);

        match self
            .subscribe_all(transport.as_mut(), &mut codec, approval_key)
            .await
        {
            Ok(()) => Ok(Session { transport, codec }),
            Err(e) => {
                self.close_transport(transport.as_mut()).await;
                Err(e)
            }
        }
    }

    async fn subscribe_all(
        &self,
        transport: &mut dyn FrameTransport,
        codec: &mut FrameCodec,
        approval_key: &ApprovalKey,
    ) -> Result<(), StreamClientError> {
        for subscription in &self.config.subscriptions {
            let request = SubscriptionRequest::subscribe(approval_key, subscription).to_json()?;
            transport.send_text(&request).await?;

            let raw = self.read_ack(transport, &subscription.stream_id).await?;
            let context = validate_ack(&subscription.stream_id, &raw)?;
            codec.register_context(subscription.stream_id.clone(), context);

            tracing::info!(
                stream_id = %subscription.stream_id,
                market = subscription.market().as_str(),
                "Subscription acknowledged"
            );
        }
        Ok(())
    }

    /// Read exactly one frame as the ack. Transport pongs are not frames.
    async fn read_ack(
        &self,
        transport: &mut dyn FrameTransport,
        stream_id: &str,
    ) -> Result<String, StreamClientError> {
        tokio::time::timeout(self.config.ack_timeout, next_ack_frame(transport))
            .await
            .map_err(|_| StreamClientError::AckTimeout {
                stream_id: stream_id.to_string(),
                timeout: self.config.ack_timeout,
            })?
    }

    async fn close_transport(&self, transport: &mut dyn FrameTransport) {
        match tokio::time::timeout(self.config.close_timeout, transport.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "Transport close failed"),
            Err(_) => tracing::debug!(
                timeout_ms = self.config.close_timeout.as_millis(),
                "Transport close timed out"
            ),
        }
    }

    // -------------------------------------------------------------------------
    // Listener
    // -------------------------------------------------------------------------

    /// Consume frames from the subscribed session until stopped or failed.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if there is no subscribed session
    /// - `KeepaliveTimeout`, `ConnectionClosed` or `Transport` when the
    ///   connection dies; the session is closed and dropped
    pub async fn listen(&self) -> Result<(), StreamClientError> {
        let Some(mut session) = self.session.lock().take() else {
            return Err(StreamClientError::NotConnected);
        };

        let result = self.read_loop(&mut session).await;
        self.close_transport(session.transport.as_mut()).await;

        if let Err(e) = &result {
            self.set_state(ConnectionState::Disconnected);
            metrics::record_connect_failure(e.reason());
        }
        result
    }

    async fn read_loop(&self, session: &mut Session) -> Result<(), StreamClientError> {
        let keepalive_config = self.config.keepalive;
        let mut keepalive = KeepaliveState::new();
        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + keepalive_config.ping_interval,
            keepalive_config.ping_interval,
        );
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Listener cancelled");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match keepalive.on_tick(&keepalive_config) {
                        KeepaliveAction::SendPing => {
                            session.transport.send_ping().await?;
                            keepalive.mark_ping_sent();
                        }
                        KeepaliveAction::TimedOut(elapsed) => {
                            tracing::warn!(
                                elapsed_secs = elapsed.as_secs(),
                                idle_secs = keepalive.time_since_activity().as_secs(),
                                "Keepalive timeout"
                            );
                            return Err(StreamClientError::KeepaliveTimeout(elapsed));
                        }
                    }
                }
                frame = session.transport.next_frame() => {
                    let Some(frame) = frame? else {
                        tracing::info!("Execution stream closed by server");
                        return Err(StreamClientError::ConnectionClosed);
                    };
                    keepalive.record_activity();

                    let raw = match frame {
                        WireFrame::Text(text) => text.into_bytes(),
                        WireFrame::Binary(bytes) => bytes,
                        WireFrame::Pong => continue,
                    };
                    self.dispatch(session, &raw).await?;
                }
            }
        }
    }

    async fn dispatch(&self, session: &mut Session, raw: &[u8]) -> Result<(), StreamClientError> {
        match session.codec.parse_message(raw) {
            None => {
                metrics::record_frame(FrameKind::Dropped);
                tracing::debug!(len = raw.len(), "Skipping undecodable frame");
            }
            Some(Frame::Keepalive { raw }) => {
                metrics::record_frame(FrameKind::Keepalive);
                session.transport.send_text(&raw).await?;
                tracing::trace!("Echoed keepalive");
            }
            Some(Frame::Control(value)) => {
                metrics::record_frame(FrameKind::Control);
                tracing::debug!(control = %value, "Control frame");
            }
            Some(Frame::Execution(event)) => {
                metrics::record_frame(FrameKind::Execution);
                let (market, side) = (event.market, event.side);
                tracing::debug!(
                    stream_id = %event.stream_id,
                    symbol = %event.symbol,
                    side = side.as_str(),
                    "Execution received"
                );
                match self.handler.on_execution(event).await {
                    Ok(()) => metrics::record_execution_forwarded(market, side),
                    Err(e) => {
                        metrics::record_handler_error();
                        tracing::error!(error = %e, "Execution handler failed");
                    }
                }
            }
        }
        Ok(())
    }
}

async fn next_ack_frame(transport: &mut dyn FrameTransport) -> Result<String, StreamClientError> {
    loop {
        match transport.next_frame().await? {
            Some(WireFrame::Text(text)) => return Ok(text),
            Some(WireFrame::Binary(bytes)) => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Some(WireFrame::Pong) => {}
            None => return Err(StreamClientError::ConnectionClosed),
        }
    }
}

/// Check one ack against the stream it answers and extract its key/IV.
fn validate_ack(stream_id: &str, raw: &str) -> Result<StreamEncryptionContext, SubscriptionAckError> {
    let ack = SubscriptionAck::from_json(raw)
        .map_err(|_| SubscriptionAckError::unparseable(stream_id, raw))?;

    let rejected = |message: String| SubscriptionAckError {
        stream_id: stream_id.to_string(),
        status_code: ack.body.rt_cd.clone(),
        message_code: ack.body.msg_cd.clone(),
        message,
    };

    if ack.header.tr_id.trim() != stream_id {
        return Err(rejected(format!(
            "ack for unexpected stream {:?}",
            ack.header.tr_id
        )));
    }
    if !ack.is_success() {
        return Err(rejected(ack.body.msg1.clone()));
    }

    let (key, iv) = ack
        .key_iv()
        .ok_or_else(|| rejected("ack carries no key/iv".to_string()))?;
    StreamEncryptionContext::from_ack(key, iv).map_err(|e| rejected(e.to_string()))
}
