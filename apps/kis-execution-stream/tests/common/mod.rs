//! In-memory collaborators for driving the stream client without a network.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use aes::Aes256;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use kis_execution_stream::{
    ApprovalKey, ApprovalKeyIssuer, ApprovalKeyManager, ApprovalKeyStore, CacheError,
    ClientConfig, CredentialIssuanceError, Environment, ExecutionEvent, ExecutionHandler,
    ExecutionStreamClient, FrameTransport, HandlerError, StreamSubscription, TransportConnector,
    TransportError, WireFrame,
};

pub const AES_KEY: &str = "0123456789abcdef0123456789abcdef";
pub const AES_IV: &str = "fedcba9876543210";
pub const DOMESTIC: &str = "H0STCNI9";
pub const OVERSEAS: &str = "H0GSCNI9";

// =============================================================================
// Credential cache
// =============================================================================

#[derive(Default)]
pub struct FakeStore {
    value: Mutex<Option<String>>,
    last_ttl: Mutex<Option<Duration>>,
    releases: AtomicU32,
    read_only: AtomicBool,
}

impl FakeStore {
    pub fn with_value(value: &str) -> Self {
        let store = Self::default();
        *store.value.lock() = Some(value.to_string());
        store
    }

    /// Reads succeed, every write fails.
    pub fn read_only(value: &str) -> Self {
        let store = Self::with_value(value);
        store.read_only.store(true, Ordering::SeqCst);
        store
    }

    pub fn value(&self) -> Option<String> {
        self.value.lock().clone()
    }

    pub fn last_ttl(&self) -> Option<Duration> {
        *self.last_ttl.lock()
    }

    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApprovalKeyStore for FakeStore {
    async fn get(&self) -> Result<Option<String>, CacheError> {
        Ok(self.value.lock().clone())
    }

    async fn set(&self, value: &str, ttl: Duration) -> Result<(), CacheError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(CacheError::Command {
                message: "READONLY You can't write against a read only replica".to_string(),
            });
        }
        *self.value.lock() = Some(value.to_string());
        *self.last_ttl.lock() = Some(ttl);
        Ok(())
    }

    async fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Credential issuer
// =============================================================================

/// Issues `key-1`, `key-2`, ...
#[derive(Default)]
pub struct FakeIssuer {
    issued: AtomicU32,
}

impl FakeIssuer {
    pub fn issued(&self) -> u32 {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApprovalKeyIssuer for FakeIssuer {
    async fn issue(&self) -> Result<ApprovalKey, CredentialIssuanceError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        ApprovalKey::parse(&format!("key-{n}")).ok_or(CredentialIssuanceError::MissingField)
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Test-side view of a scripted transport.
#[derive(Clone)]
pub struct TransportHandle {
    inbound: mpsc::UnboundedSender<WireFrame>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    pings: Arc<AtomicU32>,
}

impl TransportHandle {
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self.inbound.send(WireFrame::Text(text.into()));
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> u32 {
        self.pings.load(Ordering::SeqCst)
    }

    /// Wait until `n` texts have been sent.
    pub async fn wait_for_sent(&self, n: usize) -> Vec<String> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let sent = self.sent();
                if sent.len() >= n {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for outbound frames")
    }
}

pub struct ScriptedTransport {
    inbound: mpsc::UnboundedReceiver<WireFrame>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
    pings: Arc<AtomicU32>,
}

/// A transport plus the handle that feeds it.
pub fn scripted_transport() -> (ScriptedTransport, TransportHandle) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicBool::new(false));
    let pings = Arc::new(AtomicU32::new(0));
    (
        ScriptedTransport {
            inbound: rx,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
            pings: Arc::clone(&pings),
        },
        TransportHandle {
            inbound: tx,
            sent,
            closed,
            pings,
        },
    )
}

/// A transport that has already queued `frames` and then reports close.
pub fn closing_transport(frames: &[String]) -> (ScriptedTransport, TransportHandle) {
    let (transport, handle) = scripted_transport();
    for frame in frames {
        handle.push_text(frame.clone());
    }
    let (dead_tx, _) = mpsc::unbounded_channel();
    let handle = TransportHandle {
        inbound: dead_tx,
        ..handle
    };
    (transport, handle)
}

#[async_trait]
impl FrameTransport for ScriptedTransport {
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Send("closed".to_string()));
        }
        self.sent.lock().push(text.to_string());
        Ok(())
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<WireFrame>, TransportError> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out scripted transports in order, then refuses.
#[derive(Default)]
pub struct FakeConnector {
    transports: Mutex<VecDeque<ScriptedTransport>>,
    connects: AtomicU32,
}

impl FakeConnector {
    pub fn with(transports: Vec<ScriptedTransport>) -> Self {
        Self {
            transports: Mutex::new(transports.into()),
            connects: AtomicU32::new(0),
        }
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportConnector for FakeConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn FrameTransport>, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.transports.lock().pop_front();
        match next {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(TransportError::Connect("connection refused".to_string())),
        }
    }
}

// =============================================================================
// Execution handler
// =============================================================================

/// Rejects the first event, forwards every later one.
pub struct FailFirstHandler {
    calls: AtomicU32,
    forward: mpsc::Sender<ExecutionEvent>,
}

impl FailFirstHandler {
    pub fn new(forward: mpsc::Sender<ExecutionEvent>) -> Self {
        Self {
            calls: AtomicU32::new(0),
            forward,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionHandler for FailFirstHandler {
    async fn on_execution(&self, event: ExecutionEvent) -> Result<(), HandlerError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(HandlerError::Failed {
                message: "order book unavailable".to_string(),
            });
        }
        self.forward
            .send(event)
            .await
            .map_err(|_| HandlerError::ChannelClosed)
    }
}

// =============================================================================
// Wire helpers
// =============================================================================

pub fn ack(tr_id: &str, rt_cd: &str, msg_cd: &str, with_key: bool) -> String {
    let mut body = serde_json::json!({ "rt_cd": rt_cd, "msg_cd": msg_cd, "msg1": "test ack" });
    if with_key {
        body["output"] = serde_json::json!({ "key": AES_KEY, "iv": AES_IV });
    }
    serde_json::json!({ "header": { "tr_id": tr_id, "tr_key": "hts", "encrypt": "N" }, "body": body })
        .to_string()
}

pub fn ok_ack(tr_id: &str) -> String {
    ack(tr_id, "0", "OPSP0000", true)
}

pub fn encrypted_frame(stream_id: &str, symbol: &str, payload: &str) -> String {
    let ciphertext = cbc::Encryptor::<Aes256>::new_from_slices(AES_KEY.as_bytes(), AES_IV.as_bytes())
        .unwrap()
        .encrypt_padded_vec_mut::<Pkcs7>(payload.as_bytes());
    format!("1|{stream_id}|{symbol}|{}", STANDARD.encode(ciphertext))
}

// =============================================================================
// Client
// =============================================================================

pub struct Harness {
    pub client: Arc<ExecutionStreamClient>,
    pub store: Arc<FakeStore>,
    pub issuer: Arc<FakeIssuer>,
    pub connector: Arc<FakeConnector>,
    pub events: mpsc::Receiver<ExecutionEvent>,
}

pub fn test_config(url: &str, max_attempts: u32) -> ClientConfig {
    let mut config = ClientConfig::new(url, StreamSubscription::all_for(Environment::Paper, "hts"));
    config.reconnect.delay = Duration::ZERO;
    config.reconnect.max_attempts = max_attempts;
    config.ack_timeout = Duration::from_secs(2);
    config.close_timeout = Duration::from_millis(200);
    config
}

pub fn harness_with(
    config: ClientConfig,
    store: FakeStore,
    connector: FakeConnector,
) -> Harness {
    let (tx, rx) = mpsc::channel(16);
    harness_with_handler(config, store, connector, Arc::new(tx), rx)
}

/// Like `harness_with`, but `handler` receives the decoded events and
/// `events` is whatever channel the test wants to observe.
pub fn harness_with_handler(
    config: ClientConfig,
    store: FakeStore,
    connector: FakeConnector,
    handler: Arc<dyn ExecutionHandler>,
    events: mpsc::Receiver<ExecutionEvent>,
) -> Harness {
    let store = Arc::new(store);
    let issuer = Arc::new(FakeIssuer::default());
    let connector = Arc::new(connector);

    let approval = ApprovalKeyManager::new(
        Arc::clone(&store) as Arc<dyn ApprovalKeyStore>,
        Arc::clone(&issuer) as Arc<dyn ApprovalKeyIssuer>,
    );
    let client = Arc::new(ExecutionStreamClient::new(
        config,
        approval,
        Arc::clone(&connector) as Arc<dyn TransportConnector>,
        handler,
    ));

    Harness {
        client,
        store,
        issuer,
        connector,
        events,
    }
}

pub fn harness(max_attempts: u32, store: FakeStore, connector: FakeConnector) -> Harness {
    harness_with(test_config("ws://test.invalid", max_attempts), store, connector)
}
