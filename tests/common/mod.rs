//! In-memory gateway for integration tests
//!
//! `MockConnector` hands every opened socket's server end to the test as a
//! `ServerConn`, which can script hello/dispatch/ack payloads and read what
//! the shard sent. All tests run on a paused tokio clock.

#![allow(dead_code)]

use arrakis_shards::events::{Diagnostic, Lifecycle, ShardEvent};
use arrakis_shards::gateway_info::{GatewayInfo, GatewayInfoSource};
use arrakis_shards::shard::{IdentifyClock, ShardConnection, ShardContext, ShardState};
use arrakis_shards::transport::{Connector, Socket, SocketCommand, SocketEvent, WireMessage};
use arrakis_shards::{Codec, GatewayError};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

pub const GATEWAY_URL: &str = "wss://x";
pub const TOKEN: &str = "test-token";

/// Connector whose sockets are channel pairs
pub struct MockConnector {
    accepted: mpsc::UnboundedSender<ServerConn>,
    refusals: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerConn>) {
        let (accepted, accepted_rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            accepted,
            refusals: AtomicUsize::new(0),
        });
        (connector, accepted_rx)
    }

    /// Fail the next `count` connection attempts
    pub fn refuse_next(&self, count: usize) {
        self.refusals.store(count, Ordering::SeqCst);
    }
}

impl Connector for MockConnector {
    fn connect(&self, url: String) -> BoxFuture<'static, Result<Socket, GatewayError>> {
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Box::pin(async move {
                Err(GatewayError::Connect {
                    url,
                    source: "connection refused".into(),
                })
            });
        }

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let _ = self.accepted.send(ServerConn {
            url,
            opened_at: Instant::now(),
            to_client: events_tx,
            from_client: commands_rx,
        });
        Box::pin(async move { Ok(Socket::new(commands_tx, events_rx)) })
    }
}

/// What the shard wrote
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFrame {
    Payload(Value),
    Close(u16),
}

/// Server end of one socket
pub struct ServerConn {
    pub url: String,
    pub opened_at: Instant,
    to_client: mpsc::UnboundedSender<SocketEvent>,
    from_client: mpsc::UnboundedReceiver<SocketCommand>,
}

impl ServerConn {
    pub fn send_json(&self, value: Value) {
        self.send_raw(&value.to_string());
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self
            .to_client
            .send(SocketEvent::Message(WireMessage::Text(text.to_string())));
    }

    pub fn hello(&self, heartbeat_interval_ms: u64) {
        self.send_json(json!({
            "op": 10,
            "d": { "heartbeat_interval": heartbeat_interval_ms },
            "s": null,
            "t": null,
        }));
    }

    pub fn dispatch(&self, event_type: &str, data: Value, sequence: u64) {
        self.send_json(json!({ "op": 0, "d": data, "s": sequence, "t": event_type }));
    }

    pub fn ready(&self, session_id: &str, sequence: u64) {
        self.dispatch("READY", json!({ "session_id": session_id }), sequence);
    }

    pub fn ack(&self) {
        self.send_json(json!({ "op": 11, "d": null, "s": null, "t": null }));
    }

    pub fn invalid_session(&self) {
        self.send_json(json!({ "op": 9, "d": false, "s": null, "t": null }));
    }

    pub fn request_reconnect(&self) {
        self.send_json(json!({ "op": 7, "d": null, "s": null, "t": null }));
    }

    pub fn close_from_server(&self, code: u16, reason: &str) {
        let _ = self.to_client.send(SocketEvent::Closed {
            code: Some(code),
            reason: reason.to_string(),
        });
    }

    pub fn fail(&self, message: &str) {
        let _ = self.to_client.send(SocketEvent::Error(message.to_string()));
    }

    /// Next frame from the shard; acknowledges close frames.
    /// `None` once the shard has dropped the socket.
    pub async fn recv(&mut self) -> Option<ClientFrame> {
        match self.from_client.recv().await? {
            SocketCommand::Send(message) => Some(ClientFrame::Payload(
                serde_json::from_slice(message.as_bytes()).expect("shard sends json"),
            )),
            SocketCommand::Close { code, done, .. } => {
                let _ = done.send(());
                Some(ClientFrame::Close(code))
            }
        }
    }

    /// Next frame must be a payload with opcode `op`
    pub async fn expect_op(&mut self, op: u64) -> Value {
        match self.recv().await {
            Some(ClientFrame::Payload(payload)) => {
                assert_eq!(payload["op"], op, "unexpected payload {payload}");
                payload
            }
            other => panic!("expected op {op}, got {other:?}"),
        }
    }

    /// Next frame must be a close frame; returns its code
    pub async fn expect_close(&mut self) -> u16 {
        match self.recv().await {
            Some(ClientFrame::Close(code)) => code,
            other => panic!("expected close, got {other:?}"),
        }
    }
}

/// Shard context wired to a mock connector
pub struct Harness {
    pub connector: Arc<MockConnector>,
    pub accepted: mpsc::UnboundedReceiver<ServerConn>,
    pub events: mpsc::UnboundedReceiver<ShardEvent>,
    pub diagnostics: broadcast::Receiver<Diagnostic>,
    pub context: ShardContext,
}

impl Harness {
    pub fn new(total_shards: u32) -> Self {
        let (connector, accepted) = MockConnector::new();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (diagnostics_tx, diagnostics) = broadcast::channel(4096);

        let context = ShardContext {
            token: Arc::from(TOKEN),
            total_shards,
            gateway_url: GATEWAY_URL.to_string(),
            codec: Codec::Json,
            connector: connector.clone(),
            clock: IdentifyClock::new(),
            events: events_tx,
            diagnostics: diagnostics_tx,
            state: ShardState::new(),
        };

        Self {
            connector,
            accepted,
            events,
            diagnostics,
            context,
        }
    }

    pub fn spawn(&self, shard_id: u32) -> ShardConnection {
        self.context.state.register(shard_id);
        ShardConnection::spawn(shard_id, self.context.clone())
    }

    pub async fn accept(&mut self) -> ServerConn {
        self.accepted.recv().await.expect("connector dropped")
    }

    /// Next dispatch event, skipping raw payload events
    pub async fn next_dispatch(&mut self) -> (u32, String, Value) {
        loop {
            match self.events.recv().await.expect("event stream closed") {
                ShardEvent::Dispatch {
                    shard_id,
                    event_type,
                    data,
                } => return (shard_id, event_type, data),
                ShardEvent::Payload { .. } => continue,
            }
        }
    }

    /// Wait for a diagnostic matching `predicate`
    pub async fn wait_for(&mut self, predicate: impl Fn(&Lifecycle) -> bool) -> Lifecycle {
        wait_for_diagnostic(&mut self.diagnostics, predicate).await.lifecycle
    }
}

pub async fn wait_for_diagnostic(
    diagnostics: &mut broadcast::Receiver<Diagnostic>,
    predicate: impl Fn(&Lifecycle) -> bool,
) -> Diagnostic {
    loop {
        match diagnostics.recv().await {
            Ok(diagnostic) if predicate(&diagnostic.lifecycle) => return diagnostic,
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => panic!("diagnostic stream closed"),
        }
    }
}

/// Asserts `actual` is `expected` within scheduler tolerance
pub fn assert_elapsed(actual: Duration, expected: Duration) {
    let tolerance = Duration::from_millis(50);
    assert!(
        actual >= expected && actual <= expected + tolerance,
        "expected ~{expected:?}, got {actual:?}"
    );
}

/// A payload the auto gateway saw
#[derive(Debug, Clone)]
pub struct Record {
    pub at: Instant,
    pub shard: Option<u64>,
    pub url: String,
    pub payload: Value,
}

impl Record {
    pub fn op(&self) -> Option<u64> {
        self.payload["op"].as_u64()
    }
}

pub type GatewayLog = Arc<Mutex<Vec<Record>>>;

/// Answers every socket like a healthy gateway: hello, READY for identify,
/// RESUMED for resume, ack for heartbeat. Logs every payload.
pub fn spawn_auto_gateway(
    mut accepted: mpsc::UnboundedReceiver<ServerConn>,
    heartbeat_interval_ms: u64,
) -> GatewayLog {
    let log = GatewayLog::default();
    let task_log = Arc::clone(&log);
    tokio::spawn(async move {
        while let Some(conn) = accepted.recv().await {
            tokio::spawn(serve(conn, heartbeat_interval_ms, Arc::clone(&task_log)));
        }
    });
    log
}

async fn serve(mut conn: ServerConn, heartbeat_interval_ms: u64, log: GatewayLog) {
    conn.hello(heartbeat_interval_ms);
    let mut shard = None;
    let mut sequence = 0;

    while let Some(ClientFrame::Payload(payload)) = conn.recv().await {
        let op = payload["op"].as_u64();
        if op == Some(2) {
            shard = payload["d"]["shard"][0].as_u64();
        }
        log.lock().push(Record {
            at: Instant::now(),
            shard,
            url: conn.url.clone(),
            payload: payload.clone(),
        });

        match op {
            Some(2) => {
                sequence += 1;
                let session = format!("session-{}", shard.unwrap_or_default());
                conn.ready(&session, sequence);
            }
            Some(6) => {
                sequence += 1;
                conn.dispatch("RESUMED", json!({}), sequence);
            }
            Some(1) => conn.ack(),
            _ => {}
        }
    }
}

/// Metadata lookup that counts its calls
pub struct CountingInfo {
    pub calls: AtomicUsize,
    info: Option<GatewayInfo>,
}

impl CountingInfo {
    pub fn new(recommended_shards: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            info: Some(GatewayInfo {
                url: GATEWAY_URL.to_string(),
                recommended_shards,
            }),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            info: None,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GatewayInfoSource for CountingInfo {
    fn gateway_info(&self) -> BoxFuture<'_, Result<GatewayInfo, GatewayError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = match &self.info {
            Some(info) => Ok(info.clone()),
            None => Err(GatewayError::GatewayInfo("lookup unavailable".into())),
        };
        Box::pin(async move { result })
    }
}
