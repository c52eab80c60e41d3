//! Per-shard connection
//!
//! A [`ShardConnection`] is a handle to a task that owns one shard's socket
//! and every field of its session. The task is a state machine: a single
//! [`ShardStage`] field, transitioned only by socket events, timer firings,
//! and commands from the handle. Nothing else mutates the shard.
//!
//! Lifecycle:
//! `Disconnected → Connecting → AwaitingHello → Identifying | Resuming → Ready`,
//! with `Reconnecting` whenever a fixed-delay reconnect is pending.

use crate::codec::Codec;
use crate::error::GatewayError;
use crate::events::{Diagnostic, Lifecycle, ShardEvent};
use crate::metrics;
use crate::protocol::{self, GatewayPayload, OpCode, READY, RESUMED};
use crate::shard::clock::IdentifyClock;
use crate::shard::state::{ShardStage, ShardState};
use crate::transport::{Connector, Socket, SocketEvent, WireMessage, CLOSE_GOING_AWAY};

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Reconnect delay after a transport error
pub const TRANSPORT_ERROR_RECONNECT_DELAY: Duration = Duration::from_millis(5000);
/// Reconnect delay after an invalid session
pub const INVALID_SESSION_RECONNECT_DELAY: Duration = Duration::from_millis(5000);
/// Reconnect delay after the server closed the socket
pub const SERVER_CLOSE_RECONNECT_DELAY: Duration = Duration::from_millis(10000);

/// Close codes after which the session cannot be resumed
const NON_RESUMABLE_CLOSE_CODES: [u16; 2] = [
    4007, // invalid seq
    4009, // session timed out
];

/// Everything a shard shares with its manager
#[derive(Clone)]
pub struct ShardContext {
    pub token: Arc<str>,
    pub total_shards: u32,
    pub gateway_url: String,
    pub codec: Codec,
    pub connector: Arc<dyn Connector>,
    pub clock: IdentifyClock,
    pub events: mpsc::UnboundedSender<ShardEvent>,
    pub diagnostics: broadcast::Sender<Diagnostic>,
    pub state: ShardState,
}

impl ShardContext {
    /// `gatewayUrl?encoding=<codec>`
    pub fn socket_url(&self) -> String {
        format!("{}?encoding={}", self.gateway_url, self.codec.name())
    }
}

/// Resolution of [`ShardConnection::connect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardReady {
    pub shard_id: u32,
    pub ready_at: Instant,
    pub session_id: String,
}

/// Point-in-time view of a shard's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSnapshot {
    pub stage: ShardStage,
    pub session_id: Option<String>,
    pub last_sequence: Option<u64>,
    pub ack_pending: bool,
    pub heartbeat_active: bool,
    pub heartbeat_interval: Option<Duration>,
}

enum Command {
    Connect { ready: oneshot::Sender<ShardReady> },
    Send {
        payload: GatewayPayload,
        reply: oneshot::Sender<Result<(), GatewayError>>,
    },
    Close { done: oneshot::Sender<()> },
    Snapshot(oneshot::Sender<ShardSnapshot>),
}

/// Handle to one shard's connection task
///
/// Dropping the handle shuts the task down and closes its socket.
pub struct ShardConnection {
    id: u32,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl ShardConnection {
    /// Spawn the shard's task in `Disconnected`
    pub fn spawn(id: u32, context: ShardContext) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let runner = ShardRunner::new(id, context, commands_rx);
        let task = tokio::spawn(runner.run());
        Self { id, commands, task }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Open the socket, identify, and resolve once the shard is `Ready`.
    ///
    /// Transport faults along the way are retried by the shard itself; this
    /// only fails if the shard's task is gone.
    pub async fn connect(&self) -> Result<ShardReady, GatewayError> {
        let (ready, ready_rx) = oneshot::channel();
        self.command(Command::Connect { ready })?;
        ready_rx
            .await
            .map_err(|_| GatewayError::ShardClosed { shard_id: self.id })
    }

    /// Write an application payload to this shard's socket.
    ///
    /// Fails with `ShardNotConnected` unless the shard is `Ready`, and with
    /// `Codec` if the payload cannot be encoded. Nothing is queued.
    pub async fn send(&self, payload: GatewayPayload) -> Result<(), GatewayError> {
        let (reply, reply_rx) = oneshot::channel();
        self.command(Command::Send { payload, reply })?;
        reply_rx
            .await
            .map_err(|_| GatewayError::ShardClosed { shard_id: self.id })?
    }

    /// Stop heartbeating, close the socket with 1001 and wait for the close
    /// acknowledgement. Idempotent; resolves immediately when already closed.
    pub async fn close(&self) {
        let (done, done_rx) = oneshot::channel();
        if self.command(Command::Close { done }).is_ok() {
            let _ = done_rx.await;
        }
    }

    pub async fn snapshot(&self) -> Result<ShardSnapshot, GatewayError> {
        let (reply, reply_rx) = oneshot::channel();
        self.command(Command::Snapshot(reply))?;
        reply_rx
            .await
            .map_err(|_| GatewayError::ShardClosed { shard_id: self.id })
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    fn command(&self, command: Command) -> Result<(), GatewayError> {
        self.commands
            .send(command)
            .map_err(|_| GatewayError::ShardClosed { shard_id: self.id })
    }
}

/// How the next hello is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handshake {
    Identify,
    Resume,
}

#[derive(Debug, Default)]
struct Session {
    session_id: Option<String>,
    last_sequence: Option<u64>,
}

impl Session {
    fn handshake(&self) -> Handshake {
        if self.session_id.is_some() {
            Handshake::Resume
        } else {
            Handshake::Identify
        }
    }

    /// Forget the session; the next handshake is a fresh identify.
    fn invalidate(&mut self) {
        self.session_id = None;
    }

    fn reset(&mut self) {
        self.session_id = None;
        self.last_sequence = None;
    }
}

#[derive(Debug, Default)]
struct Heartbeat {
    timer: Option<Interval>,
    period: Option<Duration>,
    ack_pending: bool,
    sent_at: Option<Instant>,
}

impl Heartbeat {
    fn start(&mut self, period: Duration) {
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.timer = Some(timer);
        self.period = Some(period);
        self.ack_pending = false;
        self.sent_at = None;
    }

    fn stop(&mut self) {
        self.timer = None;
        self.ack_pending = false;
        self.sent_at = None;
    }
}

/// What woke the shard task
enum Wake {
    Command(Command),
    Socket(SocketEvent),
    HeartbeatTick,
    HandshakeDue,
    ReconnectDue,
}

struct ShardRunner {
    id: u32,
    context: ShardContext,
    commands: mpsc::UnboundedReceiver<Command>,
    stage: ShardStage,
    socket: Option<Socket>,
    session: Session,
    heartbeat: Heartbeat,
    handshake: Handshake,
    handshake_at: Option<Instant>,
    reconnect: Option<(Instant, Handshake)>,
    pending_ready: Option<oneshot::Sender<ShardReady>>,
}

impl ShardRunner {
    fn new(id: u32, context: ShardContext, commands: mpsc::UnboundedReceiver<Command>) -> Self {
        Self {
            id,
            context,
            commands,
            stage: ShardStage::Disconnected,
            socket: None,
            session: Session::default(),
            heartbeat: Heartbeat::default(),
            handshake: Handshake::Identify,
            handshake_at: None,
            reconnect: None,
            pending_ready: None,
        }
    }

    async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Wake::Command(command),
                    None => break,
                },
                event = next_socket_event(&mut self.socket) => Wake::Socket(event),
                () = next_heartbeat(&mut self.heartbeat.timer) => Wake::HeartbeatTick,
                () = sleep_until_deadline(self.handshake_at) => Wake::HandshakeDue,
                () = sleep_until_deadline(self.reconnect.map(|(at, _)| at)) => Wake::ReconnectDue,
            };

            match wake {
                Wake::Command(command) => self.on_command(command).await,
                Wake::Socket(event) => self.on_socket_event(event).await,
                Wake::HeartbeatTick => self.on_heartbeat_tick().await,
                Wake::HandshakeDue => self.on_handshake_due(),
                Wake::ReconnectDue => self.on_reconnect_due().await,
            }
        }

        // handle dropped: owner shutdown
        self.close().await;
        debug!(shard_id = self.id, "Shard task stopped");
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect { ready } => {
                self.pending_ready = Some(ready);
                self.close_socket().await;
                let handshake = self.session.handshake();
                self.open(handshake).await;
            }
            Command::Send { payload, reply } => {
                let _ = reply.send(self.send_application(&payload));
            }
            Command::Close { done } => {
                self.close().await;
                let _ = done.send(());
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    async fn on_socket_event(&mut self, event: SocketEvent) {
        match event {
            SocketEvent::Message(message) => self.on_message(&message).await,
            SocketEvent::Closed { code, reason } => {
                // the pump is gone; nothing left to close
                self.socket = None;
                self.heartbeat.stop();
                self.handshake_at = None;
                self.emit(Lifecycle::ServerClosed {
                    code,
                    reason: reason.clone(),
                });
                warn!(shard_id = self.id, ?code, reason = %reason, "Server closed connection");

                if code.is_some_and(|code| NON_RESUMABLE_CLOSE_CODES.contains(&code)) {
                    self.session.invalidate();
                }
                let handshake = self.session.handshake();
                self.schedule_reconnect(SERVER_CLOSE_RECONNECT_DELAY, handshake, "server_close");
            }
            SocketEvent::Error(message) => {
                self.socket = None;
                self.heartbeat.stop();
                self.handshake_at = None;
                warn!(shard_id = self.id, error = %message, "Gateway transport error");
                metrics::record_error(self.id, "transport");
                self.emit(Lifecycle::TransportError { message });

                let handshake = self.session.handshake();
                self.schedule_reconnect(TRANSPORT_ERROR_RECONNECT_DELAY, handshake, "transport_error");
            }
        }
    }

    async fn on_message(&mut self, message: &WireMessage) {
        let payload: GatewayPayload = match self.context.codec.decode(message) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(shard_id = self.id, error = %e, "Dropping undecodable payload");
                metrics::record_payload_dropped(self.id);
                self.emit(Lifecycle::PayloadDropped {
                    reason: e.to_string(),
                });
                return;
            }
        };

        self.observe_sequence(payload.s);
        self.context.state.record_event(self.id);
        let _ = self.context.events.send(ShardEvent::Payload {
            shard_id: self.id,
            payload: payload.clone(),
        });

        match payload.op {
            OpCode::Hello => self.on_hello(&payload),
            OpCode::HeartbeatAck => self.on_heartbeat_ack(),
            OpCode::Heartbeat => self.send_heartbeat(),
            OpCode::Dispatch => self.on_dispatch(payload),
            OpCode::Reconnect => {
                info!(shard_id = self.id, "Server requested reconnect");
                self.emit(Lifecycle::ReconnectRequested);
                metrics::record_reconnect(self.id, "requested");
                self.context.state.record_reconnect(self.id);
                self.close_socket().await;
                let handshake = self.session.handshake();
                self.open(handshake).await;
            }
            OpCode::InvalidSession => {
                warn!(shard_id = self.id, "Invalid session, identifying fresh");
                self.emit(Lifecycle::InvalidSession);
                self.session.invalidate();
                self.handshake_at = None;
                // no late close or error from this socket may reschedule
                self.close_socket().await;
                self.schedule_reconnect(
                    INVALID_SESSION_RECONNECT_DELAY,
                    Handshake::Identify,
                    "invalid_session",
                );
            }
            op => debug!(shard_id = self.id, ?op, "Ignoring payload"),
        }
    }

    /// Sequence numbers never move backwards within a session.
    fn observe_sequence(&mut self, sequence: Option<u64>) {
        let Some(sequence) = sequence else { return };
        match self.session.last_sequence {
            Some(last) if sequence < last => {
                warn!(shard_id = self.id, sequence, last, "Out-of-order sequence");
            }
            _ => self.session.last_sequence = Some(sequence),
        }
    }

    fn on_hello(&mut self, payload: &GatewayPayload) {
        if self.stage != ShardStage::AwaitingHello {
            debug!(shard_id = self.id, stage = self.stage.as_str(), "Ignoring repeated hello");
            return;
        }
        let Some(interval_ms) = payload.heartbeat_interval().filter(|ms| *ms > 0) else {
            warn!(shard_id = self.id, "Hello without heartbeat_interval");
            metrics::record_payload_dropped(self.id);
            self.emit(Lifecycle::PayloadDropped {
                reason: "hello without heartbeat_interval".to_string(),
            });
            return;
        };

        let period = Duration::from_millis(interval_ms);
        self.heartbeat.start(period);
        self.emit(Lifecycle::HelloReceived {
            heartbeat_interval: period,
        });

        let now = Instant::now();
        let delay = self.context.clock.identify_delay(now);
        if !delay.is_zero() {
            self.emit(Lifecycle::IdentifyDelayed { delay });
        }
        self.handshake_at = Some(now + delay);
        self.set_stage(match self.handshake {
            Handshake::Identify => ShardStage::Identifying,
            Handshake::Resume => ShardStage::Resuming,
        });
    }

    fn on_heartbeat_ack(&mut self) {
        let latency = self.heartbeat.sent_at.take().map(|at| at.elapsed());
        self.heartbeat.ack_pending = false;
        if let Some(latency) = latency {
            metrics::record_heartbeat_ack(self.id, latency);
        }
        self.context.state.record_heartbeat_ack(self.id);
        self.emit(Lifecycle::HeartbeatAcked { latency });
    }

    fn on_dispatch(&mut self, payload: GatewayPayload) {
        let Some(event_type) = payload.t.clone() else {
            debug!(shard_id = self.id, "Dispatch without type");
            return;
        };

        match event_type.as_str() {
            READY => match payload.session_id() {
                Some(session_id) => self.on_ready(session_id.to_owned()),
                None => warn!(shard_id = self.id, "READY without session_id"),
            },
            RESUMED => {
                info!(shard_id = self.id, sequence = ?self.session.last_sequence, "Shard resumed");
                self.set_stage(ShardStage::Ready);
                self.emit(Lifecycle::Resumed);
                self.resolve_pending_ready(Instant::now());
            }
            _ => {}
        }

        metrics::record_dispatch(self.id, &event_type);
        let _ = self.context.events.send(ShardEvent::Dispatch {
            shard_id: self.id,
            event_type,
            data: payload.d,
        });
    }

    fn on_ready(&mut self, session_id: String) {
        let ready_at = Instant::now();
        self.session.session_id = Some(session_id.clone());
        self.set_stage(ShardStage::Ready);
        self.context.clock.mark_ready(ready_at);
        info!(shard_id = self.id, session_id = %session_id, "Shard ready");
        self.emit(Lifecycle::Ready { session_id });

        self.resolve_pending_ready(ready_at);
    }

    fn resolve_pending_ready(&mut self, ready_at: Instant) {
        let (Some(ready), Some(session_id)) = (self.pending_ready.take(), self.session.session_id.clone()) else {
            return;
        };
        let _ = ready.send(ShardReady {
            shard_id: self.id,
            ready_at,
            session_id,
        });
    }

    async fn on_heartbeat_tick(&mut self) {
        if !self.heartbeat.ack_pending {
            self.send_heartbeat();
            return;
        }

        warn!(shard_id = self.id, "Heartbeat not acknowledged, connection zombied");
        metrics::record_zombie(self.id);
        metrics::record_reconnect(self.id, "zombie");
        self.context.state.record_reconnect(self.id);
        self.emit(Lifecycle::Zombied);
        self.close_socket().await;
        let handshake = self.session.handshake();
        self.open(handshake).await;
    }

    fn on_handshake_due(&mut self) {
        self.handshake_at = None;
        match (self.handshake, self.session.session_id.clone()) {
            (Handshake::Resume, Some(session_id)) => {
                let sequence = self.session.last_sequence;
                self.send_payload(&protocol::resume(&self.context.token, &session_id, sequence));
                debug!(shard_id = self.id, session_id = %session_id, ?sequence, "Sent resume");
                self.emit(Lifecycle::ResumeSent { sequence });
            }
            _ => {
                // fresh session: sequence numbering restarts
                self.session.reset();
                self.set_stage(ShardStage::Identifying);
                self.send_payload(&protocol::identify(
                    &self.context.token,
                    self.id,
                    self.context.total_shards,
                ));
                debug!(shard_id = self.id, total_shards = self.context.total_shards, "Sent identify");
                self.emit(Lifecycle::IdentifySent);
            }
        }
    }

    async fn on_reconnect_due(&mut self) {
        let Some((_, handshake)) = self.reconnect.take() else { return };
        self.close_socket().await;
        self.open(handshake).await;
    }

    fn send_heartbeat(&mut self) {
        let sequence = self.session.last_sequence;
        self.send_payload(&protocol::heartbeat(sequence));
        self.heartbeat.ack_pending = true;
        self.heartbeat.sent_at = Some(Instant::now());
        metrics::record_heartbeat(self.id);
        self.emit(Lifecycle::HeartbeatSent { sequence });
    }

    /// Open a fresh socket. Supersedes any pending reconnect or handshake.
    async fn open(&mut self, handshake: Handshake) {
        self.reconnect = None;
        self.handshake_at = None;
        self.handshake = handshake;
        self.set_stage(ShardStage::Connecting);

        let url = self.context.socket_url();
        self.emit(Lifecycle::Connecting { url: url.clone() });

        match self.context.connector.connect(url).await {
            Ok(socket) => {
                self.socket = Some(socket);
                self.set_stage(ShardStage::AwaitingHello);
                self.emit(Lifecycle::Opened);
            }
            Err(e) => {
                warn!(shard_id = self.id, error = %e, "Failed to open gateway socket");
                metrics::record_error(self.id, e.error_type_label());
                self.emit(Lifecycle::TransportError {
                    message: e.to_string(),
                });
                self.schedule_reconnect(TRANSPORT_ERROR_RECONNECT_DELAY, handshake, "connect_failed");
            }
        }
    }

    /// One-shot; a newer schedule replaces an older one.
    fn schedule_reconnect(&mut self, delay: Duration, handshake: Handshake, reason: &'static str) {
        self.reconnect = Some((Instant::now() + delay, handshake));
        self.set_stage(ShardStage::Reconnecting);
        metrics::record_reconnect(self.id, reason);
        self.context.state.record_reconnect(self.id);
        self.emit(Lifecycle::ReconnectScheduled {
            delay,
            resume: handshake == Handshake::Resume,
        });
    }

    /// Owner-requested close: cancels every timer, then closes the socket.
    async fn close(&mut self) {
        self.reconnect = None;
        self.handshake_at = None;
        self.close_socket().await;
        self.set_stage(ShardStage::Disconnected);
    }

    /// Stops the heartbeat and closes the socket if one is open.
    async fn close_socket(&mut self) {
        self.heartbeat.stop();
        if let Some(socket) = self.socket.take() {
            socket.close(CLOSE_GOING_AWAY, "Closed connection").await;
            debug!(shard_id = self.id, "Closed gateway socket");
            self.emit(Lifecycle::Closed);
        }
    }

    /// Protocol payloads (heartbeat, identify, resume); failures are logged
    /// and recovered by the heartbeat and reconnect paths.
    fn send_payload(&self, payload: &GatewayPayload) {
        if let Err(e) = self.write(payload) {
            warn!(shard_id = self.id, error = %e, op = ?payload.op, "Outbound payload not sent");
        }
    }

    fn send_application(&self, payload: &GatewayPayload) -> Result<(), GatewayError> {
        if self.stage != ShardStage::Ready {
            return Err(self.not_connected());
        }
        self.write(payload).inspect_err(|e| {
            debug!(shard_id = self.id, error = %e, op = ?payload.op, "Rejected application payload");
        })
    }

    fn write(&self, payload: &GatewayPayload) -> Result<(), GatewayError> {
        let socket = self.socket.as_ref().ok_or_else(|| self.not_connected())?;
        let message = self.context.codec.encode(payload).map_err(|e| {
            metrics::record_error(self.id, "codec");
            GatewayError::from(e)
        })?;
        if socket.send(message) {
            Ok(())
        } else {
            Err(self.not_connected())
        }
    }

    fn not_connected(&self) -> GatewayError {
        GatewayError::ShardNotConnected {
            shard_id: self.id,
            stage: self.stage.as_str(),
        }
    }

    fn set_stage(&mut self, stage: ShardStage) {
        if self.stage != stage {
            debug!(shard_id = self.id, from = self.stage.as_str(), to = stage.as_str(), "Shard stage");
            self.stage = stage;
            self.context.state.set_stage(self.id, stage);
            metrics::set_shards_ready(self.context.state.ready_shards());
        }
    }

    fn emit(&self, lifecycle: Lifecycle) {
        debug!(shard_id = self.id, event = lifecycle.label(), "{lifecycle}");
        let _ = self.context.diagnostics.send(Diagnostic {
            shard_id: self.id,
            lifecycle,
        });
    }

    fn snapshot(&self) -> ShardSnapshot {
        ShardSnapshot {
            stage: self.stage,
            session_id: self.session.session_id.clone(),
            last_sequence: self.session.last_sequence,
            ack_pending: self.heartbeat.ack_pending,
            heartbeat_active: self.heartbeat.timer.is_some(),
            heartbeat_interval: self.heartbeat.period,
        }
    }
}

async fn next_socket_event(socket: &mut Option<Socket>) -> SocketEvent {
    match socket {
        Some(socket) => socket.recv().await,
        None => pending().await,
    }
}

async fn next_heartbeat(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => pending::<()>().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use metrics_exporter_prometheus::PrometheusBuilder;

    struct OfflineConnector;

    impl Connector for OfflineConnector {
        fn connect(&self, url: String) -> BoxFuture<'static, Result<Socket, GatewayError>> {
            Box::pin(async move {
                Err(GatewayError::Connect {
                    url,
                    source: "offline".into(),
                })
            })
        }
    }

    fn runner(id: u32, state: ShardState) -> ShardRunner {
        let (events, _) = mpsc::unbounded_channel();
        let (diagnostics, _) = broadcast::channel(16);
        let (_commands, commands_rx) = mpsc::unbounded_channel();
        let context = ShardContext {
            token: Arc::from("token"),
            total_shards: 2,
            gateway_url: "wss://x".to_string(),
            codec: Codec::Json,
            connector: Arc::new(OfflineConnector),
            clock: IdentifyClock::new(),
            events,
            diagnostics,
            state,
        };
        ShardRunner::new(id, context, commands_rx)
    }

    #[test]
    fn session_without_id_identifies() {
        let mut session = Session::default();
        assert_eq!(session.handshake(), Handshake::Identify);

        session.session_id = Some("abc".to_string());
        session.last_sequence = Some(4);
        assert_eq!(session.handshake(), Handshake::Resume);

        session.invalidate();
        assert_eq!(session.handshake(), Handshake::Identify);
        assert_eq!(session.last_sequence, Some(4));

        session.reset();
        assert_eq!(session.last_sequence, None);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_first_tick_waits_one_period() {
        let mut heartbeat = Heartbeat::default();
        let start = Instant::now();
        heartbeat.start(Duration::from_millis(41250));
        next_heartbeat(&mut heartbeat.timer).await;
        assert_eq!(start.elapsed(), Duration::from_millis(41250));
    }

    #[test]
    fn heartbeat_stop_is_idempotent() {
        let mut heartbeat = Heartbeat {
            ack_pending: true,
            ..Heartbeat::default()
        };
        heartbeat.stop();
        heartbeat.stop();
        assert!(heartbeat.timer.is_none());
        assert!(!heartbeat.ack_pending);
    }

    #[test]
    fn non_resumable_codes() {
        assert!(NON_RESUMABLE_CLOSE_CODES.contains(&4007));
        assert!(NON_RESUMABLE_CLOSE_CODES.contains(&4009));
        assert!(!NON_RESUMABLE_CLOSE_CODES.contains(&4000));
    }

    #[test]
    fn stage_changes_refresh_ready_gauge() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let state = ShardState::new();
        state.register(0);
        state.register(1);
        let mut first = runner(0, state.clone());
        let mut second = runner(1, state.clone());

        ::metrics::with_local_recorder(&recorder, || {
            first.set_stage(ShardStage::Ready);
            second.set_stage(ShardStage::Ready);
            first.set_stage(ShardStage::Reconnecting);
        });

        let rendered = handle.render();
        assert!(
            rendered.contains("gateway_shards_ready 1"),
            "gauge should follow the reconnect: {rendered}"
        );
    }
}
