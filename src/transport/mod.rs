//! Socket transport
//!
//! A shard never touches the WebSocket directly. A [`Connector`] opens a
//! socket and hands back a [`Socket`]: a command channel into the pump task
//! that owns the stream, and an event channel out of it. Tests swap in an
//! in-memory connector.

mod websocket;

pub use websocket::WebSocketConnector;

use crate::error::GatewayError;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};

/// Close code sent when the client goes away
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// One frame on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl WireMessage {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            WireMessage::Text(text) => text.as_bytes(),
            WireMessage::Binary(bytes) => bytes,
        }
    }
}

/// Instruction to the pump task
#[derive(Debug)]
pub enum SocketCommand {
    /// Write a frame
    Send(WireMessage),
    /// Send a close frame and signal `done` once the peer acknowledged it
    /// (or the wait timed out)
    Close {
        code: u16,
        reason: String,
        done: oneshot::Sender<()>,
    },
}

/// Something that happened on the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Message(WireMessage),
    /// Peer closed the connection
    Closed { code: Option<u16>, reason: String },
    /// Transport failed; the socket is gone
    Error(String),
}

/// An open socket, seen from the shard
#[derive(Debug)]
pub struct Socket {
    commands: mpsc::UnboundedSender<SocketCommand>,
    events: mpsc::UnboundedReceiver<SocketEvent>,
}

impl Socket {
    pub fn new(
        commands: mpsc::UnboundedSender<SocketCommand>,
        events: mpsc::UnboundedReceiver<SocketEvent>,
    ) -> Self {
        Self { commands, events }
    }

    /// Queue a frame. Returns false when the pump is already gone.
    pub fn send(&self, message: WireMessage) -> bool {
        self.commands.send(SocketCommand::Send(message)).is_ok()
    }

    /// Next event; a vanished pump reads as an abnormal close.
    pub async fn recv(&mut self) -> SocketEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => SocketEvent::Closed {
                code: None,
                reason: "transport dropped".to_string(),
            },
        }
    }

    /// Send a close frame and wait for the close acknowledgement.
    pub async fn close(self, code: u16, reason: &str) {
        let (done, acked) = oneshot::channel();
        let command = SocketCommand::Close {
            code,
            reason: reason.to_string(),
            done,
        };
        if self.commands.send(command).is_ok() {
            // pump dropping `done` also counts as closed
            let _ = acked.await;
        }
    }
}

/// Opens sockets
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: String) -> BoxFuture<'static, Result<Socket, GatewayError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_pump_reads_as_close() {
        let (commands, _commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        drop(events_tx);

        let mut socket = Socket::new(commands, events);
        assert!(matches!(socket.recv().await, SocketEvent::Closed { code: None, .. }));
    }

    #[tokio::test]
    async fn close_resolves_when_pump_is_gone() {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (_events_tx, events) = mpsc::unbounded_channel();
        drop(commands_rx);

        let socket = Socket::new(commands, events);
        assert!(!socket.send(WireMessage::Text("{}".to_string())));
        socket.close(CLOSE_GOING_AWAY, "bye").await;
    }

    #[tokio::test]
    async fn close_waits_for_acknowledgement() {
        let (commands, mut commands_rx) = mpsc::unbounded_channel();
        let (_events_tx, events) = mpsc::unbounded_channel();
        let socket = Socket::new(commands, events);

        let pump = tokio::spawn(async move {
            match commands_rx.recv().await {
                Some(SocketCommand::Close { code, done, .. }) => {
                    let _ = done.send(());
                    code
                }
                other => panic!("expected close, got {other:?}"),
            }
        });

        socket.close(CLOSE_GOING_AWAY, "bye").await;
        assert_eq!(pump.await.unwrap(), CLOSE_GOING_AWAY);
    }

    #[test]
    fn wire_message_bytes() {
        assert_eq!(WireMessage::Text("ab".to_string()).as_bytes(), b"ab");
        assert_eq!(WireMessage::Binary(vec![1, 2]).as_bytes(), &[1, 2]);
    }
}
