//! WebSocket transport on tokio-tungstenite

use super::{Connector, Socket, SocketCommand, SocketEvent, WireMessage};
use crate::error::GatewayError;
use futures::future::BoxFuture;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on waiting for the peer's close acknowledgement
pub const CLOSE_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens real gateway sockets
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    close_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new() -> Self {
        Self {
            close_timeout: CLOSE_ACK_TIMEOUT,
        }
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self, url: String) -> BoxFuture<'static, Result<Socket, GatewayError>> {
        let close_timeout = self.close_timeout;
        Box::pin(async move {
            let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| GatewayError::Connect {
                    url: url.clone(),
                    source: Box::new(e),
                })?;

            debug!(url = %url, "Gateway socket opened");

            let (commands_tx, commands_rx) = mpsc::unbounded_channel();
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            tokio::spawn(pump(stream, commands_rx, events_tx, close_timeout));

            Ok(Socket::new(commands_tx, events_rx))
        })
    }
}

impl From<WireMessage> for Message {
    fn from(message: WireMessage) -> Self {
        match message {
            WireMessage::Text(text) => Message::Text(text.into()),
            WireMessage::Binary(bytes) => Message::Binary(bytes.into()),
        }
    }
}

/// Owns the stream: writes queued commands, forwards inbound frames.
async fn pump(
    stream: WsStream,
    mut commands: mpsc::UnboundedReceiver<SocketCommand>,
    events: mpsc::UnboundedSender<SocketEvent>,
    close_timeout: Duration,
) {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SocketCommand::Send(message)) => {
                    if let Err(e) = write.send(message.into()).await {
                        let _ = events.send(SocketEvent::Error(e.to_string()));
                        return;
                    }
                }
                Some(SocketCommand::Close { code, reason, done }) => {
                    close_handshake(&mut write, &mut read, code, reason, close_timeout).await;
                    let _ = done.send(());
                    return;
                }
                None => {
                    // shard dropped the socket without closing it
                    let _ = write.close().await;
                    return;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(SocketEvent::Message(WireMessage::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let _ = events.send(SocketEvent::Message(WireMessage::Binary(bytes.to_vec())));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.as_str().to_owned()),
                        None => (None, String::new()),
                    };
                    // flush tungstenite's queued close reply
                    let _ = write.flush().await;
                    let _ = events.send(SocketEvent::Closed { code, reason });
                    return;
                }
                // ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    let _ = events.send(SocketEvent::Error(e.to_string()));
                    return;
                }
                None => {
                    let _ = events.send(SocketEvent::Closed {
                        code: None,
                        reason: "stream ended".to_string(),
                    });
                    return;
                }
            },
        }
    }
}

async fn close_handshake(
    write: &mut SplitSink<WsStream, Message>,
    read: &mut SplitStream<WsStream>,
    code: u16,
    reason: String,
    close_timeout: Duration,
) {
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: reason.into(),
    };
    if let Err(e) = write.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "Close frame not sent, socket already gone");
        return;
    }

    let acknowledged = tokio::time::timeout(close_timeout, async {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;

    if acknowledged.is_err() {
        warn!(code, "Peer did not acknowledge close in time");
    }
}
