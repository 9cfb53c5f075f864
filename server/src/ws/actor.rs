use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::ws::protocol;
use crate::ws::{ChannelHandle, SessionState, SubscriptionRegistry};

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Catches abrupt disconnects that never deliver a close frame.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Registry membership of one live-update connection.
///
/// Starts in `Connecting`; `authenticate` binds the actor, `start` registers.
/// `close` unregisters at most once no matter how many times it runs, and
/// `Drop` calls it, so an aborted or panicking connection task still leaves
/// the registry clean.
pub struct Session {
    actor_id: Option<String>,
    channel: ChannelHandle,
    registry: SubscriptionRegistry,
    state: SessionState,
}

impl Session {
    pub fn connecting(registry: SubscriptionRegistry, channel: ChannelHandle) -> Self {
        Self {
            actor_id: None,
            channel,
            registry,
            state: SessionState::Connecting,
        }
    }

    /// Bind the actor the presented token resolved to. Only valid while
    /// `Connecting`; returns whether the transition happened.
    pub fn authenticate(&mut self, actor_id: impl Into<String>) -> bool {
        if self.state != SessionState::Connecting {
            return false;
        }
        self.actor_id = Some(actor_id.into());
        self.state = SessionState::Authenticated;
        true
    }

    /// Register the channel and enter `Idle`.
    pub fn start(&mut self) {
        if self.state != SessionState::Authenticated {
            return;
        }
        let Some(actor_id) = self.actor_id.as_deref() else {
            return;
        };
        let count = self.registry.register(actor_id, self.channel.clone());
        self.state = SessionState::Idle;
        tracing::info!(
            user_id = %actor_id,
            connections = count,
            "Live-update session started"
        );
    }

    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        if self.state == SessionState::Idle {
            if let Some(actor_id) = self.actor_id.as_deref() {
                self.registry.unregister(actor_id, &self.channel);
            }
        }
        self.state = SessionState::Closed;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Run the actor-per-connection pattern for an authenticated session.
/// `tx`/`rx` are the two ends of the queue behind the session's channel.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Ping task: sends periodic pings and closes on a missed pong
/// - Reader loop (this task): discards keepalives until the peer goes away
///
/// Pushes from the notification dispatcher enter through the same mpsc
/// channel, so a slow socket only ever backs up its own queue.
pub async fn run_connection(
    socket: WebSocket,
    mut session: Session,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
) {
    session.start();
    if session.state() != SessionState::Idle {
        return;
    }
    let Some(user_id) = session.actor_id().map(str::to_string) else {
        return;
    };

    let (ws_sender, mut ws_receiver) = socket.split();

    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task is gone, so is the connection
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => protocol::handle_text_message(&user_id, text.as_str()),
                Message::Binary(data) => protocol::handle_binary_message(&user_id, &data),
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        user_id = %user_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    user_id = %user_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(user_id = %user_id, "WebSocket stream ended");
                break;
            }
        }
    }

    writer_handle.abort();
    ping_handle.abort();

    session.close();

    tracing::info!(user_id = %user_id, "Live-update session closed");
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // Connection is broken
            break;
        }
    }
}
