use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

/// Messages pushed from the server to live-update subscribers.
///
/// Pushes are signals, not data: on `refresh` the client re-fetches its
/// outpass list through the HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    Refresh,
}

impl ServerEvent {
    /// Encode as a JSON text frame.
    pub fn to_message(self) -> Option<Message> {
        match serde_json::to_string(&self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode server event");
                None
            }
        }
    }
}

/// Handle an inbound text frame. Clients only send small keepalive payloads,
/// so anything received is logged and discarded.
pub fn handle_text_message(user_id: &str, text: &str) {
    tracing::trace!(
        user_id = %user_id,
        "Keepalive: {}",
        text.chars().take(32).collect::<String>()
    );
}

/// Handle an inbound binary frame. Treated the same as a text keepalive.
pub fn handle_binary_message(user_id: &str, data: &[u8]) {
    tracing::trace!(user_id = %user_id, bytes = data.len(), "Binary keepalive");
}
