pub mod actor;
pub mod dispatch;
pub mod handler;
pub mod protocol;

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// The connection's writer task owns the receiving half.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of one live-update connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upgrade accepted, token not yet checked.
    Connecting,
    /// Token resolved to a known actor; not yet registered.
    Authenticated,
    /// Registered and waiting for inbound keepalives or outbound pushes.
    Idle,
    Closed,
}

/// A push delivery to one channel failed because its connection is gone.
#[derive(Debug, thiserror::Error)]
#[error("channel {0} is closed")]
pub struct DeliveryFailure(pub u64);

/// One open live-update channel. Cloning shares the same underlying
/// connection; equality is by channel id.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    id: u64,
    sender: ConnectionSender,
}

impl ChannelHandle {
    pub fn new(sender: ConnectionSender) -> Self {
        Self {
            id: NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed),
            sender,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue a message for this channel's writer task. Never blocks.
    pub fn deliver(&self, msg: axum::extract::ws::Message) -> Result<(), DeliveryFailure> {
        self.sender.send(msg).map_err(|_| DeliveryFailure(self.id))
    }
}

impl PartialEq for ChannelHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChannelHandle {}

/// Subscription registry: tracks all open live-update channels per actor.
/// An actor can hold several channels at once (multiple devices/tabs).
///
/// All access goes through `register`, `unregister` and `channels_for`; the
/// underlying map is never exposed. Each operation holds a shard lock only for
/// the duration of the map update, so none of them can block on I/O.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    inner: Arc<DashMap<String, Vec<ChannelHandle>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `channel` to the actor's set. Registering the same channel twice
    /// keeps a single entry. Returns the actor's channel count afterwards.
    pub fn register(&self, actor_id: &str, channel: ChannelHandle) -> usize {
        let mut entry = self.inner.entry(actor_id.to_string()).or_default();
        if !entry.contains(&channel) {
            entry.push(channel);
        }
        let count = entry.len();
        drop(entry);

        tracing::debug!(user_id = %actor_id, connections = count, "Connection registered");
        count
    }

    /// Remove `channel` from the actor's set, dropping the actor entirely once
    /// the set is empty. Absent actors or channels are a no-op.
    /// Returns whether a channel was actually removed.
    pub fn unregister(&self, actor_id: &str, channel: &ChannelHandle) -> bool {
        let mut removed = false;
        self.inner.remove_if_mut(actor_id, |_, channels| {
            let before = channels.len();
            channels.retain(|c| c != channel);
            removed = channels.len() != before;
            channels.is_empty()
        });

        if removed {
            tracing::debug!(
                user_id = %actor_id,
                channel_id = channel.id(),
                "Connection unregistered"
            );
        }
        removed
    }

    /// Snapshot of the actor's channels, safe to iterate while other tasks
    /// register or unregister concurrently.
    pub fn channels_for(&self, actor_id: &str) -> Vec<ChannelHandle> {
        self.inner
            .get(actor_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    pub fn connection_count(&self, actor_id: &str) -> usize {
        self.inner.get(actor_id).map(|entry| entry.len()).unwrap_or(0)
    }

    /// Number of actors with at least one open channel.
    pub fn actor_count(&self) -> usize {
        self.inner.len()
    }
}
