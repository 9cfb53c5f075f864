use super::protocol::ServerEvent;
use super::SubscriptionRegistry;

/// A lifecycle change addressed to one actor's live-update channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub target_actor_id: String,
    pub kind: ServerEvent,
}

impl LifecycleEvent {
    pub fn refresh(target_actor_id: impl Into<String>) -> Self {
        Self {
            target_actor_id: target_actor_id.into(),
            kind: ServerEvent::Refresh,
        }
    }
}

/// Pushes lifecycle events to every open channel of the target actor.
#[derive(Clone)]
pub struct NotificationDispatcher {
    registry: SubscriptionRegistry,
}

impl NotificationDispatcher {
    pub fn new(registry: SubscriptionRegistry) -> Self {
        Self { registry }
    }

    /// Fire-and-forget delivery. Each channel's queue preserves dispatch order.
    /// A channel whose connection is gone is unregistered and skipped; the
    /// remaining channels still receive the event.
    pub fn dispatch(&self, event: &LifecycleEvent) {
        let channels = self.registry.channels_for(&event.target_actor_id);
        if channels.is_empty() {
            tracing::trace!(user_id = %event.target_actor_id, "No live channels for event");
            return;
        }

        let Some(msg) = event.kind.to_message() else {
            return;
        };

        for channel in &channels {
            if let Err(failure) = channel.deliver(msg.clone()) {
                tracing::debug!(
                    user_id = %event.target_actor_id,
                    error = %failure,
                    "Dropping dead channel"
                );
                self.registry.unregister(&event.target_actor_id, channel);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::ChannelHandle;
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    fn channel() -> (ChannelHandle, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelHandle::new(tx), rx)
    }

    fn refresh_text(msg: Message) -> String {
        match msg {
            Message::Text(text) => text.to_string(),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[test]
    fn dispatch_without_channels_is_noop() {
        let registry = SubscriptionRegistry::new();
        let dispatcher = NotificationDispatcher::new(registry.clone());

        dispatcher.dispatch(&LifecycleEvent::refresh("u1"));

        assert_eq!(registry.actor_count(), 0);
    }

    #[test]
    fn dispatch_reaches_only_target_actor() {
        let registry = SubscriptionRegistry::new();
        let dispatcher = NotificationDispatcher::new(registry.clone());
        let (c1, mut r1) = channel();
        let (c2, mut r2) = channel();
        let (other, mut r_other) = channel();
        registry.register("u1", c1);
        registry.register("u1", c2);
        registry.register("u2", other);

        dispatcher.dispatch(&LifecycleEvent::refresh("u1"));

        assert_eq!(refresh_text(r1.try_recv().unwrap()), r#"{"type":"refresh"}"#);
        assert_eq!(refresh_text(r2.try_recv().unwrap()), r#"{"type":"refresh"}"#);
        assert!(r_other.try_recv().is_err());
    }

    #[test]
    fn failed_channel_is_removed_and_others_still_receive() {
        let registry = SubscriptionRegistry::new();
        let dispatcher = NotificationDispatcher::new(registry.clone());
        let (c1, r1) = channel();
        let (c2, mut r2) = channel();
        registry.register("u1", c1.clone());
        registry.register("u1", c2.clone());

        // c1's connection is gone
        drop(r1);
        dispatcher.dispatch(&LifecycleEvent::refresh("u1"));

        assert!(r2.try_recv().is_ok());
        assert_eq!(registry.channels_for("u1"), vec![c2]);
    }

    #[test]
    fn last_dead_channel_removes_actor() {
        let registry = SubscriptionRegistry::new();
        let dispatcher = NotificationDispatcher::new(registry.clone());
        let (c1, r1) = channel();
        registry.register("u1", c1);
        drop(r1);

        dispatcher.dispatch(&LifecycleEvent::refresh("u1"));

        assert_eq!(registry.actor_count(), 0);
    }

    #[test]
    fn each_dispatch_queues_one_message() {
        let registry = SubscriptionRegistry::new();
        let dispatcher = NotificationDispatcher::new(registry.clone());
        let (c1, mut r1) = channel();
        registry.register("u1", c1);

        for _ in 0..3 {
            dispatcher.dispatch(&LifecycleEvent::refresh("u1"));
        }

        let mut received = 0;
        while let Ok(msg) = r1.try_recv() {
            refresh_text(msg);
            received += 1;
        }
        assert_eq!(received, 3);
    }
}
