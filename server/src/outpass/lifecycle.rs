use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::ws::dispatch::{LifecycleEvent, NotificationDispatcher};

use super::render::CodeRenderer;
use super::store::RecordStore;
use super::{NewOutpass, OutpassRecord, OutpassStatus, OutpassView};

/// Applies outpass state transitions and announces them to the owner.
///
/// Operations are blocking (they hit the record store); notification is
/// fire-and-forget and never affects the outcome of a transition.
#[derive(Clone)]
pub struct LifecycleEngine {
    store: Arc<dyn RecordStore>,
    renderer: Arc<dyn CodeRenderer>,
    dispatcher: NotificationDispatcher,
    qr_payload_prefix: String,
}

impl LifecycleEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        renderer: Arc<dyn CodeRenderer>,
        dispatcher: NotificationDispatcher,
        qr_payload_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            renderer,
            dispatcher,
            qr_payload_prefix: qr_payload_prefix.into(),
        }
    }

    /// File a new `PENDING` request for `owner_id`. Every field is trimmed and
    /// must be non-empty. The creator's own channels get a refresh so other
    /// open tabs pick up the new entry.
    pub fn create(&self, owner_id: &str, input: NewOutpass) -> Result<OutpassRecord, ServiceError> {
        let fields = [
            ("purpose", input.purpose.trim()),
            ("destination", input.destination.trim()),
            ("dateOut", input.date_out.trim()),
            ("returnTime", input.return_time.trim()),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, value)| value.is_empty()) {
            return Err(ServiceError::Validation(format!("{} is required", name)));
        }

        let record = OutpassRecord {
            id: Uuid::now_v7().to_string(),
            owner_id: owner_id.to_string(),
            purpose: fields[0].1.to_string(),
            destination: fields[1].1.to_string(),
            date_out: fields[2].1.to_string(),
            return_time: fields[3].1.to_string(),
            status: OutpassStatus::Pending,
            access_token: None,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        };
        self.store.insert(&record)?;

        tracing::info!(outpass_id = %record.id, user_id = %owner_id, "Outpass created");
        self.dispatcher.dispatch(&LifecycleEvent::refresh(owner_id));

        Ok(record)
    }

    /// Move to `APPROVED`. The access token is minted on the first approval
    /// only; approving again keeps it. `REJECTED` is terminal.
    pub fn approve(&self, record_id: &str) -> Result<OutpassRecord, ServiceError> {
        let mut already_rejected = false;
        let record = self
            .store
            .modify(record_id, &mut |r| {
                if r.status == OutpassStatus::Rejected {
                    already_rejected = true;
                    return;
                }
                if r.access_token.is_none() {
                    r.access_token = Some(Uuid::new_v4().simple().to_string());
                }
                r.status = OutpassStatus::Approved;
            })?
            .ok_or_else(not_found)?;

        if already_rejected {
            return Err(ServiceError::Conflict("Request already rejected".to_string()));
        }

        tracing::info!(outpass_id = %record.id, user_id = %record.owner_id, "Outpass approved");
        self.dispatcher.dispatch(&LifecycleEvent::refresh(&record.owner_id));

        Ok(record)
    }

    /// Move to `REJECTED` from any state, including `APPROVED`. The access
    /// token is cleared so a rejected record never carries one.
    pub fn reject(&self, record_id: &str) -> Result<OutpassRecord, ServiceError> {
        let record = self
            .store
            .modify(record_id, &mut |r| {
                if r.status == OutpassStatus::Approved {
                    tracing::warn!(outpass_id = %r.id, "Rejecting a previously approved outpass");
                }
                r.status = OutpassStatus::Rejected;
                r.access_token = None;
            })?
            .ok_or_else(not_found)?;

        tracing::info!(outpass_id = %record.id, user_id = %record.owner_id, "Outpass rejected");
        self.dispatcher.dispatch(&LifecycleEvent::refresh(&record.owner_id));

        Ok(record)
    }

    pub fn get(&self, record_id: &str) -> Result<OutpassRecord, ServiceError> {
        self.store.find_by_id(record_id)?.ok_or_else(not_found)
    }

    /// The owner's requests, newest first. Approved requests carry a QR code
    /// of `{prefix}{access_token}` rendered on every call.
    pub fn list_for_owner(&self, owner_id: &str) -> Result<Vec<OutpassView>, ServiceError> {
        let records = self.store.find_by_owner(owner_id)?;
        Ok(records.into_iter().map(|r| self.project(r)).collect())
    }

    fn project(&self, record: OutpassRecord) -> OutpassView {
        let mut view = OutpassView::from(record);
        if view.status != OutpassStatus::Approved {
            return view;
        }
        if let Some(token) = &view.qr_code_token {
            let payload = format!("{}{}", self.qr_payload_prefix, token);
            match self.renderer.render_data_url(&payload) {
                Ok(url) => view.qr_code_data_url = Some(url),
                // The list still loads; the client just shows no code.
                Err(e) => tracing::warn!(outpass_id = %view.id, error = %e, "QR render failed"),
            }
        }
        view
    }
}

fn not_found() -> ServiceError {
    ServiceError::NotFound("Request not found".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::outpass::render::{QrSvgRenderer, RenderError};
    use crate::outpass::store::SqliteRecordStore;
    use crate::ws::{ChannelHandle, SubscriptionRegistry};
    use axum::extract::ws::Message;
    use qrcode::QrCode;
    use tokio::sync::mpsc;

    fn engine() -> (LifecycleEngine, SubscriptionRegistry) {
        let registry = SubscriptionRegistry::new();
        let engine = LifecycleEngine::new(
            Arc::new(SqliteRecordStore::new(db::init_memory_db().unwrap())),
            Arc::new(QrSvgRenderer::default()),
            NotificationDispatcher::new(registry.clone()),
            "hitam:outpass:",
        );
        (engine, registry)
    }

    fn subscribe(registry: &SubscriptionRegistry, actor: &str) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(actor, ChannelHandle::new(tx));
        rx
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> usize {
        let mut n = 0;
        while rx.try_recv().is_ok() {
            n += 1;
        }
        n
    }

    fn request() -> NewOutpass {
        NewOutpass {
            purpose: "  Family function ".into(),
            date_out: "2026-10-20".into(),
            return_time: "2026-10-22 18:00".into(),
            destination: "Warangal".into(),
        }
    }

    #[test]
    fn create_yields_pending_without_token() {
        let (engine, _) = engine();
        let record = engine.create("u1", request()).unwrap();

        assert_eq!(record.status, OutpassStatus::Pending);
        assert_eq!(record.access_token, None);
        assert_eq!(record.owner_id, "u1");
        assert_eq!(record.purpose, "Family function");
        assert_eq!(engine.get(&record.id).unwrap(), record);
    }

    #[test]
    fn create_rejects_blank_fields() {
        let (engine, _) = engine();
        for blank in ["", "   ", "\t\n"] {
            let mut input = request();
            input.destination = blank.into();
            let err = engine.create("u1", input).unwrap_err();
            assert!(matches!(err, ServiceError::Validation(ref m) if m.contains("destination")));
        }
        assert!(engine.list_for_owner("u1").unwrap().is_empty());
    }

    #[test]
    fn create_notifies_creator_only() {
        let (engine, registry) = engine();
        let mut mine = subscribe(&registry, "u1");
        let mut theirs = subscribe(&registry, "u2");

        engine.create("u1", request()).unwrap();

        assert_eq!(drain(&mut mine), 1);
        assert_eq!(drain(&mut theirs), 0);
    }

    #[test]
    fn approve_is_idempotent_and_keeps_token() {
        let (engine, _) = engine();
        let created = engine.create("u1", request()).unwrap();

        let first = engine.approve(&created.id).unwrap();
        let second = engine.approve(&created.id).unwrap();

        assert_eq!(first.status, OutpassStatus::Approved);
        assert_eq!(second.status, OutpassStatus::Approved);
        let token = first.access_token.clone().unwrap();
        assert_eq!(token.len(), 32);
        assert_eq!(second.access_token, Some(token));
    }

    #[test]
    fn approve_notifies_owner_once() {
        let (engine, registry) = engine();
        let created = engine.create("u1", request()).unwrap();
        let mut rx = subscribe(&registry, "u1");

        engine.approve(&created.id).unwrap();

        match rx.try_recv().unwrap() {
            Message::Text(text) => assert_eq!(text.as_str(), r#"{"type":"refresh"}"#),
            other => panic!("expected text frame, got {:?}", other),
        }
        assert_eq!(drain(&mut rx), 0);
    }

    #[test]
    fn approve_without_subscribers_succeeds() {
        let (engine, registry) = engine();
        let created = engine.create("u1", request()).unwrap();
        assert!(engine.approve(&created.id).is_ok());
        assert_eq!(registry.actor_count(), 0);
    }

    #[test]
    fn approve_and_reject_unknown_id_are_not_found() {
        let (engine, registry) = engine();
        let mut rx = subscribe(&registry, "u1");
        assert!(matches!(engine.approve("missing"), Err(ServiceError::NotFound(_))));
        assert!(matches!(engine.reject("missing"), Err(ServiceError::NotFound(_))));
        assert_eq!(drain(&mut rx), 0);
    }

    #[test]
    fn reject_from_pending() {
        let (engine, _) = engine();
        let created = engine.create("u1", request()).unwrap();
        let rejected = engine.reject(&created.id).unwrap();
        assert_eq!(rejected.status, OutpassStatus::Rejected);
        assert_eq!(rejected.access_token, None);
    }

    #[test]
    fn reject_overrides_prior_approval() {
        let (engine, registry) = engine();
        let created = engine.create("u1", request()).unwrap();
        engine.approve(&created.id).unwrap();
        let mut rx = subscribe(&registry, "u1");

        let rejected = engine.reject(&created.id).unwrap();

        assert_eq!(rejected.status, OutpassStatus::Rejected);
        assert_eq!(rejected.access_token, None);
        assert_eq!(engine.get(&created.id).unwrap().access_token, None);
        assert_eq!(drain(&mut rx), 1);
    }

    #[test]
    fn approve_after_reject_is_refused() {
        let (engine, registry) = engine();
        let created = engine.create("u1", request()).unwrap();
        engine.reject(&created.id).unwrap();
        let mut rx = subscribe(&registry, "u1");

        let err = engine.approve(&created.id).unwrap_err();

        assert!(matches!(err, ServiceError::Conflict(_)));
        let stored = engine.get(&created.id).unwrap();
        assert_eq!(stored.status, OutpassStatus::Rejected);
        assert_eq!(stored.access_token, None);
        assert_eq!(drain(&mut rx), 0);
    }

    #[test]
    fn reject_twice_stays_rejected() {
        let (engine, _) = engine();
        let created = engine.create("u1", request()).unwrap();
        engine.reject(&created.id).unwrap();
        assert_eq!(engine.reject(&created.id).unwrap().status, OutpassStatus::Rejected);
    }

    #[test]
    fn list_is_newest_first_and_only_approved_has_code() {
        let (engine, _) = engine();
        let older = engine.create("u1", request()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let newer = engine.create("u1", request()).unwrap();
        engine.create("u2", request()).unwrap();
        engine.approve(&older.id).unwrap();

        let list = engine.list_for_owner("u1").unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, newer.id);
        assert_eq!(list[0].status, OutpassStatus::Pending);
        assert!(list[0].qr_code_data_url.is_none());
        assert!(list[0].qr_code_token.is_none());

        assert_eq!(list[1].id, older.id);
        assert_eq!(list[1].status, OutpassStatus::Approved);
        assert!(list[1]
            .qr_code_data_url
            .as_deref()
            .unwrap()
            .starts_with("data:image/svg+xml;base64,"));
    }

    struct FailingRenderer;

    impl CodeRenderer for FailingRenderer {
        fn render_visual(&self, payload: &str) -> Result<Vec<u8>, RenderError> {
            Ok(QrCode::new(payload.repeat(4000).as_bytes()).map(|_| Vec::new())?)
        }

        fn mime_type(&self) -> &'static str {
            "image/svg+xml"
        }
    }

    #[test]
    fn render_failure_still_lists_record() {
        let registry = SubscriptionRegistry::new();
        let engine = LifecycleEngine::new(
            Arc::new(SqliteRecordStore::new(db::init_memory_db().unwrap())),
            Arc::new(FailingRenderer),
            NotificationDispatcher::new(registry),
            "p:",
        );
        let created = engine.create("u1", request()).unwrap();
        engine.approve(&created.id).unwrap();

        let list = engine.list_for_owner("u1").unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].status, OutpassStatus::Approved);
        assert!(list[0].qr_code_token.is_some());
        assert!(list[0].qr_code_data_url.is_none());
    }
}
