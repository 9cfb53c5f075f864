use std::sync::Arc;

use crate::config::Config;
use crate::db::DbPool;
use crate::identity::IdentityStore;
use crate::outpass::render::QrSvgRenderer;
use crate::outpass::store::SqliteRecordStore;
use crate::outpass::LifecycleEngine;
use crate::ws::dispatch::NotificationDispatcher;
use crate::ws::SubscriptionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Lifetime of issued bearer tokens
    pub token_ttl_days: i64,
    /// Open live-update channels per user
    pub registry: SubscriptionRegistry,
    pub identities: IdentityStore,
    pub engine: LifecycleEngine,
}

impl AppState {
    /// Wire the collaborators together over one database and one registry.
    pub fn new(db: DbPool, jwt_secret: Vec<u8>, config: &Config) -> Self {
        let registry = SubscriptionRegistry::new();
        let engine = LifecycleEngine::new(
            Arc::new(SqliteRecordStore::new(db.clone())),
            Arc::new(QrSvgRenderer::default()),
            NotificationDispatcher::new(registry.clone()),
            config.qr_payload_prefix.clone(),
        );

        Self {
            identities: IdentityStore::new(db.clone()),
            db,
            jwt_secret,
            token_ttl_days: config.token_ttl_days,
            registry,
            engine,
        }
    }
}
