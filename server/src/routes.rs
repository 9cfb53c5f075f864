use axum::http::{HeaderValue, StatusCode};
use axum::{middleware, Json, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::auth::middleware::JwtSecret;
use crate::identity::registration;
use crate::outpass::routes as outpass_routes;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting: 5 requests per minute per IP on auth endpoints
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12) // 1 token every 12 seconds = 5 per minute
            .burst_size(5)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    let auth_routes = Router::new()
        .route(
            "/api/auth/register",
            axum::routing::post(registration::register),
        )
        .route("/api/auth/login", axum::routing::post(registration::login))
        .layer(GovernorLayer {
            config: governor_config,
        });

    let public_routes = Router::new()
        .route("/api", axum::routing::get(root))
        .route("/api/", axum::routing::get(root));

    // Authenticated routes (Claims extractor validates the bearer token)
    let outpass_routes = Router::new()
        .route(
            "/api/outpass/create",
            axum::routing::post(outpass_routes::create_outpass),
        )
        .route(
            "/api/outpass/myrequests",
            axum::routing::get(outpass_routes::my_requests),
        )
        .route(
            "/api/outpass/approve/{id}",
            axum::routing::put(outpass_routes::approve_outpass),
        )
        .route(
            "/api/outpass/reject/{id}",
            axum::routing::put(outpass_routes::reject_outpass),
        );

    // WebSocket endpoint (auth via query param, not JWT header)
    let ws_routes = Router::new().route("/api/ws", axum::routing::get(ws_handler::ws_upgrade));

    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(public_routes)
        .merge(outpass_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// CORS policy for browser clients. An empty origin list allows any origin.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins = if allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring malformed CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Online Out Pass API" }))
}

/// Health check: also confirms the database connection is usable.
async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<&'static str, StatusCode> {
    let db = state.db.clone();
    let healthy = tokio::task::spawn_blocking(move || {
        let Ok(conn) = db.lock() else {
            return false;
        };
        let reachable = conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok();
        reachable
    })
    .await
    .unwrap_or(false);

    if healthy {
        Ok("ok")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
