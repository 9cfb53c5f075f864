use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use tokio::sync::mpsc;

use crate::auth::jwt;
use crate::error::ServiceError;
use crate::state::AppState;
use crate::ws::actor::{self, Session};
use crate::ws::ChannelHandle;

/// Query parameters for WebSocket connection.
/// Browsers cannot set headers on WebSocket requests, so the bearer token
/// travels as `?token=JWT`.
#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Close code for every authentication failure (401 semantics).
/// The close reason tells the failures apart.
pub const CLOSE_UNAUTHORIZED: u16 = 4401;

/// Why a connection was refused before registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingToken,
    TokenExpired,
    TokenInvalid,
    UnknownUser,
    /// The identity store could not be queried.
    LookupFailed,
}

impl AuthFailure {
    pub fn reason(self) -> &'static str {
        match self {
            AuthFailure::MissingToken => "Missing token",
            AuthFailure::TokenExpired => "Token expired",
            AuthFailure::TokenInvalid => "Token invalid",
            AuthFailure::UnknownUser => "User not found",
            AuthFailure::LookupFailed => "Identity lookup failed",
        }
    }
}

/// Resolve a presented token to an existing actor id.
pub async fn authenticate(state: &AppState, token: Option<&str>) -> Result<String, AuthFailure> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or(AuthFailure::MissingToken)?;

    let claims = jwt::validate_access_token(&state.jwt_secret, token).map_err(|err| {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthFailure::TokenExpired,
            _ => AuthFailure::TokenInvalid,
        }
    })?;

    let identities = state.identities.clone();
    let user_id = claims.sub.clone();
    let exists = tokio::task::spawn_blocking(move || identities.actor_exists(&user_id))
        .await
        .map_err(ServiceError::from)
        .and_then(|lookup| lookup)
        .map_err(|e| {
            tracing::error!(user_id = %claims.sub, error = %e, "Identity lookup failed");
            AuthFailure::LookupFailed
        })?;

    if exists {
        Ok(claims.sub)
    } else {
        Err(AuthFailure::UnknownUser)
    }
}

/// GET /api/ws?token=JWT
/// WebSocket upgrade endpoint. Authenticates via query parameter.
/// On auth failure, upgrades then immediately closes with 4401 so the client
/// sees a close reason instead of a bare HTTP error.
/// On success, runs the connection actor.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsAuthQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    let mut session = Session::connecting(state.registry.clone(), ChannelHandle::new(tx.clone()));
    tracing::trace!(state = ?session.state(), "WebSocket upgrade requested");

    match authenticate(&state, params.token.as_deref()).await {
        Ok(user_id) => {
            session.authenticate(user_id.as_str());
            tracing::info!(
                user_id = %user_id,
                state = ?session.state(),
                "WebSocket connection authenticated"
            );
            ws.on_upgrade(move |socket| actor::run_connection(socket, session, tx, rx))
        }
        Err(failure) => {
            session.close();
            let reason = failure.reason();
            tracing::warn!(
                close_code = CLOSE_UNAUTHORIZED,
                reason = reason,
                "WebSocket auth failed"
            );

            ws.on_upgrade(move |mut socket| async move {
                let close_frame = CloseFrame {
                    code: CLOSE_UNAUTHORIZED,
                    reason: reason.into(),
                };
                let _ = socket.send(Message::Close(Some(close_frame))).await;
            })
        }
    }
}
