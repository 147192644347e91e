//! Session resolution for protected routes.
//!
//! [`require_session`] runs before the handler: it reads the session cookie,
//! loads the session (sliding its expiry), refreshes tokens that are about to
//! expire and stores the result as [`CurrentSession`] in the request
//! extensions. Requests without a live session are rejected with 401.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::AuthResult;
use crate::clock::Clock;
use crate::error::AuthError;
use crate::http::cookies::session_id_from_headers;
use crate::http::state::PortalState;
use crate::session::UserSession;

/// The live session of the current request.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub UserSession);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or_else(|| AuthError::unauthenticated("No active session"))
    }
}

/// Middleware rejecting requests without a live session.
///
/// # Errors
///
/// - `Unauthenticated` if the cookie is missing or the session is gone
/// - `Storage` if the session backend fails
pub async fn require_session(
    State(state): State<PortalState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let session = resolve_session(&state, request.headers())
        .await?
        .ok_or_else(|| AuthError::unauthenticated("No active session"))?;

    request.extensions_mut().insert(CurrentSession(session));
    Ok(next.run(request).await)
}

/// Loads the session named by the request cookie, if any.
///
/// Tokens inside the refresh window are refreshed on the way. A failed
/// refresh is logged and the session is returned with its current tokens.
///
/// # Errors
///
/// Returns `AuthError::Storage` if the session backend fails.
pub async fn resolve_session(
    state: &PortalState,
    headers: &HeaderMap,
) -> AuthResult<Option<UserSession>> {
    let Some(session_id) = session_id_from_headers(headers, &state.cookie) else {
        return Ok(None);
    };

    let Some(session) = state.sessions.get(&session_id).await? else {
        tracing::debug!(session_id = %session_id, "Session cookie without live session");
        return Ok(None);
    };

    Ok(Some(refresh_if_due(state, session).await))
}

async fn refresh_if_due(state: &PortalState, session: UserSession) -> UserSession {
    let now = state.sessions.clock().now_ms();
    if !session.should_refresh_token(state.sessions.refresh_threshold(), now) {
        return session;
    }
    let Some(refresh_token) = session.refresh_token.clone() else {
        return session;
    };

    let tokens = match state.tokens.refresh(&refresh_token).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(
                session_id = %session.session_id,
                error = %e,
                "Proactive token refresh failed, continuing with current tokens"
            );
            return session;
        }
    };

    match state.sessions.update_tokens(&session.session_id, tokens).await {
        Ok(Some(updated)) => {
            tracing::info!(session_id = %updated.session_id, "Tokens refreshed proactively");
            updated
        }
        Ok(None) => session,
        Err(e) => {
            tracing::warn!(
                session_id = %session.session_id,
                error = %e,
                "Failed to store refreshed tokens"
            );
            session
        }
    }
}
