//! Login, refresh, logout and session endpoints under `/api/auth`.
//!
//! # Flow
//!
//! 1. The browser completes the authorization redirect and receives a code
//! 2. It posts the code and its PKCE verifier to `POST /api/auth/token`
//! 3. The code is exchanged, the identity fetched, an initial consumer access
//!    decision computed and a session created
//! 4. The response sets the HTTP-only session cookie
//!
//! Tokens never leave the server; the browser only holds the session id.

use axum::{
    Json,
    extract::State,
    http::HeaderMap,
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::decision::{AccessMode, ApplicationType};
use crate::error::{AuthError, AuthResult};
use crate::http::cookies::{clear_session_cookie, session_cookie, session_id_from_headers};
use crate::http::state::PortalState;
use crate::middleware::CurrentSession;
use crate::oauth::{Identity, TokenTypeHint};
use crate::session::UserSession;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Body of `POST /api/auth/token`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeRequest {
    pub code: String,
    pub code_verifier: String,
    /// Overrides the configured redirect URI.
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

/// Response of a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: Identity,
    /// Session expiry, epoch milliseconds.
    pub expires_at: i64,
    pub session_id: String,
}

/// Response of `POST /api/auth/refresh`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub expires_at: i64,
    pub success: bool,
}

/// Response of `POST /api/auth/logout`.
#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

/// Response of `GET /api/auth/session`.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfoResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_in_seconds: Option<i64>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Handler for `POST /api/auth/token`.
///
/// The initial consumer decision is best effort: when it cannot be made the
/// session is created without one and the decision is computed on first use.
///
/// # Errors
///
/// - `InvalidRequest` for an empty code or malformed verifier
/// - `InvalidGrant` / `IdentityProvider` (401) when the provider rejects the
///   code or is unavailable
/// - `Storage` if the session cannot be saved
pub async fn token_handler(
    State(state): State<PortalState>,
    jar: CookieJar,
    Json(request): Json<TokenExchangeRequest>,
) -> AuthResult<(CookieJar, Json<LoginResponse>)> {
    tracing::info!("Token exchange request received");

    let tokens = state
        .tokens
        .exchange_code(
            &request.code,
            &request.code_verifier,
            request.redirect_uri.as_deref(),
        )
        .await?;
    let user = state.tokens.fetch_user_info(&tokens.access_token).await?;

    let now = state.tokens.clock().now_ms();
    let mut session = UserSession::new(user, tokens, now);

    match session.user.member_id() {
        Some(member_id) => {
            let decision = state
                .engine
                .decide(&member_id, ApplicationType::Consumer)
                .await;
            tracing::info!(
                access_mode = %decision.access_mode,
                reason = %decision.decision_reason,
                "Initial access decision"
            );
            if decision.access_mode != AccessMode::NoAccess {
                session.access_decision = Some(decision);
            }
        }
        None => tracing::warn!("No member id in identity, skipping initial access decision"),
    }

    let session = state.sessions.create(session).await?;
    let cookie = session_cookie(&state.cookie, &session.session_id, state.sessions.timeout());

    tracing::info!(user_id = %session.user.id, "Login successful");
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            expires_at: session.expires_at,
            session_id: session.session_id,
            user: session.user,
        }),
    ))
}

/// Handler for `GET /api/auth/user`.
pub async fn user_handler(CurrentSession(session): CurrentSession) -> Json<Identity> {
    Json(session.user)
}

/// Handler for `POST /api/auth/refresh`.
///
/// Refreshes the tokens and extends the session.
///
/// # Errors
///
/// Returns 401 when there is no refresh token or the provider rejects it.
pub async fn refresh_handler(
    State(state): State<PortalState>,
    CurrentSession(session): CurrentSession,
) -> AuthResult<Json<RefreshResponse>> {
    let refresh_token = session
        .refresh_token
        .as_deref()
        .ok_or_else(|| AuthError::invalid_grant("Session has no refresh token"))?;

    let tokens = state.tokens.refresh(refresh_token).await?;
    state
        .sessions
        .update_tokens(&session.session_id, tokens)
        .await?
        .ok_or_else(|| AuthError::unauthenticated("Session ended during refresh"))?;
    let extended = state
        .sessions
        .extend(&session.session_id)
        .await?
        .ok_or_else(|| AuthError::unauthenticated("Session ended during refresh"))?;

    tracing::info!(session_id = %extended.session_id, "Session refreshed");
    Ok(Json(RefreshResponse {
        expires_at: extended.expires_at,
        success: true,
    }))
}

/// Handler for `POST /api/auth/logout`.
///
/// Always succeeds: token revocation is best effort, and a missing session or
/// a failing backend only gets logged. The cookie is cleared either way.
pub async fn logout_handler(
    State(state): State<PortalState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    if let Some(session_id) = session_id_from_headers(&headers, &state.cookie) {
        match state.sessions.get(&session_id).await {
            Ok(Some(session)) => end_session(&state, session).await,
            Ok(None) => tracing::debug!(session_id = %session_id, "Logout without live session"),
            Err(e) => tracing::warn!(
                session_id = %session_id,
                error = %e,
                "Failed to load session for logout"
            ),
        }
    }

    (
        jar.add(clear_session_cookie(&state.cookie)),
        Json(LogoutResponse {
            message: "Logged out successfully".to_string(),
        }),
    )
}

async fn end_session(state: &PortalState, session: UserSession) {
    let revoke_access = state
        .tokens
        .revoke(&session.access_token, TokenTypeHint::AccessToken);
    let revoke_refresh = async {
        if let Some(refresh_token) = session.refresh_token.as_deref() {
            state
                .tokens
                .revoke(refresh_token, TokenTypeHint::RefreshToken)
                .await;
        }
    };
    tokio::join!(revoke_access, revoke_refresh);

    if let Err(e) = state.sessions.delete(&session.session_id).await {
        tracing::warn!(
            session_id = %session.session_id,
            error = %e,
            "Failed to delete session on logout"
        );
    }
    tracing::info!(user_id = %session.user.id, "User logged out");
}

/// Handler for `GET /api/auth/session`.
///
/// Public: reports `isValid: false` instead of failing when there is no
/// session.
///
/// # Errors
///
/// Returns `Storage` if the session backend fails.
pub async fn session_info_handler(
    State(state): State<PortalState>,
    headers: HeaderMap,
) -> AuthResult<Json<SessionInfoResponse>> {
    let Some(session_id) = session_id_from_headers(&headers, &state.cookie) else {
        return Ok(Json(SessionInfoResponse::default()));
    };
    let Some(session) = state.sessions.get(&session_id).await? else {
        return Ok(Json(SessionInfoResponse::default()));
    };

    let now = state.sessions.clock().now_ms();
    let refresh_in_seconds = session.refresh_in_seconds(state.sessions.refresh_threshold(), now);

    Ok(Json(SessionInfoResponse {
        expires_at: Some(session.expires_at),
        is_valid: true,
        refresh_in_seconds: Some(refresh_in_seconds),
        user: Some(session.user),
    }))
}
