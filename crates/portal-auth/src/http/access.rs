//! Access decision endpoint.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::decision::{AccessDecision, ApplicationType};
use crate::error::AuthResult;
use crate::http::state::PortalState;
use crate::middleware::CurrentSession;

/// Query of `GET /api/auth/access-decision`.
#[derive(Debug, Default, Deserialize)]
pub struct AccessDecisionParams {
    /// Application type; unknown or missing values mean the consumer portal.
    #[serde(default)]
    pub app: Option<String>,
}

/// Handler for `GET /api/auth/access-decision?app=`.
///
/// Reuses the session's decision when it was made for the same application
/// and recomputes it otherwise.
///
/// # Errors
///
/// - `InvalidRequest` (400) if no member id can be derived from the session
/// - `Storage` if the decision cannot be stored
pub async fn access_decision_handler(
    State(state): State<PortalState>,
    CurrentSession(session): CurrentSession,
    Query(params): Query<AccessDecisionParams>,
) -> AuthResult<Json<AccessDecision>> {
    let application = ApplicationType::from_query(params.app.as_deref());
    let decision = state
        .engine
        .decide_for_session(&state.sessions, &session, application)
        .await?;

    tracing::info!(
        session_id = %session.session_id,
        application = %application,
        access_mode = %decision.access_mode,
        "Access decision served"
    );
    Ok(Json(decision))
}
