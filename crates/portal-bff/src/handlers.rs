use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use portal_auth::PortalState;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub session_backend: &'static str,
    pub session_backend_status: &'static str,
    pub identity_provider: &'static str,
    pub circuits: CircuitReport,
}

/// Breaker state per upstream.
#[derive(Serialize)]
pub struct CircuitReport {
    pub idp: &'static str,
    pub biometric: &'static str,
    pub relationships: &'static str,
}

/// Liveness: the process is serving requests.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

/// Readiness: the session backend answers a ping and the identity provider
/// is reachable. Gateway circuits are reported only; an open one does not
/// fail readiness.
pub async fn ready(State(state): State<PortalState>) -> impl IntoResponse {
    let backend = state.sessions.backend();
    let (backend_check, idp_check) = tokio::join!(backend.ping(), state.tokens.check_reachable());

    if let Err(e) = &backend_check {
        tracing::warn!(backend = backend.name(), error = %e, "Session backend not ready");
    }
    if let Err(e) = &idp_check {
        tracing::warn!(error = %e, "Identity provider not ready");
    }

    let ready = backend_check.is_ok() && idp_check.is_ok();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            status: if ready { "ready" } else { "unavailable" },
            session_backend: backend.name(),
            session_backend_status: if backend_check.is_ok() { "up" } else { "down" },
            identity_provider: if idp_check.is_ok() {
                "reachable"
            } else {
                "unreachable"
            },
            circuits: CircuitReport {
                idp: state.tokens.breaker_state().as_str(),
                biometric: state.biometric.breaker_state().as_str(),
                relationships: state.relationships.breaker_state().as_str(),
            },
        }),
    )
}
