//! HTTP rendering of [`AuthError`].
//!
//! Every error becomes a JSON body of the form
//! `{"timestamp", "status", "error", "message"}`. Server-side failures never
//! expose their internal message to the browser.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::clock::{Clock, SystemClock, format_rfc3339};
use crate::error::AuthError;

/// `WWW-Authenticate` challenge sent with every 401.
pub const SESSION_CHALLENGE: &str = "Session realm=\"portal\"";

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_for(&self);

        if status.is_server_error() {
            tracing::error!(category = %self.category(), error = %self, "Request failed");
        } else {
            tracing::debug!(category = %self.category(), error = %self, "Request rejected");
        }

        let body = error_body(status, &public_message(&self, status));
        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(SESSION_CHALLENGE),
            );
        }

        response
    }
}

/// HTTP status for an error.
#[must_use]
pub fn status_for(error: &AuthError) -> StatusCode {
    match error {
        AuthError::Unauthenticated { .. }
        | AuthError::InvalidGrant { .. }
        | AuthError::IdentityProvider { .. } => StatusCode::UNAUTHORIZED,
        AuthError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
        AuthError::AccessDenied { .. } => StatusCode::FORBIDDEN,
        AuthError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        AuthError::Storage { .. }
        | AuthError::Configuration { .. }
        | AuthError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn public_message(error: &AuthError, status: StatusCode) -> String {
    if status == StatusCode::BAD_GATEWAY {
        return "An upstream service is unavailable".to_string();
    }
    if status.is_server_error() {
        return "An internal error occurred".to_string();
    }

    match error {
        AuthError::Unauthenticated { message }
        | AuthError::InvalidGrant { message }
        | AuthError::IdentityProvider { message }
        | AuthError::InvalidRequest { message }
        | AuthError::AccessDenied { message }
        | AuthError::Upstream { message, .. }
        | AuthError::Storage { message }
        | AuthError::Configuration { message }
        | AuthError::Internal { message } => message.clone(),
    }
}

/// Builds the JSON error body.
#[must_use]
pub fn error_body(status: StatusCode, message: &str) -> serde_json::Value {
    json!({
        "timestamp": format_rfc3339(SystemClock.now_ms()),
        "status": status.as_u16(),
        "error": status.canonical_reason().unwrap_or("Error"),
        "message": message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_unauthenticated_response() {
        let response = AuthError::unauthenticated("No active session").into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            SESSION_CHALLENGE
        );

        let json = body_json(response).await;
        assert_eq!(json["status"], 401);
        assert_eq!(json["error"], "Unauthorized");
        assert_eq!(json["message"], "No active session");
        assert!(json["timestamp"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn test_identity_provider_outage_is_unauthenticated() {
        let response = AuthError::identity_provider("Token endpoint unavailable").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_request_has_no_challenge() {
        let response = AuthError::invalid_request("No member id available").into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_access_denied_response() {
        let response = AuthError::access_denied("No digital account access").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_server_error_hides_details() {
        let response = AuthError::storage("redis://secret-host refused connection").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["message"], "An internal error occurred");
        assert!(!json.to_string().contains("secret-host"));
    }

    #[tokio::test]
    async fn test_upstream_error_is_bad_gateway() {
        let response = AuthError::upstream("biometric", "connection refused").into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Bad Gateway");
        assert!(!json["message"].as_str().unwrap().contains("refused"));
    }
}
