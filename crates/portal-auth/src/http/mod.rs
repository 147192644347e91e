//! HTTP surface of the portal authentication layer.
//!
//! # Routes
//!
//! | Method | Path | Session |
//! |---|---|---|
//! | POST | `/api/auth/token` | creates |
//! | GET | `/api/auth/user` | required |
//! | POST | `/api/auth/refresh` | required |
//! | POST | `/api/auth/logout` | optional |
//! | GET | `/api/auth/session` | optional |
//! | GET | `/api/auth/access-decision` | required |

pub mod access;
pub mod auth;
pub mod cookies;
pub mod state;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

pub use access::access_decision_handler;
pub use auth::{
    LoginResponse, LogoutResponse, RefreshResponse, SessionInfoResponse, TokenExchangeRequest,
    logout_handler, refresh_handler, session_info_handler, token_handler, user_handler,
};
pub use cookies::{clear_session_cookie, session_cookie, session_id_from_headers};
pub use state::{DecisionEngine, PortalState};

use crate::middleware::require_session;

/// Builds the `/api/auth` routes.
pub fn router(state: PortalState) -> Router {
    let protected = Router::new()
        .route("/user", get(user_handler))
        .route("/refresh", post(refresh_handler))
        .route("/access-decision", get(access_decision_handler))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let public = Router::new()
        .route("/token", post(token_handler))
        .route("/logout", post(logout_handler))
        .route("/session", get(session_info_handler));

    Router::new()
        .nest("/api/auth", public.merge(protected))
        .with_state(state)
}
