//! HTTP middleware for session-authenticated routes.
//!
//! - [`require_session`] resolves the session cookie before handlers run
//! - [`CurrentSession`] extracts the resolved session in handlers
//! - `AuthError` renders as a JSON error response
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware::from_fn_with_state, routing::get};
//! use portal_auth::middleware::{CurrentSession, require_session};
//!
//! async fn whoami(CurrentSession(session): CurrentSession) -> String {
//!     session.user.id
//! }
//!
//! let app = Router::new()
//!     .route("/whoami", get(whoami))
//!     .layer(from_fn_with_state(state.clone(), require_session))
//!     .with_state(state);
//! ```

pub mod error;
pub mod session;

pub use error::{SESSION_CHALLENGE, error_body, status_for};
pub use session::{CurrentSession, require_session, resolve_session};
