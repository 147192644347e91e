//! # portal-auth
//!
//! Session and access-decision engine for the member portal backend.
//!
//! This crate provides:
//! - OAuth 2.0 authorization-code (PKCE) login against the identity provider
//! - Server-side sessions keyed by an opaque cookie
//! - Cached, resilient clients for the two identity gateways
//! - The access decision engine deciding which members' records are viewable
//!
//! ## Overview
//!
//! The browser never sees a token. After login it holds an HTTP-only session
//! cookie; tokens and the memoized [`AccessDecision`] live in the session
//! backend. Every upstream failure narrows access rather than widening it.
//!
//! ## Modules
//!
//! - [`config`] - Typed configuration with defaults and validation
//! - [`clock`] - Injectable time source
//! - [`resilience`] - Retry and circuit breaking around outbound calls
//! - [`oauth`] - Token exchange, refresh, revocation and userinfo
//! - [`gateway`] - Biometric and relationship gateways with TTL caches
//! - [`decision`] - Access decision engine and capability checks
//! - [`session`] - Session store and backends
//! - [`middleware`] - Session middleware and error responses
//! - [`http`] - Axum handlers under `/api/auth`

pub mod clock;
pub mod config;
pub mod decision;
pub mod error;
pub mod gateway;
pub mod http;
pub mod middleware;
pub mod oauth;
pub mod resilience;
pub mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ConfigError, CookieConfig, GatewayConfig, IdpConfig, PortalAuthConfig, ResilienceConfig,
    SameSitePolicy, SessionConfig,
};
pub use decision::{
    AccessDecision, AccessDecisionEngine, AccessMode, ApplicationType, BiometricSource,
    OwnerAccess, PersonaTag, RelationshipSource,
};
pub use error::{AuthError, AuthResult, ErrorCategory, UpstreamError};
pub use gateway::{
    AccessLevelResponse, BiometricGateway, BiometricInfo, MemberRef, RelationshipGateway,
    SupportedMember,
};
pub use http::{PortalState, router};
pub use middleware::{CurrentSession, require_session};
pub use oauth::{Identity, TokenManager, TokenSet, TokenTypeHint};
pub use resilience::{BreakerState, ResilientClient};
pub use session::{
    MemorySessionBackend, RedisSessionBackend, SessionBackend, SessionStore, UserSession,
};

/// Prelude module for convenient imports.
///
/// ```ignore
/// use portal_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::{ConfigError, PortalAuthConfig};
    pub use crate::decision::{AccessDecision, AccessMode, ApplicationType, OwnerAccess};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::http::{PortalState, router};
    pub use crate::middleware::{CurrentSession, require_session};
    pub use crate::session::{SessionBackend, SessionStore, UserSession};
}
