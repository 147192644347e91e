//! Shared state of the portal authentication routes.

use std::sync::Arc;

use crate::AuthResult;
use crate::clock::Clock;
use crate::config::{CookieConfig, PortalAuthConfig};
use crate::decision::{AccessDecisionEngine, BiometricSource, RelationshipSource};
use crate::gateway::{BiometricGateway, RelationshipGateway};
use crate::oauth::TokenManager;
use crate::session::{SessionBackend, SessionStore};

/// Decision engine over type-erased gateways.
pub type DecisionEngine =
    AccessDecisionEngine<Arc<dyn BiometricSource>, Arc<dyn RelationshipSource>>;

/// State required by the auth handlers and the session middleware.
#[derive(Clone)]
pub struct PortalState {
    /// Client of the identity provider.
    pub tokens: Arc<TokenManager>,

    /// Session lifecycle over the configured backend.
    pub sessions: SessionStore,

    /// Access decision engine.
    pub engine: Arc<DecisionEngine>,

    /// Biometric gateway, shared with the engine.
    pub biometric: Arc<BiometricGateway>,

    /// Relationship gateway, shared with the engine.
    pub relationships: Arc<RelationshipGateway>,

    /// Session cookie attributes.
    pub cookie: CookieConfig,
}

impl PortalState {
    /// Wires the token manager, both gateways, the engine and the session
    /// store from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if an HTTP client cannot be built.
    pub fn from_config(
        config: &PortalAuthConfig,
        backend: Arc<dyn SessionBackend>,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        let tokens = TokenManager::new(config.idp.clone(), clock.clone())?;
        let biometric = Arc::new(BiometricGateway::new(&config.biometric, clock.clone())?);
        let relationships =
            Arc::new(RelationshipGateway::new(&config.relationships, clock.clone())?);
        let engine = AccessDecisionEngine::new(
            biometric.clone() as Arc<dyn BiometricSource>,
            relationships.clone() as Arc<dyn RelationshipSource>,
            clock.clone(),
        );

        tracing::debug!(backend = backend.name(), "Portal auth state initialised");

        Ok(Self {
            tokens: Arc::new(tokens),
            sessions: SessionStore::new(backend, config.session.clone(), clock.clone()),
            engine: Arc::new(engine),
            biometric,
            relationships,
            cookie: config.cookie.clone(),
        })
    }
}
