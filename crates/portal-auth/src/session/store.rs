//! Session lifecycle: create, sliding reads, token and decision updates.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::AuthResult;
use crate::clock::{Clock, duration_ms};
use crate::config::SessionConfig;
use crate::decision::AccessDecision;
use crate::error::AuthError;
use crate::oauth::TokenSet;
use crate::session::{SessionBackend, UserSession};

/// Owner of all [`UserSession`] records.
///
/// Every mutation is a read-modify-write against the backend without
/// compare-and-swap; concurrent writers to one session race and the last
/// write wins.
#[derive(Debug, Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    config: SessionConfig,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            config,
            clock,
        }
    }

    /// Idle timeout applied on every read.
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Window before access-token expiry in which tokens are refreshed.
    pub fn refresh_threshold(&self) -> Duration {
        self.config.refresh_threshold
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn backend(&self) -> &Arc<dyn SessionBackend> {
        &self.backend
    }

    /// Persists a new session under a fresh random id.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend write fails.
    pub async fn create(&self, mut session: UserSession) -> AuthResult<UserSession> {
        let now = self.clock.now_ms();
        session.session_id = Uuid::new_v4().to_string();
        session.created_at = now;
        session.last_accessed_at = now;
        session.expires_at = now + duration_ms(self.config.timeout);

        self.persist(&session, now).await?;
        tracing::info!(
            session_id = %session.session_id,
            user_id = %session.user.id,
            "Session created"
        );
        Ok(session)
    }

    /// Returns the live session and slides its expiry.
    ///
    /// An expired session is deleted and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend fails.
    pub async fn get(&self, session_id: &str) -> AuthResult<Option<UserSession>> {
        let Some(mut session) = self.load_live(session_id).await? else {
            return Ok(None);
        };

        let now = self.clock.now_ms();
        session.last_accessed_at = now;
        session.expires_at = session
            .expires_at
            .max(now + duration_ms(self.config.timeout));
        self.persist(&session, now).await?;
        Ok(Some(session))
    }

    /// Pushes the expiry to `now + timeout` without other changes.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend fails.
    pub async fn extend(&self, session_id: &str) -> AuthResult<Option<UserSession>> {
        self.modify(session_id, |session, now, timeout_ms| {
            session.expires_at = session.expires_at.max(now + timeout_ms);
        })
        .await
    }

    /// Stores refreshed tokens.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend fails.
    pub async fn update_tokens(
        &self,
        session_id: &str,
        tokens: TokenSet,
    ) -> AuthResult<Option<UserSession>> {
        self.modify(session_id, move |session, now, _| {
            session.apply_tokens(tokens, now);
        })
        .await
    }

    /// Replaces the memoized access decision.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend fails.
    pub async fn update_access_decision(
        &self,
        session_id: &str,
        decision: AccessDecision,
    ) -> AuthResult<Option<UserSession>> {
        self.modify(session_id, move |session, _, _| {
            session.access_decision = Some(decision);
        })
        .await
    }

    /// Drops the memoized access decision.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend fails.
    pub async fn clear_access_decision(&self, session_id: &str) -> AuthResult<Option<UserSession>> {
        self.modify(session_id, |session, _, _| {
            session.access_decision = None;
        })
        .await
    }

    /// Removes a session. Deleting an unknown id succeeds.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend fails.
    pub async fn delete(&self, session_id: &str) -> AuthResult<()> {
        self.backend.delete(&self.key(session_id)).await?;
        tracing::info!(session_id = %session_id, "Session deleted");
        Ok(())
    }

    async fn modify<F>(&self, session_id: &str, apply: F) -> AuthResult<Option<UserSession>>
    where
        F: FnOnce(&mut UserSession, i64, i64) + Send,
    {
        let Some(mut session) = self.load_live(session_id).await? else {
            return Ok(None);
        };

        let now = self.clock.now_ms();
        apply(&mut session, now, duration_ms(self.config.timeout));
        self.persist(&session, now).await?;
        Ok(Some(session))
    }

    /// Loads a session, purging it when expired or unreadable.
    async fn load_live(&self, session_id: &str) -> AuthResult<Option<UserSession>> {
        if session_id.is_empty() {
            return Ok(None);
        }

        let key = self.key(session_id);
        let Some(bytes) = self.backend.get(&key).await? else {
            return Ok(None);
        };

        let session: UserSession = match serde_json::from_slice(&bytes) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "Discarding unreadable session"
                );
                self.backend.delete(&key).await?;
                return Ok(None);
            }
        };

        if session.is_expired(self.clock.now_ms()) {
            tracing::debug!(session_id = %session_id, "Session expired");
            self.backend.delete(&key).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn persist(&self, session: &UserSession, now: i64) -> AuthResult<()> {
        let bytes = serde_json::to_vec(session)
            .map_err(|e| AuthError::internal(format!("Failed to serialize session: {e}")))?;
        let remaining_ms = (session.expires_at - now).max(1_000);
        let ttl = Duration::from_millis(u64::try_from(remaining_ms).unwrap_or(1_000));
        self.backend
            .put(&self.key(&session.session_id), bytes, ttl)
            .await
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}{}", self.config.key_prefix, session_id)
    }
}
