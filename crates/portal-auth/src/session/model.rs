//! Server-side session record.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::duration_ms;
use crate::decision::AccessDecision;
use crate::oauth::{Identity, TokenSet};

/// Working state of an authenticated member.
///
/// Timestamps are epoch milliseconds. The session id is assigned by the
/// store on creation.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub session_id: String,
    pub user: Identity,
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub access_token_expires_at: i64,
    pub created_at: i64,
    pub last_accessed_at: i64,
    pub expires_at: i64,
    /// Memoized decision for the last requested application.
    #[serde(default)]
    pub access_decision: Option<AccessDecision>,
}

impl UserSession {
    /// Builds an unsaved session from a fresh login.
    #[must_use]
    pub fn new(user: Identity, tokens: TokenSet, now_ms: i64) -> Self {
        Self {
            session_id: String::new(),
            user,
            access_token_expires_at: tokens.expires_at_ms(now_ms),
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            created_at: now_ms,
            last_accessed_at: now_ms,
            expires_at: now_ms,
            access_decision: None,
        }
    }

    /// Replaces the tokens after a refresh.
    ///
    /// Providers that do not rotate refresh tokens omit them from the refresh
    /// response; the previous refresh and ID tokens are kept in that case.
    pub fn apply_tokens(&mut self, tokens: TokenSet, now_ms: i64) {
        self.access_token_expires_at = tokens.expires_at_ms(now_ms);
        self.access_token = tokens.access_token;
        self.token_type = tokens.token_type;
        if tokens.refresh_token.is_some() {
            self.refresh_token = tokens.refresh_token;
        }
        if tokens.id_token.is_some() {
            self.id_token = tokens.id_token;
        }
    }

    /// A session past its expiry is logically absent.
    #[must_use]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at
    }

    /// Returns `true` if the access token expires within `threshold` and can
    /// be refreshed.
    #[must_use]
    pub fn should_refresh_token(&self, threshold: Duration, now_ms: i64) -> bool {
        self.refresh_token.is_some()
            && self.access_token_expires_at - now_ms <= duration_ms(threshold)
    }

    /// Seconds until the access token enters the refresh window, never negative.
    #[must_use]
    pub fn refresh_in_seconds(&self, threshold: Duration, now_ms: i64) -> i64 {
        let until_expiry = (self.access_token_expires_at - now_ms) / 1000;
        (until_expiry - duration_ms(threshold) / 1000).max(0)
    }
}

impl fmt::Debug for UserSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSession")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user.id)
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("access_token_expires_at", &self.access_token_expires_at)
            .field("created_at", &self.created_at)
            .field("last_accessed_at", &self.last_accessed_at)
            .field("expires_at", &self.expires_at)
            .field(
                "access_mode",
                &self.access_decision.as_ref().map(|d| d.access_mode),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(refresh: Option<&str>) -> TokenSet {
        TokenSet {
            access_token: "at-1".into(),
            token_type: "Bearer".into(),
            expires_in: Some(600),
            refresh_token: refresh.map(str::to_string),
            id_token: Some("id-1".into()),
            scope: None,
        }
    }

    fn identity() -> Identity {
        Identity {
            id: "user-1".into(),
            ..Identity::default()
        }
    }

    #[test]
    fn test_new_session_token_expiry() {
        let session = UserSession::new(identity(), tokens(Some("rt-1")), 1_000);
        assert_eq!(session.access_token_expires_at, 601_000);
        assert_eq!(session.created_at, 1_000);
        assert!(session.access_decision.is_none());
    }

    #[test]
    fn test_should_refresh_token() {
        let session = UserSession::new(identity(), tokens(Some("rt-1")), 0);
        let threshold = Duration::from_secs(300);

        assert!(!session.should_refresh_token(threshold, 299_000));
        assert!(session.should_refresh_token(threshold, 300_000));
        assert!(session.should_refresh_token(threshold, 700_000));

        let no_refresh = UserSession::new(identity(), tokens(None), 0);
        assert!(!no_refresh.should_refresh_token(threshold, 700_000));
    }

    #[test]
    fn test_refresh_in_seconds() {
        let session = UserSession::new(identity(), tokens(Some("rt-1")), 0);
        let threshold = Duration::from_secs(300);
        assert_eq!(session.refresh_in_seconds(threshold, 0), 300);
        assert_eq!(session.refresh_in_seconds(threshold, 400_000), 0);
    }

    #[test]
    fn test_apply_tokens_keeps_refresh_token_when_not_rotated() {
        let mut session = UserSession::new(identity(), tokens(Some("rt-1")), 0);
        let mut refreshed = tokens(None);
        refreshed.access_token = "at-2".into();
        refreshed.id_token = None;
        session.apply_tokens(refreshed, 10_000);

        assert_eq!(session.access_token, "at-2");
        assert_eq!(session.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(session.id_token.as_deref(), Some("id-1"));
        assert_eq!(session.access_token_expires_at, 610_000);
    }

    #[test]
    fn test_expiry_boundary() {
        let mut session = UserSession::new(identity(), tokens(None), 0);
        session.expires_at = 5_000;
        assert!(!session.is_expired(5_000));
        assert!(session.is_expired(5_001));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let session = UserSession::new(identity(), tokens(Some("rt-secret")), 0);
        let debug = format!("{session:?}");
        assert!(!debug.contains("at-1"));
        assert!(!debug.contains("rt-secret"));
    }
}
