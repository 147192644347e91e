//! Authorization-code exchange, refresh, revocation and userinfo against the
//! identity provider.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clock::Clock;
use crate::config::IdpConfig;
use crate::error::{AuthError, AuthResult, UpstreamError};
use crate::oauth::identity::Identity;
use crate::oauth::pkce::validate_code_verifier;
use crate::resilience::{BreakerState, ResilientClient, read_json};

/// Lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Upper bound on a reachability check of the provider.
const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(2);

/// Tokens returned by the token endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Access token lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub id_token: Option<String>,

    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenSet {
    /// Access token lifetime, defaulting to one hour.
    #[must_use]
    pub fn expires_in_secs(&self) -> u64 {
        self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS)
    }

    /// Absolute access token expiry for tokens issued at `now_ms`.
    #[must_use]
    pub fn expires_at_ms(&self, now_ms: i64) -> i64 {
        let lifetime_ms = i64::try_from(self.expires_in_secs())
            .unwrap_or(i64::MAX / 1000)
            .saturating_mul(1000);
        now_ms.saturating_add(lifetime_ms)
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .field("scope", &self.scope)
            .finish()
    }
}

/// `token_type_hint` values for revocation (RFC 7009).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenTypeHint {
    AccessToken,
    RefreshToken,
}

impl TokenTypeHint {
    /// Wire value of the hint.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccessToken => "access_token",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// Error body of an OAuth 2.0 token endpoint.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Client of the identity provider.
///
/// Stateless apart from its configuration. The client secret is sent in the
/// form body. Nothing here falls back to a default: a provider outage always
/// surfaces as an authentication failure.
#[derive(Debug)]
pub struct TokenManager {
    config: IdpConfig,
    http: reqwest::Client,
    resilience: ResilientClient,
    clock: Arc<dyn Clock>,
}

impl TokenManager {
    /// Creates a token manager.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: IdpConfig, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::configuration(format!("Failed to create HTTP client: {e}")))?;
        let resilience = ResilientClient::from_config("idp", &config.resilience, clock.clone());

        Ok(Self {
            config,
            http,
            resilience,
            clock,
        })
    }

    /// The clock used to stamp token expiry.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Breaker state of the provider.
    pub fn breaker_state(&self) -> BreakerState {
        self.resilience.breaker_state()
    }

    /// Checks that the provider answers on its token endpoint.
    ///
    /// Any HTTP response counts as reachable; the status is not inspected.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::IdentityProvider` on a connection failure or timeout.
    pub async fn check_reachable(&self) -> AuthResult<()> {
        let response = self
            .http
            .get(&self.config.token_url)
            .timeout(REACHABILITY_TIMEOUT)
            .send()
            .await
            .map_err(|e| AuthError::identity_provider(format!("Provider unreachable: {e}")))?;

        tracing::trace!(status = response.status().as_u16(), "Provider reachable");
        Ok(())
    }

    /// Exchanges an authorization code (with PKCE verifier) for tokens.
    ///
    /// `redirect_uri` defaults to the configured one.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for an empty code or malformed verifier (no upstream call)
    /// - `InvalidGrant` if the provider rejects the code or verifier
    /// - `IdentityProvider` if the provider is unreachable or failing
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
        redirect_uri: Option<&str>,
    ) -> AuthResult<TokenSet> {
        if code.trim().is_empty() {
            return Err(AuthError::invalid_request("Authorization code is required"));
        }
        validate_code_verifier(code_verifier)?;

        let redirect_uri = redirect_uri.unwrap_or(&self.config.redirect_uri);
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code_verifier", code_verifier),
        ];
        let form = &form[..];

        let tokens = self
            .resilience
            .call(move || self.post_token(form))
            .await
            .map_err(token_endpoint_error)?;

        tracing::debug!(
            expires_in = tokens.expires_in_secs(),
            has_refresh_token = tokens.refresh_token.is_some(),
            "Authorization code exchanged"
        );
        Ok(tokens)
    }

    /// Exchanges a refresh token for a new token set.
    ///
    /// # Errors
    ///
    /// - `InvalidGrant` if the refresh token is invalid or expired
    /// - `IdentityProvider` if the provider is unreachable or failing
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenSet> {
        if refresh_token.is_empty() {
            return Err(AuthError::invalid_grant("No refresh token available"));
        }

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        // Refresh tokens may rotate on use, so a refresh is never replayed.
        let tokens = self
            .post_token(&form)
            .await
            .map_err(token_endpoint_error)?;

        tracing::debug!(expires_in = tokens.expires_in_secs(), "Tokens refreshed");
        Ok(tokens)
    }

    /// Revokes a token. Best effort: failures are logged and swallowed.
    pub async fn revoke(&self, token: &str, hint: TokenTypeHint) {
        let url = self.config.revoke_endpoint();
        let form = [
            ("token", token),
            ("token_type_hint", hint.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        match self.http.post(&url).form(&form).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(hint = hint.as_str(), "Token revoked");
            }
            Ok(response) => {
                tracing::warn!(
                    hint = hint.as_str(),
                    status = response.status().as_u16(),
                    "Token revocation rejected, continuing"
                );
            }
            Err(e) => {
                tracing::warn!(
                    hint = hint.as_str(),
                    error = %e,
                    "Token revocation failed, continuing"
                );
            }
        }
    }

    /// Fetches the userinfo claims and maps them to an [`Identity`].
    ///
    /// # Errors
    ///
    /// - `InvalidGrant` if the provider rejects the access token
    /// - `IdentityProvider` if the provider is unreachable or the claims are unusable
    pub async fn fetch_user_info(&self, access_token: &str) -> AuthResult<Identity> {
        let url = self.config.userinfo_url.as_str();
        let http = &self.http;

        let claims: Map<String, Value> = self
            .resilience
            .call(move || async move {
                let response = http.get(url).bearer_auth(access_token).send().await?;
                read_json::<Map<String, Value>>(response).await
            })
            .await
            .map_err(|err| {
                if err.is_client_error() {
                    AuthError::invalid_grant("Access token rejected by userinfo endpoint")
                } else {
                    AuthError::identity_provider(format!("Userinfo request failed: {err}"))
                }
            })?;

        Identity::from_claims(claims)
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> Result<TokenSet, UpstreamError> {
        let response = self
            .http
            .post(&self.config.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await?;
        read_json(response).await
    }
}

fn token_endpoint_error(err: UpstreamError) -> AuthError {
    match err {
        UpstreamError::Status { status, body } if (400..500).contains(&status) && status != 429 => {
            let detail = serde_json::from_str::<OAuthErrorBody>(&body)
                .map(|e| match e.error_description {
                    Some(desc) => format!("{}: {desc}", e.error),
                    None => e.error,
                })
                .unwrap_or_else(|_| format!("token endpoint returned {status}"));
            AuthError::invalid_grant(detail)
        }
        other => AuthError::identity_provider(format!("Token endpoint unavailable: {other}")),
    }
}
