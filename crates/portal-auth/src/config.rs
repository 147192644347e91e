//! Session and access-decision configuration.
//!
//! All sections deserialize with `#[serde(default)]` so a partial TOML table
//! only overrides the keys it names. Durations use `humantime` notation
//! (`"30m"`, `"100ms"`).
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth.idp]
//! token_url = "https://idp.example.com/oauth2/token"
//! userinfo_url = "https://idp.example.com/oauth2/userinfo"
//! client_id = "member-portal"
//! client_secret = "change-me"
//!
//! [auth.session]
//! timeout = "30m"
//! refresh_threshold = "5m"
//!
//! [auth.biometric]
//! token_url = "https://us.example.com/oauth2/token"
//! resource_url = "https://us.example.com/v1/biometric"
//! client_id = "portal-bff"
//! client_secret = "change-me"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration of the session and access-decision engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalAuthConfig {
    /// Identity provider (authorization-code + PKCE) settings.
    pub idp: IdpConfig,

    /// Server-side session lifetime settings.
    pub session: SessionConfig,

    /// Session cookie attributes.
    pub cookie: CookieConfig,

    /// First identity gateway (biometric and persona facts).
    pub biometric: GatewayConfig,

    /// Second identity gateway (supported-member relationships).
    pub relationships: GatewayConfig,
}

impl Default for PortalAuthConfig {
    fn default() -> Self {
        Self {
            idp: IdpConfig::default(),
            session: SessionConfig::default(),
            cookie: CookieConfig::default(),
            biometric: GatewayConfig::with_scope("us.biometric.read"),
            relationships: GatewayConfig::with_scope("psn.access_level.read"),
        }
    }
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdpConfig {
    /// Token endpoint (code exchange and refresh).
    pub token_url: String,

    /// Userinfo endpoint.
    pub userinfo_url: String,

    /// Revocation endpoint. Derived from `token_url` when unset.
    pub revoke_url: Option<String>,

    /// OAuth client id registered with the provider.
    pub client_id: String,

    /// OAuth client secret. Sent in the form body (`client_secret_post`).
    pub client_secret: String,

    /// Redirect URI used when the browser does not send one.
    pub redirect_uri: String,

    /// Timeout for each call to the provider.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Retry and breaker policy for exchange and userinfo calls.
    pub resilience: ResilienceConfig,
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            token_url: "http://localhost:9000/oauth2/token".to_string(),
            userinfo_url: "http://localhost:9000/oauth2/userinfo".to_string(),
            revoke_url: None,
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:4200/auth/callback".to_string(),
            request_timeout: Duration::from_secs(10),
            resilience: ResilienceConfig::default(),
        }
    }
}

impl IdpConfig {
    /// Returns the revocation endpoint.
    ///
    /// Falls back to the token URL with its trailing `/token` segment replaced
    /// by `/revoke`.
    #[must_use]
    pub fn revoke_endpoint(&self) -> String {
        if let Some(url) = &self.revoke_url {
            return url.clone();
        }
        match self.token_url.strip_suffix("/token") {
            Some(base) => format!("{base}/revoke"),
            None => format!("{}/revoke", self.token_url.trim_end_matches('/')),
        }
    }
}

/// Session lifetime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle timeout. Every successful read slides the expiry by this amount.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Access tokens expiring within this window are refreshed proactively.
    #[serde(with = "humantime_serde")]
    pub refresh_threshold: Duration,

    /// Prefix for session keys in the backend.
    pub key_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            refresh_threshold: Duration::from_secs(5 * 60),
            key_prefix: "session:".to_string(),
        }
    }
}

/// `SameSite` attribute of the session cookie.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum SameSitePolicy {
    /// `SameSite=Strict`
    Strict,
    /// `SameSite=Lax`
    #[default]
    Lax,
    /// `SameSite=None` (requires `Secure`)
    None,
}

/// Session cookie configuration.
///
/// The cookie max-age always equals [`SessionConfig::timeout`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie name.
    pub name: String,

    /// Whether to set the `Secure` attribute.
    pub secure: bool,

    /// `SameSite` attribute.
    pub same_site: SameSitePolicy,

    /// Cookie path.
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "SESSION_ID".to_string(),
            secure: true,
            same_site: SameSitePolicy::Lax,
            path: "/".to_string(),
        }
    }
}

/// Configuration of one identity gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Client-credentials token endpoint.
    pub token_url: String,

    /// Resource endpoint queried per member.
    pub resource_url: String,

    /// Machine client id.
    pub client_id: String,

    /// Machine client secret.
    pub client_secret: String,

    /// Scope requested with the client-credentials grant.
    pub scope: String,

    /// How long a fetched result is served from cache.
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Machine tokens are renewed this long before their declared expiry.
    #[serde(with = "humantime_serde")]
    pub token_refresh_skew: Duration,

    /// Timeout for each call to the gateway.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Retry and breaker policy.
    pub resilience: ResilienceConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            token_url: String::new(),
            resource_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            scope: String::new(),
            cache_ttl: Duration::from_secs(30 * 60),
            token_refresh_skew: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(10),
            resilience: ResilienceConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Default gateway configuration requesting `scope`.
    #[must_use]
    pub fn with_scope(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Self::default()
        }
    }

    /// Sets the token and resource endpoints.
    #[must_use]
    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        resource_url: impl Into<String>,
    ) -> Self {
        self.token_url = token_url.into();
        self.resource_url = resource_url.into();
        self
    }

    /// Sets the machine client credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = client_id.into();
        self.client_secret = client_secret.into();
        self
    }

    /// Sets the retry and breaker policy.
    #[must_use]
    pub fn with_resilience(mut self, resilience: ResilienceConfig) -> Self {
        self.resilience = resilience;
        self
    }

    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.token_url.is_empty() {
            return Err(ConfigError::Missing(format!("{section}.token_url")));
        }
        if self.resource_url.is_empty() {
            return Err(ConfigError::Missing(format!("{section}.resource_url")));
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::Missing(format!("{section}.client_id")));
        }
        check_url(&format!("{section}.token_url"), &self.token_url)?;
        check_url(&format!("{section}.resource_url"), &self.resource_url)?;
        if self.cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(format!(
                "{section}.cache_ttl must be > 0"
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(format!(
                "{section}.request_timeout must be > 0"
            )));
        }
        self.resilience.validate(section)
    }
}

/// Retry and circuit-breaker policy for one upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,

    /// Backoff before the second attempt. Doubles per attempt.
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Upper bound for a single backoff.
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,

    /// Consecutive failed calls that open the breaker.
    pub failure_threshold: u32,

    /// How long the breaker stays open before admitting a trial call.
    #[serde(with = "humantime_serde")]
    pub cooldown: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl ResilienceConfig {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(format!(
                "{section}.resilience.max_attempts must be > 0"
            )));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidValue(format!(
                "{section}.resilience.failure_threshold must be > 0"
            )));
        }
        Ok(())
    }
}

/// Endpoints must be absolute `http(s)` URLs.
fn check_url(field: &str, value: &str) -> Result<(), ConfigError> {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(ConfigError::InvalidValue(format!(
            "{field} has unsupported scheme '{}'",
            url.scheme()
        ))),
        Err(e) => Err(ConfigError::InvalidValue(format!("{field} is not a valid URL: {e}"))),
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl PortalAuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for empty endpoints or client ids and
    /// `ConfigError::InvalidValue` if:
    /// - a timeout, TTL or attempt count is zero
    /// - `session.refresh_threshold` is not shorter than `session.timeout`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idp.token_url.is_empty() {
            return Err(ConfigError::Missing("idp.token_url".to_string()));
        }
        if self.idp.userinfo_url.is_empty() {
            return Err(ConfigError::Missing("idp.userinfo_url".to_string()));
        }
        if self.idp.client_id.is_empty() {
            return Err(ConfigError::Missing("idp.client_id".to_string()));
        }
        check_url("idp.token_url", &self.idp.token_url)?;
        check_url("idp.userinfo_url", &self.idp.userinfo_url)?;
        if let Some(revoke_url) = &self.idp.revoke_url {
            check_url("idp.revoke_url", revoke_url)?;
        }
        if self.idp.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "idp.request_timeout must be > 0".to_string(),
            ));
        }
        self.idp.resilience.validate("idp")?;

        if self.session.timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "session.timeout must be > 0".to_string(),
            ));
        }
        if self.session.refresh_threshold >= self.session.timeout {
            return Err(ConfigError::InvalidValue(
                "session.refresh_threshold must be shorter than session.timeout".to_string(),
            ));
        }

        if self.cookie.name.is_empty() {
            return Err(ConfigError::Missing("cookie.name".to_string()));
        }
        if self.cookie.same_site == SameSitePolicy::None && !self.cookie.secure {
            return Err(ConfigError::InvalidValue(
                "cookie.same_site = None requires cookie.secure = true".to_string(),
            ));
        }

        self.biometric.validate("biometric")?;
        self.relationships.validate("relationships")?;

        Ok(())
    }
}
