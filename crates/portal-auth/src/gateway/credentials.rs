//! Machine credentials (client-credentials grant) for the identity gateways.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::clock::{Clock, duration_ms};
use crate::config::GatewayConfig;
use crate::error::UpstreamError;
use crate::oauth::DEFAULT_EXPIRES_IN_SECS;
use crate::resilience::read_json;

#[derive(Debug, Deserialize)]
struct ClientCredentialsResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at_ms: i64,
}

/// Cached machine token for one gateway.
///
/// A token is served while `now < expires_at - skew`. Concurrent callers that
/// find it stale each fetch a new one and the last write wins. An expired token
/// is never served when the token endpoint fails.
#[derive(Debug)]
pub struct MachineTokenCache {
    service: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    skew: Duration,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    cached: RwLock<Option<CachedToken>>,
}

impl MachineTokenCache {
    /// Creates an empty token cache for a gateway.
    pub fn new(
        service: impl Into<String>,
        config: &GatewayConfig,
        http: reqwest::Client,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            service: service.into(),
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            scope: config.scope.clone(),
            skew: config.token_refresh_skew,
            http,
            clock,
            cached: RwLock::new(None),
        }
    }

    /// Returns a usable access token, fetching a new one when needed.
    ///
    /// # Errors
    ///
    /// Returns the token endpoint failure as-is.
    pub async fn token(&self) -> Result<String, UpstreamError> {
        let now = self.clock.now_ms();
        if let Some(token) = self.cached.read().await.as_ref()
            && now < token.expires_at_ms - duration_ms(self.skew)
        {
            return Ok(token.access_token.clone());
        }

        tracing::debug!(service = %self.service, "Requesting machine token");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", self.scope.as_str()),
        ];
        let response = self.http.post(&self.token_url).form(&form).send().await?;
        let body: ClientCredentialsResponse = read_json(response).await?;

        let lifetime = body.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let token = CachedToken {
            access_token: body.access_token,
            expires_at_ms: self.clock.now_ms()
                + duration_ms(Duration::from_secs(lifetime)),
        };
        let access_token = token.access_token.clone();
        *self.cached.write().await = Some(token);

        tracing::debug!(service = %self.service, expires_in = lifetime, "Machine token cached");
        Ok(access_token)
    }

    /// Drops the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn cache_for(server: &MockServer, clock: Arc<ManualClock>) -> MachineTokenCache {
        let config = GatewayConfig::with_scope("us.biometric.read")
            .with_endpoints(format!("{}/oauth2/token", server.uri()), "unused")
            .with_credentials("bff", "s3cret");
        MachineTokenCache::new("biometric", &config, reqwest::Client::new(), clock)
    }

    #[tokio::test]
    async fn test_token_cached_until_skew() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .and(body_string_contains("scope=us.biometric.read"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "machine-1",
                "expires_in": 3600
            })))
            .expect(2)
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_for(&server, clock.clone()).await;

        assert_eq!(cache.token().await.unwrap(), "machine-1");
        clock.advance(Duration::from_secs(54 * 60));
        assert_eq!(cache.token().await.unwrap(), "machine-1");

        // Inside the five minute skew window.
        clock.advance(Duration::from_secs(2 * 60));
        assert_eq!(cache.token().await.unwrap(), "machine-1");
    }

    #[tokio::test]
    async fn test_failure_propagates_without_stale_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "machine-1",
                "expires_in": 600
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_for(&server, clock.clone()).await;
        assert!(cache.token().await.is_ok());

        clock.advance(Duration::from_secs(601));
        let err = cache.token().await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status { status: 503, .. }));
    }
}
