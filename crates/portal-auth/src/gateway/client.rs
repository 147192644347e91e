//! Generic cached client shared by both identity gateways.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::clock::Clock;
use crate::config::GatewayConfig;
use crate::error::{AuthError, AuthResult, UpstreamError};
use crate::gateway::cache::TtlCache;
use crate::gateway::credentials::MachineTokenCache;
use crate::resilience::{BreakerState, ResilientClient, read_json};

/// Describes one upstream resource served through a [`CachedGateway`].
pub trait GatewayResource: Send + Sync + 'static {
    /// Lookup key supplied by callers.
    type Key: ?Sized + Sync;
    /// Response body as sent by the upstream.
    type Wire: DeserializeOwned + Send;
    /// Domain value handed to callers and cached.
    type Value: Clone + Send + Sync + 'static;

    /// Service name used in logs, errors and breaker state.
    const SERVICE: &'static str;

    /// Cache key for a lookup.
    fn cache_key(key: &Self::Key) -> String;

    /// Query parameters for a lookup.
    fn query(key: &Self::Key) -> Vec<(&'static str, String)>;

    /// Converts an upstream body retrieved at `now_ms`.
    fn from_wire(wire: Self::Wire, key: &Self::Key, now_ms: i64) -> Self::Value;
}

/// TTL-cached, credential-bearing, resilient client for one gateway.
///
/// `get` serves a fresh cache entry when there is one. Otherwise it obtains a
/// machine token, calls the upstream under retry and breaker, and writes the
/// result through to the cache. When that fails it serves the last value for
/// the same key regardless of age, and only errors when there is none.
/// Identical concurrent misses each reach the upstream.
#[derive(Debug)]
pub struct CachedGateway<R: GatewayResource> {
    resource_url: String,
    http: reqwest::Client,
    tokens: MachineTokenCache,
    resilience: ResilientClient,
    cache: TtlCache<R::Value>,
    clock: Arc<dyn Clock>,
    _resource: PhantomData<R>,
}

impl<R: GatewayResource> CachedGateway<R> {
    /// Creates a gateway client.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the HTTP client cannot be built.
    pub fn new(config: &GatewayConfig, clock: Arc<dyn Clock>) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            resource_url: config.resource_url.clone(),
            tokens: MachineTokenCache::new(R::SERVICE, config, http.clone(), clock.clone()),
            resilience: ResilientClient::from_config(R::SERVICE, &config.resilience, clock.clone()),
            cache: TtlCache::new(config.cache_ttl, clock.clone()),
            http,
            clock,
            _resource: PhantomData,
        })
    }

    /// Looks up `key`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Upstream` when the upstream call fails and nothing
    /// was ever cached for `key`.
    pub async fn get(&self, key: &R::Key) -> AuthResult<R::Value> {
        let cache_key = R::cache_key(key);
        if let Some(value) = self.cache.get_fresh(&cache_key) {
            tracing::debug!(service = R::SERVICE, cache_key = %cache_key, "Gateway cache hit");
            return Ok(value);
        }

        let cache_key_ref = cache_key.as_str();
        self.resilience
            .call_with_fallback(
                move || self.fetch(key, cache_key_ref),
                |err| {
                    let stale = self.cache.get_any(cache_key_ref);
                    if stale.is_some() {
                        tracing::warn!(
                            service = R::SERVICE,
                            cache_key = %cache_key_ref,
                            error = %err,
                            "Serving stale gateway data"
                        );
                    }
                    stale
                },
            )
            .await
            .map_err(|err| AuthError::upstream(R::SERVICE, err.to_string()))
    }

    /// Breaker state of the upstream.
    pub fn breaker_state(&self) -> BreakerState {
        self.resilience.breaker_state()
    }

    async fn fetch(&self, key: &R::Key, cache_key: &str) -> Result<R::Value, UpstreamError> {
        let token = self.tokens.token().await?;
        let response = self
            .http
            .get(&self.resource_url)
            .bearer_auth(&token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&R::query(key))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }

        let wire: R::Wire = read_json(response).await?;
        let value = R::from_wire(wire, key, self.clock.now_ms());
        self.cache.insert(cache_key, value.clone());

        tracing::debug!(
            service = R::SERVICE,
            cache_key = %cache_key,
            "Gateway value fetched and cached"
        );
        Ok(value)
    }
}
