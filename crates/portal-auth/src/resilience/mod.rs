//! Retry, circuit breaking and fallback around a single outbound call.
//!
//! [`ResilientClient`] composes a [`RetryPolicy`] inside a [`CircuitBreaker`].
//! The breaker sees one outcome per logical call, after retries are exhausted,
//! so a call that needed three attempts to fail counts as one failure.
//!
//! ```ignore
//! let client = ResilientClient::from_config("biometric", &config.resilience, clock);
//! let info = client
//!     .call_with_fallback(|| fetch(&http, &url), |_| cache.get_any(&key))
//!     .await?;
//! ```

mod breaker;
mod retry;

pub use breaker::{BreakerState, CallPermit, CircuitBreaker};
pub use retry::RetryPolicy;

use std::future::Future;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::ResilienceConfig;
use crate::error::UpstreamError;

/// Retry + circuit breaker + optional fallback for one upstream service.
#[derive(Debug)]
pub struct ResilientClient {
    service: String,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ResilientClient {
    /// Creates a client from explicit parts.
    pub fn new(service: impl Into<String>, breaker: CircuitBreaker, retry: RetryPolicy) -> Self {
        Self {
            service: service.into(),
            breaker,
            retry,
        }
    }

    /// Creates a client from a resilience configuration section.
    pub fn from_config(
        service: impl Into<String>,
        config: &ResilienceConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let service = service.into();
        let breaker = CircuitBreaker::new(
            service.clone(),
            config.failure_threshold,
            config.cooldown,
            clock,
        );
        Self::new(service, breaker, RetryPolicy::from_config(config))
    }

    /// Name of the protected service.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Current breaker state.
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Runs `op` under the breaker and retry policy. No fallback.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::CircuitOpen` without calling `op` while the
    /// breaker is open, otherwise the last error produced by `op`.
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let permit = self.breaker.acquire()?;

        match self.retry.run(&self.service, op).await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(err) => {
                // The upstream answered; a rejected request says nothing about its health.
                if err.is_client_error() {
                    permit.success();
                } else {
                    permit.failure();
                }
                tracing::warn!(service = %self.service, error = %err, "Upstream call failed");
                Err(err)
            }
        }
    }

    /// Runs `op` like [`call`](Self::call) and consults `fallback` on any
    /// failure, including an open breaker.
    ///
    /// # Errors
    ///
    /// Returns the original error when `fallback` yields `None`.
    pub async fn call_with_fallback<T, F, Fut, FB>(
        &self,
        op: F,
        fallback: FB,
    ) -> Result<T, UpstreamError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
        FB: FnOnce(&UpstreamError) -> Option<T>,
    {
        match self.call(op).await {
            Ok(value) => Ok(value),
            Err(err) => match fallback(&err) {
                Some(value) => {
                    tracing::info!(service = %self.service, error = %err, "Serving fallback value");
                    Ok(value)
                }
                None => Err(err),
            },
        }
    }
}

/// Decodes a JSON response, turning non-2xx statuses into
/// `UpstreamError::Status` with the body kept for diagnostics.
pub(crate) async fn read_json<T>(response: reqwest::Response) -> Result<T, UpstreamError>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| UpstreamError::Decode(e.to_string()))
}
