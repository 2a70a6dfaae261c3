//! Rate-limited provider wrapper.
//!
//! Wraps any provider implementation with rate limiting using the
//! governor crate. Provider quotas are the dominant operational
//! constraint on a full-vault run, so the wrapper slows request starts
//! rather than relying on 429 retries alone.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::ProviderError;
use crate::traits::provider::{ExtractionProvider, ExtractionRequest, ProviderResponse};
use crate::types::schema::OutputSchema;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A provider wrapper that enforces rate limits.
pub struct RateLimitedProvider<P: ExtractionProvider> {
    inner: P,
    limiter: Arc<DefaultRateLimiter>,
}

impl<P: ExtractionProvider> RateLimitedProvider<P> {
    /// Create a new rate-limited provider.
    ///
    /// # Arguments
    /// * `provider` - The underlying provider to wrap
    /// * `requests_per_second` - Maximum request starts per second
    pub fn new(provider: P, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        );
        Self::with_quota(provider, quota)
    }

    /// Create with a custom quota.
    pub fn with_quota(provider: P, quota: Quota) -> Self {
        Self {
            inner: provider,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Create with burst support.
    pub fn with_burst(provider: P, requests_per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        )
        .allow_burst(NonZeroU32::new(burst).expect("burst must be > 0"));
        Self::with_quota(provider, quota)
    }
}

#[async_trait]
impl<P: ExtractionProvider> ExtractionProvider for RateLimitedProvider<P> {
    async fn call(
        &self,
        request: &ExtractionRequest,
        schema: &OutputSchema,
    ) -> Result<ProviderResponse, ProviderError> {
        // Wait for a permit before each call, including retries.
        self.limiter.until_ready().await;
        self.inner.call(request, schema).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Extension trait for easy rate limiting.
pub trait ProviderExt: ExtractionProvider + Sized {
    /// Wrap this provider with rate limiting.
    fn rate_limited(self, requests_per_second: u32) -> RateLimitedProvider<Self> {
        RateLimitedProvider::new(self, requests_per_second)
    }

    /// Wrap with rate limiting and burst support.
    fn rate_limited_with_burst(
        self,
        requests_per_second: u32,
        burst: u32,
    ) -> RateLimitedProvider<Self> {
        RateLimitedProvider::with_burst(self, requests_per_second, burst)
    }
}

impl<P: ExtractionProvider + Sized> ProviderExt for P {}
