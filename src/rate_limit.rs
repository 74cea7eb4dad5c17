/// Rate Limiting System
use crate::{
    account::Caller,
    api::middleware::resolved_caller,
    config::RateLimitSettings,
    context::AppContext,
    error::{RegistryError, RegistryResult},
};
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Which quota a request draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerTier {
    Anonymous,
    User,
    Admin,
}

impl CallerTier {
    pub fn of(caller: Option<&Caller>) -> Self {
        match caller {
            None => CallerTier::Anonymous,
            Some(c) if c.is_admin() => CallerTier::Admin,
            Some(_) => CallerTier::User,
        }
    }
}

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated_rps: u32,
    authenticated: Arc<DirectLimiter>,
    anonymous: Arc<DirectLimiter>,
    admin: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Authenticated callers get the configured quota; anonymous callers a
    /// tenth of it and admins ten times it.
    pub fn new(settings: &RateLimitSettings) -> Self {
        let rps = settings.requests_per_second;
        let burst = settings.burst_size;

        Self {
            enabled: settings.enabled,
            authenticated_rps: rps,
            authenticated: Arc::new(GovernorLimiter::direct(quota(rps, burst))),
            anonymous: Arc::new(GovernorLimiter::direct(quota(rps / 10, burst / 5))),
            admin: Arc::new(GovernorLimiter::direct(quota(
                rps.saturating_mul(10),
                burst.saturating_mul(2),
            ))),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check the quota for one request
    pub fn check(&self, tier: CallerTier) -> RegistryResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let limiter = match tier {
            CallerTier::Anonymous => &self.anonymous,
            CallerTier::User => &self.authenticated,
            CallerTier::Admin => &self.admin,
        };

        limiter.check().map_err(|_| RegistryError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        })
    }
}

fn quota(per_second: u32, burst: u32) -> Quota {
    let per_second = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
    Quota::per_second(per_second).allow_burst(burst)
}

/// Rate limiting middleware; runs after `authenticate` so the caller tier is known
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, RegistryError> {
    let tier = CallerTier::of(resolved_caller(&request));

    if let Err(e) = ctx.rate_limiter.check(tier) {
        tracing::warn!(tier = ?tier, path = %request.uri().path(), "Rate limit exceeded");
        return Err(e);
    }

    let mut response = next.run(request).await;
    if ctx.rate_limiter.is_enabled() {
        response.headers_mut().insert(
            "X-RateLimit-Limit",
            HeaderValue::from(ctx.rate_limiter.authenticated_rps),
        );
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(enabled: bool, requests_per_second: u32, burst_size: u32) -> RateLimitSettings {
        RateLimitSettings {
            enabled,
            requests_per_second,
            burst_size,
        }
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(&settings(true, 100, 50));

        // Should allow first request
        assert!(limiter.check(CallerTier::User).is_ok());
        assert!(limiter.check(CallerTier::Anonymous).is_ok());
        assert!(limiter.check(CallerTier::Admin).is_ok());
    }

    #[test]
    fn test_burst_limit() {
        let limiter = RateLimiter::new(&settings(true, 10, 5));

        for _ in 0..5 {
            assert!(limiter.check(CallerTier::User).is_ok());
        }

        // Should hit rate limit after burst
        assert!(matches!(
            limiter.check(CallerTier::User),
            Err(RegistryError::RateLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_disabled_limiter_always_allows() {
        let limiter = RateLimiter::new(&settings(false, 1, 1));
        for _ in 0..20 {
            assert!(limiter.check(CallerTier::Anonymous).is_ok());
        }
    }

    #[test]
    fn test_zero_quota_is_clamped() {
        let limiter = RateLimiter::new(&settings(true, 5, 0));
        assert!(limiter.check(CallerTier::Anonymous).is_ok());
    }
}
