use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::InMemoryState;
use governor::state::NotKeyed;
use governor::Quota;
use tracing::info;
use tracing::warn;

use crate::CompletionError;
use crate::Error;
use crate::RateQuota;
use crate::Result;
use crate::SourceError;

type DirectLimiter = governor::RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// External dependency a limiter guards. Decides which error a timed-out
/// wait surfaces as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitedService {
    Source,
    Completion,
}

impl LimitedService {
    fn timeout_error(
        &self,
        waited: Duration,
    ) -> Error {
        match self {
            LimitedService::Source => SourceError::RateLimitTimeout(waited).into(),
            LimitedService::Completion => CompletionError::RateLimitTimeout(waited).into(),
        }
    }
}

/// Token bucket with a fixed quota.
///
/// Starts full, so the first `burst` calls pass immediately.
pub struct RateLimiter {
    service: LimitedService,
    quota: RateQuota,
    limiter: DirectLimiter,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("service", &self.service)
            .field("quota", &self.quota)
            .finish()
    }
}

impl RateLimiter {
    pub fn new(
        service: LimitedService,
        quota: RateQuota,
    ) -> Self {
        let replenish = NonZeroU32::new(quota.per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(quota.burst.max(1)).unwrap_or(NonZeroU32::MIN);

        let limiter = governor::RateLimiter::direct(Quota::per_minute(replenish).allow_burst(burst));
        Self {
            service,
            quota,
            limiter,
        }
    }

    pub fn quota(&self) -> RateQuota {
        self.quota
    }

    /// Waits until a token is available, failing once `max_wait` elapses.
    pub async fn wait(
        &self,
        max_wait: Duration,
    ) -> Result<()> {
        match tokio::time::timeout(max_wait, self.limiter.until_ready()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!(service = ?self.service, ?max_wait, "rate limiter wait timed out");
                Err(self.service.timeout_error(max_wait))
            }
        }
    }
}

/// Process-wide limiter whose quota can be replaced at runtime.
///
/// Reconfiguring installs a fresh bucket; waiters already parked on the old
/// one finish against the old quota.
#[derive(Debug)]
pub struct SharedRateLimiter {
    service: LimitedService,
    max_wait: Duration,
    current: ArcSwap<RateLimiter>,
}

impl SharedRateLimiter {
    pub fn new(
        service: LimitedService,
        quota: RateQuota,
        max_wait: Duration,
    ) -> Self {
        Self {
            service,
            max_wait,
            current: ArcSwap::from_pointee(RateLimiter::new(service, quota)),
        }
    }

    pub fn quota(&self) -> RateQuota {
        self.current.load().quota()
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub async fn wait(&self) -> Result<()> {
        let limiter: Arc<RateLimiter> = self.current.load_full();
        limiter.wait(self.max_wait).await
    }

    /// Replaces the bucket when `quota` differs from the current one.
    /// Returns whether a replacement happened.
    pub fn reconfigure(
        &self,
        quota: RateQuota,
    ) -> bool {
        let previous = self.quota();
        if previous == quota {
            return false;
        }
        info!(
            service = ?self.service,
            from = previous.per_minute,
            to = quota.per_minute,
            "rate limit reconfigured"
        );
        self.current.store(Arc::new(RateLimiter::new(self.service, quota)));
        true
    }
}
