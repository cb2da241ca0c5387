//! Per-client rate limiting.
//!
//! Each limiter tracks one token bucket per client IP. Quotas are written as
//! `<count>/<unit>`, e.g. `100/minute`. Requests over quota are rejected
//! with `429` and a `Retry-After` header.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use pokeproxy_core::ProxyError;
use tracing::{debug, warn};

use crate::error::ApiError;

/// A request quota parsed from `<count>/<unit>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    count: NonZeroU32,
    period: Duration,
}

impl RateLimit {
    /// Requests allowed per period.
    pub fn count(&self) -> u32 {
        self.count.get()
    }

    /// Length of the period.
    pub fn period(&self) -> Duration {
        self.period
    }

    fn quota(self) -> Quota {
        let replenish = self.period / self.count.get();
        Quota::with_period(replenish)
            .unwrap_or_else(|| Quota::per_second(self.count))
            .allow_burst(self.count)
    }
}

/// Reasons a quota string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitParseError {
    /// Not of the form `<count>/<unit>`.
    #[error("expected '<count>/<unit>', got '{0}'")]
    Format(String),
    /// Count is zero or not a number.
    #[error("invalid request count '{0}'")]
    Count(String),
    /// Unit is not second, minute, hour or day.
    #[error("unknown period '{0}'")]
    Unit(String),
}

impl FromStr for RateLimit {
    type Err = RateLimitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (count, unit) =
            s.split_once('/').ok_or_else(|| RateLimitParseError::Format(s.to_string()))?;

        let count = count
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| RateLimitParseError::Count(count.trim().to_string()))?;

        let period = match unit.trim().to_ascii_lowercase().as_str() {
            "s" | "second" | "seconds" => Duration::from_secs(1),
            "m" | "minute" | "minutes" => Duration::from_secs(60),
            "h" | "hour" | "hours" => Duration::from_secs(60 * 60),
            "d" | "day" | "days" => Duration::from_secs(24 * 60 * 60),
            other => return Err(RateLimitParseError::Unit(other.to_string())),
        };

        Ok(Self { count, period })
    }
}

type KeyedLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Keyed limiter shared by every request on a route group.
#[derive(Clone)]
pub struct ClientRateLimiter {
    limiter: Arc<KeyedLimiter>,
    clock: DefaultClock,
}

impl std::fmt::Debug for ClientRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRateLimiter").field("clients", &self.limiter.len()).finish()
    }
}

impl ClientRateLimiter {
    /// Creates a limiter enforcing `limit` per client IP.
    pub fn new(limit: RateLimit) -> Self {
        Self { limiter: Arc::new(RateLimiter::keyed(limit.quota())), clock: DefaultClock::default() }
    }

    /// Admits one request from `ip`, or returns how long to wait.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.limiter
            .check_key(&ip)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Drops state for clients whose buckets are full again.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }
}

/// Rejects requests from clients over quota.
///
/// The client is identified by the peer address from `ConnectInfo`, falling
/// back to the unspecified address when the server runs without it.
pub async fn rate_limit_middleware(
    State(limiter): State<ClientRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |info| info.0.ip());

    match limiter.check(ip) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            let retry_after_secs = wait.as_secs().max(1);
            warn!(%ip, path = %request.uri().path(), retry_after_secs, "Rate limit exceeded");
            ApiError::from(ProxyError::RateLimited { retry_after_secs }).into_response()
        },
    }
}

/// Periodically prunes idle client state.
pub fn spawn_cleanup(limiters: Vec<ClientRateLimiter>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            for limiter in &limiters {
                limiter.retain_recent();
            }
            debug!("Pruned idle rate limit state");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quota_strings() {
        let limit: RateLimit = "100/minute".parse().unwrap();
        assert_eq!(limit.count(), 100);
        assert_eq!(limit.period(), Duration::from_secs(60));

        let limit: RateLimit = " 5 / Second ".parse().unwrap();
        assert_eq!(limit.count(), 5);
        assert_eq!(limit.period(), Duration::from_secs(1));

        assert_eq!("2/day".parse::<RateLimit>().unwrap().period(), Duration::from_secs(86_400));
    }

    #[test]
    fn rejects_malformed_quotas() {
        assert!(matches!("100".parse::<RateLimit>(), Err(RateLimitParseError::Format(_))));
        assert!(matches!("0/minute".parse::<RateLimit>(), Err(RateLimitParseError::Count(_))));
        assert!(matches!("x/minute".parse::<RateLimit>(), Err(RateLimitParseError::Count(_))));
        assert!(matches!("10/fortnight".parse::<RateLimit>(), Err(RateLimitParseError::Unit(_))));
    }

    #[test]
    fn limiter_enforces_burst_per_client() {
        let limiter = ClientRateLimiter::new("3/minute".parse().unwrap());
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        for _ in 0..3 {
            assert!(limiter.check(a).is_ok());
        }
        let wait = limiter.check(a).unwrap_err();
        assert!(wait > Duration::ZERO && wait <= Duration::from_secs(20));

        assert!(limiter.check(b).is_ok());
    }
}
