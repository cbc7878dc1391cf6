use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

type KeyedLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>;

/// Rate limiter keyed by client IP address, remembering its configured limit
/// for the 429 message.
#[derive(Clone)]
pub struct IpRateLimiter {
    limiter: Arc<KeyedLimiter>,
    attempts: u32,
    window_seconds: u64,
}

impl IpRateLimiter {
    /// Take one request for `ip`; on rejection returns a 429 carrying the wait time.
    pub fn check(&self, ip: &IpAddr) -> Result<(), AppError> {
        self.limiter.check_key(ip).map_err(|negative| {
            let wait_time = negative.wait_time_from(DefaultClock::default().now());
            AppError::TooManyRequests(self.rejection_message(), Some(wait_time.as_secs().max(1)))
        })
    }

    pub fn rejection_message(&self) -> String {
        format!(
            "You are attempting to use this endpoint too quickly. Limit is {}/{}s",
            self.attempts, self.window_seconds
        )
    }
}

/// Allow `attempts` requests per `window_seconds`, replenished evenly across the window.
pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    let burst = NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN);
    let window_seconds = window_seconds.max(1);
    let period_ms = (window_seconds * 1000) / u64::from(burst.get());
    let period = Duration::from_millis(period_ms.max(1));

    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst);

    IpRateLimiter {
        limiter: Arc::new(RateLimiter::dashmap(quota)),
        attempts: burst.get(),
        window_seconds,
    }
}

/// Resolve the client IP, preferring the first `x-forwarded-for` hop.
pub fn client_ip(request: &Request) -> Option<IpAddr> {
    let forwarded_ip = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    forwarded_ip.or_else(|| {
        request
            .extensions()
            .get::<axum::extract::ConnectInfo<SocketAddr>>()
            .map(|axum::extract::ConnectInfo(addr)| addr.ip())
    })
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ip) = client_ip(&request) else {
        tracing::warn!("Could not determine IP for rate limiting");
        return Ok(next.run(request).await);
    };

    if let Err(e) = limiter.check(&ip) {
        tracing::warn!(ip = %ip, "Rate limit exceeded");
        return Err(e);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn limiter_allows_burst_then_rejects() {
        let limiter = create_ip_rate_limiter(2, 60);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        assert!(limiter.check(&ip).is_ok());
        assert!(limiter.check(&ip).is_ok());
        assert!(limiter.check(&ip).is_err());
    }

    #[test]
    fn limiter_tracks_ips_independently() {
        let limiter = create_ip_rate_limiter(1, 60);
        let a = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        let b = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));

        assert!(limiter.check(&a).is_ok());
        assert!(limiter.check(&a).is_err());
        assert!(limiter.check(&b).is_ok());
    }

    #[test]
    fn rejection_reports_configured_limit() {
        let limiter = create_ip_rate_limiter(1, 600);
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3));

        assert!(limiter.check(&ip).is_ok());
        match limiter.check(&ip) {
            Err(AppError::TooManyRequests(message, retry_after)) => {
                assert!(message.ends_with("Limit is 1/600s"), "{}", message);
                assert!(retry_after.is_some());
            }
            other => panic!("expected 429, got {:?}", other),
        }
    }

    #[test]
    fn zero_attempts_still_allows_one() {
        let limiter = create_ip_rate_limiter(0, 60);
        let ip = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert!(limiter.check(&ip).is_ok());
    }

    #[test]
    fn forwarded_header_wins_over_connect_info() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(axum::body::Body::empty())
            .expect("request");
        assert_eq!(
            client_ip(&request),
            Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9)))
        );
    }
}
