//! Sliding-window per-IP rate limiting for the AI namespace.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::state::AppState;

/// Rolling-window hit counter keyed by client IP.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    pub(crate) hits: HashMap<IpAddr, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            hits: HashMap::new(),
        }
    }

    /// Record a hit for `ip`; returns false when the window is full.
    pub fn check(&mut self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    fn check_at(&mut self, ip: IpAddr, now: Instant) -> bool {
        self.clear_stale(now);

        let hits = self.hits.entry(ip).or_default();
        while hits
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            hits.pop_front();
        }

        if hits.len() >= self.max_requests as usize {
            return false;
        }
        hits.push_back(now);
        true
    }

    /// Drop IPs whose newest hit has aged out of the window.
    fn clear_stale(&mut self, now: Instant) {
        let window = self.window;
        self.hits
            .retain(|_, hits| hits.back().is_some_and(|t| now.duration_since(*t) < window));
    }
}

/// Global limiter over the AI namespace.
pub async fn ai_rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let allowed = state.ai_limiter.lock().await.check(addr.ip());
    if !allowed {
        return Err(AppError::TooManyRequests(
            "Too many requests from this IP, please try again after a minute".into(),
        ));
    }
    Ok(next.run(req).await)
}

/// Hourly limiter on the suggestion endpoint.
pub async fn suggest_rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let allowed = state.suggest_limiter.lock().await.check(addr.ip());
    if !allowed {
        return Err(AppError::TooManyRequests(
            "Too many AI requests from this IP, please try again after an hour".into(),
        ));
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[test]
    fn allows_up_to_limit_then_denies() {
        let mut limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at(ip(1), now));
        assert!(limiter.check_at(ip(1), now));
        assert!(limiter.check_at(ip(1), now));
        assert!(!limiter.check_at(ip(1), now));
    }

    #[test]
    fn window_slides() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.check_at(ip(1), start));
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(30)));
        assert!(!limiter.check_at(ip(1), start + Duration::from_secs(45)));

        // The first hit ages out after a full window
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(61)));
    }

    #[test]
    fn ips_are_independent() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at(ip(1), now));
        assert!(!limiter.check_at(ip(1), now));
        assert!(limiter.check_at(ip(2), now));
    }

    #[test]
    fn idle_ips_are_dropped() {
        let mut limiter = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();

        limiter.check_at(ip(1), start);
        limiter.check_at(ip(2), start);
        assert_eq!(limiter.hits.len(), 2);

        limiter.check_at(ip(3), start + Duration::from_secs(120));
        assert_eq!(limiter.hits.len(), 1);
    }

    #[test]
    fn denied_hit_is_not_recorded() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.check_at(ip(1), start));
        assert!(!limiter.check_at(ip(1), start + Duration::from_secs(30)));

        // The rejected call must not extend the window
        assert!(limiter.check_at(ip(1), start + Duration::from_secs(61)));
    }
}
