//! Fixed-window request limiting for unauthenticated routes.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use dashmap::DashMap;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Groups of routes that share a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// Register and login.
    Auth,
    /// Public form submissions.
    Submission,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Per-client counters, reset every window.
pub struct RateLimiter {
    windows: DashMap<(String, RouteClass), Window>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    /// `limit` requests per client and route class every minute.
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            limit,
            window,
        }
    }

    /// Count one request, or reject it with the seconds until the window resets.
    pub fn check(&self, client: &str, class: RouteClass) -> Result<()> {
        let now = Instant::now();
        let mut entry = self
            .windows
            .entry((client.to_string(), class))
            .or_insert(Window { started: now, count: 0 });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window { started: now, count: 0 };
        }

        if entry.count >= self.limit {
            let remaining = self.window.saturating_sub(now.duration_since(entry.started));
            let retry_after_secs = remaining.as_secs().max(1);
            tracing::warn!(client, ?class, retry_after_secs, "rate limit exceeded");
            return Err(AppError::RateLimited { retry_after_secs });
        }

        entry.count += 1;
        Ok(())
    }

    /// Drop windows that have expired.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < self.window);
        before - self.windows.len()
    }

    /// Number of tracked client windows.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

/// Background task to periodically prune expired windows.
pub async fn prune_task(limiter: Arc<RateLimiter>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let pruned = limiter.prune();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned rate limit windows");
        }
    }
}

/// Client address used as the rate limit key.
///
/// The peer address, or the first `X-Forwarded-For` hop when the server is
/// configured to sit behind a trusted proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

fn client_ip(parts: &Parts, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(parts, state.config.trust_forwarded_for)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_per_client_and_class() {
        let limiter = RateLimiter::per_minute(2);
        assert!(limiter.check("10.0.0.1", RouteClass::Auth).is_ok());
        assert!(limiter.check("10.0.0.1", RouteClass::Auth).is_ok());
        let err = limiter.check("10.0.0.1", RouteClass::Auth).unwrap_err();
        assert!(matches!(err, AppError::RateLimited { retry_after_secs } if retry_after_secs >= 1));

        assert!(limiter.check("10.0.0.2", RouteClass::Auth).is_ok());
        assert!(limiter.check("10.0.0.1", RouteClass::Submission).is_ok());
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("a", RouteClass::Auth).is_ok());
        assert!(limiter.check("a", RouteClass::Auth).is_err());
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("a", RouteClass::Auth).is_ok());
    }

    fn parts(forwarded: Option<&str>, peer: Option<&str>) -> Parts {
        let mut builder = axum::http::Request::builder().uri("/api/auth/login");
        if let Some(value) = forwarded {
            builder = builder.header("x-forwarded-for", value);
        }
        let mut parts = builder.body(()).unwrap().into_parts().0;
        if let Some(addr) = peer {
            parts.extensions.insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        }
        parts
    }

    #[test]
    fn test_forwarded_for_ignored_unless_trusted() {
        let spoofed = parts(Some("203.0.113.9, 10.0.0.1"), Some("198.51.100.7:4000"));
        assert_eq!(client_ip(&spoofed, false), "198.51.100.7");
        assert_eq!(client_ip(&spoofed, true), "203.0.113.9");

        let direct = parts(None, Some("198.51.100.7:4000"));
        assert_eq!(client_ip(&direct, true), "198.51.100.7");
        assert_eq!(client_ip(&parts(Some("203.0.113.9"), None), false), "unknown");
    }

    #[test]
    fn test_rotating_forwarded_for_shares_one_window() {
        let limiter = RateLimiter::per_minute(2);
        let mut limited = false;
        for n in 0..5 {
            let ip = client_ip(&parts(Some(&format!("203.0.113.{n}")), Some("198.51.100.7:4000")), false);
            limited |= limiter.check(&ip, RouteClass::Auth).is_err();
        }
        assert!(limited);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_prune() {
        let limiter = RateLimiter::new(5, Duration::from_millis(10));
        limiter.check("a", RouteClass::Auth).unwrap();
        limiter.check("b", RouteClass::Submission).unwrap();
        assert_eq!(limiter.tracked(), 2);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(limiter.prune(), 2);
        assert_eq!(limiter.tracked(), 0);
    }
}
