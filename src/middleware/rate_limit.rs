//! Rate limiting for the public credential endpoints.
//!
//! Fixed one-minute window per client IP, in memory.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Clone)]
pub struct LoginRateLimiter {
    max_requests: u32,
    window: Duration,
    state: Arc<Mutex<HashMap<IpAddr, Window>>>,
}

struct Window {
    count: u32,
    started: Instant,
}

#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Allowed { remaining: u32 },
    Exceeded { retry_after: Duration },
}

impl LoginRateLimiter {
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn check(&self, ip: IpAddr, now: Instant) -> Verdict {
        let mut state = self.state.lock();
        // Stale windows are dropped on every check.
        state.retain(|_, w| now.duration_since(w.started) < self.window);

        let entry = state.entry(ip).or_insert(Window {
            count: 0,
            started: now,
        });
        entry.count += 1;

        if entry.count > self.max_requests {
            Verdict::Exceeded {
                retry_after: (entry.started + self.window).saturating_duration_since(now),
            }
        } else {
            Verdict::Allowed {
                remaining: self.max_requests - entry.count,
            }
        }
    }
}

/// Requests without connection info (in-process tests) share one bucket.
fn client_ip(request: &Request<Body>) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn login_rate_limit(
    State(limiter): State<LoginRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    match limiter.check(ip, Instant::now()) {
        Verdict::Allowed { .. } => next.run(request).await,
        Verdict::Exceeded { retry_after } => {
            warn!(
                ip = %ip,
                path = %request.uri().path(),
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            (
                StatusCode::TOO_MANY_REQUESTS,
                [("Retry-After", retry_after.as_secs().max(1).to_string())],
                Json(serde_json::json!({ "message": "Too many requests. Please slow down." })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_per_ip() {
        let limiter = LoginRateLimiter::new(3, Duration::from_secs(60));
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();
        let now = Instant::now();

        assert_eq!(limiter.check(a, now), Verdict::Allowed { remaining: 2 });
        limiter.check(a, now);
        assert_eq!(limiter.check(a, now), Verdict::Allowed { remaining: 0 });
        assert!(matches!(limiter.check(a, now), Verdict::Exceeded { .. }));

        assert_eq!(limiter.check(b, now), Verdict::Allowed { remaining: 2 });
    }

    #[test]
    fn test_window_resets() {
        let limiter = LoginRateLimiter::new(1, Duration::from_secs(60));
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        let start = Instant::now();

        limiter.check(ip, start);
        assert!(matches!(
            limiter.check(ip, start + Duration::from_secs(30)),
            Verdict::Exceeded { retry_after } if retry_after == Duration::from_secs(30)
        ));
        assert_eq!(
            limiter.check(ip, start + Duration::from_secs(61)),
            Verdict::Allowed { remaining: 0 }
        );
    }
}
