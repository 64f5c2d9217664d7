//! Per-principal rate limiting.
//!
//! Token bucket per principal, where the principal is the raw `X-API-Key`
//! header value when present and the client address otherwise. The fallback
//! means unauthenticated probes burn their own budget instead of a shared
//! counter, so the limiter must work even when authentication never resolved
//! a key.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use tracing::debug;

use crate::auth::API_KEY_HEADER;

/// Bucket capacity and refill window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitPolicy {
    /// Requests admitted from a full bucket before refill matters.
    pub capacity: u32,
    /// Time to refill the whole bucket.
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::per_minute(10)
    }
}

impl RateLimitPolicy {
    /// `capacity` requests per minute.
    pub fn per_minute(capacity: u32) -> Self {
        Self {
            capacity,
            window: Duration::from_secs(60),
        }
    }

    fn refill_per_second(&self) -> f64 {
        self.capacity as f64 / self.window.as_secs_f64()
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateLimitDecision {
    /// Admitted; `remaining` whole tokens left in the bucket.
    Allowed {
        /// Tokens left after this admission.
        remaining: u32,
    },
    /// Rejected; a token becomes available after `retry_after`.
    Limited {
        /// Time until the next token.
        retry_after: Duration,
    },
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Token-bucket admission keyed by principal.
///
/// Buckets are created lazily on first sight of a principal. Safe for
/// concurrent use; the map is guarded by a single mutex, which is fine for
/// the short critical section of a refill-and-take.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    /// Creates a limiter with the given policy.
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the configured policy.
    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Takes one token from the principal's bucket if available.
    pub fn check(&self, principal: &str) -> RateLimitDecision {
        self.check_at(principal, Instant::now())
    }

    fn check_at(&self, principal: &str, now: Instant) -> RateLimitDecision {
        let mut buckets = self.buckets.lock();
        let bucket = buckets
            .entry(principal.to_string())
            .or_insert_with(|| TokenBucket {
                tokens: self.policy.capacity as f64,
                refilled_at: now,
            });

        let elapsed = now.saturating_duration_since(bucket.refilled_at);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.policy.refill_per_second())
            .min(self.policy.capacity as f64);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateLimitDecision::Allowed {
                remaining: bucket.tokens as u32,
            }
        } else {
            let deficit = 1.0 - bucket.tokens;
            RateLimitDecision::Limited {
                retry_after: Duration::from_secs_f64(deficit / self.policy.refill_per_second()),
            }
        }
    }
}

/// Rate-limiting middleware for the completions route.
///
/// Runs after authentication but reads only the header, so requests that
/// never presented a valid key are still limited by address.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let principal = principal_for(&request);

    match limiter.check(&principal) {
        RateLimitDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            insert_limit_headers(&mut response, limiter.policy().capacity, remaining);
            response
        }
        RateLimitDecision::Limited { retry_after } => {
            debug!(principal = %principal, "rate limit exceeded");
            let retry_secs = retry_after.as_secs().max(1);

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "detail": format!(
                        "Rate limit exceeded: {} per minute",
                        limiter.policy().capacity
                    )
                })),
            )
                .into_response();

            insert_limit_headers(&mut response, limiter.policy().capacity, 0);
            if let Ok(value) = HeaderValue::try_from(retry_secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
            response
        }
    }
}

fn principal_for(request: &Request) -> String {
    if let Some(key) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return key.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn insert_limit_headers(response: &mut Response, limit: u32, remaining: u32) {
    if let Ok(value) = HeaderValue::try_from(limit.to_string()) {
        response.headers_mut().insert("X-RateLimit-Limit", value);
    }
    if let Ok(value) = HeaderValue::try_from(remaining.to_string()) {
        response.headers_mut().insert("X-RateLimit-Remaining", value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request as HttpRequest, routing::post};
    use tower::ServiceExt;

    #[test]
    fn test_bucket_admits_up_to_capacity() {
        let limiter = RateLimiter::new(RateLimitPolicy::per_minute(10));
        let now = Instant::now();

        for i in 0..10 {
            match limiter.check_at("key-a", now) {
                RateLimitDecision::Allowed { remaining } => {
                    assert_eq!(remaining, 9 - i);
                }
                RateLimitDecision::Limited { .. } => panic!("request {i} should be admitted"),
            }
        }

        assert!(matches!(
            limiter.check_at("key-a", now),
            RateLimitDecision::Limited { .. }
        ));
    }

    #[test]
    fn test_buckets_are_per_principal() {
        let limiter = RateLimiter::new(RateLimitPolicy::per_minute(1));
        let now = Instant::now();

        assert!(matches!(
            limiter.check_at("key-a", now),
            RateLimitDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at("key-b", now),
            RateLimitDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at("key-a", now),
            RateLimitDecision::Limited { .. }
        ));
    }

    #[test]
    fn test_bucket_refills_over_time() {
        let limiter = RateLimiter::new(RateLimitPolicy::per_minute(10));
        let start = Instant::now();

        for _ in 0..10 {
            limiter.check_at("key-a", start);
        }
        assert!(matches!(
            limiter.check_at("key-a", start),
            RateLimitDecision::Limited { .. }
        ));

        // One token refills every six seconds under 10/minute.
        let later = start + Duration::from_secs(7);
        assert!(matches!(
            limiter.check_at("key-a", later),
            RateLimitDecision::Allowed { .. }
        ));
        assert!(matches!(
            limiter.check_at("key-a", later),
            RateLimitDecision::Limited { .. }
        ));
    }

    #[test]
    fn test_retry_after_is_positive() {
        let limiter = RateLimiter::new(RateLimitPolicy::per_minute(1));
        let now = Instant::now();
        limiter.check_at("key-a", now);

        match limiter.check_at("key-a", now) {
            RateLimitDecision::Limited { retry_after } => {
                assert!(retry_after > Duration::ZERO);
                assert!(retry_after <= Duration::from_secs(60));
            }
            RateLimitDecision::Allowed { .. } => panic!("should be limited"),
        }
    }

    fn limited_router(capacity: u32) -> Router {
        let limiter = Arc::new(RateLimiter::new(RateLimitPolicy::per_minute(capacity)));
        Router::new()
            .route("/v1/chat/completions", post(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                limiter,
                enforce_rate_limit,
            ))
    }

    async fn post_with_key(router: &Router, key: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header("X-API-Key", key)
            .body(Body::empty())
            .unwrap();
        router.clone().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_eleventh_request_within_a_minute_is_rejected() {
        let router = limited_router(10);

        for _ in 0..10 {
            assert_eq!(post_with_key(&router, "sk-abc").await, StatusCode::OK);
        }
        assert_eq!(
            post_with_key(&router, "sk-abc").await,
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn test_limited_response_carries_headers_and_detail() {
        let router = limited_router(1);
        assert_eq!(post_with_key(&router, "sk-abc").await, StatusCode::OK);

        let request = HttpRequest::builder()
            .method("POST")
            .uri("/v1/chat/completions")
            .header("X-API-Key", "sk-abc")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("Retry-After"));
        assert_eq!(
            response.headers().get("X-RateLimit-Remaining").unwrap(),
            "0"
        );
    }

    #[tokio::test]
    async fn test_missing_key_falls_back_to_shared_unknown_principal() {
        // Without ConnectInfo (as in oneshot tests) every anonymous request
        // shares the "unknown" bucket.
        let router = limited_router(1);

        let anonymous = || {
            HttpRequest::builder()
                .method("POST")
                .uri("/v1/chat/completions")
                .body(Body::empty())
                .unwrap()
        };

        let first = router.clone().oneshot(anonymous()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = router.clone().oneshot(anonymous()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        // A keyed request is unaffected by the anonymous bucket.
        assert_eq!(post_with_key(&router, "sk-own").await, StatusCode::OK);
    }
}
