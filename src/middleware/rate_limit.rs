// ============================================
// Fixed-window rate limiting
// ============================================
//
// Each limiter instance counts requests per derived caller key inside a fixed
// window. Counters live either in process memory (swept before every check)
// or in Redis when several API instances must share them.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Json,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;

use crate::utils::hash_credential;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Number of hex characters of the credential digest used in `user:` keys.
const CREDENTIAL_DIGEST_LEN: usize = 16;

// ============================================
// Configuration
// ============================================

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Preset name, used to namespace shared (Redis) counters and in logs.
    pub name: &'static str,
    pub window_ms: u64,
    pub max: u32,
    pub message: String,
    pub status_code: StatusCode,
}

impl RateLimitConfig {
    pub fn new(name: &'static str, window_ms: u64, max: u32, message: impl Into<String>) -> Self {
        Self {
            name,
            window_ms,
            // A zero budget would let the first request of every window through
            max: max.max(1),
            message: message.into(),
            status_code: StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = status_code;
        self
    }

    /// General API traffic: 100 requests per 15 minutes
    pub fn api() -> Self {
        Self::new(
            "api",
            15 * 60 * 1000,
            100,
            "API rate limit exceeded. Please try again later.",
        )
    }

    /// AI generation endpoints: 20 requests per hour
    pub fn generation() -> Self {
        Self::new(
            "generation",
            60 * 60 * 1000,
            20,
            "Post generation limit exceeded. Please try again in an hour.",
        )
    }

    /// Endpoints that call LinkedIn: 50 requests per hour
    pub fn linkedin() -> Self {
        Self::new(
            "linkedin",
            60 * 60 * 1000,
            50,
            "LinkedIn API rate limit exceeded. Please try again later.",
        )
    }

    /// Authentication attempts: 5 per 15 minutes
    pub fn auth() -> Self {
        Self::new(
            "auth",
            15 * 60 * 1000,
            5,
            "Too many authentication attempts. Please try again later.",
        )
    }

    fn window(&self) -> Duration {
        Duration::milliseconds(self.window_ms as i64)
    }
}

// ============================================
// Decision
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}

// ============================================
// In-memory store
// ============================================

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweep expired windows, then count this request against `key`.
    ///
    /// The lock is held across the sweep and the check-and-increment so the
    /// count can never pass `max` under concurrent callers.
    pub fn check(
        &self,
        key: &str,
        max: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        entries.retain(|_, entry| entry.reset_at > now);

        match entries.get_mut(key) {
            Some(entry) if entry.count >= max => RateLimitDecision {
                allowed: false,
                limit: max,
                remaining: 0,
                reset_at: entry.reset_at,
            },
            Some(entry) => {
                entry.count += 1;
                RateLimitDecision {
                    allowed: true,
                    limit: max,
                    remaining: max.saturating_sub(entry.count),
                    reset_at: entry.reset_at,
                }
            }
            None => {
                let reset_at = now + window;
                entries.insert(key.to_string(), WindowEntry { count: 1, reset_at });
                RateLimitDecision {
                    allowed: true,
                    limit: max,
                    remaining: max.saturating_sub(1),
                    reset_at,
                }
            }
        }
    }
}

// ============================================
// Redis store
// ============================================

/// Check rate limit for a given key in Redis.
///
/// `INCR` and `PTTL` run as one atomic pipeline. A counter without an expiry
/// (first hit, or a `PEXPIRE` that never landed) is re-armed on every check,
/// so a key can never outlive its window indefinitely.
async fn check_redis(
    redis_conn: &mut ConnectionManager,
    key: &str,
    max: u32,
    window_ms: u64,
    now: DateTime<Utc>,
) -> Result<RateLimitDecision, redis::RedisError> {
    let cache_key = format!("ratelimit:{}", key);

    let (count, ttl_ms): (u32, i64) = redis::pipe()
        .atomic()
        .incr(&cache_key, 1)
        .pttl(&cache_key)
        .query_async(&mut *redis_conn)
        .await?;

    let ttl_ms = if ttl_ms < 0 {
        let _: () = redis_conn.pexpire(&cache_key, window_ms as i64).await?;
        window_ms as i64
    } else {
        ttl_ms
    };

    Ok(window_decision(count, ttl_ms, max, now))
}

/// Decision for a shared counter at `count` with `ttl_ms` left in its window.
fn window_decision(count: u32, ttl_ms: i64, max: u32, now: DateTime<Utc>) -> RateLimitDecision {
    RateLimitDecision {
        allowed: count <= max,
        limit: max,
        remaining: max.saturating_sub(count),
        reset_at: now + Duration::milliseconds(ttl_ms.max(0)),
    }
}

// ============================================
// Limiter
// ============================================

pub enum RateLimitBackend {
    Memory(MemoryStore),
    Redis(ConnectionManager),
}

pub struct RateLimiter {
    config: RateLimitConfig,
    backend: RateLimitBackend,
}

impl RateLimiter {
    pub fn in_memory(config: RateLimitConfig) -> Self {
        Self {
            config,
            backend: RateLimitBackend::Memory(MemoryStore::new()),
        }
    }

    pub fn with_redis(config: RateLimitConfig, conn: ConnectionManager) -> Self {
        Self {
            config,
            backend: RateLimitBackend::Redis(conn),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Counters live in Redis and are shared across instances
    pub fn is_shared(&self) -> bool {
        matches!(self.backend, RateLimitBackend::Redis(_))
    }

    pub async fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Utc::now()).await
    }

    pub async fn check_at(&self, key: &str, now: DateTime<Utc>) -> RateLimitDecision {
        match &self.backend {
            RateLimitBackend::Memory(store) => {
                store.check(key, self.config.max, self.config.window(), now)
            }
            RateLimitBackend::Redis(conn) => {
                let mut conn = conn.clone();
                let namespaced = format!("{}:{}", self.config.name, key);
                match check_redis(
                    &mut conn,
                    &namespaced,
                    self.config.max,
                    self.config.window_ms,
                    now,
                )
                .await
                {
                    Ok(decision) => decision,
                    Err(e) => {
                        // Redis failure - allow request but log warning
                        tracing::warn!(
                            limiter = self.config.name,
                            "Rate limit check failed (allowing request): {}",
                            e
                        );
                        RateLimitDecision {
                            allowed: true,
                            limit: self.config.max,
                            remaining: self.config.max,
                            reset_at: now + self.config.window(),
                        }
                    }
                }
            }
        }
    }
}

/// One independently configured limiter per endpoint category.
#[derive(Clone)]
pub struct RateLimiters {
    pub api: Arc<RateLimiter>,
    pub generation: Arc<RateLimiter>,
    pub linkedin: Arc<RateLimiter>,
    pub auth: Arc<RateLimiter>,
}

impl RateLimiters {
    pub fn in_memory() -> Self {
        Self {
            api: Arc::new(RateLimiter::in_memory(RateLimitConfig::api())),
            generation: Arc::new(RateLimiter::in_memory(RateLimitConfig::generation())),
            linkedin: Arc::new(RateLimiter::in_memory(RateLimitConfig::linkedin())),
            auth: Arc::new(RateLimiter::in_memory(RateLimitConfig::auth())),
        }
    }

    pub fn with_redis(conn: ConnectionManager) -> Self {
        Self {
            api: Arc::new(RateLimiter::with_redis(RateLimitConfig::api(), conn.clone())),
            generation: Arc::new(RateLimiter::with_redis(
                RateLimitConfig::generation(),
                conn.clone(),
            )),
            linkedin: Arc::new(RateLimiter::with_redis(
                RateLimitConfig::linkedin(),
                conn.clone(),
            )),
            auth: Arc::new(RateLimiter::with_redis(RateLimitConfig::auth(), conn)),
        }
    }
}

// ============================================
// Key derivation
// ============================================

/// Generate rate limit key from the authorization credential or client IP.
///
/// Credentials are keyed by a SHA-256 digest prefix of the whole header value,
/// so two callers only share a bucket if their digests collide.
pub fn rate_limit_key(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let credential = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if let Some(credential) = credential {
        let digest = hash_credential(credential);
        return format!("user:{}", &digest[..CREDENTIAL_DIGEST_LEN]);
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let ip = forwarded
        .or_else(|| peer.map(|ip| ip.to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    format!("ip:{}", ip)
}

// ============================================
// Middleware
// ============================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitedBody {
    pub error: String,
    pub retry_after: u64,
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    let reset = decision
        .reset_at
        .to_rfc3339_opts(SecondsFormat::Millis, true);
    if let Ok(value) = HeaderValue::from_str(&reset) {
        headers.insert(X_RATELIMIT_RESET, value);
    }
}

pub fn rejection_response(
    config: &RateLimitConfig,
    decision: &RateLimitDecision,
    now: DateTime<Utc>,
) -> Response {
    let retry_after = decision.retry_after_secs(now);
    let mut response = (
        config.status_code,
        Json(RateLimitedBody {
            error: config.message.clone(),
            retry_after,
        }),
    )
        .into_response();

    let headers = response.headers_mut();
    apply_rate_limit_headers(headers, decision);
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

/// Axum middleware: rejects throttled callers before the handler runs.
///
/// Use with `axum::middleware::from_fn_with_state(limiter, enforce_rate_limit)`.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip());
    let key = rate_limit_key(request.headers(), peer);
    let now = Utc::now();

    let decision = limiter.check_at(&key, now).await;

    if !decision.allowed {
        tracing::warn!(
            limiter = limiter.config().name,
            key = %key,
            reset_at = %decision.reset_at,
            "Rate limit exceeded"
        );
        return rejection_response(limiter.config(), &decision, now);
    }

    tracing::debug!(
        limiter = limiter.config().name,
        "Rate limit OK: {} remaining for key {}",
        decision.remaining,
        key
    );

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request as HttpRequest, routing::get};
    use chrono::TimeZone;
    use tower::ServiceExt;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn limiter(window_ms: u64, max: u32) -> RateLimiter {
        RateLimiter::in_memory(RateLimitConfig::new("test", window_ms, max, "slow down"))
    }

    #[tokio::test]
    async fn remaining_counts_down_to_zero_within_window() {
        let limiter = limiter(60_000, 5);
        let mut last_remaining = u32::MAX;
        for i in 0..5 {
            let decision = limiter
                .check_at("ip:10.0.0.1", t0() + Duration::milliseconds(i * 10))
                .await;
            assert!(decision.allowed);
            assert!(decision.remaining < last_remaining);
            last_remaining = decision.remaining;
        }
        assert_eq!(last_remaining, 0);
    }

    #[tokio::test]
    async fn request_over_budget_is_rejected_with_same_reset() {
        let limiter = limiter(60_000, 3);
        let first = limiter.check_at("ip:10.0.0.1", t0()).await;
        limiter.check_at("ip:10.0.0.1", t0()).await;
        limiter.check_at("ip:10.0.0.1", t0()).await;

        let rejected = limiter
            .check_at("ip:10.0.0.1", t0() + Duration::seconds(5))
            .await;
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.reset_at, first.reset_at);
    }

    #[tokio::test]
    async fn window_expiry_starts_a_fresh_window() {
        let limiter = limiter(60_000, 2);
        limiter.check_at("k", t0()).await;
        limiter.check_at("k", t0()).await;
        assert!(!limiter.check_at("k", t0()).await.allowed);

        let later = t0() + Duration::seconds(61);
        let decision = limiter.check_at("k", later).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
        assert_eq!(decision.reset_at, later + Duration::seconds(60));
    }

    #[tokio::test]
    async fn keys_are_counted_independently() {
        let limiter = limiter(60_000, 1);
        assert!(limiter.check_at("ip:1.1.1.1", t0()).await.allowed);
        assert!(!limiter.check_at("ip:1.1.1.1", t0()).await.allowed);

        let other = limiter.check_at("ip:2.2.2.2", t0()).await;
        assert!(other.allowed);
        assert_eq!(other.remaining, 0);
    }

    #[tokio::test]
    async fn two_per_second_example() {
        let limiter = limiter(1000, 2);
        let key = "ip:1.2.3.4";

        assert!(limiter.check_at(key, t0()).await.allowed);
        assert!(
            limiter
                .check_at(key, t0() + Duration::milliseconds(100))
                .await
                .allowed
        );
        assert!(
            !limiter
                .check_at(key, t0() + Duration::milliseconds(200))
                .await
                .allowed
        );
        assert!(
            limiter
                .check_at(key, t0() + Duration::milliseconds(1000))
                .await
                .allowed
        );
    }

    #[test]
    fn sweep_drops_expired_windows_of_other_keys() {
        let store = MemoryStore::new();
        let window = Duration::seconds(10);
        store.check("a", 5, window, t0());
        store.check("b", 5, window, t0());
        assert_eq!(store.entries.lock().unwrap().len(), 2);

        store.check("c", 5, window, t0() + Duration::seconds(11));
        assert_eq!(store.entries.lock().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_callers_never_exceed_max() {
        let store = Arc::new(MemoryStore::new());
        let window = Duration::seconds(60);
        let now = t0();

        let allowed: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = Arc::clone(&store);
                    scope.spawn(move || {
                        (0..25)
                            .filter(|_| store.check("shared", 10, window, now).allowed)
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(allowed, 10);
    }

    #[test]
    fn retry_after_rounds_up() {
        let decision = RateLimitDecision {
            allowed: false,
            limit: 1,
            remaining: 0,
            reset_at: t0() + Duration::milliseconds(1500),
        };
        assert_eq!(decision.retry_after_secs(t0()), 2);
        assert_eq!(decision.retry_after_secs(t0() + Duration::seconds(5)), 0);
    }

    #[test]
    fn zero_max_is_clamped() {
        assert_eq!(RateLimitConfig::new("x", 1000, 0, "m").max, 1);
    }

    #[test]
    fn key_prefers_authorization_digest() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        headers.insert("x-forwarded-for", "9.9.9.9".parse().unwrap());

        let key = rate_limit_key(&headers, None);
        assert!(key.starts_with("user:"));
        assert_eq!(key.len(), "user:".len() + CREDENTIAL_DIGEST_LEN);
        assert!(!key.contains("ghi"));
    }

    #[test]
    fn credentials_sharing_a_suffix_get_distinct_keys() {
        let mut a = HeaderMap::new();
        a.insert(header::AUTHORIZATION, "Bearer aaaa-0123456789".parse().unwrap());
        let mut b = HeaderMap::new();
        b.insert(header::AUTHORIZATION, "Bearer bbbb-0123456789".parse().unwrap());

        assert_ne!(rate_limit_key(&a, None), rate_limit_key(&b, None));
    }

    #[test]
    fn key_falls_back_to_forwarded_then_peer_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", " 1.2.3.4 , 10.0.0.1".parse().unwrap());
        assert_eq!(rate_limit_key(&headers, None), "ip:1.2.3.4");

        let peer: IpAddr = "192.168.1.7".parse().unwrap();
        assert_eq!(rate_limit_key(&HeaderMap::new(), Some(peer)), "ip:192.168.1.7");
        assert_eq!(rate_limit_key(&HeaderMap::new(), None), "ip:unknown");
    }

    fn throttled_app(max: u32) -> Router {
        let limiter = Arc::new(limiter(60_000, max));
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(
                limiter,
                enforce_rate_limit,
            ))
    }

    fn request_from(ip: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .uri("/")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn middleware_adds_headers_to_allowed_responses() {
        let app = throttled_app(2);
        let response = app.oneshot(request_from("5.6.7.8")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "2");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "1");
        assert!(response.headers().contains_key("x-ratelimit-reset"));
    }

    #[tokio::test]
    async fn middleware_rejects_with_retry_metadata() {
        let app = throttled_app(1);
        let ok = app.clone().oneshot(request_from("5.6.7.8")).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        let response = app.oneshot(request_from("5.6.7.8")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");

        let retry_after: u64 = response.headers()[header::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(retry_after > 0 && retry_after <= 60);

        let reset = response.headers()["x-ratelimit-reset"].to_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(reset).is_ok());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "slow down");
        assert_eq!(json["retryAfter"].as_u64(), Some(retry_after));
    }

    #[test]
    fn rejection_uses_configured_status() {
        let config = RateLimitConfig::new("custom", 1_000, 1, "busy")
            .with_status(StatusCode::SERVICE_UNAVAILABLE);
        let now = t0();
        let decision = RateLimitDecision {
            allowed: false,
            limit: 1,
            remaining: 0,
            reset_at: now + Duration::milliseconds(1_500),
        };

        let response = rejection_response(&config, &decision, now);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn shared_counter_over_budget_reports_time_left() {
        let now = t0();
        let decision = window_decision(6, 2_500, 5, now);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.retry_after_secs(now), 3);

        let decision = window_decision(5, 2_500, 5, now);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn shared_counter_with_rearmed_window_never_reports_zero_retry() {
        // A counter found without expiry is re-armed to a full window
        let now = t0();
        let decision = window_decision(9, 60_000, 5, now);
        assert!(!decision.allowed);
        assert_eq!(decision.reset_at, now + Duration::seconds(60));
        assert_eq!(decision.retry_after_secs(now), 60);
    }
}
