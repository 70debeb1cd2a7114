//! Request middleware: request IDs, API-key checks, and per-key throttling.
//!
//! Rejections are emitted through the same [`ApiError`] envelope the
//! handlers use, so every error a client sees carries a `request_id`.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;

/// Keys tracked by the throttle before stale windows are swept out.
const MAX_TRACKED_KEYS: usize = 1024;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Reads the request ID placed by [`request_id`]. Routes behind the
/// middleware stack always have one; "unknown" covers misassembled test
/// routers rather than a production path.
fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map_or_else(|| "unknown".to_owned(), |id| id.0.clone())
}

/// Bearer tokens accepted on protected routes.
#[derive(Debug, Clone)]
pub struct ApiKeys {
    keys: Arc<HashSet<String>>,
    pub enforced: bool,
}

impl ApiKeys {
    /// Builds the key set from `FORESIGHT_API_KEYS` (comma-separated).
    ///
    /// In development, an empty or missing variable disables the check for
    /// local iteration. Anywhere else it fails startup.
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var("FORESIGHT_API_KEYS").unwrap_or_default();
        let keys: HashSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        if keys.is_empty() {
            if is_development {
                tracing::warn!(
                    "FORESIGHT_API_KEYS not set; bearer auth disabled in development environment"
                );
                return Ok(Self {
                    keys: Arc::new(HashSet::new()),
                    enforced: false,
                });
            }

            anyhow::bail!(
                "FORESIGHT_API_KEYS is required outside development; provide comma-separated bearer tokens"
            );
        }

        Ok(Self {
            keys: Arc::new(keys),
            enforced: true,
        })
    }

    fn allows(&self, token: &str) -> bool {
        self.keys.contains(token)
    }
}

#[derive(Debug, Clone, Copy)]
struct KeyWindow {
    started_at: Instant,
    count: usize,
}

/// Fixed-window throttle tracked per bearer key, so one noisy client
/// cannot starve the others. Unauthenticated requests share one bucket.
#[derive(Clone)]
pub struct RateLimit {
    max_per_window: usize,
    window: Duration,
    windows: Arc<Mutex<HashMap<String, KeyWindow>>>,
}

impl RateLimit {
    #[must_use]
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts one request against `key`. Returns `false` when the key's
    /// current window is exhausted.
    async fn try_acquire(&self, key: &str) -> bool {
        let mut windows = self.windows.lock().await;
        let now = Instant::now();

        if windows.len() > MAX_TRACKED_KEYS {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started_at) < window);
        }

        let entry = windows.entry(key.to_owned()).or_insert(KeyWindow {
            started_at: now,
            count: 0,
        });
        if now.duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.count = 0;
        }

        if entry.count >= self.max_per_window {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// Axum middleware that extracts or generates a request ID.
///
/// An incoming `x-request-id` header is reused so upstream services can
/// correlate logs; otherwise a fresh `UUIDv4` is minted. The ID lands in
/// request extensions as [`RequestId`] and echoes back on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", value);
    }
    res
}

/// Middleware rejecting requests without a recognized bearer token.
pub async fn require_api_key(State(keys): State<ApiKeys>, req: Request, next: Next) -> Response {
    if !keys.enforced {
        return next.run(req).await;
    }

    match bearer_token(req.headers().get(AUTHORIZATION)) {
        Some(token) if keys.allows(token) => next.run(req).await,
        _ => ApiError::new(
            request_id_of(&req),
            "unauthorized",
            "missing or invalid bearer token",
        )
        .into_response(),
    }
}

/// Middleware counting each request against its bearer key's window.
pub async fn throttle_by_key(
    State(limiter): State<RateLimit>,
    req: Request,
    next: Next,
) -> Response {
    let key = bearer_token(req.headers().get(AUTHORIZATION))
        .unwrap_or("anonymous")
        .to_owned();

    if limiter.try_acquire(&key).await {
        next.run(req).await
    } else {
        tracing::warn!(key_window = %key_label(&key), "request rejected by rate limit");
        ApiError::new(
            request_id_of(&req),
            "rate_limited",
            "rate limit exceeded for this key",
        )
        .into_response()
    }
}

/// Keys are secrets; log only enough to tell buckets apart.
fn key_label(key: &str) -> String {
    if key == "anonymous" {
        key.to_owned()
    } else {
        let prefix: String = key.chars().take(4).collect();
        format!("key:{prefix}…")
    }
}

fn bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_accepts_valid_header() {
        let header = HeaderValue::from_static("Bearer test-token");
        assert_eq!(bearer_token(Some(&header)), Some("test-token"));
    }

    #[test]
    fn bearer_token_rejects_non_bearer_and_empty() {
        let basic = HeaderValue::from_static("Basic abc123");
        assert_eq!(bearer_token(Some(&basic)), None);
        let empty = HeaderValue::from_static("Bearer   ");
        assert_eq!(bearer_token(Some(&empty)), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn api_keys_unenforced_without_keys_in_dev() {
        std::env::remove_var("FORESIGHT_API_KEYS");
        let keys = ApiKeys::from_env(true).expect("dev should allow missing keys");
        assert!(!keys.enforced);
    }

    #[tokio::test]
    async fn throttle_windows_are_independent_per_key() {
        let limiter = RateLimit::new(2, Duration::from_secs(60));

        assert!(limiter.try_acquire("key-a").await);
        assert!(limiter.try_acquire("key-a").await);
        assert!(
            !limiter.try_acquire("key-a").await,
            "third request in the window must be rejected"
        );

        // A different key has its own untouched window.
        assert!(limiter.try_acquire("key-b").await);
        assert!(limiter.try_acquire("anonymous").await);
    }

    #[tokio::test]
    async fn throttle_window_resets_after_expiry() {
        let limiter = RateLimit::new(1, Duration::from_millis(10));
        assert!(limiter.try_acquire("key-a").await);
        assert!(!limiter.try_acquire("key-a").await);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(limiter.try_acquire("key-a").await, "expired window resets");
    }

    #[test]
    fn key_labels_do_not_leak_full_secrets() {
        assert_eq!(key_label("anonymous"), "anonymous");
        let label = key_label("super-secret-token");
        assert!(label.starts_with("key:supe"));
        assert!(!label.contains("secret-token"));
    }
}
