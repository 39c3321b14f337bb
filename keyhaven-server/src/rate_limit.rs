//! Token bucket rate limiter per client address, with a stricter bucket
//! for the authentication endpoints.

use crate::error::ApiError;
use crate::server::AppState;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    max_tokens: u32,
    refill_rate: f64, // tokens per second
}

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            max_tokens: max_requests,
            refill_rate: max_requests as f64 / window_secs as f64,
        }
    }

    pub fn check(&self, client: &str) -> bool {
        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();

        let bucket = buckets.entry(client.to_string()).or_insert(TokenBucket {
            tokens: self.max_tokens as f64,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.max_tokens as f64);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// The two buckets of the HTTP surface.
#[derive(Clone)]
pub struct RateLimiters {
    pub auth: RateLimiter,
    pub general: RateLimiter,
}

/// Connection metadata resolved once per request for rate limiting and
/// audit records.
#[derive(Debug, Clone)]
pub struct ClientMeta {
    pub address: Option<String>,
    pub user_agent: Option<String>,
}

fn resolve_client_meta(request: &Request<Body>) -> ClientMeta {
    let address = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        });

    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    ClientMeta {
        address,
        user_agent,
    }
}

/// Rate limiting middleware. Auth endpoints draw from the strict bucket,
/// everything else from the general one. Also stashes [`ClientMeta`] on
/// the request for downstream handlers.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let meta = resolve_client_meta(&request);
    let client = meta.address.clone().unwrap_or_else(|| "unknown".to_string());

    let limiter = if request.uri().path().starts_with("/api/auth") {
        &state.limiters.auth
    } else {
        &state.limiters.general
    };

    if !limiter.check(&client) {
        return Err(ApiError::RateLimited);
    }

    request.extensions_mut().insert(meta);
    Ok(next.run(request).await)
}
