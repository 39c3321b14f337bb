//! Bearer credential issuance/verification and the authorization filter.

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::server::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Request};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the HTTP-only cookie carrying the raw refresh token.
pub const REFRESH_COOKIE: &str = "kh_refresh";
/// Short-lived cookie pinning the OAuth `state` parameter.
pub const OAUTH_STATE_COOKIE: &str = "kh_oauth_state";

/// Caller identity attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: Uuid,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    iat: i64,
    exp: i64,
}

pub fn issue_access_token(
    config: &ServerConfig,
    account_id: &Uuid,
    email: Option<&str>,
) -> Result<String, ApiError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: account_id.to_string(),
        email: email.map(str::to_string),
        iat: now,
        exp: now + config.access_ttl_secs,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Failed to sign access token: {}", e)))
}

/// Verify a bearer credential. Expiry is reported separately from other
/// failures so clients know to attempt a refresh.
pub fn verify_access_token(config: &ServerConfig, token: &str) -> Result<AuthUser, ApiError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            ApiError::Unauthenticated { expired: true }
        }
        _ => ApiError::Unauthenticated { expired: false },
    })?;

    let account_id = Uuid::parse_str(&data.claims.sub)
        .map_err(|_| ApiError::Unauthenticated { expired: false })?;

    Ok(AuthUser {
        account_id,
        email: data.claims.email,
    })
}

/// Authorization filter: resolves the bearer credential on every request
/// behind it and attaches the caller identity as a request extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthenticated { expired: false })?;

    let user = verify_access_token(&state.config, token)?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Build the Set-Cookie value for the refresh credential. Scoped to the
/// auth endpoints so the token is never sent anywhere else.
pub fn refresh_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{REFRESH_COOKIE}={token}; Max-Age={max_age_secs}; Path=/api/auth; HttpOnly; SameSite=Lax"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_refresh_cookie(secure: bool) -> String {
    refresh_cookie("", 0, secure)
}

pub fn oauth_state_cookie(state: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{OAUTH_STATE_COOKIE}={state}; Max-Age=600; Path=/api/auth; HttpOnly; SameSite=Lax"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Read a cookie value from the request headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}
