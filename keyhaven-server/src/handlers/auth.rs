//! Registration, login, session refresh and OAuth sign-in.

use super::UserDto;
use crate::auth::{
    clear_refresh_cookie, cookie_value, issue_access_token, oauth_state_cookie, refresh_cookie,
    AuthUser, OAUTH_STATE_COOKIE, REFRESH_COOKIE,
};
use crate::error::{ApiError, FieldError};
use crate::extract::ValidJson;
use crate::oauth::{self, Provider};
use crate::rate_limit::ClientMeta;
use crate::server::AppState;
use crate::storage::accounts::{self, NewAccount};
use crate::storage::audit::{self, NewAudit};
use crate::storage::models::{Account, AuditAction};
use crate::storage::refresh;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use keyhaven_core::{fingerprint, generate_token, hash_password, verify_password, wrap_user_key, UserKey};
use serde::Deserialize;

/// Parseable but never-matching hash, verified on unknown-email logins so
/// both failure paths cost one Argon2 verification.
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$AAAAAAAAAAAAAAAAAAAAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

fn validate_email(email: &str, errors: &mut Vec<FieldError>) {
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        errors.push(FieldError::new("email", "Invalid email address"));
    }
}

fn validate_password_policy(password: &str, errors: &mut Vec<FieldError>) {
    if password.chars().count() < 8 {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 8 characters",
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        errors.push(FieldError::new(
            "password",
            "Password must contain an uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        errors.push(FieldError::new(
            "password",
            "Password must contain a lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push(FieldError::new("password", "Password must contain a digit"));
    }
}

/// Issue the session pair for an account: a short-lived access token and
/// a long-lived opaque refresh token whose fingerprint is persisted.
fn issue_session(
    state: &AppState,
    conn: &rusqlite::Connection,
    account: &Account,
) -> Result<(String, String), ApiError> {
    let access_token = issue_access_token(&state.config, &account.id, account.email.as_deref())?;

    let raw_refresh = generate_token();
    let expires_at = chrono::Utc::now().timestamp() + state.config.refresh_ttl_secs;
    refresh::create(conn, &account.id, &fingerprint(&raw_refresh), expires_at)?;

    let cookie = refresh_cookie(
        &raw_refresh,
        state.config.refresh_ttl_secs,
        state.config.production,
    );
    Ok((access_token, cookie))
}

pub async fn register(
    State(state): State<AppState>,
    Extension(meta): Extension<ClientMeta>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut errors = Vec::new();
    validate_email(&req.email, &mut errors);
    validate_password_policy(&req.password, &mut errors);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let conn = state.storage.conn()?;

    if accounts::find_by_email(&conn, &req.email)?.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let credential_hash = hash_password(&req.password, state.config.hash_time_cost)?;
    let wrapped = wrap_user_key(&UserKey::generate(), &state.config.master_key)?;

    let account = accounts::create(
        &conn,
        &NewAccount {
            email: Some(&req.email),
            credential_hash: Some(&credential_hash),
            display_name: req.name.as_deref(),
            wrapped_key: &wrapped,
        },
    )?;

    let (access_token, cookie) = issue_session(&state, &conn, &account)?;
    drop(conn);

    let mut entry = NewAudit::new(account.id, AuditAction::Login);
    entry.network_address = meta.address.as_deref();
    entry.user_agent = meta.user_agent.as_deref();
    audit::record(&state.storage, &entry);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({
            "user": UserDto::from(&account),
            "accessToken": access_token,
        })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Extension(meta): Extension<ClientMeta>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conn = state.storage.conn()?;

    let account = accounts::find_by_email(&conn, &req.email)?;

    // Unknown email and wrong password take the same path and return the
    // same error.
    let stored_hash = account
        .as_ref()
        .and_then(|a| a.credential_hash.as_deref())
        .unwrap_or(DUMMY_HASH);
    if !verify_password(&req.password, stored_hash) {
        return Err(ApiError::InvalidCredentials);
    }
    let account = account.ok_or(ApiError::InvalidCredentials)?;

    let (access_token, cookie) = issue_session(&state, &conn, &account)?;
    drop(conn);

    let mut entry = NewAudit::new(account.id, AuditAction::Login);
    entry.network_address = meta.address.as_deref();
    entry.user_agent = meta.user_agent.as_deref();
    audit::record(&state.storage, &entry);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({
            "user": UserDto::from(&account),
            "accessToken": access_token,
        })),
    ))
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let raw = cookie_value(&headers, REFRESH_COOKIE)
        .ok_or(ApiError::Unauthenticated { expired: false })?;

    let conn = state.storage.conn()?;
    let record = refresh::find_active_by_fingerprint(&conn, &fingerprint(&raw))?
        .ok_or(ApiError::Unauthenticated { expired: false })?;

    let account = accounts::find_by_id(&conn, &record.account_id)?
        .ok_or(ApiError::Unauthenticated { expired: false })?;

    let access_token = issue_access_token(&state.config, &account.id, account.email.as_deref())?;

    Ok(Json(serde_json::json!({
        "accessToken": access_token,
        "user": UserDto::from(&account),
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(meta): Extension<ClientMeta>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(raw) = cookie_value(&headers, REFRESH_COOKIE) {
        let fp = fingerprint(&raw);
        let conn = state.storage.conn()?;
        let record = refresh::find_active_by_fingerprint(&conn, &fp)?;
        refresh::revoke_by_fingerprint(&conn, &fp)?;
        drop(conn);

        if let Some(record) = record {
            let mut entry = NewAudit::new(record.account_id, AuditAction::Logout);
            entry.network_address = meta.address.as_deref();
            entry.user_agent = meta.user_agent.as_deref();
            audit::record(&state.storage, &entry);
        }
    }

    Ok((
        [(
            header::SET_COOKIE,
            clear_refresh_cookie(state.config.production),
        )],
        Json(serde_json::json!({ "message": "Logged out" })),
    ))
}

/// Revoke every refresh credential of the caller.
pub async fn revoke_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let conn = state.storage.conn()?;
    let revoked = refresh::revoke_all_for_account(&conn, &user.account_id)?;

    Ok((
        [(
            header::SET_COOKIE,
            clear_refresh_cookie(state.config.production),
        )],
        Json(serde_json::json!({ "revoked": revoked })),
    ))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.storage.conn()?;
    let account = accounts::find_by_id(&conn, &user.account_id)?
        .ok_or(ApiError::Unauthenticated { expired: false })?;

    Ok(Json(serde_json::json!({ "user": UserDto::from(&account) })))
}

fn provider_credentials(
    state: &AppState,
    provider: Provider,
) -> Result<crate::config::OAuthCredentials, ApiError> {
    let credentials = match provider {
        Provider::Google => state.config.google.clone(),
        Provider::Github => state.config.github.clone(),
    };
    credentials.ok_or(ApiError::NotFound)
}

pub async fn oauth_start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let provider = Provider::parse(&provider).ok_or(ApiError::NotFound)?;
    let credentials = provider_credentials(&state, provider)?;

    let oauth_state = generate_token();
    let url = oauth::authorize_url(provider, &credentials, &oauth_state);

    Ok((
        StatusCode::FOUND,
        [
            (header::LOCATION, url),
            (
                header::SET_COOKIE,
                oauth_state_cookie(&oauth_state, state.config.production),
            ),
        ],
    ))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

pub async fn oauth_callback(
    State(state): State<AppState>,
    Extension(meta): Extension<ClientMeta>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let provider = Provider::parse(&provider).ok_or(ApiError::NotFound)?;
    let credentials = provider_credentials(&state, provider)?;

    let pinned = cookie_value(&headers, OAUTH_STATE_COOKIE)
        .ok_or(ApiError::Unauthenticated { expired: false })?;
    if pinned != query.state {
        return Err(ApiError::Unauthenticated { expired: false });
    }

    let profile = oauth::exchange_code(provider, &credentials, &state.http, &query.code).await?;

    // A fresh wrapped key is supplied for the find-or-link transaction;
    // it is only installed when the resolved account lacks one.
    let fresh_wrapped = wrap_user_key(&UserKey::generate(), &state.config.master_key)?;

    let mut conn = state.storage.conn()?;
    let (account, _created) = accounts::find_or_create_oauth_link(
        &mut conn,
        provider.as_str(),
        &profile.provider_account_id,
        profile.email.as_deref(),
        profile.display_name.as_deref(),
        &fresh_wrapped,
    )?;

    let (_access_token, session_cookie) = issue_session(&state, &conn, &account)?;
    drop(conn);

    let mut entry = NewAudit::new(account.id, AuditAction::Login);
    entry.network_address = meta.address.as_deref();
    entry.user_agent = meta.user_agent.as_deref();
    entry.details = Some(serde_json::json!({ "provider": provider.as_str() }));
    audit::record(&state.storage, &entry);

    // The bearer credential is never placed in the redirect URL; the
    // frontend obtains one through the refresh endpoint.
    Ok((
        StatusCode::FOUND,
        axum::response::AppendHeaders([
            (header::LOCATION, state.config.oauth_success_url()),
            (header::SET_COOKIE, session_cookie),
            (
                header::SET_COOKIE,
                oauth_state_cookie("", state.config.production),
            ),
        ]),
    ))
}
