//! Share capabilities: issuance, public access, listing, revocation.

use super::{iso, user_key_for};
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ValidJson;
use crate::rate_limit::ClientMeta;
use crate::server::AppState;
use crate::storage::audit::{self, NewAudit};
use crate::storage::entries;
use crate::storage::models::{AuditAction, ShareRecord};
use crate::storage::shares::{self, NewShare};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use keyhaven_core::{decrypt_field, fingerprint, generate_token, EncryptedField};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const MAX_SHARE_VIEWS: u32 = 100;
const MAX_SHARE_HOURS: i64 = 24 * 30;

/// Share metadata exposed to the owner. Never carries the raw token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareDto {
    pub id: Uuid,
    pub entry_id: Uuid,
    pub max_views: u32,
    pub view_count: u32,
    pub expires_at: DateTime<Utc>,
    pub accessed_at: Option<DateTime<Utc>>,
    pub include_secret: bool,
    pub include_notes: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&ShareRecord> for ShareDto {
    fn from(record: &ShareRecord) -> Self {
        Self {
            id: record.id,
            entry_id: record.entry_id,
            max_views: record.max_views,
            view_count: record.view_count,
            expires_at: iso(record.expires_at),
            accessed_at: record.accessed_at.map(iso),
            include_secret: record.include_secret,
            include_notes: record.include_notes,
            created_at: iso(record.created_at),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateShareRequest {
    #[serde(default)]
    pub max_views: Option<u32>,
    #[serde(default)]
    pub expires_in_hours: Option<i64>,
    #[serde(default)]
    pub include_secret: Option<bool>,
    #[serde(default)]
    pub include_notes: Option<bool>,
}

/// Issue a capability token for one entry. The raw token appears in this
/// response and nowhere else.
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<ClientMeta>,
    Path(entry_id): Path<Uuid>,
    ValidJson(req): ValidJson<CreateShareRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let max_views = req.max_views.unwrap_or(1);
    if max_views == 0 || max_views > MAX_SHARE_VIEWS {
        return Err(ApiError::validation(
            "maxViews",
            format!("Must be between 1 and {MAX_SHARE_VIEWS}"),
        ));
    }
    let expires_in_hours = req.expires_in_hours.unwrap_or(24);
    if expires_in_hours <= 0 || expires_in_hours > MAX_SHARE_HOURS {
        return Err(ApiError::validation(
            "expiresInHours",
            format!("Must be between 1 and {MAX_SHARE_HOURS}"),
        ));
    }

    let raw_token = generate_token();
    let (record, title) = {
        let conn = state.storage.conn()?;
        let entry =
            entries::get(&conn, &user.account_id, &entry_id)?.ok_or(ApiError::NotFound)?;

        let record = shares::create(
            &conn,
            &NewShare {
                entry_id,
                account_id: user.account_id,
                token_fingerprint: &fingerprint(&raw_token),
                max_views,
                expires_at: Utc::now().timestamp() + expires_in_hours * 3600,
                include_secret: req.include_secret.unwrap_or(true),
                include_notes: req.include_notes.unwrap_or(false),
            },
        )?;
        (record, entry.title)
    };

    let mut audit_entry = NewAudit::new(user.account_id, AuditAction::Share);
    audit_entry.entry_id = Some(entry_id);
    audit_entry.entry_title = Some(&title);
    audit_entry.network_address = meta.address.as_deref();
    audit_entry.user_agent = meta.user_agent.as_deref();
    audit_entry.details = Some(serde_json::json!({
        "maxViews": record.max_views,
        "expiresAt": iso(record.expires_at),
    }));
    audit::record(&state.storage, &audit_entry);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "share": ShareDto::from(&record),
            "token": raw_token,
        })),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.storage.conn()?;
    let records = shares::list_for_account(&conn, &user.account_id)?;
    let shares: Vec<ShareDto> = records.iter().map(ShareDto::from).collect();
    Ok(Json(serde_json::json!({ "shares": shares })))
}

pub async fn revoke(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.storage.conn()?;
    if !shares::revoke(&conn, &user.account_id, &id)? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "message": "Share revoked" })))
}

/// Public capability access. Absent, expired, revoked and exhausted
/// capabilities are all the same NotFound; nothing confirms that a
/// capability ever existed.
pub async fn access(
    State(state): State<AppState>,
    Extension(meta): Extension<ClientMeta>,
    Path(token): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (record, body, title) = {
        let mut conn = state.storage.conn()?;
        let record = shares::consume(&mut conn, &fingerprint(&token), meta.address.as_deref())?
            .ok_or(ApiError::NotFound)?;

        let entry = entries::get(&conn, &record.account_id, &record.entry_id)?
            .ok_or(ApiError::NotFound)?;

        let mut body = serde_json::json!({
            "title": entry.title,
            "username": entry.username,
            "site": entry.site,
            "remainingViews": record.max_views - record.view_count,
            "expiresAt": iso(record.expires_at),
        });

        if record.include_secret {
            let key = user_key_for(&state, &conn, &record.account_id)?;
            let password = decrypt_field(
                &key,
                &EncryptedField {
                    ciphertext: entry.secret_ciphertext.clone(),
                    nonce: entry
                        .secret_nonce
                        .as_slice()
                        .try_into()
                        .map_err(|_| ApiError::Internal("Corrupt stored nonce".to_string()))?,
                    auth_tag: entry
                        .secret_auth_tag
                        .as_slice()
                        .try_into()
                        .map_err(|_| ApiError::Internal("Corrupt stored auth tag".to_string()))?,
                },
            )?;
            body["password"] = serde_json::Value::String(password);
        }
        if record.include_notes {
            body["notes"] = serde_json::to_value(&entry.notes)
                .map_err(|e| ApiError::Internal(e.to_string()))?;
        }

        let title = entry.title;
        (record, body, title)
    };

    // Audited against the issuing account, not the anonymous accessor.
    let mut audit_entry = NewAudit::new(record.account_id, AuditAction::ShareAccess);
    audit_entry.entry_id = Some(record.entry_id);
    audit_entry.entry_title = Some(&title);
    audit_entry.network_address = meta.address.as_deref();
    audit_entry.user_agent = meta.user_agent.as_deref();
    audit_entry.details = Some(serde_json::json!({
        "viewCount": record.view_count,
        "maxViews": record.max_views,
    }));
    audit::record(&state.storage, &audit_entry);

    Ok(Json(body))
}
