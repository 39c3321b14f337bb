//! Vault engine: CRUD, search, toggles, bulk operations, health
//! analysis, export/import over encrypted records.

use super::{iso, user_key_for};
use crate::auth::AuthUser;
use crate::error::{ApiError, FieldError};
use crate::extract::ValidJson;
use crate::rate_limit::ClientMeta;
use crate::server::AppState;
use crate::storage::audit::{self, NewAudit};
use crate::storage::entries::{self, EntryFilter, EntryFlag, EntryPatch, NewEntry, SecretUpdate};
use crate::storage::models::{AuditAction, EntryRow};
use crate::storage::{collections, tags};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use keyhaven_core::{decrypt_field, encrypt_field, strength_score, EncryptedField, UserKey};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

const OLD_ENTRY_DAYS: i64 = 90;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDto {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDto {
    pub id: Uuid,
    pub title: String,
    pub username: String,
    pub site: Option<String>,
    pub notes: Option<String>,
    pub collection_id: Option<Uuid>,
    pub tags: Vec<TagDto>,
    pub is_favorite: bool,
    pub is_pinned: bool,
    pub strength: u8,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl EntryDto {
    fn from_row(row: EntryRow, tags: Vec<TagDto>, password: Option<String>) -> Self {
        Self {
            id: row.id,
            title: row.title,
            username: row.username,
            site: row.site,
            notes: row.notes,
            collection_id: row.collection_id,
            tags,
            is_favorite: row.is_favorite,
            is_pinned: row.is_pinned,
            strength: row.strength,
            last_used_at: row.last_used_at.map(iso),
            created_at: iso(row.created_at),
            updated_at: iso(row.updated_at),
            password,
        }
    }
}

fn secret_field(row: &EntryRow) -> Result<EncryptedField, ApiError> {
    Ok(EncryptedField {
        ciphertext: row.secret_ciphertext.clone(),
        nonce: row
            .secret_nonce
            .as_slice()
            .try_into()
            .map_err(|_| ApiError::Internal("Corrupt stored nonce".to_string()))?,
        auth_tag: row
            .secret_auth_tag
            .as_slice()
            .try_into()
            .map_err(|_| ApiError::Internal("Corrupt stored auth tag".to_string()))?,
    })
}

fn tags_for_entries(
    conn: &Connection,
    account_id: &Uuid,
) -> Result<HashMap<Uuid, Vec<TagDto>>, ApiError> {
    let mut map: HashMap<Uuid, Vec<TagDto>> = HashMap::new();
    for (entry_id, tag_id, name) in entries::tag_links(conn, account_id)? {
        map.entry(entry_id).or_default().push(TagDto { id: tag_id, name });
    }
    Ok(map)
}

fn require_owned_collection(
    conn: &Connection,
    account_id: &Uuid,
    collection_id: &Uuid,
) -> Result<(), ApiError> {
    collections::get(conn, account_id, collection_id)?
        .map(|_| ())
        .ok_or_else(|| ApiError::validation("collectionId", "Unknown collection"))
}

fn resolve_tag_names(
    conn: &Connection,
    account_id: &Uuid,
    names: &[String],
) -> Result<Vec<Uuid>, ApiError> {
    let mut ids = Vec::new();
    for name in names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let tag = tags::get_or_create(conn, account_id, name)?;
        if !ids.contains(&tag.id) {
            ids.push(tag.id);
        }
    }
    Ok(ids)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateEntryRequest {
    pub title: String,
    #[serde(default)]
    pub username: Option<String>,
    pub password: String,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub collection_id: Option<Uuid>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    pub is_pinned: Option<bool>,
}

async fn create_entry(
    state: AppState,
    user: AuthUser,
    meta: ClientMeta,
    req: CreateEntryRequest,
    message: &'static str,
) -> Result<impl IntoResponse, ApiError> {
    if req.title.trim().is_empty() {
        return Err(ApiError::validation("title", "Title is required"));
    }

    let entry_dto = {
        let mut conn = state.storage.conn()?;
        let tx = conn.transaction().map_err(ApiError::from)?;

        let key = user_key_for(&state, &tx, &user.account_id)?;
        if let Some(collection_id) = &req.collection_id {
            require_owned_collection(&tx, &user.account_id, collection_id)?;
        }

        let strength = strength_score(&req.password);
        let encrypted = encrypt_field(&key, &req.password)?;

        let row = entries::insert(
            &tx,
            &NewEntry {
                account_id: user.account_id,
                title: req.title.trim(),
                username: req.username.as_deref().unwrap_or(""),
                site: req.site.as_deref(),
                notes: req.notes.as_deref(),
                secret_ciphertext: &encrypted.ciphertext,
                secret_nonce: &encrypted.nonce,
                secret_auth_tag: &encrypted.auth_tag,
                collection_id: req.collection_id,
                is_favorite: req.is_favorite.unwrap_or(false),
                is_pinned: req.is_pinned.unwrap_or(false),
                strength,
            },
        )?;

        let mut tag_dtos = Vec::new();
        if let Some(names) = &req.tags {
            let tag_ids = resolve_tag_names(&tx, &user.account_id, names)?;
            entries::set_tags(&tx, &row.id, &tag_ids)?;
            for tag_id in &tag_ids {
                if let Some(tag) = tags::find_by_id(&tx, &user.account_id, tag_id)? {
                    tag_dtos.push(TagDto {
                        id: tag.id,
                        name: tag.name,
                    });
                }
            }
        }

        tx.commit().map_err(ApiError::from)?;
        EntryDto::from_row(row, tag_dtos, None)
    };

    let mut record = NewAudit::new(user.account_id, AuditAction::Create);
    record.entry_id = Some(entry_dto.id);
    record.entry_title = Some(&entry_dto.title);
    record.network_address = meta.address.as_deref();
    record.user_agent = meta.user_agent.as_deref();
    audit::record(&state.storage, &record);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "entry": entry_dto, "message": message })),
    ))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<ClientMeta>,
    ValidJson(req): ValidJson<CreateEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    create_entry(state, user, meta, req, "Entry created").await
}

/// Same operation as `create`; kept as a separate route for clients that
/// save without opening the editor.
pub async fn direct_save(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<ClientMeta>,
    ValidJson(req): ValidJson<CreateEntryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    create_entry(state, user, meta, req, "Entry saved directly").await
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    pub query: Option<String>,
    pub collection_id: Option<Uuid>,
    /// Comma-separated tag ids.
    pub tag_ids: Option<String>,
    pub is_favorite: Option<bool>,
    pub is_pinned: Option<bool>,
    pub strength_min: Option<u8>,
    pub strength_max: Option<u8>,
}

impl ListQuery {
    fn into_filter(self) -> Result<EntryFilter, ApiError> {
        let tag_ids = match self.tag_ids.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(|part| {
                    Uuid::parse_str(part.trim())
                        .map_err(|_| ApiError::validation("tagIds", "Invalid tag id"))
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(EntryFilter {
            query: self.query.filter(|q| !q.trim().is_empty()),
            collection_id: self.collection_id,
            tag_ids,
            is_favorite: self.is_favorite,
            is_pinned: self.is_pinned,
            strength_min: self.strength_min,
            strength_max: self.strength_max,
        })
    }
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let filter = query.into_filter()?;

    let conn = state.storage.conn()?;
    let rows = entries::list(&conn, &user.account_id, &filter)?;
    let mut tag_map = tags_for_entries(&conn, &user.account_id)?;

    let entries: Vec<EntryDto> = rows
        .into_iter()
        .map(|row| {
            let tags = tag_map.remove(&row.id).unwrap_or_default();
            EntryDto::from_row(row, tags, None)
        })
        .collect();

    Ok(Json(serde_json::json!({ "entries": entries })))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<ClientMeta>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (dto, title) = {
        let conn = state.storage.conn()?;
        let row = entries::get(&conn, &user.account_id, &id)?.ok_or(ApiError::NotFound)?;

        let key = user_key_for(&state, &conn, &user.account_id)?;
        let password = decrypt_field(&key, &secret_field(&row)?)?;

        entries::touch_last_used(&conn, &user.account_id, &id)?;

        let mut tag_map = tags_for_entries(&conn, &user.account_id)?;
        let tags = tag_map.remove(&row.id).unwrap_or_default();
        let title = row.title.clone();
        (EntryDto::from_row(row, tags, Some(password)), title)
    };

    let mut record = NewAudit::new(user.account_id, AuditAction::Reveal);
    record.entry_id = Some(id);
    record.entry_title = Some(&title);
    record.network_address = meta.address.as_deref();
    record.user_agent = meta.user_agent.as_deref();
    audit::record(&state.storage, &record);

    Ok(Json(serde_json::json!({ "entry": dto })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct UpdateEntryRequest {
    pub title: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// `null` clears the field, absence leaves it untouched.
    pub site: Option<Option<String>>,
    pub notes: Option<Option<String>>,
    pub collection_id: Option<Option<Uuid>>,
    pub is_favorite: Option<bool>,
    pub is_pinned: Option<bool>,
    pub tags: Option<Vec<String>>,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<ClientMeta>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<UpdateEntryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(title) = &req.title {
        if title.trim().is_empty() {
            return Err(ApiError::validation("title", "Title cannot be empty"));
        }
    }

    let dto = {
        let mut conn = state.storage.conn()?;
        let tx = conn.transaction().map_err(ApiError::from)?;

        if let Some(Some(collection_id)) = &req.collection_id {
            require_owned_collection(&tx, &user.account_id, collection_id)?;
        }

        // A secret change re-encrypts under a fresh nonce and recomputes
        // strength; all three ciphertext components are rewritten together.
        let encrypted = match &req.password {
            Some(password) => {
                let key = user_key_for(&state, &tx, &user.account_id)?;
                Some((encrypt_field(&key, password)?, strength_score(password)))
            }
            None => None,
        };

        let patch = EntryPatch {
            title: req.title.as_deref().map(str::trim),
            username: req.username.as_deref(),
            site: req.site.as_ref().map(|o| o.as_deref()),
            notes: req.notes.as_ref().map(|o| o.as_deref()),
            collection_id: req.collection_id,
            is_favorite: req.is_favorite,
            is_pinned: req.is_pinned,
            secret: encrypted.as_ref().map(|(field, strength)| SecretUpdate {
                ciphertext: &field.ciphertext,
                nonce: &field.nonce,
                auth_tag: &field.auth_tag,
                strength: *strength,
            }),
        };

        let row =
            entries::update(&tx, &user.account_id, &id, &patch)?.ok_or(ApiError::NotFound)?;

        if let Some(names) = &req.tags {
            let tag_ids = resolve_tag_names(&tx, &user.account_id, names)?;
            entries::set_tags(&tx, &row.id, &tag_ids)?;
        }

        tx.commit().map_err(ApiError::from)?;

        let mut tag_map = tags_for_entries(&conn, &user.account_id)?;
        let tags = tag_map.remove(&row.id).unwrap_or_default();
        EntryDto::from_row(row, tags, None)
    };

    let mut record = NewAudit::new(user.account_id, AuditAction::Update);
    record.entry_id = Some(dto.id);
    record.entry_title = Some(&dto.title);
    record.network_address = meta.address.as_deref();
    record.user_agent = meta.user_agent.as_deref();
    audit::record(&state.storage, &record);

    Ok(Json(serde_json::json!({ "entry": dto })))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<ClientMeta>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let title = {
        let conn = state.storage.conn()?;
        let row = entries::get(&conn, &user.account_id, &id)?.ok_or(ApiError::NotFound)?;
        entries::delete(&conn, &user.account_id, &id)?;
        row.title
    };

    let mut record = NewAudit::new(user.account_id, AuditAction::Delete);
    record.entry_id = Some(id);
    record.entry_title = Some(&title);
    record.network_address = meta.address.as_deref();
    record.user_agent = meta.user_agent.as_deref();
    audit::record(&state.storage, &record);

    Ok(Json(serde_json::json!({ "message": "Entry deleted" })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BulkDeleteRequest {
    pub entry_ids: Vec<Uuid>,
}

pub async fn bulk_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<ClientMeta>,
    ValidJson(req): ValidJson<BulkDeleteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = {
        let conn = state.storage.conn()?;
        entries::bulk_delete(&conn, &user.account_id, &req.entry_ids)?
    };

    let mut record = NewAudit::new(user.account_id, AuditAction::Delete);
    record.network_address = meta.address.as_deref();
    record.user_agent = meta.user_agent.as_deref();
    record.details = Some(serde_json::json!({ "bulk": true, "count": count }));
    audit::record(&state.storage, &record);

    Ok(Json(serde_json::json!({ "count": count })))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.storage.conn()?;
    let value = entries::toggle_flag(&conn, &user.account_id, &id, EntryFlag::Favorite)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(serde_json::json!({ "isFavorite": value })))
}

pub async fn toggle_pin(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.storage.conn()?;
    let value = entries::toggle_flag(&conn, &user.account_id, &id, EntryFlag::Pinned)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(serde_json::json!({ "isPinned": value })))
}

/// Mark a credential as copied to the clipboard client-side.
pub async fn copy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<ClientMeta>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let title = {
        let conn = state.storage.conn()?;
        let row = entries::get(&conn, &user.account_id, &id)?.ok_or(ApiError::NotFound)?;
        entries::touch_last_used(&conn, &user.account_id, &id)?;
        row.title
    };

    let mut record = NewAudit::new(user.account_id, AuditAction::Copy);
    record.entry_id = Some(id);
    record.entry_title = Some(&title);
    record.network_address = meta.address.as_deref();
    record.user_agent = meta.user_agent.as_deref();
    audit::record(&state.storage, &record);

    Ok(Json(serde_json::json!({ "message": "Copy recorded" })))
}

#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub total: u32,
    pub strong: u32,
    pub medium: u32,
    pub weak: u32,
    pub no_secret: u32,
    pub old: u32,
    pub reused: u32,
}

fn analyze_health(rows: &[EntryRow], key: &UserKey, now: i64) -> HealthReport {
    let mut report = HealthReport::default();
    let mut plaintext_counts: HashMap<String, u32> = HashMap::new();

    for row in rows {
        report.total += 1;

        if row.created_at < now - OLD_ENTRY_DAYS * 86_400 {
            report.old += 1;
        }

        // One record failing to decrypt never fails the analysis.
        let plaintext = secret_field(row)
            .ok()
            .and_then(|field| decrypt_field(key, &field).ok());

        match plaintext {
            None => report.no_secret += 1,
            Some(plain) if plain.is_empty() => report.no_secret += 1,
            Some(plain) => {
                match strength_score(&plain) {
                    4 => report.strong += 1,
                    2..=3 => report.medium += 1,
                    _ => report.weak += 1,
                }
                *plaintext_counts.entry(plain).or_insert(0) += 1;
            }
        }
    }

    // Every member of a duplicate set counts as reused.
    report.reused = plaintext_counts
        .values()
        .filter(|&&count| count > 1)
        .sum();

    report
}

pub async fn health(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<HealthReport>, ApiError> {
    let conn = state.storage.conn()?;
    let rows = entries::list(&conn, &user.account_id, &EntryFilter::default())?;
    let key = user_key_for(&state, &conn, &user.account_id)?;

    Ok(Json(analyze_health(
        &rows,
        &key,
        chrono::Utc::now().timestamp(),
    )))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntry {
    pub title: String,
    pub username: String,
    pub password: Option<String>,
    pub site: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_favorite: bool,
    pub is_pinned: bool,
}

pub async fn export(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<ClientMeta>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let exported: Vec<ExportEntry> = {
        let conn = state.storage.conn()?;
        let rows = entries::list(&conn, &user.account_id, &EntryFilter::default())?;
        let key = user_key_for(&state, &conn, &user.account_id)?;

        rows.into_iter()
            .map(|row| {
                let password = secret_field(&row)
                    .ok()
                    .and_then(|field| decrypt_field(&key, &field).ok());
                ExportEntry {
                    title: row.title,
                    username: row.username,
                    password,
                    site: row.site,
                    notes: row.notes,
                    created_at: iso(row.created_at),
                    updated_at: iso(row.updated_at),
                    is_favorite: row.is_favorite,
                    is_pinned: row.is_pinned,
                }
            })
            .collect()
    };

    let mut record = NewAudit::new(user.account_id, AuditAction::Export);
    record.network_address = meta.address.as_deref();
    record.user_agent = meta.user_agent.as_deref();
    record.details = Some(serde_json::json!({ "count": exported.len() }));
    audit::record(&state.storage, &record);

    Ok(Json(serde_json::json!({
        "entries": exported,
        "exportedAt": Utc::now(),
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImportRequest {
    pub entries: Vec<ImportEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImportEntry {
    pub title: String,
    #[serde(default)]
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Best-effort import: entries that fail validation or encryption are
/// skipped, the rest are inserted.
pub async fn import(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Extension(meta): Extension<ClientMeta>,
    ValidJson(req): ValidJson<ImportRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let total = req.entries.len();
    let mut imported = 0usize;

    {
        let conn = state.storage.conn()?;
        let key = user_key_for(&state, &conn, &user.account_id)?;

        for entry in &req.entries {
            let title = entry.title.trim();
            let Some(password) = entry.password.as_deref() else {
                continue;
            };
            if title.is_empty() {
                continue;
            }

            let Ok(encrypted) = encrypt_field(&key, password) else {
                continue;
            };

            let inserted = entries::insert(
                &conn,
                &NewEntry {
                    account_id: user.account_id,
                    title,
                    username: entry.username.as_deref().unwrap_or(""),
                    site: entry.site.as_deref(),
                    notes: entry.notes.as_deref(),
                    secret_ciphertext: &encrypted.ciphertext,
                    secret_nonce: &encrypted.nonce,
                    secret_auth_tag: &encrypted.auth_tag,
                    collection_id: None,
                    is_favorite: false,
                    is_pinned: false,
                    strength: strength_score(password),
                },
            );
            if inserted.is_ok() {
                imported += 1;
            }
        }
    }

    let mut record = NewAudit::new(user.account_id, AuditAction::Import);
    record.network_address = meta.address.as_deref();
    record.user_agent = meta.user_agent.as_deref();
    record.details = Some(serde_json::json!({ "imported": imported, "skipped": total - imported }));
    audit::record(&state.storage, &record);

    Ok(Json(serde_json::json!({
        "imported": imported,
        "skipped": total - imported,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypted_row(key: &UserKey, secret: &str, created_at: i64) -> EntryRow {
        let field = encrypt_field(key, secret).unwrap();
        EntryRow {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            title: "t".to_string(),
            username: String::new(),
            site: None,
            notes: None,
            secret_ciphertext: field.ciphertext,
            secret_nonce: field.nonce.to_vec(),
            secret_auth_tag: field.auth_tag.to_vec(),
            collection_id: None,
            is_favorite: false,
            is_pinned: false,
            strength: strength_score(secret),
            last_used_at: None,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_health_classifies_by_recomputed_strength() {
        let key = UserKey::generate();
        let now = 1_700_000_000;
        let rows = vec![
            encrypted_row(&key, "Correct-Horse-Battery-Staple-9", now),
            encrypted_row(&key, "Pass123!x", now),
            encrypted_row(&key, "aaa", now),
            encrypted_row(&key, "", now),
        ];

        let report = analyze_health(&rows, &key, now);
        assert_eq!(report.total, 4);
        assert_eq!(report.strong, 1);
        assert_eq!(report.medium, 1);
        assert_eq!(report.weak, 1);
        assert_eq!(report.no_secret, 1);
    }

    #[test]
    fn test_health_counts_every_duplicate_occurrence() {
        let key = UserKey::generate();
        let now = 1_700_000_000;
        let rows = vec![
            encrypted_row(&key, "reuse-me", now),
            encrypted_row(&key, "reuse-me", now),
            encrypted_row(&key, "reuse-me", now),
        ];

        let report = analyze_health(&rows, &key, now);
        assert_eq!(report.total, 3);
        assert_eq!(report.reused, 3);
    }

    #[test]
    fn test_health_undecryptable_counts_as_no_secret() {
        let key = UserKey::generate();
        let other_key = UserKey::generate();
        let now = 1_700_000_000;
        let rows = vec![
            encrypted_row(&other_key, "unreadable", now),
            encrypted_row(&key, "Readable1!", now),
        ];

        let report = analyze_health(&rows, &key, now);
        assert_eq!(report.no_secret, 1);
        assert_eq!(report.total, 2);
    }

    #[test]
    fn test_health_flags_old_entries() {
        let key = UserKey::generate();
        let now = 1_700_000_000;
        let rows = vec![
            encrypted_row(&key, "Fresh123!", now - 86_400),
            encrypted_row(&key, "Stale123!", now - 120 * 86_400),
        ];

        let report = analyze_health(&rows, &key, now);
        assert_eq!(report.old, 1);
    }
}
