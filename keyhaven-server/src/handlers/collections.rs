//! Collection (folder) management.

use super::iso;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ValidJson;
use crate::server::AppState;
use crate::storage::collections::{self, NewCollection};
use crate::storage::models::Collection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub entry_count: i64,
    pub created_at: DateTime<Utc>,
}

impl CollectionDto {
    fn from_row(collection: Collection, entry_count: i64) -> Self {
        Self {
            id: collection.id,
            name: collection.name,
            description: collection.description,
            icon: collection.icon,
            color: collection.color,
            entry_count,
            created_at: iso(collection.created_at),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CollectionRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

impl CollectionRequest {
    fn validate(&self) -> Result<NewCollection<'_>, ApiError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ApiError::validation("name", "Name is required"));
        }
        Ok(NewCollection {
            name,
            description: self.description.as_deref(),
            icon: self.icon.as_deref(),
            color: self.color.as_deref(),
        })
    }
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.storage.conn()?;
    let rows = collections::list(&conn, &user.account_id)?;

    let collections: Vec<CollectionDto> = rows
        .into_iter()
        .map(|(collection, count)| CollectionDto::from_row(collection, count))
        .collect();

    Ok(Json(serde_json::json!({ "collections": collections })))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidJson(req): ValidJson<CollectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = req.validate()?;

    let conn = state.storage.conn()?;
    let collection = collections::create(&conn, &user.account_id, &new)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "collection": CollectionDto::from_row(collection, 0) })),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ValidJson(req): ValidJson<CollectionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let new = req.validate()?;

    let conn = state.storage.conn()?;
    let collection =
        collections::update(&conn, &user.account_id, &id, &new)?.ok_or(ApiError::NotFound)?;

    let entry_count = collections::list(&conn, &user.account_id)?
        .into_iter()
        .find(|(c, _)| c.id == id)
        .map(|(_, count)| count)
        .unwrap_or(0);

    Ok(Json(serde_json::json!({
        "collection": CollectionDto::from_row(collection, entry_count)
    })))
}

/// Delete a collection. Entries inside it become uncategorised.
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.storage.conn()?;
    if !collections::delete(&conn, &user.account_id, &id)? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "message": "Collection deleted" })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssignRequest {
    pub entry_ids: Vec<Uuid>,
    /// `null` moves the entries to uncategorised.
    pub collection_id: Option<Uuid>,
}

/// Move entries into (or out of) a collection. The caller must own both
/// the entries and the target collection; foreign entries are skipped by
/// the scoped update.
pub async fn assign(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidJson(req): ValidJson<AssignRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.storage.conn()?;

    if let Some(collection_id) = &req.collection_id {
        collections::get(&conn, &user.account_id, collection_id)?.ok_or(ApiError::NotFound)?;
    }

    let moved = collections::assign_entries(
        &conn,
        &user.account_id,
        req.collection_id.as_ref(),
        &req.entry_ids,
    )?;

    Ok(Json(serde_json::json!({ "moved": moved })))
}
