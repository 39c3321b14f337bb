//! Tag management.

use super::iso;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::extract::ValidJson;
use crate::server::AppState;
use crate::storage::tags;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagDto {
    pub id: Uuid,
    pub name: String,
    pub entry_count: i64,
    pub created_at: DateTime<Utc>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.storage.conn()?;
    let rows = tags::list(&conn, &user.account_id)?;

    let tags: Vec<TagDto> = rows
        .into_iter()
        .map(|(tag, count)| TagDto {
            id: tag.id,
            name: tag.name,
            entry_count: count,
            created_at: iso(tag.created_at),
        })
        .collect();

    Ok(Json(serde_json::json!({ "tags": tags })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateTagRequest {
    pub name: String,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidJson(req): ValidJson<CreateTagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name", "Name is required"));
    }

    let conn = state.storage.conn()?;
    let tag = tags::get_or_create(&conn, &user.account_id, name)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "tag": TagDto {
                id: tag.id,
                name: tag.name,
                entry_count: 0,
                created_at: iso(tag.created_at),
            }
        })),
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conn = state.storage.conn()?;
    if !tags::delete(&conn, &user.account_id, &id)? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "message": "Tag deleted" })))
}
