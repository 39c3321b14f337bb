//! Audit log queries.

use super::iso;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::server::AppState;
use crate::storage::audit::{self, AuditQuery};
use crate::storage::models::{AuditAction, AuditRow};
use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDto {
    pub id: i64,
    pub action: &'static str,
    pub entry_id: Option<Uuid>,
    pub entry_title: Option<String>,
    pub network_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditDto {
    fn from(row: AuditRow) -> Self {
        Self {
            id: row.id,
            action: row.action.as_str(),
            entry_id: row.entry_id,
            entry_title: row.entry_title,
            network_address: row.network_address,
            user_agent: row.user_agent,
            details: row.details,
            created_at: iso(row.created_at),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListParams {
    pub action: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let action = match params.action.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            AuditAction::parse(raw)
                .ok_or_else(|| ApiError::validation("action", "Unknown action"))?,
        ),
    };

    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(50).clamp(1, 200);

    let query = AuditQuery {
        action,
        from: params.from.map(|dt| dt.timestamp()),
        to: params.to.map(|dt| dt.timestamp()),
        page,
        page_size,
    };

    let conn = state.storage.conn()?;
    let (rows, total) = audit::query(&conn, &user.account_id, &query)?;
    let records: Vec<AuditDto> = rows.into_iter().map(AuditDto::from).collect();

    Ok(Json(serde_json::json!({
        "records": records,
        "total": total,
        "page": page,
        "pageSize": page_size,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SummaryParams {
    pub days: Option<u32>,
}

pub async fn summary(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let days = params.days.unwrap_or(30).clamp(1, 365);

    let conn = state.storage.conn()?;
    let groups = audit::summary(&conn, &user.account_id, days)?;

    let mut actions = serde_json::Map::new();
    for (action, count) in groups {
        actions.insert(action, serde_json::json!(count));
    }

    Ok(Json(serde_json::json!({
        "days": days,
        "actions": actions,
    })))
}
