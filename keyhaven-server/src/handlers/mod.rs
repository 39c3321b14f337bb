//! HTTP request handlers.

pub mod audit;
pub mod auth;
pub mod collections;
pub mod passwords;
pub mod shares;
pub mod tags;

use crate::error::ApiError;
use crate::server::AppState;
use crate::storage::models::Account;
use chrono::{DateTime, Utc};
use keyhaven_core::{unwrap_user_key, UserKey};
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

/// Convert a stored unix timestamp to a wire timestamp.
pub(crate) fn iso(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

/// Load the caller's account and materialise its decryption key for the
/// duration of the request. The unwrapped key is dropped (and zeroized)
/// when the handler returns.
pub(crate) fn user_key_for(
    state: &AppState,
    conn: &Connection,
    account_id: &Uuid,
) -> Result<UserKey, ApiError> {
    let account = crate::storage::accounts::find_by_id(conn, account_id)?
        .ok_or(ApiError::Unauthenticated { expired: false })?;

    let wrapped = account
        .wrapped_key
        .ok_or_else(|| ApiError::Internal("Account has no vault key".to_string()))?;

    Ok(unwrap_user_key(&wrapped, &state.config.master_key)?)
}

/// Account shape exposed over the wire.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for UserDto {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            name: account.display_name.clone(),
            created_at: iso(account.created_at),
        }
    }
}
