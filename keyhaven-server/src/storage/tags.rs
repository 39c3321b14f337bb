//! Per-account tags. Creation is idempotent on `(account_id, name)`.

use super::models::Tag;
use super::{now, uuid_from_sql};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

fn tag_from_row(row: &Row<'_>) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: uuid_from_sql(row.get(0)?)?,
        account_id: uuid_from_sql(row.get(1)?)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Find or create a tag by name. Concurrent creates of the same
/// `(account_id, name)` collapse onto the unique constraint.
pub fn get_or_create(conn: &Connection, account_id: &Uuid, name: &str) -> rusqlite::Result<Tag> {
    conn.execute(
        "INSERT INTO tags (id, account_id, name, created_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (account_id, name) DO NOTHING",
        params![
            Uuid::new_v4().to_string(),
            account_id.to_string(),
            name,
            now(),
        ],
    )?;

    conn.query_row(
        "SELECT id, account_id, name, created_at FROM tags WHERE account_id = ?1 AND name = ?2",
        params![account_id.to_string(), name],
        tag_from_row,
    )
}

/// Tags with usage counts, name-ordered.
pub fn list(conn: &Connection, account_id: &Uuid) -> rusqlite::Result<Vec<(Tag, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT id, account_id, name, created_at,
                (SELECT COUNT(*) FROM entry_tags WHERE entry_tags.tag_id = tags.id) AS usage
         FROM tags WHERE account_id = ?1 ORDER BY name ASC",
    )?;
    let rows = stmt.query_map([account_id.to_string()], |row| {
        Ok((tag_from_row(row)?, row.get(4)?))
    })?;
    rows.collect()
}

pub fn find_by_id(conn: &Connection, account_id: &Uuid, id: &Uuid) -> rusqlite::Result<Option<Tag>> {
    conn.query_row(
        "SELECT id, account_id, name, created_at FROM tags WHERE id = ?1 AND account_id = ?2",
        params![id.to_string(), account_id.to_string()],
        tag_from_row,
    )
    .optional()
}

/// Delete a tag; join rows cascade.
pub fn delete(conn: &Connection, account_id: &Uuid, id: &Uuid) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "DELETE FROM tags WHERE id = ?1 AND account_id = ?2",
        params![id.to_string(), account_id.to_string()],
    )?;
    Ok(changed > 0)
}
