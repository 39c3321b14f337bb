//! Per-account collections (folders).

use super::models::Collection;
use super::{now, uuid_from_sql};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

fn collection_from_row(row: &Row<'_>) -> rusqlite::Result<Collection> {
    Ok(Collection {
        id: uuid_from_sql(row.get(0)?)?,
        account_id: uuid_from_sql(row.get(1)?)?,
        name: row.get(2)?,
        description: row.get(3)?,
        icon: row.get(4)?,
        color: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const COLLECTION_COLUMNS: &str = "id, account_id, name, description, icon, color, created_at";

pub struct NewCollection<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub icon: Option<&'a str>,
    pub color: Option<&'a str>,
}

pub fn create(
    conn: &Connection,
    account_id: &Uuid,
    new: &NewCollection<'_>,
) -> rusqlite::Result<Collection> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO collections (id, account_id, name, description, icon, color, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.to_string(),
            account_id.to_string(),
            new.name,
            new.description,
            new.icon,
            new.color,
            now(),
        ],
    )?;
    get(conn, account_id, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

pub fn get(
    conn: &Connection,
    account_id: &Uuid,
    id: &Uuid,
) -> rusqlite::Result<Option<Collection>> {
    conn.query_row(
        &format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = ?1 AND account_id = ?2"),
        params![id.to_string(), account_id.to_string()],
        collection_from_row,
    )
    .optional()
}

/// Collections with their entry counts, name-ordered.
pub fn list(conn: &Connection, account_id: &Uuid) -> rusqlite::Result<Vec<(Collection, i64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLLECTION_COLUMNS},
                (SELECT COUNT(*) FROM entries WHERE entries.collection_id = collections.id) AS entry_count
         FROM collections WHERE account_id = ?1 ORDER BY name ASC"
    ))?;
    let rows = stmt.query_map([account_id.to_string()], |row| {
        Ok((collection_from_row(row)?, row.get(7)?))
    })?;
    rows.collect()
}

pub fn update(
    conn: &Connection,
    account_id: &Uuid,
    id: &Uuid,
    new: &NewCollection<'_>,
) -> rusqlite::Result<Option<Collection>> {
    let changed = conn.execute(
        "UPDATE collections SET name = ?1, description = ?2, icon = ?3, color = ?4
         WHERE id = ?5 AND account_id = ?6",
        params![
            new.name,
            new.description,
            new.icon,
            new.color,
            id.to_string(),
            account_id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    get(conn, account_id, id)
}

/// Delete a collection. Child entries are re-parented to the null
/// collection by the `ON DELETE SET NULL` foreign key, in the same
/// implicit transaction as the delete.
pub fn delete(conn: &Connection, account_id: &Uuid, id: &Uuid) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "DELETE FROM collections WHERE id = ?1 AND account_id = ?2",
        params![id.to_string(), account_id.to_string()],
    )?;
    Ok(changed > 0)
}

/// Move entries into a collection (or out of any, when `collection_id`
/// is `None`). Only entries owned by `account_id` move; the count of
/// entries actually moved is returned.
pub fn assign_entries(
    conn: &Connection,
    account_id: &Uuid,
    collection_id: Option<&Uuid>,
    entry_ids: &[Uuid],
) -> rusqlite::Result<usize> {
    if entry_ids.is_empty() {
        return Ok(0);
    }

    let placeholders = vec!["?"; entry_ids.len()].join(", ");
    let sql = format!(
        "UPDATE entries SET collection_id = ?, updated_at = ? \
         WHERE account_id = ? AND id IN ({placeholders})"
    );

    let mut args: Vec<Box<dyn ToSql>> = vec![
        Box::new(collection_id.map(|c| c.to_string())),
        Box::new(now()),
        Box::new(account_id.to_string()),
    ];
    for entry_id in entry_ids {
        args.push(Box::new(entry_id.to_string()));
    }

    conn.execute(&sql, params_from_iter(args.iter()))
}
