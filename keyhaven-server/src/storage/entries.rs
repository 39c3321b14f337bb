//! Encrypted credential records, always scoped to the owning account.

use super::models::EntryRow;
use super::{now, uuid_from_sql};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use uuid::Uuid;

const ENTRY_COLUMNS: &str = "id, account_id, title, username, site, notes, \
     secret_ciphertext, secret_nonce, secret_auth_tag, collection_id, \
     is_favorite, is_pinned, strength, last_used_at, created_at, updated_at";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<EntryRow> {
    let collection_id: Option<String> = row.get(9)?;
    Ok(EntryRow {
        id: uuid_from_sql(row.get(0)?)?,
        account_id: uuid_from_sql(row.get(1)?)?,
        title: row.get(2)?,
        username: row.get(3)?,
        site: row.get(4)?,
        notes: row.get(5)?,
        secret_ciphertext: row.get(6)?,
        secret_nonce: row.get(7)?,
        secret_auth_tag: row.get(8)?,
        collection_id: collection_id.map(uuid_from_sql).transpose()?,
        is_favorite: row.get(10)?,
        is_pinned: row.get(11)?,
        strength: row.get::<_, i64>(12)? as u8,
        last_used_at: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

pub struct NewEntry<'a> {
    pub account_id: Uuid,
    pub title: &'a str,
    pub username: &'a str,
    pub site: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub secret_ciphertext: &'a [u8],
    pub secret_nonce: &'a [u8],
    pub secret_auth_tag: &'a [u8],
    pub collection_id: Option<Uuid>,
    pub is_favorite: bool,
    pub is_pinned: bool,
    pub strength: u8,
}

/// Replacement for the authenticated secret triple; the three components
/// are always rewritten together.
pub struct SecretUpdate<'a> {
    pub ciphertext: &'a [u8],
    pub nonce: &'a [u8],
    pub auth_tag: &'a [u8],
    pub strength: u8,
}

/// Partial update. `None` leaves a column untouched; the nested option
/// distinguishes "set to null" from "leave alone" for nullable columns.
#[derive(Default)]
pub struct EntryPatch<'a> {
    pub title: Option<&'a str>,
    pub username: Option<&'a str>,
    pub site: Option<Option<&'a str>>,
    pub notes: Option<Option<&'a str>>,
    pub collection_id: Option<Option<Uuid>>,
    pub is_favorite: Option<bool>,
    pub is_pinned: Option<bool>,
    pub secret: Option<SecretUpdate<'a>>,
}

#[derive(Default, Clone)]
pub struct EntryFilter {
    pub query: Option<String>,
    pub collection_id: Option<Uuid>,
    pub tag_ids: Vec<Uuid>,
    pub is_favorite: Option<bool>,
    pub is_pinned: Option<bool>,
    pub strength_min: Option<u8>,
    pub strength_max: Option<u8>,
}

pub fn insert(conn: &Connection, new: &NewEntry<'_>) -> rusqlite::Result<EntryRow> {
    let id = Uuid::new_v4();
    let ts = now();

    conn.execute(
        "INSERT INTO entries (
            id, account_id, title, username, site, notes,
            secret_ciphertext, secret_nonce, secret_auth_tag, collection_id,
            is_favorite, is_pinned, strength, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            id.to_string(),
            new.account_id.to_string(),
            new.title,
            new.username,
            new.site,
            new.notes,
            new.secret_ciphertext,
            new.secret_nonce,
            new.secret_auth_tag,
            new.collection_id.map(|c| c.to_string()),
            new.is_favorite,
            new.is_pinned,
            new.strength,
            ts,
            ts,
        ],
    )?;

    get(conn, &new.account_id, &id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
}

pub fn get(conn: &Connection, account_id: &Uuid, id: &Uuid) -> rusqlite::Result<Option<EntryRow>> {
    conn.query_row(
        &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1 AND account_id = ?2"),
        params![id.to_string(), account_id.to_string()],
        entry_from_row,
    )
    .optional()
}

/// Filtered listing. Ordering: pinned first, then favourites, then most
/// recently updated; ties break on id.
pub fn list(
    conn: &Connection,
    account_id: &Uuid,
    filter: &EntryFilter,
) -> rusqlite::Result<Vec<EntryRow>> {
    let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE account_id = ?");
    let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(account_id.to_string())];

    if let Some(query) = &filter.query {
        let pattern = format!(
            "%{}%",
            query.to_lowercase().replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
        );
        sql.push_str(
            " AND (LOWER(title) LIKE ? ESCAPE '\\' \
               OR LOWER(username) LIKE ? ESCAPE '\\' \
               OR LOWER(COALESCE(site, '')) LIKE ? ESCAPE '\\' \
               OR LOWER(COALESCE(notes, '')) LIKE ? ESCAPE '\\')",
        );
        for _ in 0..4 {
            args.push(Box::new(pattern.clone()));
        }
    }

    if let Some(collection_id) = &filter.collection_id {
        sql.push_str(" AND collection_id = ?");
        args.push(Box::new(collection_id.to_string()));
    }

    if !filter.tag_ids.is_empty() {
        let placeholders = vec!["?"; filter.tag_ids.len()].join(", ");
        sql.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM entry_tags \
               WHERE entry_tags.entry_id = entries.id AND entry_tags.tag_id IN ({placeholders}))"
        ));
        for tag_id in &filter.tag_ids {
            args.push(Box::new(tag_id.to_string()));
        }
    }

    if let Some(is_favorite) = filter.is_favorite {
        sql.push_str(" AND is_favorite = ?");
        args.push(Box::new(is_favorite));
    }
    if let Some(is_pinned) = filter.is_pinned {
        sql.push_str(" AND is_pinned = ?");
        args.push(Box::new(is_pinned));
    }
    if let Some(min) = filter.strength_min {
        sql.push_str(" AND strength >= ?");
        args.push(Box::new(min as i64));
    }
    if let Some(max) = filter.strength_max {
        sql.push_str(" AND strength <= ?");
        args.push(Box::new(max as i64));
    }

    sql.push_str(" ORDER BY is_pinned DESC, is_favorite DESC, updated_at DESC, id ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), entry_from_row)?;
    rows.collect()
}

/// Apply a partial update. Returns the updated row, or `None` when no
/// entry matches `(id, account_id)`.
pub fn update(
    conn: &Connection,
    account_id: &Uuid,
    id: &Uuid,
    patch: &EntryPatch<'_>,
) -> rusqlite::Result<Option<EntryRow>> {
    let mut sets: Vec<&str> = Vec::new();
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(title) = patch.title {
        sets.push("title = ?");
        args.push(Box::new(title.to_string()));
    }
    if let Some(username) = patch.username {
        sets.push("username = ?");
        args.push(Box::new(username.to_string()));
    }
    if let Some(site) = &patch.site {
        sets.push("site = ?");
        args.push(Box::new(site.map(str::to_string)));
    }
    if let Some(notes) = &patch.notes {
        sets.push("notes = ?");
        args.push(Box::new(notes.map(str::to_string)));
    }
    if let Some(collection_id) = &patch.collection_id {
        sets.push("collection_id = ?");
        args.push(Box::new(collection_id.map(|c| c.to_string())));
    }
    if let Some(is_favorite) = patch.is_favorite {
        sets.push("is_favorite = ?");
        args.push(Box::new(is_favorite));
    }
    if let Some(is_pinned) = patch.is_pinned {
        sets.push("is_pinned = ?");
        args.push(Box::new(is_pinned));
    }
    if let Some(secret) = &patch.secret {
        sets.push("secret_ciphertext = ?");
        args.push(Box::new(secret.ciphertext.to_vec()));
        sets.push("secret_nonce = ?");
        args.push(Box::new(secret.nonce.to_vec()));
        sets.push("secret_auth_tag = ?");
        args.push(Box::new(secret.auth_tag.to_vec()));
        sets.push("strength = ?");
        args.push(Box::new(secret.strength as i64));
    }

    sets.push("updated_at = ?");
    args.push(Box::new(now()));

    let sql = format!(
        "UPDATE entries SET {} WHERE id = ? AND account_id = ?",
        sets.join(", ")
    );
    args.push(Box::new(id.to_string()));
    args.push(Box::new(account_id.to_string()));

    let changed = conn.execute(&sql, params_from_iter(args.iter()))?;
    if changed == 0 {
        return Ok(None);
    }
    get(conn, account_id, id)
}

pub fn delete(conn: &Connection, account_id: &Uuid, id: &Uuid) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "DELETE FROM entries WHERE id = ?1 AND account_id = ?2",
        params![id.to_string(), account_id.to_string()],
    )?;
    Ok(changed > 0)
}

/// Scoped bulk delete; returns the number of rows actually removed.
pub fn bulk_delete(conn: &Connection, account_id: &Uuid, ids: &[Uuid]) -> rusqlite::Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql =
        format!("DELETE FROM entries WHERE account_id = ? AND id IN ({placeholders})");

    let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(account_id.to_string())];
    for id in ids {
        args.push(Box::new(id.to_string()));
    }
    conn.execute(&sql, params_from_iter(args.iter()))
}

/// Idempotent boolean flip. Returns the new value, or `None` when no
/// entry matches.
pub fn toggle_flag(
    conn: &Connection,
    account_id: &Uuid,
    id: &Uuid,
    flag: EntryFlag,
) -> rusqlite::Result<Option<bool>> {
    let column = match flag {
        EntryFlag::Favorite => "is_favorite",
        EntryFlag::Pinned => "is_pinned",
    };
    let changed = conn.execute(
        &format!(
            "UPDATE entries SET {column} = 1 - {column}, updated_at = ?1 \
             WHERE id = ?2 AND account_id = ?3"
        ),
        params![now(), id.to_string(), account_id.to_string()],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    conn.query_row(
        &format!("SELECT {column} FROM entries WHERE id = ?1 AND account_id = ?2"),
        params![id.to_string(), account_id.to_string()],
        |row| row.get(0),
    )
    .optional()
}

#[derive(Clone, Copy)]
pub enum EntryFlag {
    Favorite,
    Pinned,
}

pub fn touch_last_used(conn: &Connection, account_id: &Uuid, id: &Uuid) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE entries SET last_used_at = ?1 WHERE id = ?2 AND account_id = ?3",
        params![now(), id.to_string(), account_id.to_string()],
    )?;
    Ok(())
}

/// Replace the tag set of an entry.
pub fn set_tags(conn: &Connection, entry_id: &Uuid, tag_ids: &[Uuid]) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM entry_tags WHERE entry_id = ?1",
        [entry_id.to_string()],
    )?;
    for tag_id in tag_ids {
        conn.execute(
            "INSERT OR IGNORE INTO entry_tags (entry_id, tag_id) VALUES (?1, ?2)",
            params![entry_id.to_string(), tag_id.to_string()],
        )?;
    }
    Ok(())
}

/// All `(entry_id, tag_id, tag_name)` links for one account, for building
/// listings without a per-entry query.
pub fn tag_links(
    conn: &Connection,
    account_id: &Uuid,
) -> rusqlite::Result<Vec<(Uuid, Uuid, String)>> {
    let mut stmt = conn.prepare(
        "SELECT entry_tags.entry_id, tags.id, tags.name
         FROM entry_tags
         JOIN tags ON tags.id = entry_tags.tag_id
         JOIN entries ON entries.id = entry_tags.entry_id
         WHERE entries.account_id = ?1",
    )?;
    let rows = stmt.query_map([account_id.to_string()], |row| {
        Ok((
            uuid_from_sql(row.get(0)?)?,
            uuid_from_sql(row.get(1)?)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    rows.collect()
}
