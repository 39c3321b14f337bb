//! Share capabilities: bounded-use read grants on single entries.

use super::models::ShareRecord;
use super::{now, uuid_from_sql};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const SHARE_COLUMNS: &str = "id, entry_id, account_id, token_fingerprint, max_views, view_count, \
     expires_at, accessed_at, accessor_address, include_secret, include_notes, created_at";

fn share_from_row(row: &Row<'_>) -> rusqlite::Result<ShareRecord> {
    Ok(ShareRecord {
        id: uuid_from_sql(row.get(0)?)?,
        entry_id: uuid_from_sql(row.get(1)?)?,
        account_id: uuid_from_sql(row.get(2)?)?,
        token_fingerprint: row.get(3)?,
        max_views: row.get::<_, i64>(4)? as u32,
        view_count: row.get::<_, i64>(5)? as u32,
        expires_at: row.get(6)?,
        accessed_at: row.get(7)?,
        accessor_address: row.get(8)?,
        include_secret: row.get(9)?,
        include_notes: row.get(10)?,
        created_at: row.get(11)?,
    })
}

pub struct NewShare<'a> {
    pub entry_id: Uuid,
    pub account_id: Uuid,
    pub token_fingerprint: &'a str,
    pub max_views: u32,
    pub expires_at: i64,
    pub include_secret: bool,
    pub include_notes: bool,
}

pub fn create(conn: &Connection, new: &NewShare<'_>) -> rusqlite::Result<ShareRecord> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO shares (id, entry_id, account_id, token_fingerprint, max_views,
                             view_count, expires_at, include_secret, include_notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, ?9)",
        params![
            id.to_string(),
            new.entry_id.to_string(),
            new.account_id.to_string(),
            new.token_fingerprint,
            new.max_views,
            new.expires_at,
            new.include_secret,
            new.include_notes,
            now(),
        ],
    )?;
    conn.query_row(
        &format!("SELECT {SHARE_COLUMNS} FROM shares WHERE id = ?1"),
        [id.to_string()],
        share_from_row,
    )
}

/// Consume one view of the capability behind `token_fingerprint`.
///
/// The increment is guarded in the UPDATE predicate, so a capability at
/// its view limit (or past expiry) cannot be consumed even under
/// concurrent access. Returns the post-increment record, or `None` when
/// the capability is absent, expired, revoked or exhausted -- callers
/// must not distinguish those cases.
pub fn consume(
    conn: &mut Connection,
    token_fingerprint: &str,
    accessor_address: Option<&str>,
) -> rusqlite::Result<Option<ShareRecord>> {
    let tx = conn.transaction()?;
    let ts = now();

    let changed = tx.execute(
        "UPDATE shares
         SET view_count = view_count + 1, accessed_at = ?1, accessor_address = ?2
         WHERE token_fingerprint = ?3 AND expires_at > ?1 AND view_count < max_views",
        params![ts, accessor_address, token_fingerprint],
    )?;

    if changed == 0 {
        return Ok(None);
    }

    let record = tx.query_row(
        &format!("SELECT {SHARE_COLUMNS} FROM shares WHERE token_fingerprint = ?1"),
        [token_fingerprint],
        share_from_row,
    )?;

    tx.commit()?;
    Ok(Some(record))
}

/// Owner-scoped listing, newest first. Never exposes raw tokens (only
/// fingerprints are stored).
pub fn list_for_account(conn: &Connection, account_id: &Uuid) -> rusqlite::Result<Vec<ShareRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SHARE_COLUMNS} FROM shares WHERE account_id = ?1 ORDER BY created_at DESC, id ASC"
    ))?;
    let rows = stmt.query_map([account_id.to_string()], share_from_row)?;
    rows.collect()
}

/// Revoke by forcing expiry, so the capability becomes indistinguishable
/// from an expired one.
pub fn revoke(conn: &Connection, account_id: &Uuid, id: &Uuid) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE shares SET expires_at = ?1 WHERE id = ?2 AND account_id = ?3",
        params![now(), id.to_string(), account_id.to_string()],
    )?;
    Ok(changed > 0)
}

/// Delete capabilities that expired before `cutoff`.
pub fn prune_expired(conn: &Connection, cutoff: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM shares WHERE expires_at < ?1", [cutoff])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::accounts::{self, NewAccount};
    use crate::storage::entries::{self, NewEntry};
    use crate::storage::Storage;

    fn seed(conn: &Connection) -> (Uuid, Uuid) {
        let account = accounts::create(
            conn,
            &NewAccount {
                email: Some("a@x.test"),
                credential_hash: None,
                display_name: None,
                wrapped_key: &[1u8; 60],
            },
        )
        .unwrap();
        let entry = entries::insert(
            conn,
            &NewEntry {
                account_id: account.id,
                title: "shared",
                username: "",
                site: None,
                notes: None,
                secret_ciphertext: &[1],
                secret_nonce: &[0; 12],
                secret_auth_tag: &[0; 16],
                collection_id: None,
                is_favorite: false,
                is_pinned: false,
                strength: 0,
            },
        )
        .unwrap();
        (account.id, entry.id)
    }

    fn share(conn: &Connection, account_id: Uuid, entry_id: Uuid, max_views: u32, expires_at: i64) {
        create(
            conn,
            &NewShare {
                entry_id,
                account_id,
                token_fingerprint: "fp-1",
                max_views,
                expires_at,
                include_secret: true,
                include_notes: false,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_consume_counts_up_to_max_views() {
        let storage = Storage::in_memory().unwrap();
        let mut conn = storage.conn().unwrap();
        let (account_id, entry_id) = seed(&conn);
        share(&conn, account_id, entry_id, 2, now() + 3600);

        let first = consume(&mut conn, "fp-1", Some("10.0.0.1")).unwrap().unwrap();
        assert_eq!(first.view_count, 1);
        assert_eq!(first.accessor_address.as_deref(), Some("10.0.0.1"));

        let second = consume(&mut conn, "fp-1", None).unwrap().unwrap();
        assert_eq!(second.view_count, 2);

        // Third access is rejected and does not increment
        assert!(consume(&mut conn, "fp-1", None).unwrap().is_none());
        let records = list_for_account(&conn, &account_id).unwrap();
        assert_eq!(records[0].view_count, 2);
    }

    #[test]
    fn test_consume_rejects_expired_with_views_remaining() {
        let storage = Storage::in_memory().unwrap();
        let mut conn = storage.conn().unwrap();
        let (account_id, entry_id) = seed(&conn);
        share(&conn, account_id, entry_id, 5, now() - 1);

        assert!(consume(&mut conn, "fp-1", None).unwrap().is_none());
    }

    #[test]
    fn test_consume_unknown_fingerprint() {
        let storage = Storage::in_memory().unwrap();
        let mut conn = storage.conn().unwrap();
        seed(&conn);

        assert!(consume(&mut conn, "no-such", None).unwrap().is_none());
    }

    #[test]
    fn test_revoke_makes_capability_unconsumable() {
        let storage = Storage::in_memory().unwrap();
        let mut conn = storage.conn().unwrap();
        let (account_id, entry_id) = seed(&conn);
        share(&conn, account_id, entry_id, 3, now() + 3600);

        let id = list_for_account(&conn, &account_id).unwrap()[0].id;
        assert!(revoke(&conn, &account_id, &id).unwrap());
        assert!(consume(&mut conn, "fp-1", None).unwrap().is_none());
    }

    #[test]
    fn test_revoke_scoped_to_owner() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let (account_id, entry_id) = seed(&conn);
        share(&conn, account_id, entry_id, 1, now() + 3600);

        let id = list_for_account(&conn, &account_id).unwrap()[0].id;
        let stranger = Uuid::new_v4();
        assert!(!revoke(&conn, &stranger, &id).unwrap());
    }

    #[test]
    fn test_prune_expired() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let (account_id, entry_id) = seed(&conn);
        share(&conn, account_id, entry_id, 1, now() - 100);

        assert_eq!(prune_expired(&conn, now()).unwrap(), 1);
        assert!(list_for_account(&conn, &account_id).unwrap().is_empty());
    }
}
