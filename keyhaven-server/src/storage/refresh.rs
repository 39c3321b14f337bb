//! Refresh credential records. Raw tokens are never stored.

use super::models::RefreshRecord;
use super::{now, uuid_from_sql};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

pub fn create(
    conn: &Connection,
    account_id: &Uuid,
    token_fingerprint: &str,
    expires_at: i64,
) -> rusqlite::Result<RefreshRecord> {
    let id = Uuid::new_v4();
    let ts = now();

    conn.execute(
        "INSERT INTO refresh_tokens (id, account_id, token_fingerprint, revoked, expires_at, created_at)
         VALUES (?1, ?2, ?3, 0, ?4, ?5)",
        params![
            id.to_string(),
            account_id.to_string(),
            token_fingerprint,
            expires_at,
            ts,
        ],
    )?;

    Ok(RefreshRecord {
        id,
        account_id: *account_id,
        token_fingerprint: token_fingerprint.to_string(),
        revoked: false,
        expires_at,
        created_at: ts,
    })
}

/// Look up an unrevoked, unexpired record by fingerprint.
pub fn find_active_by_fingerprint(
    conn: &Connection,
    token_fingerprint: &str,
) -> rusqlite::Result<Option<RefreshRecord>> {
    conn.query_row(
        "SELECT id, account_id, token_fingerprint, revoked, expires_at, created_at
         FROM refresh_tokens
         WHERE token_fingerprint = ?1 AND revoked = 0 AND expires_at > ?2",
        params![token_fingerprint, now()],
        |row| {
            Ok(RefreshRecord {
                id: uuid_from_sql(row.get(0)?)?,
                account_id: uuid_from_sql(row.get(1)?)?,
                token_fingerprint: row.get(2)?,
                revoked: row.get(3)?,
                expires_at: row.get(4)?,
                created_at: row.get(5)?,
            })
        },
    )
    .optional()
}

/// Revoke by fingerprint. Idempotent: revoking an unknown or already
/// revoked token is not an error.
pub fn revoke_by_fingerprint(conn: &Connection, token_fingerprint: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE refresh_tokens SET revoked = 1 WHERE token_fingerprint = ?1",
        [token_fingerprint],
    )?;
    Ok(())
}

pub fn revoke_all_for_account(conn: &Connection, account_id: &Uuid) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE refresh_tokens SET revoked = 1 WHERE account_id = ?1 AND revoked = 0",
        [account_id.to_string()],
    )
}

/// Delete records that expired before `cutoff`.
pub fn prune_expired(conn: &Connection, cutoff: i64) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM refresh_tokens WHERE expires_at < ?1", [cutoff])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::accounts::{self, NewAccount};
    use crate::storage::Storage;

    fn account(conn: &Connection) -> Uuid {
        accounts::create(
            conn,
            &NewAccount {
                email: Some("a@x.test"),
                credential_hash: None,
                display_name: None,
                wrapped_key: &[1u8; 60],
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_create_and_find_active() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let account_id = account(&conn);

        create(&conn, &account_id, "fp-1", now() + 3600).unwrap();

        let found = find_active_by_fingerprint(&conn, "fp-1").unwrap().unwrap();
        assert_eq!(found.account_id, account_id);
        assert!(!found.revoked);
    }

    #[test]
    fn test_revoked_record_not_found() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let account_id = account(&conn);

        create(&conn, &account_id, "fp-1", now() + 3600).unwrap();
        revoke_by_fingerprint(&conn, "fp-1").unwrap();

        assert!(find_active_by_fingerprint(&conn, "fp-1").unwrap().is_none());
        // Idempotent
        revoke_by_fingerprint(&conn, "fp-1").unwrap();
        revoke_by_fingerprint(&conn, "never-existed").unwrap();
    }

    #[test]
    fn test_expired_record_not_found() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let account_id = account(&conn);

        create(&conn, &account_id, "fp-old", now() - 10).unwrap();
        assert!(find_active_by_fingerprint(&conn, "fp-old").unwrap().is_none());
    }

    #[test]
    fn test_revoke_all_for_account() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let account_id = account(&conn);

        create(&conn, &account_id, "fp-1", now() + 3600).unwrap();
        create(&conn, &account_id, "fp-2", now() + 3600).unwrap();

        assert_eq!(revoke_all_for_account(&conn, &account_id).unwrap(), 2);
        assert!(find_active_by_fingerprint(&conn, "fp-1").unwrap().is_none());
        assert!(find_active_by_fingerprint(&conn, "fp-2").unwrap().is_none());
    }

    #[test]
    fn test_prune_expired() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let account_id = account(&conn);

        create(&conn, &account_id, "fp-old", now() - 100).unwrap();
        create(&conn, &account_id, "fp-live", now() + 3600).unwrap();

        assert_eq!(prune_expired(&conn, now()).unwrap(), 1);
        assert!(find_active_by_fingerprint(&conn, "fp-live").unwrap().is_some());
    }
}
