//! Identity store: accounts and OAuth links.

use super::models::Account;
use super::{now, uuid_from_sql};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

pub struct NewAccount<'a> {
    pub email: Option<&'a str>,
    pub credential_hash: Option<&'a str>,
    pub display_name: Option<&'a str>,
    pub wrapped_key: &'a [u8],
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: uuid_from_sql(row.get(0)?)?,
        email: row.get(1)?,
        credential_hash: row.get(2)?,
        display_name: row.get(3)?,
        wrapped_key: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const ACCOUNT_COLUMNS: &str =
    "id, email, credential_hash, display_name, wrapped_key, created_at, updated_at";

pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<Account>> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1"),
        [email],
        account_from_row,
    )
    .optional()
}

pub fn find_by_id(conn: &Connection, id: &Uuid) -> rusqlite::Result<Option<Account>> {
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        [id.to_string()],
        account_from_row,
    )
    .optional()
}

pub fn create(conn: &Connection, new: &NewAccount<'_>) -> rusqlite::Result<Account> {
    let id = Uuid::new_v4();
    let ts = now();

    conn.execute(
        "INSERT INTO accounts (id, email, credential_hash, display_name, wrapped_key, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.to_string(),
            new.email,
            new.credential_hash,
            new.display_name,
            new.wrapped_key,
            ts,
            ts,
        ],
    )?;

    Ok(Account {
        id,
        email: new.email.map(str::to_string),
        credential_hash: new.credential_hash.map(str::to_string),
        display_name: new.display_name.map(str::to_string),
        wrapped_key: Some(new.wrapped_key.to_vec()),
        created_at: ts,
        updated_at: ts,
    })
}

/// Atomic find-or-create for an OAuth sign-in.
///
/// Resolution order: existing link on `(provider, provider_account_id)`,
/// then an existing account with the profile email (which gets linked),
/// then a brand-new account. Whichever path is taken, the returned account
/// has a wrapped per-user key: `fresh_wrapped_key` is installed inside the
/// same transaction when the account lacks one.
///
/// Returns `(account, created)`.
pub fn find_or_create_oauth_link(
    conn: &mut Connection,
    provider: &str,
    provider_account_id: &str,
    email: Option<&str>,
    display_name: Option<&str>,
    fresh_wrapped_key: &[u8],
) -> rusqlite::Result<(Account, bool)> {
    let tx = conn.transaction()?;
    let ts = now();

    let linked: Option<String> = tx
        .query_row(
            "SELECT account_id FROM oauth_links WHERE provider = ?1 AND provider_account_id = ?2",
            params![provider, provider_account_id],
            |row| row.get(0),
        )
        .optional()?;

    let (account_id, created) = match linked {
        Some(id) => (uuid_from_sql(id)?, false),
        None => {
            let existing: Option<String> = match email {
                Some(email) => tx
                    .query_row(
                        "SELECT id FROM accounts WHERE email = ?1",
                        [email],
                        |row| row.get(0),
                    )
                    .optional()?,
                None => None,
            };

            let (account_id, created) = match existing {
                Some(id) => (uuid_from_sql(id)?, false),
                None => {
                    let id = Uuid::new_v4();
                    tx.execute(
                        "INSERT INTO accounts (id, email, display_name, wrapped_key, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![id.to_string(), email, display_name, fresh_wrapped_key, ts, ts],
                    )?;
                    (id, true)
                }
            };

            tx.execute(
                "INSERT INTO oauth_links (id, account_id, provider, provider_account_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Uuid::new_v4().to_string(),
                    account_id.to_string(),
                    provider,
                    provider_account_id,
                    ts,
                ],
            )?;

            (account_id, created)
        }
    };

    // Lazily materialise the per-user key for accounts that predate it.
    tx.execute(
        "UPDATE accounts SET wrapped_key = ?1, updated_at = ?2 WHERE id = ?3 AND wrapped_key IS NULL",
        params![fresh_wrapped_key, ts, account_id.to_string()],
    )?;

    let account = tx.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        [account_id.to_string()],
        account_from_row,
    )?;

    tx.commit()?;
    Ok((account, created))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    fn wrapped() -> Vec<u8> {
        vec![1u8; 60]
    }

    #[test]
    fn test_create_and_find_by_email() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();

        let key = wrapped();
        let account = create(
            &conn,
            &NewAccount {
                email: Some("a@x.test"),
                credential_hash: Some("$argon2id$fake"),
                display_name: Some("Alice"),
                wrapped_key: &key,
            },
        )
        .unwrap();

        let found = find_by_email(&conn, "a@x.test").unwrap().unwrap();
        assert_eq!(found.id, account.id);
        assert_eq!(found.wrapped_key.as_deref(), Some(key.as_slice()));

        assert!(find_by_email(&conn, "b@x.test").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();

        let key = wrapped();
        let new = NewAccount {
            email: Some("a@x.test"),
            credential_hash: None,
            display_name: None,
            wrapped_key: &key,
        };
        create(&conn, &new).unwrap();
        assert!(create(&conn, &new).is_err());
    }

    #[test]
    fn test_oauth_link_creates_account_once() {
        let storage = Storage::in_memory().unwrap();
        let mut conn = storage.conn().unwrap();

        let (first, created) = find_or_create_oauth_link(
            &mut conn,
            "github",
            "gh-123",
            Some("dev@x.test"),
            Some("Dev"),
            &wrapped(),
        )
        .unwrap();
        assert!(created);
        assert!(first.wrapped_key.is_some());

        let (second, created) = find_or_create_oauth_link(
            &mut conn,
            "github",
            "gh-123",
            Some("dev@x.test"),
            None,
            &wrapped(),
        )
        .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        // The original wrapped key is kept, not replaced
        assert_eq!(first.wrapped_key, second.wrapped_key);
    }

    #[test]
    fn test_oauth_links_to_existing_account_by_email() {
        let storage = Storage::in_memory().unwrap();
        let mut conn = storage.conn().unwrap();

        let key = wrapped();
        let account = create(
            &conn,
            &NewAccount {
                email: Some("a@x.test"),
                credential_hash: Some("$argon2id$fake"),
                display_name: None,
                wrapped_key: &key,
            },
        )
        .unwrap();

        let (linked, created) = find_or_create_oauth_link(
            &mut conn,
            "google",
            "goog-1",
            Some("a@x.test"),
            None,
            &wrapped(),
        )
        .unwrap();
        assert!(!created);
        assert_eq!(linked.id, account.id);
    }

    #[test]
    fn test_oauth_materialises_missing_wrapped_key() {
        let storage = Storage::in_memory().unwrap();
        let mut conn = storage.conn().unwrap();

        // Account created without a wrapped key (legacy row)
        let ts = now();
        conn.execute(
            "INSERT INTO accounts (id, email, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![Uuid::new_v4().to_string(), "old@x.test", ts, ts],
        )
        .unwrap();

        let fresh = vec![9u8; 60];
        let (account, created) =
            find_or_create_oauth_link(&mut conn, "google", "goog-2", Some("old@x.test"), None, &fresh)
                .unwrap();
        assert!(!created);
        assert_eq!(account.wrapped_key.as_deref(), Some(fresh.as_slice()));
    }
}
