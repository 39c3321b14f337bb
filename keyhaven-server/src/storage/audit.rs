//! Append-only audit log. No code path updates or deletes audit rows.

use super::models::{AuditAction, AuditRow};
use super::{now, uuid_from_sql, Storage};
use rusqlite::{params_from_iter, Connection, Row, ToSql};
use uuid::Uuid;

pub struct NewAudit<'a> {
    pub account_id: Uuid,
    pub action: AuditAction,
    pub entry_id: Option<Uuid>,
    pub entry_title: Option<&'a str>,
    pub network_address: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub details: Option<serde_json::Value>,
}

impl<'a> NewAudit<'a> {
    pub fn new(account_id: Uuid, action: AuditAction) -> Self {
        Self {
            account_id,
            action,
            entry_id: None,
            entry_title: None,
            network_address: None,
            user_agent: None,
            details: None,
        }
    }
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditRow> {
    let action: String = row.get(2)?;
    let entry_id: Option<String> = row.get(3)?;
    let details: Option<String> = row.get(7)?;
    Ok(AuditRow {
        id: row.get(0)?,
        account_id: uuid_from_sql(row.get(1)?)?,
        action: AuditAction::parse(&action).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown audit action {action}").into(),
            )
        })?,
        entry_id: entry_id.map(uuid_from_sql).transpose()?,
        entry_title: row.get(4)?,
        network_address: row.get(5)?,
        user_agent: row.get(6)?,
        details: details.and_then(|d| serde_json::from_str(&d).ok()),
        created_at: row.get(8)?,
    })
}

const AUDIT_COLUMNS: &str =
    "id, account_id, action, entry_id, entry_title, network_address, user_agent, details, created_at";

pub fn append(conn: &Connection, new: &NewAudit<'_>) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO audit_log (account_id, action, entry_id, entry_title,
                                network_address, user_agent, details, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            new.account_id.to_string(),
            new.action.as_str(),
            new.entry_id.map(|id| id.to_string()),
            new.entry_title,
            new.network_address,
            new.user_agent,
            new.details.as_ref().map(|d| d.to_string()),
            now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Fire-and-forget append. A failed audit write never fails the
/// principal operation; it is reported on the log instead.
pub fn record(storage: &Storage, new: &NewAudit<'_>) {
    let result = storage
        .conn()
        .map_err(|e| e.to_string())
        .and_then(|conn| append(&conn, new).map_err(|e| e.to_string()));

    if let Err(e) = result {
        tracing::error!(
            action = new.action.as_str(),
            "failed to write audit record: {}",
            e
        );
    }
}

#[derive(Default)]
pub struct AuditQuery {
    pub action: Option<AuditAction>,
    pub from: Option<i64>,
    pub to: Option<i64>,
    pub page: u32,
    pub page_size: u32,
}

/// Filtered page of audit records plus the total match count.
/// Ordering is newest first, ties broken by id.
pub fn query(
    conn: &Connection,
    account_id: &Uuid,
    q: &AuditQuery,
) -> rusqlite::Result<(Vec<AuditRow>, i64)> {
    let mut predicate = String::from("account_id = ?");
    let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(account_id.to_string())];

    if let Some(action) = q.action {
        predicate.push_str(" AND action = ?");
        args.push(Box::new(action.as_str()));
    }
    if let Some(from) = q.from {
        predicate.push_str(" AND created_at >= ?");
        args.push(Box::new(from));
    }
    if let Some(to) = q.to {
        predicate.push_str(" AND created_at <= ?");
        args.push(Box::new(to));
    }

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM audit_log WHERE {predicate}"),
        params_from_iter(args.iter()),
        |row| row.get(0),
    )?;

    let page_size = q.page_size.clamp(1, 200) as i64;
    let offset = q.page.max(1) as i64 * page_size - page_size;
    args.push(Box::new(page_size));
    args.push(Box::new(offset));

    let mut stmt = conn.prepare(&format!(
        "SELECT {AUDIT_COLUMNS} FROM audit_log WHERE {predicate}
         ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    ))?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), audit_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok((rows, total))
}

/// Count of records per action over the trailing `days` window.
pub fn summary(
    conn: &Connection,
    account_id: &Uuid,
    days: u32,
) -> rusqlite::Result<Vec<(String, i64)>> {
    let cutoff = now() - (days as i64) * 86_400;
    let mut stmt = conn.prepare(
        "SELECT action, COUNT(*) FROM audit_log
         WHERE account_id = ?1 AND created_at >= ?2
         GROUP BY action ORDER BY action",
    )?;
    let rows = stmt.query_map(
        rusqlite::params![account_id.to_string(), cutoff],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Storage;

    fn seed(conn: &Connection, account_id: Uuid, action: AuditAction) {
        append(conn, &NewAudit::new(account_id, action)).unwrap();
    }

    #[test]
    fn test_append_and_query() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let account = Uuid::new_v4();

        seed(&conn, account, AuditAction::Login);
        seed(&conn, account, AuditAction::Create);
        seed(&conn, account, AuditAction::Reveal);

        let (rows, total) = query(
            &conn,
            &account,
            &AuditQuery {
                page: 1,
                page_size: 10,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 3);
        assert_eq!(rows.len(), 3);
        // Newest first
        assert_eq!(rows[0].action, AuditAction::Reveal);
    }

    #[test]
    fn test_query_filters_by_action() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let account = Uuid::new_v4();

        seed(&conn, account, AuditAction::Login);
        seed(&conn, account, AuditAction::Create);

        let (rows, total) = query(
            &conn,
            &account,
            &AuditQuery {
                action: Some(AuditAction::Login),
                page: 1,
                page_size: 10,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 1);
        assert_eq!(rows[0].action, AuditAction::Login);
    }

    #[test]
    fn test_query_scoped_to_account() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        seed(&conn, a, AuditAction::Login);

        let (rows, total) = query(
            &conn,
            &b,
            &AuditQuery {
                page: 1,
                page_size: 10,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 0);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_pagination() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let account = Uuid::new_v4();

        for _ in 0..5 {
            seed(&conn, account, AuditAction::Create);
        }

        let (page1, total) = query(
            &conn,
            &account,
            &AuditQuery {
                page: 1,
                page_size: 2,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(total, 5);
        assert_eq!(page1.len(), 2);

        let (page3, _) = query(
            &conn,
            &account,
            &AuditQuery {
                page: 3,
                page_size: 2,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page3.len(), 1);
    }

    #[test]
    fn test_summary_groups_by_action() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let account = Uuid::new_v4();

        seed(&conn, account, AuditAction::Login);
        seed(&conn, account, AuditAction::Login);
        seed(&conn, account, AuditAction::Export);

        let groups = summary(&conn, &account, 30).unwrap();
        assert_eq!(
            groups,
            vec![("export".to_string(), 1), ("login".to_string(), 2)]
        );
    }

    #[test]
    fn test_details_roundtrip() {
        let storage = Storage::in_memory().unwrap();
        let conn = storage.conn().unwrap();
        let account = Uuid::new_v4();

        let mut new = NewAudit::new(account, AuditAction::Import);
        new.details = Some(serde_json::json!({"imported": 7}));
        append(&conn, &new).unwrap();

        let (rows, _) = query(
            &conn,
            &account,
            &AuditQuery {
                page: 1,
                page_size: 10,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(rows[0].details, Some(serde_json::json!({"imported": 7})));
    }
}
