use anyhow::Result;
use rusqlite::Connection;

use crate::models::AuditRow;
use crate::Database;

fn row_to_audit(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditRow> {
    Ok(AuditRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action_type: row.get(2)?,
        old_hash_prefix: row.get(3)?,
        new_hash_prefix: row.get(4)?,
        backup_id: row.get(5)?,
        corruption_detected: row.get::<_, i64>(6)? != 0,
        corruption_types: row.get(7)?,
        reason: row.get(8)?,
        performed_by: row.get(9)?,
        ip: row.get(10)?,
        user_agent: row.get(11)?,
        created_at: row.get(12)?,
    })
}

const AUDIT_COLS: &str = "id, user_id, action_type, old_hash_prefix, new_hash_prefix, backup_id,
     corruption_detected, corruption_types, reason, performed_by, ip, user_agent, created_at";

pub fn insert(conn: &Connection, a: &AuditRow) -> Result<()> {
    conn.execute(
        "INSERT INTO hash_audit_log
            (id, user_id, action_type, old_hash_prefix, new_hash_prefix, backup_id,
             corruption_detected, corruption_types, reason, performed_by, ip, user_agent)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        rusqlite::params![
            a.id,
            a.user_id,
            a.action_type,
            a.old_hash_prefix,
            a.new_hash_prefix,
            a.backup_id,
            a.corruption_detected as i64,
            a.corruption_types,
            a.reason,
            a.performed_by,
            a.ip,
            a.user_agent,
        ],
    )?;
    Ok(())
}

/// Newest-first trail; global when `user_id` is None.
pub fn trail(conn: &Connection, user_id: Option<&str>, limit: u32) -> Result<Vec<AuditRow>> {
    match user_id {
        Some(uid) => {
            let sql = format!(
                "SELECT {AUDIT_COLS} FROM hash_audit_log
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![uid, limit], row_to_audit)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        }
        None => {
            let sql = format!(
                "SELECT {AUDIT_COLS} FROM hash_audit_log
                 ORDER BY created_at DESC, id DESC LIMIT ?1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([limit], row_to_audit)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        }
    }
}

impl Database {
    pub fn audit_trail(&self, user_id: Option<&str>, limit: u32) -> Result<Vec<AuditRow>> {
        self.with_conn(|conn| trail(conn, user_id, limit))
    }
}
