use anyhow::Result;
use rusqlite::Connection;

use super::OptionalExt;
use crate::models::BackupRow;
use crate::Database;

fn row_to_backup(row: &rusqlite::Row<'_>) -> rusqlite::Result<BackupRow> {
    Ok(BackupRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        email: row.get(2)?,
        original_hash: row.get(3)?,
        hash_length: row.get(4)?,
        corruption_detected: row.get::<_, i64>(5)? != 0,
        corruption_types: row.get(6)?,
        corruption_severity: row.get(7)?,
        reason: row.get(8)?,
        created_by: row.get(9)?,
        rollback_performed: row.get::<_, i64>(10)? != 0,
        rollback_at: row.get(11)?,
        created_at: row.get(12)?,
    })
}

const BACKUP_COLS: &str = "id, user_id, email, original_hash, hash_length, corruption_detected,
     corruption_types, corruption_severity, reason, created_by,
     rollback_performed, rollback_at, created_at";

pub fn insert(conn: &Connection, b: &BackupRow) -> Result<()> {
    conn.execute(
        "INSERT INTO hash_backups
            (id, user_id, email, original_hash, hash_length, corruption_detected,
             corruption_types, corruption_severity, reason, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        rusqlite::params![
            b.id,
            b.user_id,
            b.email,
            b.original_hash,
            b.hash_length,
            b.corruption_detected as i64,
            b.corruption_types,
            b.corruption_severity,
            b.reason,
            b.created_by,
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<BackupRow>> {
    let sql = format!("SELECT {BACKUP_COLS} FROM hash_backups WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([id], row_to_backup).optional()
}

pub fn history(conn: &Connection, user_id: &str, limit: u32) -> Result<Vec<BackupRow>> {
    let sql = format!(
        "SELECT {BACKUP_COLS} FROM hash_backups
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![user_id, limit], row_to_backup)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Flip the rollback flag. The row itself stays immutable otherwise.
pub fn mark_rolled_back(conn: &Connection, id: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE hash_backups
         SET rollback_performed = 1, rollback_at = datetime('now')
         WHERE id = ?1 AND rollback_performed = 0",
        [id],
    )?;
    Ok(changed == 1)
}

pub fn rollback_available(conn: &Connection, user_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM hash_backups WHERE user_id = ?1 AND rollback_performed = 0",
        [user_id],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

impl Database {
    pub fn backup_history(&self, user_id: &str, limit: u32) -> Result<Vec<BackupRow>> {
        self.with_conn(|conn| history(conn, user_id, limit))
    }

    pub fn get_backup(&self, id: &str) -> Result<Option<BackupRow>> {
        self.with_conn(|conn| get(conn, id))
    }
}
