use hashmend_db::models::BackupRow;
use hashmend_db::queries::backups;
use hashmend_db::Database;
use hashmend_types::error::ServiceResult;
use hashmend_types::verdict::{CorruptionVerdict, HashRecord};
use rusqlite::Connection;
use uuid::Uuid;

/// Append-only pre-repair snapshots. Rows are written before any hash
/// mutation and never deleted in-process; only the rollback flag ever
/// changes after insert.
pub struct BackupLedger<'a> {
    db: &'a Database,
}

impl<'a> BackupLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn history(&self, user_id: &str, limit: u32) -> ServiceResult<Vec<BackupRow>> {
        Ok(self.db.backup_history(user_id, limit)?)
    }

    pub fn get(&self, backup_id: &str) -> ServiceResult<Option<BackupRow>> {
        Ok(self.db.get_backup(backup_id)?)
    }

    pub fn rollback_available(&self, user_id: &str) -> ServiceResult<bool> {
        Ok(self.db.with_conn(|conn| backups::rollback_available(conn, user_id))?)
    }
}

/// Transaction-scoped snapshot write. Must complete before the hash write
/// in the same transaction; a failure here aborts the whole repair.
pub fn create(
    conn: &Connection,
    record: &HashRecord,
    verdict: &CorruptionVerdict,
    reason: &str,
    created_by: &str,
) -> ServiceResult<String> {
    let id = Uuid::new_v4().to_string();
    let row = BackupRow {
        id: id.clone(),
        user_id: record.user_id.clone(),
        email: record.email.clone(),
        original_hash: record.raw_hash.clone(),
        hash_length: record.char_length as i64,
        corruption_detected: verdict.is_corrupted,
        corruption_types: verdict.type_list(),
        corruption_severity: verdict.severity.as_str().to_string(),
        reason: reason.to_string(),
        created_by: created_by.to_string(),
        rollback_performed: false,
        rollback_at: None,
        created_at: String::new(), // set by the store
    };
    backups::insert(conn, &row)?;
    Ok(id)
}
