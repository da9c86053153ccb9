use hashmend_db::models::AuditRow;
use hashmend_db::queries::audit;
use hashmend_db::Database;
use hashmend_types::context::RequestContext;
use hashmend_types::error::ServiceResult;
use hashmend_types::verdict::CorruptionVerdict;
use rusqlite::Connection;
use uuid::Uuid;

use crate::events::mask_hash;

/// Kinds of mutating action the trail records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    HashRepair,
    HashRollback,
    HashUpdate,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::HashRepair => "hash_repair",
            AuditAction::HashRollback => "hash_rollback",
            AuditAction::HashUpdate => "hash_update",
        }
    }
}

pub struct AuditTrail<'a> {
    db: &'a Database,
}

impl<'a> AuditTrail<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Newest-first; global when `user_id` is None.
    pub fn trail(&self, user_id: Option<&str>, limit: u32) -> ServiceResult<Vec<AuditRow>> {
        Ok(self.db.audit_trail(user_id, limit)?)
    }
}

/// Transaction-scoped append. Hashes enter the trail as short prefixes
/// only; raw hash material never lands in the audit table.
#[allow(clippy::too_many_arguments)]
pub fn record(
    conn: &Connection,
    user_id: &str,
    action: AuditAction,
    old_hash: Option<&str>,
    new_hash: Option<&str>,
    backup_id: Option<&str>,
    verdict: Option<&CorruptionVerdict>,
    reason: &str,
    ctx: &RequestContext,
) -> ServiceResult<String> {
    let id = Uuid::new_v4().to_string();
    let row = AuditRow {
        id: id.clone(),
        user_id: user_id.to_string(),
        action_type: action.as_str().to_string(),
        old_hash_prefix: old_hash.map(mask_hash),
        new_hash_prefix: new_hash.map(mask_hash),
        backup_id: backup_id.map(str::to_string),
        corruption_detected: verdict.map(|v| v.is_corrupted).unwrap_or(false),
        corruption_types: verdict.map(|v| v.type_list()),
        reason: Some(reason.to_string()),
        performed_by: ctx.user_id.clone(),
        ip: ctx.client_ip.clone(),
        user_agent: ctx.user_agent.clone(),
        created_at: String::new(), // set by the store
    };
    audit::insert(conn, &row)?;
    Ok(id)
}
