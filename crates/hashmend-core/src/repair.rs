use hashmend_db::queries::backups;
use hashmend_db::Database;
use hashmend_types::context::RequestContext;
use hashmend_types::error::{RepairStep, ServiceError, ServiceResult};
use hashmend_types::verdict::CorruptionVerdict;
use serde_json::json;
use tracing::warn;

use crate::audit::{self, AuditAction};
use crate::events::{EventLogger, LogLevel};
use crate::{analyzer, backup, credential, hashing, tx_scope};

/// Result of a committed repair. `audit_id` is None exactly when the
/// audit append failed and was downgraded to the warning carried in
/// `audit_warning`, the single soft-failure path in the pipeline.
#[derive(Debug)]
pub struct RepairOutcome {
    pub user_id: String,
    pub backup_id: String,
    pub audit_id: Option<String>,
    pub audit_warning: Option<String>,
    pub verdict: CorruptionVerdict,
}

#[derive(Debug)]
pub struct RollbackOutcome {
    pub restored_user_id: String,
    pub backup_id: String,
    pub audit_id: String,
}

/// Drives a repair through its states:
/// Start → BackedUp → HashGenerated → Persisted → Verified → Committed,
/// with every failure landing in an aborted transaction. All persisted
/// side effects of one repair (backup row, hash write, audit row) commit
/// together or not at all.
pub struct RepairOrchestrator<'a> {
    db: &'a Database,
    events: EventLogger<'a>,
}

impl<'a> RepairOrchestrator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            events: EventLogger::new(db),
        }
    }

    pub fn execute(
        &self,
        ctx: &RequestContext,
        user_id: &str,
        new_password: &str,
        force: bool,
    ) -> ServiceResult<RepairOutcome> {
        // Start: both rejections here are caller errors, not repairs
        // gone wrong, so they surface as validation/not-found.
        if new_password.is_empty() {
            return Err(ServiceError::validation(
                "a replacement credential is required to repair a hash",
            ));
        }

        let result = tx_scope(self.db, |conn| {
            let record = credential::read_record(conn, user_id)?;
            let verdict = analyzer::analyze_record(&record);

            if !verdict.is_corrupted && !force {
                return Err(ServiceError::validation(
                    "stored hash is not corrupted; pass force_repair to replace it anyway",
                ));
            }

            // BackedUp: the snapshot must be durable before any mutation.
            let backup_id = backup::create(
                conn,
                &record,
                &verdict,
                if force { "forced repair" } else { "corruption repair" },
                &ctx.user_id,
            )
            .map_err(|e| ServiceError::Repair {
                step: RepairStep::BackedUp,
                reason: format!("backup write failed: {e}"),
            })?;

            // HashGenerated: a primitive that cannot verify its own
            // output is an environment fault, surfaced as such.
            let new_hash = hashing::generate_verified(new_password)?;

            // Persisted
            credential::write_hash(conn, user_id, &new_hash).map_err(|e| {
                ServiceError::Repair {
                    step: RepairStep::Persisted,
                    reason: format!("hash write failed: {e}"),
                }
            })?;

            // Verified: re-read through the store, not from memory.
            let reread = credential::read_record(conn, user_id)?;
            if !hashing::verify_password(new_password, &reread.raw_hash) {
                return Err(ServiceError::Repair {
                    step: RepairStep::Verified,
                    reason: "persisted hash failed verification against the new credential"
                        .into(),
                });
            }

            // Committed: the audit append is the one step explicitly
            // downgraded to a soft failure: the repair itself is sound
            // and rolling it back over a diagnostics row would destroy a
            // good hash. Operators reconcile from the returned warning.
            let (audit_id, audit_warning) = match audit::record(
                conn,
                user_id,
                AuditAction::HashRepair,
                Some(&record.raw_hash),
                Some(&new_hash),
                Some(&backup_id),
                Some(&verdict),
                "hash repair",
                ctx,
            ) {
                Ok(id) => (Some(id), None),
                Err(e) => {
                    let msg = format!("repair committed but audit write failed: {e}");
                    warn!(user_id, "{msg}");
                    (None, Some(msg))
                }
            };

            Ok(RepairOutcome {
                user_id: user_id.to_string(),
                backup_id,
                audit_id,
                audit_warning,
                verdict,
            })
        });

        match &result {
            Ok(outcome) => self.events.log(
                ctx,
                "hash_repair_completed",
                Some(user_id),
                json!({
                    "backup_id": outcome.backup_id,
                    "severity": outcome.verdict.severity.as_str(),
                    "forced": force,
                }),
                LogLevel::Info,
            ),
            Err(ServiceError::Validation(_)) | Err(ServiceError::NotFound { .. }) => {}
            Err(e) => self.events.log(
                ctx,
                "hash_repair_failed",
                Some(user_id),
                json!({ "error": e.to_string() }),
                LogLevel::Error,
            ),
        }
        result
    }

    /// Restore the hash a backup snapshotted. Unlike the repair path,
    /// the audit append here is load-bearing: rollback is all-or-none
    /// across hash write, audit row, and the backup flag.
    pub fn rollback(
        &self,
        ctx: &RequestContext,
        backup_id: &str,
        reason: &str,
    ) -> ServiceResult<RollbackOutcome> {
        if reason.trim().is_empty() {
            return Err(ServiceError::validation("a rollback reason is required"));
        }

        let result = tx_scope(self.db, |conn| {
            let backup = backups::get(conn, backup_id)?
                .ok_or_else(|| ServiceError::not_found("backup", backup_id))?;
            if backup.rollback_performed {
                return Err(ServiceError::validation(
                    "backup has already been rolled back",
                ));
            }

            let current = credential::read_record(conn, &backup.user_id)?;
            credential::write_hash(conn, &backup.user_id, &backup.original_hash)?;

            let audit_id = audit::record(
                conn,
                &backup.user_id,
                AuditAction::HashRollback,
                Some(&current.raw_hash),
                Some(&backup.original_hash),
                Some(backup_id),
                None,
                reason,
                ctx,
            )?;

            if !backups::mark_rolled_back(conn, backup_id)? {
                // Lost a race with a concurrent rollback of the same id.
                return Err(ServiceError::validation(
                    "backup has already been rolled back",
                ));
            }

            Ok(RollbackOutcome {
                restored_user_id: backup.user_id,
                backup_id: backup_id.to_string(),
                audit_id,
            })
        });

        match &result {
            Ok(outcome) => self.events.log(
                ctx,
                "hash_rollback",
                Some(&outcome.restored_user_id),
                json!({ "backup_id": backup_id, "reason": reason }),
                LogLevel::Info,
            ),
            Err(ServiceError::Validation(_)) | Err(ServiceError::NotFound { .. }) => {}
            Err(e) => self.events.log(
                ctx,
                "hash_repair_failed",
                None,
                json!({ "backup_id": backup_id, "error": e.to_string() }),
                LogLevel::Error,
            ),
        }
        result
    }
}
