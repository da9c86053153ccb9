use std::collections::BTreeMap;

use axum::extract::{Extension, Query, State};
use axum::{response::IntoResponse, Json};
use hashmend_core::audit::AuditTrail;
use hashmend_core::backup::BackupLedger;
use hashmend_core::credential::{record_from_row, CredentialStore};
use hashmend_core::csrf::{CsrfTokenService, DEFAULT_TTL_SECS};
use hashmend_core::events::{mask_email, EventLogger, LogLevel};
use hashmend_core::repair::RepairOrchestrator;
use hashmend_core::{analyzer, hashing, validator};
use hashmend_types::api::{
    AnalyzeHashData, ApiEnvelope, BackupSummary, BulkAnalysisData, CsrfIssueRequest,
    CsrfIssueResponse, IntegrityData, RepairData, RepairStatusData, RollbackData, StatsPeriod,
    UserAnalysisSummary, VerifyHashData,
};
use hashmend_types::context::RequestContext;
use hashmend_types::error::{ServiceError, ServiceResult};
use hashmend_types::verdict::Severity;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::command::{AdminCommand, DiagnosticsRequest};
use crate::failure::ApiFailure;
use crate::AppState;

const BULK_DEFAULT_LIMIT: u32 = 100;
const BULK_MAX_LIMIT: u32 = 500;
const INTEGRITY_SCAN_LIMIT: u32 = 1000;

/// Issue a CSRF token scoped to one named action.
pub async fn issue_csrf(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(req): Json<CsrfIssueRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    if !AdminCommand::ACTION_NAMES.contains(&req.action.as_str()) {
        return Err(ServiceError::validation(format!("unknown action '{}'", req.action)).into());
    }
    let (token, expires_at) =
        CsrfTokenService::new(&state.db).issue(&ctx, &req.action, DEFAULT_TTL_SECS)?;
    Ok(Json(ApiEnvelope::ok(CsrfIssueResponse {
        token,
        action: req.action,
        expires_at,
    })))
}

/// Single entry point for every diagnostic action: CSRF gate, then the
/// action's rate-limit category, then the exhaustive command dispatch.
pub async fn run_diagnostics(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Json(req): Json<DiagnosticsRequest>,
) -> Result<impl IntoResponse, ApiFailure> {
    let action = req.command.action_name();
    let events = EventLogger::new(&state.db);

    if !CsrfTokenService::new(&state.db).consume(&ctx, action, &req.csrf_token)? {
        let correlation_id = Uuid::new_v4().to_string();
        events.log(
            &ctx,
            "csrf_rejected",
            Some(&ctx.user_id),
            json!({ "attempted_action": action, "correlation_id": correlation_id }),
            LogLevel::Warning,
        );
        return Err(ServiceError::AccessDenied { correlation_id }.into());
    }

    if let Err(e) = state.limiter.enforce(&state.db, &ctx, action) {
        if matches!(e, ServiceError::RateLimited { .. }) {
            events.log(
                &ctx,
                "rate_limit_exceeded",
                Some(&ctx.user_id),
                json!({ "attempted_action": action }),
                LogLevel::Warning,
            );
        }
        return Err(e.into());
    }

    let (data, warnings) = dispatch(&state, &ctx, req.command)?;
    events.log(
        &ctx,
        "diagnostic_action",
        Some(&ctx.user_id),
        json!({ "attempted_action": action, "success": true }),
        LogLevel::Info,
    );
    Ok(Json(ApiEnvelope::ok_with_warnings(data, warnings)))
}

fn dispatch(
    state: &AppState,
    ctx: &RequestContext,
    command: AdminCommand,
) -> ServiceResult<(Value, Vec<String>)> {
    let events = EventLogger::new(&state.db);
    match command {
        AdminCommand::VerifyHash { password, hash, user_id } => {
            // Structural validity and verification success are
            // independent signals; both come back side by side.
            let format = validator::validate(&hash);
            let verification_success = hashing::verify_password(&password, &hash);
            if let Some(uid) = &user_id {
                analyzer::analyze_logged(&hash, Some(uid), &events, ctx);
            }
            ok_data(VerifyHashData { verification_success, format })
        }

        AdminCommand::AnalyzeHash { hash } => {
            let format = validator::validate(&hash);
            let corruption = analyzer::analyze_logged(&hash, None, &events, ctx);
            ok_data(AnalyzeHashData { format, corruption })
        }

        AdminCommand::CheckDatabaseIntegrity => {
            let store = CredentialStore::new(&state.db);
            let (column, mut recommendations) = store.describe_column()?;
            let (charset, charset_recs) = store.describe_charset()?;
            recommendations.extend(charset_recs);
            let scan = scan_users(state, INTEGRITY_SCAN_LIMIT, 0)?;
            ok_data(IntegrityData { column, charset, recommendations, scan })
        }

        AdminCommand::BulkUserAnalysis { limit, offset } => {
            let limit = limit.unwrap_or(BULK_DEFAULT_LIMIT).min(BULK_MAX_LIMIT);
            let scan = scan_users(state, limit, offset.unwrap_or(0))?;
            ok_data(scan)
        }

        AdminCommand::ExecuteRepair { user_id, new_password, force_repair } => {
            let outcome = RepairOrchestrator::new(&state.db).execute(
                ctx,
                &user_id,
                &new_password,
                force_repair,
            )?;
            let warnings = outcome.audit_warning.into_iter().collect();
            let rollback_available =
                BackupLedger::new(&state.db).rollback_available(&outcome.user_id)?;
            let data = RepairData {
                user_id: outcome.user_id,
                backup_id: outcome.backup_id,
                audit_trail_id: outcome.audit_id,
                rollback_available,
            };
            Ok((serde_json::to_value(data).map_err(anyhow::Error::from)?, warnings))
        }

        AdminCommand::RollbackRepair { backup_id, reason } => {
            let outcome = RepairOrchestrator::new(&state.db).rollback(ctx, &backup_id, &reason)?;
            let rollback_available =
                BackupLedger::new(&state.db).rollback_available(&outcome.restored_user_id)?;
            ok_data(RollbackData {
                restored_user_id: outcome.restored_user_id,
                backup_id: outcome.backup_id,
                audit_trail_id: outcome.audit_id,
                rollback_available,
            })
        }

        AdminCommand::GetRepairStatus { user_id } => {
            let record = CredentialStore::new(&state.db).retrieve(&user_id)?;
            let corruption = analyzer::analyze_record(&record);
            let ledger = BackupLedger::new(&state.db);
            let backups = ledger
                .history(&user_id, 10)?
                .into_iter()
                .map(|b| BackupSummary {
                    id: b.id,
                    reason: b.reason,
                    corruption_severity: parse_severity(&b.corruption_severity),
                    rollback_performed: b.rollback_performed,
                    created_at: b.created_at,
                })
                .collect();
            let rollback_available = ledger.rollback_available(&user_id)?;
            ok_data(RepairStatusData {
                user_id,
                corruption,
                backups,
                rollback_available,
            })
        }
    }
}

fn scan_users(state: &AppState, limit: u32, offset: u32) -> ServiceResult<BulkAnalysisData> {
    let rows = state
        .db
        .list_users(limit, offset)
        .map_err(ServiceError::Store)?;

    let mut corrupted = 0usize;
    let mut by_severity: BTreeMap<String, usize> = BTreeMap::new();
    let mut users = Vec::with_capacity(rows.len());
    for row in &rows {
        let record = record_from_row(row);
        let verdict = analyzer::analyze_record(&record);
        if verdict.is_corrupted {
            corrupted += 1;
            *by_severity
                .entry(verdict.severity.as_str().to_string())
                .or_default() += 1;
        }
        users.push(UserAnalysisSummary {
            user_id: record.user_id,
            email: mask_email(&record.email),
            severity: verdict.severity,
            corruption_types: verdict.types.iter().map(|t| t.as_str().to_string()).collect(),
            repair_possible: verdict.repair_possible,
        });
    }

    Ok(BulkAnalysisData {
        scanned: rows.len(),
        corrupted,
        by_severity,
        users,
    })
}

fn parse_severity(s: &str) -> Severity {
    match s {
        "minor" => Severity::Minor,
        "major" => Severity::Major,
        "critical" => Severity::Critical,
        _ => Severity::None,
    }
}

fn ok_data<T: serde::Serialize>(data: T) -> ServiceResult<(Value, Vec<String>)> {
    Ok((
        serde_json::to_value(data).map_err(anyhow::Error::from)?,
        Vec::new(),
    ))
}

// -- Stats --

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub period: StatsPeriod,
}

pub async fn get_stats(
    State(state): State<AppState>,
    Extension(_ctx): Extension<RequestContext>,
    Query(query): Query<StatsQuery>,
) -> Result<impl IntoResponse, ApiFailure> {
    let stats = EventLogger::new(&state.db).failure_stats(query.period)?;
    Ok(Json(ApiEnvelope::ok(stats)))
}

// -- Audit trail (read-only) --

#[derive(Debug, Deserialize)]
pub struct TrailQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

pub async fn get_audit_trail(
    State(state): State<AppState>,
    Extension(_ctx): Extension<RequestContext>,
    Query(query): Query<TrailQuery>,
) -> Result<impl IntoResponse, ApiFailure> {
    let rows = AuditTrail::new(&state.db)
        .trail(query.user_id.as_deref(), query.limit.unwrap_or(50).min(500))?;
    let entries: Vec<Value> = rows
        .into_iter()
        .map(|r| {
            json!({
                "id": r.id,
                "user_id": r.user_id,
                "action_type": r.action_type,
                "old_hash_prefix": r.old_hash_prefix,
                "new_hash_prefix": r.new_hash_prefix,
                "backup_id": r.backup_id,
                "corruption_detected": r.corruption_detected,
                "corruption_types": r.corruption_types,
                "reason": r.reason,
                "performed_by": r.performed_by,
                "created_at": r.created_at,
            })
        })
        .collect();
    Ok(Json(ApiEnvelope::ok(entries)))
}
