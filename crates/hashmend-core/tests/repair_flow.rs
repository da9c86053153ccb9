//! End-to-end exercises of the repair pipeline against a private
//! in-memory database: backup-before-write, rollback symmetry, limiter
//! boundaries, and token replay.

use hashmend_core::backup::BackupLedger;
use hashmend_core::csrf::CsrfTokenService;
use hashmend_core::events::EventLogger;
use hashmend_core::ratelimit::{RateLimiter, RateRule};
use hashmend_core::repair::RepairOrchestrator;
use hashmend_core::{credential::CredentialStore, hashing};
use hashmend_db::Database;
use hashmend_types::api::StatsPeriod;
use hashmend_types::context::RequestContext;
use hashmend_types::error::ServiceError;

const GOOD: &str = "$2y$10$92IXUNpkjO0rOQ5byMi.Ye4oKoEa3Ro9llC/.og/at2.uheWG/igi";

fn admin_ctx() -> RequestContext {
    RequestContext::new("admin-1", "sess-abc123", "203.0.113.9", "test-agent")
}

fn seed_user(db: &Database, id: &str, hash: &str) {
    db.create_user(id, &format!("{id}@example.com"), hash, "customer")
        .unwrap();
}

#[test]
fn repair_backs_up_then_replaces_and_audits() {
    let db = Database::open_in_memory().unwrap();
    let ctx = admin_ctx();
    let corrupted = &GOOD[..40]; // truncated, critical
    seed_user(&db, "u1", corrupted);

    let outcome = RepairOrchestrator::new(&db)
        .execute(&ctx, "u1", "n3w-Passw0rd", false)
        .unwrap();

    // Backup snapshots the exact pre-repair hash.
    let backup = db.get_backup(&outcome.backup_id).unwrap().unwrap();
    assert_eq!(backup.original_hash, corrupted);
    assert!(backup.corruption_detected);
    assert_eq!(backup.corruption_severity, "critical");

    // The new hash verifies and is structurally clean.
    let record = CredentialStore::new(&db).retrieve("u1").unwrap();
    assert!(hashing::verify_password("n3w-Passw0rd", &record.raw_hash));
    assert!(!hashmend_core::analyzer::analyze_record(&record).is_corrupted);

    // One audit entry, referencing the backup.
    let audit_id = outcome.audit_id.expect("audit entry should exist");
    let trail = db.audit_trail(Some("u1"), 10).unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].id, audit_id);
    assert_eq!(trail[0].action_type, "hash_repair");
    assert_eq!(trail[0].backup_id.as_deref(), Some(outcome.backup_id.as_str()));
    assert_eq!(trail[0].performed_by, "admin-1");
    // Only prefixes in the trail, never raw material.
    assert!(trail[0]
        .old_hash_prefix
        .as_deref()
        .unwrap()
        .len() < corrupted.len());
}

#[test]
fn rollback_is_a_left_inverse_of_repair() {
    let db = Database::open_in_memory().unwrap();
    let ctx = admin_ctx();
    seed_user(&db, "u2", &format!(" {GOOD}"));

    let before = CredentialStore::new(&db).retrieve("u2").unwrap().raw_hash;
    let outcome = RepairOrchestrator::new(&db)
        .execute(&ctx, "u2", "replacement-pw", false)
        .unwrap();

    let restored = RepairOrchestrator::new(&db)
        .rollback(&ctx, &outcome.backup_id, "operator requested undo")
        .unwrap();
    assert_eq!(restored.restored_user_id, "u2");

    let after = CredentialStore::new(&db).retrieve("u2").unwrap().raw_hash;
    assert_eq!(after, before);

    let backup = db.get_backup(&outcome.backup_id).unwrap().unwrap();
    assert!(backup.rollback_performed);
    assert!(backup.rollback_at.is_some());

    // The same backup cannot be replayed.
    let err = RepairOrchestrator::new(&db)
        .rollback(&ctx, &outcome.backup_id, "again")
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    // Rollback leaves its own audit entry.
    let trail = db.audit_trail(Some("u2"), 10).unwrap();
    assert!(trail.iter().any(|e| e.action_type == "hash_rollback"));
}

#[test]
fn unforced_repair_of_a_healthy_hash_is_refused() {
    let db = Database::open_in_memory().unwrap();
    let ctx = admin_ctx();
    seed_user(&db, "u3", GOOD);

    let err = RepairOrchestrator::new(&db)
        .execute(&ctx, "u3", "newpw", false)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    // Nothing was backed up or mutated.
    assert!(BackupLedger::new(&db).history("u3", 10).unwrap().is_empty());
    assert_eq!(CredentialStore::new(&db).retrieve("u3").unwrap().raw_hash, GOOD);

    // Forced, it proceeds.
    let outcome = RepairOrchestrator::new(&db)
        .execute(&ctx, "u3", "newpw", true)
        .unwrap();
    assert!(!db
        .get_backup(&outcome.backup_id)
        .unwrap()
        .unwrap()
        .corruption_detected);
}

#[test]
fn repair_rejects_missing_user_and_missing_credential() {
    let db = Database::open_in_memory().unwrap();
    let ctx = admin_ctx();

    let err = RepairOrchestrator::new(&db)
        .execute(&ctx, "ghost", "pw", false)
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    seed_user(&db, "u4", &GOOD[..40]);
    let err = RepairOrchestrator::new(&db)
        .execute(&ctx, "u4", "", false)
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[test]
fn rate_limiter_denies_exactly_the_request_past_the_cap() {
    let db = Database::open_in_memory().unwrap();
    let ctx = admin_ctx();
    let limiter = RateLimiter::new(vec![(
        "execute_repair",
        RateRule { limit: 3, window_secs: 900 },
    )]);

    for i in 1..=3 {
        let d = limiter.check(&db, &ctx, "execute_repair").unwrap();
        assert!(d.allowed, "request {i} should be admitted");
        assert_eq!(d.remaining, 3 - i);
    }
    let denied = limiter.check(&db, &ctx, "execute_repair").unwrap();
    assert!(!denied.allowed);
    assert!(denied.message.is_some());

    // A different client keeps its own window.
    let other = RequestContext::new("admin-1", "sess-abc123", "198.51.100.7", "test-agent");
    assert!(limiter.check(&db, &other, "execute_repair").unwrap().allowed);

    // Unregistered categories pass unrestricted.
    assert!(limiter.check(&db, &ctx, "something_else").unwrap().allowed);

    let err = limiter.enforce(&db, &ctx, "execute_repair").unwrap_err();
    match err {
        ServiceError::RateLimited { retry_after_secs } => assert!(retry_after_secs > 0),
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[test]
fn csrf_tokens_are_action_scoped_and_single_use() {
    let db = Database::open_in_memory().unwrap();
    let ctx = admin_ctx();
    let svc = CsrfTokenService::new(&db);

    let (token, _) = svc.issue(&ctx, "execute_repair", 900).unwrap();

    // Wrong action: rejected, and the token survives.
    assert!(!svc.consume(&ctx, "rollback_repair", &token).unwrap());
    // Wrong session: rejected.
    let stranger = RequestContext::new("admin-1", "other-session", "203.0.113.9", "test-agent");
    assert!(!svc.consume(&stranger, "execute_repair", &token).unwrap());

    // Right scope: consumed once, then dead even with identical inputs.
    assert!(svc.consume(&ctx, "execute_repair", &token).unwrap());
    assert!(!svc.consume(&ctx, "execute_repair", &token).unwrap());

    // Expired tokens never validate.
    let (stale, _) = svc.issue(&ctx, "analyze_hash", -1).unwrap();
    assert!(!svc.consume(&ctx, "analyze_hash", &stale).unwrap());
}

#[test]
fn event_log_feeds_failure_stats() {
    let db = Database::open_in_memory().unwrap();
    let ctx = admin_ctx();
    let events = EventLogger::new(&db);

    events.log(
        &ctx,
        "login_failed",
        None,
        serde_json::json!({ "email": "eve@example.com" }),
        hashmend_core::events::LogLevel::Warning,
    );
    events.log(
        &ctx,
        "hash_corruption_detected",
        Some("u9"),
        serde_json::json!({ "severity": "critical" }),
        hashmend_core::events::LogLevel::Critical,
    );

    let stats = events.failure_stats(StatsPeriod::Hour).unwrap();
    assert_eq!(stats.total_events, 2);
    assert_eq!(stats.by_category.get("AUTH"), Some(&1));
    assert_eq!(stats.by_category.get("CORRUPTION"), Some(&1));
    assert_eq!(stats.by_level.get("CRITICAL"), Some(&1));
    assert_eq!(stats.top_offending_ips.len(), 1);
    // IPs leave the stats API masked.
    assert_eq!(stats.top_offending_ips[0].ip, "203.0.*.*");
}

#[test]
fn persisted_event_rows_hold_only_masked_identifiers() {
    let db = Database::open_in_memory().unwrap();
    let ctx = admin_ctx();
    EventLogger::new(&db).log(
        &ctx,
        "login_failed",
        None,
        serde_json::json!({ "email": "eve@example.com" }),
        hashmend_core::events::LogLevel::Warning,
    );

    // Inspect the stored row directly: the raw IP and the full session
    // id must never reach the table.
    let (ip, session): (String, Option<String>) = db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT ip, session_id FROM auth_logs LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?)
        })
        .unwrap();
    assert_eq!(ip, "203.0.*.*");
    assert_eq!(session.as_deref(), Some("sess-abc"));
}

#[test]
fn global_audit_trail_spans_users_newest_first() {
    let db = Database::open_in_memory().unwrap();
    let ctx = admin_ctx();
    seed_user(&db, "u5", &GOOD[..40]);
    seed_user(&db, "u6", &format!("{GOOD} "));

    RepairOrchestrator::new(&db)
        .execute(&ctx, "u5", "first-pw", false)
        .unwrap();
    RepairOrchestrator::new(&db)
        .execute(&ctx, "u6", "second-pw", false)
        .unwrap();

    let trail = db.audit_trail(None, 10).unwrap();
    assert_eq!(trail.len(), 2);
    let ids: Vec<&str> = trail.iter().map(|e| e.user_id.as_str()).collect();
    assert!(ids.contains(&"u5") && ids.contains(&"u6"));

    // The limit applies to the global trail too.
    assert_eq!(db.audit_trail(None, 1).unwrap().len(), 1);
}

#[test]
fn rollback_availability_tracks_unconsumed_backups() {
    let db = Database::open_in_memory().unwrap();
    let ctx = admin_ctx();
    seed_user(&db, "u7", &GOOD[..40]);
    let ledger = BackupLedger::new(&db);

    assert!(!ledger.rollback_available("u7").unwrap());

    let outcome = RepairOrchestrator::new(&db)
        .execute(&ctx, "u7", "fresh-pw", false)
        .unwrap();
    assert!(ledger.rollback_available("u7").unwrap());

    // Consuming the only backup drops availability back to false.
    RepairOrchestrator::new(&db)
        .rollback(&ctx, &outcome.backup_id, "undo")
        .unwrap();
    assert!(!ledger.rollback_available("u7").unwrap());
}

#[test]
fn repeated_login_failures_raise_a_security_alert() {
    let db = Database::open_in_memory().unwrap();
    let ctx = admin_ctx();
    let events = EventLogger::new(&db);

    for _ in 0..5 {
        events.log(
            &ctx,
            "login_failed",
            None,
            serde_json::json!({}),
            hashmend_core::events::LogLevel::Warning,
        );
    }

    let stats = events.failure_stats(StatsPeriod::Hour).unwrap();
    // 5 failures plus at least one alert, and the alert did not cascade
    // into alerts-about-alerts.
    let security = stats.by_category.get("SECURITY").copied().unwrap_or(0);
    assert!(security >= 1);
    assert_eq!(stats.by_category.get("AUTH"), Some(&5));
    assert!(stats.total_events < 20);
}
