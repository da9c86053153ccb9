use std::collections::BTreeMap;

use chrono::Utc;
use hashmend_db::queries::logs::{self, LogGroup, NewLogEntry};
use hashmend_db::Database;
use hashmend_types::api::{FailureStats, IpCount, StatsPeriod};
use hashmend_types::context::RequestContext;
use hashmend_types::error::ServiceResult;
use serde_json::Value;
use tracing::{error, info, warn};

/// Failed logins from one IP inside this window trip a security alert.
const FAILED_LOGIN_THRESHOLD: i64 = 5;
const FAILED_LOGIN_WINDOW_SECS: i64 = 15 * 60;

/// Corruption detections fleet-wide inside one hour trip a security alert.
const CORRUPTION_BURST_THRESHOLD: i64 = 10;
const CORRUPTION_BURST_WINDOW_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }
}

/// Event categories, derived from the event type by a fixed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Auth,
    Security,
    Corruption,
    Repair,
    RateLimit,
    System,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Auth => "AUTH",
            Category::Security => "SECURITY",
            Category::Corruption => "CORRUPTION",
            Category::Repair => "REPAIR",
            Category::RateLimit => "RATE_LIMIT",
            Category::System => "SYSTEM",
        }
    }
}

/// Fixed event-type → category table; unmapped types land in SYSTEM.
pub fn category_for(event_type: &str) -> Category {
    match event_type {
        "login_success" | "login_failed" | "logout" | "admin_login" => Category::Auth,
        "access_denied" | "csrf_rejected" | "session_integrity_failed" | "security_alert" => {
            Category::Security
        }
        "hash_corruption_detected" | "hash_analysis" | "integrity_check" => Category::Corruption,
        "hash_repair_completed" | "hash_repair_failed" | "hash_rollback" => Category::Repair,
        "rate_limit_exceeded" => Category::RateLimit,
        _ => Category::System,
    }
}

/// Structured, PII-masked event sink backed by tracing plus the
/// queryable auth_logs table.
pub struct EventLogger<'a> {
    db: &'a Database,
}

impl<'a> EventLogger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record one event. Details are masked before anything is persisted
    /// or emitted. A sink failure is logged and swallowed: diagnostics
    /// never take the primary operation down.
    pub fn log(
        &self,
        ctx: &RequestContext,
        event_type: &str,
        user_id: Option<&str>,
        mut details: Value,
        level: LogLevel,
    ) {
        mask_value(&mut details);
        let category = category_for(event_type);
        let masked_ip = mask_ip(&ctx.client_ip);
        let masked_session = mask_session(&ctx.session_id);
        let details_json = details.to_string();

        match level {
            LogLevel::Info => info!(
                event_type,
                category = category.as_str(),
                user_id,
                ip = %masked_ip,
                session = %masked_session,
                details = %details_json,
                "auth event"
            ),
            LogLevel::Warning => warn!(
                event_type,
                category = category.as_str(),
                user_id,
                ip = %masked_ip,
                session = %masked_session,
                details = %details_json,
                "auth event"
            ),
            LogLevel::Error => error!(
                event_type,
                category = category.as_str(),
                user_id,
                ip = %masked_ip,
                session = %masked_session,
                details = %details_json,
                "auth event"
            ),
            LogLevel::Critical => error!(
                event_type,
                category = category.as_str(),
                level = "CRITICAL",
                user_id,
                ip = %masked_ip,
                session = %masked_session,
                details = %details_json,
                "auth event"
            ),
        }

        // Rows persist the masked forms only; masking is deterministic,
        // so per-IP grouping and threshold counts still line up.
        let now = Utc::now().timestamp();
        let entry = NewLogEntry {
            event_type,
            category: category.as_str(),
            level: level.as_str(),
            user_id,
            session_id: Some(&masked_session),
            ip: &masked_ip,
            user_agent: Some(&ctx.user_agent),
            details: &details_json,
            created_at: now,
        };
        if let Err(e) = self.db.insert_auth_log(&entry) {
            warn!("auth log write failed for {event_type}: {e}");
            return;
        }

        // Threshold checks run after the write so the triggering event
        // itself counts. An alert never re-enters the checks, so one
        // burst yields one alert per triggering event, not a cascade.
        if event_type != "security_alert" {
            self.run_threshold_checks(ctx, event_type, now);
        }
    }

    fn run_threshold_checks(&self, ctx: &RequestContext, event_type: &str, now: i64) {
        if event_type == "login_failed" {
            let since = now - FAILED_LOGIN_WINDOW_SECS;
            let masked_ip = mask_ip(&ctx.client_ip);
            match self
                .db
                .with_conn(|c| logs::count_recent_by_ip(c, "login_failed", &masked_ip, since))
            {
                Ok(count) if count >= FAILED_LOGIN_THRESHOLD => {
                    self.log(
                        ctx,
                        "security_alert",
                        None,
                        serde_json::json!({
                            "kind": "repeated_login_failures",
                            "count": count,
                            "window_secs": FAILED_LOGIN_WINDOW_SECS,
                        }),
                        LogLevel::Critical,
                    );
                }
                Ok(_) => {}
                Err(e) => warn!("threshold check failed: {e}"),
            }
        }

        if event_type == "hash_corruption_detected" {
            let since = now - CORRUPTION_BURST_WINDOW_SECS;
            match self
                .db
                .with_conn(|c| logs::count_recent_by_type(c, "hash_corruption_detected", since))
            {
                Ok(count) if count >= CORRUPTION_BURST_THRESHOLD => {
                    self.log(
                        ctx,
                        "security_alert",
                        None,
                        serde_json::json!({
                            "kind": "corruption_burst",
                            "count": count,
                            "window_secs": CORRUPTION_BURST_WINDOW_SECS,
                        }),
                        LogLevel::Critical,
                    );
                }
                Ok(_) => {}
                Err(e) => warn!("threshold check failed: {e}"),
            }
        }
    }

    /// Aggregate view over the event store for the dashboard.
    pub fn failure_stats(&self, period: StatsPeriod) -> ServiceResult<FailureStats> {
        let since = Utc::now().timestamp() - period.hours() * 3600;
        let (total, by_category, by_level, ips) = self.db.with_conn(|conn| {
            Ok((
                logs::total_since(conn, since)?,
                logs::counts_by_column(conn, LogGroup::Category, since)?,
                logs::counts_by_column(conn, LogGroup::Level, since)?,
                logs::top_ips(conn, since, 10)?,
            ))
        })?;

        Ok(FailureStats {
            period,
            total_events: total as usize,
            by_category: to_count_map(by_category),
            by_level: to_count_map(by_level),
            top_offending_ips: ips
                .into_iter()
                .map(|(ip, count)| IpCount {
                    ip: mask_ip(&ip),
                    count: count as usize,
                })
                .collect(),
        })
    }
}

fn to_count_map(rows: Vec<(String, i64)>) -> BTreeMap<String, usize> {
    rows.into_iter().map(|(k, v)| (k, v as usize)).collect()
}

// -- Masking --

/// Reduce a hash to a short prefix. Ten characters keeps the algorithm
/// marker and a sliver of salt, enough to correlate audit rows without
/// exposing usable material.
pub fn mask_hash(hash: &str) -> String {
    let prefix: String = hash.chars().take(10).collect();
    if hash.chars().count() > 10 {
        format!("{prefix}...")
    } else {
        prefix
    }
}

pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) => {
            let kept: String = local.chars().take(2).collect();
            format!("{kept}***@{domain}")
        }
        None => "***".to_string(),
    }
}

pub fn mask_ip(ip: &str) -> String {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() == 4 {
        return format!("{}.{}.*.*", parts[0], parts[1]);
    }
    // IPv6 and anything unparsable: keep the leading group only.
    match ip.split_once(':') {
        Some((head, _)) => format!("{head}:*"),
        None => "*".to_string(),
    }
}

pub fn mask_session(session_id: &str) -> String {
    session_id.chars().take(8).collect()
}

/// Recursively mask sensitive fields in a details object before it
/// reaches any sink. Keys are matched by substring so nested and
/// prefixed variants (old_hash, user_email, ...) are covered.
fn mask_value(value: &mut Value) {
    let Value::Object(map) = value else { return };
    for (key, v) in map.iter_mut() {
        if let Value::Object(_) = v {
            mask_value(v);
            continue;
        }
        let lower = key.to_ascii_lowercase();
        let Some(s) = v.as_str() else { continue };
        if lower.contains("password") || lower.contains("plaintext") {
            *v = Value::String("[REDACTED]".to_string());
        } else if lower.contains("hash") {
            *v = Value::String(mask_hash(s));
        } else if lower.contains("email") {
            *v = Value::String(mask_email(s));
        } else if lower.contains("session") {
            *v = Value::String(mask_session(s));
        } else if lower == "ip" || lower.ends_with("_ip") {
            *v = Value::String(mask_ip(s));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_rules() {
        assert_eq!(
            mask_hash("$2y$10$92IXUNpkjO0rOQ5byMi.Ye4oKoEa3Ro9llC/.og/at2.uheWG/igi"),
            "$2y$10$92I..."
        );
        assert_eq!(mask_email("alice@example.com"), "al***@example.com");
        assert_eq!(mask_ip("203.0.113.9"), "203.0.*.*");
        assert_eq!(mask_ip("2001:db8::1"), "2001:*");
        assert_eq!(mask_session("3f2b9c8a-long-session-id"), "3f2b9c8a");
    }

    #[test]
    fn details_are_masked_recursively() {
        let mut details = serde_json::json!({
            "password": "admin123",
            "old_hash": "$2y$10$92IXUNpkjO0rOQ5byMi.Ye4oKoEa3Ro9llC/.og/at2.uheWG/igi",
            "nested": { "email": "bob@example.org" },
            "count": 3,
        });
        mask_value(&mut details);
        assert_eq!(details["password"], "[REDACTED]");
        assert_eq!(details["old_hash"], "$2y$10$92I...");
        assert_eq!(details["nested"]["email"], "bo***@example.org");
        assert_eq!(details["count"], 3);
    }

    #[test]
    fn unmapped_event_types_default_to_system() {
        assert_eq!(category_for("something_new"), Category::System);
        assert_eq!(category_for("login_failed"), Category::Auth);
        assert_eq!(category_for("rate_limit_exceeded"), Category::RateLimit);
    }
}
