use chrono::Utc;
use hashmend_db::queries::rate_limits;
use hashmend_db::Database;
use hashmend_types::context::RequestContext;
use hashmend_types::error::{ServiceError, ServiceResult};

/// Per-category window configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateRule {
    pub limit: i64,
    pub window_secs: i64,
}

/// What one admission check decided.
#[derive(Debug, Clone)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: i64,
    pub reset_at: i64,
    pub message: Option<String>,
}

/// Fixed-window request counters per (client IP, action type), persisted
/// so concurrent workers share one view. Categories without a registered
/// rule pass unrestricted; registering a rule is what makes this a
/// control, the default is not one.
pub struct RateLimiter {
    rules: Vec<(&'static str, RateRule)>,
}

impl RateLimiter {
    pub fn new(rules: Vec<(&'static str, RateRule)>) -> Self {
        Self { rules }
    }

    /// Diagnostic reads get generous windows; destructive repair
    /// operations get a handful per quarter hour.
    pub fn with_defaults() -> Self {
        Self::new(vec![
            ("verify_hash", RateRule { limit: 30, window_secs: 300 }),
            ("analyze_hash", RateRule { limit: 30, window_secs: 300 }),
            ("get_repair_status", RateRule { limit: 30, window_secs: 300 }),
            ("check_database_integrity", RateRule { limit: 10, window_secs: 600 }),
            ("bulk_user_analysis", RateRule { limit: 10, window_secs: 600 }),
            ("execute_repair", RateRule { limit: 5, window_secs: 900 }),
            ("rollback_repair", RateRule { limit: 5, window_secs: 900 }),
        ])
    }

    pub fn rule_for(&self, action_type: &str) -> Option<RateRule> {
        self.rules
            .iter()
            .find(|(name, _)| *name == action_type)
            .map(|(_, rule)| *rule)
    }

    /// Admit or reject one request. Purges the key's expired window,
    /// then increments it atomically at the store so two concurrent
    /// requests can never both take the last slot.
    pub fn check(
        &self,
        db: &Database,
        ctx: &RequestContext,
        action_type: &str,
    ) -> ServiceResult<RateDecision> {
        let Some(rule) = self.rule_for(action_type) else {
            return Ok(RateDecision {
                allowed: true,
                remaining: i64::MAX,
                reset_at: 0,
                message: None,
            });
        };

        let now = Utc::now().timestamp();
        let state = db.with_conn_mut(|conn| {
            rate_limits::check_and_increment(
                conn,
                &ctx.client_ip,
                action_type,
                Some(&ctx.user_id),
                rule.limit,
                rule.window_secs,
                now,
            )
        })?;

        let reset_at = state.window_start + rule.window_secs;
        if state.allowed {
            Ok(RateDecision {
                allowed: true,
                remaining: (rule.limit - state.request_count).max(0),
                reset_at,
                message: None,
            })
        } else {
            Ok(RateDecision {
                allowed: false,
                remaining: 0,
                reset_at,
                message: Some(format!(
                    "limit of {} requests per {}s reached for {action_type}",
                    rule.limit, rule.window_secs
                )),
            })
        }
    }

    /// `check` that rejects with a typed error carrying the retry-after.
    pub fn enforce(
        &self,
        db: &Database,
        ctx: &RequestContext,
        action_type: &str,
    ) -> ServiceResult<RateDecision> {
        let decision = self.check(db, ctx, action_type)?;
        if !decision.allowed {
            let retry_after = (decision.reset_at - Utc::now().timestamp()).max(1);
            return Err(ServiceError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        Ok(decision)
    }
}
