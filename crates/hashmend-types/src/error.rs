use thiserror::Error;

/// Step of the repair state machine at which a failure occurred.
/// Mirrors the transition order: every step past `BackedUp` implies a
/// backup row already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStep {
    Start,
    BackedUp,
    HashGenerated,
    Persisted,
    Verified,
    Committed,
}

impl RepairStep {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairStep::Start => "start",
            RepairStep::BackedUp => "backed_up",
            RepairStep::HashGenerated => "hash_generated",
            RepairStep::Persisted => "persisted",
            RepairStep::Verified => "verified",
            RepairStep::Committed => "committed",
        }
    }
}

/// Service-wide error taxonomy. Validation and not-found errors go back to
/// the caller as-is; repair failures always imply the transaction was
/// rolled back; access-denied and rate-limited deliberately carry no
/// detail about the underlying cause.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("environment fault: {0}")]
    Environment(String),

    #[error("repair failed at step {step:?}: {reason}")]
    Repair { step: RepairStep, reason: String },

    #[error("access denied (ref {correlation_id})")]
    AccessDenied { correlation_id: String },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: i64 },

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        ServiceError::NotFound { kind, id: id.into() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::Validation(msg.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
