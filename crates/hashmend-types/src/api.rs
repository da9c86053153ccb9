use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::verdict::{CorruptionVerdict, HashFormatVerdict, Severity};

// -- Envelope --

/// Uniform response envelope for every administrative action.
#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

impl<T: Serialize> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None, warnings: None }
    }

    pub fn ok_with_warnings(data: T, warnings: Vec<String>) -> Self {
        let warnings = if warnings.is_empty() { None } else { Some(warnings) };
        Self { success: true, data: Some(data), error: None, warnings }
    }

    pub fn err(error: ApiError) -> Self {
        Self { success: false, data: None, error: Some(error), warnings: None }
    }
}

/// Machine-readable error payload. `retry_after_secs` only appears on
/// rate-limit rejections; `correlation_id` only on access denials.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: String,
    pub token: String,
}

// -- CSRF --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CsrfIssueRequest {
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct CsrfIssueResponse {
    pub token: String,
    pub action: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

// -- Diagnostic action payloads --

#[derive(Debug, Serialize)]
pub struct VerifyHashData {
    pub verification_success: bool,
    pub format: HashFormatVerdict,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeHashData {
    pub format: HashFormatVerdict,
    pub corruption: CorruptionVerdict,
}

#[derive(Debug, Serialize)]
pub struct RepairData {
    pub user_id: String,
    pub backup_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_trail_id: Option<String>,
    pub rollback_available: bool,
}

#[derive(Debug, Serialize)]
pub struct RollbackData {
    pub restored_user_id: String,
    pub backup_id: String,
    pub audit_trail_id: String,
    /// Whether another unconsumed backup could still restore this user.
    pub rollback_available: bool,
}

#[derive(Debug, Serialize)]
pub struct RepairStatusData {
    pub user_id: String,
    pub corruption: CorruptionVerdict,
    pub backups: Vec<BackupSummary>,
    pub rollback_available: bool,
}

#[derive(Debug, Serialize)]
pub struct BackupSummary {
    pub id: String,
    pub reason: String,
    pub corruption_severity: Severity,
    pub rollback_performed: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct BulkAnalysisData {
    pub scanned: usize,
    pub corrupted: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub users: Vec<UserAnalysisSummary>,
}

#[derive(Debug, Serialize)]
pub struct UserAnalysisSummary {
    pub user_id: String,
    /// Partially masked; raw addresses never leave the service.
    pub email: String,
    pub severity: Severity,
    pub corruption_types: Vec<String>,
    pub repair_possible: bool,
}

// -- Database integrity --

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSpec {
    pub column_type: String,
    pub nullable: bool,
    pub collation: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CharsetReport {
    pub db_charset: String,
    pub db_collation: Option<String>,
    pub table_collation: Option<String>,
    pub column_collation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IntegrityData {
    pub column: ColumnSpec,
    pub charset: CharsetReport,
    pub recommendations: Vec<String>,
    pub scan: BulkAnalysisData,
}

// -- Stats --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum StatsPeriod {
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "24h")]
    Day,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
}

impl StatsPeriod {
    pub fn hours(self) -> i64 {
        match self {
            StatsPeriod::Hour => 1,
            StatsPeriod::Day => 24,
            StatsPeriod::Week => 24 * 7,
            StatsPeriod::Month => 24 * 30,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FailureStats {
    pub period: StatsPeriod,
    pub total_events: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_level: BTreeMap<String, usize>,
    pub top_offending_ips: Vec<IpCount>,
}

#[derive(Debug, Serialize)]
pub struct IpCount {
    /// Masked form; full addresses stay in the store.
    pub ip: String,
    pub count: usize,
}
