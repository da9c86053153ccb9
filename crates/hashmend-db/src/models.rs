/// Database row types — these map directly to SQLite rows.
/// Distinct from the hashmend-types API models to keep the DB layer
/// independent.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub created_at: String,
}

pub struct BackupRow {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub original_hash: String,
    pub hash_length: i64,
    pub corruption_detected: bool,
    pub corruption_types: String,
    pub corruption_severity: String,
    pub reason: String,
    pub created_by: String,
    pub rollback_performed: bool,
    pub rollback_at: Option<String>,
    pub created_at: String,
}

pub struct AuditRow {
    pub id: String,
    pub user_id: String,
    pub action_type: String,
    pub old_hash_prefix: Option<String>,
    pub new_hash_prefix: Option<String>,
    pub backup_id: Option<String>,
    pub corruption_detected: bool,
    pub corruption_types: Option<String>,
    pub reason: Option<String>,
    pub performed_by: String,
    pub ip: String,
    pub user_agent: String,
    pub created_at: String,
}
