use serde::Deserialize;

/// The closed set of administrative diagnostic actions. Dispatch is an
/// exhaustive match; an unknown action fails at deserialization instead
/// of falling through a runtime default branch.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminCommand {
    VerifyHash {
        password: String,
        hash: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    AnalyzeHash {
        hash: String,
    },
    CheckDatabaseIntegrity,
    BulkUserAnalysis {
        #[serde(default)]
        limit: Option<u32>,
        #[serde(default)]
        offset: Option<u32>,
    },
    ExecuteRepair {
        user_id: String,
        new_password: String,
        #[serde(default)]
        force_repair: bool,
    },
    RollbackRepair {
        backup_id: String,
        reason: String,
    },
    GetRepairStatus {
        user_id: String,
    },
}

impl AdminCommand {
    /// Stable action name — the CSRF scope and rate-limit category key.
    pub fn action_name(&self) -> &'static str {
        match self {
            AdminCommand::VerifyHash { .. } => "verify_hash",
            AdminCommand::AnalyzeHash { .. } => "analyze_hash",
            AdminCommand::CheckDatabaseIntegrity => "check_database_integrity",
            AdminCommand::BulkUserAnalysis { .. } => "bulk_user_analysis",
            AdminCommand::ExecuteRepair { .. } => "execute_repair",
            AdminCommand::RollbackRepair { .. } => "rollback_repair",
            AdminCommand::GetRepairStatus { .. } => "get_repair_status",
        }
    }

    pub const ACTION_NAMES: [&'static str; 7] = [
        "verify_hash",
        "analyze_hash",
        "check_database_integrity",
        "bulk_user_analysis",
        "execute_repair",
        "rollback_repair",
        "get_repair_status",
    ];
}

/// Wire shape of a diagnostics request: the CSRF token rides beside the
/// tagged command.
#[derive(Debug, Deserialize)]
pub struct DiagnosticsRequest {
    pub csrf_token: String,
    #[serde(flatten)]
    pub command: AdminCommand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_tagged_json() {
        let req: DiagnosticsRequest = serde_json::from_str(
            r#"{"csrf_token":"t","action":"analyze_hash","hash":"$2y$10$x"}"#,
        )
        .unwrap();
        assert_eq!(req.command.action_name(), "analyze_hash");

        let req: DiagnosticsRequest = serde_json::from_str(
            r#"{"csrf_token":"t","action":"execute_repair","user_id":"u1","new_password":"pw"}"#,
        )
        .unwrap();
        match req.command {
            AdminCommand::ExecuteRepair { force_repair, .. } => assert!(!force_repair),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_actions_are_rejected_at_parse_time() {
        let res: Result<DiagnosticsRequest, _> =
            serde_json::from_str(r#"{"csrf_token":"t","action":"drop_tables"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn unit_command_needs_no_params() {
        let req: DiagnosticsRequest = serde_json::from_str(
            r#"{"csrf_token":"t","action":"check_database_integrity"}"#,
        )
        .unwrap();
        assert_eq!(req.command.action_name(), "check_database_integrity");
    }
}
