use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Expected length of a stored credential hash, in characters.
pub const EXPECTED_HASH_LENGTH: usize = 60;

/// Expected algorithm prefix (first 7 characters) of a stored hash.
pub const EXPECTED_HASH_PREFIX: &str = "$2y$10$";

/// Result of structural validation of a single hash string.
///
/// Recomputed per call; `valid` is true iff `issues` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashFormatVerdict {
    pub valid: bool,
    pub length: usize,
    pub expected_length: usize,
    pub prefix: String,
    pub expected_prefix: String,
    pub issues: Vec<FormatIssue>,
}

/// A single structural finding. Each rule in the validator is independent
/// and appends at most one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatIssue {
    Empty,
    Length,
    Prefix,
    Whitespace,
    CharacterSet,
    SaltSegment,
    DigestSegment,
}

impl FormatIssue {
    pub fn describe(self) -> &'static str {
        match self {
            FormatIssue::Empty => "hash is empty or missing",
            FormatIssue::Length => "hash length differs from the expected 60 characters",
            FormatIssue::Prefix => "hash does not start with the expected algorithm prefix",
            FormatIssue::Whitespace => "hash carries leading or trailing whitespace",
            FormatIssue::CharacterSet => "hash contains characters outside the bcrypt alphabet",
            FormatIssue::SaltSegment => "salt segment has the wrong length",
            FormatIssue::DigestSegment => "digest segment has the wrong length",
        }
    }
}

/// Classified corruption kinds a stored hash can exhibit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptionType {
    Truncation,
    FormatCorruption,
    CharacterCorruption,
    EncodingCorruption,
    NullByteCorruption,
}

impl CorruptionType {
    pub fn as_str(self) -> &'static str {
        match self {
            CorruptionType::Truncation => "truncation",
            CorruptionType::FormatCorruption => "format_corruption",
            CorruptionType::CharacterCorruption => "character_corruption",
            CorruptionType::EncodingCorruption => "encoding_corruption",
            CorruptionType::NullByteCorruption => "null_byte_corruption",
        }
    }
}

/// Severity ladder for corruption findings. The derived `Ord` is the
/// escalation order: a verdict only ever moves up this ladder.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    None,
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Minor => "minor",
            Severity::Major => "major",
            Severity::Critical => "critical",
        }
    }
}

/// Full classification of a stored hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorruptionVerdict {
    pub is_corrupted: bool,
    pub types: BTreeSet<CorruptionType>,
    pub severity: Severity,
    pub repair_possible: bool,
    pub details: Vec<String>,
}

impl CorruptionVerdict {
    pub fn clean() -> Self {
        Self {
            is_corrupted: false,
            types: BTreeSet::new(),
            severity: Severity::None,
            repair_possible: false,
            details: Vec::new(),
        }
    }

    /// Record a finding, never downgrading severity already established
    /// by an earlier check.
    pub fn record(&mut self, kind: CorruptionType, severity: Severity, detail: impl Into<String>) {
        self.is_corrupted = true;
        self.types.insert(kind);
        self.severity = self.severity.max(severity);
        self.details.push(detail.into());
    }

    /// Comma-joined corruption type names, for audit rows and log fields.
    pub fn type_list(&self) -> String {
        self.types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A credential row as read from the user table, with the metadata the
/// analyzer needs. Transient; never persisted outside the user table.
#[derive(Debug, Clone)]
pub struct HashRecord {
    pub user_id: String,
    pub email: String,
    pub raw_hash: String,
    pub trimmed_hash: String,
    pub byte_length: usize,
    pub char_length: usize,
}

impl HashRecord {
    /// Byte length and char length disagreeing means the stored value is
    /// not plain ASCII, which a bcrypt hash always is.
    pub fn has_encoding_mismatch(&self) -> bool {
        self.byte_length != self.char_length
    }

    pub fn has_null_byte(&self) -> bool {
        self.raw_hash.contains('\0')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_order_matches_escalation_ladder() {
        assert!(Severity::None < Severity::Minor);
        assert!(Severity::Minor < Severity::Major);
        assert!(Severity::Major < Severity::Critical);
    }

    #[test]
    fn record_never_downgrades_severity() {
        let mut v = CorruptionVerdict::clean();
        v.record(CorruptionType::Truncation, Severity::Critical, "truncated");
        v.record(CorruptionType::FormatCorruption, Severity::Minor, "whitespace");
        assert_eq!(v.severity, Severity::Critical);
        assert_eq!(v.types.len(), 2);
    }
}
