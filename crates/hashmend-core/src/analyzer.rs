use hashmend_types::context::RequestContext;
use hashmend_types::verdict::{
    CorruptionType, CorruptionVerdict, FormatIssue, HashRecord, Severity, EXPECTED_HASH_LENGTH,
};

use crate::events::{EventLogger, LogLevel};
use crate::validator;

/// Classify a stored hash string. Pure and idempotent: two calls on the
/// same input yield identical verdicts.
///
/// Check order is fixed, but severity only ever escalates: a later minor
/// finding can never paper over an earlier critical one.
pub fn analyze(hash: &str) -> CorruptionVerdict {
    let mut verdict = CorruptionVerdict::clean();
    let format = validator::validate(hash);
    let trimmed_len = hash.trim().chars().count();

    // Truncation first: a partial hash is unrecoverable.
    if trimmed_len > 0 && trimmed_len < EXPECTED_HASH_LENGTH {
        verdict.record(
            CorruptionType::Truncation,
            Severity::Critical,
            format!("hash truncated to {trimmed_len} of {EXPECTED_HASH_LENGTH} characters"),
        );
    }

    let mut whitespace_found = false;
    for issue in &format.issues {
        match issue {
            FormatIssue::Empty | FormatIssue::Length => verdict.record(
                CorruptionType::FormatCorruption,
                Severity::Critical,
                issue.describe(),
            ),
            FormatIssue::Prefix | FormatIssue::SaltSegment | FormatIssue::DigestSegment => verdict
                .record(
                    CorruptionType::FormatCorruption,
                    Severity::Major,
                    issue.describe(),
                ),
            FormatIssue::Whitespace => {
                whitespace_found = true;
                verdict.record(
                    CorruptionType::FormatCorruption,
                    Severity::Minor,
                    issue.describe(),
                );
            }
            FormatIssue::CharacterSet => verdict.record(
                CorruptionType::CharacterCorruption,
                Severity::Major,
                issue.describe(),
            ),
        }
    }

    if hash.chars().any(|c| !c.is_ascii()) {
        verdict.record(
            CorruptionType::EncodingCorruption,
            Severity::Major,
            "hash contains non-ASCII bytes",
        );
    }
    if hash.contains('\0') {
        verdict.record(
            CorruptionType::NullByteCorruption,
            Severity::Critical,
            "hash contains embedded null bytes",
        );
    }

    // A trim away from valid is the one self-healing case.
    verdict.repair_possible = whitespace_found
        && verdict.severity == Severity::Minor
        && verdict.types.len() == 1;

    verdict
}

/// Classify a hash as read from the credential store, folding in the
/// byte-level metadata the raw string alone cannot show.
pub fn analyze_record(record: &HashRecord) -> CorruptionVerdict {
    let mut verdict = analyze(&record.raw_hash);
    if record.has_encoding_mismatch() {
        verdict.record(
            CorruptionType::EncodingCorruption,
            Severity::Major,
            format!(
                "byte length {} disagrees with character length {}",
                record.byte_length, record.char_length
            ),
        );
        verdict.repair_possible = false;
    }
    if record.has_null_byte() {
        verdict.record(
            CorruptionType::NullByteCorruption,
            Severity::Critical,
            "stored value contains embedded null bytes",
        );
        verdict.repair_possible = false;
    }
    verdict
}

/// `analyze` plus the one structured event the pipeline emits per
/// corrupted hash. Critical findings log at the critical level, the rest
/// at error.
pub fn analyze_logged(
    hash: &str,
    user_id: Option<&str>,
    events: &EventLogger<'_>,
    ctx: &RequestContext,
) -> CorruptionVerdict {
    let verdict = analyze(hash);
    if verdict.is_corrupted {
        let level = if verdict.severity == Severity::Critical {
            LogLevel::Critical
        } else {
            LogLevel::Error
        };
        events.log(
            ctx,
            "hash_corruption_detected",
            user_id,
            serde_json::json!({
                "severity": verdict.severity.as_str(),
                "types": verdict.type_list(),
                "hash": hash,
            }),
            level,
        );
    }
    verdict
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "$2y$10$92IXUNpkjO0rOQ5byMi.Ye4oKoEa3Ro9llC/.og/at2.uheWG/igi";

    #[test]
    fn valid_hash_is_clean() {
        let v = analyze(GOOD);
        assert!(!v.is_corrupted);
        assert_eq!(v.severity, Severity::None);
        assert!(!v.repair_possible);
    }

    #[test]
    fn analysis_is_idempotent() {
        let first = analyze(" $2y$10$broken");
        let second = analyze(" $2y$10$broken");
        assert_eq!(first.severity, second.severity);
        assert_eq!(first.types, second.types);
        assert_eq!(first.details, second.details);
    }

    #[test]
    fn truncated_hash_is_critical_and_unrepairable() {
        let v = analyze(&GOOD[..40]);
        assert!(v.is_corrupted);
        assert!(v.types.contains(&CorruptionType::Truncation));
        assert_eq!(v.severity, Severity::Critical);
        assert!(!v.repair_possible);
    }

    #[test]
    fn whitespace_only_corruption_is_minor_and_repairable() {
        let v = analyze(&format!("  {GOOD}\n"));
        assert!(v.is_corrupted);
        assert_eq!(v.severity, Severity::Minor);
        assert!(v.repair_possible);
    }

    #[test]
    fn later_minor_finding_cannot_downgrade_critical() {
        // Truncated *and* whitespace-padded: truncation fires first at
        // critical, the whitespace check afterwards must not lower it.
        let v = analyze(&format!(" {} ", &GOOD[..30]));
        assert_eq!(v.severity, Severity::Critical);
        assert!(!v.repair_possible);
    }

    #[test]
    fn null_byte_is_critical() {
        let mangled = format!("{}\0", &GOOD[..59]);
        let v = analyze(&mangled);
        assert!(v.types.contains(&CorruptionType::NullByteCorruption));
        assert_eq!(v.severity, Severity::Critical);
    }

    #[test]
    fn non_ascii_is_encoding_corruption() {
        let mangled = GOOD.replacen('9', "é", 1);
        let v = analyze(&mangled);
        assert!(v.types.contains(&CorruptionType::EncodingCorruption));
    }

    #[test]
    fn format_validity_is_independent_of_verification() {
        // Structurally valid hash for some unknown password: analysis
        // stays clean even though verification against a guess fails.
        let v = analyze(GOOD);
        assert!(!v.is_corrupted);
        assert!(!crate::hashing::verify_password("admin123", GOOD));
    }
}
