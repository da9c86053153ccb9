use hashmend_types::verdict::{
    FormatIssue, HashFormatVerdict, EXPECTED_HASH_LENGTH, EXPECTED_HASH_PREFIX,
};

/// Characters bcrypt's modular-crypt encoding can legally contain.
fn in_alphabet(c: char) -> bool {
    c == '$' || c == '.' || c == '/' || c.is_ascii_alphanumeric()
}

/// Structural validation of a stored hash string. Pure; safe on
/// attacker-controlled input of any length (all slicing is bounds- and
/// boundary-checked).
///
/// Every rule but the whitespace one is evaluated against the trimmed
/// form, so a hash that is valid except for stray surrounding whitespace
/// reports exactly the whitespace finding.
pub fn validate(hash: &str) -> HashFormatVerdict {
    let mut issues = Vec::new();

    if hash.is_empty() {
        return HashFormatVerdict {
            valid: false,
            length: 0,
            expected_length: EXPECTED_HASH_LENGTH,
            prefix: String::new(),
            expected_prefix: EXPECTED_HASH_PREFIX.to_string(),
            issues: vec![FormatIssue::Empty],
        };
    }

    let trimmed = hash.trim();
    let length = trimmed.chars().count();
    let prefix: String = trimmed.chars().take(EXPECTED_HASH_PREFIX.len()).collect();

    if length != EXPECTED_HASH_LENGTH {
        issues.push(FormatIssue::Length);
    }
    if prefix != EXPECTED_HASH_PREFIX {
        issues.push(FormatIssue::Prefix);
    }
    if trimmed != hash {
        issues.push(FormatIssue::Whitespace);
    }
    if trimmed.chars().any(|c| !in_alphabet(c)) {
        issues.push(FormatIssue::CharacterSet);
    }

    // Segment layout only means anything at the exact expected length:
    // 7-byte prefix, 22-byte salt, 31-byte digest.
    if length == EXPECTED_HASH_LENGTH {
        match trimmed.get(7..29) {
            Some(salt) if salt.chars().count() == 22 => {}
            _ => issues.push(FormatIssue::SaltSegment),
        }
        match trimmed.get(29..60) {
            Some(digest) if digest.chars().count() == 31 => {}
            _ => issues.push(FormatIssue::DigestSegment),
        }
    }

    HashFormatVerdict {
        valid: issues.is_empty(),
        length,
        expected_length: EXPECTED_HASH_LENGTH,
        prefix,
        expected_prefix: EXPECTED_HASH_PREFIX.to_string(),
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "$2y$10$92IXUNpkjO0rOQ5byMi.Ye4oKoEa3Ro9llC/.og/at2.uheWG/igi";

    #[test]
    fn structurally_valid_hash_passes() {
        let v = validate(GOOD);
        assert!(v.valid, "issues: {:?}", v.issues);
        assert_eq!(v.length, 60);
        assert_eq!(v.prefix, "$2y$10$");
    }

    #[test]
    fn empty_hash_short_circuits() {
        let v = validate("");
        assert!(!v.valid);
        assert_eq!(v.issues, vec![FormatIssue::Empty]);
    }

    #[test]
    fn every_wrong_length_reports_a_length_issue() {
        for len in [1usize, 10, 40, 59, 61, 120] {
            let v = validate(&"a".repeat(len));
            assert!(v.issues.contains(&FormatIssue::Length), "len {len}");
            assert!(!v.valid);
        }
    }

    #[test]
    fn surrounding_whitespace_is_the_only_finding() {
        for padded in [format!(" {GOOD}"), format!("{GOOD}  "), format!("\t{GOOD}\n")] {
            let v = validate(&padded);
            assert_eq!(v.issues, vec![FormatIssue::Whitespace]);
        }
    }

    #[test]
    fn wrong_prefix_is_flagged() {
        let swapped = GOOD.replacen("$2y$10$", "$2a$12$", 1);
        let v = validate(&swapped);
        assert!(v.issues.contains(&FormatIssue::Prefix));
    }

    #[test]
    fn illegal_characters_are_flagged() {
        let mangled = format!("{}!", &GOOD[..59]);
        let v = validate(&mangled);
        assert!(v.issues.contains(&FormatIssue::CharacterSet));
    }

    #[test]
    fn multibyte_input_does_not_panic() {
        let v = validate(&"é".repeat(60));
        assert!(!v.valid);
    }
}
