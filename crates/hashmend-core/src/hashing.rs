use bcrypt::{hash_with_result, verify, Version};
use hashmend_types::error::{ServiceError, ServiceResult};

/// Work factor for freshly generated hashes. Matches the `$2y$10$` form
/// the rest of the fleet stores, so repaired rows validate cleanly.
pub const BCRYPT_COST: u32 = 10;

/// Derive a new stored hash from a plaintext credential.
pub fn generate(plaintext: &str) -> ServiceResult<String> {
    let parts = hash_with_result(plaintext, BCRYPT_COST)
        .map_err(|e| ServiceError::Environment(format!("hash generation failed: {e}")))?;
    Ok(parts.format_for_version(Version::TwoY))
}

/// Constant-time verification of a plaintext against a stored hash.
/// Any primitive-level error (unparseable hash, bad cost) reads as a
/// failed verification, never as a panic.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    verify(plaintext, hash).unwrap_or(false)
}

/// Generate and immediately self-test. A generated hash that does not
/// verify against its own plaintext means the hashing primitive itself is
/// broken on this host, which must abort the caller before anything is
/// persisted.
pub fn generate_verified(plaintext: &str) -> ServiceResult<String> {
    let hash = generate(plaintext)?;
    if !verify_password(plaintext, &hash) {
        return Err(ServiceError::Environment(
            "freshly generated hash failed self-verification".into(),
        ));
    }
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashmend_types::verdict::{EXPECTED_HASH_LENGTH, EXPECTED_HASH_PREFIX};

    #[test]
    fn generated_hash_matches_stored_format() {
        let hash = generate("hunter22").unwrap();
        assert_eq!(hash.chars().count(), EXPECTED_HASH_LENGTH);
        assert!(hash.starts_with(EXPECTED_HASH_PREFIX));
    }

    #[test]
    fn round_trip_verifies_and_wrong_password_fails() {
        let hash = generate_verified("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
    }

    #[test]
    fn garbage_hash_reads_as_failed_verification() {
        assert!(!verify_password("anything", "not-a-hash"));
        assert!(!verify_password("anything", ""));
    }
}
