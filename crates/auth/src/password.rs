//! Argon2 hashing and verification, gated by the plaintext strength policy.
use argon2::Argon2;
use argon2::PasswordHash;
use argon2::PasswordHasher;
use argon2::PasswordVerifier;
use argon2::password_hash::SaltString;

use crate::AuthError;

fn salt() -> SaltString {
    use rand::Rng;
    let ref mut bytes = [0u8; 16];
    rand::rng().fill(bytes);
    SaltString::encode_b64(bytes).expect("salt")
}

/// Checks the plaintext against the strength policy without hashing.
/// Each violation names the unmet rule.
pub fn strength(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < warden_core::PASSWORD_MIN_LENGTH {
        return Err(AuthError::WeakCredential(
            "Password must be at least 8 characters long",
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(AuthError::WeakCredential(
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(AuthError::WeakCredential(
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakCredential(
            "Password must contain at least one digit",
        ));
    }
    if !password
        .chars()
        .any(|c| warden_core::PASSWORD_SPECIALS.contains(c))
    {
        return Err(AuthError::WeakCredential(
            "Password must contain at least one special character",
        ));
    }
    Ok(())
}

pub fn hash(password: &str) -> Result<String, AuthError> {
    strength(password)?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt())
        .map(|h| h.to_string())
        .map_err(|e| AuthError::Unexpected(e.to_string()))
}

/// False on empty input or an undecodable digest, never an error.
pub fn verify(password: &str, hashword: &str) -> bool {
    if password.is_empty() {
        return false;
    }
    PasswordHash::new(hashword)
        .ok()
        .as_ref()
        .map(|hash| {
            Argon2::default()
                .verify_password(password.as_bytes(), hash)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_own_hash() {
        let digest = hash("Abcdef1!").unwrap();
        assert!(verify("Abcdef1!", &digest));
        assert!(!verify("Abcdef1?", &digest));
        assert!(!verify("abcdef1!", &digest));
    }

    #[test]
    fn salts_are_unique() {
        let a = hash("Abcdef1!").unwrap();
        let b = hash("Abcdef1!").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn names_the_unmet_rule() {
        let rule = |p: &str| match hash(p) {
            Err(AuthError::WeakCredential(rule)) => rule,
            other => panic!("expected weak credential, got {:?}", other),
        };
        assert!(rule("Ab1!").contains("8 characters"));
        assert!(rule("abcdef1!").contains("uppercase"));
        assert!(rule("ABCDEF1!").contains("lowercase"));
        assert!(rule("Abcdefg!").contains("digit"));
        assert!(rule("Abcdefg1").contains("special"));
    }

    #[test]
    fn verify_never_panics_on_garbage() {
        let digest = hash("Abcdef1!").unwrap();
        assert!(!verify("", &digest));
        assert!(!verify("Abcdef1!", ""));
        assert!(!verify("Abcdef1!", "not-a-phc-string"));
    }
}
