// 🔑 Password Policy
//
// The policy travels with each call into the store's domain path rather than
// living in process-wide settings, so a batch can relax it for its own writes
// without touching anything else.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const HASH_PREFIX: &str = "sha256:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    /// When false, supplied passwords are accepted as-is
    pub enforced: bool,
    pub min_length: usize,
    pub require_digit: bool,
    pub require_upper: bool,
}

impl PasswordPolicy {
    /// Policy used for bulk imports: nothing is checked.
    pub fn relaxed() -> Self {
        PasswordPolicy {
            enforced: false,
            ..Self::strict()
        }
    }

    pub fn strict() -> Self {
        PasswordPolicy {
            enforced: true,
            min_length: 8,
            require_digit: true,
            require_upper: true,
        }
    }

    /// Explain the first rule `password` breaks, if any.
    pub fn check(&self, password: &str) -> Result<(), String> {
        if !self.enforced {
            return Ok(());
        }

        if password.chars().count() < self.min_length {
            return Err(format!(
                "password must have at least {} characters",
                self.min_length
            ));
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err("password must contain a digit".to_string());
        }
        if self.require_upper && !password.chars().any(|c| c.is_uppercase()) {
            return Err("password must contain an upper-case letter".to_string());
        }

        Ok(())
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self::relaxed()
    }
}

pub fn hash_password(plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plain.as_bytes());
    format!("{}{:x}", HASH_PREFIX, hasher.finalize())
}

pub fn is_hashed(value: &str) -> bool {
    value.starts_with(HASH_PREFIX)
}

/// Random password for subjects imported without one.
pub fn generate_password() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relaxed_accepts_anything() {
        let policy = PasswordPolicy::relaxed();
        assert!(policy.check("").is_ok());
        assert!(policy.check("abc").is_ok());
    }

    #[test]
    fn test_strict_rules() {
        let policy = PasswordPolicy::strict();

        assert!(policy.check("short1A").is_err());
        assert!(policy.check("longenoughA").is_err());
        assert!(policy.check("longenough1").is_err());
        assert!(policy.check("Longenough1").is_ok());
    }

    #[test]
    fn test_hash_is_stable_and_marked() {
        let a = hash_password("secret");
        let b = hash_password("secret");

        assert_eq!(a, b);
        assert!(is_hashed(&a));
        assert_eq!(a.len(), HASH_PREFIX.len() + 64);
        assert!(!is_hashed("secret"));
    }

    #[test]
    fn test_generated_passwords_differ() {
        assert_ne!(generate_password(), generate_password());
        assert_eq!(generate_password().len(), 32);
    }
}
