use super::*;

/// Case-normalized email address.
///
/// Construction trims and lowercases, so two spellings of the same address
/// compare equal. The inner string is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    pub fn parse(input: &str) -> Result<Self, AuthError> {
        let email = input.trim().to_lowercase();
        if email.is_empty() {
            return Err(AuthError::Validation("Email cannot be empty".to_string()));
        }
        if !Self::well_formed(&email) {
            return Err(AuthError::Validation("Invalid email format".to_string()));
        }
        Ok(Self(email))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuilds from an already-normalized stored value.
    #[cfg(feature = "database")]
    pub(crate) fn raw(value: String) -> Self {
        Self(value)
    }

    /// Rejects consecutive dots, leading/trailing dots, and anything outside
    /// the local@domain.tld shape with alphanumeric/dot/dash/underscore parts.
    fn well_formed(email: &str) -> bool {
        if email.contains("..") {
            return false;
        }
        let Some((local, domain)) = email.split_once('@') else {
            return false;
        };
        if local.is_empty()
            || local.starts_with('.')
            || local.ends_with('.')
            || !local
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return false;
        }
        if domain.is_empty()
            || domain.starts_with('.')
            || domain.ends_with('.')
            || domain.starts_with('-')
            || !domain
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
        {
            return false;
        }
        let Some((_, tld)) = domain.rsplit_once('.') else {
            return false;
        };
        tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
