use super::*;

/// International phone number: `+` followed by 7–15 digits, nonzero first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(input: &str) -> Result<Self, AuthError> {
        let phone = input.trim();
        if phone.is_empty() {
            return Err(AuthError::Validation(
                "Phone number cannot be empty".to_string(),
            ));
        }
        if !Self::well_formed(phone) {
            return Err(AuthError::Validation(
                "Invalid phone number format".to_string(),
            ));
        }
        Ok(Self(phone.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuilds from an already-validated stored value.
    #[cfg(feature = "database")]
    pub(crate) fn raw(value: String) -> Self {
        Self(value)
    }

    fn well_formed(phone: &str) -> bool {
        let Some(digits) = phone.strip_prefix('+') else {
            return false;
        };
        (7..=15).contains(&digits.len())
            && !digits.starts_with('0')
            && digits.chars().all(|c| c.is_ascii_digit())
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_international_formats() {
        assert!(PhoneNumber::parse("+1234567890").is_ok());
        assert!(PhoneNumber::parse("+447911123456").is_ok());
        assert!(PhoneNumber::parse("+84901234567").is_ok());
        assert!(PhoneNumber::parse(" +1234567 ").is_ok());
    }

    #[test]
    fn rejects_malformed() {
        assert!(PhoneNumber::parse("").is_err());
        assert!(PhoneNumber::parse("1234567890").is_err());
        assert!(PhoneNumber::parse("+0123456789").is_err());
        assert!(PhoneNumber::parse("+123456").is_err());
        assert!(PhoneNumber::parse("+1234567890123456").is_err());
        assert!(PhoneNumber::parse("+12345abc90").is_err());
        assert!(PhoneNumber::parse("+12 34567890").is_err());
    }
}
