use thiserror::Error;

/// Failure taxonomy for authentication and authorization operations.
///
/// Construction failures (email, phone, password policy) are raised at the
/// value-object boundary. Steady-state token conditions (absent, expired,
/// revoked) are returned as `None`/`false`, never as errors. Infrastructure
/// failures surface as [`AuthError::Unexpected`] and are logged at the
/// handler boundary before being mapped to an opaque message.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed caller input, surfaced verbatim.
    #[error("{0}")]
    Validation(String),
    /// Plaintext password failed the strength policy; names the unmet rule.
    #[error("{0}")]
    WeakCredential(&'static str),
    /// Unknown identifier or wrong password. Deliberately the same variant
    /// for both, to avoid user enumeration.
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account is deactivated")]
    AccountDisabled,
    /// Duplicate email or phone on registration.
    #[error("{0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Refresh token absent, expired, or revoked.
    #[error("Invalid or expired token")]
    TokenInvalid,
    /// Infrastructure failure. Detail is for logs, never for callers.
    #[error("{0}")]
    Unexpected(String),
}

#[cfg(feature = "database")]
impl From<warden_pg::PgErr> for AuthError {
    fn from(e: warden_pg::PgErr) -> Self {
        Self::Unexpected(e.to_string())
    }
}
