use super::*;

/// Credential verification against the store.
///
/// Returns the same [`AuthError::InvalidCredentials`] for an unknown
/// identifier and a wrong password, so callers cannot enumerate accounts.
pub struct Authenticator<S> {
    store: S,
}

impl<S: Store> Authenticator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Resolves the identifier (email first, then phone), checks the account
    /// is active, and verifies the password. Updating `last_login` is the
    /// caller's concern, not a side effect here.
    pub async fn authenticate(&self, identifier: &str, password: &str) -> Result<User, AuthError> {
        let Some((user, hashword)) = self.store.lookup(identifier).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        if !user.active() {
            return Err(AuthError::AccountDisabled);
        }
        if !password::verify(password, &hashword) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    pub async fn is_email_available(&self, email: &Email) -> Result<bool, AuthError> {
        self.store.exists_email(email).await.map(|exists| !exists)
    }

    pub async fn is_phone_available(&self, phone: &PhoneNumber) -> Result<bool, AuthError> {
        self.store.exists_phone(phone).await.map(|exists| !exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::Unique;

    async fn seeded() -> (Ledger, User) {
        let ledger = Ledger::new();
        let user = User::new(
            "Ada".to_string(),
            "Lovelace".to_string(),
            Email::parse("ada@example.com").unwrap(),
            None,
        );
        let hashword = password::hash("Abcdef1!").unwrap();
        ledger.create_user(&user, &hashword).await.unwrap();
        (ledger, user)
    }

    #[tokio::test]
    async fn accepts_valid_credentials() {
        let (ledger, user) = seeded().await;
        let engine = Authenticator::new(ledger);
        let found = engine.authenticate("ada@example.com", "Abcdef1!").await.unwrap();
        assert_eq!(found.id(), user.id());
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_are_indistinguishable() {
        let (ledger, _) = seeded().await;
        let engine = Authenticator::new(ledger);
        let missing = engine.authenticate("ghost@example.com", "Abcdef1!").await;
        let wrong = engine.authenticate("ada@example.com", "Wrong1!aa").await;
        assert!(matches!(missing, Err(AuthError::InvalidCredentials)));
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn deactivated_account_is_distinct() {
        let (ledger, mut user) = seeded().await;
        user.deactivate();
        ledger.update_user(&user).await.unwrap();
        let engine = Authenticator::new(ledger);
        let result = engine.authenticate("ada@example.com", "Abcdef1!").await;
        assert!(matches!(result, Err(AuthError::AccountDisabled)));
    }

    #[tokio::test]
    async fn availability_is_existence_negation() {
        let (ledger, _) = seeded().await;
        let engine = Authenticator::new(ledger);
        let taken = Email::parse("ada@example.com").unwrap();
        let free = Email::parse("free@example.com").unwrap();
        assert!(!engine.is_email_available(&taken).await.unwrap());
        assert!(engine.is_email_available(&free).await.unwrap());
        let phone = PhoneNumber::parse("+1234567890").unwrap();
        assert!(engine.is_phone_available(&phone).await.unwrap());
    }
}
