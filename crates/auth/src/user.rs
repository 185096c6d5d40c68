use super::*;
use std::time::SystemTime;
use warden_core::ID;
use warden_core::Unique;

/// Registered account with verified identity.
///
/// The password hash is a store-level column, never a field here; credential
/// lookups return it alongside the user.
#[derive(Debug, Clone)]
pub struct User {
    id: ID<Self>,
    first_name: String,
    last_name: String,
    email: Email,
    phone: Option<PhoneNumber>,
    active: bool,
    email_verified: bool,
    phone_verified: bool,
    last_login: Option<SystemTime>,
    created: SystemTime,
    updated: Option<SystemTime>,
    deleted: bool,
}

impl User {
    pub fn new(
        first_name: String,
        last_name: String,
        email: Email,
        phone: Option<PhoneNumber>,
    ) -> Self {
        Self {
            id: ID::default(),
            first_name,
            last_name,
            email,
            phone,
            active: true,
            email_verified: false,
            phone_verified: false,
            last_login: None,
            created: SystemTime::now(),
            updated: None,
            deleted: false,
        }
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }
    pub fn last_name(&self) -> &str {
        &self.last_name
    }
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
    pub fn email(&self) -> &Email {
        &self.email
    }
    pub fn phone(&self) -> Option<&PhoneNumber> {
        self.phone.as_ref()
    }
    pub fn active(&self) -> bool {
        self.active
    }
    pub fn email_verified(&self) -> bool {
        self.email_verified
    }
    pub fn phone_verified(&self) -> bool {
        self.phone_verified
    }
    pub fn last_login(&self) -> Option<SystemTime> {
        self.last_login
    }
    pub fn created(&self) -> SystemTime {
        self.created
    }
    pub fn updated(&self) -> Option<SystemTime> {
        self.updated
    }
    pub fn deleted(&self) -> bool {
        self.deleted
    }

    pub fn rename(&mut self, first_name: String, last_name: String) {
        self.first_name = first_name;
        self.last_name = last_name;
        self.touched();
    }
    /// Changing the address resets its verification.
    pub fn update_email(&mut self, email: Email) {
        self.email = email;
        self.email_verified = false;
        self.touched();
    }
    pub fn update_phone(&mut self, phone: Option<PhoneNumber>) {
        self.phone = phone;
        self.phone_verified = false;
        self.touched();
    }
    pub fn verify_email(&mut self) {
        self.email_verified = true;
        self.touched();
    }
    pub fn verify_phone(&mut self) {
        self.phone_verified = true;
        self.touched();
    }
    pub fn activate(&mut self) {
        self.active = true;
        self.touched();
    }
    pub fn deactivate(&mut self) {
        self.active = false;
        self.touched();
    }
    pub fn record_login(&mut self) {
        self.last_login = Some(SystemTime::now());
        self.touched();
    }
    pub fn erase(&mut self) {
        self.deleted = true;
        self.touched();
    }

    fn touched(&mut self) {
        self.updated = Some(SystemTime::now());
    }

    #[cfg(feature = "database")]
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn hydrate(
        id: ID<Self>,
        first_name: String,
        last_name: String,
        email: Email,
        phone: Option<PhoneNumber>,
        active: bool,
        email_verified: bool,
        phone_verified: bool,
        last_login: Option<SystemTime>,
        created: SystemTime,
        updated: Option<SystemTime>,
        deleted: bool,
    ) -> Self {
        Self {
            id,
            first_name,
            last_name,
            email,
            phone,
            active,
            email_verified,
            phone_verified,
            last_login,
            created,
            updated,
            deleted,
        }
    }
}

impl Unique for User {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

#[cfg(feature = "database")]
mod schema {
    use super::*;
    use warden_pg::*;

    impl Schema for User {
        fn name() -> &'static str {
            USERS
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                USERS,
                " (
                    id              UUID PRIMARY KEY,
                    first_name      VARCHAR(100) NOT NULL,
                    last_name       VARCHAR(100) NOT NULL,
                    email           VARCHAR(255) UNIQUE NOT NULL,
                    phone           VARCHAR(20) UNIQUE,
                    hashword        TEXT NOT NULL,
                    active          BOOLEAN NOT NULL DEFAULT TRUE,
                    email_verified  BOOLEAN NOT NULL DEFAULT FALSE,
                    phone_verified  BOOLEAN NOT NULL DEFAULT FALSE,
                    last_login      TIMESTAMPTZ,
                    created         TIMESTAMPTZ NOT NULL,
                    updated         TIMESTAMPTZ,
                    deleted         BOOLEAN NOT NULL DEFAULT FALSE
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_users_email ON ",
                USERS,
                " (email);
                 CREATE INDEX IF NOT EXISTS idx_users_phone ON ",
                USERS,
                " (phone) WHERE phone IS NOT NULL;"
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        User::new(
            "Ada".to_string(),
            "Lovelace".to_string(),
            Email::parse("ada@example.com").unwrap(),
            None,
        )
    }

    #[test]
    fn starts_active_and_unverified() {
        let user = sample();
        assert!(user.active());
        assert!(!user.email_verified());
        assert!(!user.phone_verified());
        assert!(user.last_login().is_none());
    }

    #[test]
    fn full_name_joins_and_trims() {
        let user = sample();
        assert_eq!(user.full_name(), "Ada Lovelace");
        let mononym = User::new(
            "Plato".to_string(),
            String::new(),
            Email::parse("plato@example.com").unwrap(),
            None,
        );
        assert_eq!(mononym.full_name(), "Plato");
    }

    #[test]
    fn email_change_resets_verification() {
        let mut user = sample();
        user.verify_email();
        assert!(user.email_verified());
        user.update_email(Email::parse("new@example.com").unwrap());
        assert!(!user.email_verified());
        assert!(user.updated().is_some());
    }
}
