use super::*;
use std::time::Duration;
use std::time::SystemTime;
use warden_core::ID;
use warden_core::Unique;

/// Client context captured when a session is opened.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub device: Option<String>,
    pub ip: Option<String>,
    pub agent: Option<String>,
}

/// One refresh-token lineage: persisted session with expiry and revocation.
///
/// The refresh token itself is opaque and never stored; only its sha256
/// lives here. Valid iff not revoked and not past expiry. Rows are never
/// physically deleted except by the expiry sweep.
#[derive(Debug, Clone)]
pub struct Session {
    id: ID<Self>,
    user: ID<User>,
    hash: Vec<u8>,
    device: String,
    ip: String,
    agent: String,
    expires: SystemTime,
    revoked: bool,
    revoked_at: Option<SystemTime>,
    revoked_by: Option<String>,
    accessed: SystemTime,
}

impl Session {
    pub fn new(user: ID<User>, hash: Vec<u8>, context: &Context, ttl: Duration) -> Self {
        Self {
            id: ID::default(),
            user,
            hash,
            device: context.device.clone().unwrap_or_else(|| "Unknown".to_string()),
            ip: context.ip.clone().unwrap_or_else(|| "Unknown".to_string()),
            agent: context.agent.clone().unwrap_or_else(|| "Unknown".to_string()),
            expires: SystemTime::now() + ttl,
            revoked: false,
            revoked_at: None,
            revoked_by: None,
            accessed: SystemTime::now(),
        }
    }

    pub fn user(&self) -> ID<User> {
        self.user
    }
    pub fn hash(&self) -> &[u8] {
        &self.hash
    }
    pub fn device(&self) -> &str {
        &self.device
    }
    pub fn ip(&self) -> &str {
        &self.ip
    }
    pub fn agent(&self) -> &str {
        &self.agent
    }
    pub fn expires_at(&self) -> SystemTime {
        self.expires
    }
    pub fn revoked(&self) -> bool {
        self.revoked
    }
    pub fn revoked_at(&self) -> Option<SystemTime> {
        self.revoked_at
    }
    pub fn revoked_by(&self) -> Option<&str> {
        self.revoked_by.as_deref()
    }
    pub fn accessed_at(&self) -> SystemTime {
        self.accessed
    }

    pub fn context(&self) -> Context {
        Context {
            device: Some(self.device.clone()),
            ip: Some(self.ip.clone()),
            agent: Some(self.agent.clone()),
        }
    }

    pub fn expired(&self) -> bool {
        SystemTime::now() > self.expires
    }
    pub fn valid(&self) -> bool {
        !self.revoked && !self.expired()
    }

    pub fn revoke(&mut self, reason: &str) {
        self.revoked = true;
        self.revoked_at = Some(SystemTime::now());
        self.revoked_by = Some(reason.to_string());
    }
    pub fn touch(&mut self) {
        self.accessed = SystemTime::now();
    }

    #[cfg(feature = "database")]
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn hydrate(
        id: ID<Self>,
        user: ID<User>,
        hash: Vec<u8>,
        device: String,
        ip: String,
        agent: String,
        expires: SystemTime,
        revoked: bool,
        revoked_at: Option<SystemTime>,
        revoked_by: Option<String>,
        accessed: SystemTime,
    ) -> Self {
        Self {
            id,
            user,
            hash,
            device,
            ip,
            agent,
            expires,
            revoked,
            revoked_at,
            revoked_by,
            accessed,
        }
    }
}

impl Unique for Session {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

#[cfg(feature = "database")]
mod schema {
    use super::*;
    use warden_pg::*;

    impl Schema for Session {
        fn name() -> &'static str {
            SESSIONS
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                SESSIONS,
                " (
                    id          UUID PRIMARY KEY,
                    user_id     UUID NOT NULL REFERENCES ",
                USERS,
                "(id) ON DELETE CASCADE,
                    token_hash  BYTEA UNIQUE NOT NULL,
                    device      VARCHAR(255) NOT NULL,
                    ip          VARCHAR(45) NOT NULL,
                    agent       TEXT NOT NULL,
                    expires_at  TIMESTAMPTZ NOT NULL,
                    revoked     BOOLEAN NOT NULL DEFAULT FALSE,
                    revoked_at  TIMESTAMPTZ,
                    revoked_by  VARCHAR(255),
                    accessed_at TIMESTAMPTZ NOT NULL
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_sessions_user ON ",
                SESSIONS,
                " (user_id);
                 CREATE INDEX IF NOT EXISTS idx_sessions_expires ON ",
                SESSIONS,
                " (expires_at) WHERE NOT revoked;"
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(ttl: Duration) -> Session {
        Session::new(
            ID::default(),
            vec![0u8; 32],
            &Context::default(),
            ttl,
        )
    }

    #[test]
    fn fresh_session_is_valid() {
        let session = open(Duration::from_secs(60));
        assert!(session.valid());
        assert!(!session.expired());
        assert_eq!(session.device(), "Unknown");
    }

    #[test]
    fn revocation_invalidates() {
        let mut session = open(Duration::from_secs(60));
        session.revoke("token refresh");
        assert!(!session.valid());
        assert!(session.revoked_at().is_some());
        assert_eq!(session.revoked_by(), Some("token refresh"));
    }

    #[test]
    fn expiry_invalidates() {
        let session = open(Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert!(session.expired());
        assert!(!session.valid());
    }
}
