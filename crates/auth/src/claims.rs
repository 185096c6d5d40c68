use super::*;
use std::time::Duration;
use warden_core::ID;
use warden_core::Unique;

/// Access-token payload: standard registered claims plus one `role` entry
/// per role name, one `permission` entry per permission name, and one
/// `permission_action` entry per `resource:action` pair.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub iss: String,
    pub aud: String,
    pub sub: uuid::Uuid,
    pub sid: uuid::Uuid,
    pub email: String,
    pub name: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default)]
    pub role: Vec<String>,
    #[serde(default)]
    pub permission: Vec<String>,
    #[serde(default)]
    pub permission_action: Vec<String>,
}

impl Claims {
    pub fn new(
        user: &User,
        session: ID<Session>,
        roles: &[Role],
        permissions: &[Permission],
        issuer: &str,
        audience: &str,
        ttl: Duration,
    ) -> Self {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time")
            .as_secs() as i64;
        Self {
            iss: issuer.to_string(),
            aud: audience.to_string(),
            sub: user.id().inner(),
            sid: session.inner(),
            email: user.email().to_string(),
            name: user.full_name(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
            role: roles.iter().map(|r| r.name().to_string()).collect(),
            permission: permissions.iter().map(|p| p.name().to_string()).collect(),
            permission_action: permissions
                .iter()
                .map(|p| format!("{}:{}", p.resource(), p.action()))
                .collect(),
        }
    }
    pub fn expired(&self) -> bool {
        self.exp
            < std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time")
                .as_secs() as i64
    }
    pub fn user(&self) -> ID<User> {
        ID::from(self.sub)
    }
    pub fn session(&self) -> ID<Session> {
        ID::from(self.sid)
    }
}
