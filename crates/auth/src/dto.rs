use super::*;
use serde::Deserialize;
use serde::Serialize;
use warden_core::Unique;

#[derive(Debug, Deserialize)]
pub struct Login {
    /// Email or phone number; tried as email first.
    pub identifier: String,
    pub password: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Register {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct Refresh {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct Logout {
    pub refresh_token: String,
}

/// Paged user listing query, as received from the presentation layer.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_direction: Option<String>,
}

/// Paged role or permission listing query.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub search: Option<String>,
}

/// A freshly minted token pair. `expires_at` is unix seconds for the access
/// token; the refresh token lives until its session expires or rotates.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResult {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDto {
    pub id: uuid::Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub active: bool,
    pub email_verified: bool,
    pub phone_verified: bool,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id().inner(),
            first_name: user.first_name().to_string(),
            last_name: user.last_name().to_string(),
            email: user.email().to_string(),
            phone: user.phone().map(|p| p.to_string()),
            active: user.active(),
            email_verified: user.email_verified(),
            phone_verified: user.phone_verified(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoleDto {
    pub id: uuid::Uuid,
    pub name: String,
    pub description: String,
    pub active: bool,
}

impl From<&Role> for RoleDto {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id().inner(),
            name: role.name().to_string(),
            description: role.description().to_string(),
            active: role.active(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionDto {
    pub id: uuid::Uuid,
    pub name: String,
    pub description: String,
    pub resource: String,
    pub action: String,
    pub active: bool,
}

impl From<&Permission> for PermissionDto {
    fn from(permission: &Permission) -> Self {
        Self {
            id: permission.id().inner(),
            name: permission.name().to_string(),
            description: permission.description().to_string(),
            resource: permission.resource().to_string(),
            action: permission.action().to_string(),
            active: permission.active(),
        }
    }
}

/// Outcome of login and registration. Failures carry a caller-facing
/// message and nothing else.
#[derive(Debug, Serialize)]
pub struct AuthenticationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuthenticationResult {
    pub fn ok(tokens: TokenResult, user: UserDto) -> Self {
        Self {
            success: true,
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            expires_at: Some(tokens.expires_at),
            user: Some(user),
            error: None,
        }
    }
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            access_token: None,
            refresh_token: None,
            expires_at: None,
            user: None,
            error: Some(message.into()),
        }
    }
}
