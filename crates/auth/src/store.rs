use super::*;
use warden_core::ID;

/// One page of a listing, with the total row count alongside.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.page_size.max(1))
    }
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Filter over the user listing.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Case-insensitive substring over first name, last name, and email.
    pub search: Option<String>,
    /// Restrict to holders of this role name.
    pub role: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UserSort {
    FirstName,
    LastName,
    Email,
    LastLogin,
    #[default]
    Created,
}

impl UserSort {
    /// Lenient parse of the caller-facing sort field; unknown falls back to
    /// creation order.
    pub fn parse(field: Option<&str>) -> Self {
        match field.map(|f| f.to_lowercase()).as_deref() {
            Some("firstname" | "first_name") => Self::FirstName,
            Some("lastname" | "last_name") => Self::LastName,
            Some("email") => Self::Email,
            Some("lastlogin" | "last_login" | "lastloginat") => Self::LastLogin,
            _ => Self::Created,
        }
    }
    #[cfg(feature = "database")]
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Email => "email",
            Self::LastLogin => "last_login",
            Self::Created => "created",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl Direction {
    pub fn parse(direction: Option<&str>) -> Self {
        match direction.map(|d| d.to_lowercase()).as_deref() {
            Some("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }
    #[cfg(feature = "database")]
    pub(crate) fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Repository trait for user records. Abstracts SQL from domain modules.
#[allow(async_fn_in_trait)]
pub trait UserStore {
    async fn user(&self, id: ID<User>) -> Result<Option<User>, AuthError>;
    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, AuthError>;
    async fn user_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, AuthError>;
    /// Single-field identifier resolution: tried as an email first, then as
    /// a phone number. Returns the user with its stored password hash.
    async fn lookup(&self, identifier: &str) -> Result<Option<(User, String)>, AuthError>;
    async fn exists_email(&self, email: &Email) -> Result<bool, AuthError>;
    async fn exists_phone(&self, phone: &PhoneNumber) -> Result<bool, AuthError>;
    async fn create_user(&self, user: &User, hashword: &str) -> Result<(), AuthError>;
    async fn update_user(&self, user: &User) -> Result<(), AuthError>;
    async fn rehash_user(&self, id: ID<User>, hashword: &str) -> Result<(), AuthError>;
    /// Soft delete; cascades to role links and sessions. False if absent.
    async fn delete_user(&self, id: ID<User>) -> Result<bool, AuthError>;
    async fn count_users(&self) -> Result<usize, AuthError>;
    async fn page_users(
        &self,
        filter: &UserFilter,
        sort: UserSort,
        direction: Direction,
        page: usize,
        page_size: usize,
    ) -> Result<Page<User>, AuthError>;
}

/// Repository trait for roles and user-role assignment.
#[allow(async_fn_in_trait)]
pub trait RoleStore {
    async fn role(&self, id: ID<Role>) -> Result<Option<Role>, AuthError>;
    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, AuthError>;
    async fn roles_by_ids(&self, ids: &[ID<Role>]) -> Result<Vec<Role>, AuthError>;
    /// Roles reachable through non-deleted links, deleted roles excluded.
    async fn roles_of(&self, user: ID<User>) -> Result<Vec<Role>, AuthError>;
    async fn create_role(&self, role: &Role) -> Result<(), AuthError>;
    async fn update_role(&self, role: &Role) -> Result<(), AuthError>;
    /// Idempotent: true iff the link was newly created or resurrected.
    async fn assign_role(
        &self,
        user: ID<User>,
        role: ID<Role>,
        assigned_by: Option<&str>,
    ) -> Result<bool, AuthError>;
    /// Idempotent: true iff a live link was soft-deleted.
    async fn remove_role(&self, user: ID<User>, role: ID<Role>) -> Result<bool, AuthError>;
    /// Name-ordered listing; search matches name or description.
    async fn page_roles(
        &self,
        search: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Role>, AuthError>;
}

/// Repository trait for permissions and role-permission grants.
#[allow(async_fn_in_trait)]
pub trait PermissionStore {
    async fn permission(&self, id: ID<Permission>) -> Result<Option<Permission>, AuthError>;
    async fn permission_by_name(&self, name: &str) -> Result<Option<Permission>, AuthError>;
    async fn permissions_by_ids(
        &self,
        ids: &[ID<Permission>],
    ) -> Result<Vec<Permission>, AuthError>;
    async fn permissions_of_role(&self, role: ID<Role>) -> Result<Vec<Permission>, AuthError>;
    /// Role-membership expansion: permissions reachable through any active,
    /// non-deleted role of the user. May contain duplicates; callers that
    /// need a set de-duplicate.
    async fn permissions_of(&self, user: ID<User>) -> Result<Vec<Permission>, AuthError>;
    async fn create_permission(&self, permission: &Permission) -> Result<(), AuthError>;
    async fn update_permission(&self, permission: &Permission) -> Result<(), AuthError>;
    /// Idempotent: true iff the grant was newly created or resurrected.
    async fn grant_permission(
        &self,
        role: ID<Role>,
        permission: ID<Permission>,
        assigned_by: Option<&str>,
    ) -> Result<bool, AuthError>;
    /// Idempotent: true iff a live grant was soft-deleted.
    async fn revoke_permission(
        &self,
        role: ID<Role>,
        permission: ID<Permission>,
    ) -> Result<bool, AuthError>;
    /// Name-ordered listing; search matches name, description, or resource.
    async fn page_permissions(
        &self,
        search: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Permission>, AuthError>;
}

/// Repository trait for refresh-token sessions.
#[allow(async_fn_in_trait)]
pub trait SessionStore {
    async fn session(&self, id: ID<Session>) -> Result<Option<Session>, AuthError>;
    async fn session_by_hash(&self, hash: &[u8]) -> Result<Option<Session>, AuthError>;
    async fn sessions_of(&self, user: ID<User>) -> Result<Vec<Session>, AuthError>;
    async fn active_sessions_of(&self, user: ID<User>) -> Result<Vec<Session>, AuthError>;
    async fn open_session(&self, session: &Session) -> Result<(), AuthError>;
    async fn touch_session(&self, id: ID<Session>) -> Result<(), AuthError>;
    /// Conditional write: flips `revoked` only if currently false. Returns
    /// whether this call won; a concurrent loser observes false. This is
    /// the compare-and-swap that makes refresh rotation single-use.
    async fn revoke_session(&self, id: ID<Session>, reason: &str) -> Result<bool, AuthError>;
    /// Revokes every non-revoked session of the user; returns how many.
    async fn revoke_sessions(&self, user: ID<User>, reason: &str) -> Result<u64, AuthError>;
    /// Physically deletes expired rows; returns how many.
    async fn sweep_sessions(&self) -> Result<u64, AuthError>;
}

/// Unit-of-work boundary for multi-entity writes. Scoped to one logical
/// operation; must not span calls to unrelated systems.
#[allow(async_fn_in_trait)]
pub trait UnitOfWork {
    async fn begin(&self) -> Result<(), AuthError>;
    async fn commit(&self) -> Result<(), AuthError>;
    async fn rollback(&self) -> Result<(), AuthError>;
}

/// Everything the orchestration layer needs from a backing store.
pub trait Store:
    UserStore + RoleStore + PermissionStore + SessionStore + UnitOfWork + Clone
{
}
impl<S> Store for S where
    S: UserStore + RoleStore + PermissionStore + SessionStore + UnitOfWork + Clone
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let page = Page::<u8> {
            items: vec![],
            total: 21,
            page: 1,
            page_size: 10,
        };
        assert_eq!(page.total_pages(), 3);
    }

    #[test]
    fn sort_parse_is_lenient() {
        assert_eq!(UserSort::parse(Some("firstName")), UserSort::FirstName);
        assert_eq!(UserSort::parse(Some("last_name")), UserSort::LastName);
        assert_eq!(UserSort::parse(Some("createdAt")), UserSort::Created);
        assert_eq!(UserSort::parse(None), UserSort::Created);
        assert_eq!(Direction::parse(Some("ASC")), Direction::Asc);
        assert_eq!(Direction::parse(Some("nonsense")), Direction::Desc);
    }
}
