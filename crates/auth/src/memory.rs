use super::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use warden_core::ID;
use warden_core::Unique;

/// In-memory authoritative store.
///
/// DashMap-backed and cheap to clone (clones share state), so it can be
/// handed to every orchestration component the way a pooled client would
/// be. Conditional session revocation runs under the map's shard lock,
/// which is what makes refresh rotation single-use here.
#[derive(Clone, Default)]
pub struct Ledger {
    inner: Arc<Shelves>,
}

#[derive(Default)]
struct Shelves {
    users: DashMap<uuid::Uuid, User>,
    hashwords: DashMap<uuid::Uuid, String>,
    roles: DashMap<uuid::Uuid, Role>,
    permissions: DashMap<uuid::Uuid, Permission>,
    user_roles: DashMap<(uuid::Uuid, uuid::Uuid), UserRole>,
    role_permissions: DashMap<(uuid::Uuid, uuid::Uuid), RolePermission>,
    sessions: DashMap<uuid::Uuid, Session>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for Ledger {
    async fn user(&self, id: ID<User>) -> Result<Option<User>, AuthError> {
        Ok(self
            .inner
            .users
            .get(&id.inner())
            .filter(|u| !u.deleted())
            .map(|u| u.clone()))
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, AuthError> {
        Ok(self
            .inner
            .users
            .iter()
            .find(|u| !u.deleted() && u.email() == email)
            .map(|u| u.clone()))
    }

    async fn user_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, AuthError> {
        Ok(self
            .inner
            .users
            .iter()
            .find(|u| !u.deleted() && u.phone() == Some(phone))
            .map(|u| u.clone()))
    }

    async fn lookup(&self, identifier: &str) -> Result<Option<(User, String)>, AuthError> {
        let user = match Email::parse(identifier) {
            Ok(email) => self.user_by_email(&email).await?,
            Err(_) => None,
        };
        let user = match user {
            Some(user) => Some(user),
            None => match PhoneNumber::parse(identifier) {
                Ok(phone) => self.user_by_phone(&phone).await?,
                Err(_) => None,
            },
        };
        Ok(user.and_then(|user| {
            self.inner
                .hashwords
                .get(&user.id().inner())
                .map(|h| (user, h.clone()))
        }))
    }

    async fn exists_email(&self, email: &Email) -> Result<bool, AuthError> {
        Ok(self.user_by_email(email).await?.is_some())
    }

    async fn exists_phone(&self, phone: &PhoneNumber) -> Result<bool, AuthError> {
        Ok(self.user_by_phone(phone).await?.is_some())
    }

    async fn create_user(&self, user: &User, hashword: &str) -> Result<(), AuthError> {
        if self.exists_email(user.email()).await? {
            return Err(AuthError::Conflict("Email already exists".to_string()));
        }
        if let Some(phone) = user.phone() {
            if self.exists_phone(phone).await? {
                return Err(AuthError::Conflict(
                    "Phone number already exists".to_string(),
                ));
            }
        }
        self.inner.users.insert(user.id().inner(), user.clone());
        self.inner
            .hashwords
            .insert(user.id().inner(), hashword.to_string());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), AuthError> {
        self.inner.users.insert(user.id().inner(), user.clone());
        Ok(())
    }

    async fn rehash_user(&self, id: ID<User>, hashword: &str) -> Result<(), AuthError> {
        self.inner
            .hashwords
            .insert(id.inner(), hashword.to_string());
        Ok(())
    }

    async fn delete_user(&self, id: ID<User>) -> Result<bool, AuthError> {
        let found = match self.inner.users.get_mut(&id.inner()) {
            Some(mut user) if !user.deleted() => {
                user.erase();
                true
            }
            _ => return Ok(false),
        };
        for mut link in self.inner.user_roles.iter_mut() {
            if link.user() == id && !link.deleted() {
                link.erase();
            }
        }
        for mut session in self.inner.sessions.iter_mut() {
            if session.user() == id && !session.revoked() {
                session.revoke("user deleted");
            }
        }
        Ok(found)
    }

    async fn count_users(&self) -> Result<usize, AuthError> {
        Ok(self.inner.users.iter().filter(|u| !u.deleted()).count())
    }

    async fn page_users(
        &self,
        filter: &UserFilter,
        sort: UserSort,
        direction: Direction,
        page: usize,
        page_size: usize,
    ) -> Result<Page<User>, AuthError> {
        let search = filter.search.as_ref().map(|s| s.to_lowercase());
        let holders: Option<Vec<ID<User>>> = match filter.role.as_deref() {
            Some(name) => {
                let role = self
                    .inner
                    .roles
                    .iter()
                    .find(|r| !r.deleted() && r.name() == name)
                    .map(|r| r.id());
                Some(match role {
                    Some(role) => self
                        .inner
                        .user_roles
                        .iter()
                        .filter(|l| !l.deleted() && l.role() == role)
                        .map(|l| l.user())
                        .collect(),
                    None => Vec::new(),
                })
            }
            None => None,
        };
        let mut matched: Vec<User> = self
            .inner
            .users
            .iter()
            .filter(|u| !u.deleted())
            .filter(|u| match &search {
                Some(term) => {
                    u.first_name().to_lowercase().contains(term)
                        || u.last_name().to_lowercase().contains(term)
                        || u.email().as_str().contains(term)
                }
                None => true,
            })
            .filter(|u| match &holders {
                Some(ids) => ids.contains(&u.id()),
                None => true,
            })
            .filter(|u| match filter.active {
                Some(active) => u.active() == active,
                None => true,
            })
            .map(|u| u.clone())
            .collect();
        matched.sort_by(|a, b| {
            let ordering = match sort {
                UserSort::FirstName => a.first_name().cmp(b.first_name()),
                UserSort::LastName => a.last_name().cmp(b.last_name()),
                UserSort::Email => a.email().as_str().cmp(b.email().as_str()),
                UserSort::LastLogin => a.last_login().cmp(&b.last_login()),
                UserSort::Created => a.created().cmp(&b.created()),
            };
            match direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        });
        let total = matched.len();
        let page = page.max(1);
        let items = matched
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();
        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }
}

impl RoleStore for Ledger {
    async fn role(&self, id: ID<Role>) -> Result<Option<Role>, AuthError> {
        Ok(self
            .inner
            .roles
            .get(&id.inner())
            .filter(|r| !r.deleted())
            .map(|r| r.clone()))
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, AuthError> {
        Ok(self
            .inner
            .roles
            .iter()
            .find(|r| !r.deleted() && r.name() == name)
            .map(|r| r.clone()))
    }

    async fn roles_by_ids(&self, ids: &[ID<Role>]) -> Result<Vec<Role>, AuthError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.inner.roles.get(&id.inner()))
            .filter(|r| !r.deleted())
            .map(|r| r.clone())
            .collect())
    }

    async fn roles_of(&self, user: ID<User>) -> Result<Vec<Role>, AuthError> {
        Ok(self
            .inner
            .user_roles
            .iter()
            .filter(|l| !l.deleted() && l.user() == user)
            .filter_map(|l| self.inner.roles.get(&l.role().inner()))
            .filter(|r| !r.deleted())
            .map(|r| r.clone())
            .collect())
    }

    async fn create_role(&self, role: &Role) -> Result<(), AuthError> {
        if self.role_by_name(role.name()).await?.is_some() {
            return Err(AuthError::Conflict("Role name already exists".to_string()));
        }
        self.inner.roles.insert(role.id().inner(), role.clone());
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> Result<(), AuthError> {
        self.inner.roles.insert(role.id().inner(), role.clone());
        Ok(())
    }

    async fn assign_role(
        &self,
        user: ID<User>,
        role: ID<Role>,
        assigned_by: Option<&str>,
    ) -> Result<bool, AuthError> {
        match self
            .inner
            .user_roles
            .entry((user.inner(), role.inner()))
        {
            Entry::Occupied(mut held) => match held.get().deleted() {
                true => {
                    held.get_mut().restore(assigned_by.map(String::from));
                    Ok(true)
                }
                false => Ok(false),
            },
            Entry::Vacant(slot) => {
                slot.insert(UserRole::new(user, role, assigned_by.map(String::from)));
                Ok(true)
            }
        }
    }

    async fn remove_role(&self, user: ID<User>, role: ID<Role>) -> Result<bool, AuthError> {
        match self.inner.user_roles.get_mut(&(user.inner(), role.inner())) {
            Some(mut link) if !link.deleted() => {
                link.erase();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn page_roles(
        &self,
        search: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Role>, AuthError> {
        let term = search.map(|s| s.to_lowercase());
        let mut matched: Vec<Role> = self
            .inner
            .roles
            .iter()
            .filter(|r| !r.deleted())
            .filter(|r| match &term {
                Some(term) => {
                    r.name().to_lowercase().contains(term)
                        || r.description().to_lowercase().contains(term)
                }
                None => true,
            })
            .map(|r| r.clone())
            .collect();
        matched.sort_by(|a, b| a.name().cmp(b.name()));
        let total = matched.len();
        let page = page.max(1);
        let items = matched
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();
        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }
}

impl PermissionStore for Ledger {
    async fn permission(&self, id: ID<Permission>) -> Result<Option<Permission>, AuthError> {
        Ok(self
            .inner
            .permissions
            .get(&id.inner())
            .filter(|p| !p.deleted())
            .map(|p| p.clone()))
    }

    async fn permission_by_name(&self, name: &str) -> Result<Option<Permission>, AuthError> {
        Ok(self
            .inner
            .permissions
            .iter()
            .find(|p| !p.deleted() && p.name() == name)
            .map(|p| p.clone()))
    }

    async fn permissions_by_ids(
        &self,
        ids: &[ID<Permission>],
    ) -> Result<Vec<Permission>, AuthError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.inner.permissions.get(&id.inner()))
            .filter(|p| !p.deleted())
            .map(|p| p.clone())
            .collect())
    }

    async fn permissions_of_role(&self, role: ID<Role>) -> Result<Vec<Permission>, AuthError> {
        Ok(self
            .inner
            .role_permissions
            .iter()
            .filter(|g| !g.deleted() && g.role() == role)
            .filter_map(|g| self.inner.permissions.get(&g.permission().inner()))
            .filter(|p| !p.deleted())
            .map(|p| p.clone())
            .collect())
    }

    async fn permissions_of(&self, user: ID<User>) -> Result<Vec<Permission>, AuthError> {
        let mut permissions = Vec::new();
        for role in self.roles_of(user).await? {
            if !role.active() {
                continue;
            }
            permissions.extend(self.permissions_of_role(role.id()).await?);
        }
        Ok(permissions)
    }

    async fn create_permission(&self, permission: &Permission) -> Result<(), AuthError> {
        if self.permission_by_name(permission.name()).await?.is_some() {
            return Err(AuthError::Conflict(
                "Permission name already exists".to_string(),
            ));
        }
        self.inner
            .permissions
            .insert(permission.id().inner(), permission.clone());
        Ok(())
    }

    async fn update_permission(&self, permission: &Permission) -> Result<(), AuthError> {
        self.inner
            .permissions
            .insert(permission.id().inner(), permission.clone());
        Ok(())
    }

    async fn grant_permission(
        &self,
        role: ID<Role>,
        permission: ID<Permission>,
        assigned_by: Option<&str>,
    ) -> Result<bool, AuthError> {
        match self
            .inner
            .role_permissions
            .entry((role.inner(), permission.inner()))
        {
            Entry::Occupied(mut held) => match held.get().deleted() {
                true => {
                    held.get_mut().restore(assigned_by.map(String::from));
                    Ok(true)
                }
                false => Ok(false),
            },
            Entry::Vacant(slot) => {
                slot.insert(RolePermission::new(
                    role,
                    permission,
                    assigned_by.map(String::from),
                ));
                Ok(true)
            }
        }
    }

    async fn revoke_permission(
        &self,
        role: ID<Role>,
        permission: ID<Permission>,
    ) -> Result<bool, AuthError> {
        match self
            .inner
            .role_permissions
            .get_mut(&(role.inner(), permission.inner()))
        {
            Some(mut grant) if !grant.deleted() => {
                grant.erase();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn page_permissions(
        &self,
        search: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Permission>, AuthError> {
        let term = search.map(|s| s.to_lowercase());
        let mut matched: Vec<Permission> = self
            .inner
            .permissions
            .iter()
            .filter(|p| !p.deleted())
            .filter(|p| match &term {
                Some(term) => {
                    p.name().to_lowercase().contains(term)
                        || p.description().to_lowercase().contains(term)
                        || p.resource().to_lowercase().contains(term)
                }
                None => true,
            })
            .map(|p| p.clone())
            .collect();
        matched.sort_by(|a, b| a.name().cmp(b.name()));
        let total = matched.len();
        let page = page.max(1);
        let items = matched
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();
        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }
}

impl SessionStore for Ledger {
    async fn session(&self, id: ID<Session>) -> Result<Option<Session>, AuthError> {
        Ok(self.inner.sessions.get(&id.inner()).map(|s| s.clone()))
    }

    async fn session_by_hash(&self, hash: &[u8]) -> Result<Option<Session>, AuthError> {
        Ok(self
            .inner
            .sessions
            .iter()
            .find(|s| s.hash() == hash)
            .map(|s| s.clone()))
    }

    async fn sessions_of(&self, user: ID<User>) -> Result<Vec<Session>, AuthError> {
        Ok(self
            .inner
            .sessions
            .iter()
            .filter(|s| s.user() == user)
            .map(|s| s.clone())
            .collect())
    }

    async fn active_sessions_of(&self, user: ID<User>) -> Result<Vec<Session>, AuthError> {
        Ok(self
            .inner
            .sessions
            .iter()
            .filter(|s| s.user() == user && s.valid())
            .map(|s| s.clone())
            .collect())
    }

    async fn open_session(&self, session: &Session) -> Result<(), AuthError> {
        self.inner
            .sessions
            .insert(session.id().inner(), session.clone());
        Ok(())
    }

    async fn touch_session(&self, id: ID<Session>) -> Result<(), AuthError> {
        if let Some(mut session) = self.inner.sessions.get_mut(&id.inner()) {
            session.touch();
        }
        Ok(())
    }

    async fn revoke_session(&self, id: ID<Session>, reason: &str) -> Result<bool, AuthError> {
        // get_mut holds the shard lock, so the revoked check and the write
        // are one atomic step: at most one caller wins.
        match self.inner.sessions.get_mut(&id.inner()) {
            Some(mut session) if !session.revoked() => {
                session.revoke(reason);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_sessions(&self, user: ID<User>, reason: &str) -> Result<u64, AuthError> {
        let mut revoked = 0;
        for mut session in self.inner.sessions.iter_mut() {
            if session.user() == user && !session.revoked() {
                session.revoke(reason);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn sweep_sessions(&self) -> Result<u64, AuthError> {
        let before = self.inner.sessions.len();
        self.inner.sessions.retain(|_, s| !s.expired());
        Ok((before - self.inner.sessions.len()) as u64)
    }
}

impl UnitOfWork for Ledger {
    // The ledger is immediately consistent and single-authority, so the
    // transaction boundary is accepted without staging.
    async fn begin(&self) -> Result<(), AuthError> {
        Ok(())
    }
    async fn commit(&self) -> Result<(), AuthError> {
        Ok(())
    }
    async fn rollback(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, email: &str) -> User {
        User::new(
            first.to_string(),
            "Tester".to_string(),
            Email::parse(email).unwrap(),
            None,
        )
    }

    #[tokio::test]
    async fn enforces_email_uniqueness() {
        let ledger = Ledger::new();
        ledger.create_user(&user("A", "a@b.co"), "hash").await.unwrap();
        let duplicate = ledger.create_user(&user("B", "A@B.CO"), "hash").await;
        assert!(matches!(duplicate, Err(AuthError::Conflict(_))));
        assert_eq!(ledger.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lookup_tries_email_then_phone() {
        let ledger = Ledger::new();
        let by_mail = user("A", "a@b.co");
        let mut by_phone = user("B", "b@b.co");
        by_phone.update_phone(Some(PhoneNumber::parse("+84901234567").unwrap()));
        ledger.create_user(&by_mail, "hash-a").await.unwrap();
        ledger.create_user(&by_phone, "hash-b").await.unwrap();
        let (found, hash) = ledger.lookup("a@b.co").await.unwrap().unwrap();
        assert_eq!(found.id(), by_mail.id());
        assert_eq!(hash, "hash-a");
        let (found, hash) = ledger.lookup("+84901234567").await.unwrap().unwrap();
        assert_eq!(found.id(), by_phone.id());
        assert_eq!(hash, "hash-b");
        assert!(ledger.lookup("missing@b.co").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pages_with_filter_and_sort() {
        let ledger = Ledger::new();
        for (first, email) in [
            ("Carol", "carol@example.com"),
            ("Alice", "alice@example.com"),
            ("Bob", "bob@example.com"),
        ] {
            ledger.create_user(&user(first, email), "hash").await.unwrap();
        }
        let page = ledger
            .page_users(
                &UserFilter::default(),
                UserSort::FirstName,
                Direction::Asc,
                1,
                2,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages(), 2);
        let names: Vec<&str> = page.items.iter().map(|u| u.first_name()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        let page = ledger
            .page_users(
                &UserFilter {
                    search: Some("ALICE".to_string()),
                    ..UserFilter::default()
                },
                UserSort::default(),
                Direction::default(),
                1,
                10,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].first_name(), "Alice");
    }

    #[tokio::test]
    async fn filters_by_role_name() {
        let ledger = Ledger::new();
        let admin = user("Admin", "admin@example.com");
        let plain = user("Plain", "plain@example.com");
        ledger.create_user(&admin, "hash").await.unwrap();
        ledger.create_user(&plain, "hash").await.unwrap();
        let role = Role::new("Admin".to_string(), "administrator".to_string());
        ledger.create_role(&role).await.unwrap();
        ledger.assign_role(admin.id(), role.id(), None).await.unwrap();
        let page = ledger
            .page_users(
                &UserFilter {
                    role: Some("Admin".to_string()),
                    ..UserFilter::default()
                },
                UserSort::default(),
                Direction::default(),
                1,
                10,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id(), admin.id());
    }

    #[tokio::test]
    async fn batch_fetch_skips_unknown_ids() {
        let ledger = Ledger::new();
        let a = Role::new("A".to_string(), "first".to_string());
        let b = Role::new("B".to_string(), "second".to_string());
        ledger.create_role(&a).await.unwrap();
        ledger.create_role(&b).await.unwrap();
        let fetched = ledger
            .roles_by_ids(&[a.id(), b.id(), ID::default()])
            .await
            .unwrap();
        assert_eq!(fetched.len(), 2);
        assert!(ledger.permissions_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conditional_revoke_awards_one_winner() {
        let ledger = Ledger::new();
        let session = Session::new(
            ID::default(),
            vec![1u8; 32],
            &Context::default(),
            std::time::Duration::from_secs(60),
        );
        ledger.open_session(&session).await.unwrap();
        assert!(ledger.revoke_session(session.id(), "token refresh").await.unwrap());
        assert!(!ledger.revoke_session(session.id(), "token refresh").await.unwrap());
    }

    #[tokio::test]
    async fn touch_updates_last_access() {
        let ledger = Ledger::new();
        let session = Session::new(
            ID::default(),
            vec![4u8; 32],
            &Context::default(),
            std::time::Duration::from_secs(60),
        );
        ledger.open_session(&session).await.unwrap();
        let before = session.accessed_at();
        std::thread::sleep(std::time::Duration::from_millis(5));
        ledger.touch_session(session.id()).await.unwrap();
        let touched = ledger.session(session.id()).await.unwrap().unwrap();
        assert!(touched.accessed_at() > before);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let ledger = Ledger::new();
        let live = Session::new(
            ID::default(),
            vec![1u8; 32],
            &Context::default(),
            std::time::Duration::from_secs(60),
        );
        let dead = Session::new(
            ID::default(),
            vec![2u8; 32],
            &Context::default(),
            std::time::Duration::ZERO,
        );
        ledger.open_session(&live).await.unwrap();
        ledger.open_session(&dead).await.unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(ledger.sweep_sessions().await.unwrap(), 1);
        assert!(ledger.session(live.id()).await.unwrap().is_some());
        assert!(ledger.session(dead.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_user_revokes_sessions_and_links() {
        let ledger = Ledger::new();
        let victim = user("Gone", "gone@example.com");
        ledger.create_user(&victim, "hash").await.unwrap();
        let role = Role::new("Member".to_string(), "member".to_string());
        ledger.create_role(&role).await.unwrap();
        ledger.assign_role(victim.id(), role.id(), None).await.unwrap();
        let session = Session::new(
            victim.id(),
            vec![3u8; 32],
            &Context::default(),
            std::time::Duration::from_secs(60),
        );
        ledger.open_session(&session).await.unwrap();
        assert!(ledger.delete_user(victim.id()).await.unwrap());
        assert!(ledger.user(victim.id()).await.unwrap().is_none());
        assert!(ledger.roles_of(victim.id()).await.unwrap().is_empty());
        assert!(!ledger.session(session.id()).await.unwrap().unwrap().valid());
        assert!(!ledger.delete_user(victim.id()).await.unwrap());
    }
}
