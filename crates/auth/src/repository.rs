use super::*;
use std::sync::Arc;
use tokio_postgres::Client;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use warden_core::ID;
use warden_core::Unique;
use warden_pg::*;

/// Column lists, in hydration order.
const USER_COLS: &str =
    "id, first_name, last_name, email, phone, active, email_verified, phone_verified, \
     last_login, created, updated, deleted";
const ROLE_COLS: &str = "id, name, description, active, created, updated, deleted";
const PERMISSION_COLS: &str =
    "id, name, description, resource, action, active, created, updated, deleted";
const SESSION_COLS: &str =
    "id, user_id, token_hash, device, ip, agent, expires_at, revoked, revoked_at, \
     revoked_by, accessed_at";

/// Applies every table and index, in foreign-key order. Idempotent.
pub async fn migrate(client: &Client) -> Result<(), AuthError> {
    create::<User>(client).await?;
    create::<Role>(client).await?;
    create::<Permission>(client).await?;
    create::<UserRole>(client).await?;
    create::<RolePermission>(client).await?;
    create::<Session>(client).await?;
    log::info!("database schema is current");
    Ok(())
}

fn to_user(row: &Row) -> User {
    User::hydrate(
        ID::from(row.get::<_, uuid::Uuid>(0)),
        row.get(1),
        row.get(2),
        Email::raw(row.get(3)),
        row.get::<_, Option<String>>(4).map(PhoneNumber::raw),
        row.get(5),
        row.get(6),
        row.get(7),
        row.get(8),
        row.get(9),
        row.get(10),
        row.get(11),
    )
}

fn to_role(row: &Row) -> Role {
    Role::hydrate(
        ID::from(row.get::<_, uuid::Uuid>(0)),
        row.get(1),
        row.get(2),
        row.get(3),
        row.get(4),
        row.get(5),
        row.get(6),
    )
}

fn to_permission(row: &Row) -> Permission {
    Permission::hydrate(
        ID::from(row.get::<_, uuid::Uuid>(0)),
        row.get(1),
        row.get(2),
        row.get(3),
        row.get(4),
        row.get(5),
        row.get(6),
        row.get(7),
        row.get(8),
    )
}

fn to_session(row: &Row) -> Session {
    Session::hydrate(
        ID::from(row.get::<_, uuid::Uuid>(0)),
        ID::from(row.get::<_, uuid::Uuid>(1)),
        row.get(2),
        row.get(3),
        row.get(4),
        row.get(5),
        row.get(6),
        row.get(7),
        row.get(8),
        row.get(9),
        row.get(10),
    )
}

impl UserStore for Arc<Client> {
    async fn user(&self, id: ID<User>) -> Result<Option<User>, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT ", USER_COLS, " FROM ",
                USERS,
                " WHERE id = $1 AND NOT deleted"
            ),
            &[&id.inner()],
        )
        .await
        .map(|opt| opt.as_ref().map(to_user))
        .map_err(AuthError::from)
    }

    async fn user_by_email(&self, email: &Email) -> Result<Option<User>, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT ", USER_COLS, " FROM ",
                USERS,
                " WHERE email = $1 AND NOT deleted"
            ),
            &[&email.as_str()],
        )
        .await
        .map(|opt| opt.as_ref().map(to_user))
        .map_err(AuthError::from)
    }

    async fn user_by_phone(&self, phone: &PhoneNumber) -> Result<Option<User>, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT ", USER_COLS, " FROM ",
                USERS,
                " WHERE phone = $1 AND NOT deleted"
            ),
            &[&phone.as_str()],
        )
        .await
        .map(|opt| opt.as_ref().map(to_user))
        .map_err(AuthError::from)
    }

    async fn lookup(&self, identifier: &str) -> Result<Option<(User, String)>, AuthError> {
        let by_email = match Email::parse(identifier) {
            Ok(email) => self
                .query_opt(
                    const_format::concatcp!(
                        "SELECT ", USER_COLS, ", hashword FROM ",
                        USERS,
                        " WHERE email = $1 AND NOT deleted"
                    ),
                    &[&email.as_str()],
                )
                .await
                .map_err(AuthError::from)?,
            Err(_) => None,
        };
        let row = match by_email {
            Some(row) => Some(row),
            None => match PhoneNumber::parse(identifier) {
                Ok(phone) => self
                    .query_opt(
                        const_format::concatcp!(
                            "SELECT ", USER_COLS, ", hashword FROM ",
                            USERS,
                            " WHERE phone = $1 AND NOT deleted"
                        ),
                        &[&phone.as_str()],
                    )
                    .await
                    .map_err(AuthError::from)?,
                Err(_) => None,
            },
        };
        Ok(row.map(|row| (to_user(&row), row.get::<_, String>(12))))
    }

    async fn exists_email(&self, email: &Email) -> Result<bool, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT 1 FROM ",
                USERS,
                " WHERE email = $1 AND NOT deleted"
            ),
            &[&email.as_str()],
        )
        .await
        .map(|opt| opt.is_some())
        .map_err(AuthError::from)
    }

    async fn exists_phone(&self, phone: &PhoneNumber) -> Result<bool, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT 1 FROM ",
                USERS,
                " WHERE phone = $1 AND NOT deleted"
            ),
            &[&phone.as_str()],
        )
        .await
        .map(|opt| opt.is_some())
        .map_err(AuthError::from)
    }

    async fn create_user(&self, user: &User, hashword: &str) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                USERS,
                " (id, first_name, last_name, email, phone, hashword, active, \
                 email_verified, phone_verified, last_login, created, updated, deleted) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
            ),
            &[
                &user.id().inner(),
                &user.first_name(),
                &user.last_name(),
                &user.email().as_str(),
                &user.phone().map(|p| p.as_str()),
                &hashword,
                &user.active(),
                &user.email_verified(),
                &user.phone_verified(),
                &user.last_login(),
                &user.created(),
                &user.updated(),
                &user.deleted(),
            ],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn update_user(&self, user: &User) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                USERS,
                " SET first_name = $2, last_name = $3, email = $4, phone = $5, \
                 active = $6, email_verified = $7, phone_verified = $8, \
                 last_login = $9, updated = $10, deleted = $11 WHERE id = $1"
            ),
            &[
                &user.id().inner(),
                &user.first_name(),
                &user.last_name(),
                &user.email().as_str(),
                &user.phone().map(|p| p.as_str()),
                &user.active(),
                &user.email_verified(),
                &user.phone_verified(),
                &user.last_login(),
                &user.updated(),
                &user.deleted(),
            ],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn rehash_user(&self, id: ID<User>, hashword: &str) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                USERS,
                " SET hashword = $2, updated = now() WHERE id = $1"
            ),
            &[&id.inner(), &hashword],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn delete_user(&self, id: ID<User>) -> Result<bool, AuthError> {
        let erased = self
            .execute(
                const_format::concatcp!(
                    "UPDATE ",
                    USERS,
                    " SET deleted = TRUE, updated = now() WHERE id = $1 AND NOT deleted"
                ),
                &[&id.inner()],
            )
            .await
            .map_err(AuthError::from)?;
        if erased == 0 {
            return Ok(false);
        }
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                USER_ROLES,
                " SET deleted = TRUE WHERE user_id = $1 AND NOT deleted"
            ),
            &[&id.inner()],
        )
        .await
        .map_err(AuthError::from)?;
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                SESSIONS,
                " SET revoked = TRUE, revoked_at = now(), revoked_by = 'user deleted' \
                 WHERE user_id = $1 AND NOT revoked"
            ),
            &[&id.inner()],
        )
        .await
        .map_err(AuthError::from)?;
        Ok(true)
    }

    async fn count_users(&self) -> Result<usize, AuthError> {
        self.query_one(
            const_format::concatcp!("SELECT COUNT(*) FROM ", USERS, " WHERE NOT deleted"),
            &[],
        )
        .await
        .map(|row| row.get::<_, i64>(0) as usize)
        .map_err(AuthError::from)
    }

    async fn page_users(
        &self,
        filter: &UserFilter,
        sort: UserSort,
        direction: Direction,
        page: usize,
        page_size: usize,
    ) -> Result<Page<User>, AuthError> {
        let mut conditions = String::from(" WHERE NOT deleted");
        let mut args: Vec<&(dyn ToSql + Sync)> = Vec::new();
        let pattern = filter.search.as_ref().map(|s| format!("%{}%", s.to_lowercase()));
        if let Some(ref pattern) = pattern {
            args.push(pattern);
            conditions.push_str(&format!(
                " AND (LOWER(first_name) LIKE ${n} OR LOWER(last_name) LIKE ${n} \
                 OR email LIKE ${n})",
                n = args.len()
            ));
        }
        if let Some(ref role) = filter.role {
            args.push(role);
            conditions.push_str(&format!(
                " AND id IN (SELECT ur.user_id FROM {} ur JOIN {} r ON r.id = ur.role_id \
                 WHERE r.name = ${} AND NOT ur.deleted AND NOT r.deleted)",
                USER_ROLES,
                ROLES,
                args.len()
            ));
        }
        if let Some(ref active) = filter.active {
            args.push(active);
            conditions.push_str(&format!(" AND active = ${}", args.len()));
        }
        let total = self
            .query_one(
                &format!("SELECT COUNT(*) FROM {}{}", USERS, conditions),
                &args,
            )
            .await
            .map(|row| row.get::<_, i64>(0) as usize)
            .map_err(AuthError::from)?;
        let page = page.max(1);
        let listing = format!(
            "SELECT {} FROM {}{} ORDER BY {} {} LIMIT {} OFFSET {}",
            USER_COLS,
            USERS,
            conditions,
            sort.column(),
            direction.keyword(),
            page_size,
            (page - 1) * page_size,
        );
        let items = self
            .query(&listing, &args)
            .await
            .map(|rows| rows.iter().map(to_user).collect())
            .map_err(AuthError::from)?;
        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }
}

impl RoleStore for Arc<Client> {
    async fn role(&self, id: ID<Role>) -> Result<Option<Role>, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT ", ROLE_COLS, " FROM ",
                ROLES,
                " WHERE id = $1 AND NOT deleted"
            ),
            &[&id.inner()],
        )
        .await
        .map(|opt| opt.as_ref().map(to_role))
        .map_err(AuthError::from)
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT ", ROLE_COLS, " FROM ",
                ROLES,
                " WHERE name = $1 AND NOT deleted"
            ),
            &[&name],
        )
        .await
        .map(|opt| opt.as_ref().map(to_role))
        .map_err(AuthError::from)
    }

    async fn roles_by_ids(&self, ids: &[ID<Role>]) -> Result<Vec<Role>, AuthError> {
        let ids: Vec<uuid::Uuid> = ids.iter().map(|id| id.inner()).collect();
        self.query(
            const_format::concatcp!(
                "SELECT ", ROLE_COLS, " FROM ",
                ROLES,
                " WHERE id = ANY($1) AND NOT deleted"
            ),
            &[&ids],
        )
        .await
        .map(|rows| rows.iter().map(to_role).collect())
        .map_err(AuthError::from)
    }

    async fn roles_of(&self, user: ID<User>) -> Result<Vec<Role>, AuthError> {
        self.query(
            const_format::concatcp!(
                "SELECT r.id, r.name, r.description, r.active, r.created, r.updated, \
                 r.deleted FROM ",
                ROLES,
                " r JOIN ",
                USER_ROLES,
                " ur ON ur.role_id = r.id \
                 WHERE ur.user_id = $1 AND NOT ur.deleted AND NOT r.deleted"
            ),
            &[&user.inner()],
        )
        .await
        .map(|rows| rows.iter().map(to_role).collect())
        .map_err(AuthError::from)
    }

    async fn create_role(&self, role: &Role) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                ROLES,
                " (id, name, description, active, created, updated, deleted) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)"
            ),
            &[
                &role.id().inner(),
                &role.name(),
                &role.description(),
                &role.active(),
                &role.created(),
                &role.updated(),
                &role.deleted(),
            ],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn update_role(&self, role: &Role) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                ROLES,
                " SET name = $2, description = $3, active = $4, updated = $5, \
                 deleted = $6 WHERE id = $1"
            ),
            &[
                &role.id().inner(),
                &role.name(),
                &role.description(),
                &role.active(),
                &role.updated(),
                &role.deleted(),
            ],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn assign_role(
        &self,
        user: ID<User>,
        role: ID<Role>,
        assigned_by: Option<&str>,
    ) -> Result<bool, AuthError> {
        // the conditional upsert makes assignment idempotent: a live link
        // conflicts and updates zero rows
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                USER_ROLES,
                " (id, user_id, role_id, assigned_at, assigned_by, deleted) \
                 VALUES ($1, $2, $3, now(), $4, FALSE) \
                 ON CONFLICT (user_id, role_id) DO UPDATE \
                 SET deleted = FALSE, assigned_at = now(), \
                     assigned_by = EXCLUDED.assigned_by WHERE ",
                USER_ROLES,
                ".deleted"
            ),
            &[
                &ID::<UserRole>::default().inner(),
                &user.inner(),
                &role.inner(),
                &assigned_by,
            ],
        )
        .await
        .map(|rows| rows > 0)
        .map_err(AuthError::from)
    }

    async fn remove_role(&self, user: ID<User>, role: ID<Role>) -> Result<bool, AuthError> {
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                USER_ROLES,
                " SET deleted = TRUE WHERE user_id = $1 AND role_id = $2 AND NOT deleted"
            ),
            &[&user.inner(), &role.inner()],
        )
        .await
        .map(|rows| rows > 0)
        .map_err(AuthError::from)
    }

    async fn page_roles(
        &self,
        search: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Role>, AuthError> {
        let mut conditions = String::from(" WHERE NOT deleted");
        let mut args: Vec<&(dyn ToSql + Sync)> = Vec::new();
        let pattern = search.map(|s| format!("%{}%", s.to_lowercase()));
        if let Some(ref pattern) = pattern {
            args.push(pattern);
            conditions
                .push_str(" AND (LOWER(name) LIKE $1 OR LOWER(description) LIKE $1)");
        }
        let total = self
            .query_one(
                &format!("SELECT COUNT(*) FROM {}{}", ROLES, conditions),
                &args,
            )
            .await
            .map(|row| row.get::<_, i64>(0) as usize)
            .map_err(AuthError::from)?;
        let page = page.max(1);
        let items = self
            .query(
                &format!(
                    "SELECT {} FROM {}{} ORDER BY name ASC LIMIT {} OFFSET {}",
                    ROLE_COLS,
                    ROLES,
                    conditions,
                    page_size,
                    (page - 1) * page_size,
                ),
                &args,
            )
            .await
            .map(|rows| rows.iter().map(to_role).collect())
            .map_err(AuthError::from)?;
        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }
}

impl PermissionStore for Arc<Client> {
    async fn permission(&self, id: ID<Permission>) -> Result<Option<Permission>, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT ", PERMISSION_COLS, " FROM ",
                PERMISSIONS,
                " WHERE id = $1 AND NOT deleted"
            ),
            &[&id.inner()],
        )
        .await
        .map(|opt| opt.as_ref().map(to_permission))
        .map_err(AuthError::from)
    }

    async fn permission_by_name(&self, name: &str) -> Result<Option<Permission>, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT ", PERMISSION_COLS, " FROM ",
                PERMISSIONS,
                " WHERE name = $1 AND NOT deleted"
            ),
            &[&name],
        )
        .await
        .map(|opt| opt.as_ref().map(to_permission))
        .map_err(AuthError::from)
    }

    async fn permissions_by_ids(
        &self,
        ids: &[ID<Permission>],
    ) -> Result<Vec<Permission>, AuthError> {
        let ids: Vec<uuid::Uuid> = ids.iter().map(|id| id.inner()).collect();
        self.query(
            const_format::concatcp!(
                "SELECT ", PERMISSION_COLS, " FROM ",
                PERMISSIONS,
                " WHERE id = ANY($1) AND NOT deleted"
            ),
            &[&ids],
        )
        .await
        .map(|rows| rows.iter().map(to_permission).collect())
        .map_err(AuthError::from)
    }

    async fn permissions_of_role(&self, role: ID<Role>) -> Result<Vec<Permission>, AuthError> {
        self.query(
            const_format::concatcp!(
                "SELECT p.id, p.name, p.description, p.resource, p.action, p.active, \
                 p.created, p.updated, p.deleted FROM ",
                PERMISSIONS,
                " p JOIN ",
                ROLE_PERMISSIONS,
                " rp ON rp.permission_id = p.id \
                 WHERE rp.role_id = $1 AND NOT rp.deleted AND NOT p.deleted"
            ),
            &[&role.inner()],
        )
        .await
        .map(|rows| rows.iter().map(to_permission).collect())
        .map_err(AuthError::from)
    }

    async fn permissions_of(&self, user: ID<User>) -> Result<Vec<Permission>, AuthError> {
        self.query(
            const_format::concatcp!(
                "SELECT p.id, p.name, p.description, p.resource, p.action, p.active, \
                 p.created, p.updated, p.deleted FROM ",
                PERMISSIONS,
                " p JOIN ",
                ROLE_PERMISSIONS,
                " rp ON rp.permission_id = p.id JOIN ",
                USER_ROLES,
                " ur ON ur.role_id = rp.role_id JOIN ",
                ROLES,
                " r ON r.id = ur.role_id \
                 WHERE ur.user_id = $1 AND r.active AND NOT r.deleted \
                 AND NOT ur.deleted AND NOT rp.deleted AND NOT p.deleted"
            ),
            &[&user.inner()],
        )
        .await
        .map(|rows| rows.iter().map(to_permission).collect())
        .map_err(AuthError::from)
    }

    async fn create_permission(&self, permission: &Permission) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                PERMISSIONS,
                " (id, name, description, resource, action, active, created, updated, \
                 deleted) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
            ),
            &[
                &permission.id().inner(),
                &permission.name(),
                &permission.description(),
                &permission.resource(),
                &permission.action(),
                &permission.active(),
                &permission.created(),
                &permission.updated(),
                &permission.deleted(),
            ],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn update_permission(&self, permission: &Permission) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                PERMISSIONS,
                " SET name = $2, description = $3, resource = $4, action = $5, \
                 active = $6, updated = $7, deleted = $8 WHERE id = $1"
            ),
            &[
                &permission.id().inner(),
                &permission.name(),
                &permission.description(),
                &permission.resource(),
                &permission.action(),
                &permission.active(),
                &permission.updated(),
                &permission.deleted(),
            ],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn grant_permission(
        &self,
        role: ID<Role>,
        permission: ID<Permission>,
        assigned_by: Option<&str>,
    ) -> Result<bool, AuthError> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                ROLE_PERMISSIONS,
                " (id, role_id, permission_id, assigned_at, assigned_by, deleted) \
                 VALUES ($1, $2, $3, now(), $4, FALSE) \
                 ON CONFLICT (role_id, permission_id) DO UPDATE \
                 SET deleted = FALSE, assigned_at = now(), \
                     assigned_by = EXCLUDED.assigned_by WHERE ",
                ROLE_PERMISSIONS,
                ".deleted"
            ),
            &[
                &ID::<RolePermission>::default().inner(),
                &role.inner(),
                &permission.inner(),
                &assigned_by,
            ],
        )
        .await
        .map(|rows| rows > 0)
        .map_err(AuthError::from)
    }

    async fn revoke_permission(
        &self,
        role: ID<Role>,
        permission: ID<Permission>,
    ) -> Result<bool, AuthError> {
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                ROLE_PERMISSIONS,
                " SET deleted = TRUE WHERE role_id = $1 AND permission_id = $2 \
                 AND NOT deleted"
            ),
            &[&role.inner(), &permission.inner()],
        )
        .await
        .map(|rows| rows > 0)
        .map_err(AuthError::from)
    }

    async fn page_permissions(
        &self,
        search: Option<&str>,
        page: usize,
        page_size: usize,
    ) -> Result<Page<Permission>, AuthError> {
        let mut conditions = String::from(" WHERE NOT deleted");
        let mut args: Vec<&(dyn ToSql + Sync)> = Vec::new();
        let pattern = search.map(|s| format!("%{}%", s.to_lowercase()));
        if let Some(ref pattern) = pattern {
            args.push(pattern);
            conditions.push_str(
                " AND (LOWER(name) LIKE $1 OR LOWER(description) LIKE $1 \
                 OR LOWER(resource) LIKE $1)",
            );
        }
        let total = self
            .query_one(
                &format!("SELECT COUNT(*) FROM {}{}", PERMISSIONS, conditions),
                &args,
            )
            .await
            .map(|row| row.get::<_, i64>(0) as usize)
            .map_err(AuthError::from)?;
        let page = page.max(1);
        let items = self
            .query(
                &format!(
                    "SELECT {} FROM {}{} ORDER BY name ASC LIMIT {} OFFSET {}",
                    PERMISSION_COLS,
                    PERMISSIONS,
                    conditions,
                    page_size,
                    (page - 1) * page_size,
                ),
                &args,
            )
            .await
            .map(|rows| rows.iter().map(to_permission).collect())
            .map_err(AuthError::from)?;
        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }
}

impl SessionStore for Arc<Client> {
    async fn session(&self, id: ID<Session>) -> Result<Option<Session>, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT ", SESSION_COLS, " FROM ",
                SESSIONS,
                " WHERE id = $1"
            ),
            &[&id.inner()],
        )
        .await
        .map(|opt| opt.as_ref().map(to_session))
        .map_err(AuthError::from)
    }

    async fn session_by_hash(&self, hash: &[u8]) -> Result<Option<Session>, AuthError> {
        self.query_opt(
            const_format::concatcp!(
                "SELECT ", SESSION_COLS, " FROM ",
                SESSIONS,
                " WHERE token_hash = $1"
            ),
            &[&hash],
        )
        .await
        .map(|opt| opt.as_ref().map(to_session))
        .map_err(AuthError::from)
    }

    async fn sessions_of(&self, user: ID<User>) -> Result<Vec<Session>, AuthError> {
        self.query(
            const_format::concatcp!(
                "SELECT ", SESSION_COLS, " FROM ",
                SESSIONS,
                " WHERE user_id = $1"
            ),
            &[&user.inner()],
        )
        .await
        .map(|rows| rows.iter().map(to_session).collect())
        .map_err(AuthError::from)
    }

    async fn active_sessions_of(&self, user: ID<User>) -> Result<Vec<Session>, AuthError> {
        self.query(
            const_format::concatcp!(
                "SELECT ", SESSION_COLS, " FROM ",
                SESSIONS,
                " WHERE user_id = $1 AND NOT revoked AND expires_at > now()"
            ),
            &[&user.inner()],
        )
        .await
        .map(|rows| rows.iter().map(to_session).collect())
        .map_err(AuthError::from)
    }

    async fn open_session(&self, session: &Session) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                SESSIONS,
                " (id, user_id, token_hash, device, ip, agent, expires_at, revoked, \
                 revoked_at, revoked_by, accessed_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
            ),
            &[
                &session.id().inner(),
                &session.user().inner(),
                &session.hash(),
                &session.device(),
                &session.ip(),
                &session.agent(),
                &session.expires_at(),
                &session.revoked(),
                &session.revoked_at(),
                &session.revoked_by(),
                &session.accessed_at(),
            ],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn touch_session(&self, id: ID<Session>) -> Result<(), AuthError> {
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                SESSIONS,
                " SET accessed_at = now() WHERE id = $1"
            ),
            &[&id.inner()],
        )
        .await
        .map(|_| ())
        .map_err(AuthError::from)
    }

    async fn revoke_session(&self, id: ID<Session>, reason: &str) -> Result<bool, AuthError> {
        // conditional write: at most one concurrent caller sees rows > 0
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                SESSIONS,
                " SET revoked = TRUE, revoked_at = now(), revoked_by = $2 \
                 WHERE id = $1 AND NOT revoked"
            ),
            &[&id.inner(), &reason],
        )
        .await
        .map(|rows| rows > 0)
        .map_err(AuthError::from)
    }

    async fn revoke_sessions(&self, user: ID<User>, reason: &str) -> Result<u64, AuthError> {
        self.execute(
            const_format::concatcp!(
                "UPDATE ",
                SESSIONS,
                " SET revoked = TRUE, revoked_at = now(), revoked_by = $2 \
                 WHERE user_id = $1 AND NOT revoked"
            ),
            &[&user.inner(), &reason],
        )
        .await
        .map_err(AuthError::from)
    }

    async fn sweep_sessions(&self) -> Result<u64, AuthError> {
        self.execute(
            const_format::concatcp!("DELETE FROM ", SESSIONS, " WHERE expires_at < now()"),
            &[],
        )
        .await
        .map_err(AuthError::from)
    }
}

impl UnitOfWork for Arc<Client> {
    async fn begin(&self) -> Result<(), AuthError> {
        self.batch_execute("BEGIN").await.map_err(AuthError::from)
    }
    async fn commit(&self) -> Result<(), AuthError> {
        self.batch_execute("COMMIT").await.map_err(AuthError::from)
    }
    async fn rollback(&self) -> Result<(), AuthError> {
        self.batch_execute("ROLLBACK").await.map_err(AuthError::from)
    }
}
