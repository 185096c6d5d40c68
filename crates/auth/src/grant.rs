use super::*;
use std::time::SystemTime;
use warden_core::ID;
use warden_core::Unique;

/// Assignment of a role to a user. Soft-deleted on removal so the
/// (user, role) pair stays unique and re-assignment resurrects the link.
#[derive(Debug, Clone)]
pub struct UserRole {
    id: ID<Self>,
    user: ID<User>,
    role: ID<Role>,
    assigned_at: SystemTime,
    assigned_by: Option<String>,
    deleted: bool,
}

impl UserRole {
    pub fn new(user: ID<User>, role: ID<Role>, assigned_by: Option<String>) -> Self {
        Self {
            id: ID::default(),
            user,
            role,
            assigned_at: SystemTime::now(),
            assigned_by,
            deleted: false,
        }
    }

    pub fn user(&self) -> ID<User> {
        self.user
    }
    pub fn role(&self) -> ID<Role> {
        self.role
    }
    pub fn assigned_at(&self) -> SystemTime {
        self.assigned_at
    }
    pub fn assigned_by(&self) -> Option<&str> {
        self.assigned_by.as_deref()
    }
    pub fn deleted(&self) -> bool {
        self.deleted
    }

    pub fn erase(&mut self) {
        self.deleted = true;
    }
    pub fn restore(&mut self, assigned_by: Option<String>) {
        self.deleted = false;
        self.assigned_at = SystemTime::now();
        self.assigned_by = assigned_by;
    }
}

impl Unique for UserRole {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

/// Grant of a permission to a role. Same soft-delete lifecycle as
/// [`UserRole`].
#[derive(Debug, Clone)]
pub struct RolePermission {
    id: ID<Self>,
    role: ID<Role>,
    permission: ID<Permission>,
    assigned_at: SystemTime,
    assigned_by: Option<String>,
    deleted: bool,
}

impl RolePermission {
    pub fn new(role: ID<Role>, permission: ID<Permission>, assigned_by: Option<String>) -> Self {
        Self {
            id: ID::default(),
            role,
            permission,
            assigned_at: SystemTime::now(),
            assigned_by,
            deleted: false,
        }
    }

    pub fn role(&self) -> ID<Role> {
        self.role
    }
    pub fn permission(&self) -> ID<Permission> {
        self.permission
    }
    pub fn assigned_at(&self) -> SystemTime {
        self.assigned_at
    }
    pub fn assigned_by(&self) -> Option<&str> {
        self.assigned_by.as_deref()
    }
    pub fn deleted(&self) -> bool {
        self.deleted
    }

    pub fn erase(&mut self) {
        self.deleted = true;
    }
    pub fn restore(&mut self, assigned_by: Option<String>) {
        self.deleted = false;
        self.assigned_at = SystemTime::now();
        self.assigned_by = assigned_by;
    }
}

impl Unique for RolePermission {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

#[cfg(feature = "database")]
mod schema {
    use super::*;
    use warden_pg::*;

    impl Schema for UserRole {
        fn name() -> &'static str {
            USER_ROLES
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                USER_ROLES,
                " (
                    id          UUID PRIMARY KEY,
                    user_id     UUID NOT NULL REFERENCES ",
                USERS,
                "(id) ON DELETE CASCADE,
                    role_id     UUID NOT NULL REFERENCES ",
                ROLES,
                "(id) ON DELETE CASCADE,
                    assigned_at TIMESTAMPTZ NOT NULL,
                    assigned_by VARCHAR(255),
                    deleted     BOOLEAN NOT NULL DEFAULT FALSE,
                    UNIQUE (user_id, role_id)
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_user_roles_user ON ",
                USER_ROLES,
                " (user_id) WHERE NOT deleted;
                 CREATE INDEX IF NOT EXISTS idx_user_roles_role ON ",
                USER_ROLES,
                " (role_id) WHERE NOT deleted;"
            )
        }
    }

    impl Schema for RolePermission {
        fn name() -> &'static str {
            ROLE_PERMISSIONS
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                ROLE_PERMISSIONS,
                " (
                    id            UUID PRIMARY KEY,
                    role_id       UUID NOT NULL REFERENCES ",
                ROLES,
                "(id) ON DELETE CASCADE,
                    permission_id UUID NOT NULL REFERENCES ",
                PERMISSIONS,
                "(id) ON DELETE CASCADE,
                    assigned_at   TIMESTAMPTZ NOT NULL,
                    assigned_by   VARCHAR(255),
                    deleted       BOOLEAN NOT NULL DEFAULT FALSE,
                    UNIQUE (role_id, permission_id)
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_role_permissions_role ON ",
                ROLE_PERMISSIONS,
                " (role_id) WHERE NOT deleted;"
            )
        }
    }
}
