use std::time::SystemTime;
use warden_core::ID;
use warden_core::Unique;

/// Atomic grant unit, identified by its (resource, action) pair.
#[derive(Debug, Clone)]
pub struct Permission {
    id: ID<Self>,
    name: String,
    description: String,
    resource: String,
    action: String,
    active: bool,
    created: SystemTime,
    updated: Option<SystemTime>,
    deleted: bool,
}

impl Permission {
    pub fn new(name: String, description: String, resource: String, action: String) -> Self {
        Self {
            id: ID::default(),
            name,
            description,
            resource,
            action,
            active: true,
            created: SystemTime::now(),
            updated: None,
            deleted: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn resource(&self) -> &str {
        &self.resource
    }
    pub fn action(&self) -> &str {
        &self.action
    }
    pub fn active(&self) -> bool {
        self.active
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

    /// Exact, case-sensitive match. No wildcards, no hierarchy.
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.active && self.resource == resource && self.action == action
    }

    pub fn activate(&mut self) {
        self.active = true;
        self.touched();
    }
    pub fn deactivate(&mut self) {
        self.active = false;
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
        name: String,
        description: String,
        resource: String,
        action: String,
        active: bool,
        created: SystemTime,
        updated: Option<SystemTime>,
        deleted: bool,
    ) -> Self {
        Self {
            id,
            name,
            description,
            resource,
            action,
            active,
            created,
            updated,
            deleted,
        }
    }
}

impl Unique for Permission {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

#[cfg(feature = "database")]
mod schema {
    use super::*;
    use warden_pg::*;

    impl Schema for Permission {
        fn name() -> &'static str {
            PERMISSIONS
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                PERMISSIONS,
                " (
                    id          UUID PRIMARY KEY,
                    name        VARCHAR(100) UNIQUE NOT NULL,
                    description VARCHAR(255) NOT NULL,
                    resource    VARCHAR(100) NOT NULL,
                    action      VARCHAR(100) NOT NULL,
                    active      BOOLEAN NOT NULL DEFAULT TRUE,
                    created     TIMESTAMPTZ NOT NULL,
                    updated     TIMESTAMPTZ,
                    deleted     BOOLEAN NOT NULL DEFAULT FALSE,
                    UNIQUE (resource, action)
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_permissions_resource_action ON ",
                PERMISSIONS,
                " (resource, action);"
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_exactly() {
        let perm = Permission::new(
            "users.read".to_string(),
            "Read Users".to_string(),
            "User".to_string(),
            "Read".to_string(),
        );
        assert!(perm.matches("User", "Read"));
        assert!(!perm.matches("user", "Read"));
        assert!(!perm.matches("User", "read"));
        assert!(!perm.matches("User", "Write"));
    }

    #[test]
    fn inactive_never_matches() {
        let mut perm = Permission::new(
            "users.read".to_string(),
            "Read Users".to_string(),
            "User".to_string(),
            "Read".to_string(),
        );
        perm.deactivate();
        assert!(!perm.matches("User", "Read"));
    }
}
