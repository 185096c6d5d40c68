use std::time::SystemTime;
use warden_core::ID;
use warden_core::Unique;

/// Named permission bundle.
#[derive(Debug, Clone)]
pub struct Role {
    id: ID<Self>,
    name: String,
    description: String,
    active: bool,
    created: SystemTime,
    updated: Option<SystemTime>,
    deleted: bool,
}

impl Role {
    pub fn new(name: String, description: String) -> Self {
        Self {
            id: ID::default(),
            name,
            description,
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

    pub fn describe(&mut self, name: String, description: String) {
        self.name = name;
        self.description = description;
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
    pub fn erase(&mut self) {
        self.deleted = true;
        self.touched();
    }

    fn touched(&mut self) {
        self.updated = Some(SystemTime::now());
    }

    #[cfg(feature = "database")]
    pub(crate) fn hydrate(
        id: ID<Self>,
        name: String,
        description: String,
        active: bool,
        created: SystemTime,
        updated: Option<SystemTime>,
        deleted: bool,
    ) -> Self {
        Self {
            id,
            name,
            description,
            active,
            created,
            updated,
            deleted,
        }
    }
}

impl Unique for Role {
    fn id(&self) -> ID<Self> {
        self.id
    }
}

#[cfg(feature = "database")]
mod schema {
    use super::*;
    use warden_pg::*;

    impl Schema for Role {
        fn name() -> &'static str {
            ROLES
        }
        fn creates() -> &'static str {
            const_format::concatcp!(
                "CREATE TABLE IF NOT EXISTS ",
                ROLES,
                " (
                    id          UUID PRIMARY KEY,
                    name        VARCHAR(100) UNIQUE NOT NULL,
                    description VARCHAR(255) NOT NULL,
                    active      BOOLEAN NOT NULL DEFAULT TRUE,
                    created     TIMESTAMPTZ NOT NULL,
                    updated     TIMESTAMPTZ,
                    deleted     BOOLEAN NOT NULL DEFAULT FALSE
                );"
            )
        }
        fn indices() -> &'static str {
            const_format::concatcp!(
                "CREATE INDEX IF NOT EXISTS idx_roles_name ON ",
                ROLES,
                " (name);"
            )
        }
    }
}
