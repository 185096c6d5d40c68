//! Seeder Binary
//!
//! Applies the schema, seeds the default permission and role fixtures plus
//! the admin account, then sweeps expired sessions. Every step is
//! idempotent: existing fixtures are left alone.

use warden_auth::AuthError;
use warden_auth::Permission;
use warden_auth::PermissionStore;
use warden_auth::Role;
use warden_auth::RoleStore;
use warden_auth::SessionStore;
use warden_auth::User;
use warden_auth::UserStore;
use warden_auth::password;
use warden_core::Unique;

/// Fixture permissions: (name, description, resource, action).
const PERMISSIONS: &[(&str, &str, &str, &str)] = &[
    ("users.read", "Read Users", "User", "Read"),
    ("users.write", "Write Users", "User", "Write"),
    ("users.delete", "Delete Users", "User", "Delete"),
    ("users.manage", "Manage Users", "User", "Manage"),
    ("roles.read", "Read Roles", "Role", "Read"),
    ("roles.write", "Write Roles", "Role", "Write"),
    ("roles.delete", "Delete Roles", "Role", "Delete"),
    ("roles.manage", "Manage Roles", "Role", "Manage"),
    ("permissions.read", "Read Permissions", "Permission", "Read"),
    ("permissions.write", "Write Permissions", "Permission", "Write"),
    ("permissions.delete", "Delete Permissions", "Permission", "Delete"),
    ("permissions.manage", "Manage Permissions", "Permission", "Manage"),
    ("system.admin", "System Administration", "System", "Admin"),
    ("system.audit", "System Audit", "System", "Audit"),
    ("system.backup", "System Backup", "System", "Backup"),
    ("profile.read", "Read Own Profile", "Profile", "Read"),
    ("profile.write", "Update Own Profile", "Profile", "Write"),
    ("profile.password", "Change Own Password", "Profile", "Password"),
    ("auth.login", "Login", "Auth", "Login"),
    ("auth.logout", "Logout", "Auth", "Logout"),
    ("auth.register", "Register", "Auth", "Register"),
    ("auth.refresh", "Refresh Token", "Auth", "Refresh"),
];

/// Fixture roles with their permission-name prefixes.
const ROLES: &[(&str, &str, &[&str])] = &[
    (
        "Admin",
        "System Administrator with full access",
        &["users.", "roles.", "permissions.", "system.", "profile.", "auth."],
    ),
    (
        "Manager",
        "Manager with user oversight capabilities",
        &["users.", "profile.", "auth."],
    ),
    (
        "User",
        "Standard user with basic access",
        &["profile.", "auth."],
    ),
];

#[tokio::main]
async fn main() {
    warden_core::log();
    warden_core::kys();
    let db = warden_pg::db().await;
    warden_auth::migrate(&db).await.expect("schema migration");
    seed_permissions(&db).await.expect("seed permissions");
    seed_roles(&db).await.expect("seed roles");
    seed_admin(&db).await.expect("seed admin user");
    let swept = db.sweep_sessions().await.expect("session sweep");
    log::info!("swept {} expired sessions", swept);
}

async fn seed_permissions(db: &std::sync::Arc<tokio_postgres::Client>) -> Result<(), AuthError> {
    if db.permission_by_name(PERMISSIONS[0].0).await?.is_some() {
        log::info!("permissions already exist, skipping seed");
        return Ok(());
    }
    for (name, description, resource, action) in PERMISSIONS {
        db.create_permission(&Permission::new(
            name.to_string(),
            description.to_string(),
            resource.to_string(),
            action.to_string(),
        ))
        .await?;
    }
    log::info!("seeded {} permissions", PERMISSIONS.len());
    Ok(())
}

async fn seed_roles(db: &std::sync::Arc<tokio_postgres::Client>) -> Result<(), AuthError> {
    if db.role_by_name(ROLES[0].0).await?.is_some() {
        log::info!("roles already exist, skipping seed");
        return Ok(());
    }
    for (name, description, prefixes) in ROLES {
        let role = Role::new(name.to_string(), description.to_string());
        db.create_role(&role).await?;
        for fixture in PERMISSIONS
            .iter()
            .filter(|f| prefixes.iter().any(|prefix| f.0.starts_with(prefix)))
        {
            let permission = db
                .permission_by_name(fixture.0)
                .await?
                .ok_or(AuthError::NotFound("Permission"))?;
            db.grant_permission(role.id(), permission.id(), Some("seeder"))
                .await?;
        }
        log::info!("seeded role {}", name);
    }
    Ok(())
}

/// Creates the admin account from ADMIN_EMAIL and ADMIN_PASSWORD. Skipped
/// with a warning when either is unset.
async fn seed_admin(db: &std::sync::Arc<tokio_postgres::Client>) -> Result<(), AuthError> {
    let (email, plaintext) = match (
        std::env::var("ADMIN_EMAIL"),
        std::env::var("ADMIN_PASSWORD"),
    ) {
        (Ok(email), Ok(password)) => (email, password),
        _ => {
            log::warn!("ADMIN_EMAIL or ADMIN_PASSWORD unset, skipping admin seed");
            return Ok(());
        }
    };
    let email = warden_auth::Email::parse(&email)?;
    if db.exists_email(&email).await? {
        log::info!("admin user already exists, skipping seed");
        return Ok(());
    }
    let hashword = password::hash(&plaintext)?;
    let user = User::new("System".to_string(), "Administrator".to_string(), email, None);
    db.create_user(&user, &hashword).await?;
    let admin = db
        .role_by_name("Admin")
        .await?
        .ok_or(AuthError::NotFound("Role"))?;
    db.assign_role(user.id(), admin.id(), Some("seeder")).await?;
    log::info!("seeded admin user {}", user.id());
    Ok(())
}
