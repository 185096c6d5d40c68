//! Authentication, sessions, and role-based authorization.
//!
//! JWT-based authentication with Argon2 password hashing. Permissions are
//! granted transitively through role membership and embedded in access-token
//! claims; refresh tokens are opaque, hashed at rest, and single-use.
//!
//! ## Identity
//!
//! - [`User`] — Registered account with credentials
//! - [`Role`] — Named permission bundle
//! - [`Permission`] — Atomic (resource, action) grant
//! - [`Session`] — Refresh-token lineage with expiry and revocation
//!
//! ## Security
//!
//! - [`Crypto`] — JWT signing and verification
//! - [`Claims`] — JWT payload structure
//! - [`password`] — Argon2 hashing, verification, and the strength policy
//! - [`RateLimiter`] — Sliding-window brute-force guard
//!
//! ## Orchestration
//!
//! - [`Authenticator`] — Credential verification
//! - [`Tokens`] — Token pair issuance, rotation, and revocation
//! - [`Access`] — Permission aggregation and point-in-time checks
//! - [`Service`] — Command façade consumed by the presentation layer
//!
//! ## Storage
//!
//! - [`Store`] — Repository contracts plus the unit-of-work boundary
//! - [`Ledger`] — In-memory authoritative store
mod claims;
mod crypto;
mod dto;
mod email;
mod engine;
mod error;
mod events;
mod grant;
mod handlers;
mod limiter;
mod memory;
pub mod password;
mod permission;
mod phone;
mod resolver;
mod role;
mod session;
mod store;
mod tokens;
mod user;

pub use claims::*;
pub use crypto::*;
pub use dto::*;
pub use email::*;
pub use engine::*;
pub use error::*;
pub use events::*;
pub use grant::*;
pub use handlers::*;
pub use limiter::*;
pub use memory::*;
pub use permission::*;
pub use phone::*;
pub use resolver::*;
pub use role::*;
pub use session::*;
pub use store::*;
pub use tokens::*;
pub use user::*;

#[cfg(feature = "database")]
mod repository;
#[cfg(feature = "database")]
pub use repository::*;
