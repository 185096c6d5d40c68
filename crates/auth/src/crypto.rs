use super::*;
use std::time::Duration;
use warden_core::ID;

/// JWT signing and verification, plus opaque refresh-token generation.
///
/// Keys and lifetimes come from the environment via [`Crypto::from_env`];
/// issuer and audience are validated on decode.
pub struct Crypto {
    encoding: jsonwebtoken::EncodingKey,
    decoding: jsonwebtoken::DecodingKey,
    issuer: String,
    audience: String,
    access: Duration,
    refresh: Duration,
}

impl Crypto {
    pub fn new(secret: &[u8], issuer: String, audience: String) -> Self {
        Self {
            encoding: jsonwebtoken::EncodingKey::from_secret(secret),
            decoding: jsonwebtoken::DecodingKey::from_secret(secret),
            issuer,
            audience,
            access: Duration::from_secs(warden_core::ACCESS_TOKEN_MINUTES * 60),
            refresh: Duration::from_secs(warden_core::REFRESH_TOKEN_DAYS * 24 * 3600),
        }
    }

    /// Reads `JWT_SECRET`, `JWT_ISSUER`, `JWT_AUDIENCE`,
    /// `JWT_ACCESS_MINUTES`, and `JWT_REFRESH_DAYS`, with defaults for all
    /// but the secret.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| String::default());
        let issuer = std::env::var("JWT_ISSUER").unwrap_or_else(|_| "warden".to_string());
        let audience =
            std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "warden-users".to_string());
        let minutes = std::env::var("JWT_ACCESS_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(warden_core::ACCESS_TOKEN_MINUTES);
        let days = std::env::var("JWT_REFRESH_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(warden_core::REFRESH_TOKEN_DAYS);
        Self {
            access: Duration::from_secs(minutes * 60),
            refresh: Duration::from_secs(days * 24 * 3600),
            ..Self::new(secret.as_bytes(), issuer, audience)
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
    pub fn audience(&self) -> &str {
        &self.audience
    }
    /// Access token lifetime.
    pub fn access(&self) -> Duration {
        self.access
    }
    /// Refresh token (and session) lifetime.
    pub fn refresh(&self) -> Duration {
        self.refresh
    }

    pub fn claims(
        &self,
        user: &User,
        session: ID<Session>,
        roles: &[Role],
        permissions: &[Permission],
    ) -> Claims {
        Claims::new(
            user,
            session,
            roles,
            permissions,
            &self.issuer,
            &self.audience,
            self.access,
        )
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        jsonwebtoken::encode(&jsonwebtoken::Header::default(), claims, &self.encoding)
    }

    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = jsonwebtoken::Validation::default();
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }

    /// Sha256 of a refresh token, the at-rest and index representation.
    pub fn hash(token: &str) -> Vec<u8> {
        use sha2::Digest;
        sha2::Sha256::digest(token.as_bytes()).to_vec()
    }

    /// Opaque refresh token: 64 hex chars, 256 bits of entropy.
    pub fn refresh_token() -> String {
        format!(
            "{}{}",
            uuid::Uuid::new_v4().simple(),
            uuid::Uuid::new_v4().simple()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crypto() -> Crypto {
        Crypto::new(
            b"test-secret",
            "warden".to_string(),
            "warden-users".to_string(),
        )
    }

    fn claims(crypto: &Crypto) -> Claims {
        let user = User::new(
            "Ada".to_string(),
            "Lovelace".to_string(),
            Email::parse("ada@example.com").unwrap(),
            None,
        );
        crypto.claims(&user, ID::default(), &[], &[])
    }

    #[test]
    fn round_trips_claims() {
        let crypto = crypto();
        let claims = claims(&crypto);
        let token = crypto.encode(&claims).unwrap();
        let decoded = crypto.decode(&token).unwrap();
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.sid, claims.sid);
        assert_eq!(decoded.iss, "warden");
        assert_eq!(decoded.aud, "warden-users");
    }

    #[test]
    fn rejects_foreign_signatures() {
        let ours = crypto();
        let theirs = Crypto::new(
            b"other-secret",
            "warden".to_string(),
            "warden-users".to_string(),
        );
        let token = theirs.encode(&claims(&theirs)).unwrap();
        assert!(ours.decode(&token).is_err());
    }

    #[test]
    fn rejects_wrong_audience() {
        let ours = crypto();
        let theirs = Crypto::new(
            b"test-secret",
            "warden".to_string(),
            "someone-else".to_string(),
        );
        let token = theirs.encode(&claims(&theirs)).unwrap();
        assert!(ours.decode(&token).is_err());
    }

    #[test]
    fn refresh_tokens_are_long_and_unique() {
        let a = Crypto::refresh_token();
        let b = Crypto::refresh_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(Crypto::hash(&a), Crypto::hash(&b));
    }
}
