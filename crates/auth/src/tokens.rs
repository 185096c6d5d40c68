use super::*;
use dashmap::DashMap;
use std::sync::Arc;
use warden_core::ID;
use warden_core::Unique;

/// Refresh index entry: which user and session a token hash belongs to.
#[derive(Debug, Clone, Copy)]
pub struct IndexEntry {
    pub user: ID<User>,
    pub session: ID<Session>,
}

/// Issues, rotates, and revokes token pairs.
///
/// Refresh tokens are single-use: each refresh revokes the prior session
/// through a store-level conditional write before minting a replacement, so
/// a replayed token observes `None`, never a second valid pair. The
/// in-process index gives O(1) token-to-session resolution; it is an
/// optimization, never the authority; misses fall back to the store.
pub struct Tokens<S> {
    store: S,
    crypto: Arc<Crypto>,
    index: DashMap<Vec<u8>, IndexEntry>,
}

impl<S: Store> Tokens<S> {
    pub fn new(store: S, crypto: Arc<Crypto>) -> Self {
        Self {
            store,
            crypto,
            index: DashMap::new(),
        }
    }

    /// Mints a signed access token embedding the user's resolved roles and
    /// permissions, opens a session for a fresh opaque refresh token, and
    /// indexes it.
    pub async fn issue(&self, user: ID<User>, context: &Context) -> Result<TokenResult, AuthError> {
        let user = self
            .store
            .user(user)
            .await?
            .ok_or(AuthError::NotFound("User"))?;
        let mut roles: Vec<Role> = self
            .store
            .roles_of(user.id())
            .await?
            .into_iter()
            .filter(|r| r.active())
            .collect();
        roles.sort_by_key(|r| r.id());
        roles.dedup_by_key(|r| r.id());
        let mut permissions = self.store.permissions_of(user.id()).await?;
        permissions.sort_by_key(|p| p.id());
        permissions.dedup_by_key(|p| p.id());
        let refresh = Crypto::refresh_token();
        let hash = Crypto::hash(&refresh);
        let session = Session::new(user.id(), hash.clone(), context, self.crypto.refresh());
        let claims = self.crypto.claims(&user, session.id(), &roles, &permissions);
        let access = self
            .crypto
            .encode(&claims)
            .map_err(|e| AuthError::Unexpected(e.to_string()))?;
        self.store.open_session(&session).await?;
        self.index.insert(
            hash,
            IndexEntry {
                user: user.id(),
                session: session.id(),
            },
        );
        log::debug!("issued token pair for user {}", user.id());
        Ok(TokenResult {
            access_token: access,
            refresh_token: refresh,
            expires_at: claims.exp,
            token_type: "Bearer".to_string(),
        })
    }

    /// Rotates a refresh token. `None` for unknown, expired, or revoked
    /// tokens, for deactivated users, and for the loser of a concurrent
    /// rotation on the same token.
    pub async fn refresh(&self, token: &str) -> Result<Option<TokenResult>, AuthError> {
        let hash = Crypto::hash(token);
        let session = match self.index.get(&hash).map(|entry| entry.session) {
            Some(session) => self.store.session(session).await?,
            None => self.store.session_by_hash(&hash).await?,
        };
        let Some(session) = session else {
            self.index.remove(&hash);
            return Ok(None);
        };
        if !session.valid() {
            self.index.remove(&hash);
            return Ok(None);
        }
        let Some(user) = self.store.user(session.user()).await? else {
            return Ok(None);
        };
        if !user.active() {
            return Ok(None);
        }
        if !self.store.revoke_session(session.id(), "token refresh").await? {
            // lost the rotation race; the winner already minted a pair
            return Ok(None);
        }
        self.index.remove(&hash);
        self.issue(user.id(), &session.context()).await.map(Some)
    }

    /// Marks the session revoked and evicts it from the index. False iff
    /// the session is unknown.
    pub async fn revoke(&self, token: &str) -> Result<bool, AuthError> {
        let hash = Crypto::hash(token);
        let Some(session) = self.store.session_by_hash(&hash).await? else {
            return Ok(false);
        };
        self.store
            .revoke_session(session.id(), "manual revocation")
            .await?;
        self.index.remove(&hash);
        Ok(true)
    }

    /// Revokes every active session of the user in one pass. Idempotent;
    /// always succeeds.
    pub async fn revoke_all(&self, user: ID<User>) -> Result<bool, AuthError> {
        let revoked = self
            .store
            .revoke_sessions(user, "revoke all sessions")
            .await?;
        self.index.retain(|_, entry| entry.user != user);
        log::debug!("revoked {} sessions for user {}", revoked, user);
        Ok(true)
    }

    /// Physically deletes expired sessions; returns how many went.
    pub async fn sweep(&self) -> Result<u64, AuthError> {
        self.store.sweep_sessions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        ledger: Ledger,
        tokens: Tokens<Ledger>,
        user: User,
    }

    async fn fixture() -> Fixture {
        let ledger = Ledger::new();
        let user = User::new(
            "Ada".to_string(),
            "Lovelace".to_string(),
            Email::parse("ada@example.com").unwrap(),
            None,
        );
        ledger.create_user(&user, "hash").await.unwrap();
        let crypto = Arc::new(Crypto::new(
            b"test-secret",
            "warden".to_string(),
            "warden-users".to_string(),
        ));
        let tokens = Tokens::new(ledger.clone(), crypto);
        Fixture {
            ledger,
            tokens,
            user,
        }
    }

    #[tokio::test]
    async fn issue_returns_bearer_pair_and_opens_session() {
        let f = fixture().await;
        let pair = f.tokens.issue(f.user.id(), &Context::default()).await.unwrap();
        assert_eq!(pair.token_type, "Bearer");
        assert!(!pair.access_token.is_empty());
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        assert!((pair.expires_at - now - 900).abs() <= 2);
        assert_eq!(f.ledger.active_sessions_of(f.user.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn issue_embeds_resolved_grants() {
        let f = fixture().await;
        let role = Role::new("Admin".to_string(), "administrator".to_string());
        f.ledger.create_role(&role).await.unwrap();
        let read = Permission::new(
            "users.read".to_string(),
            "Read Users".to_string(),
            "User".to_string(),
            "Read".to_string(),
        );
        f.ledger.create_permission(&read).await.unwrap();
        f.ledger.grant_permission(role.id(), read.id(), None).await.unwrap();
        f.ledger.assign_role(f.user.id(), role.id(), None).await.unwrap();
        let pair = f.tokens.issue(f.user.id(), &Context::default()).await.unwrap();
        let crypto = Crypto::new(
            b"test-secret",
            "warden".to_string(),
            "warden-users".to_string(),
        );
        let claims = crypto.decode(&pair.access_token).unwrap();
        assert_eq!(claims.role, vec!["Admin"]);
        assert_eq!(claims.permission, vec!["users.read"]);
        assert_eq!(claims.permission_action, vec!["User:Read"]);
    }

    #[tokio::test]
    async fn refresh_rotates_single_use() {
        let f = fixture().await;
        let first = f.tokens.issue(f.user.id(), &Context::default()).await.unwrap();
        let second = f.tokens.refresh(&first.refresh_token).await.unwrap().unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        // the rotated-away token is dead
        assert!(f.tokens.refresh(&first.refresh_token).await.unwrap().is_none());
        // the replacement still works
        assert!(f.tokens.refresh(&second.refresh_token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn refresh_falls_back_when_index_is_cold() {
        let f = fixture().await;
        let pair = f.tokens.issue(f.user.id(), &Context::default()).await.unwrap();
        // a second issuer over the same store has an empty index
        let cold = Tokens::new(
            f.ledger.clone(),
            Arc::new(Crypto::new(
                b"test-secret",
                "warden".to_string(),
                "warden-users".to_string(),
            )),
        );
        assert!(cold.refresh(&pair.refresh_token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn refresh_rejects_unknown_and_deactivated() {
        let f = fixture().await;
        assert!(f.tokens.refresh("no-such-token").await.unwrap().is_none());
        let pair = f.tokens.issue(f.user.id(), &Context::default()).await.unwrap();
        let mut user = f.user.clone();
        user.deactivate();
        f.ledger.update_user(&user).await.unwrap();
        assert!(f.tokens.refresh(&pair.refresh_token).await.unwrap().is_none());
        // the session was not consumed by the rejected attempt
        assert_eq!(f.ledger.active_sessions_of(f.user.id()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn revoke_is_single_shot() {
        let f = fixture().await;
        let pair = f.tokens.issue(f.user.id(), &Context::default()).await.unwrap();
        assert!(f.tokens.revoke(&pair.refresh_token).await.unwrap());
        assert!(f.tokens.refresh(&pair.refresh_token).await.unwrap().is_none());
        assert!(!f.tokens.revoke("no-such-token").await.unwrap());
    }

    #[tokio::test]
    async fn revoke_all_kills_every_prior_token() {
        let f = fixture().await;
        let a = f.tokens.issue(f.user.id(), &Context::default()).await.unwrap();
        let b = f.tokens.issue(f.user.id(), &Context::default()).await.unwrap();
        assert!(f.tokens.revoke_all(f.user.id()).await.unwrap());
        assert!(f.tokens.refresh(&a.refresh_token).await.unwrap().is_none());
        assert!(f.tokens.refresh(&b.refresh_token).await.unwrap().is_none());
        // idempotent on an empty slate
        assert!(f.tokens.revoke_all(f.user.id()).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_refresh_awards_at_most_one_pair() {
        let f = fixture().await;
        let pair = f.tokens.issue(f.user.id(), &Context::default()).await.unwrap();
        let tokens = Arc::new(f.tokens);
        let mut winners = 0;
        let races: Vec<_> = (0..8)
            .map(|_| {
                let tokens = tokens.clone();
                let token = pair.refresh_token.clone();
                tokio::spawn(async move { tokens.refresh(&token).await.unwrap() })
            })
            .collect();
        for race in races {
            if race.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
