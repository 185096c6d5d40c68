use super::*;
use std::sync::Arc;
use warden_core::ID;
use warden_core::Unique;

/// Application façade consumed by the presentation layer.
///
/// Orchestrates the authenticator, token issuer, resolver, and rate
/// limiter over one store. Domain events collect in the outbox during an
/// operation and are published fire-and-forget after it commits; unexpected
/// failures are logged here and surfaced as opaque messages.
pub struct Service<S> {
    store: S,
    tokens: Tokens<S>,
    auth: Authenticator<S>,
    access: Access<S>,
    gate: RateLimiter,
    outbox: Arc<Outbox>,
    notifier: Box<dyn Notify + Send + Sync>,
}

impl<S: Store> Service<S> {
    pub fn new(store: S, crypto: Crypto) -> Self {
        let crypto = Arc::new(crypto);
        let outbox = Arc::new(Outbox::default());
        Self {
            tokens: Tokens::new(store.clone(), crypto),
            auth: Authenticator::new(store.clone()),
            access: Access::new(store.clone(), outbox.clone()),
            gate: RateLimiter::new(),
            outbox,
            notifier: Box::new(LogNotifier),
            store,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notify + Send + Sync>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn tokens(&self) -> &Tokens<S> {
        &self.tokens
    }
    pub fn access(&self) -> &Access<S> {
        &self.access
    }

    pub async fn register(&self, command: Register) -> AuthenticationResult {
        match self.try_register(command).await {
            Ok(result) => {
                self.dispatch();
                result
            }
            Err(AuthError::Unexpected(detail)) => {
                log::error!("registration failed: {}", detail);
                AuthenticationResult::err("An error occurred during registration")
            }
            Err(e) => AuthenticationResult::err(e.to_string()),
        }
    }

    async fn try_register(&self, command: Register) -> Result<AuthenticationResult, AuthError> {
        if command.password != command.confirm_password {
            return Err(AuthError::Validation("Passwords do not match".to_string()));
        }
        let email = Email::parse(&command.email)?;
        if !self.auth.is_email_available(&email).await? {
            return Err(AuthError::Conflict("Email already exists".to_string()));
        }
        let phone = command
            .phone
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(PhoneNumber::parse)
            .transpose()?;
        if let Some(ref phone) = phone {
            if !self.auth.is_phone_available(phone).await? {
                return Err(AuthError::Conflict(
                    "Phone number already exists".to_string(),
                ));
            }
        }
        let hashword = password::hash(&command.password)?;
        let user = User::new(command.first_name, command.last_name, email, phone);
        // user row and first session commit or roll back together
        self.store.begin().await?;
        let opened = self.open_account(&user, &hashword).await;
        let tokens = match opened {
            Ok(tokens) => {
                self.store.commit().await?;
                tokens
            }
            Err(e) => {
                self.store.rollback().await?;
                return Err(e);
            }
        };
        self.outbox.push(Event::UserRegistered {
            user: user.id(),
            email: user.email().to_string(),
        });
        log::info!("registered user {}", user.id());
        Ok(AuthenticationResult::ok(tokens, UserDto::from(&user)))
    }

    async fn open_account(&self, user: &User, hashword: &str) -> Result<TokenResult, AuthError> {
        self.store.create_user(user, hashword).await?;
        self.tokens.issue(user.id(), &Context::default()).await
    }

    pub async fn login(&self, command: Login) -> AuthenticationResult {
        let ip = command.ip.clone().unwrap_or_else(|| "unknown".to_string());
        if !self.gate.allow_login(&ip, Some(command.identifier.as_str())) {
            log::warn!("rate limited login from {}", ip);
            return AuthenticationResult::err("Too many login attempts, try again later");
        }
        match self.try_login(command).await {
            Ok(result) => {
                self.dispatch();
                result
            }
            Err(AuthError::Unexpected(detail)) => {
                log::error!("login failed: {}", detail);
                AuthenticationResult::err("An error occurred during login")
            }
            Err(e) => AuthenticationResult::err(e.to_string()),
        }
    }

    async fn try_login(&self, command: Login) -> Result<AuthenticationResult, AuthError> {
        let mut user = self
            .auth
            .authenticate(&command.identifier, &command.password)
            .await?;
        user.record_login();
        self.store.update_user(&user).await?;
        let context = Context {
            device: command.device,
            ip: command.ip,
            agent: command.agent,
        };
        let tokens = self.tokens.issue(user.id(), &context).await?;
        self.outbox.push(Event::UserLoggedIn {
            user: user.id(),
            ip: context.ip.clone().unwrap_or_else(|| "Unknown".to_string()),
            agent: context.agent.clone().unwrap_or_else(|| "Unknown".to_string()),
        });
        Ok(AuthenticationResult::ok(tokens, UserDto::from(&user)))
    }

    /// `None` is the steady-state answer for a dead token; errors never
    /// escape.
    pub async fn refresh(&self, command: Refresh) -> Option<TokenResult> {
        match self.tokens.refresh(&command.refresh_token).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("token refresh failed: {}", e);
                None
            }
        }
    }

    pub async fn logout(&self, command: Logout) -> bool {
        let hash = Crypto::hash(&command.refresh_token);
        let session = match self.store.session_by_hash(&hash).await {
            Ok(session) => session,
            Err(e) => {
                log::error!("logout lookup failed: {}", e);
                return false;
            }
        };
        match self.tokens.revoke(&command.refresh_token).await {
            Ok(true) => {
                if let Some(session) = session {
                    self.outbox.push(Event::UserLoggedOut {
                        user: session.user(),
                        session: session.id(),
                    });
                    self.dispatch();
                }
                true
            }
            Ok(false) => false,
            Err(e) => {
                log::error!("logout failed: {}", e);
                false
            }
        }
    }

    /// Rehashes the credential and revokes every open session, so stolen
    /// refresh tokens die with the old password.
    pub async fn change_password(
        &self,
        user: ID<User>,
        current: &str,
        replacement: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .store
            .user(user)
            .await?
            .ok_or(AuthError::NotFound("User"))?;
        self.auth
            .authenticate(user.email().as_str(), current)
            .await?;
        let hashword = password::hash(replacement)?;
        self.store.rehash_user(user.id(), &hashword).await?;
        self.tokens.revoke_all(user.id()).await?;
        self.outbox.push(Event::PasswordChanged { user: user.id() });
        self.dispatch();
        Ok(())
    }

    pub async fn users(&self, query: UserQuery) -> Result<Page<UserDto>, AuthError> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(warden_core::DEFAULT_PAGE_SIZE)
            .clamp(1, warden_core::MAX_PAGE_SIZE);
        let filter = UserFilter {
            search: query.search,
            role: query.role,
            active: query.active,
        };
        let sort = UserSort::parse(query.sort_by.as_deref());
        let direction = Direction::parse(query.sort_direction.as_deref());
        self.store
            .page_users(&filter, sort, direction, page, page_size)
            .await
            .map(|page| page.map(|user| UserDto::from(&user)))
    }

    pub async fn roles(&self, query: ListQuery) -> Result<Page<RoleDto>, AuthError> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(warden_core::DEFAULT_PAGE_SIZE)
            .clamp(1, warden_core::MAX_PAGE_SIZE);
        self.store
            .page_roles(query.search.as_deref(), page, page_size)
            .await
            .map(|page| page.map(|role| RoleDto::from(&role)))
    }

    pub async fn permissions(&self, query: ListQuery) -> Result<Page<PermissionDto>, AuthError> {
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query
            .page_size
            .unwrap_or(warden_core::DEFAULT_PAGE_SIZE)
            .clamp(1, warden_core::MAX_PAGE_SIZE);
        self.store
            .page_permissions(query.search.as_deref(), page, page_size)
            .await
            .map(|page| page.map(|permission| PermissionDto::from(&permission)))
    }

    pub async fn sweep_sessions(&self) -> Result<u64, AuthError> {
        self.tokens.sweep().await
    }

    /// Drains the outbox and publishes each event, fire-and-forget.
    fn dispatch(&self) {
        for event in self.outbox.drain() {
            self.notifier.publish(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> (Ledger, Service<Ledger>) {
        let ledger = Ledger::new();
        let crypto = Crypto::new(
            b"test-secret",
            "warden".to_string(),
            "warden-users".to_string(),
        );
        (ledger.clone(), Service::new(ledger, crypto))
    }

    fn registration(email: &str) -> Register {
        Register {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            phone: None,
            password: "Abcdef1!".to_string(),
            confirm_password: "Abcdef1!".to_string(),
        }
    }

    fn login(identifier: &str, password: &str) -> Login {
        Login {
            identifier: identifier.to_string(),
            password: password.to_string(),
            device: None,
            ip: None,
            agent: None,
        }
    }

    #[tokio::test]
    async fn register_returns_token_pair() {
        let (_, service) = service();
        let result = service.register(registration("a@b.com")).await;
        assert!(result.success, "{:?}", result.error);
        assert!(result.access_token.is_some());
        assert!(result.refresh_token.is_some());
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        assert!((result.expires_at.unwrap() - now - 900).abs() <= 2);
        assert_eq!(result.user.unwrap().email, "a@b.com");
    }

    #[tokio::test]
    async fn register_rejects_duplicates_and_weak_passwords() {
        let (_, service) = service();
        assert!(service.register(registration("a@b.com")).await.success);
        let duplicate = service.register(registration("a@b.com")).await;
        assert!(!duplicate.success);
        assert_eq!(duplicate.error.as_deref(), Some("Email already exists"));
        let mut weak = registration("weak@b.com");
        weak.password = "abcdef1!".to_string();
        weak.confirm_password = "abcdef1!".to_string();
        let weak = service.register(weak).await;
        assert!(!weak.success);
        assert!(weak.error.unwrap().contains("uppercase"));
        let mut mismatched = registration("other@b.com");
        mismatched.confirm_password = "Different1!".to_string();
        let mismatched = service.register(mismatched).await;
        assert_eq!(mismatched.error.as_deref(), Some("Passwords do not match"));
    }

    #[tokio::test]
    async fn wrong_password_fails_without_side_effects() {
        let (ledger, service) = service();
        let registered = service.register(registration("a@b.com")).await;
        let user: ID<User> = ID::from(registered.user.unwrap().id);
        let before = ledger.sessions_of(user).await.unwrap().len();
        let result = service.login(login("a@b.com", "Wrong1!aa")).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Invalid credentials"));
        assert!(result.access_token.is_none());
        assert_eq!(ledger.sessions_of(user).await.unwrap().len(), before);
    }

    #[tokio::test]
    async fn deactivated_account_reports_distinctly() {
        let (ledger, service) = service();
        let registered = service.register(registration("a@b.com")).await;
        let id: ID<User> = ID::from(registered.user.unwrap().id);
        let mut user = ledger.user(id).await.unwrap().unwrap();
        user.deactivate();
        ledger.update_user(&user).await.unwrap();
        let result = service.login(login("a@b.com", "Abcdef1!")).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Account is deactivated"));
    }

    #[tokio::test]
    async fn login_issues_and_records_last_login() {
        let (ledger, service) = service();
        let registered = service.register(registration("a@b.com")).await;
        let id: ID<User> = ID::from(registered.user.unwrap().id);
        let result = service.login(login("a@b.com", "Abcdef1!")).await;
        assert!(result.success);
        assert!(ledger.user(id).await.unwrap().unwrap().last_login().is_some());
    }

    #[tokio::test]
    async fn sixth_attempt_is_rate_limited_even_with_good_credentials() {
        let (_, service) = service();
        service.register(registration("a@b.com")).await;
        for _ in 0..5 {
            let mut attempt = login("a@b.com", "Abcdef1!");
            attempt.ip = Some("10.0.0.1".to_string());
            // empty identifier skips the per-identifier gate, leaving the
            // IP gate alone under test
            attempt.identifier = String::new();
            service.login(attempt).await;
        }
        let mut sixth = login("a@b.com", "Abcdef1!");
        sixth.ip = Some("10.0.0.1".to_string());
        let result = service.login(sixth).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Too many login attempts"));
    }

    #[tokio::test]
    async fn refresh_and_logout_round_trip() {
        let (_, service) = service();
        let registered = service.register(registration("a@b.com")).await;
        let first = registered.refresh_token.unwrap();
        let second = service
            .refresh(Refresh {
                refresh_token: first.clone(),
            })
            .await
            .unwrap();
        assert!(
            service
                .refresh(Refresh {
                    refresh_token: first
                })
                .await
                .is_none()
        );
        assert!(service.logout(Logout {
            refresh_token: second.refresh_token.clone()
        })
        .await);
        assert!(
            service
                .refresh(Refresh {
                    refresh_token: second.refresh_token
                })
                .await
                .is_none()
        );
        assert!(!service.logout(Logout {
            refresh_token: "no-such-token".to_string()
        })
        .await);
    }

    #[tokio::test]
    async fn change_password_revokes_open_sessions() {
        let (_, service) = service();
        let registered = service.register(registration("a@b.com")).await;
        let id: ID<User> = ID::from(registered.user.unwrap().id);
        let token = registered.refresh_token.unwrap();
        service.change_password(id, "Abcdef1!", "Ghijkl2@").await.unwrap();
        assert!(
            service
                .refresh(Refresh {
                    refresh_token: token
                })
                .await
                .is_none()
        );
        let relogin = service.login(login("a@b.com", "Ghijkl2@")).await;
        assert!(relogin.success);
    }

    #[tokio::test]
    async fn listing_pages_roles_and_permissions() {
        let (ledger, service) = service();
        for name in ["Admin", "Manager", "User"] {
            ledger
                .create_role(&Role::new(name.to_string(), format!("{} role", name)))
                .await
                .unwrap();
        }
        ledger
            .create_permission(&Permission::new(
                "users.read".to_string(),
                "Read Users".to_string(),
                "User".to_string(),
                "Read".to_string(),
            ))
            .await
            .unwrap();
        let roles = service
            .roles(ListQuery {
                page_size: Some(2),
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(roles.total, 3);
        assert_eq!(roles.items[0].name, "Admin");
        let hit = service
            .permissions(ListQuery {
                search: Some("read".to_string()),
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(hit.total, 1);
        assert_eq!(hit.items[0].resource, "User");
    }

    #[tokio::test]
    async fn listing_pages_users() {
        let (_, service) = service();
        for i in 0..3 {
            assert!(
                service
                    .register(registration(&format!("user{}@b.com", i)))
                    .await
                    .success
            );
        }
        let page = service
            .users(UserQuery {
                page_size: Some(2),
                sort_by: Some("email".to_string()),
                sort_direction: Some("asc".to_string()),
                ..UserQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].email, "user0@b.com");
    }
}
