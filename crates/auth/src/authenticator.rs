//! The authenticator: configuration plus Login / ForceLogin / Check / Logout.
//!
//! An [`Authenticator`] holds only immutable configuration. Everything that
//! belongs to one request (its session key, its token, the identity it
//! resolves to) is passed in and handed back, never stored here, so a single
//! instance can serve any number of concurrent requests.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::claims::{TokenClaims, TokenConfig};
use crate::error::{AuthError, AuthResult};
use crate::identity::{AuthUser, Identity};
use crate::password::verify_password;
use crate::session::{SessionKey, SessionStore, USER_ID_KEY, USER_KEY, get_json, put_json};
use crate::tenant::OrgDirectory;
use crate::token::HmacTokens;

/// Environment variable holding the HMAC secret.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";

pub const DEFAULT_HOME_ROUTE: &str = "/home";
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Credentials carried by one inbound request, extracted by the transport.
#[derive(Debug, Clone, Default)]
pub struct CheckRequest {
    /// Session key from the session cookie, if any.
    pub session: Option<SessionKey>,
    /// Raw value of the `jwt` cookie.
    pub jwt_cookie: Option<String>,
    /// Raw value of the `Authorization` header.
    pub authorization: Option<String>,
}

impl CheckRequest {
    /// Token from the `jwt` cookie (minus a literal `jwt=` prefix), else from
    /// the `Authorization` header (minus a literal `bearer ` prefix).
    ///
    /// A present cookie always wins, so an empty `jwt` cookie yields no
    /// token even when the header carries one.
    pub fn token(&self) -> Option<String> {
        let token = match self.jwt_cookie.as_deref() {
            Some(cookie) => cookie.strip_prefix("jwt=").unwrap_or(cookie),
            None => {
                let header = self.authorization.as_deref()?;
                header.strip_prefix("bearer ").unwrap_or(header)
            }
        };
        (!token.is_empty()).then(|| token.to_string())
    }
}

/// What a successful login established.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Issued token, when the token strategy is enabled.
    pub token: Option<String>,
    /// Key the session now lives under, when the session strategy is
    /// enabled. Always differs from the key the caller passed in.
    pub session: Option<SessionKey>,
}

struct TokenStrategy {
    config: TokenConfig,
    tokens: HmacTokens,
}

/// Immutable authenticator configuration.
pub struct AuthConfig {
    session: Option<Arc<dyn SessionStore>>,
    token: Option<TokenStrategy>,
    home_route: String,
    login_route: String,
    orgs: Option<Arc<dyn OrgDirectory>>,
}

/// Builder for [`Authenticator`].
///
/// Enable the session strategy, the token strategy, or both.
pub struct AuthConfigBuilder {
    session: Option<Arc<dyn SessionStore>>,
    token: Option<TokenConfig>,
    home_route: String,
    login_route: String,
    orgs: Option<Arc<dyn OrgDirectory>>,
}

impl Default for AuthConfigBuilder {
    fn default() -> Self {
        Self {
            session: None,
            token: None,
            home_route: DEFAULT_HOME_ROUTE.to_string(),
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            orgs: None,
        }
    }
}

impl AuthConfigBuilder {
    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session = Some(store);
        self
    }

    pub fn with_token_config(mut self, config: TokenConfig) -> Self {
        self.token = Some(config);
        self
    }

    pub fn with_home_route(mut self, route: impl Into<String>) -> Self {
        self.home_route = route.into();
        self
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Data-access handle used by the tenant resolver.
    pub fn with_org_directory(mut self, orgs: Arc<dyn OrgDirectory>) -> Self {
        self.orgs = Some(orgs);
        self
    }

    /// Finish configuration.
    ///
    /// Fails with [`AuthError::NoSecret`] when the token strategy is enabled
    /// and neither an explicit secret nor `JWT_SECRET` is available; callers
    /// are expected to abort start-up on that error.
    pub fn build(self) -> AuthResult<Authenticator> {
        let token = match self.token {
            Some(config) => {
                let secret = token_secret(&config, std::env::var(JWT_SECRET_ENV).ok())?;
                let mut tokens = HmacTokens::new(secret.as_bytes());
                if let Some(iss) = config.claims.iss.as_deref() {
                    tokens = tokens.with_issuer(iss);
                }
                if let Some(aud) = config.claims.aud.as_deref() {
                    tokens = tokens.with_audience(aud);
                }
                Some(TokenStrategy { config, tokens })
            }
            None => None,
        };

        if self.session.is_none() && token.is_none() {
            warn!("authenticator built without a session or token strategy; every check will fail");
        }

        Ok(Authenticator {
            config: AuthConfig {
                session: self.session,
                token,
                home_route: self.home_route,
                login_route: self.login_route,
                orgs: self.orgs,
            },
        })
    }
}

fn token_secret(config: &TokenConfig, env_secret: Option<String>) -> AuthResult<String> {
    config
        .secret
        .clone()
        .or(env_secret)
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::NoSecret)
}

/// Process-wide authenticator.
pub struct Authenticator {
    config: AuthConfig,
}

impl Authenticator {
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    pub fn home_route(&self) -> &str {
        &self.config.home_route
    }

    pub fn login_route(&self) -> &str {
        &self.config.login_route
    }

    pub fn session_store(&self) -> Option<&Arc<dyn SessionStore>> {
        self.config.session.as_ref()
    }

    pub fn org_directory(&self) -> Option<&Arc<dyn OrgDirectory>> {
        self.config.orgs.as_ref()
    }

    pub fn uses_sessions(&self) -> bool {
        self.config.session.is_some()
    }

    pub fn uses_tokens(&self) -> bool {
        self.config.token.is_some()
    }

    /// Verify `username`/`password` against `identity` and establish it.
    ///
    /// In session mode the session is moved to a new key (see
    /// [`LoginOutcome::session`]); the caller must hand that key back to the
    /// client.
    pub async fn login(
        &self,
        session: Option<&SessionKey>,
        identity: &(impl Identity + ?Sized),
        username: &str,
        password: &str,
    ) -> AuthResult<LoginOutcome> {
        let stored_username = identity.username();
        let stored_hash = identity.password_hash();

        if stored_username.is_empty() && stored_hash.is_empty() {
            return Err(AuthError::InvalidCredentials);
        }
        if stored_username != username {
            return Err(AuthError::UserNotFound);
        }
        if !verify_password(stored_hash, password) {
            return Err(AuthError::InvalidCredentials);
        }

        self.establish(session, identity).await
    }

    /// Establish `identity` without comparing passwords.
    ///
    /// Only for identities the caller has already verified (e.g. right after
    /// registration); never call this with unvalidated user input.
    pub async fn force_login(
        &self,
        session: Option<&SessionKey>,
        identity: &(impl Identity + ?Sized),
    ) -> AuthResult<LoginOutcome> {
        if identity.username().is_empty() || identity.password_hash().is_empty() {
            return Err(AuthError::LoginFailed);
        }

        self.establish(session, identity).await
    }

    async fn establish(
        &self,
        session: Option<&SessionKey>,
        identity: &(impl Identity + ?Sized),
    ) -> AuthResult<LoginOutcome> {
        if self.config.session.is_none() && self.config.token.is_none() {
            return Err(AuthError::NoStrategy);
        }

        let snapshot = AuthUser::from_identity(identity);

        let session = match &self.config.session {
            Some(store) => {
                let presented = session.ok_or(AuthError::NoSession)?;
                let key = store.regenerate(presented).await?;
                put_json(store.as_ref(), &key, USER_KEY, &snapshot).await?;
                put_json(store.as_ref(), &key, USER_ID_KEY, &snapshot.id).await?;
                Some(key)
            }
            None => None,
        };

        let token = match &self.config.token {
            Some(strategy) => {
                let claims = TokenClaims::for_identity(
                    &strategy.config.claims,
                    strategy.config.ttl,
                    identity,
                    Utc::now(),
                );
                Some(strategy.tokens.issue(&claims)?)
            }
            None => None,
        };

        debug!(user_id = %snapshot.id, token = token.is_some(), "identity established");
        Ok(LoginOutcome { token, session })
    }

    /// Resolve the caller of one request.
    ///
    /// Consults the session strategy when configured, otherwise the token
    /// strategy; fails closed with [`AuthError::NoStrategy`] when neither is.
    pub async fn check(&self, request: &CheckRequest) -> AuthResult<AuthUser> {
        if let Some(store) = &self.config.session {
            let key = request.session.as_ref().ok_or(AuthError::NoUserSession)?;
            if !store.exists(key, USER_ID_KEY).await? {
                return Err(AuthError::NoUserSession);
            }
            return get_json::<AuthUser>(store.as_ref(), key, USER_KEY)
                .await?
                .ok_or(AuthError::NoUserSession);
        }

        if let Some(strategy) = &self.config.token {
            let token = request.token().ok_or(AuthError::MissingToken)?;
            let claims = strategy.tokens.verify(&token)?;
            let sub = claims
                .registered
                .sub
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AuthError::TokenParse("token has no subject".to_string()))?;
            return Ok(AuthUser::new(sub, claims.username.unwrap_or_default()));
        }

        Err(AuthError::NoStrategy)
    }

    /// Store a display snapshot in the session (no-op without sessions).
    pub async fn persist_user_session(
        &self,
        session: Option<&SessionKey>,
        user: &AuthUser,
    ) -> AuthResult<()> {
        if let (Some(store), Some(key)) = (&self.config.session, session) {
            put_json(store.as_ref(), key, USER_KEY, user).await?;
        }
        Ok(())
    }

    /// End the authenticated session. Token mode is stateless, so there is
    /// nothing to revoke there.
    pub async fn logout(&self, session: Option<&SessionKey>) -> AuthResult<()> {
        match &self.config.session {
            Some(store) => {
                let key = session.ok_or(AuthError::NoSession)?;
                store.destroy(key).await?;
                Ok(())
            }
            None if self.config.token.is_some() => Ok(()),
            None => Err(AuthError::NoStrategy),
        }
    }
}

impl core::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Authenticator")
            .field("sessions", &self.uses_sessions())
            .field("tokens", &self.uses_tokens())
            .field("home_route", &self.config.home_route)
            .field("login_route", &self.config.login_route)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::RegisteredClaims;
    use crate::identity::CredUser;
    use crate::password::hash_password_with_cost;
    use crate::session::InMemorySessionStore;
    use proptest::prelude::*;

    const SECRET: &str = "test-secret";

    fn user(password: &str) -> CredUser {
        CredUser::new(
            7u64,
            "alice@example.com",
            hash_password_with_cost(password, 4).unwrap(),
        )
    }

    fn token_auth() -> Authenticator {
        Authenticator::builder()
            .with_token_config(TokenConfig::new(RegisteredClaims::default()).with_secret(SECRET))
            .build()
            .unwrap()
    }

    fn session_auth() -> (Authenticator, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        let auth = Authenticator::builder()
            .with_session_store(store.clone())
            .build()
            .unwrap();
        (auth, store)
    }

    fn bearer(token: &str) -> CheckRequest {
        CheckRequest {
            authorization: Some(format!("bearer {token}")),
            ..Default::default()
        }
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread().build().unwrap()
    }

    #[tokio::test]
    async fn login_checks_username_then_password() {
        let auth = token_auth();
        let alice = user("pw-123");

        let outcome = auth.login(None, &alice, "alice@example.com", "pw-123").await.unwrap();
        assert!(outcome.token.is_some());
        assert_eq!(outcome.session, None);

        let err = auth.login(None, &alice, "alice@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));

        let err = auth.login(None, &alice, "bob@example.com", "pw-123").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));

        let empty = CredUser::new(1u64, "", "");
        let err = auth.login(None, &empty, "", "").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_without_stored_hash_fails_closed() {
        let auth = token_auth();
        let no_hash = CredUser::new(1u64, "alice", "");
        let err = auth.login(None, &no_hash, "alice", "").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn session_login_then_check_resolves_snapshot() {
        let (auth, store) = session_auth();
        let key = SessionKey::new("s-1");

        let outcome = auth
            .login(Some(&key), &user("pw"), "alice@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(outcome.token, None);
        let renewed = outcome.session.unwrap();
        assert!(store.exists(&renewed, USER_ID_KEY).await.unwrap());

        let resolved = auth
            .check(&CheckRequest {
                session: Some(renewed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(resolved, AuthUser::new(7u64, "alice@example.com"));
    }

    #[tokio::test]
    async fn login_never_authenticates_the_presented_key() {
        let (auth, store) = session_auth();
        let planted = SessionKey::new("attacker-chosen");
        put_json(store.as_ref(), &planted, "message", "hello").await.unwrap();

        let outcome = auth.force_login(Some(&planted), &user("pw")).await.unwrap();
        let renewed = outcome.session.unwrap();
        assert_ne!(renewed, planted);

        let on_planted = CheckRequest {
            session: Some(planted.clone()),
            ..Default::default()
        };
        assert!(matches!(auth.check(&on_planted).await, Err(AuthError::NoUserSession)));
        assert!(!store.contains(&planted).await.unwrap());

        // Values set before login travel with the session.
        let message: Option<String> = get_json(store.as_ref(), &renewed, "message").await.unwrap();
        assert_eq!(message.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn session_login_requires_a_session_key() {
        let (auth, _) = session_auth();
        let err = auth.force_login(None, &user("pw")).await.unwrap_err();
        assert!(matches!(err, AuthError::NoSession));
    }

    #[tokio::test]
    async fn session_check_without_login_fails() {
        let (auth, _) = session_auth();
        let req = CheckRequest {
            session: Some(SessionKey::new("fresh")),
            ..Default::default()
        };
        assert!(matches!(auth.check(&req).await, Err(AuthError::NoUserSession)));
        assert!(matches!(
            auth.check(&CheckRequest::default()).await,
            Err(AuthError::NoUserSession)
        ));
    }

    #[tokio::test]
    async fn logout_destroys_the_session() {
        let (auth, _) = session_auth();
        let key = auth
            .force_login(Some(&SessionKey::new("s-1")), &user("pw"))
            .await
            .unwrap()
            .session
            .unwrap();

        auth.logout(Some(&key)).await.unwrap();

        let req = CheckRequest {
            session: Some(key),
            ..Default::default()
        };
        assert!(matches!(auth.check(&req).await, Err(AuthError::NoUserSession)));
    }

    #[tokio::test]
    async fn persisted_snapshot_replaces_the_session_user() {
        let (auth, _) = session_auth();
        let key = auth
            .force_login(Some(&SessionKey::new("s-1")), &user("pw"))
            .await
            .unwrap()
            .session
            .unwrap();

        let renamed = AuthUser::new(7u64, "alice@new.example.com");
        auth.persist_user_session(Some(&key), &renamed).await.unwrap();

        let req = CheckRequest {
            session: Some(key),
            ..Default::default()
        };
        assert_eq!(auth.check(&req).await.unwrap(), renamed);

        // No-op without a session strategy.
        token_auth().persist_user_session(None, &renamed).await.unwrap();
    }

    #[tokio::test]
    async fn token_round_trip_yields_identity_subject() {
        let auth = token_auth();
        let token = auth.force_login(None, &user("pw")).await.unwrap().token.unwrap();

        let resolved = auth.check(&bearer(&token)).await.unwrap();
        assert_eq!(resolved.id.as_str(), "7");
        assert_eq!(resolved.username, "alice@example.com");
    }

    #[tokio::test]
    async fn token_from_cookie_takes_precedence() {
        let auth = token_auth();
        let token = auth.force_login(None, &user("pw")).await.unwrap().token.unwrap();

        let req = CheckRequest {
            jwt_cookie: Some(format!("jwt={token}")),
            authorization: Some("bearer garbage".to_string()),
            ..Default::default()
        };
        assert!(auth.check(&req).await.is_ok());
    }

    #[tokio::test]
    async fn token_check_failures() {
        let auth = token_auth();
        assert!(matches!(
            auth.check(&CheckRequest::default()).await,
            Err(AuthError::MissingToken)
        ));

        let foreign = Authenticator::builder()
            .with_token_config(TokenConfig::default().with_secret("other-secret"))
            .build()
            .unwrap();
        let token = foreign.force_login(None, &user("pw")).await.unwrap().token.unwrap();
        assert!(matches!(
            auth.check(&bearer(&token)).await,
            Err(AuthError::TokenParse(_))
        ));
    }

    #[test]
    fn empty_jwt_cookie_shadows_the_header() {
        let req = CheckRequest {
            jwt_cookie: Some(String::new()),
            authorization: Some("bearer abc".to_string()),
            ..Default::default()
        };
        assert_eq!(req.token(), None);
    }

    #[test]
    fn bearer_prefix_is_case_sensitive() {
        let req = CheckRequest {
            authorization: Some("Bearer abc".to_string()),
            ..Default::default()
        };
        assert_eq!(req.token().as_deref(), Some("Bearer abc"));
        assert_eq!(bearer("abc").token().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn no_strategy_fails_closed() {
        let auth = Authenticator::builder().build().unwrap();
        assert!(matches!(
            auth.check(&CheckRequest::default()).await,
            Err(AuthError::NoStrategy)
        ));
        assert!(matches!(
            auth.force_login(None, &user("pw")).await,
            Err(AuthError::NoStrategy)
        ));
    }

    #[test]
    fn secret_resolution() {
        let explicit = TokenConfig::default().with_secret("explicit");
        assert_eq!(token_secret(&explicit, Some("env".into())).unwrap(), "explicit");
        assert_eq!(token_secret(&TokenConfig::default(), Some("env".into())).unwrap(), "env");
        assert!(matches!(
            token_secret(&TokenConfig::default(), None),
            Err(AuthError::NoSecret)
        ));
        assert!(matches!(
            token_secret(&TokenConfig::default(), Some(String::new())),
            Err(AuthError::NoSecret)
        ));
    }

    #[tokio::test]
    async fn concurrent_checks_never_leak_identities() {
        let (auth, _) = session_auth();
        let auth = Arc::new(auth);

        let mut handles = Vec::new();
        for i in 0..32u64 {
            let auth = auth.clone();
            handles.push(tokio::spawn(async move {
                let identity = CredUser::new(i, format!("user-{i}"), "$2b$04$placeholder");
                let key = auth
                    .force_login(Some(&SessionKey::new(format!("session-{i}"))), &identity)
                    .await
                    .unwrap()
                    .session
                    .unwrap();

                let req = CheckRequest {
                    session: Some(key),
                    ..Default::default()
                };
                for _ in 0..10 {
                    let resolved = auth.check(&req).await.unwrap();
                    assert_eq!(resolved.id.as_str(), i.to_string());
                    tokio::task::yield_now().await;
                }
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 24,
            ..ProptestConfig::default()
        })]

        /// Property: the right password logs in, any other one is rejected.
        #[test]
        fn login_accepts_only_the_stored_password(
            username in "[a-z]{1,12}",
            password in "[ -~]{1,24}",
            other in "[ -~]{1,24}",
        ) {
            prop_assume!(password != other);
            let auth = token_auth();
            let identity = CredUser::new(1u64, username.clone(), hash_password_with_cost(&password, 4).unwrap());

            runtime().block_on(async {
                prop_assert!(auth.login(None, &identity, &username, &password).await.is_ok());
                prop_assert!(matches!(
                    auth.login(None, &identity, &username, &other).await,
                    Err(AuthError::InvalidCredentials)
                ));
                Ok::<(), TestCaseError>(())
            })?;
        }

        /// Property: ForceLogin ignores the hash content and only checks presence.
        #[test]
        fn force_login_only_checks_field_presence(
            username in "[a-z]{0,8}",
            hash in "[ -~]{0,16}",
        ) {
            let auth = token_auth();
            let identity = CredUser::new(1u64, username.clone(), hash.clone());
            let result = runtime().block_on(auth.force_login(None, &identity));

            if username.is_empty() || hash.is_empty() {
                prop_assert!(matches!(result, Err(AuthError::LoginFailed)));
            } else {
                prop_assert!(result.unwrap().token.is_some());
            }
        }
    }
}
