use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::OsRng,
    },
};
use tracing::info;

use crate::data::oauth_state_repository::{NewOAuthState, OAuthStateRepository};
use crate::data::user_repository::{NewUser, UserRepository};
use crate::domain::error::{DomainError, validate_positive_id};
use crate::domain::user::{AuthProvider, LoginRequest, RegisterRequest, SetUsernameRequest, User};
use crate::infrastructure::jwt::JwtService;
use crate::infrastructure::oauth::OAuthGateway;

/// How long an OAuth sign-in may take between redirect and callback.
pub(crate) const OAUTH_STATE_TTL_SECONDS: i64 = 10 * 60;

#[derive(Debug, Clone)]
pub(crate) struct AuthResult {
    pub(crate) user: User,
    pub(crate) access_token: String,
}

pub(crate) struct AuthService<R, S, G>
where
    R: UserRepository,
    S: OAuthStateRepository,
    G: OAuthGateway,
{
    repo: R,
    states: S,
    oauth: G,
    jwt: JwtService,
}

impl<R, S, G> AuthService<R, S, G>
where
    R: UserRepository,
    S: OAuthStateRepository,
    G: OAuthGateway,
{
    const DUMMY_PASSWORD_HASH: &'static str = "$argon2id$v=19$m=19456,t=2,p=1$MDEyMzQ1Njc4OWFiY2RlZg$gwN6hT1sNdk9kI95f7n2Gl3fL0qRmBf2Ffkj2r90/0M";

    pub(crate) fn new(repo: R, states: S, oauth: G, jwt: JwtService) -> Self {
        Self {
            repo,
            states,
            oauth,
            jwt,
        }
    }

    pub(crate) fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    pub(crate) async fn register(&self, req: RegisterRequest) -> Result<AuthResult, DomainError> {
        let req = req.validate()?;

        let password_hash = self.hash_password(&req.password)?;

        let new_user = Self::into_new_user(req, password_hash);
        let user = self.repo.create_user(new_user).await?;
        info!(user_id = user.id, "user registered");

        self.issue(user)
    }

    pub(crate) async fn login(&self, req: LoginRequest) -> Result<AuthResult, DomainError> {
        let req = req.validate()?;

        let user_creds = match self.repo.find_by_username(&req.username).await? {
            Some(user_creds) => user_creds,
            None => {
                // Keep the response time close to the existing-user path.
                match self.verify_password(&req.password, Self::DUMMY_PASSWORD_HASH) {
                    Ok(()) | Err(DomainError::InvalidCredentials) => {}
                    Err(err) => return Err(err),
                }
                return Err(DomainError::InvalidCredentials);
            }
        };

        self.verify_password(&req.password, &user_creds.password_hash)?;

        self.issue(user_creds.user)
    }

    /// Starts an OAuth sign-in and returns the provider URL to redirect the browser to.
    pub(crate) async fn oauth_authorize(&self, provider: AuthProvider) -> Result<String, DomainError> {
        if !provider.is_oauth() {
            return Err(DomainError::Unsupported(format!("oauth provider '{provider}'")));
        }
        let redirect = self.oauth.authorize(provider)?;
        self.states
            .save_state(NewOAuthState {
                state: redirect.state,
                provider,
                pkce_verifier: redirect.pkce_verifier,
                ttl_seconds: OAUTH_STATE_TTL_SECONDS,
            })
            .await?;
        Ok(redirect.url)
    }

    pub(crate) async fn oauth_callback(
        &self,
        provider: AuthProvider,
        code: &str,
        state: &str,
    ) -> Result<AuthResult, DomainError> {
        if !provider.is_oauth() {
            return Err(DomainError::Unsupported(format!("oauth provider '{provider}'")));
        }
        let (code, state) = (code.trim(), state.trim());
        if code.is_empty() {
            return Err(DomainError::Validation {
                field: "code",
                message: "must not be empty",
            });
        }

        // The state is consumed before anything else so it can never be replayed.
        let pkce_verifier = self
            .states
            .consume_state(state, provider)
            .await?
            .ok_or(DomainError::Validation {
                field: "state",
                message: "invalid or expired oauth state",
            })?;

        let profile = self
            .oauth
            .fetch_profile(provider, code, &pkce_verifier)
            .await?
            .validate()?;
        let user = self.repo.upsert_oauth_profile(profile).await?;
        info!(user_id = user.id, %provider, "oauth sign-in");

        self.issue(user)
    }

    pub(crate) async fn me(&self, user_id: i64) -> Result<User, DomainError> {
        validate_positive_id("user_id", user_id)?;
        self.repo
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("user {user_id}")))
    }

    /// Sets the username and returns a fresh token carrying it.
    pub(crate) async fn set_username(
        &self,
        user_id: i64,
        req: SetUsernameRequest,
    ) -> Result<AuthResult, DomainError> {
        validate_positive_id("user_id", user_id)?;
        let req = req.validate()?;
        let user = self
            .repo
            .set_username(user_id, &req.username)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("user {user_id}")))?;
        info!(user_id, "username set");

        self.issue(user)
    }

    pub(crate) fn hash_password(&self, raw_password: &str) -> Result<String, DomainError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Self::argon2()?
            .hash_password(raw_password.as_bytes(), &salt)
            .map_err(|err| DomainError::Unexpected(err.to_string()))?;
        Ok(password_hash.to_string())
    }

    pub(crate) fn verify_password(
        &self,
        raw_password: &str,
        password_hash: &str,
    ) -> Result<(), DomainError> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|err| DomainError::Unexpected(err.to_string()))?;
        Self::argon2()?
            .verify_password(raw_password.as_bytes(), &parsed_hash)
            .map_err(|err| match err {
                PasswordHashError::Password => DomainError::InvalidCredentials,
                _ => DomainError::Unexpected(err.to_string()),
            })?;

        Ok(())
    }

    fn issue(&self, user: User) -> Result<AuthResult, DomainError> {
        let access_token = self
            .jwt
            .generate_token(user.id, user.username.as_deref())
            .map_err(|err| DomainError::Unexpected(err.to_string()))?;
        Ok(AuthResult { user, access_token })
    }

    fn into_new_user(req: RegisterRequest, password_hash: String) -> NewUser {
        NewUser {
            username: req.username,
            email: req.email,
            password_hash,
        }
    }

    fn argon2() -> Result<Argon2<'static>, DomainError> {
        let params = Params::new(19 * 1024, 2, 1, None)
            .map_err(|err| DomainError::Unexpected(err.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

#[cfg(test)]
mod tests {
    use super::AuthService;
    use crate::application::fakes::{FakeOAuthGateway, FakeStore};
    use crate::domain::error::DomainError;
    use crate::domain::user::{
        AuthProvider, ExternalProfile, LoginRequest, RegisterRequest, SetUsernameRequest,
    };
    use crate::infrastructure::jwt::JwtService;

    type TestAuthService = AuthService<FakeStore, FakeStore, FakeOAuthGateway>;

    fn service(store: &FakeStore) -> TestAuthService {
        let gateway = FakeOAuthGateway {
            profile: ExternalProfile {
                provider: AuthProvider::Github,
                provider_id: "4242".to_string(),
                email: "Octo@Example.com".to_string(),
                full_name: Some("Octo Cat".to_string()),
                avatar_url: None,
            },
        };
        AuthService::new(store.clone(), store.clone(), gateway, test_jwt())
    }

    #[tokio::test]
    async fn register_creates_user_and_returns_token() {
        let store = FakeStore::default();
        let service = service(&store);

        let req = RegisterRequest {
            username: "  valid_user  ".to_string(),
            email: "  VALID@EXAMPLE.COM  ".to_string(),
            password: "very-secure-password".to_string(),
        };

        let result = service.register(req).await.expect("register must succeed");

        assert_eq!(result.user.username.as_deref(), Some("valid_user"));
        assert_eq!(result.user.email, "valid@example.com");
        assert!(result.user.username_set);
        let claims = service
            .jwt()
            .verify_token(&result.access_token)
            .expect("token must verify");
        assert_eq!(claims.user_id, result.user.id);
    }

    #[tokio::test]
    async fn register_rejects_taken_username() {
        let store = FakeStore::default();
        store.seed_user("taken_name");
        let err = service(&store)
            .register(RegisterRequest {
                username: "taken_name".to_string(),
                email: "new@example.com".to_string(),
                password: "very-secure-password".to_string(),
            })
            .await
            .expect_err("username is taken");
        assert!(matches!(err, DomainError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn login_returns_invalid_credentials_for_missing_user() {
        let store = FakeStore::default();
        let req = LoginRequest {
            username: "valid_user".to_string(),
            password: "some-password".to_string(),
        };

        let err = service(&store).login(req).await.expect_err("login must fail");
        assert!(matches!(err, DomainError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_returns_invalid_credentials_for_wrong_password() {
        let store = FakeStore::default();
        let service = service(&store);
        let user = store.seed_user("valid_user");
        let hash = service
            .hash_password("correct-password")
            .expect("hash must be created");
        store.set_password_hash(user.id, hash);

        let req = LoginRequest {
            username: "valid_user".to_string(),
            password: "wrong-password".to_string(),
        };

        let err = service.login(req).await.expect_err("login must fail");
        assert!(matches!(err, DomainError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_returns_token_for_valid_credentials() {
        let store = FakeStore::default();
        let service = service(&store);
        let user = store.seed_user("valid_user");
        let hash = service
            .hash_password("correct-password")
            .expect("hash must be created");
        store.set_password_hash(user.id, hash);

        let req = LoginRequest {
            username: "valid_user".to_string(),
            password: "correct-password".to_string(),
        };

        let result = service.login(req).await.expect("login must succeed");
        assert_eq!(result.user.id, user.id);
        assert!(!result.access_token.is_empty());
    }

    #[tokio::test]
    async fn oauth_flow_creates_profile_without_username() {
        let store = FakeStore::default();
        let service = service(&store);

        let url = service
            .oauth_authorize(AuthProvider::Github)
            .await
            .expect("authorize");
        assert!(url.contains("state=fixed-state"));
        assert_eq!(store.oauth_state_count(), 1);

        let result = service
            .oauth_callback(AuthProvider::Github, "good-code", "fixed-state")
            .await
            .expect("callback");
        assert_eq!(store.oauth_state_count(), 0);
        assert_eq!(result.user.provider, AuthProvider::Github);
        assert_eq!(result.user.email, "octo@example.com");
        assert!(result.user.username.is_none());
        assert!(!result.user.username_set);

        let named = service
            .set_username(
                result.user.id,
                SetUsernameRequest {
                    username: "octocat".to_string(),
                },
            )
            .await
            .expect("set username");
        assert_eq!(named.user.username.as_deref(), Some("octocat"));
        assert!(named.user.username_set);
        let claims = service.jwt().verify_token(&named.access_token).expect("token");
        assert_eq!(claims.username.as_deref(), Some("octocat"));
    }

    #[tokio::test]
    async fn oauth_state_is_single_use_and_provider_bound() {
        let store = FakeStore::default();
        let service = service(&store);
        service
            .oauth_authorize(AuthProvider::Github)
            .await
            .expect("authorize");

        let err = service
            .oauth_callback(AuthProvider::Google, "good-code", "fixed-state")
            .await
            .expect_err("wrong provider");
        assert!(matches!(err, DomainError::Validation { field: "state", .. }));

        service
            .oauth_callback(AuthProvider::Github, "good-code", "fixed-state")
            .await
            .expect("first use");
        let err = service
            .oauth_callback(AuthProvider::Github, "good-code", "fixed-state")
            .await
            .expect_err("replay");
        assert!(matches!(err, DomainError::Validation { field: "state", .. }));
    }

    #[tokio::test]
    async fn oauth_repeat_sign_in_reuses_profile() {
        let store = FakeStore::default();
        let service = service(&store);

        let mut ids = Vec::new();
        for _ in 0..2 {
            service
                .oauth_authorize(AuthProvider::Github)
                .await
                .expect("authorize");
            let result = service
                .oauth_callback(AuthProvider::Github, "good-code", "fixed-state")
                .await
                .expect("callback");
            ids.push(result.user.id);
        }
        assert_eq!(ids[0], ids[1]);
    }

    #[tokio::test]
    async fn password_provider_cannot_start_oauth() {
        let store = FakeStore::default();
        let err = service(&store)
            .oauth_authorize(AuthProvider::Password)
            .await
            .expect_err("not oauth");
        assert!(matches!(err, DomainError::Unsupported(_)));
    }

    #[tokio::test]
    async fn set_username_conflicts_with_existing_name() {
        let store = FakeStore::default();
        store.seed_user("taken_name");
        let other = store.seed_user("other_name");
        let err = service(&store)
            .set_username(
                other.id,
                SetUsernameRequest {
                    username: "taken_name".to_string(),
                },
            )
            .await
            .expect_err("taken");
        assert!(matches!(err, DomainError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn set_username_conflicts_regardless_of_case() {
        let store = FakeStore::default();
        store.seed_user("reactguru");
        let other = store.seed_user("other_name");
        let err = service(&store)
            .set_username(
                other.id,
                SetUsernameRequest {
                    username: "ReactGuru".to_string(),
                },
            )
            .await
            .expect_err("taken in another case");
        assert!(matches!(err, DomainError::AlreadyExists(_)));
    }

    fn test_jwt() -> JwtService {
        JwtService::new("0123456789abcdef0123456789abcdef", 3600)
    }
}
