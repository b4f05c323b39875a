use std::time::Duration;

use async_trait::async_trait;
use oauth2::basic::{BasicClient, BasicErrorResponse};
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, HttpRequest, HttpResponse, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use tracing::warn;

use crate::domain::error::DomainError;
use crate::domain::user::{AuthProvider, ExternalProfile};
use crate::infrastructure::settings::{OAuthClientSettings, Settings};

const CLIENT_USER_AGENT: &str = "devconnect-server";

/// Everything needed to send a browser to the provider and later verify its callback.
#[derive(Debug, Clone)]
pub(crate) struct AuthorizationRedirect {
    pub(crate) url: String,
    pub(crate) state: String,
    pub(crate) pkce_verifier: String,
}

#[async_trait]
pub(crate) trait OAuthGateway: Send + Sync {
    fn authorize(&self, provider: AuthProvider) -> Result<AuthorizationRedirect, DomainError>;

    /// Exchanges the authorization code and loads the signed-in user's profile.
    async fn fetch_profile(
        &self,
        provider: AuthProvider,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ExternalProfile, DomainError>;
}

struct ProviderEndpoints {
    auth_url: &'static str,
    token_url: &'static str,
    scopes: &'static [&'static str],
}

const GITHUB: ProviderEndpoints = ProviderEndpoints {
    auth_url: "https://github.com/login/oauth/authorize",
    token_url: "https://github.com/login/oauth/access_token",
    scopes: &["read:user", "user:email"],
};

const GOOGLE: ProviderEndpoints = ProviderEndpoints {
    auth_url: "https://accounts.google.com/o/oauth2/v2/auth",
    token_url: "https://oauth2.googleapis.com/token",
    scopes: &["openid", "email", "profile"],
};

const GITHUB_USER_URL: &str = "https://api.github.com/user";
const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Client with the authorization and token endpoints set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

type TokenError = RequestTokenError<reqwest::Error, BasicErrorResponse>;

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

/// GitHub and Google sign-in over the authorization code flow with PKCE.
pub(crate) struct OAuth2Gateway {
    http: reqwest::Client,
    redirect_base_url: String,
    github: Option<OAuthClientSettings>,
    google: Option<OAuthClientSettings>,
}

impl OAuth2Gateway {
    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            http,
            redirect_base_url: settings.oauth_redirect_base_url.clone(),
            github: settings.github.clone(),
            google: settings.google.clone(),
        })
    }

    fn provider(
        &self,
        provider: AuthProvider,
    ) -> Result<(&OAuthClientSettings, &'static ProviderEndpoints), DomainError> {
        let configured = match provider {
            AuthProvider::Github => self.github.as_ref().map(|client| (client, &GITHUB)),
            AuthProvider::Google => self.google.as_ref().map(|client| (client, &GOOGLE)),
            AuthProvider::Password => None,
        };
        configured.ok_or_else(|| DomainError::Unsupported(format!("oauth provider '{provider}'")))
    }

    fn redirect_url(&self, provider: AuthProvider) -> String {
        format!(
            "{}/api/auth/oauth/{}/callback",
            self.redirect_base_url, provider
        )
    }

    fn client(&self, provider: AuthProvider) -> Result<ConfiguredClient, DomainError> {
        let (client, endpoints) = self.provider(provider)?;
        let auth_url = AuthUrl::new(endpoints.auth_url.to_string())
            .map_err(|err| DomainError::Unexpected(err.to_string()))?;
        let token_url = TokenUrl::new(endpoints.token_url.to_string())
            .map_err(|err| DomainError::Unexpected(err.to_string()))?;
        let redirect_url = RedirectUrl::new(self.redirect_url(provider))
            .map_err(|err| DomainError::Unexpected(err.to_string()))?;

        Ok(BasicClient::new(ClientId::new(client.client_id.clone()))
            .set_client_secret(ClientSecret::new(client.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(redirect_url))
    }

    async fn exchange_code(
        &self,
        client: &ConfiguredClient,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<String, DomainError> {
        let send = |request: HttpRequest| send_token_request(self.http.clone(), request);
        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&send)
            .await
            .map_err(token_error)?;

        Ok(token.access_token().secret().clone())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, DomainError> {
        self.http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(upstream_error)?
            .error_for_status()
            .map_err(upstream_error)?
            .json()
            .await
            .map_err(upstream_error)
    }

    async fn github_profile(&self, access_token: &str) -> Result<ExternalProfile, DomainError> {
        let user: GitHubUser = self.get_json(GITHUB_USER_URL, access_token).await?;
        let emails = if user.email.is_some() {
            Vec::new()
        } else {
            self.get_json(GITHUB_EMAILS_URL, access_token).await?
        };
        github_to_profile(user, emails)
    }

    async fn google_profile(&self, access_token: &str) -> Result<ExternalProfile, DomainError> {
        let info: GoogleUserInfo = self.get_json(GOOGLE_USERINFO_URL, access_token).await?;
        google_to_profile(info)
    }
}

#[async_trait]
impl OAuthGateway for OAuth2Gateway {
    fn authorize(&self, provider: AuthProvider) -> Result<AuthorizationRedirect, DomainError> {
        let (_, endpoints) = self.provider(provider)?;
        let oauth_client = self.client(provider)?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let (url, csrf_state) = oauth_client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(
                endpoints
                    .scopes
                    .iter()
                    .map(|scope| Scope::new((*scope).to_string())),
            )
            .set_pkce_challenge(pkce_challenge)
            .url();

        Ok(AuthorizationRedirect {
            url: url.to_string(),
            state: csrf_state.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        })
    }

    async fn fetch_profile(
        &self,
        provider: AuthProvider,
        code: &str,
        pkce_verifier: &str,
    ) -> Result<ExternalProfile, DomainError> {
        let client = self.client(provider)?;
        let access_token = self.exchange_code(&client, code, pkce_verifier).await?;
        match provider {
            AuthProvider::Github => self.github_profile(&access_token).await,
            AuthProvider::Google => self.google_profile(&access_token).await,
            AuthProvider::Password => Err(DomainError::Unsupported(format!(
                "oauth provider '{provider}'"
            ))),
        }
    }
}

fn github_to_profile(
    user: GitHubUser,
    emails: Vec<GitHubEmail>,
) -> Result<ExternalProfile, DomainError> {
    let email = match user.email {
        Some(email) => email,
        None => emails
            .into_iter()
            .find(|entry| entry.primary && entry.verified)
            .map(|entry| entry.email)
            .ok_or(DomainError::Validation {
                field: "email",
                message: "no verified primary email on the GitHub account",
            })?,
    };

    ExternalProfile {
        provider: AuthProvider::Github,
        provider_id: user.id.to_string(),
        email,
        full_name: user.name.or(Some(user.login)),
        avatar_url: user.avatar_url,
    }
    .validate()
}

fn google_to_profile(info: GoogleUserInfo) -> Result<ExternalProfile, DomainError> {
    let email = info.email.ok_or(DomainError::Validation {
        field: "email",
        message: "Google account has no email",
    })?;

    ExternalProfile {
        provider: AuthProvider::Google,
        provider_id: info.sub,
        email,
        full_name: info.name,
        avatar_url: info.picture,
    }
    .validate()
}

/// Runs a token request built by `oauth2` on the shared `reqwest` client.
async fn send_token_request(
    http: reqwest::Client,
    request: HttpRequest,
) -> Result<HttpResponse, reqwest::Error> {
    let response = http.execute(reqwest::Request::try_from(request)?).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    let mut converted = HttpResponse::new(body);
    *converted.status_mut() = status;
    *converted.headers_mut() = headers;
    Ok(converted)
}

fn token_error(err: TokenError) -> DomainError {
    match err {
        RequestTokenError::ServerResponse(response) => {
            warn!(
                error = %response.error(),
                description = response.error_description().map(String::as_str).unwrap_or(""),
                "oauth code exchange rejected"
            );
            DomainError::InvalidCredentials
        }
        // GitHub answers a bad code with 200 and an error body.
        RequestTokenError::Parse(err, _) => {
            warn!(error = %err, "oauth token response not understood");
            DomainError::InvalidCredentials
        }
        RequestTokenError::Request(err) => upstream_error(err),
        RequestTokenError::Other(message) => {
            DomainError::Unexpected(format!("oauth code exchange failed: {message}"))
        }
    }
}

fn upstream_error(err: reqwest::Error) -> DomainError {
    DomainError::Unexpected(format!("oauth provider request failed: {err}"))
}

#[cfg(test)]
mod tests {
    use oauth2::basic::{BasicClient, BasicErrorResponse, BasicErrorResponseType};
    use oauth2::{AuthUrl, ClientId, RequestTokenError, TokenUrl};

    use super::{
        ConfiguredClient, GitHubEmail, GitHubUser, GoogleUserInfo, OAuth2Gateway, OAuthGateway,
        github_to_profile, google_to_profile, token_error,
    };
    use crate::domain::error::DomainError;
    use crate::domain::user::AuthProvider;
    use crate::infrastructure::settings::OAuthClientSettings;

    fn gateway(github: bool) -> OAuth2Gateway {
        OAuth2Gateway {
            http: reqwest::Client::new(),
            redirect_base_url: "http://localhost:8080".to_string(),
            github: github.then(|| OAuthClientSettings {
                client_id: "gh-client".to_string(),
                client_secret: "gh-secret".to_string(),
            }),
            google: None,
        }
    }

    #[test]
    fn authorize_builds_pkce_url_for_configured_provider() {
        let redirect = gateway(true)
            .authorize(AuthProvider::Github)
            .expect("github is configured");

        assert!(redirect.url.starts_with("https://github.com/login/oauth/authorize"));
        assert!(redirect.url.contains("client_id=gh-client"));
        assert!(redirect.url.contains("code_challenge_method=S256"));
        assert!(redirect.url.contains(&format!("state={}", redirect.state)));
        assert!(redirect.url.contains("api%2Fauth%2Foauth%2Fgithub%2Fcallback"));
        assert!(!redirect.pkce_verifier.is_empty());
    }

    #[test]
    fn authorize_rejects_unconfigured_provider() {
        let err = gateway(false)
            .authorize(AuthProvider::Google)
            .expect_err("google is not configured");
        assert!(matches!(err, DomainError::Unsupported(_)));

        let err = gateway(true)
            .authorize(AuthProvider::Password)
            .expect_err("password is not oauth");
        assert!(matches!(err, DomainError::Unsupported(_)));
    }

    fn client_with_token_url(token_url: &str) -> ConfiguredClient {
        BasicClient::new(ClientId::new("gh-client".to_string()))
            .set_auth_uri(
                AuthUrl::new("http://127.0.0.1:9/authorize".to_string()).expect("auth url"),
            )
            .set_token_uri(TokenUrl::new(token_url.to_string()).expect("token url"))
    }

    #[test]
    fn configured_client_points_at_provider_token_endpoint() {
        let client = gateway(true).client(AuthProvider::Github).expect("client");
        assert_eq!(
            client.token_uri().as_str(),
            "https://github.com/login/oauth/access_token"
        );
    }

    #[tokio::test]
    async fn unreachable_token_endpoint_is_an_upstream_failure() {
        let client = client_with_token_url("http://127.0.0.1:9/token");
        let err = gateway(true)
            .exchange_code(&client, "code", "verifier")
            .await
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, DomainError::Unexpected(_)));
    }

    #[test]
    fn provider_rejection_is_invalid_credentials() {
        let rejected = RequestTokenError::ServerResponse(BasicErrorResponse::new(
            BasicErrorResponseType::InvalidGrant,
            Some("bad_verification_code".to_string()),
            None,
        ));
        assert!(matches!(
            token_error(rejected),
            DomainError::InvalidCredentials
        ));

        let other = RequestTokenError::Other("unexpected status".to_string());
        assert!(matches!(token_error(other), DomainError::Unexpected(_)));
    }

    #[test]
    fn github_profile_falls_back_to_primary_verified_email() {
        let user = GitHubUser {
            id: 42,
            login: "octocat".to_string(),
            email: None,
            name: None,
            avatar_url: Some("https://avatars.example/octocat".to_string()),
        };
        let emails = vec![
            GitHubEmail {
                email: "old@example.com".to_string(),
                primary: false,
                verified: true,
            },
            GitHubEmail {
                email: "Octo@Example.com".to_string(),
                primary: true,
                verified: true,
            },
        ];

        let profile = github_to_profile(user, emails).expect("profile");
        assert_eq!(profile.provider_id, "42");
        assert_eq!(profile.email, "octo@example.com");
        assert_eq!(profile.full_name.as_deref(), Some("octocat"));
    }

    #[test]
    fn github_profile_without_verified_email_fails() {
        let user = GitHubUser {
            id: 42,
            login: "octocat".to_string(),
            email: None,
            name: Some("Octo Cat".to_string()),
            avatar_url: None,
        };
        let emails = vec![GitHubEmail {
            email: "octo@example.com".to_string(),
            primary: true,
            verified: false,
        }];
        assert!(github_to_profile(user, emails).is_err());
    }

    #[test]
    fn google_profile_maps_name_and_picture() {
        let info = GoogleUserInfo {
            sub: "1099".to_string(),
            email: Some("emma@example.com".to_string()),
            name: Some("Emma Chen".to_string()),
            picture: Some("https://lh3.example/emma".to_string()),
        };
        let profile = google_to_profile(info).expect("profile");
        assert_eq!(profile.provider, AuthProvider::Google);
        assert_eq!(profile.full_name.as_deref(), Some("Emma Chen"));
        assert_eq!(profile.avatar_url.as_deref(), Some("https://lh3.example/emma"));
    }
}
