//! OAuth 2.0 authorization-code flows with PKCE, plus provider profile
//! retrieval.
//!
//! Each provider normalizes its profile response into an
//! [`OAuthUserProfile`]: the raw payload is kept verbatim in `data`, and
//! `identifier_field` names the key inside it that uniquely identifies the
//! user at that provider (`sub` for Google, `id` for GitHub).

use std::collections::HashMap;
use std::sync::Arc;

use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge, PkceCodeVerifier, RedirectUrl,
    Scope, TokenResponse, TokenUrl,
};
use reqwest::{Client, ClientBuilder, redirect};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(#[from] oauth2::url::ParseError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("OAuth token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Failed to parse user profile response")]
    ProfileParse,

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),
}

pub struct AuthorizationDetails {
    pub url: String,
    pub csrf_token: CsrfToken,
    pub pkce_verifier: PkceCodeVerifier,
}

/// A provider-agnostic view of the authenticated user's profile.
#[derive(Debug, Clone)]
pub struct OAuthUserProfile {
    /// Key inside `data` holding the provider's unique user identifier.
    pub identifier_field: &'static str,
    /// The provider's profile payload, untouched.
    pub data: serde_json::Value,
    pub display_name: Option<String>,
    pub email: Option<String>,
    /// A provider-supplied handle usable as a username candidate.
    pub username: Option<String>,
}

#[async_trait::async_trait]
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait OAuthProvider: Send + Sync {
    /// Generates the authorization URL and the state needed to complete the
    /// PKCE flow on callback.
    fn get_authorization_details(&self) -> AuthorizationDetails;

    /// Exchanges an authorization code for an access token.
    async fn exchange_code(&self, code: String, pkce_verifier_secret: String) -> Result<String, OAuthError>;

    /// Fetches the user's profile from the provider using an access token.
    async fn get_user_profile(&self, access_token: &str) -> Result<OAuthUserProfile, OAuthError>;
}

impl std::fmt::Debug for dyn OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("OAuthProvider")
    }
}

fn no_redirect_client() -> Result<Client, OAuthError> {
    ClientBuilder::new().redirect(redirect::Policy::none()).build().map_err(|e| {
        tracing::error!("Failed to build HTTP client: {:?}", e);
        OAuthError::HttpClient(e)
    })
}

fn describe_token_error<RE, TE>(e: &oauth2::RequestTokenError<RE, TE>) -> String
where
    RE: std::error::Error + 'static,
    TE: oauth2::ErrorResponse + 'static,
{
    match e {
        oauth2::RequestTokenError::ServerResponse(err) => {
            format!("Server response error: {:?}", err)
        },
        oauth2::RequestTokenError::Parse(_, body) => match std::str::from_utf8(body) {
            Ok(body_str) => format!("Parse error. Response body: {body_str}"),
            Err(_) => "Parse error with non-UTF8 response".to_string(),
        },
        _ => format!("Token exchange error: {e:?}"),
    }
}

#[derive(Debug)]
pub struct GoogleOAuthProvider {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
}

impl GoogleOAuthProvider {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Result<Self, OAuthError> {
        Ok(Self {
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret),
            auth_url: AuthUrl::new("https://accounts.google.com/o/oauth2/v2/auth".to_string())?,
            token_url: TokenUrl::new("https://oauth2.googleapis.com/token".to_string())?,
            redirect_url: RedirectUrl::new(redirect_uri)?,
        })
    }
}

#[async_trait::async_trait]
impl OAuthProvider for GoogleOAuthProvider {
    fn get_authorization_details(&self) -> AuthorizationDetails {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_token) = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        AuthorizationDetails { url: auth_url.to_string(), csrf_token, pkce_verifier }
    }

    async fn exchange_code(&self, code: String, pkce_verifier_secret: String) -> Result<String, OAuthError> {
        let http_client = no_redirect_client()?;

        let token_result = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier_secret))
            .request_async(&http_client)
            .await
            .map_err(|e| {
                let error_msg = describe_token_error(&e);
                tracing::error!("OAuth token exchange failed: {}", error_msg);
                OAuthError::TokenExchange(error_msg)
            })?;

        Ok(token_result.access_token().secret().to_string())
    }

    async fn get_user_profile(&self, access_token: &str) -> Result<OAuthUserProfile, OAuthError> {
        let client = Client::new();

        let data: serde_json::Value = client
            .get("https://www.googleapis.com/oauth2/v3/userinfo")
            .bearer_auth(access_token)
            .send()
            .await?
            .json()
            .await
            .map_err(|_| OAuthError::ProfileParse)?;

        if data.get("sub").and_then(|v| v.as_str()).is_none() {
            return Err(OAuthError::ProfileParse);
        }

        let display_name = data.get("name").and_then(|v| v.as_str()).map(str::to_string);
        let email = data.get("email").and_then(|v| v.as_str()).map(str::to_string);

        Ok(OAuthUserProfile { identifier_field: "sub", data, display_name, email, username: None })
    }
}

#[derive(Debug)]
pub struct GitHubOAuthProvider {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
}

impl GitHubOAuthProvider {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Result<Self, OAuthError> {
        Ok(Self {
            client_id: ClientId::new(client_id),
            client_secret: ClientSecret::new(client_secret),
            auth_url: AuthUrl::new("https://github.com/login/oauth/authorize".to_string())?,
            token_url: TokenUrl::new("https://github.com/login/oauth/access_token".to_string())?,
            redirect_url: RedirectUrl::new(redirect_uri)?,
        })
    }

    /// GitHub leaves `email` null for users whose address is private. The
    /// dedicated emails endpoint still returns it under the `user:email`
    /// scope.
    async fn fetch_primary_email(&self, client: &Client, access_token: &str) -> Option<String> {
        #[derive(Deserialize)]
        struct GitHubEmail {
            email: String,
            primary: bool,
            verified: bool,
        }

        let emails: Vec<GitHubEmail> = client
            .get("https://api.github.com/user/emails")
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, "identity-server")
            .send()
            .await
            .ok()?
            .json()
            .await
            .ok()?;

        emails
            .into_iter()
            .find(|e| e.primary && e.verified)
            .map(|e| e.email)
    }
}

#[async_trait::async_trait]
impl OAuthProvider for GitHubOAuthProvider {
    fn get_authorization_details(&self) -> AuthorizationDetails {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_token) = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("read:user".to_string()))
            .add_scope(Scope::new("user:email".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        AuthorizationDetails { url: auth_url.to_string(), csrf_token, pkce_verifier }
    }

    async fn exchange_code(&self, code: String, pkce_verifier_secret: String) -> Result<String, OAuthError> {
        let http_client = no_redirect_client()?;

        let token_result = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone())
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier_secret))
            .request_async(&http_client)
            .await
            .map_err(|e| {
                let error_msg = describe_token_error(&e);
                tracing::error!("OAuth token exchange failed: {}", error_msg);
                OAuthError::TokenExchange(error_msg)
            })?;

        Ok(token_result.access_token().secret().to_string())
    }

    async fn get_user_profile(&self, access_token: &str) -> Result<OAuthUserProfile, OAuthError> {
        let client = Client::new();

        let data: serde_json::Value = client
            .get("https://api.github.com/user")
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, "identity-server")
            .send()
            .await?
            .json()
            .await
            .map_err(|_| OAuthError::ProfileParse)?;

        if data.get("id").is_none() {
            return Err(OAuthError::ProfileParse);
        }

        let display_name = data.get("name").and_then(|v| v.as_str()).map(str::to_string);
        let username = data.get("login").and_then(|v| v.as_str()).map(str::to_string);

        let email = match data.get("email").and_then(|v| v.as_str()) {
            Some(e) => Some(e.to_string()),
            None => self.fetch_primary_email(&client, access_token).await,
        };

        Ok(OAuthUserProfile { identifier_field: "id", data, display_name, email, username })
    }
}

#[derive(Clone, Default)]
pub struct OAuthManager {
    providers: HashMap<String, Arc<dyn OAuthProvider>>,
}

impl OAuthManager {
    pub fn new() -> Self {
        Self { providers: HashMap::new() }
    }

    pub fn add_provider(&mut self, name: &str, provider: Arc<dyn OAuthProvider>) {
        self.providers.insert(name.to_string(), provider);
    }

    pub fn get_provider(&self, name: &str) -> Result<&Arc<dyn OAuthProvider>, OAuthError> {
        self.providers
            .get(name)
            .ok_or_else(|| OAuthError::ProviderNotFound(name.to_string()))
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockall::predicate::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_oauth_manager_lookup() {
        let mut manager = OAuthManager::new();
        manager.add_provider("google", Arc::new(MockOAuthProvider::new()));

        assert!(manager.has_provider("google"));
        assert!(manager.get_provider("google").is_ok());

        let err = manager.get_provider("myspace").unwrap_err();
        assert!(matches!(err, OAuthError::ProviderNotFound(name) if name == "myspace"));
    }

    #[test]
    fn test_google_provider_rejects_invalid_redirect_url() {
        let provider =
            GoogleOAuthProvider::new("client_id".to_string(), "client_secret".to_string(), "not a url".to_string());

        assert!(matches!(provider.unwrap_err(), OAuthError::InvalidUrl(_)));
    }

    #[test]
    fn test_google_authorization_details() {
        let provider = GoogleOAuthProvider::new(
            "client_id".to_string(),
            "client_secret".to_string(),
            "https://example.com/callback".to_string(),
        )
        .unwrap();

        let details = provider.get_authorization_details();

        assert!(details.url.starts_with("https://accounts.google.com/o/oauth2/v2/auth"));
        assert!(details.url.contains("response_type=code"));
        assert!(details.url.contains("client_id=client_id"));
        assert!(details.url.contains("code_challenge_method=S256"));
        assert!(details.url.contains("redirect_uri=https%3A%2F%2Fexample.com%2Fcallback"));
        assert!(details.url.contains("scope=openid+email+profile"));
    }

    #[test]
    fn test_github_authorization_details() {
        let provider = GitHubOAuthProvider::new(
            "client_id".to_string(),
            "client_secret".to_string(),
            "https://example.com/callback".to_string(),
        )
        .unwrap();

        let details = provider.get_authorization_details();

        assert!(details.url.starts_with("https://github.com/login/oauth/authorize"));
        assert!(details.url.contains("code_challenge_method=S256"));
        assert!(details.url.contains("scope=read%3Auser+user%3Aemail"));
    }

    #[tokio::test]
    async fn test_mock_provider_profile_shape() {
        let mut mock_provider = MockOAuthProvider::new();

        mock_provider
            .expect_exchange_code()
            .with(eq("test_code".to_string()), eq("test_verifier".to_string()))
            .returning(|_, _| Box::pin(async move { Ok("mock_access_token".to_string()) }));

        mock_provider.expect_get_user_profile().with(eq("mock_access_token")).returning(|_| {
            Box::pin(async move {
                Ok(OAuthUserProfile {
                    identifier_field: "id",
                    data: json!({"id": 42, "login": "octocat"}),
                    display_name: Some("The Octocat".to_string()),
                    email: Some("octocat@example.com".to_string()),
                    username: Some("octocat".to_string()),
                })
            })
        });

        let token = mock_provider
            .exchange_code("test_code".to_string(), "test_verifier".to_string())
            .await
            .unwrap();
        assert_eq!(token, "mock_access_token");

        let profile = mock_provider.get_user_profile(&token).await.unwrap();
        assert_eq!(profile.identifier_field, "id");
        assert_eq!(profile.data["login"], "octocat");
        assert_eq!(profile.username.as_deref(), Some("octocat"));
    }

    #[tokio::test]
    async fn test_mock_provider_failure_flow() {
        let mut mock_provider = MockOAuthProvider::new();

        mock_provider
            .expect_exchange_code()
            .returning(|_, _| Box::pin(async move { Err(OAuthError::TokenExchange("denied".to_string())) }));

        mock_provider
            .expect_get_user_profile()
            .returning(|_| Box::pin(async move { Err(OAuthError::ProfileParse) }));

        let token_result = mock_provider.exchange_code("c".to_string(), "v".to_string()).await;
        assert!(matches!(token_result.unwrap_err(), OAuthError::TokenExchange(_)));

        let profile_result = mock_provider.get_user_profile("t").await;
        assert!(matches!(profile_result.unwrap_err(), OAuthError::ProfileParse));
    }
}
