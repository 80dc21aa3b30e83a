use axum::Router;
use axum::routing::{delete, get, post};

use crate::inbound::http::accounts::*;
use crate::inbound::http::authn::*;
use crate::inbound::state::IdentityState;

pub fn create_router(state: IdentityState) -> Router {
    Router::new()
        // authentication scope
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/signout", get(signout))
        .route("/auth/{provider}", get(oauth_login))
        .route("/auth/{provider}/callback", get(oauth_callback))
        // account scope
        .route("/users/me", get(me))
        .route("/users/accounts", delete(unlink_provider))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use app_core::config::test_utils::TestConfigBuilder;
    use app_core::error::AppError;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use mockall::predicate::eq;
    use oauth2::{CsrfToken, PkceCodeVerifier};
    use tower::ServiceExt;
    use tower_cookies::{CookieManagerLayer, Key};

    use super::*;
    use crate::domain::entity::user::User;
    use crate::domain::inout::prelude::*;
    use crate::usecase::authn::MockAuthnUseCase;
    use crate::usecase::reconcile::MockReconcilerUseCase;

    fn sample_user() -> User {
        User {
            id: 42,
            username: "octocat".to_string(),
            display_name: "The Octocat".to_string(),
            email: "octocat@example.com".to_string(),
            provider: "local".to_string(),
            provider_data: None,
            additional_providers_data: Default::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn app_with_key(key: Key, authn: MockAuthnUseCase, reconciler: MockReconcilerUseCase) -> Router {
        let state = IdentityState::new(
            key,
            Arc::new(TestConfigBuilder::new().build()),
            Arc::new(authn),
            Arc::new(reconciler),
        );

        create_router(state).layer(CookieManagerLayer::new())
    }

    fn app(authn: MockAuthnUseCase, reconciler: MockReconcilerUseCase) -> Router {
        app_with_key(Key::generate(), authn, reconciler)
    }

    #[tokio::test]
    async fn test_signup_sets_session_cookie() {
        let mut authn = MockAuthnUseCase::new();
        authn.expect_signup().times(1).returning(|_| Ok(sample_user()));

        let response = app(authn, MockReconcilerUseCase::new())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/signup")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"username":"octocat","display_name":"The Octocat","email":"octocat@example.com","password":"s3cretpass"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie should be set")
            .to_str()
            .unwrap();
        assert!(set_cookie.starts_with("__session="));
    }

    #[tokio::test]
    async fn test_signin_invalid_credentials() {
        let mut authn = MockAuthnUseCase::new();
        authn
            .expect_signin()
            .times(1)
            .returning(|_| Err(AppError::Unauthorized("Invalid username or password".to_string())));

        let response = app(authn, MockReconcilerUseCase::new())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/signin")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"username":"octocat","password":"wrong"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_signout_redirects_home() {
        let response = app(MockAuthnUseCase::new(), MockReconcilerUseCase::new())
            .oneshot(Request::builder().uri("/auth/signout").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");
    }

    #[tokio::test]
    async fn test_oauth_login_redirects_to_provider() {
        let mut authn = MockAuthnUseCase::new();
        authn
            .expect_oauth_login()
            .withf(|input: &OAuthLoginInput| input.provider == "github")
            .times(1)
            .returning(|_| {
                Ok(OAuthLoginOutput {
                    auth_url: "https://github.com/login/oauth/authorize?state=abc".to_string(),
                    csrf_token: CsrfToken::new("abc".to_string()),
                    pkce_verifier: PkceCodeVerifier::new("verifier".to_string()),
                })
            });

        let response = app(authn, MockReconcilerUseCase::new())
            .oneshot(Request::builder().uri("/auth/github").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://github.com/login/oauth/authorize?state=abc"
        );
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("oauth state cookie should be set")
            .to_str()
            .unwrap();
        assert!(set_cookie.starts_with("__oauth_state="));
    }

    #[tokio::test]
    async fn test_oauth_callback_without_state_cookie_redirects_to_signin() {
        let mut authn = MockAuthnUseCase::new();
        authn.expect_oauth_callback().times(0);

        let response = app(authn, MockReconcilerUseCase::new())
            .oneshot(
                Request::builder()
                    .uri("/auth/github/callback?code=c0de&state=abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/i/signin");
    }

    #[tokio::test]
    async fn test_me_without_session_is_unauthorized() {
        let mut authn = MockAuthnUseCase::new();
        authn.expect_current_user().times(0);

        let response = app(authn, MockReconcilerUseCase::new())
            .oneshot(Request::builder().uri("/users/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unlink_without_session_is_unauthorized() {
        let mut reconciler = MockReconcilerUseCase::new();
        reconciler.expect_unlink().times(0);

        let response = app(MockAuthnUseCase::new(), reconciler)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/users/accounts?provider=github")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unlink_provider_with_session() {
        let mut authn = MockAuthnUseCase::new();
        authn.expect_current_user().with(eq(42)).times(1).returning(|_| Ok(sample_user()));

        let mut reconciler = MockReconcilerUseCase::new();
        reconciler
            .expect_unlink()
            .withf(|user, provider| user.id == 42 && provider == "github")
            .times(1)
            .returning(|user, _| Ok(user));

        // Sign in first to get a session cookie for the unlink call. The key
        // is shared so the second app can decrypt it.
        let key = Key::generate();
        let mut signin_authn = MockAuthnUseCase::new();
        signin_authn.expect_signin().returning(|_| Ok(sample_user()));
        let signin_response = app_with_key(key.clone(), signin_authn, MockReconcilerUseCase::new())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/signin")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"username":"octocat","password":"s3cretpass"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        let cookie_pair = signin_response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .split(';')
            .next()
            .unwrap()
            .to_string();

        let response = app_with_key(key, authn, reconciler)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/users/accounts?provider=github")
                    .header(header::COOKIE, cookie_pair)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
