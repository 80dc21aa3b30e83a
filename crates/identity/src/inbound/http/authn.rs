use app_core::error::AppError;
use app_core::extractors::{AppJson, AppPath, AppQuery};
use app_core::response::Response;
use axum::debug_handler;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect};
use serde_json::json;
use tower_cookies::cookie::{SameSite, time};
use tower_cookies::{Cookie, Cookies};

use crate::domain::entity::user::User;
use crate::domain::inout::prelude::*;
use crate::inbound::model::authn::{OAuthCallbackRequest, SigninRequest, SignupRequest, UserResponse};
use crate::inbound::session;
use crate::inbound::state::IdentityState;

const COOKIE_OAUTH_STATE: &str = "__oauth_state";
const KEY_OAUTH_STATE_CSRF: &str = "csrf_token";
const KEY_OAUTH_STATE_PKCE: &str = "pkce_verifier";

const DEFAULT_SIGNIN_ROUTE: &str = "/i/signin";
const DEFAULT_HOME_ROUTE: &str = "/";

fn signin_route(state: &IdentityState) -> String {
    state
        .config
        .get::<String>("routes.signin")
        .unwrap_or_else(|_| DEFAULT_SIGNIN_ROUTE.to_string())
}

fn home_route(state: &IdentityState) -> String {
    state
        .config
        .get::<String>("routes.home")
        .unwrap_or_else(|_| DEFAULT_HOME_ROUTE.to_string())
}

#[debug_handler]
pub async fn signup(
    State(state): State<IdentityState>,
    cookies: Cookies,
    AppJson(req): AppJson<SignupRequest>,
) -> impl IntoResponse {
    state
        .authn
        .signup(SignupInput {
            username: req.username,
            display_name: req.display_name,
            email: req.email,
            password: req.password,
        })
        .await
        .map(|user| {
            session::establish(&cookies, &state.cookie_key, user.id);
            Response::from(UserResponse::from(user))
        })
}

#[debug_handler]
pub async fn signin(
    State(state): State<IdentityState>,
    cookies: Cookies,
    AppJson(req): AppJson<SigninRequest>,
) -> impl IntoResponse {
    state
        .authn
        .signin(SigninInput { username: req.username, password: req.password })
        .await
        .map(|user| {
            session::establish(&cookies, &state.cookie_key, user.id);
            Response::from(UserResponse::from(user))
        })
}

#[debug_handler]
pub async fn signout(State(state): State<IdentityState>, cookies: Cookies) -> impl IntoResponse {
    session::clear(&cookies, &state.cookie_key);
    Redirect::to(&home_route(&state))
}

#[debug_handler]
pub async fn oauth_login(
    State(state): State<IdentityState>,
    cookies: Cookies,
    AppPath(provider): AppPath<String>,
) -> impl IntoResponse {
    state.authn.oauth_login(OAuthLoginInput { provider }).await.and_then(|output| {
        let oauth_state = json!({
            KEY_OAUTH_STATE_CSRF: output.csrf_token,
            KEY_OAUTH_STATE_PKCE: output.pkce_verifier,
        });
        let value = serde_json::to_string(&oauth_state)?;

        let cookie = Cookie::build((COOKIE_OAUTH_STATE, value))
            .http_only(true)
            .secure(true)
            .path("/")
            .max_age(time::Duration::minutes(3))
            .same_site(SameSite::Lax)
            .build();

        cookies.private(&state.cookie_key).add(cookie);

        Ok(Redirect::to(&output.auth_url))
    })
}

/// Completes the provider round trip. Whatever goes wrong here, the browser
/// is mid-redirect, so every failure lands on the sign-in page instead of a
/// JSON error body.
#[debug_handler]
pub async fn oauth_callback(
    State(state): State<IdentityState>,
    cookies: Cookies,
    AppPath(provider): AppPath<String>,
    AppQuery(query): AppQuery<OAuthCallbackRequest>,
) -> Redirect {
    match complete_oauth_callback(&state, &cookies, provider, query).await {
        Ok((user, redirect_hint)) => {
            session::establish(&cookies, &state.cookie_key, user.id);
            Redirect::to(&redirect_hint.unwrap_or_else(|| home_route(&state)))
        },
        Err(err) => {
            tracing::warn!(error = %err, "oauth callback failed");
            Redirect::to(&signin_route(&state))
        },
    }
}

async fn complete_oauth_callback(
    state: &IdentityState,
    cookies: &Cookies,
    provider: String,
    query: OAuthCallbackRequest,
) -> Result<(User, Option<String>), AppError> {
    if let Some(err) = query.error {
        return Err(AppError::Forbidden(format!("OAuth authentication failed: {err}")));
    }

    let code = query
        .code
        .ok_or_else(|| AppError::Forbidden("Missing authorization code".to_string()))?;

    let oauth_state_cookie = cookies
        .private(&state.cookie_key)
        .get(COOKIE_OAUTH_STATE)
        .ok_or_else(|| AppError::Forbidden("OAuth session expired or invalid".to_string()))?;

    cookies.private(&state.cookie_key).remove(Cookie::new(COOKIE_OAUTH_STATE, ""));

    let oauth_state: serde_json::Value = serde_json::from_str(oauth_state_cookie.value())
        .map_err(|_| AppError::Forbidden("Invalid OAuth state format".to_string()))?;

    let stored_csrf_token = oauth_state
        .get(KEY_OAUTH_STATE_CSRF)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::Forbidden("Invalid OAuth state structure".to_string()))?;

    if query.state.as_deref() != Some(stored_csrf_token) {
        return Err(AppError::Forbidden("Invalid OAuth state token".to_string()));
    }

    let pkce_verifier_secret = oauth_state[KEY_OAUTH_STATE_PKCE]
        .as_str()
        .ok_or(AppError::Internal)?
        .to_string();

    let session_user_id = session::current_user_id(cookies, &state.cookie_key)?;

    state
        .authn
        .oauth_callback(OAuthCallbackInput { provider, code, pkce_verifier_secret, session_user_id })
        .await
}
