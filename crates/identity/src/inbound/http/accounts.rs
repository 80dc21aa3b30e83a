use app_core::error::AppError;
use app_core::extractors::AppQuery;
use app_core::response::Response;
use axum::debug_handler;
use axum::extract::State;
use axum::response::IntoResponse;
use tower_cookies::Cookies;

use crate::domain::entity::user::User;
use crate::inbound::model::authn::{UnlinkQuery, UserResponse};
use crate::inbound::session;
use crate::inbound::state::IdentityState;

async fn session_user(state: &IdentityState, cookies: &Cookies) -> Result<User, AppError> {
    let user_id = session::current_user_id(cookies, &state.cookie_key)?
        .ok_or_else(|| AppError::Unauthorized("User is not signed in".to_string()))?;

    state.authn.current_user(user_id).await
}

#[debug_handler]
pub async fn me(State(state): State<IdentityState>, cookies: Cookies) -> impl IntoResponse {
    session_user(&state, &cookies).await.map(UserResponse::from).map(Response::from)
}

#[debug_handler]
pub async fn unlink_provider(
    State(state): State<IdentityState>,
    cookies: Cookies,
    AppQuery(query): AppQuery<UnlinkQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = session_user(&state, &cookies).await?;

    let user = state.reconciler.unlink(user, &query.provider).await?;

    // Re-establish the session after the provider change.
    session::establish(&cookies, &state.cookie_key, user.id);

    Ok(Response::from(UserResponse::from(user)))
}
