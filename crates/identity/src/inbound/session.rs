//! Cookie-based session management.
//!
//! The session is a private (encrypted) cookie holding the user id. Handlers
//! read it per request; nothing user-related is cached server side.

use app_core::error::AppError;
use tower_cookies::cookie::time;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies, Key};

const COOKIE_SESSION: &str = "__session";
const SESSION_TTL_DAYS: i64 = 7;

/// Starts (or replaces) the session for the given user.
pub fn establish(cookies: &Cookies, key: &Key, user_id: i64) {
    let cookie = Cookie::build((COOKIE_SESSION, user_id.to_string()))
        .http_only(true)
        .secure(true)
        .path("/")
        .max_age(time::Duration::days(SESSION_TTL_DAYS))
        .same_site(SameSite::Lax)
        .build();

    cookies.private(key).add(cookie);
}

pub fn clear(cookies: &Cookies, key: &Key) {
    let mut cookie = Cookie::new(COOKIE_SESSION, "");
    cookie.set_path("/");
    cookies.private(key).remove(cookie);
}

/// The signed-in user's id, if a session cookie is present.
///
/// A cookie that decrypts but does not hold a user id is an error; a missing
/// or undecryptable cookie is simply no session.
pub fn current_user_id(cookies: &Cookies, key: &Key) -> Result<Option<i64>, AppError> {
    match cookies.private(key).get(COOKIE_SESSION) {
        None => Ok(None),
        Some(cookie) => cookie
            .value()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| AppError::Session("Session cookie does not hold a user id".to_string())),
    }
}
