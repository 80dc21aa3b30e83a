use oauth2::{CsrfToken, PkceCodeVerifier};
use validator::Validate;

// ╔════════════════════════════╗
// ║         Signup             ║
// ╚════════════════════════════╝

#[derive(Debug, Validate)]
pub struct SignupInput {
    #[validate(length(min = 3, message = "must be at least 3 characters long"))]
    pub username: String,
    #[validate(length(min = 1, message = "display name cannot be empty"))]
    pub display_name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters long"))]
    pub password: String,
}

// ╔════════════════════════════╗
// ║         Sign-in            ║
// ╚════════════════════════════╝

#[derive(Debug, Validate)]
pub struct SigninInput {
    #[validate(length(min = 1, message = "username cannot be empty"))]
    pub username: String,
    #[validate(length(min = 1, message = "password cannot be empty"))]
    pub password: String,
}

// ╔════════════════════════════╗
// ║        OAuth Login         ║
// ╚════════════════════════════╝

#[derive(Debug, Validate)]
pub struct OAuthLoginInput {
    #[validate(length(min = 1, message = "provider cannot be empty"))]
    pub provider: String,
}

#[derive(Debug)]
pub struct OAuthLoginOutput {
    pub auth_url: String,
    pub csrf_token: CsrfToken,
    pub pkce_verifier: PkceCodeVerifier,
}

// ╔════════════════════════════╗
// ║      OAuth Callback        ║
// ╚════════════════════════════╝

#[derive(Debug, Validate)]
pub struct OAuthCallbackInput {
    #[validate(length(min = 1, message = "provider cannot be empty"))]
    pub provider: String,

    #[validate(length(min = 1, message = "code cannot be empty"))]
    pub code: String,

    pub pkce_verifier_secret: String,

    /// The authenticated user, when the callback arrives inside an existing
    /// session; drives linking instead of signin.
    pub session_user_id: Option<i64>,
}
