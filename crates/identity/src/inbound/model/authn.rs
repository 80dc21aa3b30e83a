use serde::{Deserialize, Serialize};

use crate::domain::entity::user::User;

// ╔════════════════════════════╗
// ║    Signup                  ║
// ╚════════════════════════════╝

#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub password: String,
}

// ╔════════════════════════════╗
// ║    Signin                  ║
// ╚════════════════════════════╝

#[derive(Deserialize)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

// ╔════════════════════════════╗
// ║    User                    ║
// ╚════════════════════════════╝

/// The public view of a user. Raw provider payloads and anything
/// credential-adjacent never leave the service.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub provider: String,
    pub additional_providers: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(output: User) -> Self {
        Self {
            id: output.id,
            username: output.username,
            display_name: output.display_name,
            email: output.email,
            provider: output.provider,
            additional_providers: output.additional_providers_data.keys().cloned().collect(),
            created_at: output.created_at.to_rfc3339(),
            updated_at: output.updated_at.to_rfc3339(),
        }
    }
}

// ╔════════════════════════════╗
// ║    OAuth Callback          ║
// ╚════════════════════════════╝

#[derive(Deserialize)]
pub struct OAuthCallbackRequest {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// ╔════════════════════════════╗
// ║    Unlink Provider         ║
// ╚════════════════════════════╝

#[derive(Deserialize)]
pub struct UnlinkQuery {
    pub provider: String,
}
