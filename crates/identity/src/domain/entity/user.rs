use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Provider name for accounts created through signup with a password.
pub const LOCAL_PROVIDER: &str = "local";

/// A local user account.
///
/// `provider` names the primary identity provider (`"local"` or an OAuth
/// provider); `provider_data` holds that provider's raw profile payload.
/// Every further linked provider lives in `additional_providers_data`, keyed
/// by provider name. A provider name appears at most once across both.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub provider: String,
    pub provider_data: Option<Value>,
    pub additional_providers_data: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// True when the provider is this user's primary provider or one of the
    /// additional connections.
    pub fn has_provider(&self, provider: &str) -> bool {
        self.provider == provider || self.additional_providers_data.contains_key(provider)
    }
}

#[derive(Debug)]
pub struct NewUser {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub provider: String,
    pub provider_data: Option<Value>,
    /// Argon2 hash; only present for `"local"` signups.
    pub password: Option<String>,
}

/// The secret material for a local account, stored apart from the user row.
#[derive(Debug, Clone)]
pub struct UserCredential {
    pub password: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn user_with_providers(primary: &str, additional: &[&str]) -> User {
        User {
            id: 1,
            username: "jdoe".to_string(),
            display_name: "J. Doe".to_string(),
            email: "jdoe@example.com".to_string(),
            provider: primary.to_string(),
            provider_data: Some(json!({"id": "p-1"})),
            additional_providers_data: additional
                .iter()
                .map(|p| (p.to_string(), json!({"id": "a-1"})))
                .collect(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_has_provider_matches_primary() {
        let user = user_with_providers("google", &[]);

        assert!(user.has_provider("google"));
        assert!(!user.has_provider("github"));
    }

    #[test]
    fn test_has_provider_matches_additional() {
        let user = user_with_providers("local", &["github", "google"]);

        assert!(user.has_provider("local"));
        assert!(user.has_provider("github"));
        assert!(user.has_provider("google"));
        assert!(!user.has_provider("facebook"));
    }
}
