use std::collections::BTreeMap;

use app_core::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::entity::user::{NewUser, User, UserCredential};

/// Persistence port for user accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Looks a user up by a provider identity: either the primary provider
    /// with a matching identifier inside `provider_data`, or a matching
    /// identifier inside `additional_providers_data` under the provider's
    /// key.
    async fn find_by_provider_identity(
        &self,
        provider: &str,
        identifier_field: &str,
        identifier: &str,
    ) -> Result<Option<User>, AppError>;

    /// Returns `candidate` (plus `seed` when given) if free, otherwise the
    /// first free `candidate<n>` counting up from `seed`.
    async fn find_unique_username(&self, candidate: &str, seed: Option<u32>) -> Result<String, AppError>;

    async fn find_credential_by_user_id(&self, user_id: i64) -> Result<Option<UserCredential>, AppError>;

    async fn create_user(&self, new_user: &NewUser) -> Result<User, AppError>;

    /// Replaces the user's additional provider map wholesale.
    async fn update_additional_providers(
        &self,
        user_id: i64,
        additional: &BTreeMap<String, Value>,
    ) -> Result<(), AppError>;
}
