use std::sync::Arc;

use app_core::error::AppError;
use app_core::uid::Generator;
use async_trait::async_trait;

use crate::domain::entity::profile::ProviderProfile;
use crate::domain::entity::user::{NewUser, User};
use crate::outbound::repository::UserStore;

const MISSING_IDENTIFIER_MSG: &str = "Provider profile is missing its identifier value";
const MISSING_PROVIDER_MSG: &str = "Provider name is required";

/// Where a successful provider link sends the user.
const LINK_REDIRECT: &str = "/account-settings";

/// Reconciles external provider identities with local user accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReconcilerUseCase: Send + Sync {
    /// Given the authenticated user (if any) and a provider profile, links
    /// the provider to the user, finds the existing account for that
    /// identity, or creates a fresh account. Returns the resulting user and
    /// an optional post-auth redirect path.
    async fn reconcile(
        &self,
        session_user: Option<User>,
        profile: ProviderProfile,
    ) -> Result<(User, Option<String>), AppError>;

    /// Removes a linked additional provider from the user. Removing a
    /// provider that is not linked is a no-op.
    async fn unlink(&self, user: User, provider: &str) -> Result<User, AppError>;
}

#[derive(Clone)]
pub struct ReconcilerService {
    uid: Arc<dyn Generator>,
    store: Arc<dyn UserStore>,
}

impl ReconcilerService {
    pub fn new(uid: Arc<dyn Generator>, store: Arc<dyn UserStore>) -> Self {
        Self { uid, store }
    }

    /// Signs a visitor in by provider identity, creating an account when the
    /// identity is unknown.
    ///
    /// The lookup and the create are separate store calls, so two concurrent
    /// callbacks for the same new identity can race; the store's uniqueness
    /// constraints surface the loser as a store error.
    async fn sign_in_or_create(&self, profile: ProviderProfile) -> Result<User, AppError> {
        let identifier = profile
            .identifier()
            .ok_or_else(|| AppError::Precondition(MISSING_IDENTIFIER_MSG.to_string()))?;

        if let Some(user) = self
            .store
            .find_by_provider_identity(&profile.provider, &profile.identifier_field, &identifier)
            .await?
        {
            tracing::info!(user_id = user.id, provider = %profile.provider, "Existing provider identity signed in");
            return Ok(user);
        }

        let candidate = profile.username_candidate();
        let username = self.store.find_unique_username(&candidate, None).await?;

        let new_user = NewUser {
            id: self.uid.generate()?,
            username,
            display_name: profile.display_name.unwrap_or_default(),
            email: profile.email.unwrap_or_default(),
            provider: profile.provider,
            provider_data: Some(profile.data),
            password: None,
        };

        let user = self.store.create_user(&new_user).await?;
        tracing::info!(user_id = user.id, provider = %user.provider, "Created user from provider profile");

        Ok(user)
    }

    /// Attaches the profile's provider to the signed-in user as an
    /// additional connection.
    async fn link(&self, mut user: User, profile: ProviderProfile) -> Result<User, AppError> {
        if user.has_provider(&profile.provider) {
            return Err(AppError::AlreadyConnected(profile.provider));
        }

        user.additional_providers_data.insert(profile.provider, profile.data);
        self.store
            .update_additional_providers(user.id, &user.additional_providers_data)
            .await?;

        Ok(user)
    }
}

#[async_trait]
impl ReconcilerUseCase for ReconcilerService {
    async fn reconcile(
        &self,
        session_user: Option<User>,
        profile: ProviderProfile,
    ) -> Result<(User, Option<String>), AppError> {
        match session_user {
            None => {
                let user = self.sign_in_or_create(profile).await?;
                Ok((user, None))
            },
            Some(user) => {
                let user = self.link(user, profile).await?;
                Ok((user, Some(LINK_REDIRECT.to_string())))
            },
        }
    }

    async fn unlink(&self, mut user: User, provider: &str) -> Result<User, AppError> {
        if provider.is_empty() {
            return Err(AppError::Precondition(MISSING_PROVIDER_MSG.to_string()));
        }

        if user.additional_providers_data.remove(provider).is_some() {
            self.store
                .update_additional_providers(user.id, &user.additional_providers_data)
                .await?;
        }

        Ok(user)
    }
}
