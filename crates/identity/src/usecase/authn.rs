use std::sync::Arc;

use app_core::error::AppError;
use app_core::oauth::OAuthManager;
use app_core::password::Hasher;
use app_core::uid::Generator;
use async_trait::async_trait;
use validator::Validate;

use crate::domain::entity::profile::ProviderProfile;
use crate::domain::entity::user::{LOCAL_PROVIDER, NewUser, User};
use crate::domain::inout::prelude::*;
use crate::outbound::repository::UserStore;
use crate::usecase::reconcile::ReconcilerUseCase;

const INVALID_CREDENTIALS_MSG: &str = "Invalid username or password";
const USERNAME_EXISTS_MSG: &str = "A user with this username already exists";
const USER_NOT_FOUND_MSG: &str = "User not found";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthnUseCase: Send + Sync {
    async fn signup(&self, input: SignupInput) -> Result<User, AppError>;
    async fn signin(&self, input: SigninInput) -> Result<User, AppError>;
    async fn current_user(&self, user_id: i64) -> Result<User, AppError>;
    async fn oauth_login(&self, input: OAuthLoginInput) -> Result<OAuthLoginOutput, AppError>;
    async fn oauth_callback(&self, input: OAuthCallbackInput) -> Result<(User, Option<String>), AppError>;
}

#[derive(Clone)]
pub struct AuthnService {
    hasher: Arc<dyn Hasher>,
    uid: Arc<dyn Generator>,
    oauth: OAuthManager,
    store: Arc<dyn UserStore>,
    reconciler: Arc<dyn ReconcilerUseCase>,
}

impl AuthnService {
    pub fn new(
        hasher: Arc<dyn Hasher>,
        uid: Arc<dyn Generator>,
        oauth: OAuthManager,
        store: Arc<dyn UserStore>,
        reconciler: Arc<dyn ReconcilerUseCase>,
    ) -> Self {
        Self { hasher, uid, oauth, store, reconciler }
    }
}

#[async_trait]
impl AuthnUseCase for AuthnService {
    async fn signup(&self, input: SignupInput) -> Result<User, AppError> {
        input.validate()?;

        let username = input.username.trim().to_lowercase();

        if self.store.find_by_username(&username).await?.is_some() {
            return Err(AppError::Conflict(USERNAME_EXISTS_MSG.to_string()));
        }

        let new_user = NewUser {
            id: self.uid.generate()?,
            username,
            display_name: input.display_name,
            email: input.email.trim().to_lowercase(),
            provider: LOCAL_PROVIDER.to_string(),
            provider_data: None,
            password: Some(self.hasher.hash(&input.password)?),
        };

        let user = self.store.create_user(&new_user).await?;
        tracing::info!(user_id = user.id, "User signed up");

        Ok(user)
    }

    async fn signin(&self, input: SigninInput) -> Result<User, AppError> {
        input.validate()?;

        let user = self
            .store
            .find_by_username(&input.username.to_lowercase())
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS_MSG.to_string()))?;

        let credential = self
            .store
            .find_credential_by_user_id(user.id)
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS_MSG.to_string()))?;

        if !self.hasher.verify(&input.password, &credential.password)? {
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS_MSG.to_string()));
        }

        Ok(user)
    }

    async fn current_user(&self, user_id: i64) -> Result<User, AppError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(USER_NOT_FOUND_MSG.to_string()))
    }

    async fn oauth_login(&self, input: OAuthLoginInput) -> Result<OAuthLoginOutput, AppError> {
        input.validate()?;

        let provider = self.oauth.get_provider(&input.provider)?;
        let details = provider.get_authorization_details();

        Ok(OAuthLoginOutput {
            auth_url: details.url,
            csrf_token: details.csrf_token,
            pkce_verifier: details.pkce_verifier,
        })
    }

    async fn oauth_callback(&self, input: OAuthCallbackInput) -> Result<(User, Option<String>), AppError> {
        input.validate()?;

        let provider = self.oauth.get_provider(&input.provider)?;

        let access_token = provider.exchange_code(input.code, input.pkce_verifier_secret).await?;
        let raw_profile = provider.get_user_profile(&access_token).await?;

        let profile = ProviderProfile {
            provider: input.provider,
            identifier_field: raw_profile.identifier_field.to_string(),
            data: raw_profile.data,
            display_name: raw_profile.display_name,
            email: raw_profile.email,
            username_hint: raw_profile.username,
        };

        let session_user = match input.session_user_id {
            Some(id) => self.store.find_by_id(id).await?,
            None => None,
        };

        self.reconciler.reconcile(session_user, profile).await
    }
}
