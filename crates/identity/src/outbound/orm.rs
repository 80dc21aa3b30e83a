use std::collections::BTreeMap;
use std::sync::Arc;

use app_core::error::AppError;
use app_core::time::now_fixed;
use async_trait::async_trait;
use sea_orm::prelude::Expr;
use sea_orm::{
    ActiveValue, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    TransactionTrait,
};
use serde_json::Value;

use super::entity::prelude::{UserCredentials, Users};
use super::entity::{user_credentials, users};
use super::repository::UserStore;
use crate::domain::entity::user::{NewUser, User, UserCredential};

/// `IdentityORM` is the data access layer for user accounts.
///
/// It maps between SeaORM models and domain entities and implements the
/// provider-identity lookups over the JSONB columns.
pub struct IdentityORM {
    db: Arc<DatabaseConnection>,
}

impl IdentityORM {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Converts a `users::Model` into a `User` domain entity.
    fn to_user(&self, model: users::Model) -> Result<User, AppError> {
        let additional: BTreeMap<String, Value> = serde_json::from_value(model.additional_providers_data)?;

        Ok(User {
            id: model.id,
            username: model.username,
            display_name: model.display_name,
            email: model.email,
            provider: model.provider,
            provider_data: model.provider_data,
            additional_providers_data: additional,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }

    fn to_user_credential(&self, model: user_credentials::Model) -> UserCredential {
        UserCredential { password: model.hashed_password }
    }
}

#[async_trait]
impl UserStore for IdentityORM {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = Users::find()
            .filter(users::Column::Id.eq(id))
            .one(self.db.as_ref())
            .await?;

        user.map(|u| self.to_user(u)).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = Users::find()
            .filter(users::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await?;

        user.map(|u| self.to_user(u)).transpose()
    }

    async fn find_by_provider_identity(
        &self,
        provider: &str,
        identifier_field: &str,
        identifier: &str,
    ) -> Result<Option<User>, AppError> {
        // Either the primary provider matches with the identifier inside
        // provider_data, or the identifier sits under the provider's key in
        // additional_providers_data.
        let condition = Condition::any()
            .add(
                Condition::all()
                    .add(users::Column::Provider.eq(provider))
                    .add(Expr::cust_with_values("provider_data ->> ? = ?", [identifier_field, identifier])),
            )
            .add(Expr::cust_with_values(
                "additional_providers_data -> ? ->> ? = ?",
                [provider, identifier_field, identifier],
            ));

        let user = Users::find().filter(condition).one(self.db.as_ref()).await?;

        user.map(|u| self.to_user(u)).transpose()
    }

    async fn find_unique_username(&self, candidate: &str, seed: Option<u32>) -> Result<String, AppError> {
        let mut suffix = seed;

        loop {
            let username = match suffix {
                Some(n) => format!("{candidate}{n}"),
                None => candidate.to_string(),
            };

            let taken = Users::find()
                .filter(users::Column::Username.eq(&username))
                .one(self.db.as_ref())
                .await?
                .is_some();

            if !taken {
                return Ok(username);
            }

            suffix = Some(suffix.unwrap_or(0) + 1);
        }
    }

    async fn find_credential_by_user_id(&self, user_id: i64) -> Result<Option<UserCredential>, AppError> {
        let model = UserCredentials::find()
            .filter(user_credentials::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(|m| self.to_user_credential(m)))
    }

    async fn create_user(&self, new_user: &NewUser) -> Result<User, AppError> {
        let now = now_fixed();

        let model = users::Model {
            id: new_user.id,
            username: new_user.username.clone(),
            display_name: new_user.display_name.clone(),
            email: new_user.email.clone(),
            provider: new_user.provider.clone(),
            provider_data: new_user.provider_data.clone(),
            additional_providers_data: Value::Object(serde_json::Map::new()),
            created_at: now,
            updated_at: now,
        };

        let txn = self.db.begin().await?;

        Users::insert(model.clone().into_active_model()).exec(&txn).await?;

        if let Some(hashed_password) = &new_user.password {
            let cred_model = user_credentials::ActiveModel {
                user_id: ActiveValue::Set(new_user.id),
                hashed_password: ActiveValue::Set(hashed_password.clone()),
                created_at: ActiveValue::Set(now),
            };
            UserCredentials::insert(cred_model).exec(&txn).await?;
        }

        txn.commit().await?;

        self.to_user(model)
    }

    async fn update_additional_providers(
        &self,
        user_id: i64,
        additional: &BTreeMap<String, Value>,
    ) -> Result<(), AppError> {
        let result = Users::update_many()
            .col_expr(users::Column::AdditionalProvidersData, Expr::value(serde_json::to_value(additional)?))
            .col_expr(users::Column::UpdatedAt, Expr::value(now_fixed()))
            .filter(users::Column::Id.eq(user_id))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        Ok(())
    }
}
