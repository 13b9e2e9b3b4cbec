use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

use crate::config::UserServiceConfig;
use crate::error::{UserError, UserResult};
use crate::models::{CreateUser, NewUser, Page, UniqueField, UpdateUser, UserFilter, UserResponse};
use crate::repository::UserRepository;

/// Business rules on top of a [`UserRepository`].
///
/// Holds no locks: concurrent writers are arbitrated by the store's
/// version check and nothing here retries.
#[derive(Clone)]
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
    config: UserServiceConfig,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repository: R) -> Self {
        Self::with_config(repository, UserServiceConfig::default())
    }

    pub fn with_config(repository: R, config: UserServiceConfig) -> Self {
        Self {
            repository: Arc::new(repository),
            config,
        }
    }

    pub fn config(&self) -> &UserServiceConfig {
        &self.config
    }

    pub async fn create_user(&self, input: CreateUser, actor: Option<&str>) -> UserResult<UserResponse> {
        input.validate()?;

        for field in UniqueField::ALL {
            let value = match field {
                UniqueField::Username => &input.username,
                UniqueField::Email => &input.email,
            };
            if self.repository.exists_by_unique(field, value, None).await? {
                return Err(UserError::AlreadyExists {
                    field,
                    value: value.clone(),
                });
            }
        }

        let password_hash = self.hash_password(&input.password)?;

        let created = self
            .repository
            .create(NewUser {
                username: input.username,
                email: input.email,
                full_name: input.full_name,
                password_hash,
                phone_number: input.phone_number,
                created_at: Utc::now(),
                created_by: actor.map(str::to_owned),
            })
            .await?;

        Ok(created.into())
    }

    pub async fn get_user(&self, id: i64) -> UserResult<UserResponse> {
        Ok(self.repository.get_by_id(id).await?.into())
    }

    pub async fn get_user_by_username(&self, username: &str) -> UserResult<UserResponse> {
        Ok(self
            .repository
            .get_by_unique(UniqueField::Username, username)
            .await?
            .into())
    }

    pub async fn get_user_by_email(&self, email: &str) -> UserResult<UserResponse> {
        Ok(self
            .repository
            .get_by_unique(UniqueField::Email, email)
            .await?
            .into())
    }

    pub async fn list_users(&self, mut filter: UserFilter) -> UserResult<Page<UserResponse>> {
        filter.size = self.config.page_size(filter.size);

        let (users, total) = self.repository.list(&filter).await?;
        Ok(Page::new(users, filter.page, filter.size, total).map(UserResponse::from))
    }

    /// Partial update guarded by `expected_version`
    pub async fn update_user(
        &self,
        id: i64,
        expected_version: i32,
        input: UpdateUser,
        actor: Option<&str>,
    ) -> UserResult<UserResponse> {
        input.validate()?;

        let mut user = self.repository.get_by_id(id).await?;

        if user.version != expected_version {
            tracing::debug!(user_id = id, expected_version, actual = user.version, "Stale update rejected");
            return Err(UserError::Conflict {
                id,
                expected: expected_version,
                actual: Some(user.version),
            });
        }

        for field in UniqueField::ALL {
            let Some(value) = input.unique_value(field) else {
                continue;
            };
            if value != user.unique_value(field)
                && self.repository.exists_by_unique(field, value, Some(id)).await?
            {
                return Err(UserError::AlreadyExists {
                    field,
                    value: value.to_string(),
                });
            }
        }

        let new_password_hash = input
            .password
            .as_deref()
            .map(|password| self.hash_password(password))
            .transpose()?;

        user.apply_update(input, new_password_hash);
        user.touch(actor, Utc::now());

        user.version = self
            .repository
            .compare_and_swap_update(&user, expected_version)
            .await?;

        Ok(user.into())
    }

    /// Soft delete guarded by `expected_version`
    pub async fn delete_user(&self, id: i64, expected_version: i32, actor: Option<&str>) -> UserResult<()> {
        self.repository
            .compare_and_swap_soft_delete(id, expected_version, actor.map(str::to_owned), Utc::now())
            .await?;
        Ok(())
    }

    pub async fn username_exists(&self, username: &str, exclude_id: Option<i64>) -> UserResult<bool> {
        self.repository
            .exists_by_unique(UniqueField::Username, username, exclude_id)
            .await
    }

    pub async fn email_exists(&self, email: &str, exclude_id: Option<i64>) -> UserResult<bool> {
        self.repository
            .exists_by_unique(UniqueField::Email, email, exclude_id)
            .await
    }

    /// Unknown, inactive and wrong-password logins are indistinguishable.
    pub async fn authenticate(&self, username: &str, password: &str) -> UserResult<UserResponse> {
        let user = match self
            .repository
            .get_by_unique(UniqueField::Username, username)
            .await
        {
            Ok(user) => user,
            Err(UserError::NotFound(_)) => return Err(UserError::InvalidCredentials),
            Err(e) => return Err(e),
        };

        if !user.is_active || !self.verify_password(password, &user.password_hash)? {
            tracing::debug!(user_id = user.id, "Rejected login");
            return Err(UserError::InvalidCredentials);
        }

        Ok(user.into())
    }

    fn hash_password(&self, password: &str) -> UserResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        self.config
            .password
            .hasher()?
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserError::PasswordHash(e.to_string()))
    }

    fn verify_password(&self, password: &str, hash: &str) -> UserResult<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| UserError::PasswordHash(e.to_string()))?;

        Ok(self
            .config
            .password
            .hasher()?
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}
