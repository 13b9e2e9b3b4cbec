use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, SqlErr,
};

use crate::entity::{self, Column, Entity};
use crate::error::{UserError, UserLookup, UserResult};
use crate::models::{NewUser, UniqueField, User, UserFilter};
use crate::repository::UserRepository;

/// SeaORM-backed store, portable across PostgreSQL and SQLite.
///
/// Uniqueness is enforced by the `idx_users_username` and `idx_users_email`
/// indexes over all rows.
#[derive(Clone)]
pub struct SqlUserRepository {
    db: DatabaseConnection,
}

impl SqlUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn column(field: UniqueField) -> Column {
        match field {
            UniqueField::Username => Column::Username,
            UniqueField::Email => Column::Email,
        }
    }

    /// Resolve a zero-row CAS into `NotFound` or `Conflict`
    async fn missed(&self, id: i64, expected_version: i32) -> UserError {
        match Entity::find_by_id(id).one(&self.db).await {
            Ok(Some(current)) => {
                tracing::debug!(user_id = id, expected_version, actual = current.version, "Version mismatch");
                UserError::Conflict {
                    id,
                    expected: expected_version,
                    actual: Some(current.version),
                }
            }
            Ok(None) => UserError::NotFound(UserLookup::Id(id)),
            Err(e) => e.into(),
        }
    }
}

/// Map a unique-index violation to the field it guards
fn write_error(err: DbErr, username: &str, email: &str) -> UserError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => {
            let field = if message.contains("idx_users_email") || message.contains("users.email") {
                UniqueField::Email
            } else {
                UniqueField::Username
            };
            let value = match field {
                UniqueField::Username => username,
                UniqueField::Email => email,
            };
            UserError::AlreadyExists {
                field,
                value: value.to_string(),
            }
        }
        _ => err.into(),
    }
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn create(&self, user: NewUser) -> UserResult<User> {
        let (username, email) = (user.username.clone(), user.email.clone());
        let active: entity::ActiveModel = user.into();

        let model = active
            .insert(&self.db)
            .await
            .map_err(|e| write_error(e, &username, &email))?;

        tracing::info!(user_id = model.id, username = %model.username, "Created user");
        Ok(model.into())
    }

    async fn get_by_id(&self, id: i64) -> UserResult<User> {
        Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(User::from)
            .ok_or(UserError::NotFound(UserLookup::Id(id)))
    }

    async fn get_by_unique(&self, field: UniqueField, value: &str) -> UserResult<User> {
        Entity::find()
            .filter(Self::column(field).eq(value))
            .one(&self.db)
            .await?
            .map(User::from)
            .ok_or_else(|| UserError::NotFound(UserLookup::by_field(field, value)))
    }

    async fn compare_and_swap_update(&self, user: &User, expected_version: i32) -> UserResult<i32> {
        let Some(next_version) = expected_version.checked_add(1) else {
            return Err(self.missed(user.id, expected_version).await);
        };

        let result = Entity::update_many()
            .set(entity::ActiveModel::for_update(user, next_version))
            .filter(Column::Id.eq(user.id))
            .filter(Column::Version.eq(expected_version))
            .exec(&self.db)
            .await
            .map_err(|e| write_error(e, &user.username, &user.email))?;

        if result.rows_affected == 0 {
            return Err(self.missed(user.id, expected_version).await);
        }

        tracing::info!(user_id = user.id, version = next_version, "Updated user");
        Ok(next_version)
    }

    async fn compare_and_swap_soft_delete(
        &self,
        id: i64,
        expected_version: i32,
        actor: Option<String>,
        at: DateTime<Utc>,
    ) -> UserResult<i32> {
        let Some(next_version) = expected_version.checked_add(1) else {
            return Err(self.missed(id, expected_version).await);
        };
        let changes = entity::ActiveModel {
            is_active: Set(false),
            updated_at: Set(at.into()),
            updated_by: Set(actor),
            version: Set(next_version),
            id: NotSet,
            username: NotSet,
            email: NotSet,
            full_name: NotSet,
            password_hash: NotSet,
            phone_number: NotSet,
            created_at: NotSet,
            created_by: NotSet,
        };

        let result = Entity::update_many()
            .set(changes)
            .filter(Column::Id.eq(id))
            .filter(Column::Version.eq(expected_version))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(self.missed(id, expected_version).await);
        }

        tracing::info!(user_id = id, version = next_version, "Soft-deleted user");
        Ok(next_version)
    }

    async fn exists_by_unique(
        &self,
        field: UniqueField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> UserResult<bool> {
        let mut query = Entity::find().filter(Self::column(field).eq(value));
        if let Some(id) = exclude_id {
            query = query.filter(Column::Id.ne(id));
        }

        Ok(query.count(&self.db).await? > 0)
    }

    async fn list(&self, filter: &UserFilter) -> UserResult<(Vec<User>, u64)> {
        let mut query = Entity::find();

        if let Some(ref username) = filter.username {
            query = query.filter(Column::Username.contains(username));
        }
        if let Some(ref email) = filter.email {
            query = query.filter(Column::Email.contains(email));
        }
        if let Some(is_active) = filter.is_active {
            query = query.filter(Column::IsActive.eq(is_active));
        }

        let total = query.clone().count(&self.db).await?;

        let models = query
            .order_by_desc(Column::CreatedAt)
            .order_by_desc(Column::Id)
            .limit(filter.size)
            .offset(filter.offset())
            .all(&self.db)
            .await?;

        Ok((models.into_iter().map(User::from).collect(), total))
    }
}
