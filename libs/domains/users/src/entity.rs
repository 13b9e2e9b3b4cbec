use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;

use crate::models::{NewUser, User};

/// SeaORM entity for the `users` table
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for User {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            full_name: model.full_name,
            password_hash: model.password_hash,
            phone_number: model.phone_number,
            is_active: model.is_active,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
            created_by: model.created_by,
            updated_by: model.updated_by,
            version: model.version,
        }
    }
}

impl From<NewUser> for ActiveModel {
    fn from(input: NewUser) -> Self {
        ActiveModel {
            id: NotSet,
            username: Set(input.username),
            email: Set(input.email),
            full_name: Set(input.full_name),
            password_hash: Set(input.password_hash),
            phone_number: Set(input.phone_number),
            is_active: Set(true),
            created_at: Set(input.created_at.into()),
            updated_at: Set(input.created_at.into()),
            updated_by: Set(input.created_by.clone()),
            created_by: Set(input.created_by),
            version: Set(1),
        }
    }
}

impl ActiveModel {
    /// Every mutable column of `user`, with the version set to `next_version`.
    ///
    /// Identity and creation audit stay `NotSet` so an update never writes them.
    pub fn for_update(user: &User, next_version: i32) -> Self {
        ActiveModel {
            id: NotSet,
            username: Set(user.username.clone()),
            email: Set(user.email.clone()),
            full_name: Set(user.full_name.clone()),
            password_hash: Set(user.password_hash.clone()),
            phone_number: Set(user.phone_number.clone()),
            is_active: Set(user.is_active),
            updated_at: Set(user.updated_at.into()),
            updated_by: Set(user.updated_by.clone()),
            created_at: NotSet,
            created_by: NotSet,
            version: Set(next_version),
        }
    }
}
