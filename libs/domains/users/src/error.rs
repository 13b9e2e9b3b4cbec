use sea_orm::DbErr;
use std::fmt;
use thiserror::Error;

use crate::models::UniqueField;

/// What a failed lookup was keyed on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Id(i64),
    Username(String),
    Email(String),
}

impl UserLookup {
    pub fn by_field(field: UniqueField, value: &str) -> Self {
        match field {
            UniqueField::Username => UserLookup::Username(value.to_string()),
            UniqueField::Email => UserLookup::Email(value.to_string()),
        }
    }
}

impl fmt::Display for UserLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserLookup::Id(id) => write!(f, "id {id}"),
            UserLookup::Username(username) => write!(f, "username '{username}'"),
            UserLookup::Email(email) => write!(f, "email '{email}'"),
        }
    }
}

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found by {0}")]
    NotFound(UserLookup),

    #[error("User with {field} '{value}' already exists")]
    AlreadyExists { field: UniqueField, value: String },

    #[error("Version mismatch for user {id}: expected {expected}, found {}", found(.actual))]
    Conflict {
        id: i64,
        expected: i32,
        actual: Option<i32>,
    },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

fn found(actual: &Option<i32>) -> String {
    actual.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

pub type UserResult<T> = Result<T, UserError>;

impl UserError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            UserError::NotFound(_) => "USER_NOT_FOUND",
            UserError::AlreadyExists {
                field: UniqueField::Username,
                ..
            } => "USERNAME_ALREADY_EXISTS",
            UserError::AlreadyExists {
                field: UniqueField::Email,
                ..
            } => "EMAIL_ALREADY_EXISTS",
            UserError::Conflict { .. } => "VERSION_MISMATCH",
            UserError::Validation(_) => "VALIDATION_ERROR",
            UserError::InvalidCredentials => "INVALID_CREDENTIALS",
            UserError::PasswordHash(_) => "INTERNAL_ERROR",
            UserError::StoreUnavailable(_) => "DATABASE_QUERY_ERROR",
        }
    }

    /// Caused by the request rather than the system
    pub fn is_client_error(&self) -> bool {
        match self {
            UserError::NotFound(_)
            | UserError::AlreadyExists { .. }
            | UserError::Conflict { .. }
            | UserError::Validation(_)
            | UserError::InvalidCredentials => true,
            UserError::PasswordHash(_) | UserError::StoreUnavailable(_) => false,
        }
    }
}

impl From<validator::ValidationErrors> for UserError {
    fn from(errors: validator::ValidationErrors) -> Self {
        UserError::Validation(errors.to_string())
    }
}

impl From<DbErr> for UserError {
    fn from(err: DbErr) -> Self {
        UserError::StoreUnavailable(err.to_string())
    }
}
