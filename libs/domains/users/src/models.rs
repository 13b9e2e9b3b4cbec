use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::Validate;

/// Attributes that must be unique across stored users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UniqueField {
    Username,
    Email,
}

impl UniqueField {
    pub const ALL: [UniqueField; 2] = [UniqueField::Username, UniqueField::Email];

    pub fn as_str(&self) -> &'static str {
        match self {
            UniqueField::Username => "username",
            UniqueField::Email => "email",
        }
    }
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stored rows hold on to their unique values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniquenessScope {
    /// Soft-deleted users keep their username and email reserved
    #[default]
    AllRows,
    /// Soft deletion releases the values for reuse
    ActiveOnly,
}

impl UniquenessScope {
    pub fn occupies(&self, user: &User) -> bool {
        match self {
            UniquenessScope::AllRows => true,
            UniquenessScope::ActiveOnly => user.is_active,
        }
    }
}

/// Stored user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    /// Argon2id PHC string, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    /// Incremented by every successful update or soft delete
    pub version: i32,
}

impl User {
    pub fn unique_value(&self, field: UniqueField) -> &str {
        match field {
            UniqueField::Username => &self.username,
            UniqueField::Email => &self.email,
        }
    }

    /// Merge the fields present in `update`.
    ///
    /// `new_password_hash` must already be hashed. Identity, version and
    /// audit columns are left alone.
    pub fn apply_update(&mut self, update: UpdateUser, new_password_hash: Option<String>) {
        if let Some(username) = update.username {
            self.username = username;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(full_name) = update.full_name {
            self.full_name = full_name;
        }
        if let Some(phone_number) = update.phone_number {
            self.phone_number = Some(phone_number);
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        if let Some(hash) = new_password_hash {
            self.password_hash = hash;
        }
    }

    pub fn touch(&mut self, actor: Option<&str>, at: DateTime<Utc>) {
        self.updated_at = at;
        self.updated_by = actor.map(str::to_owned);
    }
}

/// Fully prepared row handed to the store; the store assigns id and version.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl NewUser {
    pub fn unique_value(&self, field: UniqueField) -> &str {
        match field {
            UniqueField::Username => &self.username,
            UniqueField::Email => &self.email,
        }
    }

    /// First stored state: active, version 1, updated_* equal to created_*.
    pub fn into_user(self, id: i64) -> User {
        User {
            id,
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            password_hash: self.password_hash,
            phone_number: self.phone_number,
            is_active: true,
            created_at: self.created_at,
            updated_at: self.created_at,
            updated_by: self.created_by.clone(),
            created_by: self.created_by,
            version: 1,
        }
    }
}

/// User as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub version: i32,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            phone_number: user.phone_number,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
            created_by: user.created_by,
            updated_by: user.updated_by,
            version: user.version,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 3, max = 50))]
    pub username: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(length(min = 6, max = 100))]
    pub password: String,
    #[validate(length(min = 10, max = 20))]
    pub phone_number: Option<String>,
}

/// Partial update: `None` leaves a field untouched.
///
/// The expected version is passed separately to the service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
pub struct UpdateUser {
    #[validate(length(min = 3, max = 50))]
    pub username: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(length(min = 6, max = 100))]
    pub password: Option<String>,
    #[validate(length(min = 10, max = 20))]
    pub phone_number: Option<String>,
    pub is_active: Option<bool>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn unique_value(&self, field: UniqueField) -> Option<&str> {
        match field {
            UniqueField::Username => self.username.as_deref(),
            UniqueField::Email => self.email.as_deref(),
        }
    }
}

/// Listing filters; `username` and `email` match substrings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserFilter {
    pub username: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
    /// Zero-based
    #[serde(default)]
    pub page: u64,
    /// Zero selects the configured default
    #[serde(default)]
    pub size: u64,
}

impl UserFilter {
    pub fn offset(&self) -> u64 {
        self.page.saturating_mul(self.size)
    }

    pub fn matches(&self, user: &User) -> bool {
        self.username
            .as_deref()
            .is_none_or(|needle| user.username.contains(needle))
            && self
                .email
                .as_deref()
                .is_none_or(|needle| user.email.contains(needle))
            && self.is_active.is_none_or(|active| user.is_active == active)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub size: u64,
    pub total: u64,
    /// At least 1, even for an empty result
    pub total_pages: u64,
    pub first: bool,
    pub last: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u64, size: u64, total: u64) -> Self {
        let total_pages = if size == 0 {
            1
        } else {
            total.div_ceil(size).max(1)
        };

        Self {
            items,
            page,
            size,
            total,
            total_pages,
            first: page == 0,
            last: page.saturating_add(1) >= total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total: self.total,
            total_pages: self.total_pages,
            first: self.first,
            last: self.last,
        }
    }
}
