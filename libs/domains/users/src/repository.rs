use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{UserError, UserLookup, UserResult};
use crate::models::{NewUser, UniqueField, UniquenessScope, User, UserFilter};

/// Versioned user store.
///
/// Mutations are compare-and-swap on `version`. When nothing matched, the
/// implementation re-reads the row to report `NotFound` or `Conflict`.
/// Errors of one kind are never turned into another.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert at version 1. Duplicate unique values fail with `AlreadyExists`.
    async fn create(&self, user: NewUser) -> UserResult<User>;

    /// Inactive users are returned too
    async fn get_by_id(&self, id: i64) -> UserResult<User>;

    async fn get_by_unique(&self, field: UniqueField, value: &str) -> UserResult<User>;

    /// Write every mutable column of `user` if the stored version still equals
    /// `expected_version`. Returns the new version.
    async fn compare_and_swap_update(&self, user: &User, expected_version: i32) -> UserResult<i32>;

    /// Mark inactive and stamp the update audit, under the same version check
    async fn compare_and_swap_soft_delete(
        &self,
        id: i64,
        expected_version: i32,
        actor: Option<String>,
        at: DateTime<Utc>,
    ) -> UserResult<i32>;

    async fn exists_by_unique(
        &self,
        field: UniqueField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> UserResult<bool>;

    /// One page ordered newest first, plus the filtered total
    async fn list(&self, filter: &UserFilter) -> UserResult<(Vec<User>, u64)>;
}

#[derive(Debug, Default)]
struct Table {
    rows: HashMap<i64, User>,
    last_id: i64,
}

impl Table {
    fn occupant(
        &self,
        scope: UniquenessScope,
        field: UniqueField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> Option<&User> {
        self.rows.values().find(|u| {
            Some(u.id) != exclude_id && scope.occupies(u) && u.unique_value(field) == value
        })
    }

    fn versioned(&mut self, id: i64, expected_version: i32) -> UserResult<&mut User> {
        let row = self
            .rows
            .get_mut(&id)
            .ok_or(UserError::NotFound(UserLookup::Id(id)))?;

        if row.version != expected_version {
            return Err(UserError::Conflict {
                id,
                expected: expected_version,
                actual: Some(row.version),
            });
        }
        Ok(row)
    }

    /// Version a CAS against `expected_version` would commit
    fn next_version(&mut self, id: i64, expected_version: i32) -> UserResult<i32> {
        let row = self.versioned(id, expected_version)?;
        row.version.checked_add(1).ok_or(UserError::Conflict {
            id,
            expected: expected_version,
            actual: Some(row.version),
        })
    }
}

/// In-memory store with the same semantics as the SQL one.
///
/// Each check-then-write runs under a single write guard.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    table: Arc<RwLock<Table>>,
    scope: UniquenessScope,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_uniqueness_scope(scope: UniquenessScope) -> Self {
        Self {
            table: Arc::default(),
            scope,
        }
    }

    pub fn uniqueness_scope(&self) -> UniquenessScope {
        self.scope
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: NewUser) -> UserResult<User> {
        let mut table = self.table.write().await;

        for field in UniqueField::ALL {
            let value = user.unique_value(field);
            if table.occupant(self.scope, field, value, None).is_some() {
                return Err(UserError::AlreadyExists {
                    field,
                    value: value.to_string(),
                });
            }
        }

        table.last_id += 1;
        let user = user.into_user(table.last_id);
        table.rows.insert(user.id, user.clone());

        tracing::info!(user_id = user.id, username = %user.username, "Created user");
        Ok(user)
    }

    async fn get_by_id(&self, id: i64) -> UserResult<User> {
        let table = self.table.read().await;
        table
            .rows
            .get(&id)
            .cloned()
            .ok_or(UserError::NotFound(UserLookup::Id(id)))
    }

    async fn get_by_unique(&self, field: UniqueField, value: &str) -> UserResult<User> {
        let table = self.table.read().await;

        // With ActiveOnly several rows may share a value; prefer the active one.
        table
            .rows
            .values()
            .filter(|u| u.unique_value(field) == value)
            .max_by_key(|u| (u.is_active, u.id))
            .cloned()
            .ok_or_else(|| UserError::NotFound(UserLookup::by_field(field, value)))
    }

    async fn compare_and_swap_update(&self, user: &User, expected_version: i32) -> UserResult<i32> {
        let mut table = self.table.write().await;

        let next_version = table.next_version(user.id, expected_version)?;

        if self.scope.occupies(user) {
            for field in UniqueField::ALL {
                let value = user.unique_value(field);
                if table.occupant(self.scope, field, value, Some(user.id)).is_some() {
                    return Err(UserError::AlreadyExists {
                        field,
                        value: value.to_string(),
                    });
                }
            }
        }

        let row = table.versioned(user.id, expected_version)?;
        *row = User {
            version: next_version,
            created_at: row.created_at,
            created_by: row.created_by.clone(),
            ..user.clone()
        };

        tracing::info!(user_id = user.id, version = row.version, "Updated user");
        Ok(row.version)
    }

    async fn compare_and_swap_soft_delete(
        &self,
        id: i64,
        expected_version: i32,
        actor: Option<String>,
        at: DateTime<Utc>,
    ) -> UserResult<i32> {
        let mut table = self.table.write().await;
        let next_version = table.next_version(id, expected_version)?;
        let row = table.versioned(id, expected_version)?;

        row.is_active = false;
        row.updated_at = at;
        row.updated_by = actor;
        row.version = next_version;

        tracing::info!(user_id = id, version = row.version, "Soft-deleted user");
        Ok(row.version)
    }

    async fn exists_by_unique(
        &self,
        field: UniqueField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> UserResult<bool> {
        let table = self.table.read().await;
        Ok(table.occupant(self.scope, field, value, exclude_id).is_some())
    }

    async fn list(&self, filter: &UserFilter) -> UserResult<(Vec<User>, u64)> {
        let table = self.table.read().await;

        let mut matched: Vec<&User> = table.rows.values().filter(|u| filter.matches(u)).collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.size as usize)
            .cloned()
            .collect();

        Ok((items, total))
    }
}
