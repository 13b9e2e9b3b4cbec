//! Users Domain
//!
//! Versioned user records with optimistic concurrency.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Service   │  ← uniqueness checks, hashing, merge, audit stamping
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← compare-and-swap on `version` (in-memory + SQL)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← entity, DTOs, filters, pages
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_users::{CreateUser, InMemoryUserRepository, UpdateUser, UserService};
//!
//! # async fn example() -> domain_users::UserResult<()> {
//! let service = UserService::new(InMemoryUserRepository::new());
//!
//! let alice = service
//!     .create_user(
//!         CreateUser {
//!             username: "alice".into(),
//!             email: "alice@example.com".into(),
//!             full_name: "Alice".into(),
//!             password: "wonderland".into(),
//!             phone_number: None,
//!         },
//!         Some("admin"),
//!     )
//!     .await?;
//!
//! let renamed = UpdateUser {
//!     full_name: Some("Alice Liddell".into()),
//!     ..Default::default()
//! };
//! service.update_user(alice.id, alice.version, renamed, Some("admin")).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;
pub mod sql;

pub use config::{PasswordConfig, UserServiceConfig};
pub use error::{UserError, UserLookup, UserResult};
pub use models::{
    CreateUser, NewUser, Page, UniqueField, UniquenessScope, UpdateUser, User, UserFilter,
    UserResponse,
};
pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::UserService;
pub use sql::SqlUserRepository;
