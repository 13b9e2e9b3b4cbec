//! Shared test infrastructure for the domain crates:
//! - `TestDatabase`: migrated store, SQLite in-memory by default or a
//!   PostgreSQL container (feature: "postgres")
//! - `TestDataBuilder`: deterministic, collision-free test data
//! - `assertions`: small assertion helpers
//!
//! ```rust,no_run
//! use test_utils::{TestDatabase, TestDataBuilder};
//!
//! # async fn example() {
//! let db = TestDatabase::sqlite().await;
//! let builder = TestDataBuilder::from_test_name("my_test");
//! let username = builder.username("main");
//! # }
//! ```

mod database;

pub use database::TestDatabase;

/// Seeded test data so names never collide across tests
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from the test name
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    fn tag(&self) -> String {
        format!("{:08x}", self.seed as u32)
    }

    /// A username of at most 50 characters for suffixes up to 36 characters
    pub fn username(&self, suffix: &str) -> String {
        format!("u{}_{}", self.tag(), suffix)
    }

    pub fn email(&self, suffix: &str) -> String {
        format!("{}.{}@example.test", suffix, self.tag())
    }

    pub fn full_name(&self, suffix: &str) -> String {
        format!("Test User {} {}", self.tag(), suffix)
    }

    /// Ten-digit phone number derived from the seed
    pub fn phone_number(&self) -> String {
        format!("+1{:010}", self.seed % 10_000_000_000)
    }
}

pub mod assertions {
    use std::fmt::Debug;

    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }

    /// Assert a version moved forward by exactly `steps`
    pub fn assert_version_advanced(before: i32, after: i32, steps: i32) {
        assert_eq!(
            after,
            before + steps,
            "expected version {} -> {}, got {}",
            before,
            before + steps,
            after
        );
    }

    /// Split results into successes and errors, asserting exactly one success
    pub fn assert_single_winner<T: Debug, E: Debug>(results: Vec<Result<T, E>>) -> (T, Vec<E>) {
        let (wins, losses): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
        assert_eq!(wins.len(), 1, "expected exactly one winner, got {:?}", wins);

        let winner = wins
            .into_iter()
            .next()
            .and_then(Result::ok)
            .unwrap_or_else(|| panic!("winner vanished"));
        let errors = losses.into_iter().filter_map(Result::err).collect();
        (winner, errors)
    }
}
