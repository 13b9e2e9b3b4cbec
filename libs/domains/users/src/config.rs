use argon2::{Algorithm, Argon2, Params, Version};
use core_config::{env_parse, ConfigError, FromEnv};

use crate::error::{UserError, UserResult};

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordConfig {
    pub fn hasher(&self) -> UserResult<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| UserError::PasswordHash(e.to_string()))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserServiceConfig {
    /// Used when a listing asks for size 0
    pub default_page_size: u64,
    /// Larger requested sizes are clamped to this
    pub max_page_size: u64,
    pub password: PasswordConfig,
}

impl Default for UserServiceConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
            password: PasswordConfig::default(),
        }
    }
}

impl UserServiceConfig {
    pub fn with_password(mut self, password: PasswordConfig) -> Self {
        self.password = password;
        self
    }

    pub fn page_size(&self, requested: u64) -> u64 {
        match requested {
            0 => self.default_page_size,
            size => size.min(self.max_page_size),
        }
    }
}

/// Environment variables:
/// - `USERS_DEFAULT_PAGE_SIZE` (default 10)
/// - `USERS_MAX_PAGE_SIZE` (default 100)
/// - `PASSWORD_MEMORY_KIB`, `PASSWORD_ITERATIONS`, `PASSWORD_PARALLELISM`
///   (argon2 defaults)
impl FromEnv for UserServiceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = PasswordConfig::default();
        let config = Self {
            default_page_size: env_parse("USERS_DEFAULT_PAGE_SIZE", 10)?,
            max_page_size: env_parse("USERS_MAX_PAGE_SIZE", 100)?,
            password: PasswordConfig {
                memory_kib: env_parse("PASSWORD_MEMORY_KIB", defaults.memory_kib)?,
                iterations: env_parse("PASSWORD_ITERATIONS", defaults.iterations)?,
                parallelism: env_parse("PASSWORD_PARALLELISM", defaults.parallelism)?,
            },
        };

        if config.default_page_size == 0 || config.default_page_size > config.max_page_size {
            return Err(ConfigError::Invalid {
                key: "USERS_DEFAULT_PAGE_SIZE".to_string(),
                details: format!(
                    "must be between 1 and USERS_MAX_PAGE_SIZE ({})",
                    config.max_page_size
                ),
            });
        }

        config.password.hasher().map_err(|e| ConfigError::Invalid {
            key: "PASSWORD_MEMORY_KIB".to_string(),
            details: e.to_string(),
        })?;

        Ok(config)
    }
}
