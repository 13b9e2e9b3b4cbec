//! Configuration for the users CLI

use core_config::{ConfigError, Environment, FromEnv};
use database::postgres::PostgresConfig;
use domain_users::UserServiceConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database: PostgresConfig,
    pub users: UserServiceConfig,
}

impl FromEnv for Config {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            environment: Environment::from_env(),
            database: PostgresConfig::from_env()?,
            users: UserServiceConfig::from_env()?,
        })
    }
}
