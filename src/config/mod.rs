// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

//! Configuration module for the connection refresher
//!
//! Loads and parses configuration from environment variables and JSON.

use std::time::Duration;

use crate::error::{AppError, Result};
use crate::pool::TableDefinitions;


/// Default configuration values
pub mod defaults {
    pub const SERVER_ADDR: &str = "0.0.0.0:3000";
    pub const MAX_REQUESTS: usize = 1;
    pub const CONNECTION_HANDLER: &str = "primary";
    pub const POOL_MAX_IDLE_SECONDS: u64 = 300;
}

/// Environment variable names used by the application
pub mod env_vars {
    pub const SERVER_ADDR: &str = "SERVER_ADDR";
    pub const MAX_REQUESTS: &str = "REFRESH_MAX_REQUESTS";
    pub const SCHEMA_CACHE_TARGET: &str = "REFRESH_SCHEMA_CACHE_TARGET";
    pub const CONNECTION_HANDLERS: &str = "CONNECTION_HANDLERS";
    pub const SCHEMA_TABLES: &str = "SCHEMA_TABLES";
    pub const POOL_MAX_IDLE_SECONDS: &str = "POOL_MAX_IDLE_SECONDS";
}

/// Application-wide configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_addr: String,
    /// Full recycle every this many requests
    pub max_requests: usize,
    /// Handler whose live connection carries the schema cache
    pub schema_cache_target: String,
    pub connection_handlers: Vec<String>,
    pub schema_tables: TableDefinitions,
    pub pool_max_idle_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_addr: defaults::SERVER_ADDR.to_string(),
            max_requests: defaults::MAX_REQUESTS,
            schema_cache_target: defaults::CONNECTION_HANDLER.to_string(),
            connection_handlers: vec![defaults::CONNECTION_HANDLER.to_string()],
            schema_tables: TableDefinitions::new(),
            pool_max_idle_secs: defaults::POOL_MAX_IDLE_SECONDS,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from any key lookup, falling back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let server_addr =
            lookup(env_vars::SERVER_ADDR).unwrap_or_else(|| defaults::SERVER_ADDR.to_string());

        let max_requests = match lookup(env_vars::MAX_REQUESTS) {
            Some(value) => value.trim().parse::<usize>().unwrap_or_else(|e| {
                tracing::warn!(
                    "Failed to parse {}='{}': {}. Using {}.",
                    env_vars::MAX_REQUESTS,
                    value,
                    e,
                    defaults::MAX_REQUESTS
                );
                defaults::MAX_REQUESTS
            }),
            None => defaults::MAX_REQUESTS,
        };

        let connection_handlers = match lookup(env_vars::CONNECTION_HANDLERS) {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!(
                    "Failed to parse {}: {}. Using a single '{}' handler.",
                    env_vars::CONNECTION_HANDLERS,
                    e,
                    defaults::CONNECTION_HANDLER
                );
                vec![defaults::CONNECTION_HANDLER.to_string()]
            }),
            None => vec![defaults::CONNECTION_HANDLER.to_string()],
        };

        // Target defaults to the primary (first) handler
        let schema_cache_target = lookup(env_vars::SCHEMA_CACHE_TARGET)
            .or_else(|| connection_handlers.first().cloned())
            .unwrap_or_else(|| defaults::CONNECTION_HANDLER.to_string());

        let schema_tables = match lookup(env_vars::SCHEMA_TABLES) {
            Some(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!(
                    "Failed to parse {}: {}. Using no tables.",
                    env_vars::SCHEMA_TABLES,
                    e
                );
                TableDefinitions::new()
            }),
            None => TableDefinitions::new(),
        };

        let pool_max_idle_secs = lookup(env_vars::POOL_MAX_IDLE_SECONDS)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::POOL_MAX_IDLE_SECONDS);

        Config {
            server_addr,
            max_requests,
            schema_cache_target,
            connection_handlers,
            schema_tables,
            pool_max_idle_secs,
        }
    }

    pub fn pool_max_idle_time(&self) -> Duration {
        Duration::from_secs(self.pool_max_idle_secs)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_requests == 0 {
            return Err(AppError::Config(format!(
                "{} must be at least 1",
                env_vars::MAX_REQUESTS
            )));
        }

        if self
            .connection_handlers
            .iter()
            .any(|name| name.trim().is_empty())
        {
            return Err(AppError::Config(
                "Connection handler name cannot be empty".to_string(),
            ));
        }

        if !self.connection_handlers.contains(&self.schema_cache_target) {
            return Err(AppError::Config(format!(
                "Schema cache target '{}' is not a configured connection handler",
                self.schema_cache_target
            )));
        }

        Ok(())
    }
}
