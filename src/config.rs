use anyhow::{anyhow, bail, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;

use crate::identity::TokenRegistry;

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

const DEFAULT_DATABASE_PATH: &str = "sheets.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub max_file_size: usize,
    pub database_path: String,
    pub tokens: TokenRegistry,
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = match lookup("BIND_ADDR") {
            Some(addr) => addr
                .parse()
                .map_err(|e| anyhow!("Invalid BIND_ADDR '{}': {}", addr, e))?,
            None => default_bind_addr(),
        };

        let max_file_size = match lookup("MAX_FILE_SIZE") {
            Some(size) => size
                .parse::<usize>()
                .map_err(|e| anyhow!("Invalid MAX_FILE_SIZE '{}': {}", size, e))?,
            None => default_max_file_size(),
        };
        if max_file_size == 0 {
            bail!("MAX_FILE_SIZE must be greater than zero");
        }

        let database_path =
            lookup("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

        let tokens = lookup("API_TOKENS")
            .ok_or_else(|| anyhow!("Failed to load API_TOKENS"))
            .and_then(|entries| TokenRegistry::parse(&entries))?;
        if tokens.is_empty() {
            bail!("API_TOKENS must define at least one token");
        }

        Ok(Config {
            bind_addr,
            max_file_size,
            database_path,
            tokens,
        })
    }
}

pub fn load_config() -> Result<Config> {
    Config::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("API_TOKENS", "t=alice")]).unwrap();
        assert_eq!(config.bind_addr, default_bind_addr());
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.database_path, "sheets.db");
        assert_eq!(config.tokens.len(), 1);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("API_TOKENS", "t=alice,u=root:admin"),
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("MAX_FILE_SIZE", "2048"),
            ("DATABASE_PATH", ":memory:"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_file_size, 2048);
        assert_eq!(config.database_path, ":memory:");
    }

    #[test]
    fn test_invalid_values() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[("API_TOKENS", "")]).is_err());
        assert!(config_from(&[("API_TOKENS", "t=a"), ("MAX_FILE_SIZE", "lots")]).is_err());
        assert!(config_from(&[("API_TOKENS", "t=a"), ("MAX_FILE_SIZE", "0")]).is_err());
        assert!(config_from(&[("API_TOKENS", "t=a"), ("BIND_ADDR", "nowhere")]).is_err());
    }
}
