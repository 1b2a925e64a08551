//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;

use ironwake_core::config::RulesConfig;

use crate::error::AppError;

/// Broadcast channel depth when `BROADCAST_CAPACITY` is unset.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Process-level settings for the authority server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Postgres URL; without one snapshots stay in memory.
    pub database_url: Option<String>,
    /// YAML rules file; defaults apply when absent.
    pub rules_path: Option<PathBuf>,
    /// Depth of the broadcast and refresh channels.
    pub broadcast_capacity: usize,
    /// OTLP collector endpoint for span export.
    pub otlp_endpoint: Option<String>,
    /// Fixed dice seed, for reproducible sessions.
    pub rng_seed: Option<u64>,
}

impl ServerConfig {
    /// Read the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but malformed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| AppError::Config(format!("PORT must be a valid u16: {e}")))?,
            None => 3000,
        };
        let broadcast_capacity = match non_empty("BROADCAST_CAPACITY") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(0) | Err(_) => {
                    return Err(AppError::Config(format!(
                        "BROADCAST_CAPACITY must be a positive integer, got {raw:?}"
                    )));
                }
                Ok(capacity) => capacity,
            },
            None => DEFAULT_BROADCAST_CAPACITY,
        };
        let rng_seed = non_empty("RNG_SEED")
            .map(|raw| {
                raw.parse()
                    .map_err(|e| AppError::Config(format!("RNG_SEED must be a valid u64: {e}")))
            })
            .transpose()?;

        Ok(Self {
            host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url: non_empty("DATABASE_URL"),
            rules_path: non_empty("RULES_CONFIG_PATH").map(PathBuf::from),
            broadcast_capacity,
            otlp_endpoint: non_empty("OTEL_EXPORTER_OTLP_ENDPOINT"),
            rng_seed,
        })
    }

    /// The socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` does not parse.
    pub fn addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }

    /// Load the rules file, or the defaults when none is configured.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Rules` if the file cannot be read or is invalid.
    pub fn load_rules(&self) -> Result<RulesConfig, AppError> {
        match &self.rules_path {
            Some(path) => Ok(RulesConfig::from_path(path)?),
            None => Ok(RulesConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_url, None);
        assert_eq!(config.broadcast_capacity, DEFAULT_BROADCAST_CAPACITY);
        assert_eq!(config.otlp_endpoint, None);
        assert_eq!(config.load_rules().unwrap(), RulesConfig::default());
    }

    #[test]
    fn test_reads_every_variable() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/ironwake"),
            ("BROADCAST_CAPACITY", "16"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
            ("RNG_SEED", "42"),
        ]))
        .unwrap();

        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:8080");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/ironwake")
        );
        assert_eq!(config.broadcast_capacity, 16);
        assert_eq!(config.rng_seed, Some(42));
    }

    #[test]
    fn test_blank_database_url_means_in_memory() {
        let config = ServerConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap();

        assert_eq!(config.database_url, None);
    }

    #[test]
    fn test_invalid_port_is_a_config_error() {
        let result = ServerConfig::from_lookup(lookup(&[("PORT", "seventy")]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_zero_broadcast_capacity_is_rejected() {
        let result = ServerConfig::from_lookup(lookup(&[("BROADCAST_CAPACITY", "0")]));

        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_missing_rules_file_is_a_rules_error() {
        let config =
            ServerConfig::from_lookup(lookup(&[("RULES_CONFIG_PATH", "/nonexistent/rules.yaml")]))
                .unwrap();

        assert!(matches!(config.load_rules(), Err(AppError::Rules(_))));
    }
}
