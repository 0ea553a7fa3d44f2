//! Configuration management
//!
//! This module handles loading and parsing configuration for the LMS backend.
//! Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable holding the SQLite connection URL
pub const ENV_DATABASE_URI: &str = "DATABASE_URI";

/// Environment variable holding the signing secret
pub const ENV_SECRET: &str = "PAYLOAD_SECRET";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Secret configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// CORS configuration
    #[serde(default)]
    pub cors: CorsConfig,
    /// Type generation configuration
    #[serde(default)]
    pub typegen: TypegenConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL (`sqlite:...`, a plain file path or `:memory:`)
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "data/lms.db".to_string()
}

fn default_max_connections() -> u32 {
    20
}

/// Secret used for signing. Empty when not configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub secret: String,
}

impl AuthConfig {
    /// Whether a non-empty secret is configured
    pub fn has_secret(&self) -> bool {
        !self.secret.is_empty()
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Exact origins allowed to make cross-origin requests
    #[serde(default = "default_cors_origins")]
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: default_cors_origins(),
        }
    }
}

fn default_cors_origins() -> Vec<String> {
    vec![
        // Svelte frontend
        "http://localhost:5173".to_string(),
        // HTMX frontend
        "http://localhost:8080".to_string(),
        // the backend itself
        "http://localhost:3000".to_string(),
    ]
}

impl CorsConfig {
    /// Check if an origin is on the allow list
    pub fn is_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }
}

/// Type generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypegenConfig {
    /// Where the generated TypeScript declarations are written
    #[serde(default = "default_typegen_output")]
    pub output_file: PathBuf,
}

impl Default for TypegenConfig {
    fn default() -> Self {
        Self {
            output_file: default_typegen_output(),
        }
    }
}

fn default_typegen_output() -> PathBuf {
    PathBuf::from("generated/lms-types.ts")
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file with environment variable overrides
    ///
    /// Recognised variables:
    /// - DATABASE_URI
    /// - PAYLOAD_SECRET
    /// - LMS_SERVER_HOST
    /// - LMS_SERVER_PORT
    /// - LMS_CORS_ORIGINS (comma separated)
    /// - LMS_TYPEGEN_OUTPUT
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("LMS_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("LMS_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        // An unset or empty DATABASE_URI keeps the configured file
        if let Ok(url) = std::env::var(ENV_DATABASE_URI) {
            if !url.trim().is_empty() {
                self.database.url = url;
            }
        }

        if let Ok(secret) = std::env::var(ENV_SECRET) {
            self.auth.secret = secret;
        }

        if let Ok(origins) = std::env::var("LMS_CORS_ORIGINS") {
            let parsed: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
            if !parsed.is_empty() {
                self.cors.origins = parsed;
            }
        }

        if let Ok(output) = std::env::var("LMS_TYPEGEN_OUTPUT") {
            self.typegen.output_file = PathBuf::from(output);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url must not be empty".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        for origin in &self.cors.origins {
            if !(origin.starts_with("http://") || origin.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "CORS origin '{}' must start with http:// or https://",
                    origin
                )));
            }
            if origin.ends_with('/') {
                return Err(ConfigError::ValidationError(format!(
                    "CORS origin '{}' must not end with a slash",
                    origin
                )));
            }
        }
        Ok(())
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
