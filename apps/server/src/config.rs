//! Server configuration

use std::path::PathBuf;

use auth::{AuthError, AuthSettings};
use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0:8080")
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Whether to enable CORS
    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Allowed CORS origins
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Allowed origins for post sign-in callback URLs.
    /// Supports wildcard subdomains (e.g., "*.example.com").
    /// If empty, only relative paths are allowed.
    #[serde(default)]
    pub allowed_redirect_origins: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Authentication settings, always taken from the environment
    #[serde(skip)]
    pub auth: AuthSettings,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_enable_cors() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            enable_cors: default_enable_cors(),
            cors_origins: Vec::new(),
            allowed_redirect_origins: Vec::new(),
            log_level: default_log_level(),
            auth: AuthSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(config_path) = Self::find_config_file() {
            let contents = std::fs::read_to_string(&config_path)?;
            config.merge_file(toml::from_str::<ServerConfig>(&contents)?);
        }

        // Environment takes precedence over the file
        if let Ok(addr) = std::env::var("AUTHGATE_BIND_ADDRESS") {
            config.bind_address = addr;
        }

        if let Ok(val) = std::env::var("AUTHGATE_ENABLE_CORS") {
            config.enable_cors = val.parse().unwrap_or(true);
        }

        if let Ok(origins) = std::env::var("AUTHGATE_CORS_ORIGINS") {
            config.cors_origins = split_list(&origins);
        }

        if let Ok(origins) = std::env::var("AUTHGATE_ALLOWED_REDIRECT_ORIGINS") {
            config.allowed_redirect_origins = split_list(&origins);
        }

        if let Ok(level) = std::env::var("AUTHGATE_LOG_LEVEL") {
            config.log_level = level;
        }

        config.auth = AuthSettings::from_env()?;

        config.validate()?;
        Ok(config)
    }

    /// Applies values from a config file over the defaults.
    fn merge_file(&mut self, file_config: ServerConfig) {
        self.bind_address = file_config.bind_address;
        self.enable_cors = file_config.enable_cors;
        self.cors_origins = file_config.cors_origins;
        self.allowed_redirect_origins = file_config.allowed_redirect_origins;
        self.log_level = file_config.log_level;
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let locations = [
            PathBuf::from("authgate.toml"),
            PathBuf::from("/etc/authgate/authgate.toml"),
            dirs::config_dir()
                .map(|p| p.join("authgate").join("authgate.toml"))
                .unwrap_or_default(),
        ];

        locations.into_iter().find(|p| p.is_file())
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidBindAddress(self.bind_address.clone()));
        }

        if self.auth.database_url.is_none() {
            tracing::warn!("DATABASE_URL is not set; credentials sign-in is disabled");
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid auth configuration: {0}")]
    Auth(#[from] AuthError),

    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
