//! Configuration management for shell-relay.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cli::{ClientArgs, ServerArgs};
use crate::client::{ClientConfig, DEFAULT_PROMPT};
use crate::execution::default_shell;
use crate::server::{ServerConfig, DEFAULT_PORT};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerSection,
    /// Client configuration.
    pub client: ClientSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address to bind to.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Shell used to run command lines.
    pub shell: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            shell: default_shell().to_string(),
        }
    }
}

/// Client configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    /// Server port.
    pub port: u16,
    /// Prompt text.
    pub prompt: String,
    /// Line-editing history file.
    pub history_file: Option<PathBuf>,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            prompt: DEFAULT_PROMPT.to_string(),
            history_file: None,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or filter directives.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup (for testing).
    pub fn apply_env_from<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = var("SHELL_RELAY_BIND") {
            self.server.bind = bind;
        }

        if let Some(port) = var("SHELL_RELAY_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
            self.client.port = port;
        }

        if let Some(shell) = var("SHELL_RELAY_SHELL") {
            if !shell.is_empty() {
                self.server.shell = shell;
            }
        }

        if let Some(level) = var("SHELL_RELAY_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply `relay-server` argument overrides.
    pub fn apply_server_args(&mut self, args: &ServerArgs) {
        if let Some(bind) = args.bind {
            self.server.bind = bind.to_string();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(shell) = &args.shell {
            self.server.shell = shell.to_string_lossy().into_owned();
        }
    }

    /// Apply `relay-client` argument overrides.
    pub fn apply_client_args(&mut self, args: &ClientArgs) {
        if let Some(port) = args.port {
            self.client.port = port;
        }
    }

    /// Load file and environment layers.
    fn load_layers(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load the full priority chain for the server.
    pub fn load_for_server(args: &ServerArgs) -> Result<Self, ConfigError> {
        let mut config = Self::load_layers(args.config.as_deref())?;
        config.apply_server_args(args);
        Ok(config)
    }

    /// Load the full priority chain for the client.
    pub fn load_for_client(args: &ClientArgs) -> Result<Self, ConfigError> {
        let mut config = Self::load_layers(args.config.as_deref())?;
        config.apply_client_args(args);
        Ok(config)
    }

    /// Convert to the server's runtime configuration.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .bind
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.bind.clone()))?;

        Ok(ServerConfig::new(host, self.server.port).with_shell(&self.server.shell))
    }

    /// Convert to the client's runtime configuration for `host`.
    pub fn to_client_config(&self, host: &str) -> ClientConfig {
        ClientConfig {
            host: host.to_string(),
            port: self.client.port,
            prompt: self.client.prompt.clone(),
            history_file: self.client.history_file.clone(),
        }
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid bind address.
    InvalidHost(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid bind address: {}", host),
        }
    }
}

impl std::error::Error for ConfigError {}
