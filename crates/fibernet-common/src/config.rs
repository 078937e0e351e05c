//! Service configuration.
//!
//! Values are resolved in three layers: built-in defaults, an optional YAML
//! file, then command-line flags (which clap also reads from `FIBERNET_*`
//! environment variables).

use clap::Args;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_INVENTORY_URL: &str = "http://127.0.0.1:8081";
pub const DEFAULT_CUSTOMER_URL: &str = "http://127.0.0.1:8082";
pub const DEFAULT_AUDIT_URL: &str = "http://127.0.0.1:8083";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_FANOUT_LIMIT: usize = 8;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Command-line flags shared by every fibernet daemon.
#[derive(Args, Debug, Clone, Default)]
pub struct CliArgs {
    /// YAML configuration file
    #[arg(short = 'c', long, env = "FIBERNET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "FIBERNET_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "FIBERNET_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, env = "FIBERNET_JSON_LOGS")]
    pub json_logs: bool,

    /// Base URL of the inventory service
    #[arg(long, env = "FIBERNET_INVENTORY_URL")]
    pub inventory_url: Option<String>,

    /// Base URL of the customer service
    #[arg(long, env = "FIBERNET_CUSTOMER_URL")]
    pub customer_url: Option<String>,

    /// Base URL of the audit service
    #[arg(long, env = "FIBERNET_AUDIT_URL")]
    pub audit_url: Option<String>,

    /// Timeout for calls to other services, in milliseconds
    #[arg(long, env = "FIBERNET_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Maximum concurrent collaborator calls during topology fan-out
    #[arg(long, env = "FIBERNET_FANOUT_LIMIT")]
    pub fanout_limit: Option<usize>,
}

/// YAML file layout; every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    listen_addr: Option<SocketAddr>,
    log_level: Option<String>,
    json_logs: Option<bool>,
    inventory_url: Option<String>,
    customer_url: Option<String>,
    audit_url: Option<String>,
    request_timeout_ms: Option<u64>,
    fanout_limit: Option<usize>,
}

/// Resolved service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub json_logs: bool,
    pub inventory_url: String,
    pub customer_url: String,
    pub audit_url: String,
    pub request_timeout_ms: u64,
    pub fanout_limit: usize,
}

impl ServiceConfig {
    /// Built-in defaults for a service listening on `listen_addr`.
    pub fn defaults(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            log_level: "info".to_string(),
            json_logs: false,
            inventory_url: DEFAULT_INVENTORY_URL.to_string(),
            customer_url: DEFAULT_CUSTOMER_URL.to_string(),
            audit_url: DEFAULT_AUDIT_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            fanout_limit: DEFAULT_FANOUT_LIMIT,
        }
    }

    /// Resolves defaults, then the config file named by `args`, then `args`.
    pub fn resolve(args: &CliArgs, default_listen: SocketAddr) -> Result<Self, ConfigError> {
        let mut config = Self::defaults(default_listen);
        if let Some(path) = &args.config {
            config.merge_file(load_file(path)?);
        }
        config.merge_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Applies a YAML document on top of the current values.
    pub fn merge_yaml(&mut self, yaml: &str) -> Result<(), ConfigError> {
        let file: FileConfig = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source: e,
        })?;
        self.merge_file(file);
        Ok(())
    }

    fn merge_file(&mut self, file: FileConfig) {
        if let Some(v) = file.listen_addr {
            self.listen_addr = v;
        }
        if let Some(v) = file.log_level {
            self.log_level = v;
        }
        if let Some(v) = file.json_logs {
            self.json_logs = v;
        }
        if let Some(v) = file.inventory_url {
            self.inventory_url = v;
        }
        if let Some(v) = file.customer_url {
            self.customer_url = v;
        }
        if let Some(v) = file.audit_url {
            self.audit_url = v;
        }
        if let Some(v) = file.request_timeout_ms {
            self.request_timeout_ms = v;
        }
        if let Some(v) = file.fanout_limit {
            self.fanout_limit = v;
        }
    }

    fn merge_args(&mut self, args: &CliArgs) {
        if let Some(v) = args.listen {
            self.listen_addr = v;
        }
        if let Some(v) = &args.log_level {
            self.log_level = v.clone();
        }
        if args.json_logs {
            self.json_logs = true;
        }
        if let Some(v) = &args.inventory_url {
            self.inventory_url = v.clone();
        }
        if let Some(v) = &args.customer_url {
            self.customer_url = v.clone();
        }
        if let Some(v) = &args.audit_url {
            self.audit_url = v.clone();
        }
        if let Some(v) = args.request_timeout_ms {
            self.request_timeout_ms = v;
        }
        if let Some(v) = args.fanout_limit {
            self.fanout_limit = v;
        }
    }

    /// Checks value ranges and URL schemes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be greater than 0"));
        }
        if self.fanout_limit == 0 {
            return Err(invalid("fanout_limit", "must be greater than 0"));
        }
        for (field, url) in [
            ("inventory_url", &self.inventory_url),
            ("customer_url", &self.customer_url),
            ("audit_url", &self.audit_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(invalid(field, format!("'{}' is not an http(s) URL", url)));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.into(),
    }
}

fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
