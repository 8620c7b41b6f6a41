//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via BERTREM_CONFIG)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// How cast requests take part in reply correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastPolicy {
    /// A cast occupies a queue slot and consumes the server's `noreply` frame.
    #[default]
    AwaitReply,
    /// A cast is never queued and resolves as soon as it is handed to the transport.
    /// Only correct against servers that send nothing back for casts.
    FireAndForget,
}

impl FromStr for CastPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "await_reply" => Ok(CastPolicy::AwaitReply),
            "fire_and_forget" => Ok(CastPolicy::FireAndForget),
            other => Err(ConfigError::ValidationError(format!(
                "unknown cast policy '{}'",
                other
            ))),
        }
    }
}

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address as `host:port`.
    pub addr: String,
    /// Keep the connection open across replies. When false the connection
    /// is closed after the first reply.
    pub persistent: bool,
    /// Timeout for establishing the TCP connection, in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Queue bookkeeping for casts.
    pub cast_policy: CastPolicy,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Largest frame payload accepted or sent.
    pub max_frame_size: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            addr: format!("127.0.0.1:{}", bertrem_protocol::DEFAULT_PORT),
            persistent: false,
            connect_timeout_ms: None,
            cast_policy: CastPolicy::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_frame_size: bertrem_protocol::MAX_PAYLOAD_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    /// Configuration for `host:port`.
    pub fn service(host: &str, port: u16) -> Self {
        Self::new(format!("{}:{}", host, port))
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_cast_policy(mut self, policy: CastPolicy) -> Self {
        self.cast_policy = policy;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_max_frame_size(mut self, size: u32) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Returns the connect timeout as Duration.
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("BERTREM_CONFIG") {
            return Self::load_from(path);
        }

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Loads configuration from `path`, then applies environment variable overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: ClientConfig = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(addr) = std::env::var("BERTREM_ADDR") {
            self.addr = addr;
        }

        if let Ok(persistent) = std::env::var("BERTREM_PERSISTENT") {
            self.persistent = persistent == "1" || persistent.to_lowercase() == "true";
        }

        if let Ok(timeout) = std::env::var("BERTREM_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.connect_timeout_ms = Some(ms);
            }
        }

        if let Ok(policy) = std::env::var("BERTREM_CAST_POLICY") {
            self.cast_policy = policy.parse()?;
        }

        if let Ok(size) = std::env::var("BERTREM_MAX_FRAME_SIZE") {
            if let Ok(n) = size.parse() {
                self.max_frame_size = n;
            }
        }

        self.validate()
    }

    /// Checks values that cannot be clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addr.is_empty() {
            return Err(ConfigError::ValidationError(
                "server address not set".to_string(),
            ));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_frame_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.addr, "127.0.0.1:8000");
        assert!(!config.persistent);
        assert_eq!(config.connect_timeout(), None);
        assert_eq!(config.cast_policy, CastPolicy::AwaitReply);
        assert_eq!(config.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::service("rpc.local", 9999)
            .with_persistent(true)
            .with_connect_timeout(Duration::from_millis(1500))
            .with_cast_policy(CastPolicy::FireAndForget);

        assert_eq!(config.addr, "rpc.local:9999");
        assert!(config.persistent);
        assert_eq!(config.connect_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.cast_policy, CastPolicy::FireAndForget);
    }

    #[test]
    fn test_buffer_clamping() {
        let config = ClientConfig::default().with_read_buffer_size(100);
        assert_eq!(config.read_buffer_size, MIN_READ_BUFFER_SIZE);

        let config = ClientConfig::default().with_read_buffer_size(10 * 1024 * 1024);
        assert_eq!(config.read_buffer_size, MAX_READ_BUFFER_SIZE);
    }

    #[test]
    fn test_cast_policy_parse() {
        assert_eq!(
            "await_reply".parse::<CastPolicy>().unwrap(),
            CastPolicy::AwaitReply
        );
        assert_eq!(
            "Fire-And-Forget".parse::<CastPolicy>().unwrap(),
            CastPolicy::FireAndForget
        );
        assert!("sometimes".parse::<CastPolicy>().is_err());
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bertrem.yaml");
        std::fs::write(
            &path,
            "addr: 10.0.0.5:8000\npersistent: true\ncast_policy: fire_and_forget\n",
        )
        .unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.addr, "10.0.0.5:8000");
        assert!(config.persistent);
        assert_eq!(config.cast_policy, CastPolicy::FireAndForget);
        // Unset fields keep their defaults
        assert_eq!(config.max_frame_size, bertrem_protocol::MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.yaml");
        let config = ClientConfig::new("db:8000").with_connect_timeout(Duration::from_secs(2));
        config.save(&path).unwrap();

        let loaded = ClientConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let result = ClientConfig::from_file("/nonexistent/bertrem.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(_, _))));
    }

    // The only test touching BERTREM_* variables; others read files or defaults.
    #[test]
    fn test_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bertrem.yaml");
        std::fs::write(&path, "addr: 10.0.0.5:8000\npersistent: false\n").unwrap();

        std::env::set_var("BERTREM_PERSISTENT", "true");
        std::env::set_var("BERTREM_CAST_POLICY", "fire_and_forget");
        std::env::set_var("BERTREM_CONNECT_TIMEOUT_MS", "250");
        std::env::set_var("BERTREM_MAX_FRAME_SIZE", "4096");

        let from_file = ClientConfig::load_from(&path);
        let from_env = ClientConfig::from_env();

        std::env::set_var("BERTREM_CAST_POLICY", "sometimes");
        let bad_policy = ClientConfig::from_env();

        std::env::set_var("BERTREM_CAST_POLICY", "await_reply");
        std::env::set_var("BERTREM_CONFIG", &path);
        let loaded = ClientConfig::load();

        for name in [
            "BERTREM_CONFIG",
            "BERTREM_PERSISTENT",
            "BERTREM_CAST_POLICY",
            "BERTREM_CONNECT_TIMEOUT_MS",
            "BERTREM_MAX_FRAME_SIZE",
        ] {
            std::env::remove_var(name);
        }

        let config = from_file.unwrap();
        assert_eq!(config.addr, "10.0.0.5:8000");
        assert!(config.persistent);
        assert_eq!(config.cast_policy, CastPolicy::FireAndForget);
        assert_eq!(config.connect_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.max_frame_size, 4096);

        let config = from_env.unwrap();
        assert_eq!(config.addr, "127.0.0.1:8000");
        assert!(config.persistent);

        assert!(matches!(bad_policy, Err(ConfigError::ValidationError(_))));

        let config = loaded.unwrap();
        assert_eq!(config.addr, "10.0.0.5:8000");
        assert!(config.persistent);
        assert_eq!(config.cast_policy, CastPolicy::AwaitReply);
    }

    #[test]
    fn test_validation() {
        let config = ClientConfig::default().with_max_frame_size(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
