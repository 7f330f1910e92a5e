//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/lightsync/config.toml)
//! 3. Environment variables (LIGHTSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "LIGHTSYNC";

/// Default gateway address
const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Default REST base path on the gateway
const DEFAULT_API_BASE: &str = "/api";

/// Path of the push endpoint on the gateway
const WS_PATH: &str = "/ws";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gateway base URL (http:// or https://)
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Base path of the REST API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Fixed delay between push channel reconnect attempts
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Delay before re-fetching everything after a group command
    #[serde(default = "default_group_refresh_delay_ms")]
    pub group_refresh_delay_ms: u64,

    /// Optional per-request timeout for REST calls
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Log level used when LIGHTSYNC_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            api_base: default_api_base(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            group_refresh_delay_ms: default_group_refresh_delay_ms(),
            request_timeout_secs: None,
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (LIGHTSYNC_SERVER_URL, LIGHTSYNC_API_BASE, ...)
    /// 2. Config file (~/.config/lightsync/config.toml or LIGHTSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_SERVER_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.server_url = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_API_BASE", ENV_PREFIX)) {
            self.api_base = val;
        }

        if let Ok(val) = std::env::var(format!("{}_RECONNECT_INTERVAL_MS", ENV_PREFIX)) {
            if let Ok(ms) = val.parse() {
                self.reconnect_interval_ms = ms;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_GROUP_REFRESH_DELAY_MS", ENV_PREFIX)) {
            if let Ok(ms) = val.parse() {
                self.group_refresh_delay_ms = ms;
            }
        }

        // Empty or "none" clears the timeout
        if let Ok(val) = std::env::var(format!("{}_REQUEST_TIMEOUT_SECS", ENV_PREFIX)) {
            let val = val.trim();
            if val.is_empty() || val.eq_ignore_ascii_case("none") {
                self.request_timeout_secs = None;
            } else if let Ok(secs) = val.parse() {
                self.request_timeout_secs = Some(secs);
            }
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with LIGHTSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lightsync")
            .join("config.toml")
    }

    /// Full URL of a REST endpoint, e.g. `api_url("/devices")`
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.server_url.trim_end_matches('/'),
            normalize_base(&self.api_base),
            path
        )
    }

    /// URL of the push endpoint, using ws:// or wss:// to match the server URL
    pub fn ws_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}{}", ws_base, WS_PATH)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn group_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.group_refresh_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Ensure the base path starts with a slash and has none at the end
fn normalize_base(base: &str) -> String {
    let trimmed = base.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_reconnect_interval_ms() -> u64 {
    5000
}

fn default_group_refresh_delay_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "LIGHTSYNC_SERVER_URL",
        "LIGHTSYNC_API_BASE",
        "LIGHTSYNC_RECONNECT_INTERVAL_MS",
        "LIGHTSYNC_GROUP_REFRESH_DELAY_MS",
        "LIGHTSYNC_REQUEST_TIMEOUT_SECS",
        "LIGHTSYNC_LOG_LEVEL",
        "LIGHTSYNC_LOG_FILE",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server_url, "http://localhost:8080");
        assert_eq!(config.api_base, "/api");
        assert_eq!(config.reconnect_interval(), Duration::from_millis(5000));
        assert_eq!(config.group_refresh_delay(), Duration::from_millis(1000));
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_api_url() {
        let mut config = Config::default();
        assert_eq!(
            config.api_url("/devices"),
            "http://localhost:8080/api/devices"
        );

        config.server_url = "http://gateway.local:8080/".to_string();
        config.api_base = "api/".to_string();
        assert_eq!(
            config.api_url("/scenes/s1/activate"),
            "http://gateway.local:8080/api/scenes/s1/activate"
        );

        config.api_base = String::new();
        assert_eq!(config.api_url("/health"), "http://gateway.local:8080/health");
    }

    #[test]
    fn test_ws_url_follows_scheme() {
        let mut config = Config::default();
        assert_eq!(config.ws_url(), "ws://localhost:8080/ws");

        config.server_url = "https://gateway.example.com/".to_string();
        assert_eq!(config.ws_url(), "wss://gateway.example.com/ws");
    }

    #[test]
    fn test_env_override_server_url() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("LIGHTSYNC_SERVER_URL", "http://10.0.0.5:8080");
        config.apply_env_overrides();
        assert_eq!(config.server_url, "http://10.0.0.5:8080");

        // Empty value keeps the current URL
        env::set_var("LIGHTSYNC_SERVER_URL", "");
        config.apply_env_overrides();
        assert_eq!(config.server_url, "http://10.0.0.5:8080");
    }

    #[test]
    fn test_env_override_reconnect_interval() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("LIGHTSYNC_RECONNECT_INTERVAL_MS", "250");
        config.apply_env_overrides();
        assert_eq!(config.reconnect_interval_ms, 250);

        env::set_var("LIGHTSYNC_RECONNECT_INTERVAL_MS", "soon");
        config.apply_env_overrides();
        assert_eq!(config.reconnect_interval_ms, 250);
    }

    #[test]
    fn test_env_override_timing_and_log_level() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("LIGHTSYNC_GROUP_REFRESH_DELAY_MS", "250");
        env::set_var("LIGHTSYNC_REQUEST_TIMEOUT_SECS", "15");
        env::set_var("LIGHTSYNC_LOG_LEVEL", "debug");
        config.apply_env_overrides();
        assert_eq!(config.group_refresh_delay(), Duration::from_millis(250));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
        assert_eq!(config.log_level, "debug");

        // Unparseable values keep the current setting, "none" clears the timeout
        env::set_var("LIGHTSYNC_GROUP_REFRESH_DELAY_MS", "later");
        env::set_var("LIGHTSYNC_REQUEST_TIMEOUT_SECS", "none");
        env::set_var("LIGHTSYNC_LOG_LEVEL", "");
        config.apply_env_overrides();
        assert_eq!(config.group_refresh_delay_ms, 250);
        assert!(config.request_timeout().is_none());
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            server_url = "http://192.168.1.20:8080"
            reconnect_interval_ms = 2000
            request_timeout_secs = 15
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.server_url, "http://192.168.1.20:8080");
        assert_eq!(config.reconnect_interval_ms, 2000);
        assert_eq!(config.group_refresh_delay_ms, 1000);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_save_and_reload() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            server_url: "https://hub.example.com".to_string(),
            log_level: "debug".to_string(),
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.server_url, "https://hub.example.com");
        assert_eq!(loaded.log_level, "debug");
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.server_url, "http://localhost:8080");
    }
}
