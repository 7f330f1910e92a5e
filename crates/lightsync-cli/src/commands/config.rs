//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use lightsync_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "server_url, api_base, reconnect_interval_ms, group_refresh_delay_ms, \
                          request_timeout_secs, log_level, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            output.json(&serde_json::json!({
                "server_url": config.server_url,
                "api_base": config.api_base,
                "ws_url": config.ws_url(),
                "reconnect_interval_ms": config.reconnect_interval_ms,
                "group_refresh_delay_ms": config.group_refresh_delay_ms,
                "request_timeout_secs": config.request_timeout_secs,
                "log_level": config.log_level,
                "log_file": config.log_file
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", config.server_url);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  server_url:             {}", config.server_url);
            println!("  api_base:               {}", config.api_base);
            println!("  reconnect_interval_ms:  {}", config.reconnect_interval_ms);
            println!("  group_refresh_delay_ms: {}", config.group_refresh_delay_ms);
            println!(
                "  request_timeout_secs:   {}",
                config
                    .request_timeout_secs
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  log_level:              {}", config.log_level);
            println!(
                "  log_file:               {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Push channel: {}", config.ws_url());
            println!("Config file:  {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply_setting(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Change one key of `config`; "none" or "" clears optional keys
fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let unset = value.is_empty() || value == "none";

    match key {
        "server_url" => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                bail!("server_url must start with http:// or https://");
            }
            config.server_url = value.trim_end_matches('/').to_string();
        }
        "api_base" => {
            config.api_base = value.to_string();
        }
        "reconnect_interval_ms" => {
            let ms: u64 = value
                .parse()
                .context("Invalid value for reconnect_interval_ms. Use a number of milliseconds.")?;
            if ms == 0 {
                bail!("reconnect_interval_ms must be greater than 0");
            }
            config.reconnect_interval_ms = ms;
        }
        "group_refresh_delay_ms" => {
            config.group_refresh_delay_ms = value
                .parse()
                .context("Invalid value for group_refresh_delay_ms. Use a number of milliseconds.")?;
        }
        "request_timeout_secs" => {
            config.request_timeout_secs = if unset {
                None
            } else {
                Some(
                    value
                        .parse()
                        .context("Invalid value for request_timeout_secs. Use a number of seconds.")?,
                )
            };
        }
        "log_level" => {
            config.log_level = value.to_string();
        }
        "log_file" => {
            config.log_file = if unset { None } else { Some(value.into()) };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_apply_setting() {
        let mut config = Config::default();

        apply_setting(&mut config, "server_url", "https://gw.local:8443/").unwrap();
        assert_eq!(config.server_url, "https://gw.local:8443");
        assert_eq!(config.ws_url(), "wss://gw.local:8443/ws");

        apply_setting(&mut config, "reconnect_interval_ms", "2500").unwrap();
        assert_eq!(config.reconnect_interval_ms, 2500);

        apply_setting(&mut config, "request_timeout_secs", "10").unwrap();
        assert_eq!(config.request_timeout_secs, Some(10));
        apply_setting(&mut config, "request_timeout_secs", "none").unwrap();
        assert_eq!(config.request_timeout_secs, None);
    }

    #[test]
    fn test_apply_setting_rejects_bad_values() {
        let mut config = Config::default();

        assert!(apply_setting(&mut config, "server_url", "gw.local").is_err());
        assert!(apply_setting(&mut config, "reconnect_interval_ms", "soon").is_err());
        assert!(apply_setting(&mut config, "reconnect_interval_ms", "0").is_err());

        let err = apply_setting(&mut config, "color", "blue").unwrap_err();
        assert!(err.to_string().contains("Valid keys"));
    }

    #[test]
    fn test_set_writes_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let output = Output::new(OutputFormat::Quiet);

        set(
            "group_refresh_delay_ms".to_string(),
            "1500".to_string(),
            Some(&path),
            &output,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.group_refresh_delay_ms, 1500);
    }
}
