//! Configuration management for immuctl.
use regex::Regex;
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};

use crate::error::ConfigError;

/// Configuration file consulted when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/immuctl/immuctl.yaml";

/// Host layout used to install and manage services.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Directory installed executables are copied into.
    pub install_dir: PathBuf,
    /// Parent of each service's config directory.
    pub config_root: PathBuf,
    /// Parent of each service's data directory.
    pub data_root: PathBuf,
    /// Parent of each service's log directory.
    pub log_root: PathBuf,
    /// Directory systemd unit files are written to.
    pub unit_dir: PathBuf,
    /// Scratch directory for downloaded executables.
    pub staging_dir: PathBuf,
    /// System account the services run as.
    pub service_user: String,
    /// Program used to talk to systemd.
    pub systemctl: String,
    /// Pause after a detached launch before reporting success.
    pub settle_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from("/usr/sbin"),
            config_root: PathBuf::from("/etc"),
            data_root: PathBuf::from("/var/lib"),
            log_root: PathBuf::from("/var/log"),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            staging_dir: env::temp_dir().join("immuctl"),
            service_user: "immu".to_string(),
            systemctl: "systemctl".to_string(),
            settle_secs: 1,
        }
    }
}

impl ToolConfig {
    /// Settle pause as a `Duration`.
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }

    /// Parses YAML, expanding `${VAR}` references first.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(content)?;
        if expanded.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&expanded)?)
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?").expect("valid env var pattern")
    })
}

/// Expands environment variables within a string.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let pattern = env_var_pattern();
    if let Some(missing) = pattern
        .captures_iter(input)
        .map(|caps| caps[1].to_string())
        .find(|name| env::var(name).is_err())
    {
        return Err(ConfigError::MissingVar(missing));
    }

    let result = pattern.replace_all(input, |caps: &regex::Captures| {
        env::var(&caps[1]).unwrap_or_default()
    });
    Ok(result.into_owned())
}

/// Loads the tool configuration.
///
/// An explicit path must exist. Without one, [`DEFAULT_CONFIG_PATH`] is read
/// when present and built-in defaults are used otherwise.
pub fn load_config(config_path: Option<&Path>) -> Result<ToolConfig, ConfigError> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_PATH);
            if !default.exists() {
                return Ok(ToolConfig::default());
            }
            default
        }
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    ToolConfig::from_yaml(&content)
}
