//! `quire.toml` loading.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use quire_build::runtime::REQUIRED_NODE_MAJOR;
use quire_build::toolchain::GITBOOK_CLI_VERSION;
use quire_build::LIVERELOAD_PORT;
use quire_server::{WatchTimings, DEFAULT_PORT};
use serde::Deserialize;

/// Configuration file structure (quire.toml).
#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub watch: WatchSettings,
    #[serde(default)]
    pub runtime: RuntimeSettings,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_livereload_port")]
    pub livereload_port: u16,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct WatchSettings {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct RuntimeSettings {
    #[serde(default = "default_node_major")]
    pub node_major: u32,
    #[serde(default = "default_gitbook_cli_version")]
    pub gitbook_cli_version: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_livereload_port() -> u16 {
    LIVERELOAD_PORT
}
fn default_debounce_ms() -> u64 {
    WatchTimings::default().debounce.as_millis() as u64
}
fn default_cancel_grace_ms() -> u64 {
    WatchTimings::default().cancel_grace.as_millis() as u64
}
fn default_kill_timeout_ms() -> u64 {
    WatchTimings::default().kill_timeout.as_millis() as u64
}
fn default_node_major() -> u32 {
    REQUIRED_NODE_MAJOR
}
fn default_gitbook_cli_version() -> String {
    GITBOOK_CLI_VERSION.to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            livereload_port: default_livereload_port(),
        }
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            cancel_grace_ms: default_cancel_grace_ms(),
            kill_timeout_ms: default_kill_timeout_ms(),
        }
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            node_major: default_node_major(),
            gitbook_cli_version: default_gitbook_cli_version(),
        }
    }
}

impl WatchSettings {
    pub fn timings(&self) -> WatchTimings {
        WatchTimings {
            debounce: Duration::from_millis(self.debounce_ms),
            cancel_grace: Duration::from_millis(self.cancel_grace_ms),
            kill_timeout: Duration::from_millis(self.kill_timeout_ms),
        }
    }
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let config: ConfigFile = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let temp = tempdir().unwrap();
        let config = load_config(&temp.path().join("quire.toml")).unwrap();

        assert_eq!(config.server.port, 4003);
        assert_eq!(config.server.livereload_port, 35729);
        assert_eq!(config.watch.timings(), WatchTimings::default());
        assert_eq!(config.runtime.node_major, 10);
        assert_eq!(config.runtime.gitbook_cli_version, "2.3.2");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("quire.toml");
        fs::write(&path, "[server]\nport = 8080\n\n[watch]\ndebounce_ms = 250\n").unwrap();

        let config = load_config(&path).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.livereload_port, 35729);
        assert_eq!(config.watch.timings().debounce, Duration::from_millis(250));
        assert_eq!(config.watch.cancel_grace_ms, 500);
        assert_eq!(config.watch.kill_timeout_ms, 1000);
        assert_eq!(config.runtime, RuntimeSettings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("quire.toml");
        fs::write(&path, "[server\nport = ").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse"));
    }
}
