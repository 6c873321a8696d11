//! Application configuration from `newsroom.toml`.
//!
//! Discovery prefers a `newsroom.toml` in the working directory and falls
//! back to the platform config directory. Unknown fields are tolerated so
//! older binaries keep reading newer files.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// tracing EnvFilter directive applied when RUST_LOG is unset.
    #[serde(default = "LoggingConfig::default_filter")]
    pub filter: String,
    /// Log file name inside the runtime directory.
    #[serde(default = "LoggingConfig::default_file")]
    pub file: String,
}

impl LoggingConfig {
    fn default_filter() -> String {
        "info".to_string()
    }

    fn default_file() -> String {
        "newsroom.log".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: Self::default_filter(),
            file: Self::default_file(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct SettingsConfig {
    /// Override for the persisted settings document path.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SurfaceConfig {
    /// Logical display size used by the terminal surface.
    #[serde(default = "SurfaceConfig::default_width")]
    pub width: i32,
    #[serde(default = "SurfaceConfig::default_height")]
    pub height: i32,
}

impl SurfaceConfig {
    fn default_width() -> i32 {
        1280
    }

    fn default_height() -> i32 {
        720
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>,
    pub file: ConfigFile,
}

/// Best-effort config path following platform conventions.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("newsroom.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("newsroom").join("newsroom.toml");
    }
    PathBuf::from("newsroom.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                info!(target: "config", path = %path.display(), "config_loaded");
                Ok(Config {
                    raw: Some(content),
                    file,
                })
            }
            Err(e) => Err(anyhow::anyhow!(
                "configuration file {} could not be parsed: {e}",
                path.display()
            )),
        }
    } else {
        Ok(Config::default())
    }
}

/// Directory for runtime artifacts (log file, instance lock).
pub fn runtime_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("newsroom"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = load_from(Some(PathBuf::from("/definitely/absent.toml"))).unwrap();
        assert_eq!(config.file.logging.filter, "info");
        assert_eq!(config.file.surface.width, 1280);
        assert!(config.raw.is_none());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("newsroom.toml");
        fs::write(&path, "[logging]\nfilter = \"debug\"\n").unwrap();
        let config = load_from(Some(path)).unwrap();
        assert_eq!(config.file.logging.filter, "debug");
        assert_eq!(config.file.logging.file, "newsroom.log");
        assert_eq!(config.file.surface.height, 720);
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("newsroom.toml");
        fs::write(&path, "[future]\nshiny = true\n").unwrap();
        assert!(load_from(Some(path)).is_ok());
    }

    #[test]
    fn garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("newsroom.toml");
        fs::write(&path, "not = [valid").unwrap();
        assert!(load_from(Some(path)).is_err());
    }
}
