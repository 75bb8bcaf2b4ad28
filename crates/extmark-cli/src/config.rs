use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const FILE_NAME: &str = "extmark.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {}: {source}", config_path.display())]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {}: {source}", config_path.display())]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Html,
    Markdown,
}

/// Values from `extmark.toml`. Every key is optional; command-line flags win.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub base_dir: Option<PathBuf>,
    pub remote: Option<bool>,
    pub sanitize: Option<bool>,
    pub include_heading: Option<bool>,
    pub format: Option<OutputFormat>,
}

impl Config {
    /// Loads a config file that must exist.
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_path = config_path.as_ref();
        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Relative base directories are relative to the config file.
        if let Some(base_dir) = config.base_dir.take() {
            config.base_dir = Some(match config_path.parent() {
                Some(parent) if base_dir.is_relative() => parent.join(base_dir),
                _ => base_dir,
            });
        }
        log::debug!("loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Loads `path` when present.
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }
        Self::load(config_path).map(Some)
    }

    /// The `extmark.toml` sitting next to a host document.
    pub fn beside(host: &Path) -> Result<Option<Self>, ConfigError> {
        let dir = host.parent().unwrap_or_else(|| Path::new(""));
        Self::load_from_path(dir.join(FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(
            Config::load_from_path(dir.path().join(FILE_NAME))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn reads_all_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(
            &path,
            "base_dir = \"parts\"\nremote = false\nsanitize = true\ninclude_heading = false\nformat = \"markdown\"\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config,
            Config {
                base_dir: Some(dir.path().join("parts")),
                remote: Some(false),
                sanitize: Some(true),
                include_heading: Some(false),
                format: Some(OutputFormat::Markdown),
            }
        );
    }

    #[test]
    fn absolute_base_dir_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILE_NAME);
        let absolute = dir.path().join("elsewhere");
        fs::write(
            &path,
            format!("base_dir = {:?}\n", absolute.to_string_lossy()),
        )
        .unwrap();
        assert_eq!(Config::load(&path).unwrap().base_dir, Some(absolute));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FILE_NAME);
        fs::write(&path, "sanitise = true\n").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
    }

    #[test]
    fn beside_looks_in_the_host_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(FILE_NAME), "remote = false\n").unwrap();
        let host = dir.path().join("book.md");
        let config = Config::beside(&host).unwrap().unwrap();
        assert_eq!(config.remote, Some(false));
    }
}
