use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::bridge::{DEFAULT_BRIDGE_PATH, DEFAULT_BRIDGE_TIMEOUT};
use crate::session::{DEFAULT_MIRROR_PATH, DEFAULT_SESSION_CEILING, DEFAULT_STOP_GRACE};

pub const BRIDGE_PATH_ENV: &str = "Q8_MIRROR_ADB";
pub const MIRROR_PATH_ENV: &str = "Q8_MIRROR_SCRCPY";
pub const DEFAULT_LISTEN_PORT: u16 = 8420;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Paths and timeouts for the external tools.
///
/// Read from `config.toml` in the platform config directory; every field is
/// optional there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bridge executable; bare names are resolved through `PATH`
    pub bridge_path: PathBuf,
    pub mirror_path: PathBuf,
    pub bridge_timeout_secs: u64,
    pub session_ceiling_secs: u64,
    pub stop_grace_secs: u64,
    pub listen_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_path: PathBuf::from(DEFAULT_BRIDGE_PATH),
            mirror_path: PathBuf::from(DEFAULT_MIRROR_PATH),
            bridge_timeout_secs: DEFAULT_BRIDGE_TIMEOUT.as_secs(),
            session_ceiling_secs: DEFAULT_SESSION_CEILING.as_secs(),
            stop_grace_secs: DEFAULT_STOP_GRACE.as_secs(),
            listen_port: DEFAULT_LISTEN_PORT,
        }
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("is", "8b", "q8-mirror")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load `path` (or the default location), then apply environment overrides.
    ///
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.normalize();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(raw)?;
        config.normalize();
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(BRIDGE_PATH_ENV).filter(|v| !v.is_empty()) {
            self.bridge_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(MIRROR_PATH_ENV).filter(|v| !v.is_empty()) {
            self.mirror_path = PathBuf::from(path);
        }
    }

    /// Empty paths mean "use the bare tool name"; zero durations mean the default.
    fn normalize(&mut self) {
        if self.bridge_timeout_secs == 0 {
            self.bridge_timeout_secs = DEFAULT_BRIDGE_TIMEOUT.as_secs();
        }
        if self.session_ceiling_secs == 0 {
            self.session_ceiling_secs = DEFAULT_SESSION_CEILING.as_secs();
        }
        if self.stop_grace_secs == 0 {
            self.stop_grace_secs = DEFAULT_STOP_GRACE.as_secs();
        }
        if self.bridge_path.as_os_str().is_empty() {
            self.bridge_path = PathBuf::from(DEFAULT_BRIDGE_PATH);
        }
        if self.mirror_path.as_os_str().is_empty() {
            self.mirror_path = PathBuf::from(DEFAULT_MIRROR_PATH);
        }
    }

    pub fn bridge_timeout(&self) -> Duration {
        Duration::from_secs(self.bridge_timeout_secs)
    }

    pub fn session_ceiling(&self) -> Duration {
        Duration::from_secs(self.session_ceiling_secs)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tool_contract() {
        let config = Config::default();
        assert_eq!(config.bridge_path, PathBuf::from("adb"));
        assert_eq!(config.mirror_path, PathBuf::from("scrcpy"));
        assert_eq!(config.bridge_timeout(), Duration::from_secs(10));
        assert_eq!(config.stop_grace(), Duration::from_secs(5));
        assert_eq!(config.session_ceiling(), Duration::from_secs(86_400));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml("bridge_path = \"/opt/platform-tools/adb\"\nstop_grace_secs = 2\n").unwrap();
        assert_eq!(config.bridge_path, PathBuf::from("/opt/platform-tools/adb"));
        assert_eq!(config.stop_grace_secs, 2);
        assert_eq!(config.mirror_path, PathBuf::from("scrcpy"));
    }

    #[test]
    fn empty_paths_fall_back_to_bare_names() {
        let config = Config::from_toml("bridge_path = \"\"\nmirror_path = \"\"").unwrap();
        assert_eq!(config.bridge_path, PathBuf::from("adb"));
        assert_eq!(config.mirror_path, PathBuf::from("scrcpy"));
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        let raw = "bridge_timeout_secs = 0\nsession_ceiling_secs = 0\nstop_grace_secs = 0\n";
        let config = Config::from_toml(raw).unwrap();
        assert_eq!(config.bridge_timeout(), Duration::from_secs(10));
        assert_eq!(config.session_ceiling(), Duration::from_secs(86_400));
        assert_eq!(config.stop_grace(), Duration::from_secs(5));
    }

    #[test]
    fn env_overrides_paths() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            BRIDGE_PATH_ENV => Some("/usr/local/bin/adb".into()),
            MIRROR_PATH_ENV => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.bridge_path, PathBuf::from("/usr/local/bin/adb"));
        assert_eq!(config.mirror_path, PathBuf::from("scrcpy"));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "listen_port = \"not a number\"").unwrap();

        assert!(matches!(Config::load(Some(path.as_path())), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(config.listen_port, DEFAULT_LISTEN_PORT);
    }
}
