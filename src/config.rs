use std::{
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{alarm::DEFAULT_TITLE, host::HostConfig, notification::Permission, position::WatchOptions};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("couldn't determine the config directory")]
    NoConfigDir,
    #[error("couldn't access config file {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error("couldn't parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("couldn't serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// shown on the alarm notification
    #[serde(default = "default_title")]
    pub title: String,
    /// notification permission, `default` is granted when first needed
    #[serde(default)]
    pub notifications: Permission,
    #[serde(default)]
    pub sound: Sound,
    #[serde(default)]
    pub watch: WatchOptions,
    #[serde(default)]
    pub relay: RelaySettings,
    #[serde(default)]
    pub host: HostConfig,
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: default_title(),
            notifications: Permission::default(),
            sound: Sound::default(),
            watch: WatchOptions::default(),
            relay: RelaySettings::default(),
            host: HostConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct Sound {
    pub path: PathBuf,
    /// in percent
    pub volume: f32,
}

impl Default for Sound {
    fn default() -> Self {
        Self {
            path: Config::sounds_path().join("alarm.mp3"),
            volume: 100.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct RelaySettings {
    /// how long a window gets to acknowledge a relayed stop, unset waits for nobody
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ack_timeout_millis: Option<u64>,
}

impl RelaySettings {
    #[must_use]
    pub fn ack_timeout(&self) -> Option<Duration> {
        self.ack_timeout_millis.map(Duration::from_millis)
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// when the file can't be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&config).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`load`](Self::load), but a missing file gives the defaults.
    ///
    /// # Errors
    /// when the file exists but can't be read or parsed
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// # Errors
    /// when the file or its directory can't be written
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config = toml::to_string(self)?;
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, config).map_err(io_error)
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("", "", "proximity_alarm")
    }

    /// # Errors
    /// when there is no home directory to put it in
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let mut path = Self::project_dirs()
            .ok_or(ConfigError::NoConfigDir)?
            .config_dir()
            .to_path_buf();
        path.push("config.toml");
        Ok(path)
    }

    #[must_use]
    pub fn data_dir() -> PathBuf {
        Self::project_dirs().map_or_else(
            || PathBuf::from("."),
            |dirs| dirs.data_dir().to_path_buf(),
        )
    }

    #[must_use]
    pub fn sounds_path() -> PathBuf {
        Self::data_dir().join("sounds")
    }

    #[must_use]
    pub fn storage_path() -> PathBuf {
        Self::data_dir().join("storage.json")
    }
}
