use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_XML_INDENT: usize = 4;
const POINTER_FILE_NAME: &str = ".plugmunge_config_path";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown config key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for '{key}'")]
    InvalidValue { key: String, value: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugins_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xml_indent: Option<usize>,
}

impl Config {
    pub const KEYS: [&'static str; 4] = ["project-dir", "plugins-dir", "platform", "xml-indent"];

    pub fn path() -> PathBuf {
        // PLUGMUNGE_CONFIG wins when set and non-empty
        if let Ok(env_path) = std::env::var("PLUGMUNGE_CONFIG") {
            let trimmed = env_path.trim();
            if !trimmed.is_empty() {
                return PathBuf::from(trimmed);
            }
        }

        // A pointer file next to the default location may redirect to another file
        if let Some(pointer) = Self::pointer_path() {
            if let Ok(contents) = fs::read_to_string(&pointer) {
                let trimmed = contents.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
        }

        Self::default_path()
    }

    pub fn default_path() -> PathBuf {
        if cfg!(target_os = "windows") {
            dirs::config_dir().map_or_else(
                || PathBuf::from("plugmunge\\plugmunge.toml"),
                |c| c.join("plugmunge").join("plugmunge.toml"),
            )
        } else {
            dirs::home_dir().map_or_else(
                || PathBuf::from(".config/plugmunge/plugmunge.toml"),
                |h| h.join(".config").join("plugmunge").join("plugmunge.toml"),
            )
        }
    }

    /// `.plugmunge_config_path` next to the default config file
    pub fn pointer_path() -> Option<PathBuf> {
        Self::default_path().parent().map(|p| p.join(POINTER_FILE_NAME))
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(&Self::path())
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to_path(&Self::path())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "project-dir" => self.project_dir.clone(),
            "plugins-dir" => self.plugins_dir.clone(),
            "platform" => self.platform.clone(),
            "xml-indent" => self.xml_indent.map(|n| n.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: String) -> Result<(), ConfigError> {
        match key {
            "project-dir" => self.project_dir = Some(value),
            "plugins-dir" => self.plugins_dir = Some(value),
            "platform" => self.platform = Some(value),
            "xml-indent" => {
                let indent = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.clone(),
                })?;
                self.xml_indent = Some(indent);
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.project_dir.is_none()
            && self.plugins_dir.is_none()
            && self.platform.is_none()
            && self.xml_indent.is_none()
    }

    pub fn values_iter(&self) -> Vec<(&'static str, String)> {
        Self::KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|value| (*key, value)))
            .collect()
    }

    /// Project root, `.` when unset
    pub fn project_dir(&self) -> PathBuf {
        PathBuf::from(self.project_dir.as_deref().unwrap_or("."))
    }

    /// Plugins directory, `<project_dir>/plugins` when unset
    pub fn plugins_dir(&self, project_dir: &Path) -> PathBuf {
        self.plugins_dir
            .as_deref()
            .map_or_else(|| project_dir.join("plugins"), PathBuf::from)
    }

    pub fn xml_indent(&self) -> usize {
        self.xml_indent.unwrap_or(DEFAULT_XML_INDENT)
    }
}
