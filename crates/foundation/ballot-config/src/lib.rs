//! Ballot bot configuration
//!
//! Layered, later sources win:
//!
//! 1. built-in defaults
//! 2. YAML file (`--config`, `$BALLOT_CONFIG`, or `<config dir>/ballot/config.yaml`)
//! 3. environment (`BALLOT_ADMINS`, `BALLOT_DEFAULT_MAX_VOTES`, `BALLOT_LOG`, `BALLOT_LOG_FORMAT`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Result type for configuration loading
pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidValue {
                key: "log_format".into(),
                value: other.into(),
            }),
        }
    }
}

/// Bot configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// User IDs allowed to see admin results and end any poll
    pub admins: Vec<String>,
    /// Vote cap for multi-vote polls created without one (None = 1)
    pub default_max_votes: Option<u8>,
    /// tracing filter directive used when RUST_LOG is unset
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            admins: Vec::new(),
            default_max_votes: None,
            log_filter: "ballot=info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl BotConfig {
    /// Load from the given file (or the default location if it exists),
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("BALLOT_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Apply `BALLOT_*` overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(admins) = lookup("BALLOT_ADMINS") {
            self.admins = admins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(value) = lookup("BALLOT_DEFAULT_MAX_VOTES") {
            let parsed = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "BALLOT_DEFAULT_MAX_VOTES".into(),
                value: value.clone(),
            })?;
            self.default_max_votes = Some(parsed);
        }
        if let Some(filter) = lookup("BALLOT_LOG") {
            self.log_filter = filter;
        }
        if let Some(format) = lookup("BALLOT_LOG_FORMAT") {
            self.log_format = format.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.default_max_votes {
            if !(1..=25).contains(&n) {
                return Err(ConfigError::InvalidValue {
                    key: "default_max_votes".into(),
                    value: n.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// `<config dir>/ballot/config.yaml`
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("ballot").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert!(config.admins.is_empty());
        assert_eq!(config.log_filter, "ballot=info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_partial() {
        let config = BotConfig::from_yaml("admins: [\"42\", \"43\"]\nlog_format: json\n").unwrap();
        assert_eq!(config.admins, vec!["42", "43"]);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_filter, "ballot=info");

        assert_eq!(BotConfig::from_yaml("").unwrap(), BotConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("BALLOT_ADMINS", "1, 2,,3"),
            ("BALLOT_DEFAULT_MAX_VOTES", "4"),
            ("BALLOT_LOG_FORMAT", "JSON"),
        ]
        .into_iter()
        .collect();

        let mut config = BotConfig::default();
        config
            .apply_env(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.admins, vec!["1", "2", "3"]);
        assert_eq!(config.default_max_votes, Some(4));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values() {
        let mut config = BotConfig::default();
        let err = config
            .apply_env(|key| (key == "BALLOT_DEFAULT_MAX_VOTES").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        config.default_max_votes = Some(30);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_roundtrip_through_file() {
        let dir = std::env::temp_dir().join(format!("ballot-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");

        let config = BotConfig {
            admins: vec!["7".into()],
            default_max_votes: Some(3),
            ..BotConfig::default()
        };
        std::fs::write(&path, config.to_yaml().unwrap()).unwrap();

        assert_eq!(BotConfig::from_file(&path).unwrap(), config);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = BotConfig::from_file(Path::new("/nonexistent/ballot.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
