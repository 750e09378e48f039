//! TOML-based application configuration.
//!
//! Holds the tunables of the streak engine and the CLI:
//! - Breakage grace period
//! - Milestone thresholds
//! - Default streak color
//! - CLI identity and log filter
//!
//! Configuration is stored at `<data dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::engine::{GracePolicy, MilestoneTable, StreakEngine, DEFAULT_MILESTONES};
use crate::error::{ConfigError, Result};
use crate::streak::{Color, DEFAULT_COLOR};

pub const CONFIG_FILE: &str = "config.toml";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Days a run may sit idle before the next extend breaks it.
    #[serde(default = "default_grace_days")]
    pub grace_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestonesConfig {
    #[serde(default = "default_thresholds")]
    pub thresholds: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreaksConfig {
    #[serde(default = "default_color")]
    pub default_color: String,
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Owner used when `--user` is not given.
    #[serde(default = "default_owner")]
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub milestones: MilestonesConfig,
    #[serde(default)]
    pub streaks: StreaksConfig,
    #[serde(default)]
    pub cli: CliConfig,
    #[serde(default)]
    pub log: LogConfig,
}

// Default functions
fn default_grace_days() -> u32 {
    GracePolicy::DEFAULT_DAYS
}
fn default_thresholds() -> Vec<u32> {
    DEFAULT_MILESTONES.to_vec()
}
fn default_color() -> String {
    DEFAULT_COLOR.into()
}
fn default_owner() -> String {
    "local".into()
}
fn default_filter() -> String {
    "info".into()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grace_days: default_grace_days(),
        }
    }
}

impl Default for MilestonesConfig {
    fn default() -> Self {
        Self {
            thresholds: default_thresholds(),
        }
    }
}

impl Default for StreaksConfig {
    fn default() -> Self {
        Self {
            default_color: default_color(),
        }
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            owner: default_owner(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;

            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    let n = value
                        .parse::<u64>()
                        .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?;
                    serde_json::Value::Number(n.into())
                }
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                }
                _ => serde_json::Value::String(value.into()),
            };

            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join(CONFIG_FILE))
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::path()?)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, if it holds
    /// invalid values, or if the defaults cannot be written.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(Self::path()?)
    }

    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key in memory.
    ///
    /// The configuration is left unchanged when the key is unknown or the
    /// resulting configuration would be invalid.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Every leaf key with its value, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (key, child) in map {
                        let path = if prefix.is_empty() {
                            key.clone()
                        } else {
                            format!("{prefix}.{key}")
                        };
                        walk(&path, child, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// # Errors
    ///
    /// Returns an error naming the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.grace_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "engine.grace_days".into(),
                message: "must be at least 1".into(),
            });
        }
        if let Err(e) = Color::parse(&self.streaks.default_color) {
            return Err(ConfigError::InvalidValue {
                key: "streaks.default_color".into(),
                message: e.to_string(),
            });
        }
        if self.cli.owner.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "cli.owner".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn engine(&self) -> StreakEngine {
        StreakEngine::new(GracePolicy::days(self.engine.grace_days))
    }

    pub fn milestone_table(&self) -> MilestoneTable {
        MilestoneTable::new(self.milestones.thresholds.clone())
    }

    /// Color applied when a streak is created without one.
    pub fn default_color(&self) -> Color {
        Color::parse(&self.streaks.default_color).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.engine.grace_days, 4);
        assert_eq!(cfg.milestones.thresholds, vec![3, 7, 30, 100, 182, 365]);
        assert_eq!(cfg.streaks.default_color, "#000000");
        assert_eq!(cfg.cli.owner, "local");
        assert_eq!(cfg.log.filter, "info");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let cfg: Config = toml::from_str("[engine]\ngrace_days = 3\n").unwrap();
        assert_eq!(cfg.engine.grace_days, 3);
        assert_eq!(cfg.cli.owner, "local");
        assert_eq!(cfg.engine().grace().threshold(), Duration::days(3));
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("engine.grace_days").as_deref(), Some("4"));
        assert_eq!(cfg.get("cli.owner").as_deref(), Some("local"));
        assert_eq!(
            cfg.get("milestones.thresholds").as_deref(),
            Some("[3,7,30,100,182,365]")
        );
        assert!(cfg.get("engine.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_number_string_and_array() {
        let mut cfg = Config::default();
        cfg.set("engine.grace_days", "3").unwrap();
        cfg.set("streaks.default_color", "#ff8800").unwrap();
        cfg.set("milestones.thresholds", "[5, 10]").unwrap();
        assert_eq!(cfg.engine.grace_days, 3);
        assert_eq!(cfg.default_color().as_str(), "#ff8800");
        assert_eq!(cfg.milestone_table().thresholds(), &[5, 10]);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.set("engine.nonexistent_key", "1").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(cfg.set("nonexistent.grace_days", "1").is_err());
    }

    #[test]
    fn set_rejects_invalid_values_without_changing_config() {
        let mut cfg = Config::default();
        assert!(cfg.set("engine.grace_days", "soon").is_err());
        assert!(cfg.set("engine.grace_days", "0").is_err());
        assert!(cfg.set("streaks.default_color", "blue").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn entries_list_every_leaf() {
        let keys: Vec<_> = Config::default().entries().into_iter().map(|(k, _)| k).collect();
        for key in [
            "engine.grace_days",
            "milestones.thresholds",
            "streaks.default_color",
            "cli.owner",
            "log.filter",
        ] {
            assert!(keys.iter().any(|k| k == key), "missing {key}");
        }
    }

    #[test]
    fn load_from_writes_defaults_then_reads_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("cli.owner", "alice").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().cli.owner, "alice");
    }

    #[test]
    fn load_from_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[engine]\ngrace_days = \"four\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());

        std::fs::write(&path, "[streaks]\ndefault_color = \"red\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
