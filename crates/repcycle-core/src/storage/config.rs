//! TOML-based application configuration.
//!
//! Stores the defaults a host uses to build its timers:
//! - Work/rest ratio, rounds and rest mode
//! - Interval plan (work, rest, sets)
//! - Countdown length
//! - Sound cues
//!
//! Configuration is stored at `~/.config/repcycle/config.toml`, or in
//! `$REPCYCLE_CONFIG_DIR` when that is set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::config_dir;
use crate::cue::SoundManagerConfig;
use crate::error::{ConfigError, CoreError};
use crate::timer::{
    clamp_ratio, clamp_rounds, IntervalPlan, RestMode, WorkRestOptions, DEFAULT_FIXED_REST_SECS,
    DEFAULT_MAX_ROUNDS, DEFAULT_RATIO,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRestConfig {
    /// Centiunits: 150 is 1.50x.
    #[serde(default = "default_ratio")]
    pub ratio: u32,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    #[serde(default)]
    pub rest_mode: RestMode,
    #[serde(default = "default_fixed_rest_secs")]
    pub fixed_rest_secs: u32,
    /// Ceiling for a single work segment; 0 means the built-in maximum.
    #[serde(default)]
    pub max_work_secs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalConfig {
    #[serde(default = "default_work_secs")]
    pub work_secs: u32,
    #[serde(default = "default_rest_secs")]
    pub rest_secs: u32,
    #[serde(default = "default_sets")]
    pub sets: u32,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
    #[serde(default)]
    pub skip_last_rest: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountdownConfig {
    #[serde(default = "default_countdown_secs")]
    pub secs: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/repcycle/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub work_rest: WorkRestConfig,
    #[serde(default)]
    pub interval: IntervalConfig,
    #[serde(default)]
    pub countdown: CountdownConfig,
    #[serde(default)]
    pub sound: SoundManagerConfig,
}

// Default functions
fn default_ratio() -> u32 {
    DEFAULT_RATIO
}
fn default_max_rounds() -> u32 {
    DEFAULT_MAX_ROUNDS
}
fn default_fixed_rest_secs() -> u32 {
    DEFAULT_FIXED_REST_SECS
}
fn default_work_secs() -> u32 {
    20
}
fn default_rest_secs() -> u32 {
    10
}
fn default_sets() -> u32 {
    8
}
fn default_repeat() -> u32 {
    1
}
fn default_countdown_secs() -> u32 {
    60
}

impl Default for WorkRestConfig {
    fn default() -> Self {
        Self {
            ratio: default_ratio(),
            max_rounds: default_max_rounds(),
            rest_mode: RestMode::default(),
            fixed_rest_secs: default_fixed_rest_secs(),
            max_work_secs: 0,
        }
    }
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            work_secs: default_work_secs(),
            rest_secs: default_rest_secs(),
            sets: default_sets(),
            repeat: default_repeat(),
            skip_last_rest: false,
        }
    }
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            secs: default_countdown_secs(),
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
        if key.is_empty() {
            return Err(unknown());
        }

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
                    value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => {
                    if let Ok(n) = value.parse::<u64>() {
                        serde_json::Value::Number(n.into())
                    } else if let Ok(n) = value.parse::<f64>() {
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                    } else {
                        return Err(invalid(format!("cannot parse '{value}' as number")));
                    }
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

    pub fn path() -> Result<PathBuf, CoreError> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults there if the file
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, CoreError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                Ok(cfg.normalized())
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

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), CoreError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CoreError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| save_failed(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
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

    /// Set a value by dot-separated key, keeping the existing value's type.
    /// Does not save.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CoreError> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        *self = updated.normalized();
        Ok(())
    }

    /// Clamp every value into the domain the engine accepts.
    pub fn normalized(mut self) -> Self {
        self.work_rest.ratio = clamp_ratio(i64::from(self.work_rest.ratio));
        self.work_rest.max_rounds = clamp_rounds(i64::from(self.work_rest.max_rounds));
        self.sound = self.sound.validated();
        self
    }

    pub fn work_rest_options(&self) -> WorkRestOptions {
        let wr = &self.work_rest;
        WorkRestOptions {
            ratio: Some(wr.ratio),
            max_rounds: Some(wr.max_rounds),
            max_work_time_ms: (wr.max_work_secs > 0).then(|| i64::from(wr.max_work_secs) * 1000),
            rest_mode: Some(wr.rest_mode),
            fixed_rest_secs: Some(wr.fixed_rest_secs),
        }
    }

    pub fn interval_plan(&self) -> IntervalPlan {
        let iv = &self.interval;
        IntervalPlan {
            work_ms: i64::from(iv.work_secs) * 1000,
            rest_ms: i64::from(iv.rest_secs) * 1000,
            sets: iv.sets,
            skip_last_rest: iv.skip_last_rest,
            repeat: iv.repeat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.work_rest.ratio, 100);
        assert_eq!(parsed.sound.countdown_beeps, 3);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [work_rest]
            ratio = 250
            rest_mode = "fixed"

            [sound]
            volume = 0.8
            "#,
        )
        .unwrap();
        assert_eq!(parsed.work_rest.ratio, 250);
        assert_eq!(parsed.work_rest.rest_mode, RestMode::Fixed);
        assert_eq!(parsed.work_rest.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(parsed.sound.volume, 0.8);
        assert!(parsed.sound.start_cue);
        assert_eq!(parsed.interval.sets, 8);
    }

    #[test]
    fn load_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg, Config::default());

        let mut changed = cfg.clone();
        changed.set("interval.sets", "4").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().interval.sets, 4);
    }

    #[test]
    fn garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "work_rest = [").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(CoreError::Config(ConfigError::LoadFailed { .. }))
        ));
    }

    #[test]
    fn get_and_set_by_path() {
        let mut cfg = Config::default();
        assert_eq!(cfg.get("work_rest.rest_mode").as_deref(), Some("ratio"));
        assert_eq!(cfg.get("sound.enabled").as_deref(), Some("true"));

        cfg.set("sound.enabled", "false").unwrap();
        cfg.set("work_rest.rest_mode", "fixed").unwrap();
        cfg.set("sound.volume", "0.25").unwrap();
        assert!(!cfg.sound.enabled);
        assert_eq!(cfg.work_rest.rest_mode, RestMode::Fixed);
        assert_eq!(cfg.sound.volume, 0.25);
    }

    #[test]
    fn set_rejects_unknown_and_invalid() {
        let mut cfg = Config::default();
        assert!(cfg.set("work_rest.nope", "1").is_err());
        assert!(cfg.set("", "1").is_err());
        assert!(cfg.set("sound.enabled", "maybe").is_err());
        assert!(cfg.set("work_rest.rest_mode", "sometimes").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn set_clamps_into_domain() {
        let mut cfg = Config::default();
        cfg.set("work_rest.ratio", "999999").unwrap();
        cfg.set("work_rest.max_rounds", "0").unwrap();
        assert_eq!(cfg.work_rest.ratio, 10_000);
        assert_eq!(cfg.work_rest.max_rounds, 1);
    }

    #[test]
    fn converts_to_engine_settings() {
        let mut cfg = Config::default();
        cfg.work_rest.max_work_secs = 90;
        let opts = cfg.work_rest_options();
        assert_eq!(opts.max_work_time_ms, Some(90_000));
        assert_eq!(opts.ratio, Some(100));

        let plan = cfg.interval_plan();
        assert_eq!(plan.work_ms, 20_000);
        assert_eq!(plan.into_sequence().steps.len(), 16);
    }
}
