//! TOML-based application configuration.
//!
//! Holds the tuning constants of every sensor pipeline:
//! - Pose confidence floors and detection cadence
//! - Step/energy thresholds and fallback timing for motion
//! - Analyser shape and sampling cadence for tempo
//! - Session tick and default routine
//!
//! Configuration is stored at `~/.config/dancebud/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;

/// Pose detection and scoring thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseConfig {
    /// Keypoints at or below this are left out of `PoseTracker::last_skeleton`.
    #[serde(default = "default_draw_confidence")]
    pub draw_confidence: f64,
    /// Keypoints at or below this do not contribute to the score.
    #[serde(default = "default_score_confidence")]
    pub score_confidence: f64,
    #[serde(default = "default_detect_interval_ms")]
    pub detect_interval_ms: u64,
}

/// Step detection, energy and fallback tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    #[serde(default = "default_step_threshold")]
    pub step_threshold: f64,
    #[serde(default = "default_step_debounce_ms")]
    pub step_debounce_ms: u64,
    /// Degrees per second. Declared for a gyroscope turn detector that does
    /// not exist yet; nothing reads it.
    #[serde(default = "default_turn_threshold")]
    pub turn_threshold: f64,
    #[serde(default = "default_activity_window")]
    pub activity_window: usize,
    #[serde(default = "default_energy_scale")]
    pub energy_scale: f64,
    #[serde(default = "default_fallback_grace_ms")]
    pub fallback_grace_ms: u64,
    #[serde(default = "default_fallback_interval_ms")]
    pub fallback_interval_ms: u64,
    #[serde(default = "default_calibration_samples")]
    pub calibration_samples: usize,
}

/// Frequency analyser shape and tempo sampling cadence.
///
/// `fft_size`, `smoothing_time_constant` and the decibel range describe the
/// analyser; they reach it through [`AudioInput::open`](crate::AudioInput::open).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Weight of the previous frame when averaging magnitudes (0..=1).
    #[serde(default = "default_smoothing_time_constant")]
    pub smoothing_time_constant: f64,
    #[serde(default = "default_bass_bins")]
    pub bass_bins: usize,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// Levels at or below this map to byte 0; `max_decibels` maps to 255.
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f64,
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f64,
}

impl AudioConfig {
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }
}

/// Session engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default = "default_routine")]
    pub default_routine: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/dancebud/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pose: PoseConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

// Default functions
fn default_draw_confidence() -> f64 {
    0.3
}
fn default_score_confidence() -> f64 {
    0.5
}
fn default_detect_interval_ms() -> u64 {
    33
}
fn default_step_threshold() -> f64 {
    1.2
}
fn default_step_debounce_ms() -> u64 {
    300
}
fn default_turn_threshold() -> f64 {
    150.0
}
fn default_activity_window() -> usize {
    20
}
fn default_energy_scale() -> f64 {
    30.0
}
fn default_fallback_grace_ms() -> u64 {
    2_000
}
fn default_fallback_interval_ms() -> u64 {
    800
}
fn default_calibration_samples() -> usize {
    30
}
fn default_fft_size() -> usize {
    2048
}
fn default_smoothing_time_constant() -> f64 {
    0.8
}
fn default_bass_bins() -> usize {
    20
}
fn default_sample_interval_ms() -> u64 {
    500
}
fn default_min_decibels() -> f64 {
    -90.0
}
fn default_max_decibels() -> f64 {
    -10.0
}
fn default_tick_interval_ms() -> u64 {
    1_000
}
fn default_routine() -> String {
    "Freestyle".into()
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            draw_confidence: default_draw_confidence(),
            score_confidence: default_score_confidence(),
            detect_interval_ms: default_detect_interval_ms(),
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            step_threshold: default_step_threshold(),
            step_debounce_ms: default_step_debounce_ms(),
            turn_threshold: default_turn_threshold(),
            activity_window: default_activity_window(),
            energy_scale: default_energy_scale(),
            fallback_grace_ms: default_fallback_grace_ms(),
            fallback_interval_ms: default_fallback_interval_ms(),
            calibration_samples: default_calibration_samples(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing_time_constant: default_smoothing_time_constant(),
            bass_bins: default_bass_bins(),
            sample_interval_ms: default_sample_interval_ms(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            default_routine: default_routine(),
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
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => value
                        .parse::<bool>()
                        .map(serde_json::Value::Bool)
                        .map_err(|e| invalid(e.to_string()))?,
                    serde_json::Value::Number(n) => {
                        if n.is_f64() {
                            value
                                .parse::<f64>()
                                .ok()
                                .and_then(serde_json::Number::from_f64)
                                .map(serde_json::Value::Number)
                                .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                        } else if let Ok(n) = value.parse::<u64>() {
                            serde_json::Value::Number(n.into())
                        } else {
                            return Err(invalid(format!("cannot parse '{value}' as integer")));
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

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    /// `<data_dir>/config.toml`
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/dancebud"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from the data directory, writing defaults when the file is
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let cfg = Self::default();
            cfg.save_to(&path)?;
            Ok(cfg)
        }
    }

    /// Load from an explicit path. A missing file is an error here.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
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
    /// Only mutates in memory; call [`Config::save`] to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed
    /// as the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Every leaf as `(dotted.key, value)`, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
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

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
