//! Analysis settings supplied by the editor.
//!
//! [`ValidationSettings`] is the raw value the client sends under the
//! `phpstan` settings namespace. Its `level` is kept as a plain integer so an
//! out-of-range value survives deserialization and fails only the run that
//! uses it. [`ValidationSettings::validate`] resolves the raw value into
//! [`ResolvedSettings`], which is the only form the analyzer accepts.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Settings namespace the client synchronizes (`settings.phpstan`).
pub const SETTINGS_SECTION: &str = "phpstan";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("analysis level must be between 0 and {max}, got {value}", max = AnalysisLevel::MAX.get())]
    LevelOutOfRange { value: i64 },
}

/// PHPStan rule level, `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnalysisLevel(u8);

impl AnalysisLevel {
    pub const MIN: Self = Self(0);
    pub const MAX: Self = Self(5);

    pub fn new(value: i64) -> Result<Self, SettingsError> {
        match u8::try_from(value) {
            Ok(level) if level <= Self::MAX.0 => Ok(Self(level)),
            _ => Err(SettingsError::LevelOutOfRange { value }),
        }
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for AnalysisLevel {
    fn default() -> Self {
        Self::MAX
    }
}

/// Raw per-run settings as received from the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationSettings {
    /// Mirrors the client's `phpstan.enable` switch.
    pub enable: bool,
    pub level: Option<i64>,
    pub autoload_file: Option<PathBuf>,
    pub configuration: Option<PathBuf>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            enable: true,
            level: None,
            autoload_file: None,
            configuration: None,
        }
    }
}

impl ValidationSettings {
    /// Extract the `phpstan` section from a `workspace/didChangeConfiguration`
    /// settings object. A missing or `null` section yields the defaults.
    pub fn from_client_settings(settings: &serde_json::Value) -> Result<Self, serde_json::Error> {
        match settings.get(SETTINGS_SECTION) {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(section) => Self::deserialize(section),
        }
    }

    /// Resolve into the validated form. Runs before any side effect.
    ///
    /// Blank paths are treated as absent; clients commonly default string
    /// settings to `""`.
    pub fn validate(&self) -> Result<ResolvedSettings, SettingsError> {
        let level = match self.level {
            Some(value) => AnalysisLevel::new(value)?,
            None => AnalysisLevel::default(),
        };
        Ok(ResolvedSettings {
            level,
            autoload_file: non_blank(self.autoload_file.as_deref()),
            configuration: non_blank(self.configuration.as_deref()),
        })
    }
}

fn non_blank(path: Option<&Path>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
        .map(Path::to_path_buf)
}

/// Validated settings for a single analyzer run.
///
/// Existence of a value proves the level is in range.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedSettings {
    level: AnalysisLevel,
    autoload_file: Option<PathBuf>,
    configuration: Option<PathBuf>,
}

impl ResolvedSettings {
    #[must_use]
    pub fn level(&self) -> AnalysisLevel {
        self.level
    }

    #[must_use]
    pub fn autoload_file(&self) -> Option<&Path> {
        self.autoload_file.as_deref()
    }

    #[must_use]
    pub fn configuration(&self) -> Option<&Path> {
        self.configuration.as_deref()
    }
}
