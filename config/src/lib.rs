//! Server-side configuration (`config.toml`).
//!
//! Editor settings travel over the LSP channel; this file only covers what
//! the client cannot know: where phpstan lives, how long it may run, and how
//! much it may print.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use stan_analyzer::{AnalyzerOptions, DEFAULT_MAX_OUTPUT_BYTES};

/// Overrides the config file location.
pub const CONFIG_ENV: &str = "STAN_CONFIG";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StanConfig {
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerConfig {
    /// Skips executable resolution. `${VAR}` references are expanded.
    pub executable: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_output_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `"stan_lsp=debug,info"`.
    pub filter: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => path,
        }
    }
}

impl AnalyzerConfig {
    #[must_use]
    pub fn executable(&self) -> Option<PathBuf> {
        self.executable
            .as_deref()
            .map(expand_env_vars)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
    }

    /// A zero timeout is treated as "no timeout".
    #[must_use]
    pub fn options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            max_output_bytes: self.max_output_bytes.unwrap_or(DEFAULT_MAX_OUTPUT_BYTES),
            timeout: self
                .timeout_ms
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
        }
    }
}

/// Replace `${NAME}` with the variable's value; unset variables expand to
/// nothing and an unterminated `${` is kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        if !name.is_empty() {
            out.push_str(&env::var(name).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl StanConfig {
    /// Load from [`StanConfig::path`]. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(Some(config))
    }

    /// `$STAN_CONFIG`, else [`StanConfig::default_path`].
    #[must_use]
    pub fn path() -> Option<PathBuf> {
        match env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            Some(explicit) => Some(PathBuf::from(explicit)),
            None => Self::default_path(),
        }
    }

    /// `<config dir>/stan/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stan").join("config.toml"))
    }
}
