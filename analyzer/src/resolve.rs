//! Locating the phpstan executable.
//!
//! The global `PATH` is searched first. A composer-managed project then
//! takes precedence: when `composer.lock` lists `phpstan/phpstan`, the
//! vendor binary must exist and wins over whatever `PATH` produced.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::ResolveError;
use crate::process::{self, QuoteStyle};

const PHPSTAN_PACKAGE: &str = "phpstan/phpstan";

const DEFAULT_VENDOR_DIR: &str = "vendor";

const PROBE_TIMEOUT_SECS: u64 = 30;

#[must_use]
pub fn default_executable_name() -> &'static str {
    if cfg!(windows) { "phpstan.bat" } else { "phpstan" }
}

#[derive(Debug, Default, Deserialize)]
struct ComposerManifest {
    #[serde(default)]
    config: ComposerConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ComposerConfig {
    #[serde(rename = "vendor-dir")]
    vendor_dir: Option<String>,
    #[serde(rename = "bin-dir")]
    bin_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ComposerLock {
    #[serde(default)]
    packages: Vec<ComposerPackage>,
    #[serde(default, rename = "packages-dev")]
    packages_dev: Vec<ComposerPackage>,
}

#[derive(Debug, Deserialize)]
struct ComposerPackage {
    name: String,
}

impl ComposerLock {
    fn requires(&self, package: &str) -> bool {
        self.packages
            .iter()
            .chain(&self.packages_dev)
            .any(|p| p.name == package)
    }
}

/// Searches `PATH` and the project's composer setup for phpstan.
#[derive(Debug, Clone)]
pub struct ExecutableResolver {
    executable_name: String,
    /// Overrides the process `PATH` (tests).
    search_path: Option<OsString>,
}

impl Default for ExecutableResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutableResolver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            executable_name: default_executable_name().to_string(),
            search_path: None,
        }
    }

    #[must_use]
    pub fn with_search_path(mut self, search_path: impl Into<OsString>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    #[must_use]
    pub fn with_executable_name(mut self, name: impl Into<String>) -> Self {
        self.executable_name = name.into();
        self
    }

    pub fn resolve(&self, project_root: Option<&Path>) -> Result<PathBuf, ResolveError> {
        let global = self.search_global();

        if let Some(root) = project_root
            && let Some(vendor) = self.composer_binary(root)?
        {
            tracing::debug!(path = %vendor.display(), "Using composer-managed phpstan");
            return Ok(vendor);
        }

        match global {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Using phpstan from PATH");
                Ok(path)
            }
            None => Err(ResolveError::NotFound),
        }
    }

    fn search_global(&self) -> Option<PathBuf> {
        let found = match &self.search_path {
            Some(paths) => {
                let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
                which::which_in(&self.executable_name, Some(paths), cwd)
            }
            None => which::which(&self.executable_name),
        };
        found.ok()
    }

    fn composer_binary(&self, root: &Path) -> Result<Option<PathBuf>, ResolveError> {
        let manifest_path = root.join("composer.json");
        if !manifest_path.is_file() {
            return Ok(None);
        }

        let lock_path = root.join("composer.lock");
        if !lock_path.is_file() {
            return Err(ResolveError::ComposerUninitialized);
        }

        let lock: ComposerLock = read_json_or_default(&lock_path);
        if !lock.requires(PHPSTAN_PACKAGE) {
            return Ok(None);
        }

        let manifest: ComposerManifest = read_json_or_default(&manifest_path);
        let vendor = vendor_binary_path(root, &manifest.config, &self.executable_name);
        if vendor.is_file() {
            Ok(Some(vendor))
        } else {
            Err(ResolveError::VendorBinaryMissing { path: vendor })
        }
    }
}

fn vendor_binary_path(root: &Path, config: &ComposerConfig, executable_name: &str) -> PathBuf {
    if let Some(bin_dir) = &config.bin_dir {
        return root.join(bin_dir).join(executable_name);
    }
    let vendor_dir = config.vendor_dir.as_deref().unwrap_or(DEFAULT_VENDOR_DIR);
    root.join(vendor_dir).join("bin").join(executable_name)
}

/// Composer files that fail to parse are treated as empty.
fn read_json_or_default<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> T {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str(&content).map_err(|e| e.to_string()));
    match parsed {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Ignoring unreadable composer file: {e}");
            T::default()
        }
    }
}

/// Run `<executable> --version` once to confirm the binary works.
///
/// Returns the trimmed version banner.
pub async fn probe(executable: &Path) -> Result<String, ResolveError> {
    let probe_error = |reason: String| ResolveError::Probe {
        path: executable.to_path_buf(),
        reason,
    };

    let mut cmd: Command =
        process::build_command(executable, &["--version".to_string()], QuoteStyle::host());
    cmd.kill_on_drop(true);

    let output = tokio::time::timeout(Duration::from_secs(PROBE_TIMEOUT_SECS), cmd.output())
        .await
        .map_err(|_| probe_error(format!("no answer within {PROBE_TIMEOUT_SECS}s")))?
        .map_err(|e| probe_error(e.to_string()))?;

    if !output.status.success() {
        return Err(probe_error(format!("exited with {}", output.status)));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
