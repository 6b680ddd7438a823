//! Error types at the analyzer boundary.

use std::path::PathBuf;
use std::time::Duration;

use stan_types::SettingsError;

/// Why a single validation run failed.
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    #[error(transparent)]
    InvalidSettings(#[from] SettingsError),
    #[error("cannot derive a file path from document URI {uri}")]
    UnsupportedUri { uri: String },
    #[error("failed to spawn {}: {source}", executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("analyzer I/O failed: {0}")]
    Io(#[source] std::io::Error),
    #[error("analyzer output exceeded {limit} bytes")]
    OutputTooLarge { limit: usize },
    #[error("analyzer terminated abnormally ({status})")]
    AbnormalExit { status: String },
    #[error("analyzer exited with code {exit_code} without printing a report")]
    ExitedWithoutOutput { exit_code: i32 },
    #[error("analyzer did not finish within {} ms", timeout.as_millis())]
    TimedOut { timeout: Duration },
    #[error("unable to parse analyzer output (exit code {exit_code}): {source}: {excerpt}")]
    Malformed {
        exit_code: i32,
        excerpt: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{}", messages.join(" "))]
    Reported { messages: Vec<String> },
}

impl LintError {
    /// Short category for structured logs.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidSettings(_) => "invalid_settings",
            Self::UnsupportedUri { .. } => "unsupported_uri",
            Self::Spawn { .. }
            | Self::Io(_)
            | Self::AbnormalExit { .. }
            | Self::ExitedWithoutOutput { .. } => "process",
            Self::OutputTooLarge { .. } => "output_too_large",
            Self::TimedOut { .. } => "timeout",
            Self::Malformed { .. } => "malformed_output",
            Self::Reported { .. } => "analyzer_error",
        }
    }
}

/// Why the analyzer executable could not be located.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(
        "Unable to locate phpstan. Add phpstan to your global PATH or install it in your project with composer."
    )]
    NotFound,
    #[error(
        "A composer.json was found at the root of your project but no composer.lock. You may need to install your dependencies with \"composer install\"."
    )]
    ComposerUninitialized,
    #[error(
        "Your composer dependencies include phpstan but it was not found under {}. You may need to update your dependencies with \"composer update\".",
        path.display()
    )]
    VendorBinaryMissing { path: PathBuf },
    #[error("phpstan at {} did not answer --version: {reason}", path.display())]
    Probe { path: PathBuf, reason: String },
}
