//! The Analyzer Invoker.
//!
//! [`Lint`] is the seam the orchestrator calls through; [`PhpstanLinter`] is
//! the production implementation that spawns the resolved executable.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use stan_types::{Diagnostic, ResolvedSettings, ValidationSettings};
use url::Url;

use crate::error::{LintError, ResolveError};
use crate::process::{self, QuoteStyle};
use crate::report;
use crate::resolve::{self, ExecutableResolver};

/// Default cap on combined stdout+stderr.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

pub type LintFut<'a> = Pin<Box<dyn Future<Output = Result<Vec<Diagnostic>, LintError>> + Send + 'a>>;

/// Snapshot of everything one validation run needs.
#[derive(Debug, Clone)]
pub struct LintRequest {
    pub uri: String,
    pub text: String,
    pub settings: ValidationSettings,
    /// Working directory for the analyzer.
    pub project_root: Option<PathBuf>,
}

pub trait Lint: Send + Sync {
    fn lint<'a>(&'a self, request: &'a LintRequest) -> LintFut<'a>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerOptions {
    pub max_output_bytes: usize,
    /// `None` waits for the analyzer indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhpstanLinter {
    executable: PathBuf,
    options: AnalyzerOptions,
    quote_style: QuoteStyle,
}

impl PhpstanLinter {
    #[must_use]
    pub fn new(executable: PathBuf, options: AnalyzerOptions) -> Self {
        Self {
            executable,
            options,
            quote_style: QuoteStyle::host(),
        }
    }

    /// Resolve the executable (unless `executable_override` is set) and probe
    /// it with `--version`.
    pub async fn locate(
        project_root: Option<&Path>,
        executable_override: Option<&Path>,
        options: AnalyzerOptions,
    ) -> Result<Self, ResolveError> {
        let executable = match executable_override {
            Some(path) => path.to_path_buf(),
            None => ExecutableResolver::new().resolve(project_root)?,
        };
        let version = resolve::probe(&executable).await?;
        tracing::info!(
            executable = %executable.display(),
            version = %version,
            "Analyzer ready"
        );
        Ok(Self::new(executable, options))
    }

    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub async fn run(&self, request: &LintRequest) -> Result<Vec<Diagnostic>, LintError> {
        let settings = request.settings.validate()?;

        if request.text.is_empty() {
            return Ok(Vec::new());
        }

        let target = target_path(&request.uri)?;
        let args = build_args(&settings, &target);
        tracing::debug!(
            uri = %request.uri,
            executable = %self.executable.display(),
            ?args,
            "Running analyzer"
        );

        let cmd = process::build_command(&self.executable, &args, self.quote_style);
        let captured = process::run(
            cmd,
            &self.executable,
            request.text.clone().into_bytes(),
            request.project_root.as_deref(),
            self.options.max_output_bytes,
            self.options.timeout,
        )
        .await?;

        let Some(exit_code) = captured.status.code() else {
            return Err(LintError::AbnormalExit {
                status: captured.status.to_string(),
            });
        };

        let output = String::from_utf8_lossy(&captured.output);
        // Exit 1 with a report means findings; a non-zero exit with nothing
        // printed never carries one.
        if exit_code != 0 && output.trim().is_empty() {
            return Err(LintError::ExitedWithoutOutput { exit_code });
        }
        let diagnostics = report::decode(&output, exit_code)?;
        tracing::debug!(
            uri = %request.uri,
            exit_code,
            count = diagnostics.len(),
            "Analyzer finished"
        );
        Ok(diagnostics)
    }
}

impl Lint for PhpstanLinter {
    fn lint<'a>(&'a self, request: &'a LintRequest) -> LintFut<'a> {
        Box::pin(self.run(request))
    }
}

fn target_path(uri: &str) -> Result<PathBuf, LintError> {
    let unsupported = || LintError::UnsupportedUri {
        uri: uri.to_string(),
    };
    let url = Url::parse(uri).map_err(|_| unsupported())?;
    if url.scheme() != "file" {
        return Err(unsupported());
    }
    url.to_file_path().map_err(|()| unsupported())
}

/// Command line for `phpstan analyse` on a single file.
#[must_use]
pub fn build_args(settings: &ResolvedSettings, target: &Path) -> Vec<String> {
    let mut args = vec![
        "analyse".to_string(),
        "--error-format=json".to_string(),
        "--no-progress".to_string(),
        format!("--level={}", settings.level().get()),
    ];
    if let Some(autoload) = settings.autoload_file() {
        args.push(format!("--autoload-file={}", autoload.display()));
    }
    if let Some(configuration) = settings.configuration() {
        args.push(format!("--configuration={}", configuration.display()));
    }
    args.push(target.display().to_string());
    args
}
