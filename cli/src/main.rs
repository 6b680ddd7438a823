//! stan-ls - PHPStan language server over stdio.
//!
//! ```text
//! main() -> init_tracing() -> StanConfig::load() -> stan_lsp::serve(stdin, stdout)
//! ```
//!
//! stdout carries the protocol, so logs go to a file (or stderr when no log
//! file can be opened).

use anyhow::Result;
use clap::Parser;
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    sync::Mutex,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use stan_config::StanConfig;
use stan_lsp::{LinterSource, ServerOptions, serve};

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Parser)]
#[command(name = "stan-ls", version)]
#[command(about = "PHPStan language server over stdio")]
struct Cli {
    /// Talk LSP over stdin/stdout (the only transport; accepted for clients
    /// that always pass it)
    #[arg(long)]
    stdio: bool,

    /// Client-specific flags such as `--clientProcessId=42`; ignored
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    ignored: Vec<String>,
}

fn init_tracing(configured_filter: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured_filter.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: <config dir>/stan/logs/stan-ls.log
    if let Some(config_dir) = default_config_dir() {
        candidates.push(config_dir.join("logs").join("stan-ls.log"));
    }

    // Fallback: ./.stan/logs/stan-ls.log
    candidates.push(PathBuf::from(".stan").join("logs").join("stan-ls.log"));

    candidates
}

/// Directory of the default config file, regardless of `STAN_CONFIG`.
fn default_config_dir() -> Option<PathBuf> {
    StanConfig::default_path().and_then(|path| path.parent().map(PathBuf::from))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = match StanConfig::load() {
        Ok(config) => (config.unwrap_or_default(), None),
        Err(e) => (StanConfig::default(), Some(e)),
    };

    init_tracing(config.log.filter.as_deref());
    if let Some(e) = config_error {
        tracing::warn!(path = %e.path().display(), "Ignoring configuration: {e}");
    }
    tracing::debug!(stdio = cli.stdio, "Serving over stdin/stdout");
    if !cli.ignored.is_empty() {
        tracing::debug!(ignored = ?cli.ignored, "Ignoring unrecognized arguments");
    }

    let options = ServerOptions {
        linter: LinterSource::Locate {
            executable: config.analyzer.executable(),
            options: config.analyzer.options(),
        },
    };

    let termination = serve(tokio::io::stdin(), tokio::io::stdout(), options).await?;

    // A blocked stdin read keeps the runtime alive; leave directly.
    std::process::exit(termination.exit_code());
}
