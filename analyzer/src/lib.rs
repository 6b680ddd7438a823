//! PHPStan invocation for stan.
//!
//! - [`ExecutableResolver`] / [`probe`]: find and verify the executable
//! - [`PhpstanLinter`]: run one analysis over a document snapshot
//! - [`decode`]: turn the analyzer's JSON report into diagnostics

mod error;
mod linter;
mod process;
mod report;
mod resolve;

pub use error::{LintError, ResolveError};
pub use linter::{
    AnalyzerOptions, DEFAULT_MAX_OUTPUT_BYTES, Lint, LintFut, LintRequest, PhpstanLinter,
    build_args,
};
pub use process::{LaunchLine, QuoteStyle, launch_line, quote_arg};
pub use report::{DIAGNOSTIC_SOURCE, decode};
pub use resolve::{ExecutableResolver, default_executable_name, probe};
