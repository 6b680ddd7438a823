//! Decoding of the analyzer's JSON report into diagnostics.
//!
//! Two shapes are accepted:
//!
//! ```text
//! {"src/Foo.php": [{"line": 5, "message": "..."}]}
//!
//! {"totals": {...},
//!  "files": {"src/Foo.php": {"errors": 1, "messages": [{"line": 5, "message": "..."}]}},
//!  "errors": []}
//! ```
//!
//! The second is PHPStan's native `--error-format=json`. Anything else is a
//! decode failure; it is never read as an empty report.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::IgnoredAny;
use stan_types::{Diagnostic, DiagnosticSeverity, Position, Range};

use crate::error::LintError;

/// Source tag attached to every diagnostic this crate produces.
pub const DIAGNOSTIC_SOURCE: &str = "phpstan";

/// Maximum number of output characters quoted back in a decode error.
const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct Finding {
    /// 1-based; PHPStan reports `null` for file-level problems.
    #[serde(default)]
    line: Option<u32>,
    message: String,
}

#[derive(Debug, Deserialize)]
struct FileReport {
    messages: Vec<Finding>,
}

/// PHP encodes an empty associative array as `[]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileMap {
    Files(BTreeMap<String, FileReport>),
    Empty([IgnoredAny; 0]),
}

#[derive(Debug, Deserialize)]
struct NativeReport {
    files: FileMap,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Report {
    Native(NativeReport),
    Flat(BTreeMap<String, Vec<Finding>>),
}

/// Decode the concatenated stdout+stderr of one analyzer run.
pub fn decode(output: &str, exit_code: i32) -> Result<Vec<Diagnostic>, LintError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let report: Report = serde_json::from_str(trimmed).map_err(|source| LintError::Malformed {
        exit_code,
        excerpt: excerpt(trimmed),
        source,
    })?;

    let findings: Vec<Finding> = match report {
        Report::Flat(files) => files.into_values().flatten().collect(),
        Report::Native(native) => {
            let files = match native.files {
                FileMap::Files(files) => files,
                FileMap::Empty(_) => BTreeMap::new(),
            };
            if !native.errors.is_empty() {
                if files.is_empty() {
                    return Err(LintError::Reported {
                        messages: native.errors,
                    });
                }
                tracing::warn!(
                    errors = ?native.errors,
                    "Analyzer reported general errors alongside file findings"
                );
            }
            files
                .into_values()
                .flat_map(|file| file.messages)
                .collect()
        }
    };

    Ok(findings.into_iter().map(to_diagnostic).collect())
}

fn to_diagnostic(finding: Finding) -> Diagnostic {
    let line = finding.line.unwrap_or(0).saturating_sub(1);
    Diagnostic::new(
        Range::zero_width(Position::new(line, 0)),
        DiagnosticSeverity::Error,
        finding.message,
        DIAGNOSTIC_SOURCE.to_string(),
    )
}

fn excerpt(output: &str) -> String {
    let mut chars = output.chars();
    let head: String = chars.by_ref().take(EXCERPT_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
