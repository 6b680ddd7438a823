//! Diagnostics published to the editor.

use serde::{Serialize, Serializer};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl Serialize for DiagnosticSeverity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// 0-indexed line/character position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Empty range anchored at `position`.
    #[must_use]
    pub const fn zero_width(position: Position) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A single finding, serialized in LSP `Diagnostic` shape.
///
/// Fields are private; external consumers read via accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    range: Range,
    severity: DiagnosticSeverity,
    /// Analyzer that produced the finding (e.g. "phpstan").
    source: String,
    message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        range: Range,
        severity: DiagnosticSeverity,
        message: String,
        source: String,
    ) -> Self {
        Self {
            range,
            severity,
            source,
            message,
        }
    }

    #[must_use]
    pub fn range(&self) -> Range {
        self.range
    }

    #[must_use]
    pub fn severity(&self) -> DiagnosticSeverity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}
