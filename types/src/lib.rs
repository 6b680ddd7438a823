//! Core domain types for stan.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. The analyzer, the language server and the status observer
//! all speak these types.

mod diagnostic;
mod document;
mod progress;
mod settings;

pub use diagnostic::{Diagnostic, DiagnosticSeverity, Position, Range};
pub use document::{TextDocument, TextDocumentIdentifier};
pub use progress::{
    DID_END_VALIDATE_METHOD, DID_START_VALIDATE_METHOD, ProgressEvent, ProgressNotification,
    ValidationProgressParams,
};
pub use settings::{
    AnalysisLevel, ResolvedSettings, SETTINGS_SECTION, SettingsError, ValidationSettings,
};
