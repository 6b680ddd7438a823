//! Per-document validation scheduling.
//!
//! The orchestrator is owned by the server's event loop and is never shared,
//! so its state map needs no locking. Each accepted request becomes a spawned
//! analyzer run; its result comes back as a [`Completion`] on the channel the
//! loop also selects on.
//!
//! A request for a document that already has a run in flight is dropped, not
//! queued. Edits made during a run are picked up by the next triggering event.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use stan_analyzer::{Lint, LintError, LintRequest};
use stan_types::{Diagnostic, TextDocument, ValidationSettings};
use tokio::sync::mpsc;

use crate::bridge::{Outbox, Outgoing};
use crate::documents::DocumentStore;
use crate::protocol;

/// Identifies one accepted run; monotonically increasing per orchestrator.
pub type RunId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationState {
    Idle,
    Validating,
}

/// Outcome of [`Orchestrator::request_validation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted(RunId),
    /// A run for the same document is already in flight.
    Dropped,
    /// `phpstan.enable` is off.
    Disabled,
    /// No analyzer yet (initialize has not succeeded).
    NotReady,
}

#[derive(Debug)]
pub struct Completion {
    uri: String,
    run: RunId,
    result: Result<Vec<Diagnostic>, LintError>,
}

impl Completion {
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }
}

pub struct Orchestrator {
    documents: DocumentStore,
    /// Absent means idle.
    validating: HashMap<String, RunId>,
    next_run: RunId,
    settings: ValidationSettings,
    project_root: Option<PathBuf>,
    linter: Option<Arc<dyn Lint>>,
    outbox: Outbox,
    completions: mpsc::UnboundedSender<Completion>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(outbox: Outbox, completions: mpsc::UnboundedSender<Completion>) -> Self {
        Self {
            documents: DocumentStore::new(),
            validating: HashMap::new(),
            next_run: 1,
            settings: ValidationSettings::default(),
            project_root: None,
            linter: None,
            outbox,
            completions,
        }
    }

    pub fn set_linter(&mut self, linter: Arc<dyn Lint>, project_root: Option<PathBuf>) {
        self.linter = Some(linter);
        self.project_root = project_root;
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.linter.is_some()
    }

    #[must_use]
    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    #[must_use]
    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    #[must_use]
    pub fn state(&self, uri: &str) -> ValidationState {
        if self.validating.contains_key(uri) {
            ValidationState::Validating
        } else {
            ValidationState::Idle
        }
    }

    pub fn on_document_opened(&mut self, document: TextDocument) -> Admission {
        let snapshot = self.documents.open(document).clone();
        self.request_validation(&snapshot)
    }

    pub fn on_document_changed(&mut self, uri: &str, version: i32, text: String) -> Admission {
        match self.documents.change(uri, version, text).cloned() {
            Some(snapshot) => self.request_validation(&snapshot),
            None => {
                tracing::debug!(uri, "Change for a document that is not open");
                Admission::Dropped
            }
        }
    }

    pub fn on_document_saved(&mut self, uri: &str) -> Admission {
        match self.documents.get(uri).cloned() {
            Some(snapshot) => self.request_validation(&snapshot),
            None => Admission::Dropped,
        }
    }

    /// Clears the document's diagnostics and forgets its run. An analyzer
    /// still running for it is left to finish; its result is discarded.
    pub fn on_document_closed(&mut self, uri: &str) {
        self.documents.close(uri);
        if self.validating.remove(uri).is_some() {
            tracing::debug!(uri, "Closed during validation, result will be discarded");
        }
        self.outbox.send(Outgoing::clear(uri));
    }

    pub fn on_settings_changed(&mut self, settings: ValidationSettings) {
        self.settings = settings;
        if self.settings.enable {
            self.validate_all_open();
        } else {
            tracing::info!("Validation disabled, clearing diagnostics");
            for document in self.documents.all() {
                self.outbox.send(Outgoing::clear(document.uri()));
            }
        }
    }

    pub fn validate_all_open(&mut self) {
        let snapshots: Vec<TextDocument> = self.documents.all().cloned().collect();
        self.validate_many(&snapshots);
    }

    /// Request validation for each document independently.
    pub fn validate_many(&mut self, documents: &[TextDocument]) {
        for document in documents {
            self.request_validation(document);
        }
    }

    pub fn request_validation(&mut self, document: &TextDocument) -> Admission {
        let uri = document.uri();
        if !self.settings.enable {
            return Admission::Disabled;
        }
        let Some(linter) = self.linter.clone() else {
            tracing::debug!(uri, "Analyzer not ready, skipping validation");
            return Admission::NotReady;
        };
        if self.validating.contains_key(uri) {
            tracing::debug!(uri, "Validation already in flight, dropping request");
            return Admission::Dropped;
        }

        let run = self.next_run;
        self.next_run += 1;
        self.validating.insert(uri.to_string(), run);
        self.outbox.send(Outgoing::started(uri));
        tracing::debug!(uri, run, version = document.version(), "Validation started");

        let request = LintRequest {
            uri: uri.to_string(),
            text: document.text().to_string(),
            settings: self.settings.clone(),
            project_root: self.project_root.clone(),
        };
        spawn_run(linter, request, run, self.completions.clone());

        Admission::Accepted(run)
    }

    /// Settle a finished run: `Ended` always goes out; diagnostics or the
    /// failure only when the run is still the document's current one and
    /// validation is enabled.
    pub fn on_completion(&mut self, completion: Completion) {
        let Completion { uri, run, result } = completion;
        self.outbox.send(Outgoing::ended(&uri));

        if self.validating.get(&uri) != Some(&run) {
            tracing::debug!(uri = %uri, run, "Discarding result of a superseded run");
            return;
        }
        self.validating.remove(&uri);

        if !self.settings.enable {
            tracing::debug!(uri = %uri, run, "Validation disabled, discarding result");
            return;
        }

        match result {
            Ok(diagnostics) => {
                tracing::debug!(uri = %uri, run, count = diagnostics.len(), "Validation finished");
                self.outbox.send(Outgoing::PublishDiagnostics { uri, diagnostics });
            }
            Err(error) => {
                tracing::warn!(
                    uri = %uri,
                    run,
                    category = error.category(),
                    "Validation failed: {error}"
                );
                self.outbox
                    .send(Outgoing::ShowError(failure_message(&uri, &error)));
            }
        }
    }
}

fn spawn_run(
    linter: Arc<dyn Lint>,
    request: LintRequest,
    run: RunId,
    completions: mpsc::UnboundedSender<Completion>,
) {
    let uri = request.uri.clone();
    let analysis = tokio::spawn(async move { linter.lint(&request).await });
    tokio::spawn(async move {
        let result = match analysis.await {
            Ok(result) => result,
            Err(e) => Err(LintError::Io(std::io::Error::other(format!(
                "analysis task failed: {e}"
            )))),
        };
        if completions.send(Completion { uri, run, result }).is_err() {
            tracing::debug!(run, "Server stopped before validation completed");
        }
    });
}

/// `phpstan: <file>: <message>` on a single line.
#[must_use]
pub fn failure_message(uri: &str, error: &LintError) -> String {
    let file = protocol::file_uri_to_path(uri)
        .map_or_else(|| uri.to_string(), |path| path.display().to_string());
    let detail = error.to_string();
    let detail = detail.trim_start();
    let detail = detail.strip_prefix("ERROR: ").unwrap_or(detail);
    let flattened = detail
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!("phpstan: {file}: {flattened}")
}
