//! Client-bound messages produced by the orchestrator.
//!
//! Everything the orchestrator wants the editor to see goes through an
//! [`Outbox`] as an [`Outgoing`] value; the writer task serializes them in the
//! order they were queued. That single queue is what keeps `Started` ahead of
//! `Ended` and `Ended` ahead of the diagnostics for the same run.

use serde_json::Value;
use stan_types::{Diagnostic, ProgressNotification};
use tokio::sync::mpsc;

use crate::protocol::{self, Notification};

#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Progress(ProgressNotification),
    PublishDiagnostics {
        uri: String,
        diagnostics: Vec<Diagnostic>,
    },
    ShowError(String),
}

impl Outgoing {
    #[must_use]
    pub fn started(uri: &str) -> Self {
        Self::Progress(ProgressNotification::started(uri))
    }

    #[must_use]
    pub fn ended(uri: &str) -> Self {
        Self::Progress(ProgressNotification::ended(uri))
    }

    #[must_use]
    pub fn clear(uri: &str) -> Self {
        Self::PublishDiagnostics {
            uri: uri.to_string(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn into_notification(self) -> Notification {
        match self {
            Self::Progress(progress) => {
                Notification::new(progress.method(), Some(progress_params(&progress)))
            }
            Self::PublishDiagnostics { uri, diagnostics } => Notification::new(
                "textDocument/publishDiagnostics",
                Some(protocol::publish_diagnostics_params(&uri, &diagnostics)),
            ),
            Self::ShowError(message) => Notification::new(
                "window/showMessage",
                Some(protocol::show_error_params(&message)),
            ),
        }
    }
}

fn progress_params(progress: &ProgressNotification) -> Value {
    serde_json::to_value(progress.params()).unwrap_or(Value::Null)
}

/// Sending half of the client-bound queue.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl Outbox {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<Outgoing>) -> Self {
        Self { tx }
    }

    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Queue a message. A closed queue means the connection is gone, so the
    /// message is dropped.
    pub fn send(&self, message: Outgoing) {
        if self.tx.send(message).is_err() {
            tracing::debug!("Client connection closed, dropping outgoing message");
        }
    }
}
