//! Text document snapshots.

use serde::{Deserialize, Serialize};

/// LSP `TextDocumentIdentifier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDocumentIdentifier {
    pub uri: String,
}

impl TextDocumentIdentifier {
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

/// Snapshot of an open document as last synchronized by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    uri: String,
    language_id: String,
    version: i32,
    text: String,
}

impl TextDocument {
    #[must_use]
    pub fn new(
        uri: impl Into<String>,
        language_id: impl Into<String>,
        version: i32,
        text: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            language_id: language_id.into(),
            version,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    #[must_use]
    pub fn version(&self) -> i32 {
        self.version
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the full content (full-text synchronization).
    pub fn replace(&mut self, version: i32, text: String) {
        self.version = version;
        self.text = text;
    }
}
