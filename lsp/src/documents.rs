//! Open documents as last synchronized by the client.

use std::collections::HashMap;

use stan_types::TextDocument;

#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: HashMap<String, TextDocument>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly opened document, replacing any stale copy.
    pub fn open(&mut self, document: TextDocument) -> &TextDocument {
        let uri = document.uri().to_string();
        self.documents.insert(uri.clone(), document);
        &self.documents[&uri]
    }

    /// Apply a full-text change. Changes for unknown URIs are ignored.
    pub fn change(&mut self, uri: &str, version: i32, text: String) -> Option<&TextDocument> {
        let document = self.documents.get_mut(uri)?;
        if version < document.version() {
            tracing::debug!(
                uri,
                version,
                current = document.version(),
                "Ignoring out-of-order change"
            );
            return Some(document);
        }
        document.replace(version, text);
        Some(document)
    }

    pub fn close(&mut self, uri: &str) -> Option<TextDocument> {
        self.documents.remove(uri)
    }

    #[must_use]
    pub fn get(&self, uri: &str) -> Option<&TextDocument> {
        self.documents.get(uri)
    }

    #[must_use]
    pub fn is_open(&self, uri: &str) -> bool {
        self.documents.contains_key(uri)
    }

    pub fn all(&self) -> impl Iterator<Item = &TextDocument> {
        self.documents.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
