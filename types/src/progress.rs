//! Validation progress notifications.
//!
//! Two one-way signals flow from the server to the status observer:
//! `didStartValidateTextDocument` and `didEndValidateTextDocument`, each
//! carrying only the document identifier.

use serde::{Deserialize, Serialize};

use crate::TextDocumentIdentifier;

pub const DID_START_VALIDATE_METHOD: &str = "didStartValidateTextDocument";
pub const DID_END_VALIDATE_METHOD: &str = "didEndValidateTextDocument";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressEvent {
    Started,
    Ended,
}

impl ProgressEvent {
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::Started => DID_START_VALIDATE_METHOD,
            Self::Ended => DID_END_VALIDATE_METHOD,
        }
    }

    #[must_use]
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            DID_START_VALIDATE_METHOD => Some(Self::Started),
            DID_END_VALIDATE_METHOD => Some(Self::Ended),
            _ => None,
        }
    }
}

/// Wire params for both progress methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationProgressParams {
    pub text_document: TextDocumentIdentifier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressNotification {
    event: ProgressEvent,
    uri: String,
}

impl ProgressNotification {
    #[must_use]
    pub fn started(uri: impl Into<String>) -> Self {
        Self {
            event: ProgressEvent::Started,
            uri: uri.into(),
        }
    }

    #[must_use]
    pub fn ended(uri: impl Into<String>) -> Self {
        Self {
            event: ProgressEvent::Ended,
            uri: uri.into(),
        }
    }

    #[must_use]
    pub fn event(&self) -> ProgressEvent {
        self.event
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn method(&self) -> &'static str {
        self.event.method()
    }

    #[must_use]
    pub fn params(&self) -> ValidationProgressParams {
        ValidationProgressParams {
            text_document: TextDocumentIdentifier::new(self.uri.clone()),
        }
    }

    /// Decode an incoming notification.
    ///
    /// Returns `Ok(None)` for methods that are not progress notifications.
    pub fn from_notification(
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<Self>, serde_json::Error> {
        let Some(event) = ProgressEvent::from_method(method) else {
            return Ok(None);
        };
        let params: ValidationProgressParams = serde_json::from_value(params)?;
        Ok(Some(Self {
            event,
            uri: params.text_document.uri,
        }))
    }
}
