//! Aggregation of validation progress notifications.

use std::collections::HashMap;

use stan_types::{ProgressEvent, ProgressNotification};

const SPINNER_FRAMES: &[&str] = &["|", "/", "-", "\\"];

#[must_use]
pub fn spinner_frame(tick: usize) -> &'static str {
    SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]
}

/// Counts validations in flight.
///
/// The counter and the per-URI counts are updated together but kept
/// separately: the counter follows the notification pairing, while the map
/// answers "is this document being linted". A URI can have more than one
/// run in flight when it is closed and reopened mid-run.
#[derive(Debug, Default)]
pub struct StatusTracker {
    active: usize,
    documents: HashMap<String, usize>,
}

impl StatusTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_processing(&mut self, uri: &str) {
        self.active += 1;
        *self.documents.entry(uri.to_string()).or_default() += 1;
        tracing::info!(uri, active = self.active, "Linting started on {uri}");
    }

    /// An `Ended` without a matching `Started` leaves the counter at zero.
    pub fn end_processing(&mut self, uri: &str) {
        self.active = self.active.saturating_sub(1);
        if let Some(count) = self.documents.get_mut(uri) {
            *count -= 1;
            if *count == 0 {
                self.documents.remove(uri);
            }
        }
        tracing::info!(uri, active = self.active, "Linting completed on {uri}");
    }

    pub fn apply(&mut self, notification: &ProgressNotification) {
        match notification.event() {
            ProgressEvent::Started => self.start_processing(notification.uri()),
            ProgressEvent::Ended => self.end_processing(notification.uri()),
        }
    }

    /// Feed a raw notification. Returns `Ok(false)` for methods that are not
    /// validation progress.
    pub fn handle_notification(
        &mut self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<bool, serde_json::Error> {
        match ProgressNotification::from_notification(method, params)? {
            Some(notification) => {
                self.apply(&notification);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    #[must_use]
    pub fn active(&self) -> usize {
        self.active
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active > 0
    }

    #[must_use]
    pub fn is_processing(&self, uri: &str) -> bool {
        self.documents.contains_key(uri)
    }

    /// Status line for the given animation tick, or `None` when idle.
    #[must_use]
    pub fn status_text(&self, tick: usize) -> Option<String> {
        if !self.is_active() {
            return None;
        }
        let noun = if self.active == 1 { "document" } else { "documents" };
        Some(format!(
            "phpstan is linting {} {noun} ... {}",
            self.active,
            spinner_frame(tick)
        ))
    }
}
