//! The status observer fed from a live server session.

use std::sync::Arc;

use serde_json::{Value, json};
use stan_analyzer::{Lint, LintFut, LintRequest};
use stan_status::{StatusTicker, StatusTracker, StatusView};
use tokio::sync::Semaphore;

use crate::common::LspClient;

struct HeldLint {
    gate: Semaphore,
}

impl Lint for HeldLint {
    fn lint<'a>(&'a self, _request: &'a LintRequest) -> LintFut<'a> {
        Box::pin(async move {
            let _permit = self.gate.acquire().await;
            Ok(Vec::new())
        })
    }
}

#[derive(Default)]
struct Line {
    text: Option<String>,
}

impl StatusView for Line {
    fn show(&mut self, text: &str) {
        self.text = Some(text.to_string());
    }

    fn hide(&mut self) {
        self.text = None;
    }
}

async fn forward_until(
    client: &mut LspClient,
    ticker: &mut StatusTicker<Line>,
    method: &str,
) -> Vec<Value> {
    let frames = client.recv_until(method).await;
    for frame in &frames {
        ticker.handle_frame(frame.clone()).unwrap();
    }
    frames
}

#[tokio::test]
async fn counter_follows_server_progress() {
    let linter = Arc::new(HeldLint {
        gate: Semaphore::new(0),
    });
    let mut client = LspClient::with_linter(Arc::clone(&linter) as Arc<dyn Lint>);
    client
        .initialize(std::path::Path::new("/project"), json!({}))
        .await;

    let mut ticker = StatusTicker::new(Line::default());
    client.open("file:///project/a.php", "<?php").await;
    client.open("file:///project/b.php", "<?php").await;
    forward_until(&mut client, &mut ticker, "didStartValidateTextDocument").await;
    forward_until(&mut client, &mut ticker, "didStartValidateTextDocument").await;

    assert_eq!(ticker.tracker().active(), 2);
    assert!(ticker.tracker().is_processing("file:///project/b.php"));
    assert_eq!(
        ticker.view().text.as_deref(),
        Some("phpstan is linting 2 documents ... |")
    );

    linter.gate.add_permits(2);
    forward_until(&mut client, &mut ticker, "didEndValidateTextDocument").await;
    forward_until(&mut client, &mut ticker, "didEndValidateTextDocument").await;

    assert_eq!(ticker.tracker().active(), 0);
    assert!(!ticker.tracker().is_active());
    assert_eq!(ticker.view().text, None);

    client.shutdown().await;
}

#[test]
fn unmatched_end_does_not_go_negative() {
    let mut tracker = StatusTracker::new();
    let end = json!({ "textDocument": { "uri": "file:///project/a.php" } });
    assert!(
        tracker
            .handle_notification("didEndValidateTextDocument", end)
            .unwrap()
    );
    assert_eq!(tracker.active(), 0);
    assert_eq!(tracker.status_text(0), None);
}

#[test]
fn other_notifications_are_not_progress() {
    let mut tracker = StatusTracker::new();
    let handled = tracker
        .handle_notification(
            "textDocument/publishDiagnostics",
            json!({ "uri": "file:///project/a.php", "diagnostics": [] }),
        )
        .unwrap();
    assert!(!handled);
}
