//! Timer-driven rendering of the tracker's status line.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::tracker::StatusTracker;

pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Whatever displays the status line (a status bar item, a terminal title...).
pub trait StatusView {
    fn show(&mut self, text: &str);
    fn hide(&mut self);
}

pub struct StatusTicker<V> {
    tracker: StatusTracker,
    view: V,
    tick: usize,
    visible: bool,
}

impl<V: StatusView> StatusTicker<V> {
    pub fn new(view: V) -> Self {
        Self {
            tracker: StatusTracker::new(),
            view,
            tick: 0,
            visible: false,
        }
    }

    pub fn tracker(&self) -> &StatusTracker {
        &self.tracker
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Apply one JSON-RPC notification frame (`{"method": .., "params": ..}`).
    /// The indicator appears on the first start and disappears when nothing
    /// is left; in between the text is refreshed by [`StatusTicker::tick`].
    pub fn handle_frame(&mut self, frame: Value) -> Result<bool, serde_json::Error> {
        let Value::Object(mut map) = frame else {
            return Ok(false);
        };
        let Some(Value::String(method)) = map.remove("method") else {
            return Ok(false);
        };
        let params = map.remove("params").unwrap_or(Value::Null);
        let handled = self.tracker.handle_notification(&method, params)?;
        if handled {
            self.toggle();
        }
        Ok(handled)
    }

    /// Advance the spinner one frame.
    pub fn tick(&mut self) {
        if self.tracker.is_active() {
            self.tick = self.tick.wrapping_add(1);
        }
        self.refresh();
    }

    /// Show or hide the indicator; the text itself only changes on ticks.
    fn toggle(&mut self) {
        if self.tracker.is_active() == self.visible {
            return;
        }
        self.refresh();
    }

    fn refresh(&mut self) {
        match self.tracker.status_text(self.tick) {
            Some(text) => {
                self.view.show(&text);
                self.visible = true;
            }
            None if self.visible => {
                self.view.hide();
                self.visible = false;
            }
            None => {}
        }
    }

    /// Consume frames until the channel closes, ticking every
    /// [`TICK_INTERVAL`] while anything is being linted.
    pub async fn run(mut self, mut frames: mpsc::Receiver<Value>) -> V {
        let mut ticks = time::interval(TICK_INTERVAL);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                frame = frames.recv() => {
                    let Some(frame) = frame else { break };
                    if let Err(e) = self.handle_frame(frame) {
                        tracing::warn!("Ignoring malformed progress notification: {e}");
                    }
                }
                _ = ticks.tick(), if self.tracker.is_active() => self.tick(),
            }
        }

        if self.visible {
            self.view.hide();
        }
        self.view
    }
}
