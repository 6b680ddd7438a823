//! Client-side observer for stan's validation progress notifications.

mod ticker;
mod tracker;

pub use ticker::{StatusTicker, StatusView, TICK_INTERVAL};
pub use tracker::{StatusTracker, spinner_frame};
