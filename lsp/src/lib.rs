//! Language server bridging editor events to PHPStan runs.

pub mod codec;

mod bridge;
mod documents;
mod orchestrator;
pub(crate) mod protocol;
mod server;

pub use bridge::{Outbox, Outgoing};
pub use documents::DocumentStore;
pub use orchestrator::{
    Admission, Completion, Orchestrator, RunId, ValidationState, failure_message,
};
pub use server::{LinterSource, ServerOptions, Termination, serve};
