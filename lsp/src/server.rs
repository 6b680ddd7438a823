//! The language server event loop.
//!
//! Three tasks cooperate:
//! - a reader task turning stdin frames into channel messages,
//! - a writer task that owns stdout,
//! - the main loop, which owns the [`Orchestrator`] and handles client frames
//!   and analyzer completions one at a time.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use stan_analyzer::{AnalyzerOptions, Lint, PhpstanLinter};
use stan_types::{TextDocument, ValidationSettings};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::bridge::{Outbox, Outgoing};
use crate::codec::{FrameReader, FrameWriter};
use crate::orchestrator::{Completion, Orchestrator};
use crate::protocol::{
    self, DidChangeConfigurationParams, DidChangeParams, DidChangeWatchedFilesParams,
    DidOpenParams, DocumentParams, INTERNAL_ERROR, INVALID_REQUEST, Incoming, InitializeParams,
    METHOD_NOT_FOUND, Request, Response, SERVER_NOT_INITIALIZED,
};

const INVALID_PARAMS: i64 = -32602;

const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Where the analyzer comes from once the client initializes.
pub enum LinterSource {
    /// Resolve (or take the override), then probe `--version`.
    Locate {
        executable: Option<PathBuf>,
        options: AnalyzerOptions,
    },
    /// Use this implementation as-is.
    Fixed(Arc<dyn Lint>),
}

pub struct ServerOptions {
    pub linter: LinterSource,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            linter: LinterSource::Locate {
                executable: None,
                options: AnalyzerOptions::default(),
            },
        }
    }
}

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// `shutdown` was answered before `exit`.
    Clean,
    /// `exit` without `shutdown`, or the client closed the stream.
    Unclean,
}

impl Termination {
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::Unclean => 1,
        }
    }
}

enum WriterCommand {
    Send(Value),
    Shutdown,
}

enum Flow {
    Continue,
    Exit,
}

/// Serve one client over the given streams until `exit` or end of input.
pub async fn serve<R, W>(input: R, output: W, options: ServerOptions) -> Result<Termination>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (frame_tx, mut frame_rx) = mpsc::channel::<Value>(FRAME_CHANNEL_CAPACITY);
    let reader_handle = tokio::spawn(async move {
        let mut reader = FrameReader::new(input);
        loop {
            match reader.read_frame().await {
                Ok(Some(frame)) => {
                    if frame_tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!("Client closed the input stream");
                    break;
                }
                Err(e) => {
                    tracing::warn!("Failed to read client frame: {e:#}");
                    break;
                }
            }
        }
    });

    let (writer_tx, writer_rx) = mpsc::unbounded_channel::<WriterCommand>();
    let (outbox, outgoing_rx) = Outbox::channel();
    let writer_handle = tokio::spawn(run_writer(output, writer_rx, outgoing_rx));

    let (completion_tx, mut completion_rx) = mpsc::unbounded_channel::<Completion>();
    let mut server = Server {
        orchestrator: Orchestrator::new(outbox.clone(), completion_tx),
        outbox,
        writer: writer_tx.clone(),
        linter_source: options.linter,
        initialized: false,
        register_watchers: false,
        shutdown_requested: false,
        next_request_id: 1,
    };

    loop {
        tokio::select! {
            frame = frame_rx.recv() => {
                let Some(frame) = frame else { break };
                if let Flow::Exit = server.handle_frame(frame).await {
                    break;
                }
            }
            Some(completion) = completion_rx.recv() => {
                server.orchestrator.on_completion(completion);
            }
        }
    }

    let termination = if server.shutdown_requested {
        Termination::Clean
    } else {
        Termination::Unclean
    };
    drop(server);
    reader_handle.abort();

    let _ = writer_tx.send(WriterCommand::Shutdown);
    writer_handle.await.context("joining writer task")?;

    tracing::info!(?termination, "Language server stopped");
    Ok(termination)
}

async fn run_writer<W: AsyncWrite + Unpin>(
    output: W,
    mut commands: mpsc::UnboundedReceiver<WriterCommand>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
) {
    let mut writer = FrameWriter::new(output);
    loop {
        let result = tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(WriterCommand::Send(frame)) => writer.write_frame(&frame).await,
                Some(WriterCommand::Shutdown) | None => break,
            },
            Some(message) = outgoing.recv() => {
                writer.write_frame(&message.into_notification()).await
            }
        };
        if let Err(e) = result {
            tracing::warn!("Client write error: {e:#}");
            return;
        }
    }

    while let Ok(message) = outgoing.try_recv() {
        if let Err(e) = writer.write_frame(&message.into_notification()).await {
            tracing::warn!("Client write error: {e:#}");
            return;
        }
    }
}

struct Server {
    orchestrator: Orchestrator,
    outbox: Outbox,
    writer: mpsc::UnboundedSender<WriterCommand>,
    linter_source: LinterSource,
    initialized: bool,
    register_watchers: bool,
    shutdown_requested: bool,
    next_request_id: u64,
}

impl Server {
    async fn handle_frame(&mut self, frame: Value) -> Flow {
        let Some(incoming) = protocol::parse_incoming(frame) else {
            tracing::trace!("Ignoring malformed JSON-RPC frame");
            return Flow::Continue;
        };

        match incoming {
            Incoming::Request { id, method, params } => {
                self.handle_request(id, &method, params).await;
                Flow::Continue
            }
            Incoming::Notification { method, params } => self.handle_notification(&method, params),
            Incoming::Response { id } => {
                tracing::trace!(%id, "Client answered a server request");
                Flow::Continue
            }
        }
    }

    async fn handle_request(&mut self, id: Value, method: &str, params: Value) {
        if self.shutdown_requested {
            self.respond(Response::error(
                id,
                INVALID_REQUEST,
                format!("{method} received after shutdown"),
                None,
            ));
            return;
        }

        match method {
            "initialize" => self.initialize(id, params).await,
            "shutdown" => {
                tracing::info!("Shutdown requested");
                self.shutdown_requested = true;
                self.respond(Response::ok(id, Value::Null));
            }
            _ if !self.initialized => {
                self.respond(Response::error(
                    id,
                    SERVER_NOT_INITIALIZED,
                    "server not initialized",
                    None,
                ));
            }
            _ => {
                tracing::debug!("Client sent unsupported request: {method}");
                self.respond(Response::error(
                    id,
                    METHOD_NOT_FOUND,
                    format!("Method not found: {method}"),
                    None,
                ));
            }
        }
    }

    async fn initialize(&mut self, id: Value, params: Value) {
        let params: InitializeParams = if params.is_null() {
            InitializeParams::default()
        } else {
            match serde_json::from_value(params) {
                Ok(params) => params,
                Err(e) => {
                    self.respond(Response::error(
                        id,
                        INVALID_PARAMS,
                        format!("invalid initialize params: {e}"),
                        None,
                    ));
                    return;
                }
            }
        };
        let project_root = params.project_root();

        let linter: Result<Arc<dyn Lint>, String> = match &self.linter_source {
            LinterSource::Fixed(linter) => Ok(Arc::clone(linter)),
            LinterSource::Locate {
                executable,
                options,
            } => PhpstanLinter::locate(project_root.as_deref(), executable.as_deref(), *options)
                .await
                .map(|linter| Arc::new(linter) as Arc<dyn Lint>)
                .map_err(|e| e.to_string()),
        };

        match linter {
            Ok(linter) => {
                tracing::info!(
                    root = ?project_root,
                    "Initialized"
                );
                self.orchestrator.set_linter(linter, project_root);
                self.initialized = true;
                self.register_watchers = params.supports_watcher_registration();
                self.respond(Response::ok(id, protocol::initialize_result()));
            }
            Err(message) => {
                tracing::error!("Initialization failed: {message}");
                self.respond(Response::error(
                    id,
                    INTERNAL_ERROR,
                    message,
                    Some(serde_json::json!({ "retry": true })),
                ));
            }
        }
    }

    fn handle_notification(&mut self, method: &str, params: Value) -> Flow {
        match method {
            "initialized" => {
                if self.initialized && self.register_watchers {
                    self.register_config_watchers();
                }
            }
            "exit" => return Flow::Exit,
            "textDocument/didOpen" => {
                if let Some(params) = decode::<DidOpenParams>(method, params) {
                    let item = params.text_document;
                    self.orchestrator.on_document_opened(TextDocument::new(
                        item.uri,
                        item.language_id,
                        item.version,
                        item.text,
                    ));
                }
            }
            "textDocument/didChange" => {
                if let Some(params) = decode::<DidChangeParams>(method, params)
                    && let Some(change) = params.content_changes.into_iter().last()
                {
                    self.orchestrator.on_document_changed(
                        &params.text_document.uri,
                        params.text_document.version,
                        change.text,
                    );
                }
            }
            "textDocument/didSave" => {
                if let Some(params) = decode::<DocumentParams>(method, params) {
                    self.orchestrator.on_document_saved(&params.text_document.uri);
                }
            }
            "textDocument/didClose" => {
                if let Some(params) = decode::<DocumentParams>(method, params) {
                    self.orchestrator
                        .on_document_closed(&params.text_document.uri);
                }
            }
            "workspace/didChangeConfiguration" => {
                if let Some(params) = decode::<DidChangeConfigurationParams>(method, params) {
                    self.apply_settings(&params.settings);
                }
            }
            "workspace/didChangeWatchedFiles" => {
                if let Some(params) = decode::<DidChangeWatchedFilesParams>(method, params)
                    && params.touches_analyzer_config()
                {
                    tracing::info!("PHPStan configuration changed, revalidating open documents");
                    self.orchestrator.validate_all_open();
                }
            }
            _ => tracing::trace!("Ignoring notification: {method}"),
        }
        Flow::Continue
    }

    fn apply_settings(&mut self, settings: &Value) {
        match ValidationSettings::from_client_settings(settings) {
            Ok(settings) => {
                tracing::debug!(?settings, "Settings updated");
                self.orchestrator.on_settings_changed(settings);
            }
            Err(e) => {
                tracing::warn!("Rejected phpstan settings: {e}");
                self.outbox.send(Outgoing::ShowError(format!(
                    "phpstan: invalid settings, keeping previous values: {e}"
                )));
            }
        }
    }

    fn register_config_watchers(&mut self) {
        let id = self.next_request_id;
        self.next_request_id += 1;
        let request = Request::new(
            id,
            "client/registerCapability",
            Some(protocol::register_watchers_params()),
        );
        self.send(&request);
    }

    fn respond(&self, response: Response) {
        self.send(&response);
    }

    fn send<T: serde::Serialize>(&self, message: &T) {
        match serde_json::to_value(message) {
            Ok(frame) => {
                let _ = self.writer.send(WriterCommand::Send(frame));
            }
            Err(e) => tracing::warn!("Failed to serialize message: {e}"),
        }
    }
}

fn decode<T: DeserializeOwned>(method: &str, params: Value) -> Option<T> {
    match serde_json::from_value(params) {
        Ok(params) => Some(params),
        Err(e) => {
            tracing::warn!("Malformed {method} params: {e}");
            None
        }
    }
}
