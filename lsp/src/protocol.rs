//! JSON-RPC message shapes exchanged with the editor.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stan_types::{Diagnostic, TextDocumentIdentifier};

pub(crate) const METHOD_NOT_FOUND: i64 = -32601;
pub(crate) const INVALID_REQUEST: i64 = -32600;
pub(crate) const INTERNAL_ERROR: i64 = -32603;
pub(crate) const SERVER_NOT_INITIALIZED: i64 = -32002;

/// `window/showMessage` type for errors.
const MESSAGE_TYPE_ERROR: u8 = 1;

/// `TextDocumentSyncKind.Full`.
const SYNC_FULL: u8 = 1;

pub(crate) const WATCHED_CONFIG_GLOBS: [&str; 2] = ["**/phpstan.neon", "**/phpstan.neon.dist"];

const WATCHER_REGISTRATION_ID: &str = "stan-phpstan-config-watcher";

#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Exactly one of `result` / `error` is serialized.
#[derive(Debug, Serialize)]
pub(crate) struct Response {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl Response {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(ResponseError {
                code,
                message: message.into(),
                data,
            }),
        }
    }
}

/// A frame received from the client.
#[derive(Debug)]
pub(crate) enum Incoming {
    Request {
        id: Value,
        method: String,
        params: Value,
    },
    Notification {
        method: String,
        params: Value,
    },
    /// Answer to one of our own requests (e.g. `client/registerCapability`).
    Response { id: Value },
}

pub(crate) fn parse_incoming(frame: Value) -> Option<Incoming> {
    let Value::Object(mut map) = frame else {
        return None;
    };
    let id = map.remove("id");
    let method = match map.remove("method") {
        Some(Value::String(method)) => Some(method),
        _ => None,
    };
    let params = map.remove("params").unwrap_or(Value::Null);
    let is_response = map.contains_key("result") || map.contains_key("error");

    match (id, method) {
        (Some(id), Some(method)) => Some(Incoming::Request { id, method, params }),
        (None, Some(method)) => Some(Incoming::Notification { method, params }),
        (Some(id), None) if is_response => Some(Incoming::Response { id }),
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct InitializeParams {
    pub root_uri: Option<String>,
    pub root_path: Option<String>,
    pub capabilities: Value,
}

impl InitializeParams {
    /// `rootUri` wins over the deprecated `rootPath`.
    pub fn project_root(&self) -> Option<PathBuf> {
        self.root_uri
            .as_deref()
            .and_then(file_uri_to_path)
            .or_else(|| self.root_path.as_deref().map(PathBuf::from))
    }

    pub fn supports_watcher_registration(&self) -> bool {
        self.capabilities
            .pointer("/workspace/didChangeWatchedFiles/dynamicRegistration")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TextDocumentItem {
    pub uri: String,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidOpenParams {
    pub text_document: TextDocumentItem,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VersionedTextDocumentIdentifier {
    pub uri: String,
    pub version: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentChange {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DidChangeParams {
    pub text_document: VersionedTextDocumentIdentifier,
    pub content_changes: Vec<ContentChange>,
}

/// Shared by `didSave` and `didClose`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DocumentParams {
    pub text_document: TextDocumentIdentifier,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DidChangeConfigurationParams {
    #[serde(default)]
    pub settings: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileEvent {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DidChangeWatchedFilesParams {
    pub changes: Vec<FileEvent>,
}

impl DidChangeWatchedFilesParams {
    pub fn touches_analyzer_config(&self) -> bool {
        self.changes.iter().any(|change| {
            let name = change.uri.rsplit('/').next().unwrap_or_default();
            name == "phpstan.neon" || name == "phpstan.neon.dist"
        })
    }
}

pub(crate) fn initialize_result() -> Value {
    serde_json::json!({
        "capabilities": {
            "textDocumentSync": {
                "openClose": true,
                "change": SYNC_FULL,
                "save": { "includeText": false }
            }
        },
        "serverInfo": {
            "name": "stan-ls",
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

pub(crate) fn register_watchers_params() -> Value {
    let watchers: Vec<Value> = WATCHED_CONFIG_GLOBS
        .iter()
        .map(|glob| serde_json::json!({ "globPattern": glob }))
        .collect();
    serde_json::json!({
        "registrations": [{
            "id": WATCHER_REGISTRATION_ID,
            "method": "workspace/didChangeWatchedFiles",
            "registerOptions": { "watchers": watchers }
        }]
    })
}

pub(crate) fn publish_diagnostics_params(uri: &str, diagnostics: &[Diagnostic]) -> Value {
    serde_json::json!({
        "uri": uri,
        "diagnostics": diagnostics
    })
}

pub(crate) fn show_error_params(message: &str) -> Value {
    serde_json::json!({
        "type": MESSAGE_TYPE_ERROR,
        "message": message
    })
}

pub(crate) fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri)
        .ok()
        .filter(|u| u.scheme() == "file")
        .and_then(|u| u.to_file_path().ok())
}
