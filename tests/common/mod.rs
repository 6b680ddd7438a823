//! Shared test utilities and fixtures
//!
//! An in-memory LSP client plus fake phpstan executables.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use stan_analyzer::{AnalyzerOptions, Lint};
use stan_lsp::codec::{FrameReader, FrameWriter};
use stan_lsp::{LinterSource, ServerOptions, Termination, serve};
use tokio::io::{DuplexStream, duplex};
use tokio::task::JoinHandle;

const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Client half of an in-process server session.
pub struct LspClient {
    reader: FrameReader<DuplexStream>,
    writer: FrameWriter<DuplexStream>,
    next_id: u64,
    pub server: JoinHandle<anyhow::Result<Termination>>,
}

impl LspClient {
    pub fn start(options: ServerOptions) -> Self {
        let (client_out, server_in) = duplex(1024 * 1024);
        let (server_out, client_in) = duplex(1024 * 1024);
        let server = tokio::spawn(serve(server_in, server_out, options));
        Self {
            reader: FrameReader::new(client_in),
            writer: FrameWriter::new(client_out),
            next_id: 1,
            server,
        }
    }

    pub fn with_executable(executable: &Path) -> Self {
        Self::start(ServerOptions {
            linter: LinterSource::Locate {
                executable: Some(executable.to_path_buf()),
                options: AnalyzerOptions::default(),
            },
        })
    }

    pub fn with_linter(linter: Arc<dyn Lint>) -> Self {
        Self::start(ServerOptions {
            linter: LinterSource::Fixed(linter),
        })
    }

    pub async fn notify(&mut self, method: &str, params: Value) {
        self.writer
            .write_frame(&json!({ "jsonrpc": "2.0", "method": method, "params": params }))
            .await
            .unwrap();
    }

    /// Send a request; returns its id.
    pub async fn send_request(&mut self, method: &str, params: Value) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.writer
            .write_frame(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))
            .await
            .unwrap();
        id
    }

    /// Answer a server-to-client request.
    pub async fn respond(&mut self, id: Value, result: Value) {
        self.writer
            .write_frame(&json!({ "jsonrpc": "2.0", "id": id, "result": result }))
            .await
            .unwrap();
    }

    pub async fn recv(&mut self) -> Value {
        tokio::time::timeout(RECV_TIMEOUT, self.reader.read_frame())
            .await
            .expect("timed out waiting for a server frame")
            .unwrap()
            .expect("server closed the stream")
    }

    /// Send a request and wait for its response. Frames received in between
    /// are returned alongside it.
    pub async fn request(&mut self, method: &str, params: Value) -> (Value, Vec<Value>) {
        let id = self.send_request(method, params).await;
        let mut other = Vec::new();
        loop {
            let frame = self.recv().await;
            if frame.get("method").is_none() && frame["id"] == id {
                return (frame, other);
            }
            other.push(frame);
        }
    }

    pub async fn initialize(&mut self, root: &Path, capabilities: Value) -> Value {
        let (response, _) = self
            .request(
                "initialize",
                json!({
                    "processId": null,
                    "rootUri": file_uri(root),
                    "capabilities": capabilities
                }),
            )
            .await;
        response
    }

    pub async fn open(&mut self, uri: &str, text: &str) {
        self.notify(
            "textDocument/didOpen",
            json!({
                "textDocument": { "uri": uri, "languageId": "php", "version": 1, "text": text }
            }),
        )
        .await;
    }

    /// Collect frames until one with `method` arrives (inclusive).
    pub async fn recv_until(&mut self, method: &str) -> Vec<Value> {
        let mut frames = Vec::new();
        loop {
            let frame = self.recv().await;
            let done = frame["method"] == method;
            frames.push(frame);
            if done {
                return frames;
            }
        }
    }

    /// Close both streams without `shutdown`; returns the server task.
    pub fn hang_up(self) -> JoinHandle<anyhow::Result<Termination>> {
        let Self { server, .. } = self;
        server
    }

    /// Orderly `shutdown` + `exit`; returns frames that arrived before the
    /// shutdown response.
    pub async fn shutdown(mut self) -> Vec<Value> {
        let (response, pending) = self.request("shutdown", Value::Null).await;
        assert!(response["result"].is_null());
        self.notify("exit", Value::Null).await;
        let termination = self.server.await.unwrap().unwrap();
        assert_eq!(termination, Termination::Clean);
        pending
    }
}

pub fn methods(frames: &[Value]) -> Vec<&str> {
    frames
        .iter()
        .filter_map(|frame| frame["method"].as_str())
        .collect()
}

pub fn file_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Write an executable shell script standing in for phpstan. `--version`
/// is answered before `body` runs.
#[cfg(unix)]
pub fn fake_phpstan(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("phpstan");
    let script = format!(
        "#!/bin/sh\n\
         if [ \"$1\" = \"--version\" ]; then\n\
         \x20 echo 'PHPStan - PHP Static Analysis Tool 1.10.0'\n\
         \x20 exit 0\n\
         fi\n\
         {body}\n"
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Native `--error-format=json` report with one finding.
pub fn native_report(file: &str, line: u32, message: &str) -> String {
    json!({
        "totals": { "errors": 0, "file_errors": 1 },
        "files": {
            file: { "errors": 1, "messages": [
                { "message": message, "line": line, "ignorable": true }
            ]}
        },
        "errors": []
    })
    .to_string()
}
