//! Subprocess launch and bounded output capture.
//!
//! One function boundary, [`run`], owns the child for the whole invocation:
//! spawn, feed stdin, capture stdout and stderr, wait (optionally bounded by a
//! timeout). The child is spawned with `kill_on_drop`, so dropping the
//! invocation future never leaves a process behind.

use std::borrow::Cow;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::time;

use crate::error::LintError;

/// How arguments must be escaped before they reach the process launcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// Launch through `cmd /C`; arguments with whitespace or cmd
    /// metacharacters are wrapped in double quotes.
    Cmd,
    /// Hand arguments to the OS untouched.
    Verbatim,
}

impl QuoteStyle {
    /// Style required by the platform this binary runs on.
    #[must_use]
    pub fn host() -> Self {
        if cfg!(windows) {
            Self::Cmd
        } else {
            Self::Verbatim
        }
    }
}

/// Characters `cmd` interprets outside double quotes.
const CMD_METACHARACTERS: &[char] = &['&', '|', '<', '>', '^', '(', ')', '%', '!'];

#[must_use]
pub fn quote_arg(arg: &str, style: QuoteStyle) -> Cow<'_, str> {
    match style {
        QuoteStyle::Verbatim => Cow::Borrowed(arg),
        QuoteStyle::Cmd => {
            let already_quoted = arg.len() >= 2 && arg.starts_with('"') && arg.ends_with('"');
            let needs_quotes = arg
                .chars()
                .any(|c| c.is_whitespace() || CMD_METACHARACTERS.contains(&c));
            if needs_quotes && !already_quoted {
                Cow::Owned(format!("\"{arg}\""))
            } else {
                Cow::Borrowed(arg)
            }
        }
    }
}

/// Program and argument vector handed to the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchLine {
    pub program: String,
    pub args: Vec<String>,
}

#[must_use]
pub fn launch_line(executable: &Path, args: &[String], style: QuoteStyle) -> LaunchLine {
    let executable = executable.to_string_lossy();
    match style {
        QuoteStyle::Verbatim => LaunchLine {
            program: executable.into_owned(),
            args: args.to_vec(),
        },
        QuoteStyle::Cmd => {
            let mut line = Vec::with_capacity(args.len() + 2);
            line.push("/C".to_string());
            line.push(quote_arg(&executable, style).into_owned());
            line.extend(args.iter().map(|arg| quote_arg(arg, style).into_owned()));
            LaunchLine {
                program: "cmd".to_string(),
                args: line,
            }
        }
    }
}

pub(crate) fn build_command(executable: &Path, args: &[String], style: QuoteStyle) -> Command {
    let line = launch_line(executable, args, style);
    let mut cmd = Command::new(&line.program);
    match style {
        QuoteStyle::Verbatim => {
            cmd.args(&line.args);
        }
        QuoteStyle::Cmd => push_raw_args(&mut cmd, &line.args),
    }
    cmd
}

#[cfg(windows)]
fn push_raw_args(cmd: &mut Command, args: &[String]) {
    use std::os::windows::process::CommandExt;
    for arg in args {
        cmd.as_std_mut().raw_arg(arg);
    }
}

#[cfg(not(windows))]
fn push_raw_args(cmd: &mut Command, args: &[String]) {
    cmd.args(args);
}

/// Everything a finished analyzer process produced.
#[derive(Debug)]
pub(crate) struct Captured {
    /// stdout followed by stderr.
    pub output: Vec<u8>,
    pub status: ExitStatus,
}

pub(crate) async fn run(
    mut cmd: Command,
    executable: &Path,
    input: Vec<u8>,
    working_dir: Option<&Path>,
    max_output_bytes: usize,
    timeout: Option<Duration>,
) -> Result<Captured, LintError> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = working_dir.filter(|dir| dir.is_dir()) {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| LintError::Spawn {
        executable: executable.to_path_buf(),
        source,
    })?;

    let missing_pipe = || LintError::Io(std::io::Error::other("analyzer pipe was not captured"));
    let stdin = child.stdin.take().ok_or_else(missing_pipe)?;
    let stdout = child.stdout.take().ok_or_else(missing_pipe)?;
    let stderr = child.stderr.take().ok_or_else(missing_pipe)?;

    let stdin_task = tokio::spawn(feed_stdin(stdin, input));
    let stdout_task = tokio::spawn(read_to_end_limited(stdout, max_output_bytes));
    let stderr_task = tokio::spawn(read_to_end_limited(stderr, max_output_bytes));

    let status = match timeout {
        None => child.wait().await.map_err(LintError::Io)?,
        Some(limit) => {
            if let Ok(res) = time::timeout(limit, child.wait()).await {
                res.map_err(LintError::Io)?
            } else {
                tracing::warn!(
                    executable = %executable.display(),
                    timeout_ms = limit.as_millis(),
                    "Analyzer timed out, killing"
                );
                let _ = child.kill().await;
                return Err(LintError::TimedOut { timeout: limit });
            }
        }
    };

    if let Ok(Err(e)) = stdin_task.await {
        tracing::debug!("Analyzer stdin closed early: {e}");
    }
    let (mut output, truncated_stdout) = stdout_task.await.unwrap_or_else(|_| (Vec::new(), false));
    let (stderr_bytes, truncated_stderr) =
        stderr_task.await.unwrap_or_else(|_| (Vec::new(), false));

    if truncated_stdout || truncated_stderr || output.len() + stderr_bytes.len() > max_output_bytes
    {
        return Err(LintError::OutputTooLarge {
            limit: max_output_bytes,
        });
    }
    output.extend_from_slice(&stderr_bytes);

    Ok(Captured { output, status })
}

/// Write the whole document, then close stdin to signal end of input.
async fn feed_stdin(mut stdin: ChildStdin, input: Vec<u8>) -> std::io::Result<()> {
    stdin.write_all(&input).await?;
    stdin.shutdown().await?;
    Ok(())
}

/// Read a stream to EOF keeping at most `max_bytes`.
///
/// Bytes past the limit are drained and discarded so the child never blocks
/// on a full pipe; the flag reports that the limit was exceeded.
async fn read_to_end_limited<R: AsyncRead + Unpin + Send + 'static>(
    mut reader: R,
    max_bytes: usize,
) -> (Vec<u8>, bool) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 8192];
    let mut truncated = false;

    loop {
        let n = match reader.read(&mut tmp).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let remaining = max_bytes.saturating_sub(buf.len());
        let take = remaining.min(n);
        buf.extend_from_slice(&tmp[..take]);
        if take < n {
            truncated = true;
        }
    }

    (buf, truncated)
}
