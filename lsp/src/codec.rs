//! `Content-Length` framing for the JSON-RPC channel.
//!
//! The client writes `Content-Length: N\r\n\r\n{json}` frames to our stdin and
//! reads the same framing from our stdout. [`FrameReader`] and [`FrameWriter`]
//! are the only code that touches either stream.

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Frames above 4 MiB are rejected before the body is allocated.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

const CONTENT_LENGTH: &str = "Content-Length";

/// One `Name: value` header line. Unknown headers are kept only so they can
/// be skipped.
#[derive(Debug, PartialEq, Eq)]
enum Header<'a> {
    ContentLength(usize),
    Other(&'a str),
    End,
}

fn parse_header(line: &str) -> Result<Header<'_>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Header::End);
    }
    let Some((name, value)) = trimmed.split_once(':') else {
        return Ok(Header::Other(trimmed));
    };
    if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
        let len = value
            .trim()
            .parse()
            .with_context(|| format!("invalid Content-Length value {:?}", value.trim()))?;
        return Ok(Header::ContentLength(len));
    }
    Ok(Header::Other(name))
}

pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Read the next frame body as JSON.
    ///
    /// `Ok(None)` means the peer closed the stream between frames. EOF
    /// anywhere inside a frame is an error.
    pub async fn read_frame(&mut self) -> Result<Option<serde_json::Value>> {
        let Some(content_length) = self.read_headers().await? else {
            return Ok(None);
        };

        if content_length > MAX_FRAME_BYTES {
            bail!("Content-Length {content_length} exceeds maximum {MAX_FRAME_BYTES}");
        }

        let mut body = vec![0u8; content_length];
        self.reader
            .read_exact(&mut body)
            .await
            .context("reading frame body")?;

        let value = serde_json::from_slice(&body).context("parsing JSON-RPC frame")?;
        Ok(Some(value))
    }

    async fn read_headers(&mut self) -> Result<Option<usize>> {
        let mut content_length = None;
        let mut line = String::new();
        let mut in_frame = false;

        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .await
                .context("reading header line")?;

            if read == 0 {
                if in_frame {
                    bail!("unexpected EOF while reading headers");
                }
                return Ok(None);
            }
            in_frame = true;

            match parse_header(&line)? {
                Header::End => break,
                Header::ContentLength(len) => content_length = Some(len),
                Header::Other(name) => tracing::trace!(header = name, "Skipping frame header"),
            }
        }

        content_length
            .map(Some)
            .context("missing Content-Length header")
    }
}

pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize `msg` and write it as one flushed frame.
    pub async fn write_frame<T: Serialize + ?Sized>(&mut self, msg: &T) -> Result<()> {
        let body = serde_json::to_vec(msg).context("serializing JSON-RPC frame")?;
        let header = format!("{CONTENT_LENGTH}: {}\r\n\r\n", body.len());

        self.writer
            .write_all(header.as_bytes())
            .await
            .context("writing frame header")?;
        self.writer
            .write_all(&body)
            .await
            .context("writing frame body")?;
        self.writer.flush().await.context("flushing frame")?;

        Ok(())
    }
}
