//! `Content-Length` framing for JSON-RPC over a byte stream.
//!
//! The same framing is used on the build server pipe and on the IDE's
//! stdin/stdout.

use anyhow::{Context, Result, bail};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on a single frame body (16 MiB). Build logs can be chatty.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const CONTENT_LENGTH: &str = "Content-Length";

/// Reads framed JSON values.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Next frame, or `Ok(None)` when the stream ends cleanly between frames.
    pub async fn read_frame(&mut self) -> Result<Option<Value>> {
        let Some(len) = self.read_content_length().await? else {
            return Ok(None);
        };
        if len > MAX_FRAME_BYTES {
            bail!("{CONTENT_LENGTH} {len} exceeds maximum {MAX_FRAME_BYTES}");
        }

        let mut body = vec![0u8; len];
        self.reader
            .read_exact(&mut body)
            .await
            .context("reading frame body")?;
        let value = serde_json::from_slice(&body).context("parsing JSON-RPC frame")?;
        Ok(Some(value))
    }

    async fn read_content_length(&mut self) -> Result<Option<usize>> {
        let mut content_length = None;
        let mut line = String::new();
        let mut started = false;

        loop {
            line.clear();
            let n = self
                .reader
                .read_line(&mut line)
                .await
                .context("reading header line")?;
            if n == 0 {
                if started {
                    bail!("unexpected end of stream inside frame headers");
                }
                return Ok(None);
            }
            started = true;

            let header = line.trim();
            if header.is_empty() {
                break;
            }
            let Some((key, value)) = header.split_once(':') else {
                continue;
            };
            if key.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                let len = value
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid {CONTENT_LENGTH} value {value:?}"))?;
                content_length = Some(len);
            }
        }

        content_length
            .map(Some)
            .with_context(|| format!("frame without {CONTENT_LENGTH} header"))
    }
}

/// Writes framed JSON values.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Header and body go out as one buffer so a frame is never interleaved.
    pub async fn write_frame(&mut self, frame: &Value) -> Result<()> {
        let bytes = encode_frame(frame)?;
        self.writer
            .write_all(&bytes)
            .await
            .context("writing frame")?;
        self.writer.flush().await.context("flushing frame")
    }

    /// Close the underlying stream.
    pub async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await.context("closing frame writer")
    }
}

pub fn encode_frame(frame: &Value) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(frame).context("serializing JSON-RPC frame")?;
    let mut out = format!("{CONTENT_LENGTH}: {}\r\n\r\n", body.len()).into_bytes();
    out.extend_from_slice(&body);
    Ok(out)
}
