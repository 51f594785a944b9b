//! Protocol codec
//!
//! Framing helpers for the line protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────────────────────────┬──────┐
//! │ line text (no CR / LF)       │ CRLF │   repeated, in order
//! └──────────────────────────────┴──────┘
//! ```
//! The sequence ends at a blank line or when the client half-closes.
//!
//! ### Response Format
//! ```text
//! ┌─────────────────────────────────────┐
//! │ raw bytes until the server closes   │
//! └─────────────────────────────────────┘
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{RelayError, Result};
use super::{Command, CommandLine, Response};

/// Line terminator
pub const TERMINATOR: &[u8] = b"\r\n";

/// Default longest accepted line (8 KB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 8 * 1024;

/// Initial read buffer capacity
const READ_CHUNK: usize = 4 * 1024;

// =============================================================================
// Line Codec
// =============================================================================

/// Splits a byte stream into command lines and encodes lines for the wire
///
/// Decoding accepts CRLF or bare LF, strips trailing whitespace (some clients
/// pad before the terminator) and rejects lines over `max_line_bytes`.
#[derive(Debug, Clone)]
pub struct LineCodec {
    max_line_bytes: usize,

    /// Where to resume scanning for LF in the buffer
    next_index: usize,
}

impl LineCodec {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes,
            next_index: 0,
        }
    }

    pub fn max_line_bytes(&self) -> usize {
        self.max_line_bytes
    }

    fn parse_line(&self, raw: &[u8]) -> Result<CommandLine> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

        if raw.len() > self.max_line_bytes {
            return Err(RelayError::Protocol(format!(
                "Line too long: {} bytes (max {})",
                raw.len(),
                self.max_line_bytes
            )));
        }

        let text = std::str::from_utf8(raw)
            .map_err(|e| RelayError::Protocol(format!("Line is not valid UTF-8: {}", e)))?;

        CommandLine::new(text.trim_end()).map_err(|e| RelayError::Protocol(e.to_string()))
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_BYTES)
    }
}

impl Decoder for LineCodec {
    type Item = CommandLine;
    type Error = RelayError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<CommandLine>> {
        let start = self.next_index.min(buf.len());

        match buf[start..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                self.next_index = 0;
                let line = buf.split_to(start + offset + 1);
                self.parse_line(&line[..line.len() - 1]).map(Some)
            }
            None => {
                // CR of a pending CRLF may already be buffered
                if buf.len() > self.max_line_bytes + 1 {
                    return Err(RelayError::Protocol(format!(
                        "Line too long: more than {} bytes without terminator",
                        self.max_line_bytes
                    )));
                }
                self.next_index = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<CommandLine>> {
        if let Some(line) = self.decode(buf)? {
            return Ok(Some(line));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        // Unterminated tail before EOF counts as a final line
        self.next_index = 0;
        let tail = buf.split();
        self.parse_line(&tail).map(Some)
    }
}

impl Encoder<&CommandLine> for LineCodec {
    type Error = RelayError;

    fn encode(&mut self, line: &CommandLine, dst: &mut BytesMut) -> Result<()> {
        let text = line.as_str().as_bytes();
        dst.reserve(text.len() + TERMINATOR.len());
        dst.put_slice(text);
        dst.put_slice(TERMINATOR);
        Ok(())
    }
}

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: each line followed by CRLF, in order
pub fn encode_command(command: &Command) -> Bytes {
    let size = command
        .lines()
        .iter()
        .map(|line| line.as_str().len() + TERMINATOR.len())
        .sum();

    let mut buf = BytesMut::with_capacity(size);
    for line in command {
        buf.put_slice(line.as_str().as_bytes());
        buf.put_slice(TERMINATOR);
    }

    buf.freeze()
}

/// Decode a command from a complete buffer
///
/// Stops at the first blank line or the end of the buffer.
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let mut codec = LineCodec::default();
    let mut buf = BytesMut::from(bytes);
    let mut lines = Vec::new();

    while let Some(line) = codec.decode_eof(&mut buf)? {
        if line.is_blank() {
            break;
        }
        lines.push(line);
    }

    Command::from_command_lines(lines)
        .map_err(|_| RelayError::Protocol("Empty command sequence".to_string()))
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read one command sequence from a stream
///
/// Returns `None` if the peer ended the sequence before sending any line.
pub async fn read_command<R>(reader: &mut R, codec: &mut LineCodec) -> Result<Option<Command>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let mut lines = Vec::new();

    loop {
        while let Some(line) = codec.decode(&mut buf)? {
            if line.is_blank() {
                return finish_command(lines);
            }
            tracing::trace!("Received line: {}", line);
            lines.push(line);
        }

        if reader.read_buf(&mut buf).await? == 0 {
            while let Some(line) = codec.decode_eof(&mut buf)? {
                if line.is_blank() {
                    break;
                }
                tracing::trace!("Received final line: {}", line);
                lines.push(line);
            }
            return finish_command(lines);
        }
    }
}

fn finish_command(lines: Vec<CommandLine>) -> Result<Option<Command>> {
    if lines.is_empty() {
        return Ok(None);
    }
    Command::from_command_lines(lines).map(Some)
}

/// Write a command to a stream and flush it
pub async fn write_command<W>(writer: &mut W, command: &Command) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = encode_command(command);
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a response until the peer closes, keeping at most `limit` bytes
///
/// One byte past the limit is enough to know the response is oversized, so
/// memory stays bounded by `limit + 1`.
pub async fn read_response<R>(reader: &mut R, limit: usize) -> Result<Response>
where
    R: AsyncRead + Unpin,
{
    let mut payload = Vec::with_capacity(READ_CHUNK.min(limit));
    let cap = (limit as u64).saturating_add(1);
    reader.take(cap).read_to_end(&mut payload).await?;

    if payload.len() > limit {
        return Err(RelayError::ResponseTooLarge { limit });
    }

    Ok(Response::new(payload))
}

/// Write a response to a stream and flush it
pub async fn write_response<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
