//! Newline-delimited message framing.
//!
//! Every message is one line of compact JSON terminated by `\n`:
//!
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"ping"}\n
//! {"jsonrpc":"2.0","id":1,"result":{}}\n
//! ```
//!
//! Compact JSON never contains a raw newline, so a line is always exactly
//! one message. Lines longer than [`MAX_MESSAGE_SIZE`] are rejected.

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Encodes a message as one JSON line, newline included.
///
/// ```rust
/// use secretary_protocol::{Request, RequestId, encode_message};
///
/// let bytes = encode_message(&Request::new(RequestId::Number(1), "ping", None)).unwrap();
/// assert_eq!(bytes.last(), Some(&b'\n'));
/// ```
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let mut json = serde_json::to_vec(message)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    json.push(b'\n');
    Ok(json)
}

/// Decodes one line. Surrounding whitespace (including the newline) is
/// ignored.
pub fn decode_message<T: DeserializeOwned>(line: &[u8]) -> ProtocolResult<T> {
    if line.len() > MAX_MESSAGE_SIZE + 2 {
        return Err(ProtocolError::MessageTooLarge {
            size: line.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let text = line.trim_ascii();
    if text.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    Ok(serde_json::from_slice(text)?)
}

/// Reads lines from a byte stream.
///
/// Lines are returned raw so the caller can answer a malformed message
/// with a protocol-level parse error instead of dropping the connection.
pub struct FrameReader<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads the next non-blank line, without its line terminator.
    ///
    /// Returns `Ok(None)` at end of stream. An oversized line is consumed
    /// up to its newline and reported as [`ProtocolError::MessageTooLarge`],
    /// so the next call starts at the following message.
    pub async fn read_line(&mut self) -> ProtocolResult<Option<Vec<u8>>> {
        loop {
            let mut line = Vec::new();
            let limit = (MAX_MESSAGE_SIZE + 2) as u64;
            let read = (&mut self.reader)
                .take(limit)
                .read_until(b'\n', &mut line)
                .await?;
            if read == 0 {
                return Ok(None);
            }

            if line.last() != Some(&b'\n') && line.len() as u64 == limit {
                let skipped = self.discard_line().await?;
                return Err(ProtocolError::MessageTooLarge {
                    size: line.len() + skipped,
                    max: MAX_MESSAGE_SIZE,
                });
            }

            let trimmed = line.trim_ascii_end();
            if trimmed.len() > MAX_MESSAGE_SIZE {
                return Err(ProtocolError::MessageTooLarge {
                    size: trimmed.len(),
                    max: MAX_MESSAGE_SIZE,
                });
            }
            if !trimmed.trim_ascii_start().is_empty() {
                let len = trimmed.len();
                line.truncate(len);
                return Ok(Some(line));
            }
        }
    }

    /// Reads and decodes the next message.
    pub async fn read_message<T: DeserializeOwned>(&mut self) -> ProtocolResult<Option<T>> {
        match self.read_line().await? {
            Some(line) => decode_message(&line).map(Some),
            None => Ok(None),
        }
    }

    async fn discard_line(&mut self) -> ProtocolResult<usize> {
        let mut skipped = 0;
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(skipped);
            }
            match buf.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.reader.consume(pos + 1);
                    return Ok(skipped + pos);
                }
                None => {
                    let len = buf.len();
                    self.reader.consume(len);
                    skipped += len;
                }
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writes messages as lines, flushing after each one.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_message<T: Serialize>(&mut self, message: &T) -> ProtocolResult<()> {
        let data = encode_message(message)?;
        self.writer.write_all(&data).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
