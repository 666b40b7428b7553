//! Framed streams over tokio's `AsyncRead`/`AsyncWrite`.
//!
//! Same wire layout as [`crate::stream`]. [`AsyncStreamReader::next_value`] is
//! cancel-safe: if the future is dropped before it resolves, every byte read so
//! far stays in the reader and the next call picks up where it left off.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

use crate::codec;
use crate::stream::{decode_frame, encode_frame, parse_frame_head, truncated_stream, StreamState, FRAME_HEAD_LEN};
use crate::tags::HEADER;
use crate::{DecodeOptions, EncodeOptions, Error, Result, Value};

const READ_CHUNK: usize = 8 * 1024;

/// Writes values as frames to an async sink.
///
/// # Examples
///
/// ```rust
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// use btoon::async_stream::{AsyncStreamReader, AsyncStreamWriter};
/// use btoon::Value;
///
/// let mut writer = AsyncStreamWriter::new(Vec::new());
/// writer.write_value(&Value::from(42)).await.unwrap();
/// let bytes = writer.close().await.unwrap();
///
/// let mut reader = AsyncStreamReader::new(bytes.as_slice());
/// assert_eq!(reader.next_value().await.unwrap(), Some(Value::from(42)));
/// assert_eq!(reader.next_value().await.unwrap(), None);
/// # });
/// ```
pub struct AsyncStreamWriter<W: AsyncWrite + Unpin> {
    sink: Option<W>,
    options: EncodeOptions,
    state: StreamState,
    frames: u64,
    scratch: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> AsyncStreamWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, EncodeOptions::default())
    }

    pub fn with_options(sink: W, options: EncodeOptions) -> Self {
        AsyncStreamWriter {
            sink: Some(sink),
            options,
            state: StreamState::Idle,
            frames: 0,
            scratch: Vec::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    #[must_use]
    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    fn sink(&mut self) -> Result<&mut W> {
        self.sink
            .as_mut()
            .ok_or_else(|| Error::InvalidState("stream writer is closed".to_string()))
    }

    async fn start(&mut self) -> Result<()> {
        if self.state == StreamState::Idle {
            self.sink()?.write_all(&HEADER).await?;
            self.state = StreamState::Writing;
        }
        Ok(())
    }

    /// Encodes `value` and writes it as one frame.
    pub async fn write_value(&mut self, value: &Value) -> Result<()> {
        if self.state == StreamState::Closed {
            return Err(Error::InvalidState("write after close".to_string()));
        }

        self.scratch.clear();
        encode_frame(value, &self.options, &mut self.scratch)?;

        let frame = std::mem::take(&mut self.scratch);
        let result = self.write_frame(&frame).await;
        self.scratch = frame;
        if let Err(err) = result {
            warn!(error = %err, frames = self.frames, "sink write failed, closing stream writer");
            self.state = StreamState::Closed;
            return Err(err);
        }

        self.frames += 1;
        trace!(frame = self.frames, len = self.scratch.len(), "wrote frame");
        Ok(())
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.start().await?;
        self.sink()?.write_all(frame).await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.sink()?.flush().await?;
        Ok(())
    }

    /// Flushes the stream and returns the sink.
    pub async fn close(mut self) -> Result<W> {
        self.start().await?;
        self.flush().await?;
        self.state = StreamState::Closed;
        self.sink
            .take()
            .ok_or_else(|| Error::InvalidState("stream writer is closed".to_string()))
    }
}

impl<W: AsyncWrite + Unpin> Drop for AsyncStreamWriter<W> {
    fn drop(&mut self) {
        if self.sink.is_some() && self.state == StreamState::Writing {
            warn!(frames = self.frames, "async stream writer dropped without close, sink not flushed");
        }
    }
}

/// Reads frames from an async source.
pub struct AsyncStreamReader<R: AsyncRead + Unpin> {
    source: R,
    options: DecodeOptions,
    state: StreamState,
    pending: Vec<u8>,
    header_done: bool,
    offset: usize,
    frames: u64,
}

impl<R: AsyncRead + Unpin> AsyncStreamReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_options(source, DecodeOptions::default())
    }

    pub fn with_options(source: R, options: DecodeOptions) -> Self {
        AsyncStreamReader {
            source,
            options,
            state: StreamState::Idle,
            pending: Vec::new(),
            header_done: false,
            offset: 0,
            frames: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of bytes held for the frame currently being assembled.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn close(self) -> R {
        self.source
    }

    async fn fill_to(&mut self, target: usize) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        while self.pending.len() < target {
            let want = (target - self.pending.len()).min(READ_CHUNK);
            let n = self.source.read(&mut chunk[..want]).await?;
            if n == 0 {
                return Ok(false);
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
        Ok(true)
    }

    /// Reads the next value. `Ok(None)` marks a clean end of stream.
    pub async fn next_value(&mut self) -> Result<Option<Value>> {
        if self.state == StreamState::Closed {
            return Err(Error::InvalidState("read after close".to_string()));
        }
        let result = self.read_frame().await;
        if result.is_err() {
            self.state = StreamState::Closed;
        }
        result
    }

    async fn read_frame(&mut self) -> Result<Option<Value>> {
        if !self.header_done {
            if !self.fill_to(HEADER.len()).await? {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Err(truncated_stream(HEADER.len(), self.pending.len(), self.pending.len()));
            }
            codec::check_header(&self.pending)?;
            self.pending.clear();
            self.offset = HEADER.len();
            self.header_done = true;
            self.state = StreamState::Reading;
        }

        if !self.fill_to(FRAME_HEAD_LEN).await? {
            if self.pending.is_empty() {
                return Ok(None);
            }
            return Err(truncated_stream(FRAME_HEAD_LEN, self.pending.len(), self.offset));
        }
        let (payload_len, flags) = parse_frame_head(&self.pending, self.offset)?;
        let frame_len = FRAME_HEAD_LEN + payload_len;
        if !self.fill_to(frame_len).await? {
            return Err(truncated_stream(frame_len, self.pending.len(), self.offset));
        }

        let value = decode_frame(flags, &self.pending[FRAME_HEAD_LEN..], self.offset, &self.options)?;
        self.offset += frame_len;
        self.pending.clear();
        self.frames += 1;
        trace!(frame = self.frames, len = frame_len, "read frame");
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btoon;
    use std::time::Duration;

    #[tokio::test]
    async fn test_roundtrip_over_duplex() {
        let (client, mut server) = tokio::io::duplex(64);
        let values = vec![Value::from(42), Value::from("hello"), btoon!([1, 2, 3])];

        let expected = values.clone();
        let writer = tokio::spawn(async move {
            let mut writer = AsyncStreamWriter::new(client);
            for value in &values {
                writer.write_value(value).await.unwrap();
            }
            let mut sink = writer.close().await.unwrap();
            sink.shutdown().await.unwrap();
        });

        let mut reader = AsyncStreamReader::new(&mut server);
        let mut read = Vec::new();
        while let Some(value) = reader.next_value().await.unwrap() {
            read.push(value);
        }
        writer.await.unwrap();
        assert_eq!(read, expected);
    }

    #[tokio::test]
    async fn test_dropped_read_keeps_partial_frame() {
        let mut writer = AsyncStreamWriter::new(Vec::new());
        writer.write_value(&Value::from("cancel me")).await.unwrap();
        let bytes = writer.close().await.unwrap();

        let (mut tx, rx) = tokio::io::duplex(1024);
        let split = HEADER.len() + 6;
        tx.write_all(&bytes[..split]).await.unwrap();

        let mut reader = AsyncStreamReader::new(rx);
        let timed_out = tokio::time::timeout(Duration::from_millis(50), reader.next_value()).await;
        assert!(timed_out.is_err());
        assert_eq!(reader.buffered(), 6);

        tx.write_all(&bytes[split..]).await.unwrap();
        drop(tx);
        assert_eq!(reader.next_value().await.unwrap(), Some(Value::from("cancel me")));
        assert_eq!(reader.next_value().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_truncated_async_stream() {
        let mut writer = AsyncStreamWriter::new(Vec::new());
        writer.write_value(&Value::from(1234)).await.unwrap();
        let bytes = writer.close().await.unwrap();

        let mut reader = AsyncStreamReader::new(&bytes[..bytes.len() - 1]);
        assert!(reader.next_value().await.unwrap_err().is_truncated());
        assert_eq!(reader.state(), StreamState::Closed);
    }
}
