//! Framed streams of BTOON values over `std::io`.
//!
//! A stream starts with the 4-byte header once, followed by one frame per
//! value:
//!
//! ```text
//! payload_len:u32 | flags | payload
//! ```
//!
//! The payload is the tagged value body, or `original_len:u32` plus zlib bytes
//! when the compressed flag is set.
//!
//! ## Examples
//!
//! ```rust
//! use btoon::stream::{StreamReader, StreamWriter};
//! use btoon::Value;
//!
//! let mut writer = StreamWriter::new(Vec::new());
//! writer.write_value(&Value::from(42)).unwrap();
//! writer.write_value(&Value::from("hello")).unwrap();
//! let bytes = writer.close().unwrap();
//!
//! let mut reader = StreamReader::new(bytes.as_slice());
//! assert_eq!(reader.next_value().unwrap(), Some(Value::from(42)));
//! assert_eq!(reader.next_value().unwrap(), Some(Value::from("hello")));
//! assert_eq!(reader.next_value().unwrap(), None);
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{trace, warn};

use crate::codec::{self, COMPRESSED_FRAME_OVERHEAD};
use crate::error::DecodeErrorKind;
use crate::tags::{FLAG_COMPRESSED, HEADER};
use crate::{DecodeOptions, EncodeOptions, Error, Result, Value};

/// Payload length plus flag byte.
pub(crate) const FRAME_HEAD_LEN: usize = 5;

const READ_CHUNK: usize = 8 * 1024;

/// Lifecycle of a stream handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing has been written or read yet.
    Idle,
    Writing,
    Reading,
    Closed,
}

/// Cancels pending reads of the [`StreamReader`] it was taken from.
///
/// Cloning shares the flag, so a handle can be moved to another thread.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag so reads can continue.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Appends one complete frame for `value` to `out`.
///
/// Nothing is appended when encoding fails.
pub(crate) fn encode_frame(value: &Value, options: &EncodeOptions, out: &mut Vec<u8>) -> Result<()> {
    let payload = codec::encode_payload(value, options, COMPRESSED_FRAME_OVERHEAD)?;
    let payload_len = if payload.is_compressed() {
        payload.bytes.len() + COMPRESSED_FRAME_OVERHEAD
    } else {
        payload.bytes.len()
    };
    let payload_len = codec::checked_u32("frame", payload_len)?;

    out.reserve(FRAME_HEAD_LEN + payload_len as usize);
    out.write_u32::<LittleEndian>(payload_len)?;
    out.push(payload.flags);
    if payload.is_compressed() {
        out.write_u32::<LittleEndian>(codec::checked_u32("frame body", payload.original_len)?)?;
    }
    out.extend_from_slice(&payload.bytes);
    Ok(())
}

/// Splits a frame head into payload length and validated flags.
pub(crate) fn parse_frame_head(head: &[u8], frame_offset: usize) -> Result<(usize, u8)> {
    let len = LittleEndian::read_u32(&head[..4]) as usize;
    let flags = head[4];
    codec::check_flags(flags, frame_offset + 4)?;
    Ok((len, flags))
}

/// Decodes the payload of a frame that starts at `frame_offset` in the stream.
pub(crate) fn decode_frame(flags: u8, payload: &[u8], frame_offset: usize, options: &DecodeOptions) -> Result<Value> {
    let payload_offset = frame_offset + FRAME_HEAD_LEN;
    if flags & FLAG_COMPRESSED != 0 {
        let body = codec::inflate_frame(payload, payload_offset)?;
        codec::decode_body(&body, 0, flags, frame_offset + 4, options.max_depth)
    } else {
        codec::decode_body(payload, payload_offset, flags, frame_offset + 4, options.max_depth)
    }
}

pub(crate) fn truncated_stream(needed: usize, available: usize, offset: usize) -> Error {
    Error::decode(DecodeErrorKind::TruncatedStream { needed, available }, offset)
}

/// Writes values as frames to a byte sink.
pub struct StreamWriter<W: Write> {
    sink: Option<W>,
    options: EncodeOptions,
    state: StreamState,
    frames: u64,
    scratch: Vec<u8>,
}

impl StreamWriter<BufWriter<File>> {
    /// Creates (or truncates) a file and writes a stream into it.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(StreamWriter::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write> StreamWriter<W> {
    pub fn new(sink: W) -> Self {
        Self::with_options(sink, EncodeOptions::default())
    }

    pub fn with_options(sink: W, options: EncodeOptions) -> Self {
        StreamWriter {
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

    fn start(&mut self) -> Result<()> {
        if self.state == StreamState::Idle {
            self.sink()?.write_all(&HEADER)?;
            self.state = StreamState::Writing;
        }
        Ok(())
    }

    /// Encodes `value` and writes it as one frame.
    ///
    /// The frame is fully encoded before any byte reaches the sink, so an
    /// encode failure leaves the stream as it was.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        if self.state == StreamState::Closed {
            return Err(Error::InvalidState("write after close".to_string()));
        }

        self.scratch.clear();
        encode_frame(value, &self.options, &mut self.scratch)?;

        let frame = std::mem::take(&mut self.scratch);
        let result = self.write_frame(&frame);
        self.scratch = frame;
        if let Err(err) = result {
            // The sink may hold part of a frame; nothing may follow it.
            warn!(error = %err, frames = self.frames, "sink write failed, closing stream writer");
            self.state = StreamState::Closed;
            return Err(err);
        }

        self.frames += 1;
        trace!(frame = self.frames, len = self.scratch.len(), "wrote frame");
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.start()?;
        self.sink()?.write_all(frame)?;
        Ok(())
    }

    /// Serializes any `T: Serialize` and writes it as one frame.
    pub fn write_serialize<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let value = crate::to_value(value)?;
        self.write_value(&value)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink()?.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.state == StreamState::Closed {
            return Ok(());
        }
        // An empty stream still carries its header.
        self.start()?;
        self.flush()?;
        self.state = StreamState::Closed;
        Ok(())
    }

    /// Flushes the stream and returns the sink.
    pub fn close(mut self) -> Result<W> {
        self.finish()?;
        trace!(frames = self.frames, "closed stream writer");
        self.sink
            .take()
            .ok_or_else(|| Error::InvalidState("stream writer is closed".to_string()))
    }
}

impl<W: Write> Drop for StreamWriter<W> {
    fn drop(&mut self) {
        if self.sink.is_some() && self.state != StreamState::Closed {
            if let Err(err) = self.finish() {
                warn!(error = %err, frames = self.frames, "failed to flush stream writer on drop");
            }
        }
    }
}

/// Bytes of an incomplete header or frame, carried from one reader to the next
/// together with the reader's position and decode options.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PendingBytes {
    bytes: Vec<u8>,
    header_done: bool,
    offset: usize,
    options: DecodeOptions,
}

impl PendingBytes {
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

/// Reads frames from a byte source.
///
/// The reader only ever asks the source for the bytes of the frame it is
/// currently assembling, so after end-of-stream or a cancelled read the
/// source is positioned at (or inside) the current frame and nowhere past it.
pub struct StreamReader<R: Read> {
    source: R,
    options: DecodeOptions,
    state: StreamState,
    pending: Vec<u8>,
    header_done: bool,
    cancel: CancelHandle,
    /// Stream offset of the first byte in `pending`.
    offset: usize,
    frames: u64,
}

impl StreamReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(StreamReader::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> StreamReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_options(source, DecodeOptions::default())
    }

    pub fn with_options(source: R, options: DecodeOptions) -> Self {
        StreamReader {
            source,
            options,
            state: StreamState::Idle,
            pending: Vec::new(),
            header_done: false,
            cancel: CancelHandle::new(),
            offset: 0,
            frames: 0,
        }
    }

    /// Continues a stream from the leftovers of a cancelled reader, with the
    /// same decode options.
    pub fn resume(source: R, pending: PendingBytes) -> Self {
        let mut reader = Self::with_options(source, pending.options);
        reader.header_done = pending.header_done;
        reader.offset = pending.offset;
        reader.pending = pending.bytes;
        if reader.header_done {
            reader.state = StreamState::Reading;
        }
        reader
    }

    #[must_use]
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    #[must_use]
    pub fn frames_read(&self) -> u64 {
        self.frames
    }

    /// Hands back the source together with any bytes of an unfinished frame.
    pub fn into_parts(self) -> (R, PendingBytes) {
        let pending = PendingBytes {
            bytes: self.pending,
            header_done: self.header_done,
            offset: self.offset,
            options: self.options,
        };
        (self.source, pending)
    }

    /// Releases the source.
    pub fn close(self) -> R {
        self.source
    }

    /// Reads until `pending` holds `target` bytes. Returns `false` on end of input.
    fn fill_to(&mut self, target: usize) -> Result<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        while self.pending.len() < target {
            if self.cancel.is_cancelled() {
                trace!(pending = self.pending.len(), "stream read cancelled");
                return Err(Error::Cancelled);
            }
            let want = (target - self.pending.len()).min(READ_CHUNK);
            match self.source.read(&mut chunk[..want]) {
                Ok(0) => return Ok(false),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(true)
    }

    fn read_header(&mut self) -> Result<bool> {
        if !self.fill_to(HEADER.len())? {
            if self.pending.is_empty() {
                return Ok(false);
            }
            return Err(truncated_stream(HEADER.len(), self.pending.len(), self.pending.len()));
        }
        codec::check_header(&self.pending)?;
        self.pending.clear();
        self.offset = HEADER.len();
        self.header_done = true;
        self.state = StreamState::Reading;
        Ok(true)
    }

    /// Reads the next value. `Ok(None)` marks a clean end of stream.
    pub fn next_value(&mut self) -> Result<Option<Value>> {
        if self.state == StreamState::Closed {
            return Err(Error::InvalidState("read after close".to_string()));
        }
        let result = self.read_frame();
        if let Err(err) = &result {
            if !matches!(err, Error::Cancelled) {
                self.state = StreamState::Closed;
            }
        }
        result
    }

    fn read_frame(&mut self) -> Result<Option<Value>> {
        if !self.header_done && !self.read_header()? {
            return Ok(None);
        }

        if !self.fill_to(FRAME_HEAD_LEN)? {
            if self.pending.is_empty() {
                return Ok(None);
            }
            return Err(truncated_stream(FRAME_HEAD_LEN, self.pending.len(), self.offset));
        }
        let (payload_len, flags) = parse_frame_head(&self.pending, self.offset)?;
        let frame_len = FRAME_HEAD_LEN + payload_len;
        if !self.fill_to(frame_len)? {
            return Err(truncated_stream(frame_len, self.pending.len(), self.offset));
        }

        let value = decode_frame(flags, &self.pending[FRAME_HEAD_LEN..], self.offset, &self.options)?;
        self.offset += frame_len;
        self.pending.clear();
        self.frames += 1;
        trace!(frame = self.frames, len = frame_len, "read frame");
        Ok(Some(value))
    }

    /// Reads the next value and deserializes it into `T`.
    pub fn next_deserialize<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        match self.next_value()? {
            Some(value) => crate::from_value(value).map(Some),
            None => Ok(None),
        }
    }
}

impl<R: Read> Iterator for StreamReader<R> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == StreamState::Closed {
            return None;
        }
        self.next_value().transpose()
    }
}
