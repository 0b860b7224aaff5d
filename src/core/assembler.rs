//! Receive-side frame assembly.
//!
//! TCP hands over an unstructured byte stream, so one frame may arrive in
//! several reads. [`FrameAssembler`] keeps everything received since the last
//! frame boundary and yields a parsed body once the whole frame is present.
//!
//! The accumulator is reset to empty as soon as a frame is extracted. Any
//! bytes that followed that frame in the same buffer are dropped (and logged):
//! the device only ever answers the single outstanding request, so a second
//! frame in the same read is not expected.
//!
//! # Example
//!
//! ```
//! use dhip_client::core::assembler::FrameAssembler;
//! use dhip_client::core::frame::Frame;
//!
//! let bytes = Frame::new(0, 1, &b"{\"result\":true}"[..]).to_bytes();
//! let mut assembler = FrameAssembler::new();
//!
//! let (head, tail) = bytes.split_at(10);
//! assert!(assembler.push::<serde_json::Value>(head).unwrap().is_none());
//! let message: serde_json::Value = assembler.push(tail).unwrap().unwrap();
//! assert_eq!(message["result"], true);
//! ```

use bytes::BytesMut;
use serde::de::DeserializeOwned;
use tracing::{trace, warn};

use crate::core::frame::{Header, DEFAULT_MAX_BODY_SIZE, HEADER_SIZE};
use crate::error::{DhipError, Result};

/// Accumulates raw socket data until one complete frame is available
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: BytesMut,
    max_body_size: u64,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::with_max_body_size(DEFAULT_MAX_BODY_SIZE)
    }

    pub fn with_max_body_size(max_body_size: u64) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_body_size,
        }
    }

    /// Number of bytes buffered while waiting for the rest of a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Append `chunk` and try to extract one frame.
    ///
    /// Returns `Ok(None)` while the frame is incomplete. On success the body is
    /// parsed as JSON into `T` and the accumulator is emptied.
    ///
    /// # Errors
    /// - `ProtocolMismatch` / `InvalidHeader` if the header is not a DHIP header
    /// - `OversizedFrame` if the announced body exceeds the configured maximum
    /// - `DeserializeError` if the body is not valid JSON for `T`
    ///
    /// The accumulator is emptied on every error; the stream cannot be resynchronised.
    pub fn push<T: DeserializeOwned>(&mut self, chunk: &[u8]) -> Result<Option<T>> {
        self.buffer.extend_from_slice(chunk);

        if self.buffer.len() < HEADER_SIZE {
            trace!(buffered = self.buffer.len(), "Waiting for frame header");
            return Ok(None);
        }

        // Decode from the accumulator, not the chunk: the header may span reads.
        let header = match Header::parse(&self.buffer) {
            Ok(header) => header,
            Err(e) => {
                self.buffer.clear();
                return Err(e);
            }
        };

        if header.body_length > self.max_body_size {
            self.buffer.clear();
            return Err(DhipError::OversizedFrame(header.body_length));
        }

        let frame_end = header.frame_len()?;
        if frame_end > self.buffer.len() {
            trace!(
                buffered = self.buffer.len(),
                frame_end,
                "Waiting for frame body"
            );
            return Ok(None);
        }

        let body = self.buffer.split_to(frame_end).split_off(HEADER_SIZE);
        if !self.buffer.is_empty() {
            warn!(
                dropped = self.buffer.len(),
                "Discarding bytes received after a complete frame"
            );
        }
        self.buffer.clear();

        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|e| DhipError::DeserializeError(e.to_string()))
    }

    /// Forget any partially received frame
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}
