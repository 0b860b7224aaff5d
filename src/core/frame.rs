use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::de::DeserializeOwned;

use crate::error::{DhipError, Result};

/// Magic value opening every DHIP frame (`20 00 00 00 'D' 'H' 'I' 'P'` on the wire)
pub const MAGIC: u64 = 0x5049_4844_0000_0020;

/// Size of the fixed frame header in bytes
pub const HEADER_SIZE: usize = 32;

/// Default upper bound for an inbound body (1 MiB)
pub const DEFAULT_MAX_BODY_SIZE: u64 = 1024 * 1024;

/// Typed view of the 32-byte frame header.
///
/// The magic is not stored: it is a constant on encode and validated on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub session_id: u32,
    pub request_id: u32,
    pub body_length: u64,
}

impl Header {
    pub fn new(session_id: u32, request_id: u32, body_length: u64) -> Self {
        Self {
            session_id,
            request_id,
            body_length,
        }
    }

    /// Append the encoded header to `dst`, writing the body length into both length fields
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u64_le(MAGIC);
        dst.put_u32_le(self.session_id);
        dst.put_u32_le(self.request_id);
        dst.put_u64_le(self.body_length);
        dst.put_u64_le(self.body_length);
    }

    /// Parse the first [`HEADER_SIZE`] bytes of `src`.
    ///
    /// # Errors
    /// - `ProtocolMismatch` if the magic is not the DHIP constant
    /// - `InvalidHeader` if fewer than 32 bytes are given or the two length copies differ
    pub fn parse(src: &[u8]) -> Result<Self> {
        if src.len() < HEADER_SIZE {
            return Err(DhipError::InvalidHeader);
        }

        let mut cursor = &src[..HEADER_SIZE];
        let magic = cursor.get_u64_le();
        if magic != MAGIC {
            return Err(DhipError::ProtocolMismatch(magic));
        }

        let session_id = cursor.get_u32_le();
        let request_id = cursor.get_u32_le();
        let body_length = cursor.get_u64_le();
        let body_length_copy = cursor.get_u64_le();

        if body_length != body_length_copy {
            return Err(DhipError::InvalidHeader);
        }

        Ok(Self {
            session_id,
            request_id,
            body_length,
        })
    }

    /// Total on-wire size of the frame this header describes
    pub fn frame_len(&self) -> Result<usize> {
        usize::try_from(self.body_length)
            .ok()
            .and_then(|len| len.checked_add(HEADER_SIZE))
            .ok_or(DhipError::OversizedFrame(self.body_length))
    }
}

/// One complete header-plus-body unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub body: Bytes,
}

impl Frame {
    /// Build a frame around `body`, deriving the length fields from it
    pub fn new(session_id: u32, request_id: u32, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        Self {
            header: Header::new(session_id, request_id, body.len() as u64),
            body,
        }
    }

    /// Serialize `value` as the JSON body of a new frame
    pub fn json<T: serde::Serialize>(session_id: u32, request_id: u32, value: &T) -> Result<Self> {
        let body =
            serde_json::to_vec(value).map_err(|e| DhipError::SerializeError(e.to_string()))?;
        Ok(Self::new(session_id, request_id, body))
    }

    /// Encode header and body into one contiguous buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.body.len());
        self.header.write_to(&mut buf);
        buf.extend_from_slice(&self.body);
        buf.freeze()
    }

    /// Decode a frame that is entirely contained in `src`.
    ///
    /// Bytes after the end of the frame are ignored.
    pub fn from_bytes(src: &[u8]) -> Result<Self> {
        let header = Header::parse(src)?;
        let frame_len = header.frame_len()?;
        if src.len() < frame_len {
            return Err(DhipError::InvalidHeader);
        }

        Ok(Self {
            header,
            body: Bytes::copy_from_slice(&src[HEADER_SIZE..frame_len]),
        })
    }

    /// Parse the body as JSON
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| DhipError::DeserializeError(e.to_string()))
    }
}
