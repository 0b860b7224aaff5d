//! # Core Framing Components
//!
//! Low-level DHIP frame handling: the fixed binary header, the outbound codec
//! and the receive-side assembler that rebuilds frames from a byte stream.
//!
//! ## Components
//! - **Frame**: header layout, magic validation, body extraction
//! - **Codec**: Tokio encoder for writing frames to a socket
//! - **Assembler**: accumulates socket reads until one whole frame is present
//!
//! ## Wire Format
//! ```text
//! [Magic(8)] [Session(4)] [Request(4)] [Length(8)] [Length(8)] [JSON body(N)]
//! ```
//! All integers are little-endian. Both length fields carry the body length.
//!
//! ## Safety Limits
//! - Body length is checked against a configurable maximum before buffering
//! - Inconsistent length fields are rejected as an invalid header

pub mod assembler;
pub mod codec;
pub mod frame;
