//! # Transport Layer
//!
//! TCP plumbing for one DHIP connection: a writer task draining the
//! correlator's outbound queue and a reader task feeding the assembler.
//!
//! A connection lives for exactly one door operation and is never reused.

pub mod tcp;

pub use tcp::{resolve_target, Connection};
