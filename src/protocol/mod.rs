//! # DHIP Method Calls
//!
//! JSON bodies, the login challenge handshake and the correlator that pairs
//! each inbound frame with the one request waiting for it.
//!
//! ## Flow
//! 1. `global.login` is sent with fixed client parameters
//! 2. The device answers with a login challenge (error code 268632079)
//! 3. The correlator adopts the challenge session, derives the digest and
//!    re-sends `global.login`; the caller keeps waiting
//! 4. The next non-challenge answer resolves the original call
//!
//! Only one request is ever outstanding per connection.

pub mod correlator;
pub mod handshake;
pub mod message;
