//! Outbound side of the frame codec.
//!
//! The socket's write half is wrapped in a `FramedWrite<_, DhipCodec>`, so
//! frames leave as one header-plus-body unit. Inbound bytes go through
//! [`FrameAssembler`](crate::core::assembler::FrameAssembler) instead.

use bytes::BytesMut;
use tokio_util::codec::Encoder;

use crate::core::frame::{Frame, HEADER_SIZE};
use crate::error::DhipError;

#[derive(Debug, Default, Clone, Copy)]
pub struct DhipCodec;

impl Encoder<Frame> for DhipCodec {
    type Error = DhipError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(HEADER_SIZE + item.body.len());
        item.header.write_to(dst);
        dst.extend_from_slice(&item.body);
        Ok(())
    }
}
