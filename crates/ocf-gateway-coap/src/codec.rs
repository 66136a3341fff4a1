//! Length-prefixed frame codec for CoAP packets over stream transports.

use bytes::{Buf, BufMut, BytesMut};
use coap_lite::Packet;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ChannelError;

/// Upper bound on a single frame; anything larger kills the connection.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frames are a 4-byte big-endian payload length followed by the encoded
/// packet. Constrained links negotiate small payloads anyway; the length cap
/// is a guard against hostile peers, not a protocol limit.
pub(crate) struct CoapCodec;

impl Decoder for CoapCodec {
    type Item = Packet;
    type Error = ChannelError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, ChannelError> {
        if src.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(ChannelError::FrameTooLarge(len));
        }
        if src.len() < 4 + len {
            src.reserve(4 + len - src.len());
            return Ok(None);
        }
        src.advance(4);
        let frame = src.split_to(len);
        Packet::from_bytes(&frame).map(Some).map_err(ChannelError::Decode)
    }
}

impl Encoder<Packet> for CoapCodec {
    type Error = ChannelError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), ChannelError> {
        let bytes = item.to_bytes().map_err(ChannelError::Encode)?;
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(ChannelError::FrameTooLarge(bytes.len()));
        }
        dst.reserve(4 + bytes.len());
        dst.put_u32(bytes.len() as u32);
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}
