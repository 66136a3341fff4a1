//! Channel error types

use thiserror::Error;

use crate::codec::MAX_FRAME_SIZE;

/// Errors surfaced by the CoAP channel layer.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Underlying transport I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A packet could not be serialized for the wire.
    #[error("cannot encode CoAP message: {0}")]
    Encode(coap_lite::error::MessageError),

    /// An inbound frame did not parse as a CoAP packet.
    #[error("cannot decode CoAP frame: {0}")]
    Decode(coap_lite::error::MessageError),

    /// An inbound frame announced a length above [`MAX_FRAME_SIZE`].
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_SIZE} byte limit")]
    FrameTooLarge(usize),

    /// The peer channel is gone; pending exchanges resolve to this.
    #[error("connection closed")]
    ConnectionClosed,
}
