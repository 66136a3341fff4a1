//! CoAP channel layer for the OCF gateway.
//!
//! This crate owns everything between a byte stream and the gateway's
//! resource handlers:
//!
//! - **Framing** - CoAP packets (encoded with [`coap_lite`]) carried in
//!   length-prefixed frames over TCP/TLS, or one packet per datagram over UDP
//! - **Channels** - one bidirectional channel per peer, pairing outbound
//!   requests with inbound responses by token and pings with pongs by
//!   message id
//! - **Observations** - client-side observe registrations with cancellation
//! - **Routing** - a [`ServeMux`] dispatching inbound requests by exact path
//!   to async handlers, each in its own task
//! - **Lifecycle** - [`SessionEvents`] callbacks fired when a peer channel
//!   opens and closes
//!
//! The packet wire format itself (options, codes, block-wise) is
//! [`coap_lite`]'s business; this crate never inspects anything beyond the
//! header, token, and the handful of options it routes on.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod channel;
mod client;
mod codec;
mod commander;
mod error;
mod mux;
pub mod packet;
mod server;

pub use channel::{attach_stream, NoSessionEvents, SessionEvents};
pub use client::Client;
pub use commander::{ClientCommander, NotificationSink, Observation};
pub use error::ChannelError;
pub use mux::{Handler, Request, ResponseWriter, ServeMux};
pub use server::CoapServer;
