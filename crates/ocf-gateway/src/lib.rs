//! CoAP-to-HTTP gateway for an OCF IoT fabric.
//!
//! Constrained devices speak CoAP over TCP (optionally with mutual TLS) or
//! UDP; the authorization service and the resource directory speak HTTP with
//! Protocol Buffers. The gateway terminates device connections, keeps
//! per-connection session state, and translates the four well-known OCF
//! operations:
//!
//! | CoAP resource        | Method | Operation  |
//! |----------------------|--------|------------|
//! | `/oic/sec/account`   | POST   | sign-up    |
//! | `/oic/sec/session`   | POST   | sign-in    |
//! | `oic/rd`             | POST   | publish    |
//! | `oic/rd`             | DELETE | unpublish  |
//!
//! Published resources that advertise observability are additionally
//! observed over the device connection, so resource changes flow inbound
//! without polling.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod code_map;
pub mod codec;
pub mod config;
pub mod container;
pub mod egress;
pub mod error;
mod handlers;
pub mod keepalive;
pub mod logging;
pub mod model;
pub mod server;
pub mod session;
pub mod tls;

pub use config::Config;
pub use error::GatewayError;
pub use server::Gateway;
