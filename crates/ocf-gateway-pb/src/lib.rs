//! Protobuf messages exchanged with the OCF back-end services.
//!
//! Two services sit behind the gateway: the authorization service
//! (sign-up/sign-in) and the resource directory (publish/unpublish). Both
//! speak HTTP with Protocol Buffers bodies. The message schemas are small and
//! fixed, so they are written out with `prost` derives rather than generated
//! from `.proto` files at build time; the wire format is identical.
//!
//! The sign-up and sign-in payloads additionally travel between device and
//! gateway as CBOR, keyed by the short OCF attribute names (`di`,
//! `accesstoken`, `uid`, ...). Those types carry `serde` renames so a single
//! struct serves both wires, mirroring how the services define them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod resources;

/// HTTP paths exposed by the back-end services.
pub mod uri {
    /// Authorization service sign-up endpoint.
    pub const SIGN_UP: &str = "/signup";
    /// Authorization service sign-in endpoint.
    pub const SIGN_IN: &str = "/signin";
    /// Resource directory publish endpoint.
    pub const PUBLISH_RESOURCE: &str = "/api/publish";
    /// Resource directory unpublish endpoint.
    pub const UNPUBLISH_RESOURCE: &str = "/api/unpublish";
}

/// Content type used for protobuf request and response bodies.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/protobuf";
