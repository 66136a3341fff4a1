//! Gateway error types.
//!
//! Per-request failures never propagate: handlers recover them into a CoAP
//! reply and log. The enums here cover everything else - startup failures
//! that must exit the process, plus the component-level errors handlers
//! translate from.

use thiserror::Error;

/// Environment configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable held a value the gateway cannot use.
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A variable required in this configuration was not set.
    #[error("{0} is required")]
    Missing(&'static str),
}

/// TLS setup failures.
#[derive(Debug, Error)]
pub enum TlsError {
    /// Certificate or key file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Certificate or key material did not parse.
    #[error("invalid PEM material in {path}")]
    InvalidPem {
        /// File path.
        path: String,
    },

    /// The CA directory produced no root certificates.
    #[error("CA root pool is empty")]
    EmptyCaRootPool,

    /// rustls rejected the assembled configuration.
    #[error("TLS configuration rejected: {0}")]
    Config(#[from] rustls::Error),

    /// The client verifier could not be built.
    #[error("client verifier rejected: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),
}

/// CBOR payload codec failures.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Inbound payload was not the expected CBOR shape.
    #[error("cannot decode CBOR: {0}")]
    Decode(String),

    /// Outbound value failed to serialize.
    #[error("cannot encode CBOR: {0}")]
    Encode(String),
}

/// HTTP egress failures. Callers treat any of these as a 5xx condition.
#[derive(Debug, Error)]
pub enum EgressError {
    /// The request never completed (refused, timed out, reset).
    #[error("HTTP transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// A 2xx response carried an undecodable protobuf body.
    #[error("cannot decode protobuf response: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Fatal startup failures; the process exits non-zero on any of these.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Environment configuration failed.
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// TLS setup failed.
    #[error("TLS setup: {0}")]
    Tls(#[from] TlsError),

    /// The HTTP client could not be constructed.
    #[error("HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Binding or serving the CoAP endpoint failed.
    #[error("CoAP endpoint: {0}")]
    Serve(#[from] ocf_gateway_coap::ChannelError),

    /// Listener could not be bound.
    #[error("cannot bind {addr}: {source}")]
    Bind {
        /// Listen address.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
