//! Device-side connector, used by tests and tooling.

use std::sync::Arc;

use tokio::net::TcpStream;

use crate::channel::{attach_stream, NoSessionEvents};
use crate::commander::ClientCommander;
use crate::error::ChannelError;
use crate::mux::ServeMux;

/// TCP CoAP client.
pub struct Client;

impl Client {
    /// Connect to `addr`; inbound requests from the server are dropped.
    pub async fn connect(addr: &str) -> Result<ClientCommander, ChannelError> {
        Self::connect_with_mux(addr, ServeMux::new()).await
    }

    /// Connect to `addr` and serve inbound requests (observe registrations,
    /// one-shot GETs) from the given mux.
    pub async fn connect_with_mux(
        addr: &str,
        mux: ServeMux,
    ) -> Result<ClientCommander, ChannelError> {
        let stream = TcpStream::connect(addr).await?;
        let peer = stream.peer_addr()?;
        Ok(attach_stream(
            stream,
            peer,
            Arc::new(mux),
            Arc::new(NoSessionEvents),
        ))
    }
}
