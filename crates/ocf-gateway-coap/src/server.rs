//! Accept loops for the supported transports.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use coap_lite::Packet;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::channel::{attach_stream, dispatch_packet, SessionEvents};
use crate::commander::ClientCommander;
use crate::error::ChannelError;
use crate::mux::ServeMux;

/// A CoAP server: one mux, one set of lifecycle callbacks, any number of
/// transports served concurrently.
pub struct CoapServer {
    mux: Arc<ServeMux>,
    events: Arc<dyn SessionEvents>,
}

impl CoapServer {
    /// Build a server from its routing table and lifecycle callbacks.
    pub fn new(mux: ServeMux, events: Arc<dyn SessionEvents>) -> Self {
        Self {
            mux: Arc::new(mux),
            events,
        }
    }

    /// Serve connections accepted from `listener`, with an optional TLS
    /// handshake in front of each channel. Runs until accept fails.
    pub async fn serve_tcp(
        &self,
        listener: TcpListener,
        tls: Option<TlsAcceptor>,
    ) -> Result<(), ChannelError> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, "accepted connection");
            let mux = self.mux.clone();
            let events = self.events.clone();
            let tls = tls.clone();
            tokio::spawn(async move {
                match tls {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(stream) => {
                            attach_stream(stream, peer, mux, events);
                        }
                        Err(err) => warn!(%peer, %err, "TLS handshake failed"),
                    },
                    None => {
                        attach_stream(stream, peer, mux, events);
                    }
                }
            });
        }
    }

    /// Serve datagrams from `socket`. Each source address gets its own
    /// channel, created on the first datagram and torn down when its
    /// commander is closed (keepalive failure is the usual trigger).
    pub async fn serve_udp(&self, socket: UdpSocket) -> Result<(), ChannelError> {
        let socket = Arc::new(socket);
        let peers: Arc<Mutex<HashMap<SocketAddr, ClientCommander>>> = Arc::default();
        let mut buf = vec![0u8; 65_536];
        loop {
            let (len, peer) = socket.recv_from(&mut buf).await?;
            let packet = match Packet::from_bytes(&buf[..len]) {
                Ok(packet) => packet,
                Err(err) => {
                    warn!(%peer, ?err, "dropping undecodable datagram");
                    continue;
                }
            };
            let commander = self.peer_channel(&socket, &peers, peer);
            dispatch_packet(&commander, &self.mux, packet);
        }
    }

    fn peer_channel(
        &self,
        socket: &Arc<UdpSocket>,
        peers: &Arc<Mutex<HashMap<SocketAddr, ClientCommander>>>,
        peer: SocketAddr,
    ) -> ClientCommander {
        if let Some(existing) = peers.lock().expect("peers mutex poisoned").get(&peer) {
            if !existing.is_closed() {
                return existing.clone();
            }
        }

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Packet>();
        let cancel = CancellationToken::new();
        let commander = ClientCommander::new(peer, outbound_tx, cancel.clone());
        peers
            .lock()
            .expect("peers mutex poisoned")
            .insert(peer, commander.clone());
        self.events.connected(&commander);

        let socket = socket.clone();
        let peers = peers.clone();
        let events = self.events.clone();
        let channel = commander.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    queued = outbound_rx.recv() => match queued {
                        Some(packet) => match packet.to_bytes() {
                            Ok(bytes) => {
                                if let Err(err) = socket.send_to(&bytes, peer).await {
                                    warn!(%peer, %err, "send failed, closing channel");
                                    cancel.cancel();
                                    break;
                                }
                            }
                            Err(err) => warn!(%peer, ?err, "cannot encode datagram"),
                        },
                        None => break,
                    },
                }
            }
            peers.lock().expect("peers mutex poisoned").remove(&peer);
            channel.fail_pending();
            events.disconnected(&channel);
            debug!(%peer, "datagram channel closed");
        });

        commander
    }
}
