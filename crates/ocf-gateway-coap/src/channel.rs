//! Per-connection packet pump and inbound dispatch.

use std::net::SocketAddr;
use std::sync::Arc;

use coap_lite::{MessageClass, MessageType, Packet};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::codec::CoapCodec;
use crate::commander::ClientCommander;
use crate::mux::{Request, ResponseWriter, ServeMux};

/// Connection lifecycle callbacks.
///
/// `connected` fires before any request from that peer is dispatched;
/// `disconnected` fires exactly once when the channel winds down. Both are
/// called from async context and must not block.
pub trait SessionEvents: Send + Sync {
    /// A peer channel opened.
    fn connected(&self, _commander: &ClientCommander) {}
    /// A peer channel closed.
    fn disconnected(&self, _commander: &ClientCommander) {}
}

/// No-op [`SessionEvents`], used by plain clients.
pub struct NoSessionEvents;

impl SessionEvents for NoSessionEvents {}

/// Attach a CoAP channel to a byte stream and return its command handle.
///
/// Spawns the read and write pumps for the connection. `events.connected`
/// has already fired when this returns; `events.disconnected` fires when the
/// stream ends, fails, or [`ClientCommander::close`] is called.
pub fn attach_stream<S>(
    stream: S,
    peer: SocketAddr,
    mux: Arc<ServeMux>,
    events: Arc<dyn SessionEvents>,
) -> ClientCommander
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Packet>();
    let cancel = CancellationToken::new();
    let commander = ClientCommander::new(peer, outbound_tx, cancel.clone());
    events.connected(&commander);

    let framed = Framed::new(stream, CoapCodec);
    let (mut sink, mut frames) = framed.split();

    let write_cancel = cancel.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = write_cancel.cancelled() => break,
                queued = outbound_rx.recv() => match queued {
                    Some(packet) => {
                        if let Err(err) = sink.send(packet).await {
                            debug!(%peer, %err, "write failed, closing channel");
                            write_cancel.cancel();
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
        let _ = sink.close().await;
    });

    let read_commander = commander.clone();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                frame = frames.next() => match frame {
                    Some(Ok(packet)) => dispatch_packet(&read_commander, &mux, packet),
                    Some(Err(err)) => {
                        warn!(%peer, %err, "closing channel on undecodable frame");
                        break;
                    }
                    None => break,
                },
            }
        }
        cancel.cancel();
        read_commander.fail_pending();
        events.disconnected(&read_commander);
        debug!(%peer, "channel closed");
    });

    commander
}

/// Route one inbound packet.
///
/// Requests go to the mux; responses complete pending exchanges or feed
/// observation sinks, and fall through to the mux when unmatched (so the
/// application can account for unpaired messages); empty confirmable
/// messages are liveness probes answered with an empty reset, other empty
/// messages resolve our own pending probes.
pub(crate) fn dispatch_packet(commander: &ClientCommander, mux: &Arc<ServeMux>, packet: Packet) {
    match packet.header.code {
        MessageClass::Empty => {
            if packet.header.get_type() == MessageType::Confirmable {
                let mut pong = Packet::new();
                pong.header.set_type(MessageType::Reset);
                pong.header.message_id = packet.header.message_id;
                let _ = commander.send_packet(pong);
            } else {
                commander.resolve_pong(packet.header.message_id);
            }
        }
        MessageClass::Request(_) => {
            let rw = ResponseWriter::for_request(commander, &packet);
            mux.dispatch(
                rw,
                Request {
                    packet,
                    commander: commander.clone(),
                },
            );
        }
        MessageClass::Response(_) => {
            if let Some(packet) = commander.complete_response(packet) {
                let rw = ResponseWriter::for_request(commander, &packet);
                mux.dispatch(
                    rw,
                    Request {
                        packet,
                        commander: commander.clone(),
                    },
                );
            }
        }
        _ => {
            debug!(peer = %commander.remote_addr(), "ignoring reserved message class");
        }
    }
}
