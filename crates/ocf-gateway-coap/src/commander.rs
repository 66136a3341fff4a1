//! Per-connection command handle and observation primitives.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use coap_lite::{MessageClass, MessageType, Packet, RequestType};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ChannelError;
use crate::packet;

/// Callback invoked for every notification delivered to an observation.
pub type NotificationSink = Arc<dyn Fn(Packet) + Send + Sync>;

pub(crate) enum Pending {
    /// One response completes the exchange and removes the entry.
    Exchange(oneshot::Sender<Packet>),
    /// Responses keep flowing to the sink until the observation is cancelled.
    Observe(NotificationSink),
}

struct Inner {
    peer: SocketAddr,
    outbound: mpsc::UnboundedSender<Packet>,
    pending: Mutex<HashMap<Vec<u8>, Pending>>,
    pong_waiters: Mutex<HashMap<u16, oneshot::Sender<()>>>,
    next_message_id: AtomicU16,
    next_token: AtomicU64,
    cancel: CancellationToken,
}

/// Cloneable handle to one peer channel.
///
/// All sends go through an unbounded per-connection queue, so every method
/// here except [`exchange`](Self::exchange), [`get`](Self::get), and
/// [`ping`](Self::ping) is synchronous and safe to call under a lock.
#[derive(Clone)]
pub struct ClientCommander {
    inner: Arc<Inner>,
}

impl ClientCommander {
    pub(crate) fn new(
        peer: SocketAddr,
        outbound: mpsc::UnboundedSender<Packet>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                peer,
                outbound,
                pending: Mutex::new(HashMap::new()),
                pong_waiters: Mutex::new(HashMap::new()),
                next_message_id: AtomicU16::new(1),
                next_token: AtomicU64::new(1),
                cancel,
            }),
        }
    }

    /// Remote address of the peer this channel talks to.
    pub fn remote_addr(&self) -> SocketAddr {
        self.inner.peer
    }

    /// Build a confirmable request with a fresh message id and token.
    pub fn new_request(&self, method: RequestType, path: &str) -> Packet {
        let mut request = Packet::new();
        request.header.set_type(MessageType::Confirmable);
        request.header.code = MessageClass::Request(method);
        request.header.message_id = self.next_message_id();
        request.set_token(self.next_token());
        packet::set_uri_path(&mut request, path);
        request
    }

    /// Send `request` and wait for the response bearing its token.
    pub async fn exchange(&self, request: Packet) -> Result<Packet, ChannelError> {
        let token = request.get_token().to_vec();
        let (tx, rx) = oneshot::channel();
        self.register(token.clone(), Pending::Exchange(tx));
        if let Err(err) = self.send_packet(request) {
            self.remove_pending(&token);
            return Err(err);
        }
        rx.await.map_err(|_| ChannelError::ConnectionClosed)
    }

    /// One-shot GET of `href`.
    pub async fn get(&self, href: &str) -> Result<Packet, ChannelError> {
        self.exchange(self.new_request(RequestType::Get, href)).await
    }

    /// Register an observation on `href`; notifications (including the
    /// initial response) are delivered to `sink` until cancellation.
    pub fn observe(&self, href: &str, sink: NotificationSink) -> Result<Observation, ChannelError> {
        let mut request = self.new_request(RequestType::Get, href);
        packet::set_observe(&mut request, true);
        let token = request.get_token().to_vec();
        self.register(token.clone(), Pending::Observe(sink));
        if let Err(err) = self.send_packet(request) {
            self.remove_pending(&token);
            return Err(err);
        }
        Ok(Observation {
            commander: self.clone(),
            href: href.to_string(),
            token,
        })
    }

    /// Probe peer liveness with an empty confirmable message.
    pub async fn ping(&self) -> Result<(), ChannelError> {
        let mut probe = Packet::new();
        probe.header.set_type(MessageType::Confirmable);
        probe.header.code = MessageClass::Empty;
        probe.header.message_id = self.next_message_id();
        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = self
                .inner
                .pong_waiters
                .lock()
                .expect("pong waiters mutex poisoned");
            waiters.insert(probe.header.message_id, tx);
        }
        let message_id = probe.header.message_id;
        if let Err(err) = self.send_packet(probe) {
            self.inner
                .pong_waiters
                .lock()
                .expect("pong waiters mutex poisoned")
                .remove(&message_id);
            return Err(err);
        }
        rx.await.map_err(|_| ChannelError::ConnectionClosed)
    }

    /// Tear the channel down; pending exchanges resolve with
    /// [`ChannelError::ConnectionClosed`].
    pub fn close(&self) {
        self.inner.cancel.cancel();
    }

    /// Whether the channel has been torn down.
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    pub(crate) fn send_packet(&self, packet: Packet) -> Result<(), ChannelError> {
        self.inner
            .outbound
            .send(packet)
            .map_err(|_| ChannelError::ConnectionClosed)
    }

    /// Route an inbound response to its pending exchange or observation.
    /// Returns the packet back when no exchange claims its token.
    pub(crate) fn complete_response(&self, response: Packet) -> Option<Packet> {
        let token = response.get_token().to_vec();
        let mut pending = self.inner.pending.lock().expect("pending mutex poisoned");
        if matches!(pending.get(&token), Some(Pending::Exchange(_))) {
            let entry = pending.remove(&token);
            drop(pending);
            if let Some(Pending::Exchange(tx)) = entry {
                let _ = tx.send(response);
            }
            return None;
        }
        if let Some(Pending::Observe(sink)) = pending.get(&token) {
            let sink = sink.clone();
            drop(pending);
            sink(response);
            return None;
        }
        Some(response)
    }

    pub(crate) fn resolve_pong(&self, message_id: u16) {
        let waiter = self
            .inner
            .pong_waiters
            .lock()
            .expect("pong waiters mutex poisoned")
            .remove(&message_id);
        if let Some(tx) = waiter {
            let _ = tx.send(());
        }
    }

    pub(crate) fn remove_pending(&self, token: &[u8]) -> bool {
        self.inner
            .pending
            .lock()
            .expect("pending mutex poisoned")
            .remove(token)
            .is_some()
    }

    /// Drop every pending waiter; their receivers observe a closed channel.
    pub(crate) fn fail_pending(&self) {
        self.inner
            .pending
            .lock()
            .expect("pending mutex poisoned")
            .clear();
        self.inner
            .pong_waiters
            .lock()
            .expect("pong waiters mutex poisoned")
            .clear();
    }

    fn register(&self, token: Vec<u8>, entry: Pending) {
        self.inner
            .pending
            .lock()
            .expect("pending mutex poisoned")
            .insert(token, entry);
    }

    fn next_message_id(&self) -> u16 {
        self.inner.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    fn next_token(&self) -> Vec<u8> {
        let value = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        value.to_be_bytes().to_vec()
    }
}

impl std::fmt::Debug for ClientCommander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCommander")
            .field("peer", &self.inner.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Handle to a live observe registration.
pub struct Observation {
    commander: ClientCommander,
    href: String,
    token: Vec<u8>,
}

impl Observation {
    /// Observed resource path.
    pub fn href(&self) -> &str {
        &self.href
    }

    /// Deregister: stop delivering notifications and tell the peer with an
    /// observe-deregister GET carrying the original token.
    pub fn cancel(&self) -> Result<(), ChannelError> {
        debug!(href = %self.href, "cancel observation");
        self.commander.remove_pending(&self.token);
        let mut request = Packet::new();
        request.header.set_type(MessageType::Confirmable);
        request.header.code = MessageClass::Request(RequestType::Get);
        request.header.message_id = self.commander.next_message_id();
        request.set_token(self.token.clone());
        packet::set_uri_path(&mut request, &self.href);
        packet::set_observe(&mut request, false);
        self.commander.send_packet(request)
    }
}

impl std::fmt::Debug for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observation")
            .field("href", &self.href)
            .field("token", &self.token)
            .finish()
    }
}
