//! Request routing: exact-path mux, handler trait, response writer.

use std::collections::HashMap;
use std::sync::Arc;

use coap_lite::{ContentFormat, MessageClass, MessageType, Packet, ResponseType};
use futures::future::BoxFuture;
use tracing::debug;

use crate::commander::ClientCommander;
use crate::error::ChannelError;
use crate::packet;

/// An inbound packet together with the channel it arrived on.
pub struct Request {
    /// The raw packet.
    pub packet: Packet,
    /// Handle to the peer channel, usable for outbound calls.
    pub commander: ClientCommander,
}

impl Request {
    /// Joined Uri-Path, without a leading slash.
    pub fn path(&self) -> String {
        packet::uri_path(&self.packet)
    }

    /// Uri-Query options as `key=value` strings.
    pub fn queries(&self) -> Vec<String> {
        packet::uri_queries(&self.packet)
    }

    /// Request payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.packet.payload
    }

    /// Message code.
    pub fn code(&self) -> MessageClass {
        self.packet.header.code
    }
}

/// Writer for the reply to one request. Consumed by [`write`](Self::write);
/// a handler that never writes simply drops it and no reply goes out.
pub struct ResponseWriter {
    commander: ClientCommander,
    token: Vec<u8>,
    message_id: u16,
    reply_type: MessageType,
    code: ResponseType,
    content_format: Option<ContentFormat>,
}

impl ResponseWriter {
    pub(crate) fn for_request(commander: &ClientCommander, request: &Packet) -> Self {
        let reply_type = if request.header.get_type() == MessageType::Confirmable {
            MessageType::Acknowledgement
        } else {
            MessageType::NonConfirmable
        };
        Self {
            commander: commander.clone(),
            token: request.get_token().to_vec(),
            message_id: request.header.message_id,
            reply_type,
            code: ResponseType::Content,
            content_format: None,
        }
    }

    /// Set the response code.
    pub fn set_code(&mut self, code: ResponseType) {
        self.code = code;
    }

    /// Set the Content-Format of the reply payload.
    pub fn set_content_format(&mut self, format: ContentFormat) {
        self.content_format = Some(format);
    }

    /// Build and queue the reply.
    pub fn write(self, payload: &[u8]) -> Result<(), ChannelError> {
        let mut reply = Packet::new();
        reply.header.set_type(self.reply_type);
        reply.header.message_id = self.message_id;
        reply.header.code = MessageClass::Response(self.code);
        reply.set_token(self.token);
        if let Some(format) = self.content_format {
            packet::set_content_format(&mut reply, format);
        }
        reply.payload = payload.to_vec();
        self.commander.send_packet(reply)
    }
}

/// An async request handler.
///
/// Implemented for any `Fn(ResponseWriter, Request) -> impl Future` closure,
/// which is how the gateway registers its routes.
pub trait Handler: Send + Sync + 'static {
    /// Handle one request. The future runs in its own task.
    fn handle(&self, rw: ResponseWriter, req: Request) -> BoxFuture<'static, ()>;
}

impl<F, Fut> Handler for F
where
    F: Fn(ResponseWriter, Request) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    fn handle(&self, rw: ResponseWriter, req: Request) -> BoxFuture<'static, ()> {
        Box::pin((self)(rw, req))
    }
}

/// Exact-path request multiplexer.
///
/// Paths are compared without their leading slash, so `/oic/sec/account`
/// and `oic/rd` both register the literal OCF forms. Each dispatched request
/// runs in its own spawned task.
#[derive(Default)]
pub struct ServeMux {
    routes: HashMap<String, Arc<dyn Handler>>,
    default_handler: Option<Arc<dyn Handler>>,
}

impl ServeMux {
    /// Empty mux; unrouted requests are dropped with a debug log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for the exact path `path`.
    pub fn handle(&mut self, path: &str, handler: impl Handler) {
        self.routes
            .insert(normalize(path).to_string(), Arc::new(handler));
    }

    /// Register the fallback handler for unmatched paths.
    pub fn default_handle(&mut self, handler: impl Handler) {
        self.default_handler = Some(Arc::new(handler));
    }

    pub(crate) fn dispatch(&self, rw: ResponseWriter, req: Request) {
        let path = req.path();
        let handler = self
            .routes
            .get(normalize(&path))
            .or(self.default_handler.as_ref());
        match handler {
            Some(handler) => {
                tokio::spawn(handler.handle(rw, req));
            }
            None => {
                debug!(
                    peer = %req.commander.remote_addr(),
                    path,
                    "no handler registered, dropping request"
                );
            }
        }
    }
}

fn normalize(path: &str) -> &str {
    path.trim_start_matches('/')
}
