//! CoAP resource handlers and the method gate in front of them.

mod resource_directory;
mod sign_in;
mod sign_up;

use std::future::Future;
use std::sync::Arc;

use coap_lite::{MessageClass, RequestType, ResponseType};
use futures::future::BoxFuture;
use ocf_gateway_coap::{packet, Request, ResponseWriter, ServeMux};
use tracing::{debug, error, info};

use crate::codec::send_response;
use crate::server::Gateway;

/// Sign-up resource path.
pub(crate) const OIC_SEC_ACCOUNT: &str = "/oic/sec/account";
/// Sign-in resource path.
pub(crate) const OIC_SEC_SESSION: &str = "/oic/sec/session";
/// Resource directory path.
pub(crate) const OIC_RD: &str = "oic/rd";

/// Build the gateway routing table: the three OCF resources plus a
/// not-found fallback, each behind the method gate.
pub(crate) fn build_mux(gateway: Arc<Gateway>) -> ServeMux {
    let mut mux = ServeMux::new();
    mux.handle(OIC_SEC_ACCOUNT, route(gateway.clone(), sign_up::handle));
    mux.handle(OIC_SEC_SESSION, route(gateway.clone(), sign_in::handle));
    mux.handle(OIC_RD, route(gateway.clone(), resource_directory::handle));
    mux.default_handle(route(gateway, not_found));
    mux
}

fn route<H, Fut>(
    gateway: Arc<Gateway>,
    handler: H,
) -> impl Fn(ResponseWriter, Request) -> BoxFuture<'static, ()> + Send + Sync + 'static
where
    H: Fn(Arc<Gateway>, ResponseWriter, Request) -> Fut + Copy + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    move |rw, req| {
        let gated: BoxFuture<'static, ()> = Box::pin(gate(gateway.clone(), rw, req, handler));
        gated
    }
}

/// Only request methods reach a handler. A response-coded `Content` packet
/// is an unpaired notification and is dropped; anything else is noise.
async fn gate<H, Fut>(gateway: Arc<Gateway>, rw: ResponseWriter, req: Request, handler: H)
where
    H: Fn(Arc<Gateway>, ResponseWriter, Request) -> Fut,
    Fut: Future<Output = ()>,
{
    let peer = req.commander.remote_addr();
    debug!(%peer, "message from client: {}", packet::summary(&req.packet));
    match req.code() {
        MessageClass::Request(
            RequestType::Post | RequestType::Get | RequestType::Put | RequestType::Delete,
        ) => handler(gateway, rw, req).await,
        MessageClass::Response(ResponseType::Content) => {
            info!(%peer, "unpaired message received");
        }
        other => {
            error!(%peer, code = ?other, "invalid code received");
        }
    }
}

async fn not_found(_gateway: Arc<Gateway>, rw: ResponseWriter, req: Request) {
    let peer = req.commander.remote_addr();
    debug!(%peer, path = %req.path(), "unknown resource requested");
    send_response(rw, peer, ResponseType::NotFound, &[]);
}
