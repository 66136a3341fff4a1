//! Resource directory handlers (`oic/rd`): publish, unpublish, selector.

use std::collections::HashMap;
use std::sync::Arc;

use coap_lite::{MessageClass, RequestType, ResponseType};
use ocf_gateway_coap::{Request, ResponseWriter};
use ocf_gateway_pb::resources::{
    AuthorizationContext, PublishResourceRequest, PublishResourceResponse,
    UnpublishResourceRequest, UnpublishResourceResponse,
};
use ocf_gateway_pb::uri;
use tracing::{error, info, warn};

use crate::codec::{decode_cbor, encode_cbor, send_response};
use crate::egress::post_proto;
use crate::model::{resource_id, DirectorySelector, ResourceLink, WkRd};
use crate::server::Gateway;

pub(crate) async fn handle(gateway: Arc<Gateway>, rw: ResponseWriter, req: Request) {
    let peer = req.commander.remote_addr();
    match req.code() {
        MessageClass::Request(RequestType::Post) => publish(gateway, rw, req).await,
        MessageClass::Request(RequestType::Delete) => unpublish(gateway, rw, req).await,
        MessageClass::Request(RequestType::Get) => get_selector(gateway, rw, req).await,
        _ => {
            error!(%peer, "forbidden request");
            send_response(rw, peer, ResponseType::Forbidden, &[]);
        }
    }
}

async fn publish(gateway: Arc<Gateway>, rw: ResponseWriter, req: Request) {
    let peer = req.commander.remote_addr();

    let mut envelope: WkRd = match decode_cbor(req.payload()) {
        Ok(envelope) => envelope,
        Err(err) => {
            error!(%peer, %err, "cannot unmarshal publish request");
            return send_response(rw, peer, ResponseType::BadRequest, &[]);
        }
    };
    if !envelope.is_valid() {
        error!(%peer, "publish envelope cannot contain empty fields");
        return send_response(rw, peer, ResponseType::BadRequest, &[]);
    }

    let session = match gateway.clients().find(&peer.to_string()) {
        Some(session) => session,
        None => {
            error!(%peer, "could not find a valid session");
            return send_response(rw, peer, ResponseType::BadRequest, &[]);
        }
    };
    let auth_context = session.load_authorization_context();

    let mut accepted = Vec::with_capacity(envelope.links.len());
    for link in &envelope.links {
        if let Some(link) =
            publish_link(&gateway, &auth_context, link, envelope.time_to_live, peer).await
        {
            accepted.push(link);
        }
    }
    if accepted.is_empty() {
        error!(%peer, device = %envelope.device_id, "no links accepted");
        return send_response(rw, peer, ResponseType::BadRequest, &[]);
    }
    envelope.links = accepted.clone();

    let payload = match encode_cbor(&envelope) {
        Ok(payload) => payload,
        Err(err) => {
            error!(%peer, %err, "cannot marshal publish response");
            return send_response(rw, peer, ResponseType::InternalServerError, &[]);
        }
    };
    send_response(rw, peer, ResponseType::Changed, &payload);

    // Observations only after the reply is on its way; a slow observe open
    // must never delay the device. Failures are logged, the device is
    // registered in the back-end either way.
    for link in &accepted {
        session.observe_resource(link);
    }
}

async fn publish_link(
    gateway: &Gateway,
    auth_context: &AuthorizationContext,
    link: &ResourceLink,
    time_to_live: i64,
    peer: std::net::SocketAddr,
) -> Option<ResourceLink> {
    if link.device_id.is_empty() {
        error!(%peer, "cannot publish a resource without a device id");
        return None;
    }
    if link.href.is_empty() {
        error!(%peer, "cannot publish a resource without a href");
        return None;
    }

    let mut link = link.clone();
    link.id = resource_id(&link.device_id, &link.href);

    let request = PublishResourceRequest {
        authorization_context: Some(auth_context.clone()),
        resource_id: link.id.clone(),
        device_id: link.device_id.clone(),
        resource: Some(link.to_proto()),
        time_to_live: time_to_live as i32,
    };
    let url = gateway.config().resource_url(uri::PUBLISH_RESOURCE);
    match post_proto::<_, PublishResourceResponse>(gateway.http_client(), &url, &request).await {
        Ok((200, Some(response))) => {
            link.instance_id = response.instance_id;
            info!(
                "resource {} published for device {}",
                link.id, link.device_id
            );
            Some(link)
        }
        Ok((status, _)) => {
            error!(
                "cannot publish resource {} for device {}: status {status}",
                link.id, link.device_id
            );
            None
        }
        Err(err) => {
            error!(
                "cannot publish resource {} for device {}: {err}",
                link.id, link.device_id
            );
            None
        }
    }
}

/// Recognized unpublish query keys: exactly one `di`, any number of `ins`.
/// Returns `None` without a device id; non-numeric instance ids are skipped.
fn parse_unpublish_queries(queries: &[String]) -> Option<(String, Vec<i64>)> {
    let mut device_id = None;
    let mut instance_ids = Vec::new();
    for query in queries {
        let Some((key, value)) = query.split_once('=') else {
            continue;
        };
        match key {
            "di" => device_id = Some(value.to_string()),
            "ins" => match value.parse::<i64>() {
                Ok(instance_id) => instance_ids.push(instance_id),
                Err(_) => warn!("ignoring non-numeric instance id {value:?}"),
            },
            _ => {}
        }
    }
    device_id.map(|device_id| (device_id, instance_ids))
}

async fn unpublish(gateway: Arc<Gateway>, rw: ResponseWriter, req: Request) {
    let peer = req.commander.remote_addr();

    // A DELETE on a connection without a session is a protocol-ordering
    // bug, not a malformed request.
    let session = match gateway.clients().find(&peer.to_string()) {
        Some(session) => session,
        None => {
            error!(%peer, "cannot find session");
            return send_response(rw, peer, ResponseType::InternalServerError, &[]);
        }
    };
    let auth_context = session.load_authorization_context();

    let queries = req.queries();
    let (device_id, instance_ids) = match parse_unpublish_queries(&queries) {
        Some(parsed) => parsed,
        None => {
            error!(%peer, ?queries, "incorrect unpublish query string");
            return send_response(rw, peer, ResponseType::BadRequest, &[]);
        }
    };

    let matches = session.get_observed_resources(&device_id, &instance_ids);
    if matches.is_empty() {
        error!(%peer, device = %device_id, ?instance_ids, "no matching resources to unpublish");
        return send_response(rw, peer, ResponseType::BadRequest, &[]);
    }

    let mut unpublished = HashMap::with_capacity(matches.len());
    for link in &matches {
        let removed = unpublish_link(&gateway, &auth_context, link, &device_id).await;
        unpublished.insert(link.id.clone(), removed);
    }
    session.unobserve_resources(&matches, &unpublished);

    // The OCF surface has no partial-failure reporting; failures were
    // logged and their table entries retained for a later retry.
    send_response(rw, peer, ResponseType::Deleted, &[]);
}

async fn unpublish_link(
    gateway: &Gateway,
    auth_context: &AuthorizationContext,
    link: &ResourceLink,
    device_id: &str,
) -> bool {
    let request = UnpublishResourceRequest {
        authorization_context: Some(auth_context.clone()),
        resource_id: link.id.clone(),
        device_id: device_id.to_string(),
    };
    let url = gateway.config().resource_url(uri::UNPUBLISH_RESOURCE);
    match post_proto::<_, UnpublishResourceResponse>(gateway.http_client(), &url, &request).await {
        Ok((200, _)) => {
            info!(
                "resource {} unpublished for device {}",
                link.id, link.device_id
            );
            true
        }
        Ok((status, _)) => {
            error!(
                "cannot unpublish resource {} for device {}: status {status}",
                link.id, link.device_id
            );
            false
        }
        Err(err) => {
            error!(
                "cannot unpublish resource {} for device {}: {err}",
                link.id, link.device_id
            );
            false
        }
    }
}

async fn get_selector(gateway: Arc<Gateway>, rw: ResponseWriter, req: Request) {
    let peer = req.commander.remote_addr();
    if gateway.clients().find(&peer.to_string()).is_none() {
        error!(%peer, "cannot find session");
        return send_response(rw, peer, ResponseType::InternalServerError, &[]);
    }

    // sel 0 asks the device to prefer the cloud resource directory.
    let selector = DirectorySelector::default();
    let payload = match encode_cbor(&selector) {
        Ok(payload) => payload,
        Err(err) => {
            error!(%peer, %err, "cannot marshal selector response");
            return send_response(rw, peer, ResponseType::InternalServerError, &[]);
        }
    };
    send_response(rw, peer, ResponseType::Content, &payload);
}
