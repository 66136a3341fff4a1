//! Sign-in handler (`/oic/sec/session`).

use std::sync::Arc;

use coap_lite::{MessageClass, RequestType, ResponseType};
use ocf_gateway_coap::{Request, ResponseWriter};
use ocf_gateway_pb::auth::{SignInRequest, SignInResponse};
use ocf_gateway_pb::resources::AuthorizationContext;
use ocf_gateway_pb::uri;
use tracing::{error, info};

use crate::code_map::http_code_to_coap;
use crate::codec::{decode_cbor, encode_cbor, send_response};
use crate::egress::post_proto;
use crate::server::Gateway;

// https://github.com/openconnectivityfoundation/security/blob/master/oic.r.session.raml
pub(crate) async fn handle(gateway: Arc<Gateway>, rw: ResponseWriter, req: Request) {
    let peer = req.commander.remote_addr();
    match req.code() {
        MessageClass::Request(RequestType::Post) => post(gateway, rw, req).await,
        _ => {
            error!(%peer, "forbidden request");
            send_response(rw, peer, ResponseType::Forbidden, &[]);
        }
    }
}

fn validate(request: &SignInRequest) -> Result<(), &'static str> {
    if request.device_id.is_empty() {
        return Err("invalid device id");
    }
    if request.access_token.is_empty() {
        return Err("invalid access token");
    }
    if request.user_id.is_empty() {
        return Err("invalid user id");
    }
    Ok(())
}

fn authorization_context(request: &SignInRequest) -> AuthorizationContext {
    AuthorizationContext {
        access_token: request.access_token.clone(),
        device_id: request.device_id.clone(),
        user_id: request.user_id.clone(),
    }
}

async fn post(gateway: Arc<Gateway>, rw: ResponseWriter, req: Request) {
    let peer = req.commander.remote_addr();

    let sign_in: SignInRequest = match decode_cbor(req.payload()) {
        Ok(request) => request,
        Err(err) => {
            error!(%peer, %err, "cannot unmarshal sign-in request");
            return send_response(rw, peer, ResponseType::BadRequest, &[]);
        }
    };
    if let Err(reason) = validate(&sign_in) {
        error!(%peer, reason, "invalid sign-in request");
        return send_response(rw, peer, ResponseType::BadRequest, &[]);
    }

    let url = gateway.config().auth_url(uri::SIGN_IN);
    let outcome =
        post_proto::<_, SignInResponse>(gateway.http_client(), &url, &sign_in).await;
    let (status, response) = match outcome {
        Ok(exchange) => exchange,
        Err(err) => {
            error!(%peer, %err, "cannot sign in against the authorization service");
            return send_response(rw, peer, ResponseType::InternalServerError, &[]);
        }
    };

    let code = http_code_to_coap(status, MessageClass::Request(RequestType::Post));
    info!(%peer, ?code, "authorization service sign-in response");
    if code != ResponseType::Changed {
        return send_response(rw, peer, code, &[]);
    }

    let payload = match encode_cbor(&response.unwrap_or_default()) {
        Ok(payload) => payload,
        Err(err) => {
            error!(%peer, %err, "cannot marshal sign-in response");
            return send_response(rw, peer, ResponseType::InternalServerError, &[]);
        }
    };

    // The connection may have died while the back-end call was in flight;
    // without a session there is nowhere to hang the authorization context.
    let session = match gateway.clients().find(&peer.to_string()) {
        Some(session) => session,
        None => {
            error!(%peer, "cannot find session to store authorization context");
            return send_response(rw, peer, ResponseType::BadRequest, &[]);
        }
    };
    session.store_authorization_context(authorization_context(&sign_in));

    send_response(rw, peer, code, &payload);
}
