//! Sign-up handler (`/oic/sec/account`).

use std::sync::Arc;

use coap_lite::{MessageClass, RequestType, ResponseType};
use ocf_gateway_coap::{Request, ResponseWriter};
use ocf_gateway_pb::auth::{SignUpRequest, SignUpResponse};
use ocf_gateway_pb::uri;
use tracing::{error, info};

use crate::code_map::http_code_to_coap;
use crate::codec::{decode_cbor, encode_cbor, send_response};
use crate::egress::post_proto;
use crate::server::Gateway;

// https://github.com/openconnectivityfoundation/security/blob/master/oic.r.account.raml
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

fn validate(request: &SignUpRequest) -> Result<(), &'static str> {
    if request.device_id.is_empty() {
        return Err("invalid device id");
    }
    if request.authorization_code.is_empty() {
        return Err("invalid authorization code");
    }
    Ok(())
}

async fn post(gateway: Arc<Gateway>, rw: ResponseWriter, req: Request) {
    let peer = req.commander.remote_addr();

    let sign_up: SignUpRequest = match decode_cbor(req.payload()) {
        Ok(request) => request,
        Err(err) => {
            error!(%peer, %err, "cannot unmarshal sign-up request");
            return send_response(rw, peer, ResponseType::BadRequest, &[]);
        }
    };
    if let Err(reason) = validate(&sign_up) {
        error!(%peer, reason, "invalid sign-up request");
        return send_response(rw, peer, ResponseType::BadRequest, &[]);
    }

    let url = gateway.config().auth_url(uri::SIGN_UP);
    let outcome =
        post_proto::<_, SignUpResponse>(gateway.http_client(), &url, &sign_up).await;
    let (status, response) = match outcome {
        Ok(exchange) => exchange,
        Err(err) => {
            error!(%peer, %err, "cannot sign up against the authorization service");
            return send_response(rw, peer, ResponseType::InternalServerError, &[]);
        }
    };

    let code = http_code_to_coap(status, MessageClass::Request(RequestType::Post));
    info!(%peer, ?code, "authorization service sign-up response");
    if code != ResponseType::Changed {
        return send_response(rw, peer, code, &[]);
    }

    let payload = match encode_cbor(&response.unwrap_or_default()) {
        Ok(payload) => payload,
        Err(err) => {
            error!(%peer, %err, "cannot marshal sign-up response");
            return send_response(rw, peer, ResponseType::InternalServerError, &[]);
        }
    };
    send_response(rw, peer, ResponseType::Changed, &payload);
}
