//! Shared harness for the gateway integration tests: mock back-end
//! services speaking protobuf over HTTP, a gateway on an ephemeral port,
//! and JSON<->CBOR fixture conversion.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use coap_lite::{ContentFormat, Packet, RequestType};
use prost::Message;

use ocf_gateway::config::{KeepaliveConfig, Network, Protocol};
use ocf_gateway::{Config, Gateway};
use ocf_gateway_coap::{packet, ClientCommander};
use ocf_gateway_pb::auth::{SignInResponse, SignUpResponse};
use ocf_gateway_pb::resources::PublishResourceResponse;

const PROTOBUF: &str = "application/protobuf";

/// Request counters of a mock back-end.
#[derive(Default)]
pub struct BackendHits {
    pub sign_up: AtomicUsize,
    pub sign_in: AtomicUsize,
    pub publish: AtomicUsize,
    pub unpublish: AtomicUsize,
}

/// Mock authorization service: `/signup` answers with a fixed token for
/// user `0`, `/signin` with a one-second expiry.
pub async fn spawn_auth_server() -> (SocketAddr, Arc<BackendHits>) {
    let hits = Arc::new(BackendHits::default());

    let sign_up_hits = hits.clone();
    let sign_in_hits = hits.clone();
    let app = Router::new()
        .route(
            "/signup",
            post(move |_body: Bytes| {
                let hits = sign_up_hits.clone();
                async move {
                    hits.sign_up.fetch_add(1, Ordering::SeqCst);
                    let response = SignUpResponse {
                        access_token: "abc".into(),
                        user_id: "0".into(),
                        ..Default::default()
                    };
                    proto_response(response)
                }
            }),
        )
        .route(
            "/signin",
            post(move |_body: Bytes| {
                let hits = sign_in_hits.clone();
                async move {
                    hits.sign_in.fetch_add(1, Ordering::SeqCst);
                    proto_response(SignInResponse { expires_in: 1 })
                }
            }),
        );

    (serve(app).await, hits)
}

/// Mock resource directory: `/api/publish` assigns incrementing instance
/// ids from zero, `/api/unpublish` always succeeds.
pub async fn spawn_resource_server() -> (SocketAddr, Arc<BackendHits>) {
    let hits = Arc::new(BackendHits::default());
    let instance_ids = Arc::new(AtomicI64::new(0));

    let publish_hits = hits.clone();
    let unpublish_hits = hits.clone();
    let app = Router::new()
        .route(
            "/api/publish",
            post(move |_body: Bytes| {
                let hits = publish_hits.clone();
                let instance_ids = instance_ids.clone();
                async move {
                    hits.publish.fetch_add(1, Ordering::SeqCst);
                    let response = PublishResourceResponse {
                        instance_id: instance_ids.fetch_add(1, Ordering::SeqCst),
                    };
                    proto_response(response)
                }
            }),
        )
        .route(
            "/api/unpublish",
            post(move |_body: Bytes| {
                let hits = unpublish_hits.clone();
                async move {
                    hits.unpublish.fetch_add(1, Ordering::SeqCst);
                    proto_response(ocf_gateway_pb::resources::UnpublishResourceResponse {})
                }
            }),
        );

    (serve(app).await, hits)
}

fn proto_response<T: Message>(message: T) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, PROTOBUF)],
        message.encode_to_vec(),
    )
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Gateway over plain TCP on an ephemeral port, pointed at the mocks.
pub async fn spawn_gateway(
    auth_addr: SocketAddr,
    resource_addr: SocketAddr,
) -> (Arc<Gateway>, SocketAddr) {
    let config = Config {
        addr: "127.0.0.1:0".to_string(),
        network: Network::Tcp,
        auth_host: auth_addr.to_string(),
        auth_protocol: Protocol::Http,
        resource_host: resource_addr.to_string(),
        resource_protocol: Protocol::Http,
        keepalive: KeepaliveConfig {
            time: Duration::from_secs(3600),
            interval: Duration::from_secs(5),
            retry: 5,
        },
        tls: None,
    };
    let gateway = Gateway::new(config).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serving = gateway.clone();
    tokio::spawn(async move {
        let _ = serving.serve_tcp(listener).await;
    });
    (gateway, addr)
}

/// Exchange a CBOR-bodied request and return the reply.
pub async fn exchange_cbor(
    commander: &ClientCommander,
    method: RequestType,
    path: &str,
    payload: Vec<u8>,
    queries: &[&str],
) -> Packet {
    let mut request = commander.new_request(method, path);
    if !payload.is_empty() {
        packet::set_content_format(&mut request, ContentFormat::ApplicationCBOR);
        request.payload = payload;
    }
    for query in queries {
        packet::add_uri_query(&mut request, query);
    }
    tokio::time::timeout(Duration::from_secs(10), commander.exchange(request))
        .await
        .expect("request timed out")
        .expect("exchange failed")
}

/// Encode a JSON fixture as the CBOR the device would send.
pub fn json_to_cbor(json: &str) -> Vec<u8> {
    let value: serde_json::Value = serde_json::from_str(json).unwrap();
    let mut out = Vec::new();
    ciborium::into_writer(&value, &mut out).unwrap();
    out
}

/// Decode a CBOR reply into JSON for comparison.
pub fn cbor_to_json(payload: &[u8]) -> serde_json::Value {
    ciborium::from_reader(payload).unwrap()
}
