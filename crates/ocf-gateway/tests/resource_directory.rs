//! Resource directory end-to-end tests: publish, unpublish, selector, and
//! observation side effects.

mod common;

use std::sync::atomic::Ordering;

use coap_lite::{CoapOption, ContentFormat, MessageClass, Packet, RequestType, ResponseType};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use ocf_gateway_coap::{packet, Client};

use common::*;

#[tokio::test]
async fn publish_rejects_bad_envelopes() {
    let (auth_addr, _) = spawn_auth_server().await;
    let (resource_addr, hits) = spawn_resource_server().await;
    let (_gateway, addr) = spawn_gateway(auth_addr, resource_addr).await;
    let device = Client::connect(&addr.to_string()).await.unwrap();

    let fixtures = [
        r#"{ "di":"a" }"#,
        r#"{ "di":"a", "links":"abc" }"#,
        r#"{ "di":"a", "links":[ "abc" ]}"#,
        r#"{ "di":"a", "links":[ {} ]}"#,
        r#"{ "di":"a", "links":[ { "href":"" } ]}"#,
        r#"{ "di":"", "links":[ { "di":"a", "href":"/a" } ], "ttl":12345}"#,
        r#"{ "di":"a", "links":[ { "di":"a", "href":"/a" } ], "ttl":0}"#,
    ];
    for fixture in fixtures {
        let reply = exchange_cbor(
            &device,
            RequestType::Post,
            "oic/rd",
            json_to_cbor(fixture),
            &[],
        )
        .await;
        assert_eq!(
            reply.header.code,
            MessageClass::Response(ResponseType::BadRequest),
            "fixture {fixture}"
        );
    }
    assert_eq!(hits.publish.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn publish_happy_path_assigns_ids() {
    let (auth_addr, _) = spawn_auth_server().await;
    let (resource_addr, hits) = spawn_resource_server().await;
    let (_gateway, addr) = spawn_gateway(auth_addr, resource_addr).await;
    let device = Client::connect(&addr.to_string()).await.unwrap();

    let reply = exchange_cbor(
        &device,
        RequestType::Post,
        "oic/rd",
        json_to_cbor(r#"{ "di":"a", "links":[ { "di":"a", "href":"/a" } ], "ttl":12345}"#),
        &[],
    )
    .await;
    assert_eq!(
        reply.header.code,
        MessageClass::Response(ResponseType::Changed)
    );
    assert_eq!(
        cbor_to_json(&reply.payload),
        serde_json::json!({
            "di": "a",
            "links": [{
                "di": "a",
                "href": "/a",
                "id": "b2c5f775-9a6f-5d5b-a82a-eaa1d23f0629",
                "if": null,
                "ins": 0,
                "p": null,
                "rt": null,
                "type": null,
            }],
            "ttl": 12345,
        })
    );
    assert_eq!(hits.publish.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn publish_preserves_link_metadata() {
    let (auth_addr, _) = spawn_auth_server().await;
    let (resource_addr, _) = spawn_resource_server().await;
    let (_gateway, addr) = spawn_gateway(auth_addr, resource_addr).await;
    let device = Client::connect(&addr.to_string()).await.unwrap();

    let reply = exchange_cbor(
        &device,
        RequestType::Post,
        "oic/rd",
        json_to_cbor(r#"{ "di":"b", "links":[ { "di":"b", "href":"/c", "p": {"bm":2} } ], "ttl":12345}"#),
        &[],
    )
    .await;
    assert_eq!(
        reply.header.code,
        MessageClass::Response(ResponseType::Changed)
    );
    assert_eq!(
        cbor_to_json(&reply.payload),
        serde_json::json!({
            "di": "b",
            "links": [{
                "di": "b",
                "href": "/c",
                "id": "a2ccb45a-a892-515c-b153-79d1b903cc31",
                "if": null,
                "ins": 0,
                "p": {"bm": 2},
                "rt": null,
                "type": null,
            }],
            "ttl": 12345,
        })
    );
}

#[tokio::test]
async fn publish_drops_links_without_href() {
    let (auth_addr, _) = spawn_auth_server().await;
    let (resource_addr, hits) = spawn_resource_server().await;
    let (_gateway, addr) = spawn_gateway(auth_addr, resource_addr).await;
    let device = Client::connect(&addr.to_string()).await.unwrap();

    let reply = exchange_cbor(
        &device,
        RequestType::Post,
        "oic/rd",
        json_to_cbor(
            r#"{ "di":"a", "links":[ { "di":"a", "href":"/a" }, { "di":"a", "href":"" } ], "ttl":12345}"#,
        ),
        &[],
    )
    .await;
    assert_eq!(
        reply.header.code,
        MessageClass::Response(ResponseType::Changed)
    );

    let body = cbor_to_json(&reply.payload);
    let links = body["links"].as_array().unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0]["href"], "/a");
    assert_eq!(hits.publish.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unpublish_by_instance_empties_the_table() {
    let (auth_addr, _) = spawn_auth_server().await;
    let (resource_addr, hits) = spawn_resource_server().await;
    let (_gateway, addr) = spawn_gateway(auth_addr, resource_addr).await;
    let device = Client::connect(&addr.to_string()).await.unwrap();

    let reply = exchange_cbor(
        &device,
        RequestType::Post,
        "oic/rd",
        json_to_cbor(r#"{ "di":"a", "links":[ { "di":"a", "href":"/a" } ], "ttl":12345}"#),
        &[],
    )
    .await;
    let body = cbor_to_json(&reply.payload);
    let instance_id = body["links"][0]["ins"].as_i64().unwrap();

    let reply = exchange_cbor(
        &device,
        RequestType::Delete,
        "oic/rd",
        Vec::new(),
        &["di=a", &format!("ins={instance_id}")],
    )
    .await;
    assert_eq!(
        reply.header.code,
        MessageClass::Response(ResponseType::Deleted)
    );
    assert!(reply.payload.is_empty());
    assert_eq!(hits.unpublish.load(Ordering::SeqCst), 1);

    // the table entry is gone, so the same unpublish finds nothing
    let reply = exchange_cbor(
        &device,
        RequestType::Delete,
        "oic/rd",
        Vec::new(),
        &["di=a", &format!("ins={instance_id}")],
    )
    .await;
    assert_eq!(
        reply.header.code,
        MessageClass::Response(ResponseType::BadRequest)
    );
    assert_eq!(hits.unpublish.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unpublish_requires_device_id() {
    let (auth_addr, _) = spawn_auth_server().await;
    let (resource_addr, _) = spawn_resource_server().await;
    let (_gateway, addr) = spawn_gateway(auth_addr, resource_addr).await;
    let device = Client::connect(&addr.to_string()).await.unwrap();

    let reply = exchange_cbor(
        &device,
        RequestType::Delete,
        "oic/rd",
        Vec::new(),
        &["ins=1"],
    )
    .await;
    assert_eq!(
        reply.header.code,
        MessageClass::Response(ResponseType::BadRequest)
    );
}

#[tokio::test]
async fn unpublish_of_unknown_resources_is_rejected() {
    let (auth_addr, _) = spawn_auth_server().await;
    let (resource_addr, _) = spawn_resource_server().await;
    let (_gateway, addr) = spawn_gateway(auth_addr, resource_addr).await;
    let device = Client::connect(&addr.to_string()).await.unwrap();

    let reply = exchange_cbor(
        &device,
        RequestType::Delete,
        "oic/rd",
        Vec::new(),
        &["di=ghost", "ins=7"],
    )
    .await;
    assert_eq!(
        reply.header.code,
        MessageClass::Response(ResponseType::BadRequest)
    );
}

#[tokio::test]
async fn get_returns_the_cloud_selector() {
    let (auth_addr, _) = spawn_auth_server().await;
    let (resource_addr, _) = spawn_resource_server().await;
    let (_gateway, addr) = spawn_gateway(auth_addr, resource_addr).await;
    let device = Client::connect(&addr.to_string()).await.unwrap();

    let reply = exchange_cbor(&device, RequestType::Get, "oic/rd", Vec::new(), &[]).await;
    assert_eq!(
        reply.header.code,
        MessageClass::Response(ResponseType::Content)
    );
    assert_eq!(cbor_to_json(&reply.payload), serde_json::json!({ "sel": 0 }));
}

#[tokio::test]
async fn put_on_the_directory_is_forbidden() {
    let (auth_addr, _) = spawn_auth_server().await;
    let (resource_addr, _) = spawn_resource_server().await;
    let (_gateway, addr) = spawn_gateway(auth_addr, resource_addr).await;
    let device = Client::connect(&addr.to_string()).await.unwrap();

    let reply = exchange_cbor(
        &device,
        RequestType::Put,
        "oic/rd",
        json_to_cbor(r#"{}"#),
        &[],
    )
    .await;
    assert_eq!(
        reply.header.code,
        MessageClass::Response(ResponseType::Forbidden)
    );
}

async fn read_raw_packet(stream: &mut TcpStream) -> Packet {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.unwrap();
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut body = vec![0u8; len];
    stream.read_exact(&mut body).await.unwrap();
    Packet::from_bytes(&body).unwrap()
}

async fn write_raw_packet(stream: &mut TcpStream, packet: Packet) {
    let bytes = packet.to_bytes().unwrap();
    stream
        .write_all(&(bytes.len() as u32).to_be_bytes())
        .await
        .unwrap();
    stream.write_all(&bytes).await.unwrap();
}

/// The publish reply must be on the wire before the observe registration
/// for an observable link; a raw connection exposes the frame order.
#[tokio::test]
async fn publish_replies_before_observing() {
    let (auth_addr, _) = spawn_auth_server().await;
    let (resource_addr, _) = spawn_resource_server().await;
    let (_gateway, addr) = spawn_gateway(auth_addr, resource_addr).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut request = Packet::new();
    request.header.set_type(coap_lite::MessageType::Confirmable);
    request.header.code = MessageClass::Request(RequestType::Post);
    request.header.message_id = 1;
    request.set_token(vec![0xAA]);
    packet::set_uri_path(&mut request, "oic/rd");
    packet::set_content_format(&mut request, ContentFormat::ApplicationCBOR);
    request.payload = json_to_cbor(
        r#"{ "di":"a", "links":[ { "di":"a", "href":"/a", "p": {"bm":2} } ], "ttl":12345}"#,
    );
    write_raw_packet(&mut stream, request).await;

    let first = read_raw_packet(&mut stream).await;
    assert_eq!(
        first.header.code,
        MessageClass::Response(ResponseType::Changed),
        "the publish reply must come first"
    );
    assert_eq!(first.get_token().to_vec(), vec![0xAA]);

    let second = read_raw_packet(&mut stream).await;
    assert_eq!(
        second.header.code,
        MessageClass::Request(RequestType::Get),
        "the observe registration follows the reply"
    );
    assert_eq!(packet::uri_path(&second), "a");
    assert!(second.get_option(CoapOption::Observe).is_some());
}
