//! CBOR payload codec and reply writing.

use ciborium::{from_reader, into_writer};
use coap_lite::{ContentFormat, ResponseType};
use ocf_gateway_coap::ResponseWriter;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::error;

use crate::error::CodecError;

/// Decode a CoAP payload as CBOR.
pub fn decode_cbor<T: DeserializeOwned>(payload: &[u8]) -> Result<T, CodecError> {
    from_reader(payload).map_err(|err| CodecError::Decode(err.to_string()))
}

/// Encode a value as CBOR.
pub fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    into_writer(value, &mut out).map_err(|err| CodecError::Encode(err.to_string()))?;
    Ok(out)
}

/// Reply with `code` and an optional CBOR payload.
///
/// A non-empty payload gets the `application/cbor` content format. Write
/// failures are logged and swallowed; the CoAP stack decides what the peer
/// sees from a dead channel.
pub fn send_response(mut rw: ResponseWriter, peer: std::net::SocketAddr, code: ResponseType, payload: &[u8]) {
    rw.set_code(code);
    if !payload.is_empty() {
        rw.set_content_format(ContentFormat::ApplicationCBOR);
    }
    if let Err(err) = rw.write(payload) {
        error!(%peer, %err, "cannot send reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rejects_garbage() {
        let err = decode_cbor::<ocf_gateway_pb::auth::SignUpRequest>(b"\xff\xff\xff");
        assert!(err.is_err());
    }

    #[test]
    fn roundtrip() {
        let request = ocf_gateway_pb::auth::SignUpRequest {
            device_id: "abc".into(),
            authorization_code: "123".into(),
            authorization_provider: String::new(),
        };
        let bytes = encode_cbor(&request).unwrap();
        let decoded: ocf_gateway_pb::auth::SignUpRequest = decode_cbor(&bytes).unwrap();
        assert_eq!(decoded, request);
    }
}
