//! HTTP egress to the authorization and resource-directory services.

use std::time::Duration;

use prost::Message;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;

use crate::error::EgressError;
use ocf_gateway_pb::PROTOBUF_CONTENT_TYPE;

/// Build the shared back-end HTTP client.
///
/// One client for the process; connection pooling and reuse live inside it.
/// The 30 second timeout bounds every back-end call so a wedged service
/// cannot pin handler tasks indefinitely.
pub fn http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
}

/// POST a protobuf message and return `(status, decoded_response)`.
///
/// The numeric status is returned for every completed HTTP round trip, 2xx
/// or not; the response body is decoded only on 2xx. Transport failures and
/// undecodable 2xx bodies are errors - callers treat both as a 5xx
/// condition. No retries.
pub async fn post_proto<Req, Resp>(
    client: &reqwest::Client,
    url: &str,
    request: &Req,
) -> Result<(u16, Option<Resp>), EgressError>
where
    Req: Message,
    Resp: Message + Default,
{
    let response = client
        .post(url)
        .header(CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
        .header(ACCEPT, PROTOBUF_CONTENT_TYPE)
        .body(request.encode_to_vec())
        .send()
        .await?;

    let status = response.status();
    debug!(%url, status = status.as_u16(), "back-end response");
    if !status.is_success() {
        return Ok((status.as_u16(), None));
    }

    let body = response.bytes().await?;
    let decoded = Resp::decode(body.as_ref())?;
    Ok((status.as_u16(), Some(decoded)))
}
