//! HTTP status to CoAP response code mapping.

use coap_lite::{MessageClass, RequestType, ResponseType};

/// Map an HTTP status and the CoAP method that triggered the call to the
/// CoAP response code the device receives.
///
/// Total over all inputs: anything without a CoAP equivalent, including a
/// 200 for a method with no success mapping, collapses to 5.00.
pub fn http_code_to_coap(status: u16, method: MessageClass) -> ResponseType {
    match status {
        100 => ResponseType::Continue,
        200 => match method {
            MessageClass::Request(RequestType::Post) => ResponseType::Changed,
            MessageClass::Request(RequestType::Get) => ResponseType::Content,
            MessageClass::Request(RequestType::Put) => ResponseType::Created,
            MessageClass::Request(RequestType::Delete) => ResponseType::Deleted,
            _ => ResponseType::InternalServerError,
        },
        201 => ResponseType::Created,
        400 => ResponseType::BadRequest,
        401 => ResponseType::Unauthorized,
        403 => ResponseType::Forbidden,
        404 => ResponseType::NotFound,
        405 => ResponseType::MethodNotAllowed,
        406 => ResponseType::NotAcceptable,
        412 => ResponseType::PreconditionFailed,
        413 => ResponseType::RequestEntityTooLarge,
        415 => ResponseType::UnsupportedContentFormat,
        501 => ResponseType::NotImplemented,
        502 => ResponseType::BadGateway,
        503 => ResponseType::ServiceUnavailable,
        504 => ResponseType::GatewayTimeout,
        _ => ResponseType::InternalServerError,
    }
}
