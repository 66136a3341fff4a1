//! Small helpers over [`coap_lite::Packet`] for the options this crate
//! routes on: Uri-Path, Uri-Query, Content-Format, and Observe.

use std::collections::LinkedList;

use coap_lite::{CoapOption, ContentFormat, Packet};

/// Joined Uri-Path segments, without a leading slash.
pub fn uri_path(packet: &Packet) -> String {
    match packet.get_option(CoapOption::UriPath) {
        Some(segments) => segments
            .iter()
            .map(|segment| String::from_utf8_lossy(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/"),
        None => String::new(),
    }
}

/// Replace the Uri-Path options with the segments of `path`.
pub fn set_uri_path(packet: &mut Packet, path: &str) {
    let segments: LinkedList<Vec<u8>> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.as_bytes().to_vec())
        .collect();
    packet.set_option(CoapOption::UriPath, segments);
}

/// Uri-Query options as `key=value` strings, in wire order.
pub fn uri_queries(packet: &Packet) -> Vec<String> {
    match packet.get_option(CoapOption::UriQuery) {
        Some(queries) => queries
            .iter()
            .map(|query| String::from_utf8_lossy(query).into_owned())
            .collect(),
        None => Vec::new(),
    }
}

/// Append one Uri-Query option.
pub fn add_uri_query(packet: &mut Packet, query: &str) {
    packet.add_option(CoapOption::UriQuery, query.as_bytes().to_vec());
}

/// Set the Content-Format option, minimally encoded.
pub fn set_content_format(packet: &mut Packet, format: ContentFormat) {
    let value = usize::from(format) as u16;
    let encoded = if value == 0 {
        Vec::new()
    } else if value < 256 {
        vec![value as u8]
    } else {
        value.to_be_bytes().to_vec()
    };
    packet.set_option(CoapOption::ContentFormat, [encoded].into_iter().collect());
}

/// Set the Observe option: register (0, empty encoding) or deregister (1).
pub fn set_observe(packet: &mut Packet, register: bool) {
    let value = if register { Vec::new() } else { vec![1] };
    packet.set_option(CoapOption::Observe, [value].into_iter().collect());
}

/// One-line packet summary for debug logging.
pub fn summary(packet: &Packet) -> String {
    format!(
        "code={:?} type={:?} mid={} token={:02x?} path={:?} payload={}B",
        packet.header.code,
        packet.header.get_type(),
        packet.header.message_id,
        packet.get_token(),
        uri_path(packet),
        packet.payload.len(),
    )
}
