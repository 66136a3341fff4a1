//! Well-known CBOR payloads of the resource directory surface.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ocf_gateway_pb::resources as pb;

/// Resource directory publish envelope (`oic/rd` POST payload).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WkRd {
    /// Publishing device id.
    #[serde(rename = "di", default)]
    pub device_id: String,
    /// Links being published.
    #[serde(rename = "links", default)]
    pub links: Vec<ResourceLink>,
    /// Registration time to live in seconds.
    #[serde(rename = "ttl", default)]
    pub time_to_live: i64,
}

impl WkRd {
    /// Envelope is acceptable iff device id, links, and ttl are all present.
    pub fn is_valid(&self) -> bool {
        !self.device_id.is_empty() && !self.links.is_empty() && self.time_to_live > 0
    }
}

/// One OCF resource link as carried in the publish envelope. Metadata the
/// gateway does not interpret (`rt`, `if`, `type`) is preserved round-trip,
/// nulls included.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceLink {
    /// Owning device id.
    #[serde(rename = "di", default)]
    pub device_id: String,
    /// Path of the resource on the device.
    #[serde(rename = "href", default)]
    pub href: String,
    /// Stable resource id, assigned by the gateway at publish.
    #[serde(rename = "id", default)]
    pub id: String,
    /// Interfaces.
    #[serde(rename = "if", default)]
    pub interfaces: Option<Vec<String>>,
    /// Instance id, assigned by the resource directory at publish.
    #[serde(rename = "ins", default)]
    pub instance_id: i64,
    /// Link policies.
    #[serde(rename = "p", default)]
    pub policies: Option<Policy>,
    /// Resource types.
    #[serde(rename = "rt", default)]
    pub resource_types: Option<Vec<String>>,
    /// Media types.
    #[serde(rename = "type", default)]
    pub types: Option<Vec<String>>,
}

/// Link policies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    /// OCF policy bitmask.
    #[serde(rename = "bm", default)]
    pub bit_flags: i64,
}

/// Bit advertising observability in the policy bitmask.
const OBSERVABLE: i64 = 2;

impl ResourceLink {
    /// Whether the link advertises observability.
    pub fn is_observable(&self) -> bool {
        self.policies
            .as_ref()
            .map(|policy| policy.bit_flags & OBSERVABLE == OBSERVABLE)
            .unwrap_or(false)
    }

    /// Protobuf form for the resource directory RPCs.
    pub fn to_proto(&self) -> pb::Resource {
        pb::Resource {
            id: self.id.clone(),
            href: self.href.clone(),
            resource_types: self.resource_types.clone().unwrap_or_default(),
            interfaces: self.interfaces.clone().unwrap_or_default(),
            device_id: self.device_id.clone(),
            instance_id: self.instance_id,
            policies: self.policies.as_ref().map(|policy| pb::Policy {
                bit_flags: policy.bit_flags as i32,
            }),
            types: self.types.clone().unwrap_or_default(),
        }
    }
}

/// Stable resource id: UUIDv5 of `device_id ++ href` in the URL namespace.
/// Deterministic across runs and platforms.
pub fn resource_id(device_id: &str, href: &str) -> String {
    let name = format!("{device_id}{href}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// `oic/rd` GET selector payload; `sel: 0` asks devices to prefer the
/// cloud resource directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectorySelector {
    /// Selection criteria.
    #[serde(rename = "sel", default)]
    pub selection_criteria: i64,
}
