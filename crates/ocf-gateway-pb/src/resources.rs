//! Resource directory command messages.

/// Authorization proof attached to every publish/unpublish command.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AuthorizationContext {
    /// Access token issued at sign-in.
    #[prost(string, tag = "1")]
    pub access_token: String,
    /// Device id the token was issued for.
    #[prost(string, tag = "2")]
    pub device_id: String,
    /// User id the device belongs to.
    #[prost(string, tag = "3")]
    pub user_id: String,
}

/// Resource link policies.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Policy {
    /// OCF policy bitmask; bit 1 marks the resource observable.
    #[prost(int32, tag = "1")]
    pub bit_flags: i32,
}

/// An OCF resource link as registered in the resource directory.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Resource {
    /// Stable resource id, UUIDv5 of `device_id ++ href`.
    #[prost(string, tag = "1")]
    pub id: String,
    /// Path of the resource on the device, with leading slash.
    #[prost(string, tag = "2")]
    pub href: String,
    /// Resource types (`rt`).
    #[prost(string, repeated, tag = "3")]
    pub resource_types: Vec<String>,
    /// Interfaces (`if`).
    #[prost(string, repeated, tag = "4")]
    pub interfaces: Vec<String>,
    /// Owning device id.
    #[prost(string, tag = "5")]
    pub device_id: String,
    /// Instance id assigned by the resource directory on publish.
    #[prost(int64, tag = "6")]
    pub instance_id: i64,
    /// Link policies.
    #[prost(message, optional, tag = "7")]
    pub policies: Option<Policy>,
    /// Media types (`type`).
    #[prost(string, repeated, tag = "8")]
    pub types: Vec<String>,
}

/// Publish command sent to `/api/publish`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PublishResourceRequest {
    /// Caller's authorization proof.
    #[prost(message, optional, tag = "1")]
    pub authorization_context: Option<AuthorizationContext>,
    /// Resource id being published.
    #[prost(string, tag = "2")]
    pub resource_id: String,
    /// Owning device id.
    #[prost(string, tag = "3")]
    pub device_id: String,
    /// The full resource link.
    #[prost(message, optional, tag = "4")]
    pub resource: Option<Resource>,
    /// Registration time to live in seconds.
    #[prost(int32, tag = "5")]
    pub time_to_live: i32,
}

/// Publish response carrying the assigned instance id.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PublishResourceResponse {
    /// Instance id assigned to the published resource.
    #[prost(int64, tag = "1")]
    pub instance_id: i64,
}

/// Unpublish command sent to `/api/unpublish`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnpublishResourceRequest {
    /// Caller's authorization proof.
    #[prost(message, optional, tag = "1")]
    pub authorization_context: Option<AuthorizationContext>,
    /// Resource id being withdrawn.
    #[prost(string, tag = "2")]
    pub resource_id: String,
    /// Owning device id.
    #[prost(string, tag = "3")]
    pub device_id: String,
}

/// Unpublish response; carries no data.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UnpublishResourceResponse {}
