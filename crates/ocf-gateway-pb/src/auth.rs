//! Authorization service messages.
//!
//! The CBOR attribute names come from the OCF `oic.r.account` and
//! `oic.r.session` resource definitions; note that the account resource
//! transports the authorization code under the `accesstoken` key.

use serde::{Deserialize, Serialize};

/// Device sign-up request (`/oic/sec/account` POST, forwarded to `/signup`).
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct SignUpRequest {
    /// Device id.
    #[prost(string, tag = "1")]
    #[serde(rename = "di", default)]
    pub device_id: String,
    /// Authorization code obtained out of band.
    #[prost(string, tag = "2")]
    #[serde(rename = "accesstoken", default)]
    pub authorization_code: String,
    /// Authorization provider that issued the code.
    #[prost(string, tag = "3")]
    #[serde(rename = "authprovider", default)]
    pub authorization_provider: String,
}

/// Sign-up response returned to the device.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct SignUpResponse {
    /// Access token for subsequent sign-ins.
    #[prost(string, tag = "1")]
    #[serde(rename = "accesstoken", default)]
    pub access_token: String,
    /// Token lifetime in seconds.
    #[prost(int64, tag = "2")]
    #[serde(rename = "expiresin", default)]
    pub expires_in: i64,
    /// Redirect URI for re-provisioning, when set.
    #[prost(string, tag = "3")]
    #[serde(rename = "redirecturi", default)]
    pub redirect_uri: String,
    /// Refresh token.
    #[prost(string, tag = "4")]
    #[serde(rename = "refreshtoken", default)]
    pub refresh_token: String,
    /// User id the device was registered under.
    #[prost(string, tag = "5")]
    #[serde(rename = "uid", default)]
    pub user_id: String,
}

/// Device sign-in request (`/oic/sec/session` POST, forwarded to `/signin`).
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct SignInRequest {
    /// Device id.
    #[prost(string, tag = "1")]
    #[serde(rename = "di", default)]
    pub device_id: String,
    /// User id.
    #[prost(string, tag = "2")]
    #[serde(rename = "uid", default)]
    pub user_id: String,
    /// Access token issued at sign-up.
    #[prost(string, tag = "3")]
    #[serde(rename = "accesstoken", default)]
    pub access_token: String,
}

/// Sign-in response returned to the device.
#[derive(Clone, PartialEq, ::prost::Message, Serialize, Deserialize)]
pub struct SignInResponse {
    /// Remaining token lifetime in seconds.
    #[prost(int64, tag = "1")]
    #[serde(rename = "expiresin", default)]
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn sign_up_roundtrip() {
        let req = SignUpRequest {
            device_id: "d1".into(),
            authorization_code: "code".into(),
            authorization_provider: String::new(),
        };
        let bytes = req.encode_to_vec();
        let decoded = SignUpRequest::decode(bytes.as_slice()).unwrap();
        assert_eq!(req, decoded);
    }

    #[test]
    fn sign_up_request_uses_ocf_keys() {
        let req: SignUpRequest =
            serde_json::from_str(r#"{"di":"abc","accesstoken":"123"}"#).unwrap();
        assert_eq!(req.device_id, "abc");
        assert_eq!(req.authorization_code, "123");
    }

    #[test]
    fn sign_up_response_serializes_all_fields() {
        let resp = SignUpResponse {
            access_token: "abc".into(),
            user_id: "0".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "accesstoken": "abc",
                "expiresin": 0,
                "redirecturi": "",
                "refreshtoken": "",
                "uid": "0",
            })
        );
    }

    #[test]
    fn sign_in_request_rejects_numeric_token() {
        let err = serde_json::from_str::<SignInRequest>(r#"{"di":"abc","accesstoken":123}"#);
        assert!(err.is_err());
    }
}
