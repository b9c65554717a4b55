//! PowerStrip protocol envelope.

use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The only protocol version this adapter speaks.
pub const POWERSTRIP_PROTOCOL_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookType {
    PreHook,
    PostHook,
}

impl HookType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreHook => "pre-hook",
            Self::PostHook => "post-hook",
        }
    }
}

impl FromStr for HookType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre-hook" => Ok(Self::PreHook),
            "post-hook" => Ok(Self::PostHook),
            other => Err(SchemaError::UnsupportedHook(other.to_owned())),
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClientRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub request: String,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "ServerIP", default)]
    pub server_ip: String,
    #[serde(default)]
    pub server_port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerResponse {
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub code: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowerstripRequest {
    #[serde(rename = "Type", default)]
    pub hook_type: String,
    #[serde(default)]
    pub powerstrip_protocol_version: u32,
    #[serde(default)]
    pub client_request: ClientRequest,
    #[serde(default)]
    pub server_response: ServerResponse,
}

impl PowerstripRequest {
    pub fn hook(&self) -> Result<HookType, SchemaError> {
        self.hook_type.parse()
    }
}

/// Decode an envelope and reject any protocol version other than ours.
pub fn decode_request(body: &[u8]) -> Result<PowerstripRequest, SchemaError> {
    let request: PowerstripRequest = serde_json::from_slice(body)?;
    if request.powerstrip_protocol_version != POWERSTRIP_PROTOCOL_VERSION {
        return Err(SchemaError::UnsupportedVersion {
            got: request.powerstrip_protocol_version,
        });
    }
    Ok(request)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PreHookResponse {
    pub powerstrip_protocol_version: u32,
    pub modified_client_request: ClientRequest,
}

impl PreHookResponse {
    pub fn new(request: ClientRequest) -> Self {
        Self {
            powerstrip_protocol_version: POWERSTRIP_PROTOCOL_VERSION,
            modified_client_request: request,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PostHookResponse {
    pub powerstrip_protocol_version: u32,
    pub modified_server_response: ServerResponse,
}

impl PostHookResponse {
    pub fn new(response: ServerResponse) -> Self {
        Self {
            powerstrip_protocol_version: POWERSTRIP_PROTOCOL_VERSION,
            modified_server_response: response,
        }
    }
}
