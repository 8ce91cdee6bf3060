//! JSON-RPC envelopes and the build server request payloads.

use std::process;

use buildlink_types::{BuildTargetIdentifier, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const JSONRPC_VERSION: &str = "2.0";
pub const METHOD_NOT_FOUND: i64 = -32601;

const BSP_VERSION: &str = "2.1.0";

#[derive(Debug, Serialize)]
pub(crate) struct Request<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> Request<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> Notification<'a> {
    pub fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// Reply to a server-initiated request we do not serve.
pub(crate) fn method_not_found(id: &Value, method: &str) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {
            "code": METHOD_NOT_FOUND,
            "message": format!("Method not found: {method}"),
        }
    })
}

/// One inbound frame, classified.
#[derive(Debug)]
pub(crate) enum IncomingFrame {
    Response { id: u64, body: Value },
    ServerRequest { id: Value, method: String },
    Notification { method: String, params: Option<Value> },
}

pub(crate) fn parse_incoming(frame: &Value) -> Option<IncomingFrame> {
    let id = frame.get("id").filter(|id| !id.is_null());
    let method = frame.get("method").and_then(Value::as_str);
    let is_response = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method) {
        (Some(id), None) if is_response => Some(IncomingFrame::Response {
            id: id.as_u64()?,
            body: frame.clone(),
        }),
        (Some(id), Some(method)) => Some(IncomingFrame::ServerRequest {
            id: id.clone(),
            method: method.to_string(),
        }),
        (None, Some(method)) => Some(IncomingFrame::Notification {
            method: method.to_string(),
            params: frame.get("params").cloned(),
        }),
        _ => None,
    }
}

/// Payload of `build/initialize`.
pub(crate) fn initialize_params(root_uri: &str) -> Value {
    json!({
        "displayName": "buildlink",
        "version": env!("CARGO_PKG_VERSION"),
        "bspVersion": BSP_VERSION,
        "rootUri": root_uri,
        "capabilities": {
            "languageIds": ["java"]
        },
        "data": {
            "processId": process::id()
        }
    })
}

/// One entry of `workspace/buildTargets`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTarget {
    pub id: BuildTargetIdentifier,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub base_directory: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub language_ids: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<BuildTargetIdentifier>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WorkspaceBuildTargetsResult {
    pub targets: Vec<BuildTarget>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompileParams<'a> {
    pub targets: &'a [BuildTargetIdentifier],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompileResult {
    pub status_code: StatusCode,
}
