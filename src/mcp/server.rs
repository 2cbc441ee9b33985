//! JSON-RPC dispatcher for the marketplace MCP server
//!
//! Decodes a message, checks its shape against the MCP schema, answers
//! `initialize` with a negotiated protocol version, and hands tool and
//! resource calls to the marketplace domain. Every handled call leaves one
//! audit line with its target and masked params. Both transports share it.

use rust_mcp_sdk::schema::{
    CallToolRequest, Implementation, InitializeRequest, InitializeResult, JsonrpcMessage,
    JsonrpcRequest, ListResourcesRequest, ListResourcesResult, ListToolsRequest, ListToolsResult,
    PingRequest, ReadResourceRequest, ServerCapabilities,
    ServerCapabilitiesResources, ServerCapabilitiesTools,
};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::domain::{
    resources::{build_resources_list, handle_resources_read},
    tools::{build_tools_list, handle_tools_call},
};
use crate::mcp::rpc::{
    app_error_to_json_rpc, is_json_rpc_error, json_rpc_error, json_rpc_result,
    request_id_to_value, ErrorCode,
};
use crate::{errors::AppError, AppState};

/// Oldest first; the last entry is offered to clients asking for anything else.
pub const SUPPORTED_PROTOCOL_VERSIONS: [&str; 3] = ["2024-11-05", "2025-03-26", "2025-06-18"];

pub async fn handle_json_rpc_value(state: &AppState, payload: Value) -> Option<Value> {
    if !payload.is_object() {
        return Some(json_rpc_error(
            None,
            ErrorCode::InvalidRequest.code(),
            "Invalid Request",
        ));
    }

    let request_id = payload.get("id").cloned();
    let parsed: JsonrpcMessage = match serde_json::from_value(payload) {
        Ok(message) => message,
        Err(_) => {
            return Some(json_rpc_error(
                request_id,
                ErrorCode::InvalidRequest.code(),
                "Invalid Request",
            ))
        }
    };

    match parsed {
        JsonrpcMessage::Request(request) => {
            if let Err(error_response) = validate_request_shape(&request) {
                return Some(error_response);
            }

            let request_id = request_id_to_value(request.id);
            if request.method.trim().is_empty() {
                return Some(json_rpc_error(
                    Some(request_id),
                    ErrorCode::InvalidRequest.code(),
                    "Invalid Request",
                ));
            }

            Some(
                handle_json_rpc_request(
                    state,
                    Some(request_id),
                    request.method,
                    request.params.map(Value::Object),
                )
                .await,
            )
        }
        JsonrpcMessage::Notification(notification) => {
            if notification.method.trim().is_empty() {
                return None;
            }

            let _ = handle_json_rpc_request(
                state,
                None,
                notification.method,
                notification.params.map(Value::Object),
            )
            .await;
            None
        }
        JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
            Some(json_rpc_error(
                request_id,
                ErrorCode::InvalidRequest.code(),
                "Invalid Request",
            ))
        }
    }
}

pub fn validate_request_shape(request: &JsonrpcRequest) -> Result<(), Value> {
    let payload = serde_json::to_value(request).expect("jsonrpc request serialization");
    let request_id = Some(request_id_to_value(request.id.clone()));

    let valid = match request.method.as_str() {
        "tools/call" => serde_json::from_value::<CallToolRequest>(payload).is_ok(),
        "resources/read" => serde_json::from_value::<ReadResourceRequest>(payload).is_ok(),
        "tools/list" => serde_json::from_value::<ListToolsRequest>(payload).is_ok(),
        "resources/list" => serde_json::from_value::<ListResourcesRequest>(payload).is_ok(),
        "ping" => serde_json::from_value::<PingRequest>(payload).is_ok(),
        "initialize" => serde_json::from_value::<InitializeRequest>(payload).is_ok(),
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(json_rpc_error(
            request_id,
            ErrorCode::InvalidParams.code(),
            "Invalid params",
        ))
    }
}

pub async fn handle_json_rpc_request(
    state: &AppState,
    id: Option<Value>,
    method: String,
    params: Option<Value>,
) -> Value {
    let audit_params = redact_audit_params(params.as_ref());
    let audit_target = call_target(&method, params.as_ref());

    let response = match method.as_str() {
        "initialize" => {
            let protocol_version = match negotiate_protocol_version(params.as_ref()) {
                Ok(version) => version,
                Err(err) => return app_error_to_json_rpc(id, err, ErrorCode::InvalidParams),
            };

            let initialize_result = InitializeResult {
                server_info: Implementation {
                    name: env!("CARGO_PKG_NAME").to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    title: None,
                    description: None,
                    icons: vec![],
                    website_url: None,
                },
                capabilities: ServerCapabilities {
                    tools: Some(ServerCapabilitiesTools {
                        list_changed: Some(false),
                    }),
                    resources: Some(ServerCapabilitiesResources {
                        subscribe: Some(false),
                        list_changed: Some(false),
                    }),
                    prompts: None,
                    ..Default::default()
                },
                protocol_version,
                instructions: None,
                meta: None,
            };

            json_rpc_result(
                id,
                serde_json::to_value(initialize_result).expect("initialize result serialization"),
            )
        }
        "ping" => json_rpc_result(id, json!({})),
        "tools/list" => json_rpc_result(
            id,
            serde_json::to_value(ListToolsResult {
                meta: None,
                next_cursor: None,
                tools: build_tools_list(),
            })
            .expect("tools list result serialization"),
        ),
        "tools/call" => handle_tools_call(state, id, params).await,
        "resources/list" => json_rpc_result(
            id,
            serde_json::to_value(ListResourcesResult {
                meta: None,
                next_cursor: None,
                resources: build_resources_list(),
            })
            .expect("resources list result serialization"),
        ),
        "resources/read" => handle_resources_read(state, id, params).await,
        _ => json_rpc_error(id, ErrorCode::MethodNotFound.code(), "Method not found"),
    };

    info!(
        method = %method,
        target = audit_target.as_deref().unwrap_or("-"),
        params = %audit_params,
        outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
        "mcp call handled"
    );

    response
}

/// Tool name for `tools/call`, URI for `resources/read`.
fn call_target(method: &str, params: Option<&Value>) -> Option<String> {
    let key = match method {
        "tools/call" => "name",
        "resources/read" => "uri",
        _ => return None,
    };
    params
        .and_then(|params| params.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Echoes a supported client version, otherwise answers with the newest one
/// this server speaks.
pub fn negotiate_protocol_version(params: Option<&Value>) -> Result<String, AppError> {
    let offered_version = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_protocol_version",
                "initialize params.protocolVersion is required",
            )
        })?;

    if SUPPORTED_PROTOCOL_VERSIONS.contains(&offered_version) {
        return Ok(offered_version.to_string());
    }

    let latest = SUPPORTED_PROTOCOL_VERSIONS[SUPPORTED_PROTOCOL_VERSIONS.len() - 1];
    debug!(
        offered = offered_version,
        answered = latest,
        "client offered unsupported protocol version"
    );
    Ok(latest.to_string())
}

/// Copy of the call params for the audit line, with the UP session and any
/// credential-looking values masked.
pub fn redact_audit_params(params: Option<&Value>) -> Value {
    params.map(mask_credentials).unwrap_or(Value::Null)
}

fn mask_credentials(value: &Value) -> Value {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| {
                let masked = if is_sensitive_key(key) {
                    Value::String(REDACTED.to_string())
                } else {
                    mask_credentials(item)
                };
                (key.clone(), masked)
            })
            .collect(),
        Value::Array(items) => items.iter().map(mask_credentials).collect(),
        other => other.clone(),
    }
}

const REDACTED: &str = "[REDACTED]";

/// Substrings that mark a key as carrying a secret. `session` and `cookie`
/// cover the UP CLI session id forwarded as the `SID` cookie.
const SENSITIVE_KEY_FRAGMENTS: [&str; 6] =
    ["token", "secret", "password", "credential", "session", "cookie"];

pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.trim().to_ascii_lowercase();
    matches!(
        key.as_str(),
        "sid" | "authorization" | "bearer" | "api_key" | "apikey"
    ) || SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| key.contains(fragment))
}
