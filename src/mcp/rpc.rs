//! JSON-RPC protocol representations and formatting utilities
//!
//! Maps internal `AppError`s onto the server's fixed error-code enumeration.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde_json::{json, Value};

use crate::errors::AppError;

pub const AUTH_REQUIRED_MESSAGE: &str =
    "Authentication required for this endpoint. Please run 'up login' to authenticate with UP CLI.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    UnknownTool,
    AuthRequired,
    AuthFailed,
    SearchFailed,
    MetadataFailed,
    AssetsFailed,
    RepositoriesFailed,
    UnknownResource,
    ResourcesFailed,
}

impl ErrorCode {
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::UnknownTool => -32000,
            Self::AuthRequired => -32001,
            Self::AuthFailed => -32002,
            Self::SearchFailed => -32003,
            Self::MetadataFailed => -32004,
            Self::AssetsFailed => -32005,
            Self::RepositoriesFailed => -32006,
            Self::UnknownResource => -32007,
            Self::ResourcesFailed => -32008,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::ParseError => "parse_error",
            Self::InvalidRequest => "invalid_request",
            Self::MethodNotFound => "method_not_found",
            Self::InvalidParams => "invalid_params",
            Self::InternalError => "internal_error",
            Self::UnknownTool => "unknown_tool",
            Self::AuthRequired => "auth_required",
            Self::AuthFailed => "auth_failed",
            Self::SearchFailed => "search_failed",
            Self::MetadataFailed => "metadata_failed",
            Self::AssetsFailed => "assets_failed",
            Self::RepositoriesFailed => "repositories_failed",
            Self::UnknownResource => "unknown_resource",
            Self::ResourcesFailed => "resources_failed",
        }
    }
}

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

/// Converts an error raised while serving a call. `failure` is the
/// operation-specific code used for upstream and transport failures.
pub fn app_error_to_json_rpc(id: Option<Value>, err: AppError, failure: ErrorCode) -> Value {
    match err {
        AppError::BadRequest { code, message } => json_rpc_error_with_data(
            id,
            ErrorCode::InvalidParams.code(),
            &message,
            Some(json!({
                "code": code,
                "details": {}
            })),
        ),
        AppError::Unauthorized { code, message } => json_rpc_error_with_data(
            id,
            ErrorCode::AuthRequired.code(),
            message,
            Some(json!({ "code": code })),
        ),
        AppError::AuthRequired { message } => json_rpc_error_with_data(
            id,
            ErrorCode::AuthRequired.code(),
            AUTH_REQUIRED_MESSAGE,
            Some(json!({
                "code": ErrorCode::AuthRequired.name(),
                "details": { "reason": message }
            })),
        ),
        AppError::AuthFailed { message } => json_rpc_failure(id, ErrorCode::AuthFailed, &message),
        err @ (AppError::Upstream { .. } | AppError::Transport { .. }) => {
            json_rpc_failure(id, failure, &err.to_string())
        }
        AppError::Internal { code, message } => {
            tracing::error!(error = %message, code, "call failed with internal error");
            json_rpc_error_with_data(
                id,
                ErrorCode::InternalError.code(),
                "Internal error",
                Some(json!({
                    "code": code,
                    "message": message
                })),
            )
        }
    }
}

pub fn json_rpc_failure(id: Option<Value>, code: ErrorCode, message: &str) -> Value {
    json_rpc_error_with_data(id, code.code(), message, Some(json!({ "code": code.name() })))
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let response = JsonrpcErrorResponse::new(
        RpcError {
            code: i64::from(code),
            data,
            message: message.to_string(),
        },
        id.as_ref().and_then(value_to_request_id),
    );
    serde_json::to_value(response).expect("jsonrpc error response serialization")
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        let extra = result.as_object().cloned();
        let response = JsonrpcResultResponse::new(request_id, McpResult { meta: None, extra });
        return serde_json::to_value(response).expect("jsonrpc result response serialization");
    }

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

pub fn request_id_to_value(id: RequestId) -> Value {
    match id {
        RequestId::String(value) => Value::String(value),
        RequestId::Integer(value) => Value::Number(value.into()),
    }
}
