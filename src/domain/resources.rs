//! Model Context Protocol static resource providers
//!
//! Exposes a curated package listing and a repositories hint under
//! `marketplace://` URIs.

use rust_mcp_sdk::schema::{
    ReadResourceContent, ReadResourceRequestParams, ReadResourceResult, Resource,
    TextResourceContents,
};
use serde_json::Value;

use crate::domain::format::format_search_results;
use crate::domain::utils::DEFAULT_PAGE_SIZE;
use crate::marketplace::query::SearchQuery;
use crate::mcp::rpc::{
    app_error_to_json_rpc, json_rpc_error, json_rpc_failure, json_rpc_result, ErrorCode,
};
use crate::AppState;

pub const PACKAGES_RESOURCE_URI: &str = "marketplace://packages";
pub const REPOSITORIES_RESOURCE_URI: &str = "marketplace://repositories";

const REPOSITORIES_HINT: &str =
    "To read repositories, use the get_repositories tool with a specific account name.";

pub fn build_resources_list() -> Vec<Resource> {
    vec![
        Resource {
            annotations: None,
            description: Some("Search and browse packages in the Upbound Marketplace".to_string()),
            icons: vec![],
            meta: None,
            mime_type: Some("text/markdown".to_string()),
            name: "Marketplace Packages".to_string(),
            size: None,
            title: None,
            uri: PACKAGES_RESOURCE_URI.to_string(),
        },
        Resource {
            annotations: None,
            description: Some("Browse repositories in the Upbound Marketplace".to_string()),
            icons: vec![],
            meta: None,
            mime_type: Some("text/plain".to_string()),
            name: "Marketplace Repositories".to_string(),
            size: None,
            title: None,
            uri: REPOSITORIES_RESOURCE_URI.to_string(),
        },
    ]
}

/// Public packages from the official tier, first page only.
pub fn featured_packages_query() -> SearchQuery {
    SearchQuery {
        tier: "official".to_string(),
        public: Some(true),
        size: DEFAULT_PAGE_SIZE,
        ..SearchQuery::default()
    }
}

pub async fn handle_resources_read(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, ErrorCode::InvalidParams.code(), "Invalid params");
    };

    let resource_read: ReadResourceRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, ErrorCode::InvalidParams.code(), "Invalid params"),
    };

    match resource_read.uri.as_str() {
        PACKAGES_RESOURCE_URI => {
            match state
                .marketplace
                .search_packages(&featured_packages_query())
                .await
            {
                Ok(result) => text_contents(
                    id,
                    PACKAGES_RESOURCE_URI,
                    "text/markdown",
                    format_search_results(&result),
                ),
                Err(err) => app_error_to_json_rpc(id, err, ErrorCode::SearchFailed),
            }
        }
        REPOSITORIES_RESOURCE_URI => text_contents(
            id,
            REPOSITORIES_RESOURCE_URI,
            "text/plain",
            REPOSITORIES_HINT.to_string(),
        ),
        uri => json_rpc_failure(
            id,
            ErrorCode::UnknownResource,
            &format!("Unknown resource: {uri}"),
        ),
    }
}

fn text_contents(id: Option<Value>, uri: &str, mime_type: &str, text: String) -> Value {
    let result = serde_json::to_value(ReadResourceResult {
        contents: vec![ReadResourceContent::from(TextResourceContents {
            meta: None,
            mime_type: Some(mime_type.to_string()),
            text,
            uri: uri.to_string(),
        })],
        meta: None,
    })
    .expect("read resource result serialization");

    json_rpc_result(id, result)
}
