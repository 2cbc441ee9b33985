//! Interactive tools exposed via Model Context Protocol
//!
//! Each tool validates its arguments, translates them into a marketplace
//! call through the `MarketplaceApi` held in `AppState`, and renders the
//! response as Markdown text.

use std::sync::Arc;

use rust_mcp_sdk::{
    macros,
    schema::{CallToolRequestParams, CallToolResult, ContentBlock, TextContent, Tool},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::format::{
    format_asset, format_examples, format_package_metadata, format_package_resources,
    format_repositories, format_search_results,
};
use crate::domain::utils::{
    normalize_asset_type, normalize_page_size, optional_segment, require_segment,
    MAX_REPOSITORY_PAGE_SIZE, MAX_SEARCH_PAGE_SIZE,
};
use crate::marketplace::client::Connection;
use crate::marketplace::query::{ApiVersion, RepositoryQuery, ResourceRef, SearchQuery};
use crate::mcp::rpc::{
    app_error_to_json_rpc, json_rpc_error, json_rpc_failure, json_rpc_result, ErrorCode,
};
use crate::{errors::AppError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
    pub family: Option<String>,
    pub package_type: Option<String>,
    pub account_name: Option<String>,
    pub tier: Option<String>,
    pub public: Option<bool>,
    pub starred: Option<bool>,
    #[serde(rename = "type", alias = "resource_type")]
    pub resource_type: Option<String>,
    pub size: Option<u32>,
    pub page: Option<u32>,
    pub use_v1: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MetadataParams {
    pub account: Option<String>,
    pub repository: Option<String>,
    pub version: Option<String>,
    pub use_v1: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssetsParams {
    pub account: Option<String>,
    pub repository: Option<String>,
    pub version: Option<String>,
    pub asset_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepositoriesParams {
    pub account: Option<String>,
    pub filter: Option<String>,
    pub size: Option<u32>,
    pub page: Option<u32>,
    pub use_v1: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PackageVersionParams {
    pub account: Option<String>,
    pub repository: Option<String>,
    pub version: Option<String>,
}

/// Shared by the single-resource tools; `composition_name` is only read by
/// `get_package_composition`.
#[derive(Debug, Default, Deserialize)]
pub struct ResourceParams {
    pub account: Option<String>,
    pub repository: Option<String>,
    pub version: Option<String>,
    pub resource_group: Option<String>,
    pub resource_kind: Option<String>,
    pub composition_name: Option<String>,
}

#[macros::mcp_tool(
    name = "search_packages",
    description = "Search for packages in the Upbound Marketplace"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct SearchPackagesTool {
    /// Free-text search term
    pub query: Option<String>,
    /// Package family key, e.g. `upbound-provider-aws`
    pub family: Option<String>,
    /// Package type: provider, configuration or function
    pub package_type: Option<String>,
    /// Restrict results to one account
    pub account_name: Option<String>,
    /// Package tier: official, partner or community
    pub tier: Option<String>,
    /// Only public (true) or only private (false) packages
    pub public: Option<bool>,
    /// Only packages starred by the current user
    pub starred: Option<bool>,
    /// Resource type filter
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
    /// Results per page (default 20, max 500, 0 leaves it to the marketplace)
    pub size: Option<u32>,
    /// Zero-based page index
    pub page: Option<u32>,
    /// Use the legacy v1 API
    pub use_v1: Option<bool>,
}

#[macros::mcp_tool(
    name = "get_package_metadata",
    description = "Get detailed metadata for a marketplace package"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetPackageMetadataTool {
    pub account: String,
    pub repository: String,
    /// Specific package version; defaults to the latest
    pub version: Option<String>,
    /// Use the legacy v1 API
    pub use_v1: Option<bool>,
}

#[macros::mcp_tool(
    name = "get_package_assets",
    description = "Get an asset (docs, icon, readme, releaseNotes, sbom) for a package version"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetPackageAssetsTool {
    pub account: String,
    pub repository: String,
    pub version: String,
    /// One of: docs, icon, readme, releaseNotes, sbom
    pub asset_type: String,
}

#[macros::mcp_tool(
    name = "get_repositories",
    description = "List repositories owned by an account"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetRepositoriesTool {
    pub account: String,
    /// Filter expression, applied by the v2 API only
    pub filter: Option<String>,
    /// Results per page (default 20, max 100, 0 leaves it to the marketplace)
    pub size: Option<u32>,
    /// Zero-based page index
    pub page: Option<u32>,
    /// Use the legacy v1 API
    pub use_v1: Option<bool>,
}

#[macros::mcp_tool(
    name = "reload_auth",
    description = "Reload credentials and server URL from the UP CLI configuration"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ReloadAuthTool {}

#[macros::mcp_tool(
    name = "get_package_resources",
    description = "List the CRDs, XRDs and compositions shipped in a package version"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetPackageResourcesTool {
    pub account: String,
    pub repository: String,
    pub version: String,
}

#[macros::mcp_tool(
    name = "get_package_resource",
    description = "Get the full definition of one resource kind in a package version"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetPackageResourceTool {
    pub account: String,
    pub repository: String,
    pub version: String,
    /// API group, e.g. `s3.aws.upbound.io`
    pub resource_group: String,
    /// Resource kind, e.g. `Bucket`
    pub resource_kind: String,
}

#[macros::mcp_tool(
    name = "get_package_resource_examples",
    description = "Get example manifests for one resource kind in a package version"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetPackageResourceExamplesTool {
    pub account: String,
    pub repository: String,
    pub version: String,
    pub resource_group: String,
    pub resource_kind: String,
}

#[macros::mcp_tool(
    name = "get_package_composition",
    description = "Get a composition that implements a composite resource in a package version"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetPackageCompositionTool {
    pub account: String,
    pub repository: String,
    pub version: String,
    pub resource_group: String,
    pub resource_kind: String,
    pub composition_name: String,
}

pub fn build_tools_list() -> Vec<Tool> {
    vec![
        SearchPackagesTool::tool(),
        GetPackageMetadataTool::tool(),
        GetPackageAssetsTool::tool(),
        GetRepositoriesTool::tool(),
        ReloadAuthTool::tool(),
        GetPackageResourcesTool::tool(),
        GetPackageResourceTool::tool(),
        GetPackageResourceExamplesTool::tool(),
        GetPackageCompositionTool::tool(),
    ]
}

pub fn build_search_query(params: SearchParams) -> Result<SearchQuery, AppError> {
    Ok(SearchQuery {
        query: text_arg(params.query),
        family: text_arg(params.family),
        package_type: text_arg(params.package_type),
        account_name: text_arg(params.account_name),
        tier: text_arg(params.tier),
        public: params.public,
        starred: params.starred,
        resource_type: text_arg(params.resource_type),
        size: normalize_page_size(params.size, MAX_SEARCH_PAGE_SIZE)?,
        page: params.page.unwrap_or(0),
        api_version: ApiVersion::from_legacy_flag(params.use_v1.unwrap_or(false)),
    })
}

pub fn build_repository_query(params: RepositoriesParams) -> Result<RepositoryQuery, AppError> {
    Ok(RepositoryQuery {
        account: require_segment(params.account, "account")?,
        filter: text_arg(params.filter),
        size: normalize_page_size(params.size, MAX_REPOSITORY_PAGE_SIZE)?,
        page: params.page.unwrap_or(0),
        api_version: ApiVersion::from_legacy_flag(params.use_v1.unwrap_or(false)),
    })
}

pub fn build_resource_ref(params: &ResourceParams) -> Result<ResourceRef, AppError> {
    Ok(ResourceRef {
        account: require_segment(params.account.clone(), "account")?,
        repository: require_segment(params.repository.clone(), "repository")?,
        version: require_segment(params.version.clone(), "version")?,
        group: require_segment(params.resource_group.clone(), "resource_group")?,
        kind: require_segment(params.resource_kind.clone(), "resource_kind")?,
    })
}

pub async fn handle_tools_call(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, ErrorCode::InvalidParams.code(), "Invalid params");
    };

    let CallToolRequestParams {
        name, arguments, ..
    } = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, ErrorCode::InvalidParams.code(), "Invalid params"),
    };

    let (outcome, failure) = match name.as_str() {
        "search_packages" => (search_packages(state, arguments).await, ErrorCode::SearchFailed),
        "get_package_metadata" => (
            get_package_metadata(state, arguments).await,
            ErrorCode::MetadataFailed,
        ),
        "get_package_assets" => (
            get_package_assets(state, arguments).await,
            ErrorCode::AssetsFailed,
        ),
        "get_repositories" => (
            get_repositories(state, arguments).await,
            ErrorCode::RepositoriesFailed,
        ),
        "reload_auth" => (reload_auth(state).await, ErrorCode::AuthFailed),
        "get_package_resources" => (
            get_package_resources(state, arguments).await,
            ErrorCode::ResourcesFailed,
        ),
        "get_package_resource" => (
            get_package_resource(state, arguments).await,
            ErrorCode::ResourcesFailed,
        ),
        "get_package_resource_examples" => (
            get_package_resource_examples(state, arguments).await,
            ErrorCode::ResourcesFailed,
        ),
        "get_package_composition" => (
            get_package_composition(state, arguments).await,
            ErrorCode::ResourcesFailed,
        ),
        other => {
            return json_rpc_failure(id, ErrorCode::UnknownTool, &format!("Unknown tool: {other}"))
        }
    };

    match outcome {
        Ok(text) => text_result(id, text),
        Err(err) => app_error_to_json_rpc(id, err, failure),
    }
}

async fn search_packages(
    state: &AppState,
    arguments: Option<Map<String, Value>>,
) -> Result<String, AppError> {
    let query = build_search_query(parse_arguments(arguments)?)?;
    let result = state.marketplace.search_packages(&query).await?;
    Ok(format_search_results(&result))
}

async fn get_package_metadata(
    state: &AppState,
    arguments: Option<Map<String, Value>>,
) -> Result<String, AppError> {
    let params: MetadataParams = parse_arguments(arguments)?;
    let account = require_segment(params.account, "account")?;
    let repository = require_segment(params.repository, "repository")?;
    let version = optional_segment(params.version, "version")?;
    let api_version = ApiVersion::from_legacy_flag(params.use_v1.unwrap_or(false));

    let metadata = state
        .marketplace
        .get_package_metadata(&account, &repository, version.as_deref(), api_version)
        .await?;
    Ok(format_package_metadata(&metadata))
}

async fn get_package_assets(
    state: &AppState,
    arguments: Option<Map<String, Value>>,
) -> Result<String, AppError> {
    let params: AssetsParams = parse_arguments(arguments)?;
    let account = require_segment(params.account, "account")?;
    let repository = require_segment(params.repository, "repository")?;
    let version = require_segment(params.version, "version")?;
    let asset_type = normalize_asset_type(params.asset_type)?;

    let asset = state
        .marketplace
        .get_package_assets(&account, &repository, &version, &asset_type)
        .await?;
    Ok(format_asset(&asset, &asset_type))
}

async fn get_repositories(
    state: &AppState,
    arguments: Option<Map<String, Value>>,
) -> Result<String, AppError> {
    let query = build_repository_query(parse_arguments(arguments)?)?;
    let result = state.marketplace.get_repositories(&query).await?;
    Ok(format_repositories(&result))
}

/// Reads the server URL and session from the UP CLI config and swaps both
/// into the marketplace client in one step.
async fn reload_auth(state: &AppState) -> Result<String, AppError> {
    let credentials = Arc::clone(&state.credentials);
    let (server_url, token, profile) = tokio::task::spawn_blocking(move || {
        let server_url = credentials.current_server_url().map_err(|err| {
            AppError::auth_failed(format!(
                "Failed to load server URL from UP CLI profile: {err}"
            ))
        })?;
        let token = credentials.current_token().map_err(|err| {
            AppError::auth_failed(format!("Failed to load authentication from UP CLI: {err}"))
        })?;
        let profile = credentials.current_profile().map_err(|err| {
            AppError::auth_failed(format!("Failed to get current profile: {err}"))
        })?;
        Ok::<_, AppError>((server_url, token, profile))
    })
    .await
    .map_err(|err| AppError::internal(format!("credential reload task failed: {err}")))??;

    let connection = Connection::new(&server_url, Some(token.access_token)).map_err(|err| {
        AppError::auth_failed(format!("Invalid server URL '{server_url}': {err}"))
    })?;

    state.marketplace.reload(connection);
    tracing::info!(profile = %profile.id, server = %server_url, "reloaded marketplace credentials");

    Ok(format!(
        "Authentication and server configuration reloaded successfully!\nProfile: '{}' ({})\nServer: {}",
        profile.id, profile.organization, server_url
    ))
}

async fn get_package_resources(
    state: &AppState,
    arguments: Option<Map<String, Value>>,
) -> Result<String, AppError> {
    let params: PackageVersionParams = parse_arguments(arguments)?;
    let account = require_segment(params.account, "account")?;
    let repository = require_segment(params.repository, "repository")?;
    let version = require_segment(params.version, "version")?;

    let resources = state
        .marketplace
        .get_package_resources(&account, &repository, &version)
        .await?;
    Ok(format_package_resources(&resources))
}

async fn get_package_resource(
    state: &AppState,
    arguments: Option<Map<String, Value>>,
) -> Result<String, AppError> {
    let params: ResourceParams = parse_arguments(arguments)?;
    let resource = build_resource_ref(&params)?;
    state.marketplace.get_resource_definition(&resource).await
}

async fn get_package_resource_examples(
    state: &AppState,
    arguments: Option<Map<String, Value>>,
) -> Result<String, AppError> {
    let params: ResourceParams = parse_arguments(arguments)?;
    let resource = build_resource_ref(&params)?;
    let examples = state.marketplace.get_resource_examples(&resource).await?;
    Ok(format_examples(&examples, &resource.group, &resource.kind))
}

async fn get_package_composition(
    state: &AppState,
    arguments: Option<Map<String, Value>>,
) -> Result<String, AppError> {
    let params: ResourceParams = parse_arguments(arguments)?;
    let resource = build_resource_ref(&params)?;
    let composition = require_segment(params.composition_name, "composition_name")?;
    state.marketplace.get_composition(&resource, &composition).await
}

fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<Map<String, Value>>,
) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(arguments.unwrap_or_default())).map_err(|err| {
        AppError::bad_request("invalid_arguments", format!("Invalid arguments: {err}"))
    })
}

fn text_arg(value: Option<String>) -> String {
    value.map(|value| value.trim().to_string()).unwrap_or_default()
}

fn text_result(id: Option<Value>, text: String) -> Value {
    json_rpc_result(
        id,
        serde_json::to_value(CallToolResult {
            content: vec![ContentBlock::from(TextContent::new(text, None, None))],
            is_error: None,
            meta: None,
            structured_content: None,
        })
        .expect("tool result serialization"),
    )
}
