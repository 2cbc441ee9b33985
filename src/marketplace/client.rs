use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{
    header::{COOKIE, LOCATION},
    redirect::Policy,
    StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::errors::AppError;
use crate::marketplace::query::{
    composition_request, package_assets_request, package_metadata_request,
    package_resources_request, repositories_request, resource_definition_request,
    resource_examples_request, search_request, ApiRequest, ApiVersion, RepositoryQuery,
    ResourceRef, SearchQuery,
};
use crate::marketplace::types::{
    AssetResponse, Examples, PackageMetadata, PackageResources, RepositoryResponse,
    SearchResponse,
};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const SESSION_COOKIE: &str = "SID";
pub const MAX_REDIRECTS: usize = 10;
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Base URL and session token, always read and replaced as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub base_url: Url,
    pub token: Option<String>,
}

impl Connection {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            token: token.filter(|token| !token.is_empty()),
        })
    }
}

#[async_trait]
pub trait MarketplaceApi: Send + Sync {
    async fn search_packages(&self, query: &SearchQuery) -> Result<SearchResponse, AppError>;

    async fn get_package_metadata(
        &self,
        account: &str,
        repository: &str,
        version: Option<&str>,
        api_version: ApiVersion,
    ) -> Result<PackageMetadata, AppError>;

    async fn get_package_assets(
        &self,
        account: &str,
        repository: &str,
        version: &str,
        asset_type: &str,
    ) -> Result<AssetResponse, AppError>;

    async fn get_repositories(&self, query: &RepositoryQuery)
        -> Result<RepositoryResponse, AppError>;

    async fn get_package_resources(
        &self,
        account: &str,
        repository: &str,
        version: &str,
    ) -> Result<PackageResources, AppError>;

    /// Raw resource definition JSON, passed through unmodified.
    async fn get_resource_definition(&self, resource: &ResourceRef) -> Result<String, AppError>;

    async fn get_resource_examples(&self, resource: &ResourceRef) -> Result<Examples, AppError>;

    /// Raw composition JSON, passed through unmodified.
    async fn get_composition(
        &self,
        resource: &ResourceRef,
        composition: &str,
    ) -> Result<String, AppError>;

    fn connection(&self) -> Arc<Connection>;

    fn reload(&self, connection: Connection);
}

pub struct MarketplaceClient {
    http: reqwest::Client,
    connection: RwLock<Arc<Connection>>,
}

impl MarketplaceClient {
    pub fn new(connection: Connection) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(redirect_policy())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| AppError::internal(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            connection: RwLock::new(Arc::new(connection)),
        })
    }

    async fn send(&self, request: &ApiRequest) -> Result<reqwest::Response, AppError> {
        let connection = self.connection();
        let url = request.to_url(&connection.base_url)?;

        let mut builder = self.http.get(url);
        if let Some(token) = connection.token.as_deref() {
            builder = builder.header(COOKIE, format!("{SESSION_COOKIE}={token}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|err| AppError::transport(format!("failed to execute request: {err}")))?;

        debug!(
            method = "GET",
            path = %request.path(),
            status = response.status().as_u16(),
            "marketplace request completed"
        );

        Ok(response)
    }

    async fn fetch_text(&self, request: &ApiRequest) -> Result<String, AppError> {
        let response = ensure_ok(self.send(request).await?).await?;
        read_body(response).await
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, AppError> {
        let body = self.fetch_text(request).await?;
        serde_json::from_str(&body)
            .map_err(|err| AppError::decode(format!("failed to decode response: {err}")))
    }
}

#[async_trait]
impl MarketplaceApi for MarketplaceClient {
    async fn search_packages(&self, query: &SearchQuery) -> Result<SearchResponse, AppError> {
        self.fetch_json(&search_request(query)).await
    }

    async fn get_package_metadata(
        &self,
        account: &str,
        repository: &str,
        version: Option<&str>,
        api_version: ApiVersion,
    ) -> Result<PackageMetadata, AppError> {
        self.fetch_json(&package_metadata_request(
            account,
            repository,
            version,
            api_version,
        ))
        .await
    }

    async fn get_package_assets(
        &self,
        account: &str,
        repository: &str,
        version: &str,
        asset_type: &str,
    ) -> Result<AssetResponse, AppError> {
        let request = package_assets_request(account, repository, version, asset_type);
        let response = self.send(&request).await?;

        if response.status() == StatusCode::TEMPORARY_REDIRECT {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_default()
                .to_string();
            return Ok(AssetResponse {
                url: location,
                ..AssetResponse::default()
            });
        }

        let body = read_body(ensure_ok(response).await?).await?;
        decode_asset(&body)
    }

    async fn get_repositories(
        &self,
        query: &RepositoryQuery,
    ) -> Result<RepositoryResponse, AppError> {
        let mut response: RepositoryResponse =
            self.fetch_json(&repositories_request(query)).await?;

        for repository in &mut response.repositories {
            if repository.account.is_empty() {
                repository.account = query.account.clone();
            }
        }

        Ok(response)
    }

    async fn get_package_resources(
        &self,
        account: &str,
        repository: &str,
        version: &str,
    ) -> Result<PackageResources, AppError> {
        self.fetch_json(&package_resources_request(account, repository, version))
            .await
    }

    async fn get_resource_definition(&self, resource: &ResourceRef) -> Result<String, AppError> {
        self.fetch_text(&resource_definition_request(resource)).await
    }

    async fn get_resource_examples(&self, resource: &ResourceRef) -> Result<Examples, AppError> {
        self.fetch_json(&resource_examples_request(resource)).await
    }

    async fn get_composition(
        &self,
        resource: &ResourceRef,
        composition: &str,
    ) -> Result<String, AppError> {
        self.fetch_text(&composition_request(resource, composition))
            .await
    }

    fn connection(&self) -> Arc<Connection> {
        self.connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn reload(&self, connection: Connection) {
        *self
            .connection
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(connection);
    }
}

/// Follows redirects like the default client, except on the assets endpoint
/// where a 307 carries the download URL back to the caller.
fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().last().is_some_and(is_assets_url) {
            attempt.stop()
        } else if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    })
}

fn is_assets_url(url: &Url) -> bool {
    let Some(segments) = url.path_segments() else {
        return false;
    };
    let segments = segments.collect::<Vec<_>>();
    segments.len() == 6 && segments[1] == "packages" && segments[5] == "assets"
}

async fn ensure_ok(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(AppError::auth_required(
            "authentication required for this endpoint",
        ));
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppError::upstream(status.as_u16(), body))
}

async fn read_body(response: reqwest::Response) -> Result<String, AppError> {
    response
        .text()
        .await
        .map_err(|err| AppError::transport(format!("failed to read response body: {err}")))
}

/// The assets endpoint answers with one object, an array of them, or `null`.
fn decode_asset(body: &str) -> Result<AssetResponse, AppError> {
    let decode_err =
        |err: serde_json::Error| AppError::decode(format!("failed to decode asset response: {err}"));

    let first = match serde_json::from_str::<Value>(body).map_err(decode_err)? {
        Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
        other => other,
    };

    match first {
        Value::Null => Ok(AssetResponse::default()),
        value => serde_json::from_value(value).map_err(decode_err),
    }
}
