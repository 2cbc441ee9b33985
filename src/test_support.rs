use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::errors::AppError;
use crate::marketplace::client::{Connection, MarketplaceApi};
use crate::marketplace::query::{ApiVersion, RepositoryQuery, ResourceRef, SearchQuery};
use crate::marketplace::types::{
    AssetResponse, Examples, Package, PackageMeta, PackageMetadata, PackageResources,
    Repository, RepositoryResponse, SearchResponse,
};

/// In-memory marketplace that records what it was asked and answers with
/// canned data, or with `error` when set.
#[derive(Default)]
pub struct MockMarketplace {
    pub error: Option<fn() -> AppError>,
    pub searches: Mutex<Vec<SearchQuery>>,
    pub reloads: Mutex<Vec<Connection>>,
}

impl MockMarketplace {
    pub fn failing(error: fn() -> AppError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), AppError> {
        match self.error {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MarketplaceApi for MockMarketplace {
    async fn search_packages(&self, query: &SearchQuery) -> Result<SearchResponse, AppError> {
        self.searches
            .lock()
            .expect("searches lock")
            .push(query.clone());
        self.check()?;

        Ok(SearchResponse {
            packages: vec![Package {
                account: "upbound".to_string(),
                repository: "provider-aws".to_string(),
                tier: "official".to_string(),
                public: true,
                ..Package::default()
            }],
            total: 1,
            ..SearchResponse::default()
        })
    }

    async fn get_package_metadata(
        &self,
        account: &str,
        repository: &str,
        version: Option<&str>,
        _api_version: ApiVersion,
    ) -> Result<PackageMetadata, AppError> {
        self.check()?;
        Ok(PackageMetadata {
            account: account.to_string(),
            repository: repository.to_string(),
            version: version.unwrap_or("v1.0.0").to_string(),
            package_type: "provider".to_string(),
            ..PackageMetadata::default()
        })
    }

    async fn get_package_assets(
        &self,
        _account: &str,
        _repository: &str,
        _version: &str,
        asset_type: &str,
    ) -> Result<AssetResponse, AppError> {
        self.check()?;
        Ok(AssetResponse {
            url: format!("https://assets.example/{asset_type}"),
            ..AssetResponse::default()
        })
    }

    async fn get_repositories(
        &self,
        query: &RepositoryQuery,
    ) -> Result<RepositoryResponse, AppError> {
        self.check()?;
        Ok(RepositoryResponse {
            repositories: vec![Repository {
                account: query.account.clone(),
                name: "configuration-app".to_string(),
                ..Repository::default()
            }],
            count: 1,
            ..RepositoryResponse::default()
        })
    }

    async fn get_package_resources(
        &self,
        account: &str,
        repository: &str,
        _version: &str,
    ) -> Result<PackageResources, AppError> {
        self.check()?;
        Ok(PackageResources {
            meta: PackageMeta {
                account: account.to_string(),
                repository: repository.to_string(),
                ..PackageMeta::default()
            },
            ..PackageResources::default()
        })
    }

    async fn get_resource_definition(&self, resource: &ResourceRef) -> Result<String, AppError> {
        self.check()?;
        Ok(format!(r#"{{"kind":"{}"}}"#, resource.kind))
    }

    async fn get_resource_examples(&self, _resource: &ResourceRef) -> Result<Examples, AppError> {
        self.check()?;
        Ok(Examples {
            examples: vec!["apiVersion: v1\nkind: Example".to_string()],
        })
    }

    async fn get_composition(
        &self,
        _resource: &ResourceRef,
        composition: &str,
    ) -> Result<String, AppError> {
        self.check()?;
        Ok(format!(r#"{{"name":"{composition}"}}"#))
    }

    fn connection(&self) -> Arc<Connection> {
        let reloads = self.reloads.lock().expect("reloads lock");
        Arc::new(match reloads.last() {
            Some(connection) => connection.clone(),
            None => Connection::new("https://api.upbound.io", None).expect("default connection"),
        })
    }

    fn reload(&self, connection: Connection) {
        self.reloads
            .lock()
            .expect("reloads lock")
            .push(connection);
    }
}
