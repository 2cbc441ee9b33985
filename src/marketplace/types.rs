use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Treats an explicit JSON `null` like a missing field. The backend emits
/// `null` for empty lists and unset strings.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub packages: Vec<Package>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Package {
    #[serde(deserialize_with = "null_as_default")]
    pub account: String,
    #[serde(deserialize_with = "null_as_default")]
    pub repository: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub package_type: String,
    pub public: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub tier: String,
    pub stars: u64,
    pub downloads: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageMetadata {
    #[serde(deserialize_with = "null_as_default")]
    pub account: String,
    #[serde(deserialize_with = "null_as_default")]
    pub repository: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub package_type: String,
    pub public: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub tier: String,
    pub stars: u64,
    pub downloads: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub versions: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub latest_version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub documentation: String,
    #[serde(deserialize_with = "null_as_default")]
    pub homepage: String,
    #[serde(deserialize_with = "null_as_default")]
    pub license: String,
    #[serde(deserialize_with = "null_as_default")]
    pub dependencies: Vec<Dependency>,
    #[serde(deserialize_with = "null_as_default")]
    pub crds: Vec<Crd>,
    #[serde(deserialize_with = "null_as_default")]
    pub examples: Vec<Example>,
    #[serde(deserialize_with = "null_as_default")]
    pub compositions: Vec<Composition>,
    #[serde(deserialize_with = "null_as_default")]
    pub functions: Vec<Function>,
    #[serde(deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dependency {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub constraints: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Crd {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub group: String,
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub plural: String,
    #[serde(deserialize_with = "null_as_default")]
    pub singular: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub schema: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Example {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
    /// Content syntax, e.g. `yaml` or `json`.
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub syntax: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Composition {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(deserialize_with = "null_as_default")]
    pub resources: Vec<CompositionResource>,
    #[serde(deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionResource {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub resource_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub base: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Function {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub image: String,
    #[serde(deserialize_with = "null_as_default")]
    pub metadata: Map<String, Value>,
}

/// An asset is either inline `content` or a download `url`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetResponse {
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub url: String,
    #[serde(
        skip_serializing_if = "String::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub content: String,
    #[serde(
        rename = "type",
        skip_serializing_if = "String::is_empty",
        deserialize_with = "null_as_default"
    )]
    pub content_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RepositoryResponse {
    #[serde(deserialize_with = "null_as_default")]
    pub repositories: Vec<Repository>,
    #[serde(alias = "total")]
    pub count: u64,
    pub page: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Repository {
    #[serde(deserialize_with = "null_as_default")]
    pub account: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub repository_type: String,
    pub public: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub policy: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub package_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrdMeta {
    #[serde(deserialize_with = "null_as_default")]
    pub group: String,
    #[serde(deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub versions: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub storage_version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub scope: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XrdMeta {
    #[serde(deserialize_with = "null_as_default")]
    pub group: String,
    #[serde(deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub versions: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub referenceable_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionMeta {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "resourceCount")]
    pub resource_count: u64,
    #[serde(rename = "xrdApiVersion", deserialize_with = "null_as_default")]
    pub xrd_api_version: String,
    #[serde(rename = "xrdKind", deserialize_with = "null_as_default")]
    pub xrd_kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageMeta {
    #[serde(deserialize_with = "null_as_default")]
    pub account: String,
    #[serde(deserialize_with = "null_as_default")]
    pub repository: String,
    #[serde(deserialize_with = "null_as_default")]
    pub repo_key: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub package_type: String,
    pub public: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub tier: String,
    #[serde(deserialize_with = "null_as_default")]
    pub pkg_digest: String,
    pub family_repo_key: Option<String>,
    pub family_count: Option<u64>,
    #[serde(rename = "highlight", deserialize_with = "null_as_default")]
    pub highlights: BTreeMap<String, Vec<String>>,
}

/// Package metadata extended with the resources the package ships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageResources {
    #[serde(flatten)]
    pub meta: PackageMeta,
    #[serde(rename = "customResourceDefinitions", deserialize_with = "null_as_default")]
    pub crds: Vec<CrdMeta>,
    #[serde(rename = "compositeResourceDefinitions", deserialize_with = "null_as_default")]
    pub xrds: Vec<XrdMeta>,
    #[serde(deserialize_with = "null_as_default")]
    pub compositions: Vec<CompositionMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Examples {
    #[serde(deserialize_with = "null_as_default")]
    pub examples: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_accepts_null_fields() {
        let response: SearchResponse = serde_json::from_str(
            r#"{"packages":[{"account":"upbound","repository":"x","tags":null,"description":null,"metadata":null}],"total":1}"#,
        )
        .expect("null fields decode");

        assert_eq!(response.total, 1);
        assert_eq!(response.packages[0].account, "upbound");
        assert!(response.packages[0].tags.is_empty());
        assert!(response.packages[0].description.is_empty());
    }

    #[test]
    fn package_metadata_accepts_null_lists() {
        let metadata: PackageMetadata = serde_json::from_str(
            r#"{"account":"upbound","repository":"provider-aws","crds":null,"versions":null,"dependencies":null,"license":null,"examples":[{"name":"bucket","type":null,"content":null}]}"#,
        )
        .expect("null fields decode");

        assert!(metadata.crds.is_empty());
        assert!(metadata.versions.is_empty());
        assert!(metadata.license.is_empty());
        assert_eq!(metadata.examples[0].name, "bucket");
        assert!(metadata.examples[0].syntax.is_empty());
    }

    #[test]
    fn repositories_and_resources_accept_null_fields() {
        let repositories: RepositoryResponse = serde_json::from_str(
            r#"{"repositories":[{"name":"provider-aws","description":null,"policy":null}],"count":1}"#,
        )
        .expect("null fields decode");
        assert_eq!(repositories.repositories[0].name, "provider-aws");

        let resources: PackageResources = serde_json::from_str(
            r#"{"account":"upbound","highlight":null,"customResourceDefinitions":[{"kind":"Bucket","versions":null}],"compositions":null}"#,
        )
        .expect("null fields decode");
        assert_eq!(resources.meta.account, "upbound");
        assert_eq!(resources.crds[0].kind, "Bucket");
        assert!(resources.crds[0].versions.is_empty());
    }
}
