//! Translation of logical marketplace queries into backend requests
//!
//! The backend exposes two revisions of its REST surface. v1 takes discrete
//! named query parameters; v2 folds equality filters into a single AIP-160
//! `filter` expression. Both paths are pure: no I/O happens here.

use std::collections::BTreeMap;

use url::{form_urlencoded, Url};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    #[default]
    V2,
}

impl ApiVersion {
    pub fn from_legacy_flag(use_v1: bool) -> Self {
        if use_v1 {
            Self::V1
        } else {
            Self::V2
        }
    }

    pub fn segment(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub family: String,
    pub package_type: String,
    pub account_name: String,
    pub tier: String,
    pub public: Option<bool>,
    pub starred: Option<bool>,
    pub resource_type: String,
    pub size: u32,
    pub page: u32,
    pub api_version: ApiVersion,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryQuery {
    pub account: String,
    pub filter: String,
    pub size: u32,
    pub page: u32,
    pub api_version: ApiVersion,
}

/// A backend GET request: unencoded path segments plus a query map with
/// set semantics (setting a key twice keeps the last value).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiRequest {
    segments: Vec<String>,
    query: BTreeMap<&'static str, String>,
}

impl ApiRequest {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            query: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, key: &'static str, value: impl Into<String>) {
        self.query.insert(key, value.into());
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &BTreeMap<&'static str, String> {
        &self.query
    }

    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    pub fn query_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter().map(|(key, value)| (*key, value.as_str())))
            .finish()
    }

    /// Joins the request onto `base`, percent-encoding every path segment.
    pub fn to_url(&self, base: &Url) -> Result<Url, AppError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::transport(format!("base URL '{base}' cannot carry a path")))?
            .pop_if_empty()
            .extend(&self.segments);

        if self.query.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&self.query_string()));
        }

        Ok(url)
    }
}

pub fn search_request(query: &SearchQuery) -> ApiRequest {
    let mut request = ApiRequest::new([query.api_version.segment(), "search"]);

    let filters = [
        ("query", &query.query),
        ("family", &query.family),
        ("packageType", &query.package_type),
        ("accountName", &query.account_name),
        ("tier", &query.tier),
    ];

    match query.api_version {
        ApiVersion::V1 => {
            for (field, value) in filters {
                if !value.is_empty() {
                    request.set(field, value.as_str());
                }
            }
        }
        ApiVersion::V2 => {
            let clauses = filters
                .iter()
                .filter(|(_, value)| !value.is_empty())
                .map(|(field, value)| format!("{field} = '{}'", quote_literal(value)))
                .collect::<Vec<_>>();
            if !clauses.is_empty() {
                request.set("filter", clauses.join(" AND "));
            }
        }
    }

    set_paging(&mut request, query.size, query.page);
    if let Some(public) = query.public {
        request.set("public", public.to_string());
    }
    if query.starred == Some(true) {
        request.set("starred", "true");
    }
    if !query.resource_type.is_empty() {
        request.set("type", query.resource_type.as_str());
    }

    request
}

pub fn repositories_request(query: &RepositoryQuery) -> ApiRequest {
    let mut request = ApiRequest::new([
        query.api_version.segment(),
        "repositories",
        query.account.as_str(),
    ]);

    set_paging(&mut request, query.size, query.page);
    if !query.filter.is_empty() && query.api_version == ApiVersion::V2 {
        request.set("filter", query.filter.as_str());
    }

    request
}

/// v2 has no versioned metadata route, so a pinned version always goes to v1.
pub fn package_metadata_request(
    account: &str,
    repository: &str,
    version: Option<&str>,
    api_version: ApiVersion,
) -> ApiRequest {
    match version.filter(|version| !version.is_empty()) {
        Some(version) => ApiRequest::new(["v1", "packageMetadata", account, repository, version]),
        None => ApiRequest::new([api_version.segment(), "packageMetadata", account, repository]),
    }
}

pub fn package_assets_request(
    account: &str,
    repository: &str,
    version: &str,
    asset_type: &str,
) -> ApiRequest {
    let mut request = ApiRequest::new(["v2", "packages", account, repository, version, "assets"]);
    request.set("type", asset_type);
    request.set("redirect", "false");
    request
}

pub fn package_resources_request(account: &str, repository: &str, version: &str) -> ApiRequest {
    ApiRequest::new(["v1", "packages", account, repository, version, "resources"])
}

/// Identifies one resource kind inside a package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub account: String,
    pub repository: String,
    pub version: String,
    pub group: String,
    pub kind: String,
}

impl ResourceRef {
    fn base_segments(&self) -> Vec<&str> {
        vec![
            "v1",
            "packages",
            &self.account,
            &self.repository,
            &self.version,
            "resources",
            &self.group,
            &self.kind,
        ]
    }
}

pub fn resource_definition_request(resource: &ResourceRef) -> ApiRequest {
    ApiRequest::new(resource.base_segments())
}

pub fn resource_examples_request(resource: &ResourceRef) -> ApiRequest {
    let mut segments = resource.base_segments();
    segments.push("examples");
    ApiRequest::new(segments)
}

pub fn composition_request(resource: &ResourceRef, composition: &str) -> ApiRequest {
    let mut segments = resource.base_segments();
    segments.extend(["compositions", composition]);
    ApiRequest::new(segments)
}

fn set_paging(request: &mut ApiRequest, size: u32, page: u32) {
    if size > 0 {
        request.set("size", size.to_string());
    }
    if page > 0 {
        request.set("page", page.to_string());
    }
}

/// Escapes a value for use inside a single-quoted AIP-160 string literal.
fn quote_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_filters(api_version: ApiVersion) -> SearchQuery {
        SearchQuery {
            query: "aws s3".to_string(),
            family: "provider-family-aws".to_string(),
            package_type: "provider".to_string(),
            account_name: "upbound".to_string(),
            tier: "official".to_string(),
            api_version,
            ..SearchQuery::default()
        }
    }

    #[test]
    fn v1_search_sets_each_filter_verbatim() {
        let request = search_request(&all_filters(ApiVersion::V1));

        assert_eq!(request.path(), "/v1/search");
        assert_eq!(request.param("query"), Some("aws s3"));
        assert_eq!(request.param("family"), Some("provider-family-aws"));
        assert_eq!(request.param("packageType"), Some("provider"));
        assert_eq!(request.param("accountName"), Some("upbound"));
        assert_eq!(request.param("tier"), Some("official"));
        assert_eq!(request.param("filter"), None);
    }

    #[test]
    fn v1_search_does_not_escape_quotes() {
        let request = search_request(&SearchQuery {
            query: "it's".to_string(),
            api_version: ApiVersion::V1,
            ..SearchQuery::default()
        });

        assert_eq!(request.param("query"), Some("it's"));
    }

    #[test]
    fn v2_search_conjoins_all_clauses() {
        let request = search_request(&all_filters(ApiVersion::V2));

        assert_eq!(request.path(), "/v2/search");
        assert_eq!(
            request.param("filter"),
            Some(
                "query = 'aws s3' AND family = 'provider-family-aws' AND packageType = 'provider' \
                 AND accountName = 'upbound' AND tier = 'official'"
            )
        );
        assert_eq!(request.param("query"), None);
        assert_eq!(request.param("tier"), None);
    }

    #[test]
    fn v2_search_single_clause_has_no_conjunction() {
        let request = search_request(&SearchQuery {
            tier: "official".to_string(),
            ..SearchQuery::default()
        });

        assert_eq!(request.param("filter"), Some("tier = 'official'"));
    }

    #[test]
    fn v2_search_escapes_literal_quotes() {
        let request = search_request(&SearchQuery {
            query: r"o'brien\x".to_string(),
            ..SearchQuery::default()
        });

        assert_eq!(request.param("filter"), Some(r"query = 'o\'brien\\x'"));
    }

    #[test]
    fn v2_search_without_filters_omits_filter() {
        let request = search_request(&SearchQuery::default());
        assert!(request.params().is_empty());
    }

    #[test]
    fn paging_and_public_render_identically_across_versions() {
        for api_version in [ApiVersion::V1, ApiVersion::V2] {
            let request = search_request(&SearchQuery {
                size: 20,
                page: 3,
                public: Some(false),
                resource_type: "Bucket".to_string(),
                api_version,
                ..SearchQuery::default()
            });

            assert_eq!(request.param("size"), Some("20"));
            assert_eq!(request.param("page"), Some("3"));
            assert_eq!(request.param("public"), Some("false"));
            assert_eq!(request.param("type"), Some("Bucket"));
        }
    }

    #[test]
    fn zero_size_and_page_are_omitted() {
        let request = search_request(&SearchQuery::default());
        assert_eq!(request.param("size"), None);
        assert_eq!(request.param("page"), None);
        assert_eq!(request.param("public"), None);
    }

    #[test]
    fn starred_only_rendered_when_true() {
        let starred = search_request(&SearchQuery {
            starred: Some(true),
            ..SearchQuery::default()
        });
        let unstarred = search_request(&SearchQuery {
            starred: Some(false),
            ..SearchQuery::default()
        });

        assert_eq!(starred.param("starred"), Some("true"));
        assert_eq!(unstarred.param("starred"), None);
    }

    #[test]
    fn repository_filter_passes_through_on_v2_only() {
        let v2 = repositories_request(&RepositoryQuery {
            account: "upbound".to_string(),
            filter: "name = 'provider-aws'".to_string(),
            size: 20,
            ..RepositoryQuery::default()
        });
        let v1 = repositories_request(&RepositoryQuery {
            account: "upbound".to_string(),
            filter: "name = 'provider-aws'".to_string(),
            size: 20,
            api_version: ApiVersion::V1,
            ..RepositoryQuery::default()
        });

        assert_eq!(v2.path(), "/v2/repositories/upbound");
        assert_eq!(v2.param("filter"), Some("name = 'provider-aws'"));
        assert_eq!(v1.path(), "/v1/repositories/upbound");
        assert_eq!(v1.param("filter"), None);
        assert_eq!(v1.param("size"), Some("20"));
    }

    #[test]
    fn pinned_metadata_version_forces_v1() {
        let pinned = package_metadata_request("upbound", "provider-aws", Some("v1.2.0"), ApiVersion::V2);
        let latest = package_metadata_request("upbound", "provider-aws", None, ApiVersion::V2);
        let legacy = package_metadata_request("upbound", "provider-aws", Some(""), ApiVersion::V1);

        assert_eq!(pinned.path(), "/v1/packageMetadata/upbound/provider-aws/v1.2.0");
        assert_eq!(latest.path(), "/v2/packageMetadata/upbound/provider-aws");
        assert_eq!(legacy.path(), "/v1/packageMetadata/upbound/provider-aws");
    }

    #[test]
    fn assets_request_disables_redirect() {
        let request = package_assets_request("upbound", "provider-aws", "v1.0.0", "readme");
        assert_eq!(request.path(), "/v2/packages/upbound/provider-aws/v1.0.0/assets");
        assert_eq!(request.query_string(), "redirect=false&type=readme");
    }

    #[test]
    fn drill_down_paths() {
        let resource = ResourceRef {
            account: "upbound".to_string(),
            repository: "provider-aws-s3".to_string(),
            version: "v1.0.0".to_string(),
            group: "s3.aws.upbound.io".to_string(),
            kind: "Bucket".to_string(),
        };

        assert_eq!(
            package_resources_request("upbound", "provider-aws-s3", "v1.0.0").path(),
            "/v1/packages/upbound/provider-aws-s3/v1.0.0/resources"
        );
        assert_eq!(
            resource_definition_request(&resource).path(),
            "/v1/packages/upbound/provider-aws-s3/v1.0.0/resources/s3.aws.upbound.io/Bucket"
        );
        assert_eq!(
            resource_examples_request(&resource).path(),
            "/v1/packages/upbound/provider-aws-s3/v1.0.0/resources/s3.aws.upbound.io/Bucket/examples"
        );
        assert_eq!(
            composition_request(&resource, "xbuckets").path(),
            "/v1/packages/upbound/provider-aws-s3/v1.0.0/resources/s3.aws.upbound.io/Bucket/compositions/xbuckets"
        );
    }

    #[test]
    fn to_url_joins_base_and_encodes_query() {
        let base = Url::parse("https://api.example.com").expect("valid url");
        let request = search_request(&SearchQuery {
            query: "aws".to_string(),
            size: 20,
            ..SearchQuery::default()
        });

        let url = request.to_url(&base).expect("url");
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v2/search?filter=query+%3D+%27aws%27&size=20"
        );
    }

    #[test]
    fn to_url_keeps_base_path_prefix() {
        let base = Url::parse("http://127.0.0.1:9000/proxy/").expect("valid url");
        let url = package_resources_request("a", "b", "c")
            .to_url(&base)
            .expect("url");
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/proxy/v1/packages/a/b/c/resources");
    }

    #[test]
    fn to_url_rejects_cannot_be_a_base() {
        let base = Url::parse("mailto:someone@example.com").expect("valid url");
        let err = search_request(&SearchQuery::default())
            .to_url(&base)
            .expect_err("expected transport error");
        assert!(matches!(err, AppError::Transport { .. }));
    }
}
