//! Shared argument validation for marketplace tools

use crate::errors::AppError;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_SEARCH_PAGE_SIZE: u32 = 500;
pub const MAX_REPOSITORY_PAGE_SIZE: u32 = 100;
pub const ASSET_TYPES: [&str; 5] = ["docs", "icon", "readme", "releaseNotes", "sbom"];

/// A required argument that becomes one URL path segment.
pub fn require_segment(value: Option<String>, name: &str) -> Result<String, AppError> {
    optional_segment(value, name)?.ok_or_else(|| {
        AppError::bad_request(
            "missing_parameter",
            format!("Missing required parameter: {name}"),
        )
    })
}

pub fn optional_segment(value: Option<String>, name: &str) -> Result<Option<String>, AppError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let normalized = value.trim();
    if normalized.is_empty() {
        return Ok(None);
    }

    if normalized.contains('/') || normalized == "." || normalized == ".." {
        return Err(AppError::bad_request(
            "invalid_parameter",
            format!("{name} must be a single path segment"),
        ));
    }

    Ok(Some(normalized.to_string()))
}

/// Missing means the default page. An explicit 0 is kept and later leaves
/// `size` off the request, so the marketplace applies its own default.
pub fn normalize_page_size(size: Option<u32>, max: u32) -> Result<u32, AppError> {
    let size = size.unwrap_or(DEFAULT_PAGE_SIZE);
    if size > max {
        return Err(AppError::bad_request(
            "invalid_size",
            format!("size must be at most {max}"),
        ));
    }

    Ok(size)
}

pub fn normalize_asset_type(asset_type: Option<String>) -> Result<String, AppError> {
    let Some(value) = asset_type else {
        return Err(AppError::bad_request(
            "missing_parameter",
            "Missing required parameter: asset_type",
        ));
    };

    let normalized = value.trim();
    ASSET_TYPES
        .iter()
        .find(|candidate| candidate.eq_ignore_ascii_case(normalized))
        .map(|candidate| candidate.to_string())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_asset_type",
                format!("asset_type must be one of: {}", ASSET_TYPES.join(", ")),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_segment_trims_value() {
        let account = require_segment(Some("  upbound ".to_string()), "account").expect("valid");
        assert_eq!(account, "upbound");
    }

    #[test]
    fn require_segment_rejects_missing_and_blank() {
        for value in [None, Some("   ".to_string())] {
            let error = require_segment(value, "account").expect_err("expected missing");
            assert!(error.to_string().contains("Missing required parameter: account"));
        }
    }

    #[test]
    fn segments_reject_path_traversal() {
        for value in ["a/b", "..", "."] {
            let error = require_segment(Some(value.to_string()), "repository")
                .expect_err("expected invalid segment");
            assert!(error.to_string().contains("bad request"));
        }
    }

    #[test]
    fn page_size_defaults_and_bounds() {
        assert_eq!(normalize_page_size(None, MAX_SEARCH_PAGE_SIZE).expect("default"), 20);
        assert_eq!(normalize_page_size(Some(500), MAX_SEARCH_PAGE_SIZE).expect("max"), 500);
        assert_eq!(normalize_page_size(Some(0), MAX_SEARCH_PAGE_SIZE).expect("zero"), 0);
        assert!(normalize_page_size(Some(101), MAX_REPOSITORY_PAGE_SIZE).is_err());
    }

    #[test]
    fn asset_type_is_canonicalized() {
        let asset_type =
            normalize_asset_type(Some(" RELEASENOTES ".to_string())).expect("valid asset type");
        assert_eq!(asset_type, "releaseNotes");
    }

    #[test]
    fn unknown_asset_type_is_rejected() {
        let error = normalize_asset_type(Some("crds".to_string())).expect_err("expected invalid");
        assert!(error.to_string().contains("asset_type must be one of"));
    }
}
