//! Markdown rendering of marketplace responses for tool output

use chrono::{DateTime, Utc};

use crate::marketplace::types::{
    AssetResponse, Examples, PackageMetadata, PackageResources, RepositoryResponse,
    SearchResponse,
};

pub fn format_search_results(result: &SearchResponse) -> String {
    if result.packages.is_empty() {
        return "No packages found.".to_string();
    }

    let total = reported_total(result.total, result.packages.len());
    let mut out = format!("Found {total} packages:\n\n");

    for package in &result.packages {
        out.push_str(&format!("**{}/{}**\n", package.account, package.repository));
        push_line(&mut out, "Description", &package.description);
        push_line(&mut out, "Type", &package.package_type);
        push_line(&mut out, "Tier", &package.tier);
        push_line(&mut out, "Version", &package.version);
        out.push_str(&format!("Public: {}\n", package.public));
        if package.stars > 0 {
            out.push_str(&format!("Stars: {}\n", package.stars));
        }
        if package.downloads > 0 {
            out.push_str(&format!("Downloads: {}\n", package.downloads));
        }
        if !package.tags.is_empty() {
            out.push_str(&format!("Tags: {}\n", package.tags.join(", ")));
        }
        out.push('\n');
    }

    out
}

pub fn format_package_metadata(metadata: &PackageMetadata) -> String {
    let mut out = format!("# {}/{}\n\n", metadata.account, metadata.repository);

    if !metadata.description.is_empty() {
        out.push_str(&format!("**Description:** {}\n\n", metadata.description));
    }

    out.push_str(&format!("**Type:** {}\n", metadata.package_type));
    out.push_str(&format!("**Public:** {}\n", metadata.public));
    push_bold_line(&mut out, "Tier", &metadata.tier);
    push_bold_line(&mut out, "License", &metadata.license);
    push_bold_line(&mut out, "Latest Version", &metadata.latest_version);
    push_bold_line(&mut out, "Available Versions", &metadata.versions.join(", "));
    push_bold_line(&mut out, "Homepage", &metadata.homepage);
    push_bold_line(&mut out, "Documentation", &metadata.documentation);
    push_bold_line(&mut out, "Tags", &metadata.tags.join(", "));
    push_bold_line(&mut out, "Keywords", &metadata.keywords.join(", "));

    if !metadata.dependencies.is_empty() {
        out.push_str("\n## Dependencies\n");
        for dependency in &metadata.dependencies {
            out.push_str(&format!("- {}: {}\n", dependency.name, dependency.version));
        }
    }

    if !metadata.crds.is_empty() {
        out.push_str("\n## Custom Resource Definitions (CRDs)\n");
        for crd in &metadata.crds {
            out.push_str(&format!("- **{}** ({}/{})\n", crd.kind, crd.group, crd.version));
            if !crd.description.is_empty() {
                out.push_str(&format!("  Description: {}\n", crd.description));
            }
        }
    }

    if !metadata.examples.is_empty() {
        out.push_str("\n## Examples\n");
        for example in &metadata.examples {
            out.push_str(&format!("### {}\n", example.name));
            if !example.description.is_empty() {
                out.push_str(&format!("{}\n", example.description));
            }
            out.push_str(&format!("```{}\n{}\n```\n\n", example.syntax, example.content));
        }
    }

    if !metadata.compositions.is_empty() {
        out.push_str("\n## Compositions\n");
        for composition in &metadata.compositions {
            out.push_str(&format!("### {}\n", composition.name));
            if !composition.description.is_empty() {
                out.push_str(&format!("{}\n", composition.description));
            }
            if !composition.resources.is_empty() {
                out.push_str("Resources:\n");
                for resource in &composition.resources {
                    out.push_str(&format!("- {} ({})\n", resource.name, resource.resource_type));
                }
            }
        }
    }

    if !metadata.functions.is_empty() {
        out.push_str("\n## Functions\n");
        for function in &metadata.functions {
            out.push_str(&format!("### {}\n", function.name));
            if !function.description.is_empty() {
                out.push_str(&format!("{}\n", function.description));
            }
            out.push_str(&format!("Version: {}\n", function.version));
            out.push_str(&format!("Image: {}\n", function.image));
        }
    }

    out
}

pub fn format_asset(asset: &AssetResponse, asset_type: &str) -> String {
    let mut out = format!("# {} Asset\n\n", capitalize(asset_type));

    if !asset.url.is_empty() {
        out.push_str(&format!("**Asset URL:** {}\n\n", asset.url));
        out.push_str("Use this URL to download the asset directly.\n\n");
    }

    if !asset.content.is_empty() {
        out.push_str("**Content:**\n");
        out.push_str(&format!("```{}\n{}\n```\n", asset.content_type, asset.content));
    }

    if asset.url.is_empty() && asset.content.is_empty() {
        out.push_str("No asset content was returned.\n");
    }

    let note = match asset_type {
        "docs" => Some("This documentation describes the package and how to use it."),
        "readme" => Some("The readme is the package's landing page in the marketplace."),
        "releaseNotes" => Some("Release notes list the changes shipped in this version."),
        "sbom" => Some("The SBOM lists the software components bundled in this package."),
        _ => None,
    };
    if let Some(note) = note {
        out.push_str(&format!("\n{note}\n"));
    }

    out
}

pub fn format_repositories(result: &RepositoryResponse) -> String {
    if result.repositories.is_empty() {
        return "No repositories found.".to_string();
    }

    let total = reported_total(result.count, result.repositories.len());
    let mut out = format!("Found {total} repositories:\n\n");

    for repository in &result.repositories {
        out.push_str(&format!("**{}/{}**\n", repository.account, repository.name));
        push_line(&mut out, "Description", &repository.description);
        push_line(&mut out, "Type", &repository.repository_type);
        out.push_str(&format!("Public: {}\n", repository.public));
        push_line(&mut out, "Policy", &repository.policy);
        if repository.package_count > 0 {
            out.push_str(&format!("Packages: {}\n", repository.package_count));
        }
        if let Some(created_at) = repository.created_at.as_ref() {
            out.push_str(&format!("Created: {}\n", format_date(created_at)));
        }
        if let Some(updated_at) = repository.updated_at.as_ref() {
            out.push_str(&format!("Updated: {}\n", format_date(updated_at)));
        }
        out.push('\n');
    }

    out
}

pub fn format_package_resources(resources: &PackageResources) -> String {
    let meta = &resources.meta;
    let mut out = format!("# {}/{}\n\n", meta.account, meta.repository);
    push_bold_line(&mut out, "Package Type", &meta.package_type);
    push_bold_line(&mut out, "Tier", &meta.tier);
    out.push_str(&format!("**Public:** {}\n", meta.public));
    push_bold_line(&mut out, "Digest", &meta.pkg_digest);
    if let Some(family) = meta.family_repo_key.as_deref() {
        push_bold_line(&mut out, "Family", family);
    }

    if resources.crds.is_empty() && resources.xrds.is_empty() && resources.compositions.is_empty()
    {
        out.push_str("\nThis package does not declare any resources.\n");
        return out;
    }

    if !resources.crds.is_empty() {
        out.push_str("\n## Custom Resource Definitions\n");
        for crd in &resources.crds {
            out.push_str(&format!(
                "- **{}** ({}) versions: {}",
                crd.kind,
                crd.group,
                crd.versions.join(", ")
            ));
            if !crd.storage_version.is_empty() {
                out.push_str(&format!(", storage: {}", crd.storage_version));
            }
            if !crd.scope.is_empty() {
                out.push_str(&format!(", scope: {}", crd.scope));
            }
            out.push('\n');
        }
    }

    if !resources.xrds.is_empty() {
        out.push_str("\n## Composite Resource Definitions\n");
        for xrd in &resources.xrds {
            out.push_str(&format!(
                "- **{}** ({}) versions: {}",
                xrd.kind,
                xrd.group,
                xrd.versions.join(", ")
            ));
            if !xrd.referenceable_version.is_empty() {
                out.push_str(&format!(", referenceable: {}", xrd.referenceable_version));
            }
            out.push('\n');
        }
    }

    if !resources.compositions.is_empty() {
        out.push_str("\n## Compositions\n");
        for composition in &resources.compositions {
            out.push_str(&format!(
                "- **{}** composes {} {} ({} resources)\n",
                composition.name,
                composition.xrd_api_version,
                composition.xrd_kind,
                composition.resource_count
            ));
        }
    }

    out
}

pub fn format_examples(examples: &Examples, group: &str, kind: &str) -> String {
    if examples.examples.is_empty() {
        return format!("No examples found for {kind}.{group}.");
    }

    let mut out = format!("# Examples for {kind}.{group}\n\n");
    for (index, example) in examples.examples.iter().enumerate() {
        out.push_str(&format!("## Example {}\n```yaml\n{}\n```\n\n", index + 1, example.trim_end()));
    }

    out
}

fn push_line(out: &mut String, label: &str, value: &str) {
    if !value.is_empty() {
        out.push_str(&format!("{label}: {value}\n"));
    }
}

fn push_bold_line(out: &mut String, label: &str, value: &str) {
    if !value.is_empty() {
        out.push_str(&format!("**{label}:** {value}\n"));
    }
}

fn reported_total(total: u64, returned: usize) -> u64 {
    if total > 0 {
        total
    } else {
        returned as u64
    }
}

fn format_date(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
