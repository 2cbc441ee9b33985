//! Credential source backed by the `up` CLI configuration file
//!
//! The server never performs an interactive login; it reuses the session the
//! `up` CLI stored for its default profile.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::marketplace::client::Connection;

pub const DEFAULT_API_URL: &str = "https://api.upbound.io";
pub const CONTAINER_CONFIG_PATH: &str = "/mcp/.up/config.json";

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("UP CLI config not found at {}. Please run 'up login' first", path.display())]
    ConfigNotFound { path: PathBuf },
    #[error("failed to read UP CLI config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse UP CLI config: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("no default profile set in UP CLI config")]
    NoDefaultProfile,
    #[error("profile '{0}' not found in UP CLI config")]
    ProfileNotFound(String),
    #[error("no session token found in profile '{0}'. Please run 'up login' to authenticate")]
    MissingSession(String),
    #[error("failed to parse domain '{domain}': {reason}")]
    InvalidDomain { domain: String, reason: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
struct UpConfig {
    #[serde(default)]
    upbound: UpboundSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct UpboundSection {
    #[serde(default)]
    default: String,
    #[serde(default)]
    profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub id: String,
    pub profile_type: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub session: String,
    pub account: String,
    pub organization: String,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Session,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub kind: TokenKind,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    config_path: PathBuf,
}

impl CredentialStore {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Resolves the config location: explicit override, then the container
    /// mount, then `~/.up/config.json`.
    pub fn discover(override_path: Option<PathBuf>) -> Self {
        if let Some(path) = override_path {
            return Self::new(path);
        }

        let mounted = Path::new(CONTAINER_CONFIG_PATH);
        if mounted.exists() {
            return Self::new(mounted);
        }

        let home = dirs::home_dir().unwrap_or_default();
        Self::new(home.join(".up").join("config.json"))
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn current_token(&self) -> Result<Token, CredentialError> {
        let config = self.load_config()?;
        let name = default_name(&config)?;
        token_from_profile(&config, name)
    }

    pub fn token_for_profile(&self, name: &str) -> Result<Token, CredentialError> {
        let config = self.load_config()?;
        token_from_profile(&config, name)
    }

    pub fn current_profile(&self) -> Result<Profile, CredentialError> {
        let config = self.load_config()?;
        let name = default_name(&config)?;
        config
            .upbound
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| CredentialError::ProfileNotFound(name.to_string()))
    }

    pub fn default_profile_name(&self) -> Result<String, CredentialError> {
        let config = self.load_config()?;
        default_name(&config).map(str::to_string)
    }

    pub fn list_profiles(&self) -> Result<BTreeMap<String, Profile>, CredentialError> {
        Ok(self.load_config()?.upbound.profiles)
    }

    pub fn current_server_url(&self) -> Result<String, CredentialError> {
        let profile = self.current_profile()?;
        server_url_for_domain(&profile.domain)
    }

    pub fn validate_token(&self) -> Result<(), CredentialError> {
        self.current_token().map(|_| ())
    }

    /// Reads server URL and session together so callers can swap both at once.
    pub fn load_connection(&self) -> Result<Connection, CredentialError> {
        let server_url = self.current_server_url()?;
        let token = self.current_token()?;
        Connection::new(&server_url, Some(token.access_token)).map_err(|err| {
            CredentialError::InvalidDomain {
                domain: server_url.clone(),
                reason: err.to_string(),
            }
        })
    }

    fn load_config(&self) -> Result<UpConfig, CredentialError> {
        let data = match fs::read(&self.config_path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(CredentialError::ConfigNotFound {
                    path: self.config_path.clone(),
                })
            }
            Err(source) => {
                return Err(CredentialError::Read {
                    path: self.config_path.clone(),
                    source,
                })
            }
        };

        serde_json::from_slice(&data).map_err(CredentialError::Parse)
    }
}

fn default_name(config: &UpConfig) -> Result<&str, CredentialError> {
    let name = config.upbound.default.trim();
    if name.is_empty() {
        return Err(CredentialError::NoDefaultProfile);
    }
    Ok(name)
}

fn token_from_profile(config: &UpConfig, name: &str) -> Result<Token, CredentialError> {
    let profile = config
        .upbound
        .profiles
        .get(name)
        .ok_or_else(|| CredentialError::ProfileNotFound(name.to_string()))?;

    if profile.session.trim().is_empty() {
        return Err(CredentialError::MissingSession(name.to_string()));
    }

    Ok(Token {
        access_token: profile.session.clone(),
        kind: TokenKind::Session,
    })
}

/// Maps a profile domain to the API base URL, adding the `api.` host prefix.
pub fn server_url_for_domain(domain: &str) -> Result<String, CredentialError> {
    let domain = domain.trim();
    if domain.is_empty() {
        return Ok(DEFAULT_API_URL.to_string());
    }

    let invalid = |reason: String| CredentialError::InvalidDomain {
        domain: domain.to_string(),
        reason,
    };

    let candidate = if domain.contains("://") {
        domain.to_string()
    } else {
        format!("https://{domain}")
    };
    let mut url = Url::parse(&candidate).map_err(|err| invalid(err.to_string()))?;
    let host = url
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| invalid("missing host".to_string()))?;

    if !host.starts_with("api.") {
        url.set_host(Some(&format!("api.{host}")))
            .map_err(|err| invalid(err.to_string()))?;
    }

    Ok(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn store_with(contents: &str) -> (tempfile::TempDir, CredentialStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, contents).expect("write config");
        (dir, CredentialStore::new(path))
    }

    const TEAM_A: &str = r#"{
        "upbound": {
            "default": "team-a",
            "profiles": {
                "team-a": {
                    "id": "alice",
                    "type": "user",
                    "session": "sid-a",
                    "organization": "acme",
                    "domain": ""
                },
                "team-b": {
                    "id": "bob",
                    "session": "",
                    "organization": "acme",
                    "domain": "example.com"
                }
            }
        }
    }"#;

    #[test]
    fn empty_domain_uses_default_host() {
        let (_dir, store) = store_with(TEAM_A);
        assert_eq!(
            store.current_server_url().expect("server url"),
            DEFAULT_API_URL
        );
    }

    #[test]
    fn bare_domain_gets_api_prefix() {
        assert_eq!(
            server_url_for_domain("example.com").expect("url"),
            "https://api.example.com"
        );
    }

    #[test]
    fn domain_with_scheme_keeps_scheme_and_port() {
        assert_eq!(
            server_url_for_domain("http://local.dev:8080").expect("url"),
            "http://api.local.dev:8080"
        );
    }

    #[test]
    fn existing_api_prefix_is_not_doubled() {
        assert_eq!(
            server_url_for_domain("https://api.upbound.io").expect("url"),
            "https://api.upbound.io"
        );
    }

    #[test]
    fn current_token_reads_default_profile_session() {
        let (_dir, store) = store_with(TEAM_A);
        let token = store.current_token().expect("token");
        assert_eq!(token.access_token, "sid-a");
        assert_eq!(token.kind, TokenKind::Session);
        assert_eq!(store.default_profile_name().expect("name"), "team-a");
    }

    #[test]
    fn empty_session_is_rejected() {
        let (_dir, store) = store_with(TEAM_A);
        let err = store
            .token_for_profile("team-b")
            .expect_err("expected missing session");
        assert!(matches!(err, CredentialError::MissingSession(name) if name == "team-b"));
    }

    #[test]
    fn unknown_profile_is_rejected() {
        let (_dir, store) = store_with(TEAM_A);
        let err = store
            .token_for_profile("team-z")
            .expect_err("expected unknown profile");
        assert!(matches!(err, CredentialError::ProfileNotFound(_)));
    }

    #[test]
    fn missing_default_profile_is_rejected() {
        let (_dir, store) = store_with(r#"{"upbound":{"profiles":{}}}"#);
        let err = store.current_profile().expect_err("expected no default");
        assert!(matches!(err, CredentialError::NoDefaultProfile));
    }

    #[test]
    fn lists_all_profiles() {
        let (_dir, store) = store_with(TEAM_A);
        let profiles = store.list_profiles().expect("profiles");
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles["team-b"].domain, "example.com");
    }

    #[test]
    fn missing_file_reports_login_hint() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CredentialStore::new(dir.path().join("absent.json"));
        let err = store.current_token().expect_err("expected missing config");
        assert!(matches!(err, CredentialError::ConfigNotFound { .. }));
        assert!(err.to_string().contains("up login"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let (_dir, store) = store_with("{not json");
        let err = store.current_token().expect_err("expected parse error");
        assert!(matches!(err, CredentialError::Parse(_)));
    }

    #[test]
    fn load_connection_combines_url_and_token() {
        let (_dir, store) = store_with(TEAM_A);
        let connection = store.load_connection().expect("connection");
        assert_eq!(connection.base_url.as_str(), "https://api.upbound.io/");
        assert_eq!(connection.token.as_deref(), Some("sid-a"));
    }

    #[test]
    fn override_path_wins_discovery() {
        let store = CredentialStore::discover(Some(PathBuf::from("/tmp/custom.json")));
        assert_eq!(store.config_path(), Path::new("/tmp/custom.json"));
    }
}
