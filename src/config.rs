use std::{env, net::SocketAddr, path::PathBuf};

use thiserror::Error;

pub const DEFAULT_BIND_PORT: u16 = 8765;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: Transport,
    pub api_token: Option<String>,
    pub bind_addr: String,
    pub bind_port: u16,
    pub up_config_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MCP_TRANSPORT must be one of: stdio, http")]
    InvalidTransport,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests do not
    /// have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let transport = match non_empty("MCP_TRANSPORT")
            .map(|value| value.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("stdio") => Transport::Stdio,
            Some("http") => Transport::Http,
            Some(_) => return Err(ConfigError::InvalidTransport),
        };

        let api_token = non_empty("MCP_API_TOKEN");
        let bind_addr = non_empty("BIND_ADDR").unwrap_or_else(|| "127.0.0.1".to_string());
        let bind_port = non_empty("BIND_PORT")
            .or_else(|| non_empty("PORT"))
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(DEFAULT_BIND_PORT);
        let up_config_path = non_empty("UP_CONFIG_PATH").map(PathBuf::from);

        let config = Self {
            transport,
            api_token,
            bind_addr,
            bind_port,
            up_config_path,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn parse_defaults() {
        let config = Config::from_lookup(lookup(&[])).expect("config should parse");
        assert_eq!(config.transport, Transport::Stdio);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.bind_port, DEFAULT_BIND_PORT);
        assert!(config.api_token.is_none());
        assert!(config.up_config_path.is_none());
    }

    #[test]
    fn http_transport_and_port_fallback() {
        let config = Config::from_lookup(lookup(&[("MCP_TRANSPORT", "HTTP"), ("PORT", "9000")]))
            .expect("config should parse");
        assert_eq!(config.transport, Transport::Http);
        assert_eq!(config.bind_port, 9000);
    }

    #[test]
    fn bind_port_wins_over_port() {
        let config = Config::from_lookup(lookup(&[("BIND_PORT", "9100"), ("PORT", "9000")]))
            .expect("config should parse");
        assert_eq!(config.bind_port, 9100);
    }

    #[test]
    fn blank_api_token_is_ignored() {
        let config = Config::from_lookup(lookup(&[("MCP_API_TOKEN", "   ")]))
            .expect("config should parse");
        assert!(config.api_token.is_none());
    }

    #[test]
    fn invalid_transport_fails() {
        let err = Config::from_lookup(lookup(&[("MCP_TRANSPORT", "websocket")]))
            .expect_err("expected invalid transport");
        assert!(matches!(err, ConfigError::InvalidTransport));
    }

    #[test]
    fn invalid_port_fails() {
        let err = Config::from_lookup(lookup(&[("BIND_PORT", "99999")]))
            .expect_err("expected invalid port");
        assert!(matches!(err, ConfigError::InvalidPort));
    }

    #[test]
    fn invalid_bind_addr_fails() {
        let err = Config::from_lookup(lookup(&[("BIND_ADDR", "not an address")]))
            .expect_err("expected invalid socket");
        assert!(matches!(err, ConfigError::InvalidSocket));
    }
}
