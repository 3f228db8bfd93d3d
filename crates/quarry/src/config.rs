//! Connection configuration.
//!
//! A [`QuarryConfig`] maps connection names to [`ConnectionConfig`] entries and
//! designates one of them as the default. It can be deserialized from JSON,
//! built programmatically, or read from the environment.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `QUARRY_CONNECTION` | default | Name of the default connection |
//! | `QUARRY_HOSTS` | http://localhost:9200 | Comma-separated host URLs |
//! | `QUARRY_IGNORE` | (none) | Comma-separated status codes to ignore |
//! | `QUARRY_TIMEOUT` | 30s | Request timeout |
//! | `QUARRY_USERNAME` / `QUARRY_PASSWORD` | (none) | Basic auth |
//!
//! # Example
//!
//! ```
//! use quarry::config::QuarryConfig;
//!
//! let config = QuarryConfig::from_json_str(r#"{
//!     "default": "main",
//!     "connections": {
//!         "main": {
//!             "servers": [{ "host": "es.internal", "port": 9200 }],
//!             "ignore": [404]
//!         }
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(config.default, "main");
//! assert_eq!(config.connections["main"].servers[0].url(), "http://es.internal:9200");
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Authentication for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionAuth {
    /// Basic username/password authentication.
    Basic {
        /// The username for basic auth.
        username: String,
        /// The password for basic auth.
        password: String,
    },
    /// Bearer token authentication.
    Bearer {
        /// The bearer token.
        token: String,
    },
}

/// One search engine node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDescriptor {
    /// Host name or address.
    pub host: String,

    /// Port (default: 9200).
    #[serde(default = "default_port")]
    pub port: u16,

    /// URL scheme (default: `"http"`).
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Optional user, used as basic auth when the connection has none.
    #[serde(default)]
    pub user: Option<String>,

    /// Optional password paired with `user`.
    #[serde(default)]
    pub pass: Option<String>,
}

fn default_port() -> u16 {
    9200
}

fn default_scheme() -> String {
    "http".to_string()
}

impl HostDescriptor {
    /// Creates a descriptor with the default scheme and port.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            scheme: default_scheme(),
            user: None,
            pass: None,
        }
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the scheme.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Parses `scheme://host:port`, where scheme and port are optional.
    ///
    /// IPv6 literals are written in brackets (`http://[::1]:9200`); a bare
    /// literal such as `::1` is taken as a host without a port.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let value = value.trim().trim_end_matches('/');
        let (scheme, rest) = match value.split_once("://") {
            Some((scheme, rest)) => (scheme.to_string(), rest),
            None => (default_scheme(), value),
        };

        let parse_port = |port: &str| {
            port.parse::<u16>().map_err(|e| ConfigError::Parse {
                message: format!("invalid port in host '{}': {}", value, e),
            })
        };

        let (host, port) = if rest.starts_with('[') {
            let Some(end) = rest.find(']') else {
                return Err(ConfigError::Parse {
                    message: format!("unterminated IPv6 literal in '{}'", value),
                });
            };
            let (literal, tail) = rest.split_at(end + 1);
            let port = match tail {
                "" => default_port(),
                _ => match tail.strip_prefix(':') {
                    Some(port) => parse_port(port)?,
                    None => {
                        return Err(ConfigError::Parse {
                            message: format!("unexpected '{}' after host in '{}'", tail, value),
                        });
                    }
                },
            };
            // "[]" carries no address
            let host = if literal.len() > 2 { literal.to_string() } else { String::new() };
            (host, port)
        } else if rest.matches(':').count() > 1 {
            (format!("[{}]", rest), default_port())
        } else {
            match rest.rsplit_once(':') {
                Some((host, port)) => (host.to_string(), parse_port(port)?),
                None => (rest.to_string(), default_port()),
            }
        };

        if host.is_empty() {
            return Err(ConfigError::Parse {
                message: format!("missing host in '{}'", value),
            });
        }

        Ok(Self {
            host,
            port,
            scheme,
            user: None,
            pass: None,
        })
    }

    /// Returns the node URL.
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Configuration for a single named connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Nodes of the cluster. The client connects to the first one.
    pub servers: Vec<HostDescriptor>,

    /// HTTP status codes that must not raise transport errors.
    #[serde(default)]
    pub ignore: Vec<u16>,

    /// Request timeout (default: 30s).
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// Optional authentication.
    #[serde(default)]
    pub auth: Option<ConnectionAuth>,

    /// Whether to disable certificate validation (default: false).
    /// Only use for development/testing.
    #[serde(default)]
    pub disable_certificate_validation: bool,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            servers: vec![HostDescriptor::new("localhost")],
            ignore: Vec::new(),
            timeout: default_timeout(),
            auth: None,
            disable_certificate_validation: false,
        }
    }
}

impl ConnectionConfig {
    /// Creates a configuration for the given nodes.
    pub fn new(servers: Vec<HostDescriptor>) -> Self {
        Self {
            servers,
            ..Default::default()
        }
    }

    /// Sets the status codes to ignore.
    pub fn with_ignore(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.ignore = codes.into_iter().collect();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets authentication.
    pub fn with_auth(mut self, auth: ConnectionAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Returns the effective authentication.
    ///
    /// Explicit `auth` wins; otherwise credentials on the first host are used.
    pub fn effective_auth(&self) -> Option<ConnectionAuth> {
        if self.auth.is_some() {
            return self.auth.clone();
        }
        let host = self.servers.first()?;
        match (&host.user, &host.pass) {
            (Some(user), Some(pass)) => Some(ConnectionAuth::Basic {
                username: user.clone(),
                password: pass.clone(),
            }),
            _ => None,
        }
    }
}

/// Top-level configuration: named connections plus the default name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarryConfig {
    /// Name of the default connection.
    #[serde(default = "default_connection_name")]
    pub default: String,

    /// Connection configurations keyed by name.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

fn default_connection_name() -> String {
    "default".to_string()
}

impl Default for QuarryConfig {
    fn default() -> Self {
        let mut connections = HashMap::new();
        connections.insert(default_connection_name(), ConnectionConfig::default());
        Self {
            default: default_connection_name(),
            connections,
        }
    }
}

impl QuarryConfig {
    /// Creates an empty configuration with the given default name.
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            connections: HashMap::new(),
        }
    }

    /// Adds a named connection.
    pub fn with_connection(mut self, name: impl Into<String>, config: ConnectionConfig) -> Self {
        self.connections.insert(name.into(), config);
        self
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: QuarryConfig = serde_json::from_str(json).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config
            .validate()
            .map_err(|errors| ConfigError::Invalid { errors })?;
        Ok(config)
    }

    /// Builds a single-connection configuration from `QUARRY_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let name = std::env::var("QUARRY_CONNECTION").unwrap_or_else(|_| default_connection_name());

        let servers = match std::env::var("QUARRY_HOSTS") {
            Ok(hosts) => hosts
                .split(',')
                .filter(|h| !h.trim().is_empty())
                .map(HostDescriptor::parse)
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => vec![HostDescriptor::new("localhost")],
        };

        let ignore = match std::env::var("QUARRY_IGNORE") {
            Ok(codes) => codes
                .split(',')
                .filter(|c| !c.trim().is_empty())
                .map(|c| {
                    c.trim().parse::<u16>().map_err(|e| ConfigError::Parse {
                        message: format!("invalid status code '{}': {}", c, e),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Err(_) => Vec::new(),
        };

        let timeout = match std::env::var("QUARRY_TIMEOUT") {
            Ok(value) => humantime::parse_duration(&value).map_err(|e| ConfigError::Parse {
                message: format!("invalid timeout '{}': {}", value, e),
            })?,
            Err(_) => default_timeout(),
        };

        let auth = match (
            std::env::var("QUARRY_USERNAME"),
            std::env::var("QUARRY_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => Some(ConnectionAuth::Basic { username, password }),
            _ => None,
        };

        let connection = ConnectionConfig {
            servers,
            ignore,
            timeout,
            auth,
            disable_certificate_validation: false,
        };

        let config = Self::new(name.clone()).with_connection(name, connection);
        config
            .validate()
            .map_err(|errors| ConfigError::Invalid { errors })?;
        Ok(config)
    }

    /// Validates the configuration and returns errors if any.
    ///
    /// The default name need not exist among the connections; an unresolvable
    /// default fails when a connection is requested.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.default.is_empty() {
            errors.push("Default connection name cannot be empty".to_string());
        }

        for (name, connection) in &self.connections {
            if connection.servers.is_empty() {
                errors.push(format!("Connection '{}' has no servers", name));
            }
            if connection.timeout.is_zero() {
                errors.push(format!("Connection '{}' timeout cannot be 0", name));
            }
            if let Some(code) = connection
                .ignore
                .iter()
                .find(|code| !(100..=599).contains(*code))
            {
                errors.push(format!(
                    "Connection '{}' ignores invalid status code {}",
                    name, code
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Serde module for Duration with humantime format.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
