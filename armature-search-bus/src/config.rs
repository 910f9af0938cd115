//! Gateway configuration.
//!
//! Configuration is assembled in layers: defaults, then an optional JSON or
//! TOML file, then `GATEWAY_`-prefixed environment variables (a `.env` file
//! is read first if present). The merged document is deserialized into
//! [`GatewayConfig`] and validated.
//!
//! ```json
//! {
//!   "address": "armature.elasticsearch",
//!   "cluster_name": "elasticsearch",
//!   "client_transport_sniff": true,
//!   "transportAddresses": [{ "hostname": "search-1", "port": 9200 }]
//! }
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::opensearch::OpenSearchConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "GATEWAY_";

/// Default bus address the gateway listens on.
pub const DEFAULT_ADDRESS: &str = "armature.elasticsearch";

/// Default port of a transport address.
pub const DEFAULT_PORT: u16 = 9200;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `.json`
    Json,
    /// `.toml`
    Toml,
}

impl FileFormat {
    /// Format for a file extension, case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "toml" => Some(FileFormat::Toml),
            _ => None,
        }
    }
}

/// Configuration file loader
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    /// Loader for a fixed format
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Auto-detect format from file extension
    pub fn auto(path: &str) -> ConfigResult<Self> {
        let ext = Path::new(path)
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ConfigError::LoadError(format!("No file extension found: {path}")))?;

        let format = FileFormat::from_extension(ext)
            .ok_or_else(|| ConfigError::LoadError(format!("Unsupported format: {ext}")))?;

        Ok(Self::new(format))
    }

    /// Load configuration from file
    pub fn load_file(&self, path: &str) -> ConfigResult<Value> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("Failed to read {path}: {e}")))?;

        self.parse(&content)
    }

    /// Parse configuration from string
    pub fn parse(&self, content: &str) -> ConfigResult<Value> {
        match self.format {
            FileFormat::Json => serde_json::from_str(content)
                .map_err(|e| ConfigError::ParseError(format!("JSON parse error: {e}"))),
            FileFormat::Toml => {
                let toml_value: toml::Value = toml::from_str(content)
                    .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {e}")))?;

                serde_json::to_value(toml_value).map_err(|e| {
                    ConfigError::ParseError(format!("TOML to JSON conversion error: {e}"))
                })
            }
        }
    }
}

/// A search node to connect to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportAddress {
    /// Host name; entries without one are skipped.
    #[serde(default)]
    pub hostname: Option<String>,
    /// Port, 9200 when absent.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl TransportAddress {
    /// Address with a hostname.
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: Some(hostname.into()),
            port,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bus address the gateway registers on.
    pub address: String,
    /// Cluster name.
    pub cluster_name: String,
    /// Whether to discover the rest of the cluster from the given nodes.
    pub client_transport_sniff: bool,
    /// Search nodes.
    #[serde(rename = "transportAddresses")]
    pub transport_addresses: Vec<TransportAddress>,
    /// `http` or `https`.
    pub scheme: String,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// NATS server URL the gateway binary serves on. Required to start it.
    pub bus_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            cluster_name: "elasticsearch".to_string(),
            client_transport_sniff: true,
            transport_addresses: Vec::new(),
            scheme: "http".to_string(),
            username: None,
            password: None,
            request_timeout_secs: 30,
            bus_url: None,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from an optional file, `.env` and the process
    /// environment.
    pub fn load(path: Option<&str>) -> ConfigResult<Self> {
        dotenvy::dotenv().ok();

        let base = match path {
            Some(path) => {
                debug!(path = path, "Loading configuration file");
                ConfigLoader::auto(path)?.load_file(path)?
            }
            None => Value::Object(Map::new()),
        };

        let merged = apply_env(base, std::env::vars())?;
        let config = Self::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from an already-merged document.
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value)
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Nodes to connect to as `(hostname, port)`.
    ///
    /// Entries with no or empty hostname are skipped; `localhost` is used
    /// when nothing remains.
    pub fn endpoints(&self) -> Vec<(String, u16)> {
        let endpoints: Vec<(String, u16)> = self
            .transport_addresses
            .iter()
            .filter_map(|address| match address.hostname.as_deref() {
                Some(host) if !host.is_empty() => Some((host.to_string(), address.port)),
                _ => None,
            })
            .collect();

        if endpoints.is_empty() {
            vec![("localhost".to_string(), DEFAULT_PORT)]
        } else {
            endpoints
        }
    }

    /// Client settings for the OpenSearch adapter.
    pub fn search_config(&self) -> OpenSearchConfig {
        let urls = self
            .endpoints()
            .into_iter()
            .map(|(host, port)| format!("{}://{}:{}", self.scheme, host, port))
            .collect();

        let mut config = OpenSearchConfig::cluster(urls)
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_cluster_name(self.cluster_name.clone())
            .with_sniff(self.client_transport_sniff);

        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            config = config.with_basic_auth(user.clone(), pass.clone());
        }
        config
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "address must not be empty".to_string(),
            ));
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(ConfigError::ValidationError(format!(
                "scheme must be http or https, got {}",
                self.scheme
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.transport_addresses.iter().any(|a| a.port == 0) {
            return Err(ConfigError::ValidationError(
                "transport port must not be 0".to_string(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ConfigError::ValidationError(
                "username and password must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

/// Overlay `GATEWAY_*` variables onto a configuration document.
///
/// Unknown variables under the prefix are ignored.
pub fn apply_env<I>(base: Value, vars: I) -> ConfigResult<Value>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut map = match base {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => {
            return Err(ConfigError::ParseError(
                "configuration root must be an object".to_string(),
            ));
        }
    };

    for (key, raw) in vars {
        let Some(name) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        if let Some((field, value)) = env_override(&name.to_lowercase(), &raw)? {
            debug!(variable = %key, "Applying environment override");
            map.insert(field.to_string(), value);
        }
    }

    Ok(Value::Object(map))
}

fn env_override(name: &str, raw: &str) -> ConfigResult<Option<(&'static str, Value)>> {
    let invalid = |field: &str, expected: &str| {
        ConfigError::ParseError(format!("{ENV_PREFIX}{} must be {expected}", field.to_uppercase()))
    };

    let entry = match name {
        "address" => ("address", Value::String(raw.to_string())),
        "cluster_name" => ("cluster_name", Value::String(raw.to_string())),
        "scheme" => ("scheme", Value::String(raw.to_string())),
        "username" => ("username", Value::String(raw.to_string())),
        "password" => ("password", Value::String(raw.to_string())),
        "bus_url" => ("bus_url", Value::String(raw.to_string())),
        "client_transport_sniff" => {
            let flag = match raw.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => return Err(invalid(name, "a boolean")),
            };
            ("client_transport_sniff", Value::Bool(flag))
        }
        "request_timeout_secs" => {
            let secs: u64 = raw.parse().map_err(|_| invalid(name, "a number"))?;
            ("request_timeout_secs", Value::from(secs))
        }
        "transport_addresses" => ("transportAddresses", parse_addresses(raw)?),
        _ => return Ok(None),
    };
    Ok(Some(entry))
}

/// Parse `host[:port],host[:port]` into the `transportAddresses` shape.
fn parse_addresses(raw: &str) -> ConfigResult<Value> {
    let mut addresses = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let address = match item.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    ConfigError::ParseError(format!("invalid port in transport address {item}"))
                })?;
                TransportAddress::new(host, port)
            }
            None => TransportAddress::new(item, DEFAULT_PORT),
        };
        addresses.push(address);
    }

    serde_json::to_value(addresses).map_err(|e| ConfigError::ParseError(e.to_string()))
}
