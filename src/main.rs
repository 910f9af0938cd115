//! Search gateway bootstrap.
//!
//! Usage: `armature-search-gateway [config.json|config.toml]`
//!
//! The config path may also be given through `GATEWAY_CONFIG`. Every setting
//! can be overridden with a `GATEWAY_`-prefixed environment variable.

use armature_search_bus::error::ConfigError;
use armature_search_bus::logging::{self, LogSettings};
use armature_search_bus::prelude::*;
use std::error::Error;
use std::sync::Arc;
use tracing::{error, info};

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() {
    if let Err(e) = logging::init(&LogSettings::from_env()) {
        eprintln!("failed to initialize logging: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Search gateway stopped");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    let path = config_path(std::env::args().skip(1), std::env::var("GATEWAY_CONFIG").ok());
    let config = GatewayConfig::load(path.as_deref())?;

    info!(
        address = %config.address,
        cluster = %config.cluster_name,
        nodes = ?config.endpoints(),
        "Starting search gateway"
    );

    let client = Arc::new(OpenSearchClient::new(config.search_config())?);
    let bus = connect_bus(&config).await?;

    let gateway = Arc::new(SearchGateway::new(client, bus));
    gateway.listen(&config.address).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}

/// First CLI argument, else the `GATEWAY_CONFIG` value.
fn config_path<I>(mut args: I, env: Option<String>) -> Option<String>
where
    I: Iterator<Item = String>,
{
    args.next().or(env).filter(|path| !path.is_empty())
}

/// Connect the transport the gateway serves on.
///
/// An in-process bus has no outside senders, so the binary refuses to start
/// without a reachable one.
#[cfg(feature = "nats")]
async fn connect_bus(config: &GatewayConfig) -> Result<Arc<dyn EventBus>, BoxError> {
    let url = config.bus_url.as_deref().ok_or_else(|| {
        ConfigError::ValidationError("bus_url is required (set GATEWAY_BUS_URL)".to_string())
    })?;
    Ok(Arc::new(NatsBus::connect(url).await?))
}

#[cfg(not(feature = "nats"))]
async fn connect_bus(_config: &GatewayConfig) -> Result<Arc<dyn EventBus>, BoxError> {
    Err(ConfigError::ValidationError(
        "no bus transport compiled in; rebuild with the `nats` feature".to_string(),
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> std::vec::IntoIter<String> {
        values
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_config_path_prefers_argument() {
        assert_eq!(
            config_path(args(&["cli.toml"]), Some("env.json".to_string())),
            Some("cli.toml".to_string())
        );
        assert_eq!(
            config_path(args(&[]), Some("env.json".to_string())),
            Some("env.json".to_string())
        );
        assert_eq!(config_path(args(&[]), Some(String::new())), None);
        assert_eq!(config_path(args(&[]), None), None);
    }

    #[tokio::test]
    async fn test_bus_required() {
        let Err(err) = connect_bus(&GatewayConfig::default()).await else {
            panic!("started without a bus transport");
        };
        assert!(err.to_string().starts_with("Validation error: "), "{err}");
    }

    #[cfg(not(feature = "nats"))]
    #[tokio::test]
    async fn test_bus_url_without_transport() {
        let config = GatewayConfig {
            bus_url: Some("nats://127.0.0.1:4222".to_string()),
            ..GatewayConfig::default()
        };
        let Err(err) = connect_bus(&config).await else {
            panic!("started without a bus transport");
        };
        assert!(err.to_string().contains("nats"), "{err}");
    }
}
