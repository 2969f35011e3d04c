use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use kube_secret_header_server::{
    SecretHeader, SecretHeaderConfig, SecretHeaderServer, UpstreamProxy,
};
use tracing::Level;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "kube-secret-header")]
#[command(about = "Injects a header read from a Kubernetes Secret into every proxied request")]
struct Cli {
    /// JSON file with secretName, secretKey, headerName, namespace, cacheTTL and valuePrefix
    #[arg(short, long, env = "SECRET_HEADER_CONFIG")]
    config: Option<PathBuf>,

    /// Name of the Secret object
    #[arg(long, env = "SECRET_NAME")]
    secret_name: Option<String>,

    /// Field of the Secret whose value goes into the header
    #[arg(long, env = "SECRET_KEY")]
    secret_key: Option<String>,

    /// Header to set on every request
    #[arg(long, env = "HEADER_NAME")]
    header_name: Option<String>,

    /// Namespace of the Secret object
    #[arg(long, env = "SECRET_NAMESPACE")]
    namespace: Option<String>,

    /// Seconds a fetched value is reused, 0 disables caching
    #[arg(long, env = "CACHE_TTL")]
    cache_ttl: Option<u64>,

    /// Prepended to the secret value, e.g. "Bearer "
    #[arg(long, env = "VALUE_PREFIX")]
    value_prefix: Option<String>,

    /// Where requests are forwarded once the header is set
    #[arg(short, long, env = "UPSTREAM_URL")]
    upstream: Url,

    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Name of this middleware instance, shows up in logs
    #[arg(long, default_value = "kube-secret-header")]
    name: String,

    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,
}

impl Cli {
    /// Flags win over the config file, the config file wins over defaults.
    fn secret_header_config(&self) -> Result<SecretHeaderConfig> {
        let mut config = match &self.config {
            Some(path) => SecretHeaderConfig::from_file(path)?,
            None => SecretHeaderConfig::default(),
        };
        if let Some(v) = &self.secret_name {
            config.secret_name = v.clone();
        }
        if let Some(v) = &self.secret_key {
            config.secret_key = v.clone();
        }
        if let Some(v) = &self.header_name {
            config.header_name = v.clone();
        }
        if let Some(v) = &self.namespace {
            config.namespace = v.clone();
        }
        if let Some(v) = self.cache_ttl {
            config.cache_ttl = v;
        }
        if let Some(v) = &self.value_prefix {
            config.value_prefix = v.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .json()
        .with_max_level(cli.log_level)
        .init();

    let secret_header = SecretHeader::in_cluster(
        &cli.name,
        cli.secret_header_config()?,
        UpstreamProxy::new(cli.upstream.clone())?,
    )?;
    let server = Box::leak(Box::new(SecretHeaderServer::from_port(
        secret_header,
        cli.port,
    )));
    server.start().await
}
