use anyhow::anyhow;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Request, Response};
use tracing::{debug, info};

use crate::config::SecretHeaderConfig;
use crate::error::SetupError;
use crate::next_handler::NextHandler;
use crate::secret_cache::SecretCache;
use crate::secret_fetcher::{KubeSecretFetcher, SecretFetcher};
use crate::sw_body::{internal_server, SwBody};

/// Sets `headerName` on every request from a cached Kubernetes secret field
/// and hands the request to the next handler. Requests for which the secret
/// cannot be read are answered with a 500 and never forwarded.
pub struct SecretHeader<F: SecretFetcher> {
    pub name: String,
    config: SecretHeaderConfig,
    header_name: HeaderName,
    cache: SecretCache,
    fetcher: F,
    next: Box<dyn NextHandler>,
}

impl SecretHeader<KubeSecretFetcher> {
    /// Validates `config` first, then reads the pod's service account.
    pub fn in_cluster(
        name: &str,
        config: SecretHeaderConfig,
        next: impl NextHandler + 'static,
    ) -> Result<Self, SetupError> {
        let config = config.validate()?;
        let fetcher = KubeSecretFetcher::in_cluster()?;
        Self::new(name, config, fetcher, next)
    }
}

impl<F: SecretFetcher> SecretHeader<F> {
    pub fn new(
        name: &str,
        config: SecretHeaderConfig,
        fetcher: F,
        next: impl NextHandler + 'static,
    ) -> Result<Self, SetupError> {
        let config = config.validate()?;
        let header_name = config.parsed_header_name()?;

        info!(
            "Middleware '{name}' initialized: secret={}/{} key={} header={} ttl={}s",
            config.namespace,
            config.secret_name,
            config.secret_key,
            config.header_name,
            config.cache_ttl
        );

        Ok(SecretHeader {
            name: name.to_string(),
            cache: SecretCache::new(config.cache_ttl()),
            header_name,
            config,
            fetcher,
            next: Box::new(next),
        })
    }

    fn compose(&self, value: &str) -> anyhow::Result<HeaderValue> {
        Ok(HeaderValue::from_str(&format!(
            "{}{value}",
            self.config.value_prefix
        ))?)
    }

    async fn header_value(&self) -> anyhow::Result<HeaderValue> {
        if let Some(value) = self.cache.get() {
            debug!("Middleware '{}' cache hit", self.name);
            return self.compose(&value);
        }

        let SecretHeaderConfig {
            namespace,
            secret_name,
            secret_key,
            ..
        } = &self.config;
        debug!("Middleware '{}' cache miss, reading {namespace}/{secret_name}", self.name);

        let data = self.fetcher.fetch(namespace, secret_name).await?;
        let value = String::from_utf8(data.field(secret_key)?.to_vec())
            .map_err(|_| anyhow!("value of field '{secret_key}' is not valid utf8"))?;
        let header_value = self.compose(&value)?;

        self.cache.set(value);
        Ok(header_value)
    }

    pub async fn handle(&self, mut req: Request<SwBody>) -> hyper::Result<Response<SwBody>> {
        let value = match self.header_value().await {
            Ok(value) => value,
            Err(e) => {
                return internal_server(format!(
                    "middleware '{}' failed to read key '{}' of secret {}/{}: {e}",
                    self.name,
                    self.config.secret_key,
                    self.config.namespace,
                    self.config.secret_name
                ))
            }
        };

        req.headers_mut().insert(self.header_name.clone(), value);
        self.next.call(req).await
    }
}
