use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Limited};
use hyper::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use hyper::{Request, Uri};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{CredentialError, FetchError};
use crate::secret_fetcher::cluster_credentials::bearer_authorization;
use crate::secret_fetcher::{ClusterCredentials, SecretData, SecretFetcher};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Secrets are capped at 1MiB by the API server, this leaves room for
/// base64 and the object metadata.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 4 * 1024 * 1024;

/// The part of a `v1.Secret` we care about. Values are base64 on the wire.
#[derive(Deserialize)]
struct SecretObject {
    #[serde(default)]
    data: HashMap<String, String>,
}

/// Reads secrets through the Kubernetes core/v1 REST API.
pub struct KubeSecretFetcher {
    api_server: Url,
    authorization: HeaderValue,
    timeout: Duration,
    max_response_bytes: usize,
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
}

impl KubeSecretFetcher {
    pub fn in_cluster() -> Result<Self, CredentialError> {
        Self::from_credentials(ClusterCredentials::in_cluster()?)
    }

    /// Builds a TLS transport that trusts exactly the cluster CA bundle.
    pub fn from_credentials(credentials: ClusterCredentials) -> Result<Self, CredentialError> {
        let mut tls = native_tls::TlsConnector::builder();
        for cert in credentials.ca_certs {
            tls.add_root_certificate(cert);
        }
        let tls = tls.disable_built_in_roots(true).build()?;

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let https = HttpsConnector::from((http, tokio_native_tls::TlsConnector::from(tls)));

        Ok(Self::with_connector(
            credentials.api_server,
            credentials.authorization,
            https,
        ))
    }

    /// Uses the system trust store, e.g. behind `kubectl proxy` or in tests.
    pub fn new(api_server: Url, token: &str) -> Result<Self, CredentialError> {
        Ok(Self::with_connector(
            api_server,
            bearer_authorization(token)?,
            HttpsConnector::new(),
        ))
    }

    fn with_connector(
        api_server: Url,
        authorization: HeaderValue,
        https: HttpsConnector<HttpConnector>,
    ) -> Self {
        KubeSecretFetcher {
            api_server,
            authorization,
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            client: Client::builder(TokioExecutor::new()).build(https),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Responses larger than this fail with [`FetchError::Body`].
    pub fn max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    fn secret_url(&self, namespace: &str, name: &str) -> Url {
        let mut url = self.api_server.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v1", "namespaces", namespace, "secrets", name]);
        }
        url
    }

    async fn get(&self, uri: Uri) -> Result<SecretData, FetchError> {
        let req = Request::get(uri)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(ACCEPT, "application/json")
            .body(Empty::new())?;

        let res = self.client.request(req).await?;
        let status = res.status();
        let body = Limited::new(res.into_body(), self.max_response_bytes)
            .collect()
            .await
            .map_err(FetchError::Body)?
            .to_bytes();

        if !status.is_success() {
            return Err(FetchError::RemoteNotFound {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let secret: SecretObject = serde_json::from_slice(&body)?;
        decode_data(secret.data)
    }
}

fn decode_data(data: HashMap<String, String>) -> Result<SecretData, FetchError> {
    let mut decoded = HashMap::with_capacity(data.len());
    for (key, value) in data {
        match STANDARD.decode(value.as_bytes()) {
            Ok(bytes) => {
                decoded.insert(key, bytes);
            }
            Err(source) => return Err(FetchError::Decode { key, source }),
        }
    }
    Ok(SecretData(decoded))
}

#[async_trait]
impl SecretFetcher for KubeSecretFetcher {
    async fn fetch(&self, namespace: &str, name: &str) -> Result<SecretData, FetchError> {
        let url = self.secret_url(namespace, name);
        let uri: Uri = url.as_str().parse().map_err(hyper::http::Error::from)?;
        debug!("Reading secret {namespace}/{name} from {}", self.api_server);

        tokio::time::timeout(self.timeout, self.get(uri))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))?
    }
}
