use std::path::{Path, PathBuf};

use hyper::header::HeaderValue;
use native_tls::Certificate;
use openssl::x509::X509;
use url::Url;

use crate::error::CredentialError;

pub const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";
pub const SERVICE_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT";
pub const SERVICE_ACCOUNT_TOKEN_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
pub const SERVICE_ACCOUNT_CA_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";

/// Everything needed to talk to the API server from inside a pod. Read once,
/// at startup.
pub struct ClusterCredentials {
    pub api_server: Url,
    /// `Bearer <token>`, validated as a header value.
    pub authorization: HeaderValue,
    pub ca_certs: Vec<Certificate>,
}

impl ClusterCredentials {
    /// Uses the service account mounted into the pod and the service
    /// environment variables injected by the kubelet.
    pub fn in_cluster() -> Result<Self, CredentialError> {
        let host = required_env(SERVICE_HOST_ENV)?;
        let port = required_env(SERVICE_PORT_ENV)?;
        Self::from_parts(
            &host,
            &port,
            Path::new(SERVICE_ACCOUNT_TOKEN_PATH),
            Path::new(SERVICE_ACCOUNT_CA_PATH),
        )
    }

    pub fn from_parts(
        host: &str,
        port: &str,
        token_path: &Path,
        ca_path: &Path,
    ) -> Result<Self, CredentialError> {
        Ok(ClusterCredentials {
            api_server: api_server_url(host, port)?,
            authorization: read_token(token_path)?,
            ca_certs: read_ca_bundle(ca_path)?,
        })
    }
}

fn required_env(name: &'static str) -> Result<String, CredentialError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(CredentialError::MissingEnv(name))
}

fn read_file(path: &Path) -> Result<Vec<u8>, CredentialError> {
    std::fs::read(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn api_server_url(host: &str, port: &str) -> Result<Url, CredentialError> {
    let endpoint = if host.contains(':') && !host.starts_with('[') {
        format!("https://[{host}]:{port}")
    } else {
        format!("https://{host}:{port}")
    };
    Url::parse(&endpoint).map_err(|source| CredentialError::InvalidEndpoint { endpoint, source })
}

/// Builds the `Authorization` value sent with every API request.
pub(crate) fn bearer_authorization(token: &str) -> Result<HeaderValue, CredentialError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
        CredentialError::InvalidToken("contains characters not allowed in a header".to_string())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

fn read_token(path: &Path) -> Result<HeaderValue, CredentialError> {
    let raw = read_file(path)?;
    let token = String::from_utf8(raw).map_err(|_| {
        CredentialError::InvalidToken(format!("{} is not valid utf8", path.display()))
    })?;
    let token = token.trim();
    if token.is_empty() {
        return Err(CredentialError::EmptyToken(path.to_path_buf()));
    }
    bearer_authorization(token)
}

fn read_ca_bundle(path: &Path) -> Result<Vec<Certificate>, CredentialError> {
    let invalid = |reason: String| CredentialError::InvalidCaBundle {
        path: PathBuf::from(path),
        reason,
    };

    let pem = read_file(path)?;
    let stack = X509::stack_from_pem(&pem).map_err(|e| invalid(e.to_string()))?;
    if stack.is_empty() {
        return Err(invalid("no certificates found".to_string()));
    }

    let mut certs = Vec::with_capacity(stack.len());
    for x509 in stack {
        let der = x509.to_der().map_err(|e| invalid(e.to_string()))?;
        certs.push(Certificate::from_der(&der)?);
    }
    Ok(certs)
}
