use std::path::PathBuf;
use std::time::Duration;

use hyper::StatusCode;
use thiserror::Error;

/// Invalid middleware configuration. Detected before any credential is read.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} cannot be empty")]
    MissingField(&'static str),
    #[error("invalid header name '{name}': {source}")]
    InvalidHeaderName {
        name: String,
        #[source]
        source: hyper::header::InvalidHeaderName,
    },
    #[error("valuePrefix is not a valid header value: {0}")]
    InvalidValuePrefix(#[source] hyper::header::InvalidHeaderValue),
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The in-cluster credentials or transport could not be set up.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("service account token at {0} is empty")]
    EmptyToken(PathBuf),
    #[error("invalid bearer token: {0}")]
    InvalidToken(String),
    #[error("invalid CA bundle at {path}: {reason}")]
    InvalidCaBundle { path: PathBuf, reason: String },
    #[error("failed to build TLS connector: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("invalid API server endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
}

/// Anything that prevents the middleware from becoming ready.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

/// A single secret read failed. Never surfaced to the downstream caller.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("secret store answered {status}: {body}")]
    RemoteNotFound { status: StatusCode, body: String },
    #[error("value of field '{key}' is not valid base64: {source}")]
    Decode {
        key: String,
        #[source]
        source: base64::DecodeError,
    },
    #[error("field '{key}' not found in secret")]
    FieldNotFound { key: String },
    #[error("transport error: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),
    #[error("failed to read response body: {0}")]
    Body(Box<dyn std::error::Error + Send + Sync>),
    #[error("malformed secret object: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("failed to build request: {0}")]
    Request(#[from] hyper::http::Error),
    #[error("secret read did not complete within {0:?}")]
    Timeout(Duration),
}
