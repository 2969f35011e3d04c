use std::collections::HashMap;

use async_trait::async_trait;

pub use cluster_credentials::*;
pub use kube_secret_fetcher::*;

use crate::error::FetchError;

mod cluster_credentials;
mod kube_secret_fetcher;

/// Decoded fields of a secret object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretData(pub HashMap<String, Vec<u8>>);

impl SecretData {
    pub fn field(&self, key: &str) -> Result<&[u8], FetchError> {
        self.0
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| FetchError::FieldNotFound {
                key: key.to_string(),
            })
    }
}

#[async_trait]
pub trait SecretFetcher: Send + Sync {
    /// Reads the secret `name` in `namespace`. Exactly one remote request, no retries.
    async fn fetch(&self, namespace: &str, name: &str) -> Result<SecretData, FetchError>;
}
