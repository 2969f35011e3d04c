use anyhow::{anyhow, Result};
use async_trait::async_trait;
use hyper::header::{HeaderValue, HOST};
use hyper::http::uri::PathAndQuery;
use hyper::{Request, Response, Uri};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;
use url::Url;

use crate::sw_body::{bad_gateway, incoming_response_into_sw_response, SwBody};

/// Stage that receives the request once the secret header is in place.
/// Invoked at most once per request, and only if the header could be set.
#[async_trait]
pub trait NextHandler: Sync + Send {
    async fn call(&self, req: Request<SwBody>) -> hyper::Result<Response<SwBody>>;
}

/// Forwards requests to a fixed upstream, keeping their path and query.
pub struct UpstreamProxy {
    upstream: Url,
    host: HeaderValue,
    client: Client<HttpsConnector<HttpConnector>, SwBody>,
}

impl UpstreamProxy {
    pub fn new(upstream: Url) -> Result<Self> {
        let host = match (upstream.host_str(), upstream.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(anyhow!("upstream url {upstream} has no host")),
        };

        Ok(UpstreamProxy {
            host: host.parse()?,
            upstream,
            client: Client::builder(TokioExecutor::new()).build(HttpsConnector::new()),
        })
    }

    fn forward_uri(&self, uri: &Uri) -> Result<Uri> {
        let base_path = self.upstream.path().trim_end_matches('/');
        let path_and_query = uri
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or("/");

        Ok(Uri::builder()
            .scheme(self.upstream.scheme())
            .authority(self.host.to_str()?)
            .path_and_query(format!("{base_path}{path_and_query}"))
            .build()?)
    }
}

#[async_trait]
impl NextHandler for UpstreamProxy {
    async fn call(&self, mut req: Request<SwBody>) -> hyper::Result<Response<SwBody>> {
        let uri = match self.forward_uri(req.uri()) {
            Ok(uri) => uri,
            Err(e) => return bad_gateway(e),
        };
        debug!("Forwarding {} {} to {uri}", req.method(), req.uri());
        *req.uri_mut() = uri;
        req.headers_mut().insert(HOST, self.host.clone());

        match self.client.request(req).await {
            Ok(res) => Ok(incoming_response_into_sw_response(res)),
            Err(e) => bad_gateway(e),
        }
    }
}
