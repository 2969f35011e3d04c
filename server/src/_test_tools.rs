#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering::SeqCst;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use http_body_util::Full;
    use hyper::body::Incoming;
    use hyper::header::{HeaderName, AUTHORIZATION};
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{HeaderMap, Request, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use serde_json::json;
    use tokio::net::TcpListener;
    use url::Url;

    use crate::error::FetchError;
    use crate::next_handler::NextHandler;
    use crate::secret_fetcher::{SecretData, SecretFetcher};
    use crate::sw_body::{ok, SwBody};

    /// Serves every connection accepted on `listener` with `handler`.
    async fn serve<H, Fut>(listener: TcpListener, handler: H)
    where
        H: Fn(Request<Incoming>) -> Fut + Clone + Send + Sync + 'static,
        Fut: std::future::Future<Output = Response<Full<Bytes>>> + Send + 'static,
    {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let res = handler(req);
                    async move { Ok::<_, Infallible>(res.await) }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    }

    async fn local_listener() -> (TcpListener, SocketAddr) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    fn respond(status: StatusCode, body: String) -> Response<Full<Bytes>> {
        Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(Full::new(body.into()))
            .unwrap()
    }

    /// Minimal core/v1 secrets endpoint. Keys of `secrets` are "namespace/name".
    pub(crate) struct MockKubeApi {
        pub(crate) base: Url,
        calls: Arc<AtomicUsize>,
        delay_ms: Arc<AtomicUsize>,
    }

    impl MockKubeApi {
        pub(crate) async fn start(secrets: HashMap<String, HashMap<String, String>>) -> Self {
            let (listener, addr) = local_listener().await;
            let secrets = Arc::new(secrets);
            let calls = Arc::new(AtomicUsize::new(0));
            let delay_ms = Arc::new(AtomicUsize::new(0));

            let (c, d) = (calls.clone(), delay_ms.clone());
            tokio::spawn(serve(listener, move |req| {
                let (secrets, calls, delay_ms) = (secrets.clone(), c.clone(), d.clone());
                async move {
                    calls.fetch_add(1, SeqCst);
                    tokio::time::sleep(Duration::from_millis(delay_ms.load(SeqCst) as u64)).await;
                    secret_response(&secrets, &req)
                }
            }));

            MockKubeApi {
                base: Url::parse(&format!("http://{addr}")).unwrap(),
                calls,
                delay_ms,
            }
        }

        pub(crate) fn delay(self, delay: Duration) -> Self {
            self.delay_ms.store(delay.as_millis() as usize, SeqCst);
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(SeqCst)
        }
    }

    fn secret_response(
        secrets: &HashMap<String, HashMap<String, String>>,
        req: &Request<Incoming>,
    ) -> Response<Full<Bytes>> {
        let authorization = req.headers().get(AUTHORIZATION).map(|v| v.as_bytes());
        if authorization != Some(&b"Bearer test-token"[..]) {
            return respond(StatusCode::UNAUTHORIZED, String::new());
        }
        let path = req.uri().path();
        let id = path
            .strip_prefix("/api/v1/namespaces/")
            .and_then(|rest| rest.split_once("/secrets/"))
            .map(|(namespace, name)| format!("{namespace}/{name}"));

        match id.as_ref().and_then(|id| secrets.get(id)) {
            Some(data) => {
                let data: HashMap<&String, String> = data
                    .iter()
                    .map(|(k, v)| (k, STANDARD.encode(v)))
                    .collect();
                respond(
                    StatusCode::OK,
                    json!({"kind": "Secret", "apiVersion": "v1", "type": "Opaque", "data": data})
                        .to_string(),
                )
            }
            None => respond(
                StatusCode::NOT_FOUND,
                json!({
                    "kind": "Status",
                    "apiVersion": "v1",
                    "status": "Failure",
                    "message": format!("secrets {path:?} not found"),
                    "reason": "NotFound",
                    "code": 404
                })
                .to_string(),
            ),
        }
    }

    /// Upstream that answers with the value of one request header.
    pub(crate) struct MockUpstream {
        pub(crate) base: Url,
    }

    impl MockUpstream {
        pub(crate) async fn start(echo_header: &'static str) -> Self {
            let (listener, addr) = local_listener().await;
            tokio::spawn(serve(listener, move |req| async move {
                let value = req
                    .headers()
                    .get(echo_header)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Response::new(Full::new(value.into()))
            }));
            MockUpstream {
                base: Url::parse(&format!("http://{addr}")).unwrap(),
            }
        }
    }

    /// Next handler that remembers the headers of every request it received.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingNext(Arc<Mutex<Vec<HeaderMap>>>);

    impl RecordingNext {
        pub(crate) fn calls(&self) -> usize {
            self.0.lock().unwrap().len()
        }

        pub(crate) fn header(&self, call: usize, name: &str) -> Option<String> {
            let name = HeaderName::try_from(name).unwrap();
            self.0.lock().unwrap()[call]
                .get(name)
                .map(|v| v.to_str().unwrap().to_string())
        }

        pub(crate) fn header_count(&self, call: usize, name: &str) -> usize {
            let name = HeaderName::try_from(name).unwrap();
            self.0.lock().unwrap()[call].get_all(name).iter().count()
        }
    }

    #[async_trait]
    impl NextHandler for RecordingNext {
        async fn call(&self, req: Request<SwBody>) -> hyper::Result<Response<SwBody>> {
            self.0.lock().unwrap().push(req.headers().clone());
            ok()
        }
    }

    /// Secrets kept in memory, keyed by "namespace/name".
    #[derive(Clone, Default)]
    pub(crate) struct InMemorySecretFetcher {
        secrets: Arc<Mutex<HashMap<String, SecretData>>>,
        calls: Arc<AtomicUsize>,
    }

    impl InMemorySecretFetcher {
        pub(crate) fn insert(&self, namespace: &str, name: &str, key: &str, value: &[u8]) {
            self.secrets
                .lock()
                .unwrap()
                .entry(format!("{namespace}/{name}"))
                .or_default()
                .0
                .insert(key.to_string(), value.to_vec());
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(SeqCst)
        }
    }

    #[async_trait]
    impl SecretFetcher for InMemorySecretFetcher {
        async fn fetch(&self, namespace: &str, name: &str) -> Result<SecretData, FetchError> {
            self.calls.fetch_add(1, SeqCst);
            self.secrets
                .lock()
                .unwrap()
                .get(&format!("{namespace}/{name}"))
                .cloned()
                .ok_or_else(|| FetchError::RemoteNotFound {
                    status: StatusCode::NOT_FOUND,
                    body: format!("secrets \"{name}\" not found"),
                })
        }
    }
}
