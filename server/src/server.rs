use std::net::SocketAddr;

use anyhow::Result;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::secret_fetcher::SecretFetcher;
use crate::secret_header::SecretHeader;
use crate::sw_body::incoming_request_into_sw_request;

pub struct SecretHeaderServer<F: SecretFetcher> {
    pub port: u16,
    pub secret_header: SecretHeader<F>,
}

impl<F: SecretFetcher + 'static> SecretHeaderServer<F> {
    pub fn from_port(secret_header: SecretHeader<F>, port: u16) -> SecretHeaderServer<F> {
        SecretHeaderServer {
            port,
            secret_header,
        }
    }

    pub async fn start(&'static self) -> Result<()> {
        let in_addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let listener = TcpListener::bind(in_addr).await?;

        info!("Server running in {}", in_addr);
        self.serve(listener).await
    }

    pub async fn serve(&'static self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, _) = listener.accept().await?;

            let service = service_fn(move |req: Request<Incoming>| async move {
                self.secret_header
                    .handle(incoming_request_into_sw_request(req))
                    .await
            });

            tokio::spawn(async move {
                if let Err(err) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    error!("Failed to serve the connection: {:?}", err);
                }
            });
        }
    }
}
