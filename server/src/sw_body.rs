use std::fmt::Display;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tracing::{error, warn};

/// Body type flowing through the middleware and into the next handler.
pub type SwBody = BoxBody<Bytes, hyper::Error>;

#[cfg(test)]
pub(crate) async fn sw_body_to_string(body: SwBody, length: usize) -> Result<String, std::io::Error> {
    let data = body
        .collect()
        .await
        .map_err(|err| {
            std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                format!("Could not pull all frames from body: {err}"),
            )
        })?
        .to_bytes();
    if data.len() > length {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Body is longer than expected",
        ));
    }

    String::from_utf8(data.to_vec()).map_err(|_e| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "Body could not be decoded as utf8",
        )
    })
}

pub(crate) fn incoming_request_into_sw_request(request: Request<Incoming>) -> Request<SwBody> {
    let (parts, body) = request.into_parts();
    Request::from_parts(parts, body.boxed())
}

pub(crate) fn incoming_response_into_sw_response(response: Response<Incoming>) -> Response<SwBody> {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, body.boxed())
}

pub(crate) fn empty() -> SwBody {
    BoxBody::default()
}

fn status_only(status: StatusCode) -> Response<SwBody> {
    let mut res = Response::new(empty());
    *res.status_mut() = status;
    res
}

#[cfg(test)]
pub(crate) fn ok() -> Result<Response<SwBody>, hyper::Error> {
    Ok(status_only(StatusCode::OK))
}

/// The cause is logged, the caller only ever sees an empty 500.
pub(crate) fn internal_server(e: impl Display) -> Result<Response<SwBody>, hyper::Error> {
    error!("Answering internal server error: {e}");
    Ok(status_only(StatusCode::INTERNAL_SERVER_ERROR))
}

pub(crate) fn bad_gateway(e: impl Display) -> Result<Response<SwBody>, hyper::Error> {
    warn!("Answering bad gateway: {e}");
    Ok(status_only(StatusCode::BAD_GATEWAY))
}
