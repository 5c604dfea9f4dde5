use bytes::Bytes;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, Response, StatusCode};
use std::str::FromStr;
use tracing::warn;

/// Assembles hyper responses. Headers that are not valid HTTP are dropped with a warning.
pub struct ResponseBuilder {
    status: StatusCode,
    body: Bytes,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn new(status: StatusCode) -> Self {
        ResponseBuilder {
            status,
            body: Bytes::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Status from a configured code; anything hyper rejects becomes a 500.
    pub fn with_code(code: u16) -> Self {
        let status = StatusCode::from_u16(code).unwrap_or_else(|_| {
            warn!("Status code {} is not valid, sending 500", code);
            StatusCode::INTERNAL_SERVER_ERROR
        });
        Self::new(status)
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn content_type(self, content_type: &str) -> Self {
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => warn!("Dropping invalid response header {}", name),
        }
        self
    }

    pub fn merge_headers<'a>(self, headers: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        headers
            .into_iter()
            .fold(self, |builder, (name, value)| builder.header(name, value))
    }

    pub fn build_full(self) -> Response<Full<Bytes>> {
        let mut response = Response::new(Full::new(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}
