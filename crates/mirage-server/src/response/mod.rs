//! Outbound responses and body encoding.

mod builder;

pub use builder::ResponseBuilder;

use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ResolutionError;

const SERVER_ERROR_BODY: &str = "Internal Server Error";

/// What the pipeline decided to send.
#[derive(Debug, Clone, PartialEq)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: IndexMap<String, String>,
    pub body: Option<Bytes>,
}

impl MockResponse {
    pub fn new(status: u16) -> Self {
        MockResponse {
            status,
            content_type: None,
            headers: IndexMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.content_type = Some(content_type.to_string());
        self.body = Some(body.into());
        self
    }

    pub fn with_headers(mut self, headers: IndexMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// 404 with an empty body.
    pub fn not_found() -> Self {
        Self::new(404)
    }

    /// 500 with a generic body. Failure details only go to the log.
    pub fn server_error() -> Self {
        Self::new(500).with_body("text/plain", SERVER_ERROR_BODY)
    }

    pub fn body_text(&self) -> Option<&str> {
        self.body.as_ref().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn into_hyper(self) -> Response<Full<Bytes>> {
        let mut builder = ResponseBuilder::with_code(self.status);
        if let Some(content_type) = &self.content_type {
            builder = builder.content_type(content_type);
        }
        builder
            .merge_headers(&self.headers)
            .body(self.body.unwrap_or_default())
            .build_full()
    }
}

fn is_yaml(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence.ends_with("/yaml") || essence.ends_with("/x-yaml") || essence.ends_with("+yaml")
}

/// Serialize a body value. Strings go out as-is; YAML types get YAML,
/// everything else pretty-printed JSON.
pub fn encode_body(value: &Value, content_type: &str) -> Result<Bytes, ResolutionError> {
    if let Value::String(text) = value {
        return Ok(Bytes::from(text.clone()));
    }

    let encoded = if is_yaml(content_type) {
        serde_yaml::to_string(value).map_err(|e| e.to_string())
    } else {
        serde_json::to_string_pretty(value).map_err(|e| e.to_string())
    };

    encoded
        .map(Bytes::from)
        .map_err(|message| ResolutionError::Encode {
            content_type: content_type.to_string(),
            message,
        })
}
