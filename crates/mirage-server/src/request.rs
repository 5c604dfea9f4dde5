//! Inbound request facts as the pipeline sees them.

use bytes::Bytes;
use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundRequest {
    pub method: String,
    pub path: String,
    pub query: IndexMap<String, String>,
    /// Header names are lowercased; repeated headers are joined with `, `
    pub headers: IndexMap<String, String>,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        InboundRequest {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query_string(mut self, query: &str) -> Self {
        self.query = parse_query(query);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        let name = name.to_ascii_lowercase();
        match self.headers.get_mut(&name) {
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => {
                self.headers.insert(name, value.to_string());
            }
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body_text(&self) -> Option<String> {
        if self.body.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.body).into_owned())
        }
    }
}

/// Decode `a=1&b=two+words`. The first occurrence of a key wins.
pub fn parse_query(query: &str) -> IndexMap<String, String> {
    let decode = |raw: &str| {
        let spaced = raw.replace('+', " ");
        urlencoding::decode(&spaced)
            .map(|v| v.into_owned())
            .unwrap_or(spaced)
    };

    let mut params = IndexMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.entry(decode(key)).or_insert_with(|| decode(value));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let query = parse_query("name=two+words&id=%41&id=ignored&flag");
        assert_eq!(query["name"], "two words");
        assert_eq!(query["id"], "A");
        assert_eq!(query["flag"], "");
        assert_eq!(query.len(), 3);
    }

    #[test]
    fn test_headers_case_insensitive_and_joined() {
        let request = InboundRequest::new("get", "/")
            .with_header("Accept", "application/json")
            .with_header("accept", "text/plain");
        assert_eq!(request.method, "GET");
        assert_eq!(request.header("ACCEPT"), Some("application/json, text/plain"));
    }

    #[test]
    fn test_body_text() {
        assert_eq!(InboundRequest::new("GET", "/").body_text(), None);
        let request = InboundRequest::new("POST", "/").with_body("hi");
        assert_eq!(request.body_text().as_deref(), Some("hi"));
    }
}
