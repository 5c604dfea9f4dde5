//! Typed view of an OpenAPI 3 document.
//!
//! Only the parts the mock needs are modelled. Maps are `IndexMap`s so that
//! declaration order survives parsing, which drives every "first declared"
//! rule in example resolution. Schemas stay as raw JSON values and are
//! interpreted lazily by the synthesizer.
//!
//! Objects whose keys are open-ended (`paths`, `responses`) may also carry
//! `x-` vendor extensions of any shape; those keys are skipped.

use indexmap::IndexMap;
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::path::Path;

use crate::config::ResourceMethod;
use crate::error::ConfigError;

/// Either an inline object or a `$ref` to a component.
///
/// A `$ref` wins over any sibling fields, which the untagged representation
/// gives for free: the `Ref` variant is tried first and ignores extra keys.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RefOr<T> {
    Ref {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Item(T),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenApiDocument {
    #[serde(default)]
    pub openapi: Option<String>,
    #[serde(default)]
    pub swagger: Option<String>,
    #[serde(default)]
    pub info: Option<Value>,
    #[serde(default, deserialize_with = "without_extensions")]
    pub paths: IndexMap<String, PathItem>,
    #[serde(default)]
    pub components: Components,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathItem {
    pub get: Option<Operation>,
    pub put: Option<Operation>,
    pub post: Option<Operation>,
    pub delete: Option<Operation>,
    pub options: Option<Operation>,
    pub head: Option<Operation>,
    pub patch: Option<Operation>,
    pub trace: Option<Operation>,
}

impl PathItem {
    /// Declared operations with their methods.
    pub fn operations(&self) -> impl Iterator<Item = (ResourceMethod, &Operation)> {
        [
            (ResourceMethod::Get, &self.get),
            (ResourceMethod::Put, &self.put),
            (ResourceMethod::Post, &self.post),
            (ResourceMethod::Delete, &self.delete),
            (ResourceMethod::Options, &self.options),
            (ResourceMethod::Head, &self.head),
            (ResourceMethod::Patch, &self.patch),
            (ResourceMethod::Trace, &self.trace),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub operation_id: Option<String>,
    #[serde(default, deserialize_with = "without_extensions")]
    pub responses: IndexMap<String, RefOr<ApiResponse>>,
}

impl Operation {
    /// Pick the response definition for a status code.
    ///
    /// With a status: the exact code, then its `NXX` range, then `default`.
    /// Without one: `200`, then `default` (served as 200), then the first
    /// declared 2xx code.
    pub fn select_response(&self, status: Option<u16>) -> Option<(u16, &RefOr<ApiResponse>)> {
        match status {
            Some(code) => {
                let range = format!("{}XX", code / 100);
                self.responses
                    .get(&code.to_string())
                    .or_else(|| {
                        self.responses
                            .iter()
                            .find(|(key, _)| key.eq_ignore_ascii_case(&range))
                            .map(|(_, response)| response)
                    })
                    .or_else(|| self.responses.get("default"))
                    .map(|response| (code, response))
            }
            None => {
                if let Some(response) = self.responses.get("200") {
                    return Some((200, response));
                }
                if let Some(response) = self.responses.get("default") {
                    return Some((200, response));
                }
                self.responses.iter().find_map(|(key, response)| {
                    key.parse::<u16>()
                        .ok()
                        .filter(|code| (200..300).contains(code))
                        .map(|code| (code, response))
                })
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub headers: IndexMap<String, Value>,
    #[serde(default)]
    pub content: Option<IndexMap<String, MediaType>>,
}

impl ApiResponse {
    /// Header values the document gives examples for.
    pub fn example_headers(&self) -> impl Iterator<Item = (&str, String)> {
        self.headers.iter().filter_map(|(name, header)| {
            let example = header
                .get("example")
                .or_else(|| header.pointer("/schema/example"))?;
            let value = match example {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((name.as_str(), value))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MediaType {
    #[serde(default)]
    pub schema: Option<Value>,
    #[serde(default)]
    pub example: Option<Value>,
    #[serde(default)]
    pub examples: Option<IndexMap<String, RefOr<Example>>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Example {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub external_value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Components {
    #[serde(default)]
    pub schemas: IndexMap<String, Value>,
    #[serde(default)]
    pub responses: IndexMap<String, RefOr<ApiResponse>>,
    #[serde(default)]
    pub examples: IndexMap<String, RefOr<Example>>,
}

fn is_extension(key: &str) -> bool {
    key.starts_with("x-")
}

/// Deserialize a map, dropping `x-` keys before their values are typed.
fn without_extensions<'de, D, V>(deserializer: D) -> Result<IndexMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct ExtensionFree<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for ExtensionFree<V> {
        type Value = IndexMap<String, V>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut entries = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(key) = map.next_key::<String>()? {
                if is_extension(&key) {
                    map.next_value::<IgnoredAny>()?;
                } else {
                    let value = map.next_value()?;
                    entries.insert(key, value);
                }
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(ExtensionFree(PhantomData))
}

impl OpenApiDocument {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Parse a JSON or YAML document. `origin` only labels errors.
    pub fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::InvalidSpec {
            path: origin.to_path_buf(),
            message,
        };

        let document: OpenApiDocument =
            serde_yaml::from_str(content).map_err(|e| invalid(e.to_string()))?;

        match (&document.openapi, &document.swagger) {
            (Some(version), _) if version.starts_with('3') => Ok(document),
            (Some(version), _) => Err(invalid(format!("unsupported OpenAPI version {version}"))),
            (None, Some(_)) => Err(invalid("Swagger 2.0 documents are not supported".into())),
            (None, None) => Err(invalid("missing 'openapi' version field".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PETSTORE: &str = r##"
openapi: 3.0.1
info:
  title: Pets
  version: "1"
paths:
  /pets:
    get:
      operationId: listPets
      responses:
        200:
          description: ok
          headers:
            X-Rate-Limit:
              schema:
                type: integer
                example: 100
          content:
            application/json:
              example: [{"id": 1}]
    post:
      responses:
        "201":
          $ref: "#/components/responses/Created"
components:
  responses:
    Created:
      description: created
"##;

    #[test]
    fn test_parse_keeps_order_and_refs() {
        let doc = OpenApiDocument::parse(PETSTORE, Path::new("pets.yaml")).unwrap();
        let item = &doc.paths["/pets"];
        let methods: Vec<_> = item.operations().map(|(m, _)| m).collect();
        assert_eq!(methods, vec![ResourceMethod::Get, ResourceMethod::Post]);

        let post = item.post.as_ref().unwrap();
        assert!(matches!(
            &post.responses["201"],
            RefOr::Ref { reference } if reference == "#/components/responses/Created"
        ));
    }

    #[test]
    fn test_ref_wins_over_siblings() {
        let response: RefOr<ApiResponse> = serde_json::from_str(
            r##"{"$ref": "#/components/responses/X", "description": "ignored", "content": {}}"##,
        )
        .unwrap();
        assert!(matches!(response, RefOr::Ref { .. }));
    }

    #[test]
    fn test_example_headers() {
        let doc = OpenApiDocument::parse(PETSTORE, Path::new("pets.yaml")).unwrap();
        let get = doc.paths["/pets"].get.as_ref().unwrap();
        let RefOr::Item(response) = &get.responses["200"] else {
            panic!("expected inline response");
        };
        let headers: Vec<_> = response.example_headers().collect();
        assert_eq!(headers, vec![("X-Rate-Limit", "100".to_string())]);
    }

    #[test]
    fn test_select_response() {
        let op: Operation = serde_json::from_value(serde_json::json!({
            "responses": {
                "201": {"description": "created"},
                "4XX": {"description": "client error"},
                "default": {"description": "fallback"}
            }
        }))
        .unwrap();

        assert_eq!(op.select_response(Some(201)).unwrap().0, 201);
        let (code, response) = op.select_response(Some(404)).unwrap();
        assert_eq!(code, 404);
        assert!(matches!(response, RefOr::Item(r) if r.description.as_deref() == Some("client error")));
        let (_, fallback) = op.select_response(Some(500)).unwrap();
        assert!(matches!(fallback, RefOr::Item(r) if r.description.as_deref() == Some("fallback")));
        assert_eq!(op.select_response(None).unwrap().0, 200);
    }

    #[test]
    fn test_select_first_2xx_without_200_or_default() {
        let op: Operation = serde_json::from_value(serde_json::json!({
            "responses": {"404": {}, "202": {}, "204": {}}
        }))
        .unwrap();
        assert_eq!(op.select_response(None).unwrap().0, 202);
    }

    #[test]
    fn test_vendor_extensions_skipped() {
        let doc = OpenApiDocument::parse(
            r##"
openapi: 3.0.3
x-owner: reports-team
paths:
  x-internal: true
  x-tags: [a, b]
  /reports:
    x-audited: {since: 2020}
    get:
      x-rate-limit: 10
      responses:
        x-generated: true
        x-shape: {description: not a response}
        "200":
          description: ok
          x-cache: 60
"##,
            Path::new("reports.yaml"),
        )
        .unwrap();

        assert_eq!(doc.paths.keys().collect::<Vec<_>>(), vec!["/reports"]);
        let get = doc.paths["/reports"].get.as_ref().unwrap();
        assert_eq!(get.responses.keys().collect::<Vec<_>>(), vec!["200"]);
    }

    #[test]
    fn test_rejects_swagger_2() {
        let err = OpenApiDocument::parse("swagger: '2.0'\npaths: {}", Path::new("old.yaml"))
            .unwrap_err();
        assert!(err.to_string().contains("Swagger 2.0"));
    }
}
