use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP method a resource answers to. `Any` matches every method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourceMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
    Connect,
    Any,
}

impl ResourceMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceMethod::Get => "GET",
            ResourceMethod::Post => "POST",
            ResourceMethod::Put => "PUT",
            ResourceMethod::Delete => "DELETE",
            ResourceMethod::Patch => "PATCH",
            ResourceMethod::Head => "HEAD",
            ResourceMethod::Options => "OPTIONS",
            ResourceMethod::Trace => "TRACE",
            ResourceMethod::Connect => "CONNECT",
            ResourceMethod::Any => "ANY",
        }
    }
}

impl fmt::Display for ResourceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(ResourceMethod::Get),
            "POST" => Ok(ResourceMethod::Post),
            "PUT" => Ok(ResourceMethod::Put),
            "DELETE" => Ok(ResourceMethod::Delete),
            "PATCH" => Ok(ResourceMethod::Patch),
            "HEAD" => Ok(ResourceMethod::Head),
            "OPTIONS" => Ok(ResourceMethod::Options),
            "TRACE" => Ok(ResourceMethod::Trace),
            "CONNECT" => Ok(ResourceMethod::Connect),
            "ANY" | "*" => Ok(ResourceMethod::Any),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

impl TryFrom<String> for ResourceMethod {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceMethod> for String {
    fn from(method: ResourceMethod) -> Self {
        method.as_str().to_string()
    }
}

/// Shape of a REST resource: a single object or an array addressed by ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    #[default]
    Object,
    Array,
}

/// A child resource in a plugin configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<ResourceMethod>,

    #[serde(default, rename = "type")]
    pub resource_type: ResourceType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseConfig>,
}

/// Static response settings, optionally driven by a script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConfig {
    #[serde(
        default,
        deserialize_with = "deserialize_status_code",
        skip_serializing_if = "Option::is_none"
    )]
    pub status_code: Option<u16>,

    /// File served as the body, relative to the config file's directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_file: Option<String>,

    /// Inline body. Strings are sent as-is, anything else is serialized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_data: Option<serde_json::Value>,

    /// OpenAPI example to prefer when several are declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example_name: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_file: Option<String>,

    /// Inline Rhai script, used when no `scriptFile` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

impl ResponseConfig {
    /// Fill every unset field from `root`.
    pub fn inherit_from(&self, root: &ResponseConfig) -> ResponseConfig {
        let mut headers = root.headers.clone();
        headers.extend(self.headers.clone());

        // a child with its own script keeps it; otherwise the root's applies
        let (script_file, script) = if self.script_file.is_some() || self.script.is_some() {
            (self.script_file.clone(), self.script.clone())
        } else {
            (root.script_file.clone(), root.script.clone())
        };

        ResponseConfig {
            status_code: self.status_code.or(root.status_code),
            static_file: self.static_file.clone().or_else(|| root.static_file.clone()),
            static_data: self.static_data.clone().or_else(|| root.static_data.clone()),
            example_name: self
                .example_name
                .clone()
                .or_else(|| root.example_name.clone()),
            headers,
            script_file,
            script,
        }
    }
}

/// Accept `statusCode` as either a number or a numeric string.
fn deserialize_status_code<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u16::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom("invalid status code number")),
        Some(serde_json::Value::String(s)) => s
            .parse::<u16>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid status code string: {s}"))),
        Some(_) => Err(D::Error::custom("statusCode must be a number or string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse_case_insensitive() {
        assert_eq!("get".parse::<ResourceMethod>().unwrap(), ResourceMethod::Get);
        assert_eq!("Any".parse::<ResourceMethod>().unwrap(), ResourceMethod::Any);
        assert!("FETCH".parse::<ResourceMethod>().is_err());
    }

    #[test]
    fn test_status_code_from_string_or_number() {
        let a: ResponseConfig = serde_yaml::from_str("statusCode: \"201\"").unwrap();
        let b: ResponseConfig = serde_yaml::from_str("statusCode: 204").unwrap();
        let c: ResponseConfig = serde_yaml::from_str("exampleName: foo").unwrap();
        assert_eq!(a.status_code, Some(201));
        assert_eq!(b.status_code, Some(204));
        assert_eq!(c.status_code, None);
        assert!(serde_yaml::from_str::<ResponseConfig>("statusCode: [1]").is_err());
    }

    #[test]
    fn test_resource_type_defaults_to_object() {
        let resource: ResourceConfig = serde_yaml::from_str("path: /things").unwrap();
        assert_eq!(resource.resource_type, ResourceType::Object);
        assert_eq!(resource.method, None);
    }

    #[test]
    fn test_inherit_from_root() {
        let root = ResponseConfig {
            status_code: Some(202),
            static_file: Some("root.json".into()),
            headers: IndexMap::from([("X-Root".to_string(), "1".to_string())]),
            script: Some("respond()".into()),
            ..Default::default()
        };
        let child = ResponseConfig {
            static_file: Some("child.json".into()),
            headers: IndexMap::from([("X-Child".to_string(), "2".to_string())]),
            ..Default::default()
        };

        let merged = child.inherit_from(&root);
        assert_eq!(merged.status_code, Some(202));
        assert_eq!(merged.static_file.as_deref(), Some("child.json"));
        assert_eq!(merged.headers.len(), 2);
        assert_eq!(merged.script.as_deref(), Some("respond()"));
    }
}
