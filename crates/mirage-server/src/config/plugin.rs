use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::resource::{ResourceConfig, ResourceMethod, ResponseConfig};
use crate::error::ConfigError;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Which mock backend serves a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PluginKind {
    Rest,
    OpenApi,
}

impl PluginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::Rest => "rest",
            PluginKind::OpenApi => "openapi",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rest" => Ok(PluginKind::Rest),
            "openapi" | "swagger" => Ok(PluginKind::OpenApi),
            _ => Err(ConfigError::UnknownPlugin(s.to_string())),
        }
    }
}

impl TryFrom<String> for PluginKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PluginKind> for String {
    fn from(kind: PluginKind) -> Self {
        kind.as_str().to_string()
    }
}

/// One `*-config.{json,yaml,yml}` file.
///
/// The root `path`/`method`/`response` describe the root resource; `resources`
/// are its children. For the OpenAPI plugin, `resources` entries override the
/// behaviour of the operation with the same path and method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    pub plugin: PluginKind,

    /// Prefix for every resource path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<ResourceMethod>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceConfig>,

    /// Children fall back to the root response for fields they leave unset
    #[serde(default)]
    pub defaults_from_root_response: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec_file: Option<String>,

    /// Serve the first declared example when none matches the Accept header
    #[serde(default = "default_pick_first_if_none_match")]
    pub pick_first_if_none_match: bool,

    /// Directory relative file references resolve against
    #[serde(skip)]
    pub base_dir: PathBuf,

    /// File this configuration was read from, for diagnostics
    #[serde(skip)]
    pub source: PathBuf,
}

fn default_pick_first_if_none_match() -> bool {
    true
}

impl PluginConfig {
    /// An empty configuration for `kind`, rooted at the current directory.
    pub fn new(kind: PluginKind) -> Self {
        PluginConfig {
            plugin: kind,
            path: None,
            method: None,
            content_type: None,
            response: None,
            resources: Vec::new(),
            defaults_from_root_response: false,
            spec_file: None,
            pick_first_if_none_match: default_pick_first_if_none_match(),
            base_dir: PathBuf::from("."),
            source: PathBuf::from("<inline>"),
        }
    }

    /// OpenAPI configuration serving a single specification file.
    pub fn for_specification(spec: &Path) -> Self {
        let base_dir = spec
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = spec
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        PluginConfig {
            spec_file: Some(file_name),
            base_dir,
            source: spec.to_path_buf(),
            ..PluginConfig::new(PluginKind::OpenApi)
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str_at(&content, path)
    }

    /// Parse JSON or YAML content as though it had been read from `source`.
    pub fn from_str_at(content: &str, source: &Path) -> Result<Self, ConfigError> {
        let mut config: PluginConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;

        config.base_dir = source
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        config.source = source.to_path_buf();
        Ok(config)
    }

    /// Resolve a file reference from this configuration.
    pub fn resolve_file(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceType;

    #[test]
    fn test_parse_rest_yaml() {
        let yaml = r#"
plugin: rest
path: /api
contentType: application/json
resources:
  - path: /pets/:id
    type: array
    response:
      staticFile: pets.json
"#;
        let config = PluginConfig::from_str_at(yaml, Path::new("/etc/mocks/pets-config.yaml"))
            .unwrap();
        assert_eq!(config.plugin, PluginKind::Rest);
        assert_eq!(config.path.as_deref(), Some("/api"));
        assert!(config.pick_first_if_none_match);
        assert_eq!(config.resources[0].resource_type, ResourceType::Array);
        assert_eq!(config.base_dir, PathBuf::from("/etc/mocks"));
        assert_eq!(
            config.resolve_file("pets.json"),
            PathBuf::from("/etc/mocks/pets.json")
        );
    }

    #[test]
    fn test_parse_openapi_json() {
        let json = r#"{"plugin": "openapi", "specFile": "petstore.yaml", "pickFirstIfNoneMatch": false}"#;
        let config = PluginConfig::from_str_at(json, Path::new("petstore-config.json")).unwrap();
        assert_eq!(config.plugin, PluginKind::OpenApi);
        assert_eq!(config.spec_file.as_deref(), Some("petstore.yaml"));
        assert!(!config.pick_first_if_none_match);
        assert_eq!(config.base_dir, PathBuf::from("."));
    }

    #[test]
    fn test_unknown_plugin_rejected() {
        let err = PluginConfig::from_str_at("plugin: soap", Path::new("x-config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("soap"));
    }

    #[test]
    fn test_for_specification() {
        let config = PluginConfig::for_specification(Path::new("/specs/petstore.yaml"));
        assert_eq!(config.plugin, PluginKind::OpenApi);
        assert_eq!(config.spec_file.as_deref(), Some("petstore.yaml"));
        assert_eq!(config.base_dir, PathBuf::from("/specs"));
    }

    #[test]
    fn test_default_content_type() {
        assert_eq!(PluginConfig::new(PluginKind::Rest).content_type(), "application/json");
    }
}
