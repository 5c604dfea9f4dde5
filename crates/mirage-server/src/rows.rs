//! Row lookup for array resources.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::behaviour::ResponseBehaviour;
use crate::config::PluginConfig;
use crate::error::DataSourceError;

/// Supplies the rows behind an array resource, in source order.
pub trait DataSource {
    fn load_rows(&self) -> Result<Vec<Value>, DataSourceError>;
}

/// Rows read from a JSON array file on every call.
#[derive(Debug, Clone)]
pub struct FileDataSource {
    path: PathBuf,
}

impl FileDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileDataSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for FileDataSource {
    fn load_rows(&self) -> Result<Vec<Value>, DataSourceError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| DataSourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let origin = self.path.display().to_string();
        let value: Value = serde_json::from_str(&content).map_err(|source| {
            DataSourceError::Parse {
                origin: origin.clone(),
                source,
            }
        })?;
        into_rows(value, origin)
    }
}

/// Rows given inline as `staticData`. A string is parsed as JSON first.
#[derive(Debug, Clone)]
pub struct InlineDataSource {
    data: Value,
}

impl InlineDataSource {
    pub fn new(data: Value) -> Self {
        InlineDataSource { data }
    }
}

impl DataSource for InlineDataSource {
    fn load_rows(&self) -> Result<Vec<Value>, DataSourceError> {
        let origin = "staticData".to_string();
        match &self.data {
            Value::String(raw) => {
                let value = serde_json::from_str(raw).map_err(|source| DataSourceError::Parse {
                    origin: origin.clone(),
                    source,
                })?;
                into_rows(value, origin)
            }
            other => into_rows(other.clone(), origin),
        }
    }
}

fn into_rows(value: Value, origin: String) -> Result<Vec<Value>, DataSourceError> {
    match value {
        Value::Array(rows) => Ok(rows),
        _ => Err(DataSourceError::NotAnArray(origin)),
    }
}

/// The data source a behaviour points at. A static file wins over inline data.
pub fn data_source_for(
    behaviour: &ResponseBehaviour,
    plugin: &PluginConfig,
) -> Result<Box<dyn DataSource>, DataSourceError> {
    if let Some(file) = &behaviour.static_file {
        return Ok(Box::new(FileDataSource::new(plugin.resolve_file(file))));
    }
    if let Some(data) = &behaviour.static_data {
        return Ok(Box::new(InlineDataSource::new(data.clone())));
    }
    Err(DataSourceError::NotConfigured)
}

/// First row whose `id_field` equals `id_value` as text.
pub fn find_row<'a>(id_field: &str, id_value: &str, rows: &'a [Value]) -> Option<&'a Value> {
    let found = rows.iter().find(|row| {
        match row.get(id_field) {
            Some(Value::String(s)) => s == id_value,
            Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string() == id_value,
            _ => false,
        }
    });
    debug!(
        "Row lookup {}={} {}",
        id_field,
        id_value,
        if found.is_some() { "matched" } else { "missed" }
    );
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PluginKind;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn rows() -> Vec<Value> {
        vec![json!({"id": "a", "v": 1}), json!({"id": "b", "v": 2})]
    }

    #[test]
    fn test_find_row_hit_and_miss() {
        let rows = rows();
        assert_eq!(find_row("id", "b", &rows), Some(&json!({"id": "b", "v": 2})));
        assert_eq!(find_row("id", "z", &rows), None);
    }

    #[test]
    fn test_find_row_first_match_wins() {
        let rows = vec![json!({"id": "a", "n": 1}), json!({"id": "a", "n": 2})];
        assert_eq!(find_row("id", "a", &rows).unwrap()["n"], 1);
    }

    #[test]
    fn test_find_row_compares_numbers_as_text() {
        let rows = vec![json!({"id": 7, "name": "seven"}), json!({"id": true})];
        assert_eq!(find_row("id", "7", &rows).unwrap()["name"], "seven");
        assert!(find_row("id", "true", &rows).is_some());
        assert!(find_row("missing", "7", &rows).is_none());
    }

    #[test]
    fn test_inline_string_is_parsed() {
        let source = InlineDataSource::new(json!(r#"[{"id": "x"}]"#));
        assert_eq!(source.load_rows().unwrap(), vec![json!({"id": "x"})]);
    }

    #[test]
    fn test_inline_object_is_not_an_array() {
        let err = InlineDataSource::new(json!({"id": "x"})).load_rows().unwrap_err();
        assert!(matches!(err, DataSourceError::NotAnArray(_)));
    }

    #[test]
    fn test_file_source_resolves_against_plugin_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pets.json"), r#"[{"id": "1"}, {"id": "2"}]"#).unwrap();

        let mut plugin = PluginConfig::new(PluginKind::Rest);
        plugin.base_dir = dir.path().to_path_buf();
        let behaviour = ResponseBehaviour {
            static_file: Some("pets.json".into()),
            ..Default::default()
        };

        let rows = data_source_for(&behaviour, &plugin).unwrap().load_rows().unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_missing_file_and_unconfigured() {
        let plugin = PluginConfig::new(PluginKind::Rest);
        assert!(matches!(
            data_source_for(&ResponseBehaviour::default(), &plugin),
            Err(DataSourceError::NotConfigured)
        ));

        let err = FileDataSource::new("/nonexistent/rows.json").load_rows().unwrap_err();
        assert!(matches!(err, DataSourceError::Io { .. }));
    }
}
