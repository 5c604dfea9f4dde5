//! Configuration types and discovery.
//!
//! Plugin configuration lives in files named `<anything>-config.json`,
//! `-config.yaml` or `-config.yml`. Discovery is non-recursive and sorted by
//! file name so registration order is stable between runs.

mod plugin;
mod resource;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

pub use plugin::{PluginConfig, PluginKind, DEFAULT_CONTENT_TYPE};
pub use resource::{ResourceConfig, ResourceMethod, ResourceType, ResponseConfig};

use crate::error::ConfigError;
use crate::scripting::ScriptSettings;

const CONFIG_FILE_SUFFIXES: [&str; 3] = ["-config.json", "-config.yaml", "-config.yml"];

/// Whether `path` names a plugin configuration file.
pub fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy())
        .is_some_and(|name| {
            CONFIG_FILE_SUFFIXES
                .iter()
                .any(|suffix| name.ends_with(suffix))
        })
}

/// List the configuration files directly inside `dir`.
pub fn discover_config_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_config_file(path))
        .collect();
    files.sort();

    debug!("Found {} config file(s) in {}", files.len(), dir.display());
    Ok(files)
}

/// Load every configuration file from each directory, in order.
pub fn load_config_dirs(dirs: &[PathBuf]) -> Result<Vec<PluginConfig>, ConfigError> {
    let mut configs = Vec::new();
    for dir in dirs {
        for file in discover_config_files(dir)? {
            let config = PluginConfig::from_file(&file)?;
            info!("Loaded {} plugin config from {}", config.plugin, file.display());
            configs.push(config);
        }
    }
    Ok(configs)
}

/// Settings for the server itself, as opposed to what it serves.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub script_timeout: Duration,
    pub max_script_operations: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            script_timeout: Duration::from_millis(5000),
            max_script_operations: 1_000_000,
        }
    }
}

impl ServerConfig {
    pub fn script_settings(&self) -> ScriptSettings {
        ScriptSettings {
            timeout: self.script_timeout,
            max_operations: self.max_script_operations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_config_file() {
        assert!(is_config_file(Path::new("/a/pets-config.yaml")));
        assert!(is_config_file(Path::new("pets-config.json")));
        assert!(is_config_file(Path::new("pets-config.yml")));
        assert!(!is_config_file(Path::new("pets.json")));
        assert!(!is_config_file(Path::new("config.yaml")));
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b-config.yaml"), "plugin: rest").unwrap();
        fs::write(dir.path().join("a-config.json"), r#"{"plugin":"rest"}"#).unwrap();
        fs::write(dir.path().join("data.json"), "[]").unwrap();
        fs::create_dir(dir.path().join("nested-config.yaml")).unwrap();

        let files = discover_config_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a-config.json", "b-config.yaml"]);
    }

    #[test]
    fn test_load_config_dirs() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("pets-config.yaml"),
            "plugin: rest\npath: /pets\n",
        )
        .unwrap();

        let configs = load_config_dirs(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].base_dir, dir.path());
    }

    #[test]
    fn test_missing_dir_is_io_error() {
        let err = discover_config_files(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_script_settings_follow_server_config() {
        let config = ServerConfig {
            script_timeout: Duration::from_millis(250),
            ..Default::default()
        };
        let settings = config.script_settings();
        assert_eq!(settings.timeout, Duration::from_millis(250));
        assert_eq!(settings.max_operations, ScriptSettings::default().max_operations);
    }
}
