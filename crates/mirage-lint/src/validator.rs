//! Validation rules for plugin configurations.
//!
//! Structural checks work on the raw document so they can point at the
//! offending field. Everything the server would reject at startup is then
//! confirmed by running the server's own registration over the parsed
//! configuration.

use mirage_server::config::{PluginConfig, PluginKind, ResponseConfig};
use mirage_server::resource::ResourceRegistry;
use mirage_server::scripting::ScriptSettings;
use serde_yaml::Value;
use std::path::Path;

use crate::types::{LintIssue, LintOptions, LintResult};

/// Check the `plugin` field of a raw document. Returns false when it is unusable.
pub fn validate_plugin_kind(file: &Path, raw: &Value, result: &mut LintResult) -> bool {
    match raw.get("plugin") {
        None => {
            result.add_issue(
                LintIssue::error("E003", "Missing required field: plugin", file)
                    .with_location("plugin")
                    .with_suggestion("Set plugin to 'rest' or 'openapi'"),
            );
            false
        }
        Some(Value::String(name)) => match name.parse::<PluginKind>() {
            Ok(_) => true,
            Err(e) => {
                result.add_issue(
                    LintIssue::error("E003", e.to_string(), file)
                        .with_location("plugin")
                        .with_suggestion("Set plugin to 'rest' or 'openapi'"),
                );
                false
            }
        },
        Some(_) => {
            result.add_issue(
                LintIssue::error("E003", "plugin must be a string", file).with_location("plugin"),
            );
            false
        }
    }
}

/// Run every check on a parsed configuration.
pub fn validate_plugin(
    file: &Path,
    config: &PluginConfig,
    result: &mut LintResult,
    options: &LintOptions,
) {
    let missing_files = check_file_references(file, config, result);
    check_root_defaults(file, config, result);
    check_pick_first(file, config, result);

    // missing files already explain why registration would fail
    if !options.skip_registration && missing_files == 0 {
        validate_registration(file, std::slice::from_ref(config), result);
    }
}

/// Register `configs` together, the way the server does at startup.
pub fn validate_registration(file: &Path, configs: &[PluginConfig], result: &mut LintResult) {
    if let Err(e) = ResourceRegistry::build(configs.to_vec(), ScriptSettings::default()) {
        result.add_issue(
            LintIssue::error("E004", e.to_string(), file).with_location("resources"),
        );
    }
}

fn check_file_references(file: &Path, config: &PluginConfig, result: &mut LintResult) -> usize {
    let mut references: Vec<(String, &str)> = Vec::new();

    if let Some(spec) = &config.spec_file {
        references.push(("specFile".to_string(), spec));
    }
    if let Some(response) = &config.response {
        references.extend(response_files("response", response));
    }
    for (i, resource) in config.resources.iter().enumerate() {
        if let Some(response) = &resource.response {
            references.extend(response_files(&format!("resources[{i}].response"), response));
        }
    }

    let mut missing = 0;
    for (location, reference) in references {
        let resolved = config.resolve_file(reference);
        if !resolved.is_file() {
            missing += 1;
            result.add_issue(
                LintIssue::error(
                    "E005",
                    format!("Referenced file not found: {}", resolved.display()),
                    file,
                )
                .with_location(location)
                .with_suggestion("Paths are resolved relative to the configuration file"),
            );
        }
    }

    if config.plugin == PluginKind::OpenApi && config.spec_file.is_none() {
        missing += 1;
        result.add_issue(
            LintIssue::error("E005", "OpenAPI plugin has no specFile", file)
                .with_location("specFile")
                .with_suggestion("Point specFile at an OpenAPI 3 document"),
        );
    }

    missing
}

fn response_files<'a>(prefix: &str, response: &'a ResponseConfig) -> Vec<(String, &'a str)> {
    let mut files = Vec::new();
    if let Some(static_file) = &response.static_file {
        files.push((format!("{prefix}.staticFile"), static_file.as_str()));
    }
    if let Some(script_file) = &response.script_file {
        files.push((format!("{prefix}.scriptFile"), script_file.as_str()));
    }
    files
}

fn check_root_defaults(file: &Path, config: &PluginConfig, result: &mut LintResult) {
    if config.defaults_from_root_response && config.response.is_none() {
        result.add_issue(
            LintIssue::warning(
                "W001",
                "defaultsFromRootResponse is set but there is no root response to inherit from",
                file,
            )
            .with_location("defaultsFromRootResponse")
            .with_suggestion("Add a root 'response' or remove defaultsFromRootResponse"),
        );
    }
}

fn check_pick_first(file: &Path, config: &PluginConfig, result: &mut LintResult) {
    if config.plugin == PluginKind::OpenApi && !config.pick_first_if_none_match {
        result.add_issue(
            LintIssue::info(
                "I001",
                "pickFirstIfNoneMatch is disabled: requests whose Accept header matches no example get an empty body",
                file,
            )
            .with_location("pickFirstIfNoneMatch"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(dir: &Path, yaml: &str) -> PluginConfig {
        PluginConfig::from_str_at(yaml, &dir.join("test-config.yaml")).unwrap()
    }

    fn lint(dir: &Path, yaml: &str) -> LintResult {
        let mut result = LintResult::new();
        let config = parse(dir, yaml);
        validate_plugin(&dir.join("test-config.yaml"), &config, &mut result, &LintOptions::default());
        result
    }

    #[test]
    fn test_unknown_plugin() {
        let mut result = LintResult::new();
        let raw: Value = serde_yaml::from_str("plugin: soap").unwrap();
        assert!(!validate_plugin_kind(Path::new("x"), &raw, &mut result));
        assert!(result.has_code("E003"));

        let raw: Value = serde_yaml::from_str("path: /a").unwrap();
        assert!(!validate_plugin_kind(Path::new("x"), &raw, &mut result));
        assert_eq!(result.errors, 2);
    }

    #[test]
    fn test_missing_referenced_files() {
        let dir = TempDir::new().unwrap();
        let result = lint(
            dir.path(),
            r#"
plugin: rest
resources:
  - path: /a
    response:
      staticFile: a.json
      scriptFile: a.rhai
"#,
        );
        assert_eq!(result.errors, 2);
        let locations: Vec<_> = result.issues.iter().filter_map(|i| i.location.as_deref()).collect();
        assert_eq!(
            locations,
            ["resources[0].response.staticFile", "resources[0].response.scriptFile"]
        );
        // registration is skipped once files are missing
        assert!(!result.has_code("E004"));
    }

    #[test]
    fn test_registration_errors() {
        let dir = TempDir::new().unwrap();
        let result = lint(
            dir.path(),
            r#"
plugin: rest
resources:
  - path: /pets
    type: array
"#,
        );
        assert!(result.has_code("E004"));

        let result = lint(
            dir.path(),
            r#"
plugin: rest
resources:
  - path: /pets/:id
  - path: /pets/{petId}
"#,
        );
        assert!(result.has_code("E004"));
    }

    #[test]
    fn test_warnings_and_info() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("api.yaml"),
            "openapi: 3.0.0\npaths: {}\n",
        )
        .unwrap();
        let result = lint(
            dir.path(),
            r#"
plugin: openapi
specFile: api.yaml
defaultsFromRootResponse: true
pickFirstIfNoneMatch: false
"#,
        );
        assert_eq!(result.errors, 0);
        assert!(result.has_code("W001"));
        assert!(result.has_code("I001"));
    }

    #[test]
    fn test_openapi_without_spec_file() {
        let dir = TempDir::new().unwrap();
        let result = lint(dir.path(), "plugin: openapi\n");
        assert!(result.has_code("E005"));
        assert!(!result.has_code("E004"));
    }
}
