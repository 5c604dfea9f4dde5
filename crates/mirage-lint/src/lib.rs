//! Configuration linting for Mirage.
//!
//! Checks `*-config.{json,yaml,yml}` plugin configurations with the same
//! parser and registration rules the server uses, so a clean lint means the
//! server will start.
//!
//! ```no_run
//! use mirage_lint::{lint_directory, LintOptions};
//! use std::path::Path;
//!
//! let result = lint_directory(Path::new("./mocks"), &LintOptions::default());
//! if result.has_errors() {
//!     eprintln!("Found {} errors", result.errors);
//! }
//! ```

mod types;
mod validator;

use mirage_server::config::{discover_config_files, PluginConfig};
use std::path::Path;

pub use types::{LintIssue, LintOptions, LintResult, Severity};
pub use validator::{validate_plugin, validate_plugin_kind, validate_registration};

/// Lint one configuration file.
pub fn lint_file(path: &Path, options: &LintOptions) -> LintResult {
    lint_file_with_config(path, options).0
}

/// Lint every configuration file in a directory (non-recursive), then check
/// that they register together.
pub fn lint_directory(path: &Path, options: &LintOptions) -> LintResult {
    let mut result = LintResult::new();

    // same discovery and ordering the server uses at startup
    let files = match discover_config_files(path) {
        Ok(files) => files,
        Err(e) => {
            result.add_issue(LintIssue::error("E001", e.to_string(), path));
            return result;
        }
    };

    let mut configs = Vec::new();
    for file in &files {
        let (file_result, config) = lint_file_with_config(file, options);
        let clean = !file_result.has_errors();
        result.merge(file_result);
        if let Some(config) = config.filter(|_| clean) {
            configs.push(config);
        }
    }

    // conflicts between files only show up when everything registers at once
    if !options.skip_registration && configs.len() > 1 && configs.len() == files.len() {
        validate_registration(path, &configs, &mut result);
    }

    result
}

/// Lint a file or a directory, whichever `path` is.
pub fn lint_path(path: &Path, options: &LintOptions) -> LintResult {
    if path.is_dir() {
        lint_directory(path, options)
    } else {
        lint_file(path, options)
    }
}

/// Lint configuration content as though it had been read from `source`.
pub fn lint_str(content: &str, source: &Path, options: &LintOptions) -> LintResult {
    lint_content(content, source, options).0
}

fn lint_file_with_config(path: &Path, options: &LintOptions) -> (LintResult, Option<PluginConfig>) {
    match std::fs::read_to_string(path) {
        Ok(content) => lint_content(&content, path, options),
        Err(e) => {
            let mut result = LintResult::new();
            result.files_checked = 1;
            result.add_issue(LintIssue::error(
                "E001",
                format!("Failed to read file: {e}"),
                path,
            ));
            (result, None)
        }
    }
}

fn lint_content(
    content: &str,
    source: &Path,
    options: &LintOptions,
) -> (LintResult, Option<PluginConfig>) {
    let mut result = LintResult::new();
    result.files_checked = 1;

    let raw: serde_yaml::Value = match serde_yaml::from_str(content) {
        Ok(raw) => raw,
        Err(e) => {
            result.add_issue(
                LintIssue::error("E002", format!("Invalid JSON/YAML: {e}"), source)
                    .with_suggestion("Check the file for syntax errors"),
            );
            return (result, None);
        }
    };

    if !validate_plugin_kind(source, &raw, &mut result) {
        return (result, None);
    }

    let config = match PluginConfig::from_str_at(content, source) {
        Ok(config) => config,
        Err(e) => {
            result.add_issue(LintIssue::error("E002", e.to_string(), source));
            return (result, None);
        }
    };

    validate_plugin(source, &config, &mut result, options);
    (result, Some(config))
}
