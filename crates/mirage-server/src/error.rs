//! Error types for configuration, resolution and the collaborators behind it.
//!
//! Registration failures are [`ConfigError`] and abort startup. Everything
//! raised while answering a request funnels into [`ResolutionError`], which the
//! engine converts into a generic 500.

use std::path::PathBuf;
use std::time::Duration;

/// Fatal problems found while loading or registering configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("Unknown plugin '{0}' (expected 'rest' or 'openapi')")]
    UnknownPlugin(String),
    #[error("Resource '{0}' does not contain a field ID parameter")]
    MissingIdParameter(String),
    #[error("Invalid path template '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("Duplicate resource {method} {path}")]
    DuplicateRoute { method: String, path: String },
    #[error("Route {path} cannot be registered: {reason}")]
    AmbiguousRoute { path: String, reason: String },
    #[error("OpenAPI plugin in {0} has no 'specFile'")]
    MissingSpecFile(PathBuf),
    #[error("Invalid OpenAPI document {path}: {message}")]
    InvalidSpec { path: PathBuf, message: String },
    #[error("Invalid status code {0}")]
    InvalidStatusCode(u16),
    #[error("Script {origin} failed to compile: {message}")]
    ScriptCompile { origin: String, message: String },
}

/// A `$ref` that could not be followed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RefError {
    #[error("Reference '{0}' does not point into this document's components")]
    Malformed(String),
    #[error("Reference '{0}' does not resolve to a component")]
    Dangling(String),
    #[error("Reference cycle detected at '{0}'")]
    Cycle(String),
}

/// The schema collaborator could not produce a value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Reference(#[from] RefError),
    #[error("Unsupported schema: {0}")]
    Unsupported(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Script {origin} failed: {message}")]
    Runtime { origin: String, message: String },
    #[error("Script {origin} exceeded its {timeout:?} time limit")]
    Timeout { origin: String, timeout: Duration },
    #[error("Script {origin} returned an unsupported value: {type_name}")]
    InvalidResult { origin: String, type_name: String },
}

/// Failures loading the rows behind an array resource.
#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("No staticFile or staticData configured for array resource")]
    NotConfigured,
    #[error("Failed to read data file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Data source {origin} is not valid JSON: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Data source {0} is not a JSON array")]
    NotAnArray(String),
}

/// Everything that can go wrong between matching a resource and writing the reply.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error(transparent)]
    Reference(#[from] RefError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
    #[error("Failed to read response file {path}: {source}")]
    StaticFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to encode response body as {content_type}: {message}")]
    Encode {
        content_type: String,
        message: String,
    },
}
