//! Local `$ref` resolution against `#/components/...`.
//!
//! Chains of references are followed until an inline object is reached.
//! A reference that leaves the document, names a missing component, or
//! revisits one already on the chain is an error.

use serde_json::Value;

use super::spec::{ApiResponse, Example, OpenApiDocument, RefOr};
use crate::error::RefError;

/// Name of the component a `#/components/<kind>/<name>` reference points at.
pub fn component_name(reference: &str, kind: &str) -> Result<String, RefError> {
    let prefix = format!("#/components/{kind}/");
    let name = reference
        .strip_prefix(&prefix)
        .filter(|name| !name.is_empty() && !name.contains('/'))
        .ok_or_else(|| RefError::Malformed(reference.to_string()))?;

    // JSON pointer escapes
    Ok(name.replace("~1", "/").replace("~0", "~"))
}

fn follow<'a, T>(
    start: &'a RefOr<T>,
    kind: &str,
    lookup: impl Fn(&str) -> Option<&'a RefOr<T>>,
) -> Result<&'a T, RefError> {
    let mut current = start;
    let mut visited: Vec<&'a str> = Vec::new();

    loop {
        match current {
            RefOr::Item(item) => return Ok(item),
            RefOr::Ref { reference } => {
                if visited.contains(&reference.as_str()) {
                    return Err(RefError::Cycle(reference.clone()));
                }
                visited.push(reference);
                let name = component_name(reference, kind)?;
                current =
                    lookup(&name).ok_or_else(|| RefError::Dangling(reference.clone()))?;
            }
        }
    }
}

pub fn resolve_response<'a>(
    document: &'a OpenApiDocument,
    response: &'a RefOr<ApiResponse>,
) -> Result<&'a ApiResponse, RefError> {
    follow(response, "responses", |name| {
        document.components.responses.get(name)
    })
}

pub fn resolve_example<'a>(
    document: &'a OpenApiDocument,
    example: &'a RefOr<Example>,
) -> Result<&'a Example, RefError> {
    follow(example, "examples", |name| document.components.examples.get(name))
}

/// Look up the schema a `$ref` names. Only one hop: schema refs are walked
/// by the synthesizer, which keeps its own cycle guard.
pub fn lookup_schema<'a>(
    document: &'a OpenApiDocument,
    reference: &str,
) -> Result<&'a Value, RefError> {
    let name = component_name(reference, "schemas")?;
    document
        .components
        .schemas
        .get(&name)
        .ok_or_else(|| RefError::Dangling(reference.to_string()))
}
