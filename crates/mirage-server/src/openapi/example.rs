//! Response body selection for specification-driven resources.
//!
//! Resolution runs in two stages over a response's `content` map, each
//! short-circuiting on success:
//!
//! 1. Inline examples. A media type's singular `example` shadows its
//!    `examples` map. A requested example name is tried first; a miss is
//!    logged and matching continues by content type.
//! 2. Schemas, matched by content type only, then handed to the
//!    [`SchemaSynthesizer`].
//!
//! Content-type matching intersects the client's negotiated types with the
//! types the candidates produce and takes the first declared candidate whose
//! type was accepted. More than one viable candidate is not an error: the
//! first wins and an [`Diagnostic::AmbiguousContentType`] is recorded. With
//! `pick_first` enabled a stage with no accepted candidate falls back to its
//! first declared candidate; otherwise the stage yields nothing.

use serde_json::Value;
use tracing::{debug, error, warn};

use super::refs::{resolve_example, resolve_response};
use super::schema::SchemaSynthesizer;
use super::spec::{ApiResponse, OpenApiDocument, RefOr};
use crate::error::ResolutionError;
use crate::negotiation::same_media_type;

/// A candidate body found while scanning a response's content.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseExample<'a, T> {
    pub content_type: &'a str,
    pub item: T,
    pub name: Option<&'a str>,
}

/// Where a resolved body came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodySource {
    Example { name: Option<String> },
    Schema,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBody {
    pub content_type: String,
    pub value: Value,
    pub source: BodySource,
}

/// Non-fatal observations made during resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A requested example name matched nothing.
    ExampleNotFound(String),
    /// Several candidates matched the accepted types; the first was used.
    AmbiguousContentType {
        accepted: Vec<String>,
        selected: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(ResolvedBody),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionOutcome<'a> {
    /// The response definition once any `$ref` chain has been followed.
    pub response: &'a ApiResponse,
    pub resolution: Resolution,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResolutionOutcome<'_> {
    pub fn body(&self) -> Option<&ResolvedBody> {
        match &self.resolution {
            Resolution::Found(body) => Some(body),
            Resolution::NotFound => None,
        }
    }
}

/// Resolves bodies against one OpenAPI document.
pub struct BodyResolver<'a> {
    document: &'a OpenApiDocument,
    synthesizer: &'a dyn SchemaSynthesizer,
    pick_first: bool,
}

impl<'a> BodyResolver<'a> {
    pub fn new(
        document: &'a OpenApiDocument,
        synthesizer: &'a dyn SchemaSynthesizer,
        pick_first: bool,
    ) -> Self {
        BodyResolver {
            document,
            synthesizer,
            pick_first,
        }
    }

    /// Resolve a body for `response`.
    ///
    /// `negotiated` is the client's accepted types, most preferred first.
    /// Reference and synthesis failures are errors; finding nothing is
    /// [`Resolution::NotFound`].
    pub fn resolve(
        &self,
        response: &'a RefOr<ApiResponse>,
        negotiated: &[String],
        example_name: Option<&str>,
    ) -> Result<ResolutionOutcome<'a>, ResolutionError> {
        let mut diagnostics = Vec::new();
        let response = resolve_response(self.document, response)?;

        let Some(content) = response.content.as_ref().filter(|c| !c.is_empty()) else {
            debug!("Response declares no content");
            return Ok(ResolutionOutcome {
                response,
                resolution: Resolution::NotFound,
                diagnostics,
            });
        };

        let examples = self.collect_examples(response)?;
        if !examples.is_empty() {
            debug!("Checking {} inline example candidate(s)", examples.len());
            if let Some(example) =
                self.match_example(&examples, negotiated, example_name, &mut diagnostics)
            {
                return Ok(ResolutionOutcome {
                    response,
                    resolution: Resolution::Found(ResolvedBody {
                        content_type: example.content_type.to_string(),
                        value: example.item.clone(),
                        source: BodySource::Example {
                            name: example.name.map(str::to_string),
                        },
                    }),
                    diagnostics,
                });
            }
        }

        debug!("No inline examples matched; checking schema");
        let schemas: Vec<ResponseExample<'_, &Value>> = content
            .iter()
            .filter_map(|(content_type, media)| {
                media.schema.as_ref().map(|schema| ResponseExample {
                    content_type: content_type.as_str(),
                    item: schema,
                    name: None,
                })
            })
            .collect();

        let resolution = match self.match_by_content_type(&schemas, negotiated, &mut diagnostics)
        {
            Some(schema) => {
                let value = self
                    .synthesizer
                    .synthesize(self.document, schema.item)
                    .inspect_err(|e| error!("Error generating example from schema: {}", e))?;
                Resolution::Found(ResolvedBody {
                    content_type: schema.content_type.to_string(),
                    value,
                    source: BodySource::Schema,
                })
            }
            None => Resolution::NotFound,
        };

        Ok(ResolutionOutcome {
            response,
            resolution,
            diagnostics,
        })
    }

    fn collect_examples(
        &self,
        response: &'a ApiResponse,
    ) -> Result<Vec<ResponseExample<'a, Value>>, ResolutionError> {
        let mut examples = Vec::new();
        for (content_type, media) in response.content.iter().flatten() {
            if let Some(example) = &media.example {
                examples.push(ResponseExample {
                    content_type: content_type.as_str(),
                    item: example.clone(),
                    name: None,
                });
            } else if let Some(named) = &media.examples {
                for (name, example) in named {
                    let example = resolve_example(self.document, example)?;
                    if example.value.is_none() && example.external_value.is_some() {
                        warn!("Example '{}' uses externalValue, which is not fetched", name);
                    }
                    examples.push(ResponseExample {
                        content_type: content_type.as_str(),
                        item: example.value.clone().unwrap_or(Value::Null),
                        name: Some(name.as_str()),
                    });
                }
            }
        }
        Ok(examples)
    }

    fn match_example<'c, T>(
        &self,
        candidates: &'c [ResponseExample<'a, T>],
        negotiated: &[String],
        example_name: Option<&str>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<&'c ResponseExample<'a, T>> {
        if let Some(wanted) = example_name.filter(|n| !n.is_empty()) {
            if let Some(found) = candidates.iter().find(|c| c.name == Some(wanted)) {
                debug!("Exact example selected: {}", wanted);
                return Some(found);
            }
            warn!("No example named '{}' was present", wanted);
            diagnostics.push(Diagnostic::ExampleNotFound(wanted.to_string()));
        }

        self.match_by_content_type(candidates, negotiated, diagnostics)
    }

    fn match_by_content_type<'c, T>(
        &self,
        candidates: &'c [ResponseExample<'a, T>],
        negotiated: &[String],
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Option<&'c ResponseExample<'a, T>> {
        let produces = |content_type: &str| {
            candidates
                .iter()
                .any(|c| same_media_type(c.content_type, content_type))
        };
        let accepted: Vec<String> = negotiated
            .iter()
            .filter(|t| produces(t.as_str()))
            .cloned()
            .collect();

        if !accepted.is_empty() {
            let mut viable = candidates
                .iter()
                .filter(|c| accepted.iter().any(|t| same_media_type(t, c.content_type)));

            if let Some(first) = viable.next() {
                if viable.next().is_some() {
                    warn!(
                        "More than one example found matching accepted content types ({:?}), but no example name specified. Selecting first entry: {}",
                        accepted, first.content_type
                    );
                    diagnostics.push(Diagnostic::AmbiguousContentType {
                        accepted,
                        selected: first.content_type.to_string(),
                    });
                } else {
                    debug!("Exact example match found for content type ({})", first.content_type);
                }
                return Some(first);
            }
        }

        if self.pick_first {
            let first = candidates.first()?;
            debug!(
                "No exact example match found for content type, choosing first declared ({}). Set pickFirstIfNoneMatch=false to disable",
                first.content_type
            );
            return Some(first);
        }

        None
    }
}
