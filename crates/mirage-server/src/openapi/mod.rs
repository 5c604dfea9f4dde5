//! OpenAPI-driven mocking: document model, `$ref` handling, example
//! selection and schema synthesis.

pub mod example;
pub mod refs;
pub mod schema;
pub mod spec;

pub use example::{
    BodyResolver, BodySource, Diagnostic, Resolution, ResolutionOutcome, ResolvedBody,
    ResponseExample,
};
pub use schema::{DefaultSchemaSynthesizer, SchemaSynthesizer};
pub use spec::{ApiResponse, Example, MediaType, OpenApiDocument, Operation, PathItem, RefOr};
