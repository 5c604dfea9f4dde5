//! The request pipeline.
//!
//! `Received → Matched → BehaviourResolved → {BodyResolved | RowResolved |
//! Unresolved} → Transmitted`. Every step is synchronous and allocates its
//! state per request; the registry and the documents behind it are shared
//! read-only. Failures after matching are logged and turned into a generic
//! 500 here and nowhere else.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, error};

use crate::behaviour::{resolve_behaviour, BehaviourType, ResponseBehaviour};
use crate::config::PluginConfig;
use crate::error::{ConfigError, ResolutionError};
use crate::negotiation::parse_accept;
use crate::openapi::{
    BodyResolver, DefaultSchemaSynthesizer, OpenApiDocument, Operation, Resolution,
    SchemaSynthesizer,
};
use crate::request::InboundRequest;
use crate::resource::{
    PathParams, ResourceDefinition, ResourceKind, ResourceRegistry, ResponseSource,
};
use crate::response::{encode_body, MockResponse};
use crate::rows::{data_source_for, find_row};
use crate::scripting::ScriptSettings;

pub struct MockEngine {
    registry: ResourceRegistry,
    synthesizer: Arc<dyn SchemaSynthesizer>,
}

impl fmt::Debug for MockEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockEngine")
            .field("resources", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl MockEngine {
    pub fn new(registry: ResourceRegistry) -> Self {
        MockEngine {
            registry,
            synthesizer: Arc::new(DefaultSchemaSynthesizer),
        }
    }

    /// Register every configuration and build an engine over them.
    pub fn from_configs(
        configs: Vec<PluginConfig>,
        settings: ScriptSettings,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(ResourceRegistry::build(configs, settings)?))
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn SchemaSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Answer one request. Never fails: errors become a 500.
    pub fn handle(&self, request: &InboundRequest) -> MockResponse {
        let Some(matched) = self.registry.find_match(&request.method, &request.path) else {
            debug!("No resource for {} {}", request.method, request.path);
            return MockResponse::not_found();
        };

        match self.respond(matched.resource, request, &matched.path_params) {
            Ok(response) => response,
            Err(e) => {
                error!(
                    "Failed to respond to {} {}: {}",
                    request.method, request.path, e
                );
                MockResponse::server_error()
            }
        }
    }

    fn respond(
        &self,
        resource: &ResourceDefinition,
        request: &InboundRequest,
        path_params: &PathParams,
    ) -> Result<MockResponse, ResolutionError> {
        let behaviour = resolve_behaviour(resource, request, path_params)?;

        if behaviour.behaviour_type == BehaviourType::ShortCircuit {
            debug!("Default behaviour skipped for {}", resource.path);
            return static_response(resource, behaviour);
        }

        match (&resource.kind, &resource.source) {
            (ResourceKind::Array { id_field }, _) => {
                row_response(resource, behaviour, id_field, path_params)
            }
            (ResourceKind::Object, ResponseSource::Static) => static_response(resource, behaviour),
            (ResourceKind::Object, ResponseSource::Specification { document, operation }) => {
                // configured content takes precedence over the document's examples
                if behaviour.static_file.is_some() || behaviour.static_data.is_some() {
                    return static_response(resource, behaviour);
                }
                self.specification_response(resource, behaviour, request, document, operation)
            }
        }
    }

    fn specification_response(
        &self,
        resource: &ResourceDefinition,
        behaviour: ResponseBehaviour,
        request: &InboundRequest,
        document: &OpenApiDocument,
        operation: &Operation,
    ) -> Result<MockResponse, ResolutionError> {
        let Some((status, declared)) = operation.select_response(behaviour.status_code) else {
            debug!("No response declared for status {}", behaviour.status());
            return Ok(MockResponse::new(behaviour.status()).with_headers(behaviour.headers));
        };

        let negotiated = parse_accept(request.header("accept"));
        let resolver = BodyResolver::new(
            document,
            self.synthesizer.as_ref(),
            resource.plugin.config.pick_first_if_none_match,
        );
        let outcome = resolver.resolve(declared, &negotiated, behaviour.example_name.as_deref())?;

        let mut headers = behaviour.headers;
        for (name, value) in outcome.response.example_headers() {
            if !headers.keys().any(|k| k.eq_ignore_ascii_case(name)) {
                headers.insert(name.to_string(), value);
            }
        }

        let response = MockResponse::new(status).with_headers(headers);
        match outcome.resolution {
            Resolution::Found(body) => {
                debug!("Serving {:?} body as {}", body.source, body.content_type);
                let encoded = encode_body(&body.value, &body.content_type)?;
                Ok(response.with_body(&body.content_type, encoded))
            }
            Resolution::NotFound => {
                debug!("No body resolved for {} {}", request.method, request.path);
                Ok(response)
            }
        }
    }
}

fn content_type_for<'a>(resource: &'a ResourceDefinition, behaviour: &'a ResponseBehaviour) -> &'a str {
    behaviour
        .content_type
        .as_deref()
        .unwrap_or_else(|| resource.effective_content_type())
}

fn static_response(
    resource: &ResourceDefinition,
    behaviour: ResponseBehaviour,
) -> Result<MockResponse, ResolutionError> {
    let content_type = content_type_for(resource, &behaviour).to_string();

    let body = if let Some(file) = &behaviour.static_file {
        let path = resource.plugin.config.resolve_file(file);
        let content =
            std::fs::read(&path).map_err(|source| ResolutionError::StaticFile { path, source })?;
        Some(bytes::Bytes::from(content))
    } else if let Some(data) = &behaviour.static_data {
        Some(encode_body(data, &content_type)?)
    } else {
        None
    };

    let response = MockResponse::new(behaviour.status()).with_headers(behaviour.headers);
    Ok(match body {
        Some(body) => response.with_body(&content_type, body),
        None => response,
    })
}

fn row_response(
    resource: &ResourceDefinition,
    behaviour: ResponseBehaviour,
    id_field: &str,
    path_params: &PathParams,
) -> Result<MockResponse, ResolutionError> {
    let rows = data_source_for(&behaviour, &resource.plugin.config)?.load_rows()?;
    let id_value = path_params.get(id_field).map(String::as_str).unwrap_or_default();

    match find_row(id_field, id_value, &rows) {
        Some(row) => {
            let content_type = content_type_for(resource, &behaviour).to_string();
            let body = encode_body(row, &content_type)?;
            Ok(MockResponse::new(200)
                .with_headers(behaviour.headers)
                .with_body(&content_type, body))
        }
        None => Ok(MockResponse::not_found()),
    }
}
