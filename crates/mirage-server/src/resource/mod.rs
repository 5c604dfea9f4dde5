//! Resource definitions and the registry that matches requests to them.
//!
//! Every plugin configuration is flattened into [`ResourceDefinition`]s at
//! startup: REST plugins contribute their root resource and children, OpenAPI
//! plugins one resource per path and operation. Definitions are immutable
//! and shared through `Arc` for the life of the server.

mod index;
mod path;

use std::sync::Arc;
use tracing::{debug, info, warn};

pub use index::{PathParams, ResourceIndex, RouteEntry};
pub use path::{qualify, PathTemplate};

use crate::config::{
    PluginConfig, PluginKind, ResourceConfig, ResourceMethod, ResourceType, ResponseConfig,
};
use crate::error::ConfigError;
use crate::openapi::{OpenApiDocument, Operation};
use crate::scripting::{RhaiScript, ScriptSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceKind {
    Object,
    /// Rows addressed by the named path parameter
    Array { id_field: String },
}

#[derive(Debug, Clone)]
pub enum ResponseSource {
    /// Body comes from static configuration
    Static,
    /// Body comes from the operation's declared responses
    Specification {
        document: Arc<OpenApiDocument>,
        operation: Arc<Operation>,
    },
}

#[derive(Debug)]
pub struct PluginContext {
    pub config: PluginConfig,
}

#[derive(Debug)]
pub struct ResourceDefinition {
    pub id: usize,
    pub plugin: Arc<PluginContext>,
    pub path: PathTemplate,
    pub method: ResourceMethod,
    pub content_type: Option<String>,
    pub kind: ResourceKind,
    pub source: ResponseSource,
    /// Effective response settings, after root defaults were applied
    pub response: ResponseConfig,
    pub script: Option<RhaiScript>,
}

impl ResourceDefinition {
    /// Content type for static and row bodies.
    pub fn effective_content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or_else(|| self.plugin.config.content_type())
    }
}

/// Borrowed result of a successful match.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub resource: &'a Arc<ResourceDefinition>,
    pub path_params: PathParams,
}

/// All registered resources and their route index.
#[derive(Debug)]
pub struct ResourceRegistry {
    resources: Vec<Arc<ResourceDefinition>>,
    index: ResourceIndex,
}

struct Pending {
    path: PathTemplate,
    method: ResourceMethod,
    content_type: Option<String>,
    kind: ResourceKind,
    source: ResponseSource,
    response: ResponseConfig,
}

impl ResourceRegistry {
    /// Register every plugin. Any invalid resource fails the whole build.
    pub fn build(
        configs: Vec<PluginConfig>,
        settings: ScriptSettings,
    ) -> Result<Self, ConfigError> {
        let mut resources = Vec::new();

        for config in configs {
            let pending = match config.plugin {
                PluginKind::Rest => rest_resources(&config)?,
                PluginKind::OpenApi => {
                    let spec_file = config
                        .spec_file
                        .as_deref()
                        .ok_or_else(|| ConfigError::MissingSpecFile(config.source.clone()))?;
                    let document = OpenApiDocument::from_file(&config.resolve_file(spec_file))?;
                    openapi_resources(&config, Arc::new(document))?
                }
            };

            let context = Arc::new(PluginContext { config });
            for p in pending {
                if let Some(code) = p.response.status_code.filter(|c| !(100..=599).contains(c)) {
                    return Err(ConfigError::InvalidStatusCode(code));
                }
                let script = compile_script(&context.config, &p, settings)?;
                let id = resources.len();
                info!("Registered {} {} ({:?})", p.method, p.path, p.kind);
                resources.push(Arc::new(ResourceDefinition {
                    id,
                    plugin: Arc::clone(&context),
                    path: p.path,
                    method: p.method,
                    content_type: p.content_type,
                    kind: p.kind,
                    source: p.source,
                    response: p.response,
                    script,
                }));
            }
        }

        let index = ResourceIndex::build(resources.iter().map(|r| RouteEntry {
            id: r.id,
            method: r.method,
            template: &r.path,
        }))?;

        Ok(ResourceRegistry { resources, index })
    }

    /// Find the single resource serving `method` and `path`.
    pub fn find_match(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        let (id, path_params) = self.index.lookup(method, path)?;
        let resource = self.resources.get(id)?;
        debug!("Matched {} {} to {}", method, path, resource.path);
        Some(RouteMatch {
            resource,
            path_params,
        })
    }

    pub fn resources(&self) -> &[Arc<ResourceDefinition>] {
        &self.resources
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Resources of a REST plugin: the root resource, then one per `resources`
/// entry qualified by the root path.
///
/// The root resource is registered only when the plugin sets a `path` or a
/// root `response`. A plugin with neither serves nothing at `/`, so several
/// path-less REST plugins can be loaded side by side without a duplicate
/// route on the root.
fn rest_resources(config: &PluginConfig) -> Result<Vec<Pending>, ConfigError> {
    let mut pending = Vec::new();
    let root_response = config.response.clone().unwrap_or_default();

    if config.path.is_some() || config.response.is_some() {
        pending.push(Pending {
            path: PathTemplate::parse(&qualify(config.path.as_deref(), None))?,
            method: config.method.unwrap_or_default(),
            content_type: config.content_type.clone(),
            kind: ResourceKind::Object,
            source: ResponseSource::Static,
            response: root_response.clone(),
        });
    }

    for resource in &config.resources {
        let qualified = qualify(config.path.as_deref(), resource.path.as_deref());
        let path = PathTemplate::parse(&qualified)?;

        let kind = match resource.resource_type {
            ResourceType::Object => ResourceKind::Object,
            ResourceType::Array => {
                let id_field = path
                    .id_param()
                    .ok_or_else(|| ConfigError::MissingIdParameter(qualified.clone()))?;
                ResourceKind::Array {
                    id_field: id_field.to_string(),
                }
            }
        };

        pending.push(Pending {
            path,
            method: resource.method.unwrap_or_default(),
            content_type: resource
                .content_type
                .clone()
                .or_else(|| config.content_type.clone()),
            kind,
            source: ResponseSource::Static,
            response: child_response(config, resource.response.as_ref(), &root_response),
        });
    }

    Ok(pending)
}

fn child_response(
    config: &PluginConfig,
    child: Option<&ResponseConfig>,
    root: &ResponseConfig,
) -> ResponseConfig {
    match (child, config.defaults_from_root_response) {
        (Some(child), true) => child.inherit_from(root),
        (None, true) => root.clone(),
        (Some(child), false) => child.clone(),
        (None, false) => ResponseConfig::default(),
    }
}

fn openapi_resources(
    config: &PluginConfig,
    document: Arc<OpenApiDocument>,
) -> Result<Vec<Pending>, ConfigError> {
    let root_response = config.response.clone().unwrap_or_default();

    // resource overrides are matched on their parsed shape so `:id` and `{id}` agree
    let overrides: Vec<(PathTemplate, &ResourceConfig)> = config
        .resources
        .iter()
        .map(|r| Ok((PathTemplate::parse(&qualify(None, r.path.as_deref()))?, r)))
        .collect::<Result<_, ConfigError>>()?;
    let mut used = vec![false; overrides.len()];

    let mut pending = Vec::new();
    for (spec_path, item) in &document.paths {
        let spec_template = PathTemplate::parse(&qualify(None, Some(spec_path)))?;
        let path = PathTemplate::parse(&qualify(config.path.as_deref(), Some(spec_path)))?;

        for (method, operation) in item.operations() {
            let matched = overrides.iter().position(|(template, resource)| {
                template.positional_pattern() == spec_template.positional_pattern()
                    && resource.method.map_or(true, |m| m == method)
            });

            let (content_type, response) = match matched {
                Some(i) => {
                    used[i] = true;
                    let resource = overrides[i].1;
                    (
                        resource.content_type.clone(),
                        child_response(config, resource.response.as_ref(), &root_response),
                    )
                }
                None => (None, root_response.clone()),
            };

            pending.push(Pending {
                path: path.clone(),
                method,
                content_type: content_type.or_else(|| config.content_type.clone()),
                kind: ResourceKind::Object,
                source: ResponseSource::Specification {
                    document: Arc::clone(&document),
                    operation: Arc::new(operation.clone()),
                },
                response,
            });
        }
    }

    for (i, (template, resource)) in overrides.iter().enumerate() {
        if !used[i] {
            warn!(
                "Resource {} {} in {} matches no operation in the specification",
                resource.method.unwrap_or_default(),
                template,
                config.source.display()
            );
        }
    }

    Ok(pending)
}

fn compile_script(
    config: &PluginConfig,
    pending: &Pending,
    settings: ScriptSettings,
) -> Result<Option<RhaiScript>, ConfigError> {
    if let Some(file) = &pending.response.script_file {
        return RhaiScript::from_file(&config.resolve_file(file), settings).map(Some);
    }
    if let Some(source) = &pending.response.script {
        let origin = format!("inline script for {} {}", pending.method, pending.path);
        return RhaiScript::compile(source, origin, settings).map(Some);
    }
    Ok(None)
}
