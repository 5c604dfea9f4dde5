//! Response behaviour: what a single request should be answered with.
//!
//! Resolution is two stages. The resource's script (if any) runs first and
//! may produce a partial [`BehaviourOverride`]; the override is then merged
//! over the static defaults field by field. A script that makes no decision
//! leaves the defaults untouched.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ResponseConfig;
use crate::error::ScriptError;
use crate::request::InboundRequest;
use crate::resource::{PathParams, ResourceDefinition};
use crate::scripting::ScriptContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum BehaviourType {
    /// Resolve the body the usual way (examples, rows, static content)
    #[default]
    #[serde(rename = "default", alias = "DEFAULT_BEHAVIOUR")]
    DefaultBehaviour,
    /// Answer from the behaviour alone
    #[serde(rename = "shortCircuit", alias = "SHORT_CIRCUIT")]
    ShortCircuit,
}

/// The resolved directive for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseBehaviour {
    pub behaviour_type: BehaviourType,
    pub status_code: Option<u16>,
    pub example_name: Option<String>,
    pub content_type: Option<String>,
    pub headers: IndexMap<String, String>,
    pub static_file: Option<String>,
    pub static_data: Option<Value>,
}

/// Partial behaviour produced by a script. Unset fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BehaviourOverride {
    pub behaviour_type: Option<BehaviourType>,
    pub status_code: Option<u16>,
    pub example_name: Option<String>,
    pub content_type: Option<String>,
    pub headers: IndexMap<String, String>,
    pub static_file: Option<String>,
    pub static_data: Option<Value>,
    /// Drop any configured static body
    pub empty: bool,
}

impl ResponseBehaviour {
    pub fn from_config(response: &ResponseConfig, content_type: Option<&str>) -> Self {
        ResponseBehaviour {
            behaviour_type: BehaviourType::DefaultBehaviour,
            status_code: response.status_code,
            example_name: response.example_name.clone(),
            content_type: content_type.map(str::to_string),
            headers: response.headers.clone(),
            static_file: response.static_file.clone(),
            static_data: response.static_data.clone(),
        }
    }

    /// Status to send, 200 unless configured.
    pub fn status(&self) -> u16 {
        self.status_code.unwrap_or(200)
    }

    /// Merge `over` onto these defaults.
    pub fn apply(mut self, over: BehaviourOverride) -> Self {
        if over.empty {
            self.static_file = None;
            self.static_data = None;
        }
        if let Some(behaviour_type) = over.behaviour_type {
            self.behaviour_type = behaviour_type;
        }
        if over.status_code.is_some() {
            self.status_code = over.status_code;
        }
        if over.example_name.is_some() {
            self.example_name = over.example_name;
        }
        if over.content_type.is_some() {
            self.content_type = over.content_type;
        }
        if over.static_file.is_some() {
            self.static_file = over.static_file;
            self.static_data = None;
        }
        if over.static_data.is_some() {
            self.static_data = over.static_data;
            self.static_file = None;
        }
        self.headers.extend(over.headers);
        self
    }
}

/// Work out the behaviour for a matched request. The script runs at most once.
pub fn resolve_behaviour(
    resource: &ResourceDefinition,
    request: &InboundRequest,
    path_params: &PathParams,
) -> Result<ResponseBehaviour, ScriptError> {
    let defaults = ResponseBehaviour::from_config(&resource.response, resource.content_type.as_deref());

    let Some(script) = &resource.script else {
        return Ok(defaults);
    };

    let decision = script.execute(&ScriptContext {
        request,
        path_params,
        defaults: &defaults,
    })?;

    Ok(match decision {
        Some(over) => {
            debug!("Script {} overrode response behaviour", script.origin());
            defaults.apply(over)
        }
        None => defaults,
    })
}
