//! Response scripting.
//!
//! Scripts run before any default behaviour. They see the request and the
//! statically configured defaults, and either return nothing (no decision)
//! or a partial [`BehaviourOverride`](crate::behaviour::BehaviourOverride).

mod rhai_engine;

use std::time::Duration;

pub use rhai_engine::{RhaiScript, ScriptResponse};

use crate::behaviour::ResponseBehaviour;
use crate::request::InboundRequest;
use crate::resource::PathParams;

/// Limits applied to every script execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptSettings {
    pub timeout: Duration,
    /// `0` disables the operation limit
    pub max_operations: u64,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        ScriptSettings {
            timeout: Duration::from_millis(5000),
            max_operations: 1_000_000,
        }
    }
}

/// Everything a script can read.
pub struct ScriptContext<'a> {
    pub request: &'a InboundRequest,
    pub path_params: &'a PathParams,
    pub defaults: &'a ResponseBehaviour,
}
