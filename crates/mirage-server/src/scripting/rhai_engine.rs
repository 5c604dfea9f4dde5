use indexmap::IndexMap;
use rhai::{Dynamic, Engine, EvalAltResult, Map, Scope, AST};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::{ScriptContext, ScriptSettings};
use crate::behaviour::{BehaviourOverride, BehaviourType};
use crate::error::{ConfigError, ScriptError};

/// Builder scripts return to steer the response: `respond().withStatusCode(201)`.
#[derive(Debug, Clone, Default)]
pub struct ScriptResponse {
    inner: BehaviourOverride,
}

impl ScriptResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status_code(mut self, code: i64) -> Result<Self, Box<EvalAltResult>> {
        let code = u16::try_from(code)
            .ok()
            .filter(|c| (100..=599).contains(c))
            .ok_or_else(|| format!("Invalid status code {code}"))?;
        self.inner.status_code = Some(code);
        Ok(self)
    }

    pub fn with_example_name(mut self, name: &str) -> Self {
        self.inner.example_name = Some(name.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.inner.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.inner.content_type = Some(content_type.to_string());
        self
    }

    pub fn with_file(mut self, file: &str) -> Self {
        self.inner.static_file = Some(file.to_string());
        self.inner.static_data = None;
        self
    }

    pub fn with_data(mut self, data: Dynamic) -> Result<Self, Box<EvalAltResult>> {
        let value: serde_json::Value = rhai::serde::from_dynamic(&data)?;
        self.inner.static_data = Some(value);
        self.inner.static_file = None;
        Ok(self)
    }

    pub fn with_empty(mut self) -> Self {
        self.inner.empty = true;
        self.inner.static_file = None;
        self.inner.static_data = None;
        self
    }

    pub fn using_default_behaviour(mut self) -> Self {
        self.inner.behaviour_type = Some(BehaviourType::DefaultBehaviour);
        self
    }

    pub fn skip_default_behaviour(mut self) -> Self {
        self.inner.behaviour_type = Some(BehaviourType::ShortCircuit);
        self
    }

    fn and(self) -> Self {
        self
    }

    pub fn into_override(self) -> BehaviourOverride {
        self.inner
    }
}

/// A compiled Rhai response script
#[derive(Clone)]
pub struct RhaiScript {
    ast: Arc<AST>,
    origin: String,
    settings: ScriptSettings,
}

impl std::fmt::Debug for RhaiScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiScript")
            .field("origin", &self.origin)
            .field("settings", &self.settings)
            .finish()
    }
}

impl RhaiScript {
    /// Compile once at registration; syntax errors abort startup.
    pub fn compile(
        source: &str,
        origin: impl Into<String>,
        settings: ScriptSettings,
    ) -> Result<Self, ConfigError> {
        let origin = origin.into();
        let engine = Self::create_engine(&settings, None);
        let ast = engine
            .compile(source)
            .map_err(|e| ConfigError::ScriptCompile {
                origin: origin.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            ast: Arc::new(ast),
            origin,
            settings,
        })
    }

    pub fn from_file(path: &Path, settings: ScriptSettings) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::compile(&source, path.display().to_string(), settings)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn create_engine(settings: &ScriptSettings, deadline: Option<Instant>) -> Engine {
        let mut engine = Engine::new();
        engine.set_max_operations(settings.max_operations);

        if let Some(deadline) = deadline {
            engine.on_progress(move |_| {
                (Instant::now() >= deadline).then(|| Dynamic::from("timeout"))
            });
        }

        engine
            .register_type_with_name::<ScriptResponse>("ScriptResponse")
            .register_fn("respond", ScriptResponse::new)
            .register_fn("withStatusCode", ScriptResponse::with_status_code)
            .register_fn("withExampleName", ScriptResponse::with_example_name)
            .register_fn("withHeader", ScriptResponse::with_header)
            .register_fn("withContentType", ScriptResponse::with_content_type)
            .register_fn("withFile", ScriptResponse::with_file)
            .register_fn("withData", ScriptResponse::with_data)
            .register_fn("withEmpty", ScriptResponse::with_empty)
            .register_fn("usingDefaultBehaviour", ScriptResponse::using_default_behaviour)
            .register_fn("skipDefaultBehaviour", ScriptResponse::skip_default_behaviour)
            .register_fn("and", ScriptResponse::and);

        engine
    }

    /// Run the script. `Ok(None)` means the script made no decision.
    pub fn execute(
        &self,
        context: &ScriptContext<'_>,
    ) -> Result<Option<BehaviourOverride>, ScriptError> {
        let engine =
            Self::create_engine(&self.settings, Some(Instant::now() + self.settings.timeout));

        let request = request_map(context);
        let mut defaults = Map::new();
        defaults.insert(
            "statusCode".into(),
            Dynamic::from(i64::from(context.defaults.status())),
        );
        defaults.insert(
            "exampleName".into(),
            optional_string(context.defaults.example_name.as_deref()),
        );
        defaults.insert(
            "contentType".into(),
            optional_string(context.defaults.content_type.as_deref()),
        );

        let mut ctx = Map::new();
        ctx.insert("request".into(), Dynamic::from(request.clone()));
        ctx.insert("defaults".into(), Dynamic::from(defaults));

        let mut scope = Scope::new();
        scope.push("context", ctx);
        scope.push("request", request);

        let result: Dynamic = engine
            .eval_ast_with_scope(&mut scope, self.ast.as_ref())
            .map_err(|e| match *e {
                EvalAltResult::ErrorTerminated(..) => ScriptError::Timeout {
                    origin: self.origin.clone(),
                    timeout: self.settings.timeout,
                },
                other => ScriptError::Runtime {
                    origin: self.origin.clone(),
                    message: other.to_string(),
                },
            })?;

        self.parse_result(result)
    }

    fn parse_result(&self, result: Dynamic) -> Result<Option<BehaviourOverride>, ScriptError> {
        if result.is_unit() {
            debug!("Script {} made no decision", self.origin);
            return Ok(None);
        }

        if result.is::<ScriptResponse>() {
            return Ok(result
                .try_cast::<ScriptResponse>()
                .map(ScriptResponse::into_override));
        }

        if result.is_map() {
            return rhai::serde::from_dynamic::<BehaviourOverride>(&result)
                .map(Some)
                .map_err(|e| ScriptError::InvalidResult {
                    origin: self.origin.clone(),
                    type_name: format!("map ({e})"),
                });
        }

        Err(ScriptError::InvalidResult {
            origin: self.origin.clone(),
            type_name: result.type_name().to_string(),
        })
    }
}

fn optional_string(value: Option<&str>) -> Dynamic {
    value
        .map(|v| Dynamic::from(v.to_string()))
        .unwrap_or(Dynamic::UNIT)
}

fn string_map(values: &IndexMap<String, String>) -> Map {
    values
        .iter()
        .map(|(k, v)| (k.as_str().into(), Dynamic::from(v.clone())))
        .collect()
}

fn request_map(context: &ScriptContext<'_>) -> Map {
    let request = context.request;
    let mut map = Map::new();
    map.insert("method".into(), Dynamic::from(request.method.clone()));
    map.insert("path".into(), Dynamic::from(request.path.clone()));
    map.insert("pathParams".into(), Dynamic::from(string_map(context.path_params)));
    map.insert("query".into(), Dynamic::from(string_map(&request.query)));
    map.insert("headers".into(), Dynamic::from(string_map(&request.headers)));
    map.insert(
        "body".into(),
        request.body_text().map(Dynamic::from).unwrap_or(Dynamic::UNIT),
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::ResponseBehaviour;
    use crate::request::InboundRequest;
    use crate::resource::PathParams;
    use std::time::Duration;

    fn run(script: &str, request: &InboundRequest, params: &PathParams) -> Result<Option<BehaviourOverride>, ScriptError> {
        let compiled = RhaiScript::compile(script, "test", ScriptSettings::default()).unwrap();
        let defaults = ResponseBehaviour {
            status_code: Some(200),
            ..Default::default()
        };
        compiled.execute(&ScriptContext {
            request,
            path_params: params,
            defaults: &defaults,
        })
    }

    #[test]
    fn test_unit_result_is_no_decision() {
        let request = InboundRequest::new("GET", "/pets");
        let result = run("let x = 1;", &request, &PathParams::new()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let request = InboundRequest::new("GET", "/pets/2");
        let params = PathParams::from([("id".to_string(), "2".to_string())]);
        let script = r#"
            if context.request.pathParams.id == "2" {
                respond().withStatusCode(202).withHeader("X-Pet", "two").and().withExampleName("second")
            }
        "#;

        let over = run(script, &request, &params).unwrap().unwrap();
        assert_eq!(over.status_code, Some(202));
        assert_eq!(over.example_name.as_deref(), Some("second"));
        assert_eq!(over.headers.get("X-Pet").map(String::as_str), Some("two"));
        assert_eq!(over.behaviour_type, None);
    }

    #[test]
    fn test_empty_override_is_distinct_from_none() {
        let request = InboundRequest::new("GET", "/");
        let over = run("respond()", &request, &PathParams::new()).unwrap();
        assert_eq!(over, Some(BehaviourOverride::default()));
    }

    #[test]
    fn test_reads_query_headers_and_defaults() {
        let request = InboundRequest::new("POST", "/orders")
            .with_query_string("express=true")
            .with_header("X-Tenant", "acme")
            .with_body("{}");
        let script = r#"
            if request.query.express == "true" && request.headers["x-tenant"] == "acme" && request.body == "{}" {
                respond().withStatusCode(context.defaults.statusCode + 1).skipDefaultBehaviour()
            }
        "#;
        let over = run(script, &request, &PathParams::new()).unwrap().unwrap();
        assert_eq!(over.status_code, Some(201));
        assert_eq!(over.behaviour_type, Some(BehaviourType::ShortCircuit));
    }

    #[test]
    fn test_string_defaults_visible_to_script() {
        let request = InboundRequest::new("GET", "/pets");
        let params = PathParams::new();
        let defaults = ResponseBehaviour {
            example_name: Some("cat".into()),
            content_type: Some("application/xml".into()),
            ..Default::default()
        };
        let script = RhaiScript::compile(
            r#"
                if context.defaults.exampleName == "cat" && context.defaults.contentType == "application/xml" {
                    respond().withExampleName("dog")
                }
            "#,
            "defaults",
            ScriptSettings::default(),
        )
        .unwrap();

        let over = script
            .execute(&ScriptContext {
                request: &request,
                path_params: &params,
                defaults: &defaults,
            })
            .unwrap()
            .unwrap();
        assert_eq!(over.example_name.as_deref(), Some("dog"));

        // unset defaults are unit
        let unset = run(
            "if context.defaults.exampleName == () { respond().withStatusCode(204) }",
            &request,
            &params,
        )
        .unwrap()
        .unwrap();
        assert_eq!(unset.status_code, Some(204));
    }

    #[test]
    fn test_map_result_accepted() {
        let request = InboundRequest::new("GET", "/");
        let over = run(r#"#{ statusCode: 418, staticData: "teapot" }"#, &request, &PathParams::new())
            .unwrap()
            .unwrap();
        assert_eq!(over.status_code, Some(418));
        assert_eq!(over.static_data, Some(serde_json::json!("teapot")));
    }

    #[test]
    fn test_with_data_and_empty() {
        let request = InboundRequest::new("GET", "/");
        let over = run(r#"respond().withData(#{ id: 1 })"#, &request, &PathParams::new())
            .unwrap()
            .unwrap();
        assert_eq!(over.static_data, Some(serde_json::json!({"id": 1})));

        let over = run(r#"respond().withFile("a.json").withEmpty()"#, &request, &PathParams::new())
            .unwrap()
            .unwrap();
        assert!(over.empty);
        assert_eq!(over.static_file, None);
    }

    #[test]
    fn test_invalid_result_and_status() {
        let request = InboundRequest::new("GET", "/");
        assert!(matches!(
            run("42", &request, &PathParams::new()),
            Err(ScriptError::InvalidResult { .. })
        ));
        assert!(matches!(
            run("respond().withStatusCode(42)", &request, &PathParams::new()),
            Err(ScriptError::Runtime { .. })
        ));
    }

    #[test]
    fn test_compile_error_is_config_error() {
        let err = RhaiScript::compile("respond(", "broken.rhai", ScriptSettings::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::ScriptCompile { origin, .. } if origin == "broken.rhai"));
    }

    #[test]
    fn test_timeout() {
        let settings = ScriptSettings {
            timeout: Duration::from_millis(50),
            max_operations: 0,
        };
        let script = RhaiScript::compile("loop { }", "spin", settings).unwrap();
        let request = InboundRequest::new("GET", "/");
        let defaults = ResponseBehaviour::default();
        let err = script
            .execute(&ScriptContext {
                request: &request,
                path_params: &PathParams::new(),
                defaults: &defaults,
            })
            .unwrap_err();
        assert!(matches!(err, ScriptError::Timeout { .. }));
    }
}
