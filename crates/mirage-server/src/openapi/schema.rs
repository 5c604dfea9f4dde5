//! Schema-derived example synthesis.
//!
//! A schema is classified into a closed [`SchemaNode`] and walked recursively.
//! Explicit `example`, `default` and `enum` values win over anything derived
//! from the type. Recursion stops at [`MAX_DEPTH`] and when a `$ref` is met
//! again on the current path; both yield `null` for that branch.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{Map, Value};
use tracing::trace;

use super::refs::lookup_schema;
use super::spec::OpenApiDocument;
use crate::error::SynthesisError;

pub const MAX_DEPTH: usize = 16;

/// Produces a representative value for a schema.
pub trait SchemaSynthesizer: Send + Sync {
    fn synthesize(&self, document: &OpenApiDocument, schema: &Value)
        -> Result<Value, SynthesisError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Primitive {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

/// Closed view over the schema shapes the synthesizer understands.
#[derive(Debug)]
enum SchemaNode<'a> {
    Reference(&'a str),
    Literal(&'a Value),
    AllOf(&'a [Value]),
    OneOf(&'a [Value]),
    Object(Option<&'a Map<String, Value>>),
    Array(Option<&'a Value>),
    Primitive(Primitive, Option<&'a str>),
    Any,
}

impl<'a> SchemaNode<'a> {
    fn classify(schema: &'a Value) -> Result<Self, SynthesisError> {
        let Some(obj) = schema.as_object() else {
            // `true`/`false` schemas in 3.1
            return match schema {
                Value::Bool(_) => Ok(SchemaNode::Any),
                other => Err(SynthesisError::Unsupported(format!(
                    "schema must be an object, got {other}"
                ))),
            };
        };

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            return Ok(SchemaNode::Reference(reference));
        }
        if let Some(example) = obj.get("example") {
            return Ok(SchemaNode::Literal(example));
        }
        if let Some(examples) = obj.get("examples").and_then(Value::as_array) {
            if let Some(first) = examples.first() {
                return Ok(SchemaNode::Literal(first));
            }
        }
        if let Some(default) = obj.get("default") {
            return Ok(SchemaNode::Literal(default));
        }
        if let Some(first) = obj
            .get("enum")
            .and_then(Value::as_array)
            .and_then(|values| values.first())
        {
            return Ok(SchemaNode::Literal(first));
        }
        if let Some(members) = obj.get("allOf").and_then(Value::as_array) {
            return Ok(SchemaNode::AllOf(members));
        }
        for key in ["oneOf", "anyOf"] {
            if let Some(members) = obj.get(key).and_then(Value::as_array) {
                return Ok(SchemaNode::OneOf(members));
            }
        }

        let format = obj.get("format").and_then(Value::as_str);
        let declared = match obj.get("type") {
            Some(Value::String(t)) => Some(t.as_str()),
            // 3.1 type arrays: first non-null entry
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .find(|t| *t != "null")
                .or(Some("null")),
            _ => None,
        };

        let node = match declared {
            Some("object") => SchemaNode::Object(obj.get("properties").and_then(Value::as_object)),
            Some("array") => SchemaNode::Array(obj.get("items")),
            Some("string") => SchemaNode::Primitive(Primitive::String, format),
            Some("integer") => SchemaNode::Primitive(Primitive::Integer, format),
            Some("number") => SchemaNode::Primitive(Primitive::Number, format),
            Some("boolean") => SchemaNode::Primitive(Primitive::Boolean, format),
            Some("null") => SchemaNode::Primitive(Primitive::Null, format),
            Some(other) => {
                return Err(SynthesisError::Unsupported(format!("unknown type '{other}'")))
            }
            None if obj.contains_key("properties") => {
                SchemaNode::Object(obj.get("properties").and_then(Value::as_object))
            }
            None if obj.contains_key("items") => SchemaNode::Array(obj.get("items")),
            None => SchemaNode::Any,
        };
        Ok(node)
    }
}

/// The built-in synthesizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSchemaSynthesizer;

impl SchemaSynthesizer for DefaultSchemaSynthesizer {
    fn synthesize(
        &self,
        document: &OpenApiDocument,
        schema: &Value,
    ) -> Result<Value, SynthesisError> {
        let mut walker = Walker {
            document,
            ref_stack: Vec::new(),
        };
        walker.visit(schema, 0)
    }
}

struct Walker<'a> {
    document: &'a OpenApiDocument,
    ref_stack: Vec<String>,
}

impl<'a> Walker<'a> {
    fn visit(&mut self, schema: &'a Value, depth: usize) -> Result<Value, SynthesisError> {
        if depth > MAX_DEPTH {
            trace!("Schema depth limit reached");
            return Ok(Value::Null);
        }

        match SchemaNode::classify(schema)? {
            SchemaNode::Reference(reference) => {
                if self.ref_stack.iter().any(|r| r == reference) {
                    trace!("Schema reference cycle at {}", reference);
                    return Ok(Value::Null);
                }
                let target = lookup_schema(self.document, reference)?;
                self.ref_stack.push(reference.to_string());
                let value = self.visit(target, depth + 1);
                self.ref_stack.pop();
                value
            }
            SchemaNode::Literal(value) => Ok(value.clone()),
            SchemaNode::AllOf(members) => {
                let mut merged = Map::new();
                let mut last = Value::Null;
                for member in members {
                    match self.visit(member, depth + 1)? {
                        Value::Object(fields) => merged.extend(fields),
                        other => last = other,
                    }
                }
                if merged.is_empty() {
                    Ok(last)
                } else {
                    Ok(Value::Object(merged))
                }
            }
            SchemaNode::OneOf(members) => match members.first() {
                Some(first) => self.visit(first, depth + 1),
                None => Ok(Value::Null),
            },
            SchemaNode::Object(properties) => {
                let mut fields = Map::new();
                for (name, property) in properties.into_iter().flatten() {
                    fields.insert(name.clone(), self.visit(property, depth + 1)?);
                }
                Ok(Value::Object(fields))
            }
            SchemaNode::Array(items) => match items {
                Some(items) => Ok(Value::Array(vec![self.visit(items, depth + 1)?])),
                None => Ok(Value::Array(Vec::new())),
            },
            SchemaNode::Primitive(kind, format) => Ok(primitive(kind, format)),
            SchemaNode::Any => Ok(Value::Null),
        }
    }
}

fn primitive(kind: Primitive, format: Option<&str>) -> Value {
    match kind {
        Primitive::String => Value::String(
            match format {
                Some("date") => "2021-01-01".to_string(),
                Some("date-time") => "2021-01-01T00:00:00Z".to_string(),
                Some("time") => "00:00:00Z".to_string(),
                Some("email") => "user@example.com".to_string(),
                Some("uuid") => "3fa85f64-5717-4562-b3fc-2c963f66afa6".to_string(),
                Some("uri") | Some("url") => "https://example.com".to_string(),
                Some("hostname") => "example.com".to_string(),
                Some("ipv4") => "192.0.2.1".to_string(),
                Some("ipv6") => "2001:db8::1".to_string(),
                Some("byte") => STANDARD.encode("example"),
                Some("password") => "********".to_string(),
                _ => "string".to_string(),
            },
        ),
        Primitive::Integer => Value::from(0),
        Primitive::Number => Value::from(0.0),
        Primitive::Boolean => Value::Bool(true),
        Primitive::Null => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RefError;
    use serde_json::json;
    use std::path::Path;

    fn synth(components: &str, schema: Value) -> Result<Value, SynthesisError> {
        let doc = OpenApiDocument::parse(
            &format!("openapi: 3.0.0\npaths: {{}}\ncomponents:\n{components}"),
            Path::new("test.yaml"),
        )
        .unwrap();
        DefaultSchemaSynthesizer.synthesize(&doc, &schema)
    }

    #[test]
    fn test_object_with_formats() {
        let value = synth(
            "  schemas: {}",
            json!({
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "name": {"type": "string"},
                    "born": {"type": "string", "format": "date"},
                    "blob": {"type": "string", "format": "byte"},
                    "tags": {"type": "array", "items": {"type": "string"}}
                }
            }),
        )
        .unwrap();

        assert_eq!(
            value,
            json!({
                "id": 0,
                "name": "string",
                "born": "2021-01-01",
                "blob": "ZXhhbXBsZQ==",
                "tags": ["string"]
            })
        );
    }

    #[test]
    fn test_example_default_enum_precedence() {
        assert_eq!(
            synth("  schemas: {}", json!({"type": "string", "example": "ex", "default": "d"})).unwrap(),
            json!("ex")
        );
        assert_eq!(
            synth("  schemas: {}", json!({"type": "string", "default": "d", "enum": ["a"]})).unwrap(),
            json!("d")
        );
        assert_eq!(
            synth("  schemas: {}", json!({"type": "string", "enum": ["available", "sold"]})).unwrap(),
            json!("available")
        );
    }

    #[test]
    fn test_refs_and_all_of() {
        let components = r##"  schemas:
    Named:
      type: object
      properties:
        name:
          type: string
          example: Rex
    Pet:
      allOf:
        - $ref: "#/components/schemas/Named"
        - type: object
          properties:
            id:
              type: integer
              example: 7
"##;
        let value = synth(components, json!({"$ref": "#/components/schemas/Pet"})).unwrap();
        assert_eq!(value, json!({"name": "Rex", "id": 7}));
    }

    #[test]
    fn test_self_reference_terminates() {
        let components = r##"  schemas:
    Node:
      type: object
      properties:
        value:
          type: integer
        next:
          $ref: "#/components/schemas/Node"
"##;
        let value = synth(components, json!({"$ref": "#/components/schemas/Node"})).unwrap();
        assert_eq!(value, json!({"value": 0, "next": null}));
    }

    #[test]
    fn test_dangling_ref_is_error() {
        let err = synth("  schemas: {}", json!({"$ref": "#/components/schemas/Ghost"})).unwrap_err();
        assert_eq!(
            err,
            SynthesisError::Reference(RefError::Dangling("#/components/schemas/Ghost".into()))
        );
    }

    #[test]
    fn test_one_of_takes_first_and_nullable_types() {
        assert_eq!(
            synth(
                "  schemas: {}",
                json!({"oneOf": [{"type": "boolean"}, {"type": "string"}]})
            )
            .unwrap(),
            json!(true)
        );
        assert_eq!(
            synth("  schemas: {}", json!({"type": ["null", "integer"]})).unwrap(),
            json!(0)
        );
    }

    #[test]
    fn test_deep_nesting_is_bounded() {
        let mut schema = json!({"type": "integer"});
        for _ in 0..(MAX_DEPTH + 5) {
            schema = json!({"type": "array", "items": schema});
        }
        let mut value = synth("  schemas: {}", schema).unwrap();
        let mut depth = 0;
        while let Value::Array(mut items) = value {
            value = items.pop().unwrap_or(Value::Null);
            depth += 1;
        }
        assert_eq!(value, Value::Null);
        assert_eq!(depth, MAX_DEPTH + 1);
    }
}
