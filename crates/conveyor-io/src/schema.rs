//! Schema validator adapter.
//!
//! Wraps the JSON Schema engine behind two small functions: compiling a
//! raw schema document into a reusable [`Validator`], and turning a
//! validation run into the `{why, where, how}` detail triple the error
//! taxonomy carries. Validation itself never fails the caller; it reports
//! `Some(details)` or `None`.

use conveyor_core::ErrorDetails;
use jsonschema::Validator;
use serde_json::Value;
use thiserror::Error;

/// Raised when a configured schema document is not itself valid.
#[derive(Debug, Error)]
pub enum SchemaBuildError {
    /// The schema document failed to compile.
    #[error("schema failed to compile: {0}")]
    Compile(String),
}

/// Compiles a raw schema document into a reusable validator.
pub fn compile(schema: &Value) -> Result<Validator, SchemaBuildError> {
    jsonschema::validator_for(schema).map_err(|err| SchemaBuildError::Compile(err.to_string()))
}

/// Validates a resource against a compiled schema.
///
/// Returns `None` when the resource conforms. On failure, `where` is the
/// instance path of the first reported error (the caller prefixes it with
/// its own context). `how` is that error's message, or, when several
/// alternative sub-schemas each failed, an enumerated list of their
/// messages.
#[must_use]
pub fn validate(resource: &Value, schema: &Validator) -> Option<ErrorDetails> {
    let errors: Vec<_> = schema.iter_errors(resource).collect();
    let first = errors.first()?;

    let how = if errors.len() > 1 {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        format!("It can be any of these errors [{}]", messages.join(", "))
    } else {
        first.to_string()
    };

    Some(ErrorDetails {
        why: "Resource does not respect the schema".to_string(),
        where_: first.instance_path().to_string(),
        how,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person_schema() -> Validator {
        compile(&json!({
            "type": "object",
            "properties": {
                "a": { "type": "string" },
                "b": { "type": "string" },
            },
            "required": ["a", "b"],
        }))
        .unwrap()
    }

    #[test]
    fn test_conforming_resource_passes() {
        let schema = person_schema();
        assert!(validate(&json!({"a": "x", "b": "y"}), &schema).is_none());
    }

    #[test]
    fn test_missing_property_is_named() {
        let schema = person_schema();
        let details = validate(&json!({"a": "x"}), &schema).unwrap();

        assert_eq!(details.why, "Resource does not respect the schema");
        assert!(details.how.contains("\"b\""));
    }

    #[test]
    fn test_nested_failure_reports_instance_path() {
        let schema = compile(&json!({
            "type": "object",
            "properties": {
                "user": {
                    "type": "object",
                    "properties": { "age": { "type": "integer" } },
                    "required": ["age"],
                },
            },
            "required": ["user"],
        }))
        .unwrap();

        let details = validate(&json!({"user": {"age": "old"}}), &schema).unwrap();
        assert_eq!(details.where_, "/user/age");
    }

    #[test]
    fn test_multiple_failures_are_enumerated() {
        let schema = person_schema();
        let details = validate(&json!({}), &schema).unwrap();
        assert!(details.how.starts_with("It can be any of these errors ["));
        assert!(details.how.ends_with(']'));
    }

    #[test]
    fn test_invalid_schema_fails_to_compile() {
        let err = compile(&json!({"type": "not-a-type"})).unwrap_err();
        assert!(matches!(err, SchemaBuildError::Compile(_)));
    }
}
