//! Redaction of sensitive fields before logging.

use crate::schema::{Schema, Shape};
use crate::visit::{walk, FieldOutput, Path, Visitor};
use serde_json::{Map, Value};

/// Replacement text for sensitive values.
pub const REDACTED: &str = "********";

struct Redactor;

impl Visitor for Redactor {
    type Output = Value;

    fn leaf(&mut self, _path: &Path, _schema: &Schema, value: &Value) -> Value {
        value.clone()
    }

    fn absent(&mut self, _path: &Path, value: &Value) -> Value {
        value.clone()
    }

    // Mismatched input is echoed as-is; it never matched a sensitive node.
    fn mismatch(&mut self, _path: &Path, _schema: &Schema, value: &Value) -> Value {
        value.clone()
    }

    fn shape(
        &mut self,
        _path: &Path,
        _shape: &Shape,
        value: &Map<String, Value>,
        fields: Vec<FieldOutput<Value>>,
        unknown: Vec<&str>,
    ) -> Value {
        let mut result = Map::new();
        for field in fields.into_iter().filter(|f| f.present) {
            result.insert(field.key, field.output);
        }
        for key in unknown {
            if let Some(original) = value.get(key) {
                result.insert(key.to_string(), original.clone());
            }
        }
        Value::Object(result)
    }

    fn list(&mut self, _path: &Path, items: Vec<Value>) -> Value {
        Value::Array(items)
    }

    fn sensitive(&mut self, _path: &Path, value: &Value, _inner: Value) -> Value {
        if value.is_null() {
            Value::Null
        } else {
            Value::String(REDACTED.to_string())
        }
    }
}

/// Returns a copy of `value` with every sensitive node masked.
pub fn redact(schema: &Schema, value: &Value) -> Value {
    walk(schema, value, &mut Redactor)
}
