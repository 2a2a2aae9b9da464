//! Structural validation.

use crate::error::{SchemaError, ValidationError};
use crate::schema::{Schema, Shape};
use crate::visit::{walk, FieldOutput, Path, Visitor};
use serde_json::{Map, Value};

/// Collects every mismatch and unknown key.
#[derive(Default)]
struct Validator {
    issues: Vec<SchemaError>,
}

impl Visitor for Validator {
    type Output = ();

    fn leaf(&mut self, _path: &Path, _schema: &Schema, _value: &Value) {}

    fn absent(&mut self, _path: &Path, _value: &Value) {}

    fn mismatch(&mut self, path: &Path, schema: &Schema, _value: &Value) {
        self.issues.push(SchemaError::Mismatch {
            path: path.to_string(),
            expected: schema.describe(),
        });
    }

    fn shape(
        &mut self,
        path: &Path,
        shape: &Shape,
        _value: &Map<String, Value>,
        _fields: Vec<FieldOutput<()>>,
        unknown: Vec<&str>,
    ) {
        if shape.strict {
            for key in unknown {
                self.issues.push(SchemaError::UnknownField {
                    path: path.key(key).to_string(),
                });
            }
        }
    }

    fn list(&mut self, _path: &Path, _items: Vec<()>) {}
}

/// Validates `value` against `schema`, reporting every issue found.
pub fn validate(schema: &Schema, value: &Value) -> Result<(), ValidationError> {
    let mut validator = Validator::default();
    walk(schema, value, &mut validator);
    if validator.issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError {
            issues: validator.issues,
        })
    }
}

/// Returns true if `value` matches `schema`.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_ok()
}
