//! Search for the first input value matched by a named refinement.

use crate::schema::{Schema, Shape};
use crate::visit::{walk, FieldOutput, Path, Visitor};
use serde_json::{Map, Value};

struct FindFirst {
    name: &'static str,
}

impl Visitor for FindFirst {
    type Output = Option<Value>;

    fn leaf(&mut self, _path: &Path, _schema: &Schema, _value: &Value) -> Option<Value> {
        None
    }

    fn absent(&mut self, _path: &Path, _value: &Value) -> Option<Value> {
        None
    }

    fn mismatch(&mut self, _path: &Path, _schema: &Schema, _value: &Value) -> Option<Value> {
        None
    }

    fn shape(
        &mut self,
        _path: &Path,
        _shape: &Shape,
        _value: &Map<String, Value>,
        fields: Vec<FieldOutput<Option<Value>>>,
        _unknown: Vec<&str>,
    ) -> Option<Value> {
        fields.into_iter().find_map(|field| field.output)
    }

    fn list(&mut self, _path: &Path, items: Vec<Option<Value>>) -> Option<Value> {
        items.into_iter().flatten().next()
    }

    fn refinement(
        &mut self,
        _path: &Path,
        name: &'static str,
        value: &Value,
        base: Option<Value>,
    ) -> Option<Value> {
        if name == self.name {
            Some(value.clone())
        } else {
            base
        }
    }
}

/// Returns the first value in `value` that the refinement named `name`
/// accepted, in schema declaration order.
pub fn find_first(schema: &Schema, value: &Value, name: &'static str) -> Option<Value> {
    walk(schema, value, &mut FindFirst { name })
}
