//! Generic schema traversal.
//!
//! `walk` descends a value alongside its schema and hands every node to a
//! `Visitor`. Composite nodes are reported after their children, so a
//! visitor folds child outputs into its own output bottom-up.

use crate::schema::{Schema, Shape};
use crate::validate::is_valid;
use serde_json::{Map, Value};
use std::fmt;

/// One step of a path into a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

/// Location of a node relative to the input root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// Returns the root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns the segments from the root.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns a new path extended by an object key.
    pub fn key(&self, key: &str) -> Path {
        let mut child = self.clone();
        child.segments.push(Segment::Key(key.to_string()));
        child
    }

    fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    fn pop(&mut self) {
        self.segments.pop();
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i == 0 => write!(f, "{key}")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// Output produced for one declared field of a shape.
#[derive(Debug)]
pub struct FieldOutput<O> {
    /// Field name.
    pub key: String,
    /// Whether the key was present in the input.
    pub present: bool,
    /// Visitor output for the field value (`null` when absent).
    pub output: O,
}

/// Callbacks invoked by `walk`.
pub trait Visitor {
    /// Value produced per node.
    type Output;

    /// A primitive, literal or `Any` node whose value has the right form.
    fn leaf(&mut self, path: &Path, schema: &Schema, value: &Value) -> Self::Output;

    /// A `Maybe` node holding `null` (or a missing field).
    fn absent(&mut self, path: &Path, value: &Value) -> Self::Output;

    /// A node whose value does not have the form the schema requires.
    fn mismatch(&mut self, path: &Path, schema: &Schema, value: &Value) -> Self::Output;

    /// An object node, after all declared fields were visited.
    fn shape(
        &mut self,
        path: &Path,
        shape: &Shape,
        value: &Map<String, Value>,
        fields: Vec<FieldOutput<Self::Output>>,
        unknown: Vec<&str>,
    ) -> Self::Output;

    /// An array node, after all items were visited.
    fn list(&mut self, path: &Path, items: Vec<Self::Output>) -> Self::Output;

    /// A refinement whose predicate held, after its base was visited.
    fn refinement(
        &mut self,
        _path: &Path,
        _name: &'static str,
        _value: &Value,
        base: Self::Output,
    ) -> Self::Output {
        base
    }

    /// A sensitive node, after its inner schema was visited.
    fn sensitive(&mut self, _path: &Path, _value: &Value, inner: Self::Output) -> Self::Output {
        inner
    }
}

/// Walks `value` against `schema`, driving `visitor`.
pub fn walk<V: Visitor>(schema: &Schema, value: &Value, visitor: &mut V) -> V::Output {
    let mut path = Path::root();
    walk_at(schema, value, &mut path, visitor)
}

fn walk_at<V: Visitor>(
    schema: &Schema,
    value: &Value,
    path: &mut Path,
    visitor: &mut V,
) -> V::Output {
    match schema {
        Schema::Any => visitor.leaf(path, schema, value),
        Schema::Bool if value.is_boolean() => visitor.leaf(path, schema, value),
        Schema::Number if value.is_number() => visitor.leaf(path, schema, value),
        Schema::String if value.is_string() => visitor.leaf(path, schema, value),
        Schema::Literal(expected) if expected == value => visitor.leaf(path, schema, value),
        Schema::Shape(shape) => {
            let Some(map) = value.as_object() else {
                return visitor.mismatch(path, schema, value);
            };
            let mut fields = Vec::with_capacity(shape.fields.len());
            for (key, field_schema) in &shape.fields {
                let present = map.get(key);
                path.push(Segment::Key(key.clone()));
                let output = walk_at(field_schema, present.unwrap_or(&Value::Null), path, visitor);
                path.pop();
                fields.push(FieldOutput {
                    key: key.clone(),
                    present: present.is_some(),
                    output,
                });
            }
            let unknown = map
                .keys()
                .filter(|key| !shape.fields.iter().any(|(declared, _)| declared == *key))
                .map(String::as_str)
                .collect();
            visitor.shape(path, shape, map, fields, unknown)
        }
        Schema::List(item) => {
            let Some(items) = value.as_array() else {
                return visitor.mismatch(path, schema, value);
            };
            let mut outputs = Vec::with_capacity(items.len());
            for (index, element) in items.iter().enumerate() {
                path.push(Segment::Index(index));
                outputs.push(walk_at(item, element, path, visitor));
                path.pop();
            }
            visitor.list(path, outputs)
        }
        Schema::Union(members) => match members.iter().find(|member| is_valid(member, value)) {
            Some(member) => walk_at(member, value, path, visitor),
            None => visitor.mismatch(path, schema, value),
        },
        Schema::Maybe(inner) => {
            if value.is_null() {
                visitor.absent(path, value)
            } else {
                walk_at(inner, value, path, visitor)
            }
        }
        Schema::Refinement {
            name,
            base,
            predicate,
        } => {
            if predicate(value) {
                let output = walk_at(base, value, path, visitor);
                visitor.refinement(path, name, value, output)
            } else {
                visitor.mismatch(path, schema, value)
            }
        }
        Schema::Sensitive(inner) => {
            let output = walk_at(inner, value, path, visitor);
            visitor.sensitive(path, value, output)
        }
        Schema::Bool | Schema::Number | Schema::String | Schema::Literal(_) => {
            visitor.mismatch(path, schema, value)
        }
    }
}
