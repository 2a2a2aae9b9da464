//! Schema node kinds.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Predicate applied by a refinement node.
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A structural description of a JSON value.
///
/// Composite kinds (`Shape`, `List`, `Union`, `Maybe`, `Refinement`,
/// `Sensitive`) nest other schemas; the remaining kinds are leaves.
#[derive(Clone)]
pub enum Schema {
    /// Accepts any value.
    Any,
    /// A JSON boolean.
    Bool,
    /// A JSON number.
    Number,
    /// A JSON string.
    String,
    /// Exactly this value.
    Literal(Value),
    /// An object with declared fields.
    Shape(Shape),
    /// An array whose items all match the inner schema.
    List(Box<Schema>),
    /// The first member that matches wins.
    Union(Vec<Schema>),
    /// `null` (or a missing field) or the inner schema.
    Maybe(Box<Schema>),
    /// The inner schema plus a named predicate.
    Refinement {
        /// Name reported in errors and used by `find_first`.
        name: &'static str,
        /// Schema the value must match structurally.
        base: Box<Schema>,
        /// Extra condition on the value.
        predicate: Predicate,
    },
    /// A value that must never be echoed back (passwords, push tokens).
    Sensitive(Box<Schema>),
}

/// Fields of an object schema.
#[derive(Clone, Debug)]
pub struct Shape {
    /// Declared fields in declaration order.
    pub fields: Vec<(String, Schema)>,
    /// Whether undeclared keys are rejected.
    pub strict: bool,
}

impl Schema {
    /// Creates a strict object schema.
    pub fn shape<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Schema)>,
    {
        Schema::Shape(Shape {
            fields: fields.into_iter().map(|(k, s)| (k.into(), s)).collect(),
            strict: true,
        })
    }

    /// Creates an object schema that tolerates undeclared keys.
    pub fn open_shape<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Schema)>,
    {
        Schema::Shape(Shape {
            fields: fields.into_iter().map(|(k, s)| (k.into(), s)).collect(),
            strict: false,
        })
    }

    /// Creates a list schema.
    pub fn list(item: Schema) -> Self {
        Schema::List(Box::new(item))
    }

    /// Creates an optional schema.
    pub fn maybe(inner: Schema) -> Self {
        Schema::Maybe(Box::new(inner))
    }

    /// Creates a union schema.
    pub fn union(members: impl IntoIterator<Item = Schema>) -> Self {
        Schema::Union(members.into_iter().collect())
    }

    /// Creates a literal schema.
    pub fn literal(value: impl Into<Value>) -> Self {
        Schema::Literal(value.into())
    }

    /// Marks a schema as sensitive.
    pub fn sensitive(inner: Schema) -> Self {
        Schema::Sensitive(Box::new(inner))
    }

    /// Creates a refinement schema.
    pub fn refine<F>(name: &'static str, base: Schema, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Schema::Refinement {
            name,
            base: Box::new(base),
            predicate: Arc::new(predicate),
        }
    }

    /// Creates a string enumeration as a named refinement.
    pub fn one_of(name: &'static str, allowed: &[&str]) -> Self {
        let allowed: Vec<String> = allowed.iter().map(|s| (*s).to_string()).collect();
        Schema::refine(name, Schema::String, move |value| {
            value
                .as_str()
                .is_some_and(|s| allowed.iter().any(|a| a == s))
        })
    }

    /// Returns a short human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Schema::Any => "any value".into(),
            Schema::Bool => "boolean".into(),
            Schema::Number => "number".into(),
            Schema::String => "string".into(),
            Schema::Literal(value) => format!("literal {value}"),
            Schema::Shape(_) => "object".into(),
            Schema::List(item) => format!("list of {}", item.describe()),
            Schema::Union(members) => members
                .iter()
                .map(Schema::describe)
                .collect::<Vec<_>>()
                .join(" | "),
            Schema::Maybe(inner) => format!("optional {}", inner.describe()),
            Schema::Refinement { name, .. } => (*name).to_string(),
            Schema::Sensitive(inner) => inner.describe(),
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Any => f.write_str("Any"),
            Schema::Bool => f.write_str("Bool"),
            Schema::Number => f.write_str("Number"),
            Schema::String => f.write_str("String"),
            Schema::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Schema::Shape(shape) => f.debug_tuple("Shape").field(shape).finish(),
            Schema::List(item) => f.debug_tuple("List").field(item).finish(),
            Schema::Union(members) => f.debug_tuple("Union").field(members).finish(),
            Schema::Maybe(inner) => f.debug_tuple("Maybe").field(inner).finish(),
            Schema::Refinement { name, base, .. } => f
                .debug_struct("Refinement")
                .field("name", name)
                .field("base", base)
                .finish_non_exhaustive(),
            Schema::Sensitive(inner) => f.debug_tuple("Sensitive").field(inner).finish(),
        }
    }
}
