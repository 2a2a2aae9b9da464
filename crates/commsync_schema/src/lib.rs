//! # CommSync Schema
//!
//! Structural schema descriptions for JSON-shaped input.
//!
//! This crate provides:
//! - `Schema`, a tagged union of node kinds (shape, list, union, maybe,
//!   refinement, sensitive, and primitive leaves)
//! - `walk`, a single recursive traversal driven by a `Visitor`
//! - Three visitors built on it: validation, redaction of sensitive
//!   fields, and "first value matching a named refinement" search
//!
//! The traversal is implemented once; every consumer only decides what to
//! produce at each node.
//!
//! ```
//! use commsync_schema::{validate, redact, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::shape([
//!     ("username", Schema::String),
//!     ("password", Schema::sensitive(Schema::String)),
//! ]);
//! let input = json!({ "username": "ashoat", "password": "hunter2" });
//!
//! assert!(validate(&schema, &input).is_ok());
//! assert_eq!(redact(&schema, &input)["password"], json!("********"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod find;
mod redact;
mod schema;
mod validate;
mod visit;

pub use error::{SchemaError, ValidationError};
pub use find::find_first;
pub use redact::{redact, REDACTED};
pub use schema::{Predicate, Schema, Shape};
pub use validate::{is_valid, validate};
pub use visit::{walk, FieldOutput, Path, Segment, Visitor};
