//! # CommSync Testkit
//!
//! Test utilities for CommSync.
//!
//! This crate provides:
//! - A seeded in-memory backend with users, threads, messages, entries
//!   and an update log
//! - Property-based test generators using proptest
//! - A loopback transport that runs a client driver against an
//!   in-process server through the real wire codec
//!
//! ## Usage
//!
//! ```rust,ignore
//! use commsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn first_ping_returns_joined_threads() {
//!     let server = demo_server();
//!     let viewer = demo_viewer(server.backend());
//!     let outcome = server.handle_ping(&viewer, &initial_request()).await;
//!     // ... assertions
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod loopback;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::loopback::*;
}

pub use fixtures::*;
pub use generators::*;
pub use loopback::*;
