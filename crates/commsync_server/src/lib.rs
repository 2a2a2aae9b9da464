//! # CommSync Sync Server
//!
//! Authoritative side of the ping synchronization protocol.
//!
//! This crate provides:
//! - `PingResponder`, which reconciles a client's cursors against server
//!   state and returns message, thread, entry and update-log deltas, and
//!   serves explicit pages of one thread's history
//! - `NegotiationTable`, the dispatch table behind `serverRequests` /
//!   `clientResponses`
//! - `PingBackend`, the storage collaborators the responder consumes
//! - `MemoryStore`, an in-memory reference backend
//! - `SyncServer`, an endpoint facade that validates raw input and maps
//!   errors to `{"error": code}` bodies
//!
//! # Guarantees
//!
//! - Validation completes before any write.
//! - `messagesCurrentAsOf` in a response is never below the request's
//!   cursor or any returned message time.
//! - A fetch or write failure fails the whole call; no partial response
//!   is ever produced, so a client retrying with the same cursors is safe.
//! - Activity and delivered-update stamps are monotonic, so overlapping
//!   pings for one session may complete in any order.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod backend;
mod config;
mod error;
mod negotiation;
mod responder;
mod server;
mod store;
mod viewer;

pub use backend::{EntriesResult, MessagesResult, PingBackend, ThreadSelection, ThreadsResult};
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use negotiation::{
    DeviceTokenHandler, NegotiationHandler, NegotiationPlan, NegotiationTable, PlatformHandler,
};
pub use responder::PingResponder;
pub use server::SyncServer;
pub use store::{FailPoint, MemoryStore, SessionRecord};
pub use viewer::Viewer;
