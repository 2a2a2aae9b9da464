//! # CommSync Client
//!
//! Client side of the ping-based synchronization protocol.
//!
//! This crate provides:
//! - `ThreadCursorStore`, the local cache of synchronized state with
//!   monotonic cursors and per-thread bookkeeping
//! - `SyncCoordinator`, the decision of when to start a ping
//! - `SessionLifecycle`, idle rotation of logged-out sessions
//! - `PruningPolicy`, eviction of cached thread backlogs
//! - `ClientInfo`, answers to the server's negotiation requests
//! - `PingTransport` abstraction for pings and history fetches, with a
//!   mock for testing
//! - `SyncDriver`, a tokio event loop wiring all of the above to timers
//!
//! ## Key Invariants
//!
//! - Cursors never regress, so overlapping or duplicated responses are
//!   harmless
//! - A failed ping leaves the store untouched
//! - The currently open thread is never pruned
//! - No ping starts while the app is hidden or logged out
//! - Results of calls started before a login change are discarded

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod driver;
mod error;
mod negotiation;
mod pruning;
mod session;
mod store;
mod transport;

pub use config::{ClientConfig, PruneConfig, SessionConfig};
pub use coordinator::{FirePlan, PingTimestamps, SyncCoordinator};
pub use driver::{DriverHandle, DriverStats, SharedStore, SyncDriver, TokioClock};
pub use error::{ClientError, ClientResult};
pub use negotiation::ClientInfo;
pub use pruning::PruningPolicy;
pub use session::{SessionCheck, SessionLifecycle};
pub use store::{MergeSummary, ThreadCursorStore, ThreadSyncState};
pub use transport::{MockTransport, PingTransport};
