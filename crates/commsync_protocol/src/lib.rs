//! # CommSync Sync Protocol
//!
//! Types and codecs for the ping-based synchronization protocol.
//!
//! This crate provides:
//! - `PingRequest` / `PingResponse`, the recurring client→server exchange
//! - `FetchMessagesRequest` / `FetchMessagesResponse`, an explicit page of
//!   one thread's history, used to refill a pruned backlog
//! - Message, thread, calendar entry, update-log and user payloads
//! - `TruncationStatus` and `SyncCursors` bookkeeping types
//! - The `ServerRequest` / `ClientResponse` negotiation pair
//! - Watermark helpers that never let a cursor regress
//! - `ping_request_schema`, the structural contract for raw input
//! - JSON and CBOR wire codecs
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod codec;
mod entry;
mod error;
mod fetch;
mod ids;
mod message;
mod ping;
mod request;
mod thread;
mod update;
mod user;
mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{decode, encode, WireFormat};
pub use entry::{CalendarFilter, CalendarQuery, RawEntryInfo};
pub use error::{CodecError, CodecResult};
pub use fetch::{FetchMessagesOutcome, FetchMessagesRequest, FetchMessagesResponse};
pub use ids::{EntryId, MessageId, SessionId, ThreadId, Timestamp, UserId};
pub use message::{most_recent_message_timestamp, MessageContent, RawMessageInfo, TruncationStatus};
pub use ping::{ErrorResponse, Outcome, PingOutcome, PingRequest, PingResponse, SyncCursors};
pub use request::{ClientResponse, DeviceType, Platform, ServerRequest};
pub use thread::{ThreadCurrentUserInfo, ThreadInfo, ThreadType};
pub use update::{most_recent_update_timestamp, UpdateData, UpdateInfo, UpdatesResult};
pub use user::{CurrentUserInfo, UserInfo};
pub use validation::{
    calendar_query_schema, client_response_schema, find_platform, is_valid_date,
    ping_request_schema, PLATFORM_REFINEMENT,
};

/// Navigation id that always resolves, regardless of thread visibility.
pub const HOME_NAV_ID: &str = "home";

/// Default number of messages returned per thread window.
pub const DEFAULT_MESSAGES_PER_THREAD: usize = 20;
