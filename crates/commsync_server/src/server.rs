//! Ping endpoint facade.

use crate::backend::PingBackend;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::negotiation::NegotiationTable;
use crate::responder::PingResponder;
use crate::viewer::Viewer;
use commsync_protocol::{
    decode, encode, find_platform, ping_request_schema, Clock, FetchMessagesOutcome,
    FetchMessagesRequest, Outcome, PingOutcome, PingRequest, SystemClock, WireFormat,
};
use commsync_schema::{redact, validate, Schema};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, warn};

/// The ping and message-fetch endpoints.
///
/// Accepts a ping in any of three forms (typed, raw JSON, encoded bytes)
/// and always produces either a full response or an error body
/// `{"error": code}`, never a partial payload. Message fetches follow the
/// same rules.
///
/// # Example
///
/// ```
/// use commsync_server::{MemoryStore, ServerConfig, SyncServer};
/// use std::sync::Arc;
///
/// let store = Arc::new(MemoryStore::new());
/// let server = SyncServer::new(ServerConfig::default(), store);
///
/// // An HTTP layer would call server.handle_ping_bytes() per request.
/// assert_eq!(server.config().messages_per_thread, 20);
/// ```
pub struct SyncServer<B> {
    responder: PingResponder<B>,
    schema: Schema,
}

impl<B: PingBackend> SyncServer<B> {
    /// Creates a server on the system clock.
    pub fn new(config: ServerConfig, backend: Arc<B>) -> Self {
        Self::with_clock(config, backend, Arc::new(SystemClock))
    }

    /// Creates a server with an explicit clock.
    pub fn with_clock(config: ServerConfig, backend: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        Self {
            responder: PingResponder::new(config, backend, clock),
            schema: ping_request_schema(),
        }
    }

    /// Replaces the negotiation table.
    pub fn with_negotiation(mut self, negotiation: NegotiationTable) -> Self {
        self.responder = self.responder.with_negotiation(negotiation);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        self.responder.config()
    }

    /// Returns the backend.
    pub fn backend(&self) -> &Arc<B> {
        self.responder.backend()
    }

    /// Handles a typed request.
    pub async fn handle_ping(&self, viewer: &Viewer, request: &PingRequest) -> PingOutcome {
        match self.responder.respond(viewer, request).await {
            Ok(response) => PingOutcome::Success(Box::new(response)),
            Err(err) => failure(viewer, &err),
        }
    }

    /// Handles a raw JSON request body.
    ///
    /// The body is checked against the request schema first. Rejected
    /// input is logged with sensitive fields masked.
    pub async fn handle_ping_value(&self, viewer: &Viewer, input: Value) -> PingOutcome {
        if let Err(issues) = validate(&self.schema, &input) {
            warn!(
                session = %viewer.session_id,
                platform = ?find_platform(&input),
                input = %redact(&self.schema, &input),
                %issues,
                "rejected ping input"
            );
            return failure(viewer, &ServerError::InvalidParameters(issues.to_string()));
        }
        match serde_json::from_value::<PingRequest>(input) {
            Ok(request) => self.handle_ping(viewer, &request).await,
            Err(err) => failure(viewer, &ServerError::InvalidParameters(err.to_string())),
        }
    }

    /// Handles an encoded request body and returns the encoded outcome.
    pub async fn handle_ping_bytes(
        &self,
        viewer: &Viewer,
        format: WireFormat,
        body: &[u8],
    ) -> ServerResult<Vec<u8>> {
        let outcome = match decode::<Value>(format, body) {
            Ok(input) => self.handle_ping_value(viewer, input).await,
            Err(err) => failure(viewer, &ServerError::InvalidParameters(err.to_string())),
        };
        Ok(encode(format, &outcome)?)
    }

    /// Handles a typed message fetch.
    pub async fn handle_fetch_messages(
        &self,
        viewer: &Viewer,
        request: &FetchMessagesRequest,
    ) -> FetchMessagesOutcome {
        match self.responder.fetch_messages(viewer, request).await {
            Ok(page) => Outcome::Success(Box::new(page)),
            Err(err) => failure(viewer, &err),
        }
    }

    /// Handles an encoded message fetch and returns the encoded outcome.
    pub async fn handle_fetch_messages_bytes(
        &self,
        viewer: &Viewer,
        format: WireFormat,
        body: &[u8],
    ) -> ServerResult<Vec<u8>> {
        let outcome = match decode::<FetchMessagesRequest>(format, body) {
            Ok(request) => self.handle_fetch_messages(viewer, &request).await,
            Err(err) => failure(viewer, &ServerError::InvalidParameters(err.to_string())),
        };
        Ok(encode(format, &outcome)?)
    }
}

fn failure<T>(viewer: &Viewer, err: &ServerError) -> Outcome<T> {
    if err.is_client_error() {
        warn!(session = %viewer.session_id, error = %err, "request rejected");
    } else {
        error!(session = %viewer.session_id, error = %err, "request failed");
    }
    Outcome::Failure(err.to_response())
}
