//! In-process transport between a client driver and a server.

use async_trait::async_trait;
use commsync_client::{ClientError, ClientResult, PingTransport};
use commsync_protocol::{
    decode, encode, FetchMessagesOutcome, FetchMessagesRequest, FetchMessagesResponse, PingOutcome,
    PingRequest, PingResponse, SessionId, WireFormat,
};
use commsync_server::{PingBackend, ServerError, SyncServer, Viewer};
use std::sync::Arc;

/// Sends pings straight into a `SyncServer`, encoding both directions
/// with the real wire codec.
///
/// The viewer is re-read from the backend on every call, so negotiation
/// answers persisted by one ping are visible to the next. The session is
/// fixed at construction; a rotated session is not followed.
pub struct LoopbackTransport<B: PingBackend> {
    server: Arc<SyncServer<B>>,
    session_id: SessionId,
    format: WireFormat,
}

impl<B: PingBackend> LoopbackTransport<B> {
    /// Creates a JSON loopback for `session_id`.
    pub fn new(server: Arc<SyncServer<B>>, session_id: impl Into<SessionId>) -> Self {
        Self {
            server,
            session_id: session_id.into(),
            format: WireFormat::Json,
        }
    }

    /// Uses `format` on the wire.
    pub fn with_format(mut self, format: WireFormat) -> Self {
        self.format = format;
        self
    }

    /// Returns the server.
    pub fn server(&self) -> &Arc<SyncServer<B>> {
        &self.server
    }

    async fn viewer(&self) -> ClientResult<Viewer> {
        self.server
            .backend()
            .fetch_viewer(&self.session_id)
            .await
            .map_err(server_error)
    }
}

fn server_error(err: ServerError) -> ClientError {
    ClientError::from_code(err.error_code())
}

#[async_trait]
impl<B: PingBackend + 'static> PingTransport for LoopbackTransport<B> {
    async fn ping(&self, request: &PingRequest) -> ClientResult<PingResponse> {
        let viewer = self.viewer().await?;
        let body = encode(self.format, request)?;
        let reply = self
            .server
            .handle_ping_bytes(&viewer, self.format, &body)
            .await
            .map_err(server_error)?;
        let outcome: PingOutcome = decode(self.format, &reply)?;
        outcome
            .into_result()
            .map_err(|err| ClientError::from_code(&err.error))
    }

    async fn fetch_messages(
        &self,
        request: &FetchMessagesRequest,
    ) -> ClientResult<FetchMessagesResponse> {
        let viewer = self.viewer().await?;
        let body = encode(self.format, request)?;
        let reply = self
            .server
            .handle_fetch_messages_bytes(&viewer, self.format, &body)
            .await
            .map_err(server_error)?;
        let outcome: FetchMessagesOutcome = decode(self.format, &reply)?;
        outcome
            .into_result()
            .map_err(|err| ClientError::from_code(&err.error))
    }
}
