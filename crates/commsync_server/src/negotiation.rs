//! Server side of the `serverRequests` / `clientResponses` negotiation.
//!
//! Each request variant has one `NegotiationHandler`, looked up by variant
//! in a `NegotiationTable`. A handler knows three things: whether a client
//! answer is acceptable, how to persist it, and whether the viewer's
//! record still lacks the item.

use crate::backend::PingBackend;
use crate::error::{ServerError, ServerResult};
use crate::viewer::Viewer;
use async_trait::async_trait;
use commsync_protocol::{ClientResponse, Platform, ServerRequest};
use futures_util::future::try_join_all;
use std::collections::BTreeMap;

/// Handles one negotiation variant.
#[async_trait]
pub trait NegotiationHandler: Send + Sync {
    /// The variant this handler owns.
    fn request(&self) -> ServerRequest;

    /// Checks an answer before anything is written. `platform` is the
    /// platform in effect once this batch is applied.
    fn check(
        &self,
        viewer: &Viewer,
        platform: Option<Platform>,
        response: &ClientResponse,
    ) -> ServerResult<()>;

    /// Persists an answer that passed `check`.
    async fn apply(
        &self,
        backend: &dyn PingBackend,
        viewer: &Viewer,
        platform: Option<Platform>,
        response: &ClientResponse,
    ) -> ServerResult<()>;

    /// Returns true if the viewer's record still lacks this item.
    fn is_missing(&self, viewer: &Viewer) -> bool;
}

/// Asks for and records the session platform.
pub struct PlatformHandler;

#[async_trait]
impl NegotiationHandler for PlatformHandler {
    fn request(&self) -> ServerRequest {
        ServerRequest::Platform
    }

    fn check(&self, _: &Viewer, _: Option<Platform>, response: &ClientResponse) -> ServerResult<()> {
        match response {
            ClientResponse::Platform { .. } => Ok(()),
            other => Err(misrouted(self.request(), other)),
        }
    }

    async fn apply(
        &self,
        backend: &dyn PingBackend,
        viewer: &Viewer,
        _: Option<Platform>,
        response: &ClientResponse,
    ) -> ServerResult<()> {
        match response {
            ClientResponse::Platform { platform } => {
                backend
                    .set_session_platform(&viewer.session_id, *platform)
                    .await
            }
            other => Err(misrouted(self.request(), other)),
        }
    }

    fn is_missing(&self, viewer: &Viewer) -> bool {
        viewer.platform.is_none()
    }
}

/// Asks for and records the push token of a logged-in mobile device.
pub struct DeviceTokenHandler;

#[async_trait]
impl NegotiationHandler for DeviceTokenHandler {
    fn request(&self) -> ServerRequest {
        ServerRequest::DeviceToken
    }

    fn check(
        &self,
        viewer: &Viewer,
        platform: Option<Platform>,
        response: &ClientResponse,
    ) -> ServerResult<()> {
        if !matches!(response, ClientResponse::DeviceToken { .. }) {
            return Err(misrouted(self.request(), response));
        }
        if !platform.is_some_and(Platform::is_device) {
            return Err(ServerError::InvalidParameters(format!(
                "device token from non-device platform {}",
                platform.map_or("unknown", Platform::as_str)
            )));
        }
        if !viewer.is_logged_in() {
            return Err(ServerError::NotLoggedIn);
        }
        Ok(())
    }

    async fn apply(
        &self,
        backend: &dyn PingBackend,
        viewer: &Viewer,
        platform: Option<Platform>,
        response: &ClientResponse,
    ) -> ServerResult<()> {
        let ClientResponse::DeviceToken { device_token } = response else {
            return Err(misrouted(self.request(), response));
        };
        let device_type = platform.and_then(Platform::device_type).ok_or_else(|| {
            ServerError::InvalidParameters("device token without device platform".into())
        })?;
        backend
            .update_device_token(viewer, device_token, device_type)
            .await
    }

    fn is_missing(&self, viewer: &Viewer) -> bool {
        viewer.platform.is_some_and(Platform::is_device)
            && viewer.is_logged_in()
            && viewer.device_token.is_none()
    }
}

fn misrouted(expected: ServerRequest, response: &ClientResponse) -> ServerError {
    ServerError::Internal(format!(
        "{:?} response routed to {:?} handler",
        response.request(),
        expected
    ))
}

/// Answers from one request, checked and ready to apply.
///
/// At most one answer per variant is kept; a later answer in the same batch
/// replaces an earlier one.
#[derive(Debug, Default)]
pub struct NegotiationPlan<'r> {
    responses: BTreeMap<ServerRequest, &'r ClientResponse>,
    platform: Option<Platform>,
}

impl NegotiationPlan<'_> {
    /// Returns true if there is nothing to apply.
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    /// Platform in effect after this plan is applied.
    pub fn platform(&self) -> Option<Platform> {
        self.platform
    }
}

/// Dispatch table of negotiation handlers keyed by request variant.
pub struct NegotiationTable {
    handlers: BTreeMap<ServerRequest, Box<dyn NegotiationHandler>>,
}

impl NegotiationTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Creates a table with the PLATFORM and DEVICE_TOKEN handlers.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register(Box::new(PlatformHandler));
        table.register(Box::new(DeviceTokenHandler));
        table
    }

    /// Adds or replaces the handler for its variant.
    pub fn register(&mut self, handler: Box<dyn NegotiationHandler>) {
        self.handlers.insert(handler.request(), handler);
    }

    /// Checks every answer against the viewer. Nothing is written.
    pub fn plan<'r>(
        &self,
        viewer: &Viewer,
        responses: &'r [ClientResponse],
    ) -> ServerResult<NegotiationPlan<'r>> {
        let mut plan = NegotiationPlan {
            responses: BTreeMap::new(),
            platform: viewer.platform,
        };
        for response in responses {
            if let ClientResponse::Platform { platform } = response {
                plan.platform = Some(*platform);
            }
            plan.responses.insert(response.request(), response);
        }
        for (request, response) in &plan.responses {
            let handler = self.handlers.get(request).ok_or_else(|| {
                ServerError::InvalidParameters(format!("unsupported client response {request:?}"))
            })?;
            handler.check(viewer, plan.platform, response)?;
        }
        Ok(plan)
    }

    /// Persists every answer in `plan` concurrently.
    pub async fn apply(
        &self,
        backend: &dyn PingBackend,
        viewer: &Viewer,
        plan: &NegotiationPlan<'_>,
    ) -> ServerResult<()> {
        let writes = plan.responses.iter().filter_map(|(request, response)| {
            self.handlers
                .get(request)
                .map(|handler| handler.apply(backend, viewer, plan.platform, response))
        });
        try_join_all(writes).await?;
        Ok(())
    }

    /// Returns the variants the viewer's record still lacks.
    pub fn missing(&self, viewer: &Viewer) -> Vec<ServerRequest> {
        self.handlers
            .iter()
            .filter(|(_, handler)| handler.is_missing(viewer))
            .map(|(request, _)| *request)
            .collect()
    }
}

impl Default for NegotiationTable {
    fn default() -> Self {
        Self::standard()
    }
}
