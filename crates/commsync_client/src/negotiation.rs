//! Answers to server requests.

use commsync_protocol::{ClientResponse, Platform, ServerRequest};
use std::fmt;

type Answer = fn(&ClientInfo) -> Option<ClientResponse>;

/// One answer function per request variant.
const ANSWERS: &[(ServerRequest, Answer)] = &[
    (ServerRequest::Platform, ClientInfo::platform_response),
    (ServerRequest::DeviceToken, ClientInfo::device_token_response),
];

/// What the client knows about itself and can report to the server.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Platform this client runs on.
    pub platform: Platform,
    /// Push-notification token, once the OS has issued one.
    pub device_token: Option<String>,
}

impl ClientInfo {
    /// Creates info for `platform` without a device token.
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            device_token: None,
        }
    }

    /// Sets the device token.
    pub fn with_device_token(mut self, token: impl Into<String>) -> Self {
        self.device_token = Some(token.into());
        self
    }

    /// Answers the given server requests. Requests the client cannot
    /// answer yet are skipped; the server keeps asking for them.
    pub fn respond_to(&self, requests: &[ServerRequest]) -> Vec<ClientResponse> {
        requests
            .iter()
            .filter_map(|request| {
                ANSWERS
                    .iter()
                    .find(|(variant, _)| variant == request)
                    .and_then(|(_, answer)| answer(self))
            })
            .collect()
    }

    fn platform_response(&self) -> Option<ClientResponse> {
        Some(ClientResponse::Platform {
            platform: self.platform,
        })
    }

    fn device_token_response(&self) -> Option<ClientResponse> {
        if !self.platform.is_device() {
            return None;
        }
        self.device_token
            .clone()
            .map(|device_token| ClientResponse::DeviceToken { device_token })
    }
}

impl fmt::Debug for ClientInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientInfo")
            .field("platform", &self.platform)
            .field("has_device_token", &self.device_token.is_some())
            .finish()
    }
}
