//! Transport layer abstraction for ping and message-fetch calls.

use crate::error::{ClientError, ClientResult};
use async_trait::async_trait;
use commsync_protocol::{FetchMessagesRequest, FetchMessagesResponse, PingRequest, PingResponse};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A ping transport carries one request to the server and returns its
/// response. It also carries explicit fetches of a thread's history.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, WebSocket, in-process loopback, mock for testing).
/// Implementations must tolerate overlapping calls.
#[async_trait]
pub trait PingTransport: Send + Sync {
    /// Sends one ping.
    async fn ping(&self, request: &PingRequest) -> ClientResult<PingResponse>;

    /// Fetches one page of a thread's history.
    async fn fetch_messages(
        &self,
        request: &FetchMessagesRequest,
    ) -> ClientResult<FetchMessagesResponse>;
}

#[derive(Debug)]
struct MockReply<T> {
    result: ClientResult<T>,
    delay: Option<Duration>,
}

/// A mock transport for testing.
///
/// Each call takes the next queued reply as soon as it is made, then
/// waits out its delay, so replies to overlapping calls can arrive out of
/// order. An empty queue yields a retryable transport error.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    latency: Duration,
    replies: Mutex<VecDeque<MockReply<PingResponse>>>,
    requests: Mutex<Vec<PingRequest>>,
    pages: Mutex<VecDeque<MockReply<FetchMessagesResponse>>>,
    fetches: Mutex<Vec<FetchMessagesRequest>>,
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            latency: Duration::ZERO,
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            pages: Mutex::new(VecDeque::new()),
            fetches: Mutex::new(Vec::new()),
        }
    }

    /// Delays every reply without its own delay by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queues a successful reply.
    pub fn push_response(&self, response: PingResponse) {
        self.replies.lock().push_back(MockReply {
            result: Ok(response),
            delay: None,
        });
    }

    /// Queues a successful reply that arrives `delay` after its call.
    pub fn push_response_after(&self, response: PingResponse, delay: Duration) {
        self.replies.lock().push_back(MockReply {
            result: Ok(response),
            delay: Some(delay),
        });
    }

    /// Queues a failed reply.
    pub fn push_error(&self, error: ClientError) {
        self.replies.lock().push_back(MockReply {
            result: Err(error),
            delay: None,
        });
    }

    /// Queues a page for the next message fetch.
    pub fn push_page(&self, page: FetchMessagesResponse) {
        self.pages.lock().push_back(MockReply {
            result: Ok(page),
            delay: None,
        });
    }

    /// Queues a failed message fetch.
    pub fn push_page_error(&self, error: ClientError) {
        self.pages.lock().push_back(MockReply {
            result: Err(error),
            delay: None,
        });
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<PingRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the message fetches received so far.
    pub fn fetch_requests(&self) -> Vec<FetchMessagesRequest> {
        self.fetches.lock().clone()
    }

    async fn deliver<T>(&self, reply: Option<MockReply<T>>) -> ClientResult<T> {
        let delay = reply
            .as_ref()
            .and_then(|reply| reply.delay)
            .unwrap_or(self.latency);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(ClientError::transport_retryable("not connected"));
        }
        match reply {
            Some(reply) => reply.result,
            None => Err(ClientError::transport_retryable("no mock reply queued")),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PingTransport for MockTransport {
    async fn ping(&self, request: &PingRequest) -> ClientResult<PingResponse> {
        self.requests.lock().push(request.clone());
        let reply = self.replies.lock().pop_front();
        self.deliver(reply).await
    }

    async fn fetch_messages(
        &self,
        request: &FetchMessagesRequest,
    ) -> ClientResult<FetchMessagesResponse> {
        self.fetches.lock().push(request.clone());
        let reply = self.pages.lock().pop_front();
        self.deliver(reply).await
    }
}
