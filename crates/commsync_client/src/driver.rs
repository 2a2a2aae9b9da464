//! Tokio event loop that drives pings, session checks and prune sweeps.
//!
//! The driver owns every piece of scheduling state. The embedding app
//! talks to it through a [`DriverHandle`]; timers and in-flight calls
//! report back through an internal channel. Only the cursor store is
//! shared, so the app can render from it.

use crate::config::ClientConfig;
use crate::coordinator::{FirePlan, SyncCoordinator};
use crate::error::{ClientError, ClientResult};
use crate::negotiation::ClientInfo;
use crate::pruning::PruningPolicy;
use crate::session::{SessionCheck, SessionLifecycle};
use crate::store::ThreadCursorStore;
use crate::transport::PingTransport;
use commsync_protocol::{
    Clock, FetchMessagesRequest, FetchMessagesResponse, PingResponse, ServerRequest, SessionId,
    ThreadId, Timestamp,
};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Cursor store shared between the driver and the app.
pub type SharedStore = Arc<RwLock<ThreadCursorStore>>;

/// A clock that follows tokio's timer, so paused test time moves it too.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: Instant,
    base: Timestamp,
}

impl TokioClock {
    /// Creates a clock reading `base` now.
    pub fn new(base: Timestamp) -> Self {
        Self {
            origin: Instant::now(),
            base,
        }
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> Timestamp {
        self.base + self.origin.elapsed().as_millis() as Timestamp
    }
}

/// Counters reported when the driver stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Pings started.
    pub pings_started: u64,
    /// Pings that returned a response.
    pub pings_succeeded: u64,
    /// Pings that failed.
    pub pings_failed: u64,
    /// Logged-out sessions replaced after going idle.
    pub sessions_rotated: u64,
    /// Thread backlogs evicted.
    pub threads_pruned: u64,
    /// Evicted threads fetched again after the user opened them.
    pub threads_refetched: u64,
}

enum Command {
    SetVisible(bool),
    SetLoggedIn(bool),
    Navigate(ThreadId),
    SetActiveThread(Option<ThreadId>),
    SetDeviceToken(String),
    Shutdown(oneshot::Sender<DriverStats>),
}

// Call completions carry the login epoch they started in. A login change
// bumps the epoch, so results addressed to the previous viewer are dropped.
enum Internal {
    Recheck,
    PingCompleted {
        epoch: u64,
        result: Box<ClientResult<PingResponse>>,
    },
    MessagesFetched {
        epoch: u64,
        thread_id: ThreadId,
        result: Box<ClientResult<FetchMessagesResponse>>,
    },
    SessionCheck { generation: u64 },
    PruneSweep { generation: u64 },
}

/// Handle to a running driver.
#[derive(Clone)]
pub struct DriverHandle {
    commands: mpsc::UnboundedSender<Command>,
    store: SharedStore,
    session: watch::Receiver<SessionId>,
}

impl DriverHandle {
    fn send(&self, command: Command) -> ClientResult<()> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::DriverStopped)
    }

    /// Reports whether the app is in the foreground.
    pub fn set_visible(&self, visible: bool) -> ClientResult<()> {
        self.send(Command::SetVisible(visible))
    }

    /// Reports a login or logout.
    pub fn set_logged_in(&self, logged_in: bool) -> ClientResult<()> {
        self.send(Command::SetLoggedIn(logged_in))
    }

    /// Records that the user opened a thread. A thread whose backlog was
    /// evicted is fetched again while logged in.
    pub fn navigate_to(&self, thread_id: ThreadId) -> ClientResult<()> {
        self.send(Command::Navigate(thread_id))
    }

    /// Sets the thread currently on screen. It is never pruned.
    pub fn set_active_thread(&self, thread_id: Option<ThreadId>) -> ClientResult<()> {
        self.send(Command::SetActiveThread(thread_id))
    }

    /// Supplies the push-notification token once the OS issues it.
    pub fn set_device_token(&self, token: impl Into<String>) -> ClientResult<()> {
        self.send(Command::SetDeviceToken(token.into()))
    }

    /// Returns the shared cursor store.
    pub fn store(&self) -> SharedStore {
        Arc::clone(&self.store)
    }

    /// Returns the current session id.
    pub fn session_id(&self) -> SessionId {
        self.session.borrow().clone()
    }

    /// Returns a receiver that observes session rotations.
    ///
    /// Transports that carry the session id must follow this channel and
    /// send the latest value; the driver does not rebuild its transport
    /// when it rotates the session.
    pub fn subscribe_session(&self) -> watch::Receiver<SessionId> {
        self.session.clone()
    }

    /// Stops the driver and returns its counters. In-flight pings are
    /// not cancelled; their results are dropped.
    pub async fn shutdown(self) -> ClientResult<DriverStats> {
        let (reply, stats) = oneshot::channel();
        self.send(Command::Shutdown(reply))?;
        stats.await.map_err(|_| ClientError::DriverStopped)
    }
}

/// Client sync driver.
pub struct SyncDriver {
    config: ClientConfig,
    transport: Arc<dyn PingTransport>,
    store: ThreadCursorStore,
    info: ClientInfo,
    clock: Arc<dyn Clock>,
    session_id: Option<SessionId>,
}

impl SyncDriver {
    /// Creates a driver that pings through `transport` and merges into
    /// `store`.
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn PingTransport>,
        store: ThreadCursorStore,
        info: ClientInfo,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            info,
            clock: Arc::new(TokioClock::new(commsync_protocol::SystemClock.now_ms())),
            session_id: None,
        }
    }

    /// Uses `clock` instead of the tokio-anchored system time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Resumes an existing session instead of generating one.
    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Spawns the event loop on the current tokio runtime.
    pub fn spawn(self) -> DriverHandle {
        let now = self.clock.now_ms();
        let session_id = self
            .session_id
            .unwrap_or_else(SessionLifecycle::generate_id);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = watch::channel(session_id.clone());
        let store = Arc::new(RwLock::new(self.store));

        let state = DriverState {
            coordinator: SyncCoordinator::new(&self.config),
            session: SessionLifecycle::new(self.config.session.clone(), session_id, now),
            pruning: PruningPolicy::new(&self.config.prune),
            store: Arc::clone(&store),
            transport: self.transport,
            info: self.info,
            clock: self.clock,
            pending_requests: Vec::new(),
            active_thread: None,
            refetching: BTreeSet::new(),
            login_epoch: 0,
            session_generation: 0,
            prune_generation: 0,
            internal: internal_tx,
            session_tx,
            stats: DriverStats::default(),
        };
        tokio::spawn(state.run(commands_rx, internal_rx));

        DriverHandle {
            commands: commands_tx,
            store,
            session: session_rx,
        }
    }
}

struct DriverState {
    coordinator: SyncCoordinator,
    session: SessionLifecycle,
    pruning: PruningPolicy,
    store: SharedStore,
    transport: Arc<dyn PingTransport>,
    info: ClientInfo,
    clock: Arc<dyn Clock>,
    pending_requests: Vec<ServerRequest>,
    active_thread: Option<ThreadId>,
    refetching: BTreeSet<ThreadId>,
    login_epoch: u64,
    session_generation: u64,
    prune_generation: u64,
    internal: mpsc::UnboundedSender<Internal>,
    session_tx: watch::Sender<SessionId>,
    stats: DriverStats,
}

impl DriverState {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        info!(session = %self.session.session_id(), "sync driver started");
        self.arm_session_check();
        self.arm_prune_sweep();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown(reply)) => {
                        let _ = reply.send(self.stats);
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    // Every handle was dropped.
                    None => break,
                },
                Some(event) = internal.recv() => self.handle_internal(event),
            }
        }
        info!(
            pings = self.stats.pings_started,
            failed = self.stats.pings_failed,
            "sync driver stopped"
        );
    }

    fn now(&self) -> Timestamp {
        self.clock.now_ms()
    }

    fn handle_command(&mut self, command: Command) {
        let now = self.now();
        match command {
            Command::SetVisible(visible) => {
                if let Some(plan) = self.coordinator.set_visible(visible, now) {
                    self.fire(plan);
                }
                self.arm_session_check();
            }
            Command::SetLoggedIn(logged_in) => {
                if logged_in != self.coordinator.is_logged_in() {
                    self.coordinator.reinitialize();
                    self.pending_requests.clear();
                    self.refetching.clear();
                    self.login_epoch += 1;
                }
                if let Some(plan) = self.coordinator.set_logged_in(logged_in, now) {
                    self.fire(plan);
                }
                self.arm_session_check();
            }
            Command::Navigate(thread_id) => {
                let refetch = self.store.write().navigate_to(&thread_id, now);
                self.session.record_activity(now);
                if refetch && self.coordinator.is_logged_in() {
                    self.refetch(thread_id);
                }
                self.arm_prune_sweep();
            }
            Command::SetActiveThread(thread_id) => self.active_thread = thread_id,
            Command::SetDeviceToken(token) => self.info.device_token = Some(token),
            Command::Shutdown(_) => {}
        }
    }

    fn handle_internal(&mut self, event: Internal) {
        let now = self.now();
        match event {
            Internal::Recheck => {
                if let Some(plan) = self.coordinator.try_fire(now) {
                    self.fire(plan);
                }
            }
            Internal::PingCompleted { epoch, result } if epoch == self.login_epoch => {
                self.complete(*result, now);
            }
            Internal::MessagesFetched {
                epoch,
                thread_id,
                result,
            } if epoch == self.login_epoch => self.merge_fetched(thread_id, *result, now),
            Internal::PingCompleted { .. } | Internal::MessagesFetched { .. } => {
                debug!("dropping result from before the login change");
            }
            Internal::SessionCheck { generation } if generation == self.session_generation => {
                self.check_session(now);
            }
            Internal::PruneSweep { generation } if generation == self.prune_generation => {
                let pruned = {
                    let mut store = self.store.write();
                    self.pruning
                        .sweep(&mut store, now, self.active_thread.as_ref())
                };
                if !pruned.is_empty() {
                    info!(count = pruned.len(), "pruned thread backlogs");
                    self.stats.threads_pruned += pruned.len() as u64;
                }
                self.arm_prune_sweep();
            }
            Internal::SessionCheck { .. } | Internal::PruneSweep { .. } => {
                debug!("ignoring superseded timer");
            }
        }
    }

    fn fire(&mut self, plan: FirePlan) {
        let responses = self.info.respond_to(&self.pending_requests);
        let request = self.store.read().ping_request(responses);
        self.stats.pings_started += 1;
        debug!(
            in_flight = self.coordinator.in_flight(),
            cursor = ?request.messages_current_as_of,
            "starting ping"
        );

        let transport = Arc::clone(&self.transport);
        let internal = self.internal.clone();
        let epoch = self.login_epoch;
        tokio::spawn(async move {
            let result = transport.ping(&request).await;
            let _ = internal.send(Internal::PingCompleted {
                epoch,
                result: Box::new(result),
            });
        });
        for delay in plan.recheck_after {
            self.schedule(delay, Internal::Recheck);
        }
    }

    fn complete(&mut self, result: ClientResult<PingResponse>, now: Timestamp) {
        let success = match result {
            Ok(response) => {
                let summary = self.store.write().merge_ping_response(&response, now);
                self.pending_requests = response.server_requests().to_vec();
                self.session.record_activity(now);
                self.stats.pings_succeeded += 1;
                debug!(
                    messages = summary.messages,
                    new_threads = summary.new_threads,
                    updates = summary.updates,
                    "merged ping response"
                );
                if summary.new_threads > 0 {
                    self.arm_prune_sweep();
                }
                true
            }
            Err(error) => {
                self.stats.pings_failed += 1;
                warn!(%error, retryable = error.is_retryable(), "ping failed");
                if matches!(error, ClientError::NotLoggedIn) {
                    self.coordinator.set_logged_in(false, now);
                    self.arm_session_check();
                }
                false
            }
        };
        if let Some(plan) = self.coordinator.on_complete(now, success) {
            self.fire(plan);
        }
    }

    /// Fetches the newest page of an evicted thread. At most one fetch per
    /// thread is outstanding.
    fn refetch(&mut self, thread_id: ThreadId) {
        if !self.refetching.insert(thread_id.clone()) {
            return;
        }
        debug!(thread = %thread_id, "refetching evicted thread");
        let request = FetchMessagesRequest::newest(thread_id.clone());
        let transport = Arc::clone(&self.transport);
        let internal = self.internal.clone();
        let epoch = self.login_epoch;
        tokio::spawn(async move {
            let result = transport.fetch_messages(&request).await;
            let _ = internal.send(Internal::MessagesFetched {
                epoch,
                thread_id,
                result: Box::new(result),
            });
        });
    }

    fn merge_fetched(
        &mut self,
        thread_id: ThreadId,
        result: ClientResult<FetchMessagesResponse>,
        now: Timestamp,
    ) {
        self.refetching.remove(&thread_id);
        match result {
            Ok(page) => {
                let merged = self.store.write().merge_fetched_messages(&page, now);
                self.stats.threads_refetched += 1;
                debug!(thread = %thread_id, messages = merged, "merged fetched messages");
            }
            Err(error) => {
                warn!(thread = %thread_id, %error, "message fetch failed");
            }
        }
    }

    fn check_session(&mut self, now: Timestamp) {
        let check = self.session.check(
            now,
            self.coordinator.is_visible(),
            self.coordinator.is_logged_in(),
        );
        if let SessionCheck::Rotated { session_id, .. } = &check {
            info!(session = %session_id, "rotated idle session");
            self.stats.sessions_rotated += 1;
            self.session_tx.send_replace(session_id.clone());
        }
        if let Some(delay) = check.next_check_in() {
            self.schedule(
                delay,
                Internal::SessionCheck {
                    generation: self.session_generation,
                },
            );
        }
    }

    /// Supersedes any pending session check and runs a new one.
    fn arm_session_check(&mut self) {
        self.session_generation += 1;
        let now = self.now();
        self.check_session(now);
    }

    /// Supersedes any pending sweep and schedules the next one.
    fn arm_prune_sweep(&mut self) {
        self.prune_generation += 1;
        let delay = self
            .pruning
            .next_sweep_delay(&self.store.read(), self.now());
        if let Some(delay) = delay {
            self.schedule(
                delay,
                Internal::PruneSweep {
                    generation: self.prune_generation,
                },
            );
        }
    }

    fn schedule(&self, delay: Duration, event: Internal) {
        let internal = self.internal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = internal.send(event);
        });
    }
}
