//! Representation sessions: one live task per open representation
//!
//! A session owns its command queue and change-feed receiver, runs
//! materializations on the blocking pool (at most one at a time), and
//! publishes each structurally new snapshot to every attached subscriber.

use std::fmt;
use std::sync::Arc;

use async_stream::stream;
use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::application::description::TreeDescription;
use crate::application::services::materializer::materialize;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{ChangeNotification, RepresentationIdentifier, Tree};

/// Event pushed to subscribers of a representation.
#[derive(Debug, Clone)]
pub enum TreeEvent {
    Refreshed(Arc<Tree>),
    /// Last event of a failed session
    Terminated { reason: String },
}

impl TreeEvent {
    pub fn tree(&self) -> Option<&Arc<Tree>> {
        match self {
            TreeEvent::Refreshed(tree) => Some(tree),
            TreeEvent::Terminated { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TreeEvent::Terminated { .. })
    }
}

/// Identity of a session: one per editing context and representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub editing_context_id: String,
    pub representation: RepresentationIdentifier,
}

impl SessionKey {
    pub fn new(editing_context_id: impl Into<String>, representation: RepresentationIdentifier) -> Self {
        Self {
            editing_context_id: editing_context_id.into(),
            representation,
        }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}[{}]",
            self.editing_context_id,
            self.representation.target_object_id,
            self.representation.expanded.len()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Refresh,
}

struct SharedState {
    latest: Option<TreeEvent>,
    sender: broadcast::Sender<TreeEvent>,
}

/// State shared between a session task and its subscribers.
pub struct SessionShared {
    state: Mutex<SharedState>,
}

impl SessionShared {
    pub fn new(event_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(event_capacity.max(1));
        Self {
            state: Mutex::new(SharedState {
                latest: None,
                sender,
            }),
        }
    }

    /// Join the broadcast and take the cached latest event in one step, so
    /// no event is missed or seen twice.
    pub fn attach(&self) -> (Option<TreeEvent>, broadcast::Receiver<TreeEvent>) {
        let state = self.state.lock();
        (state.latest.clone(), state.sender.subscribe())
    }

    fn publish(&self, event: TreeEvent) {
        let mut state = self.state.lock();
        state.latest = Some(event.clone());
        // No receivers only means every subscriber detached meanwhile
        let _ignored = state.sender.send(event);
    }

    pub fn latest(&self) -> Option<TreeEvent> {
        self.state.lock().latest.clone()
    }

    /// Drop the cached snapshot.
    pub fn release(&self) {
        self.state.lock().latest = None;
    }
}

/// How a session task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Cancelled,
    Terminated(String),
}

enum Step {
    Cancelled,
    Materialized(Result<ApplicationResult<Tree>, JoinError>),
    Trigger,
    Ignore,
    FeedClosed,
}

pub struct RepresentationSession {
    key: SessionKey,
    description: Arc<TreeDescription>,
    shared: Arc<SessionShared>,
    commands: mpsc::Receiver<SessionCommand>,
    changes: broadcast::Receiver<ChangeNotification>,
    cancel: CancellationToken,
}

impl RepresentationSession {
    pub fn new(
        key: SessionKey,
        description: Arc<TreeDescription>,
        shared: Arc<SessionShared>,
        commands: mpsc::Receiver<SessionCommand>,
        changes: broadcast::Receiver<ChangeNotification>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            key,
            description,
            shared,
            commands,
            changes,
            cancel,
        }
    }

    /// Drive the session until cancelled or terminated.
    pub async fn run(mut self) -> SessionOutcome {
        debug!("Session {} started", self.key);
        let mut in_flight: Option<JoinHandle<ApplicationResult<Tree>>> = None;
        let mut last: Option<Arc<Tree>> = None;
        // Initial materialization
        let mut pending = true;
        let mut feed_open = true;

        loop {
            if in_flight.is_none() && pending {
                pending = false;
                in_flight = Some(self.spawn_materialization());
            }

            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Step::Cancelled,
                result = await_in_flight(&mut in_flight) => Step::Materialized(result),
                command = self.commands.recv() => match command {
                    Some(SessionCommand::Refresh) => Step::Trigger,
                    None => Step::Cancelled,
                },
                change = self.changes.recv(), if feed_open => self.classify(change),
            };

            match step {
                Step::Cancelled => {
                    // An in-flight result is detached and discarded
                    debug!("Session {} cancelled", self.key);
                    return SessionOutcome::Cancelled;
                }
                Step::Materialized(result) => {
                    if self.cancel.is_cancelled() {
                        return SessionOutcome::Cancelled;
                    }
                    let tree = match result {
                        Ok(Ok(tree)) => tree,
                        Ok(Err(e)) => return self.terminate(e.to_string()),
                        Err(e) => return self.terminate(format!("materialization aborted: {e}")),
                    };
                    if last.as_ref().is_some_and(|previous| previous.same_content(&tree)) {
                        trace!("Session {}: unchanged, not publishing", self.key);
                        continue;
                    }
                    let tree = Arc::new(tree);
                    last = Some(Arc::clone(&tree));
                    self.shared.publish(TreeEvent::Refreshed(tree));
                }
                Step::Trigger => {
                    pending = true;
                }
                Step::Ignore => {}
                Step::FeedClosed => {
                    debug!("Session {}: change feed closed", self.key);
                    feed_open = false;
                }
            }
        }
    }

    /// Map a feed event to a step, draining whatever else is already queued
    /// so a burst of notifications costs a single trigger.
    fn classify(&mut self, change: Result<ChangeNotification, broadcast::error::RecvError>) -> Step {
        let mut triggered = match change {
            Ok(notification) => self.is_relevant(&notification),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                trace!("Session {}: lagged by {}", self.key, skipped);
                true
            }
            Err(broadcast::error::RecvError::Closed) => return Step::FeedClosed,
        };
        loop {
            match self.changes.try_recv() {
                Ok(notification) => triggered |= self.is_relevant(&notification),
                Err(broadcast::error::TryRecvError::Lagged(_)) => triggered = true,
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
        if triggered {
            Step::Trigger
        } else {
            Step::Ignore
        }
    }

    fn is_relevant(&self, notification: &ChangeNotification) -> bool {
        notification.affects(
            &self.key.editing_context_id,
            &self.key.representation.target_object_id,
        )
    }

    fn spawn_materialization(&self) -> JoinHandle<ApplicationResult<Tree>> {
        trace!("Session {}: materializing", self.key);
        let description = Arc::clone(&self.description);
        let key = self.key.clone();
        tokio::task::spawn_blocking(move || {
            materialize(
                &description,
                &key.representation.target_object_id,
                &key.representation.expanded,
                &key.editing_context_id,
            )
        })
    }

    fn terminate(&self, reason: String) -> SessionOutcome {
        warn!("Session {} terminated: {}", self.key, reason);
        self.shared.publish(TreeEvent::Terminated {
            reason: reason.clone(),
        });
        SessionOutcome::Terminated(reason)
    }
}

/// Resolves when the in-flight materialization finishes; never resolves
/// while nothing is in flight.
async fn await_in_flight<T>(slot: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match slot.as_mut() {
        Some(handle) => {
            let result = handle.await;
            *slot = None;
            result
        }
        None => std::future::pending().await,
    }
}

/// Runs a detach callback when dropped.
pub struct DetachGuard(Option<Box<dyn FnOnce() + Send>>);

impl DetachGuard {
    pub fn new(on_drop: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(on_drop)))
    }
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        if let Some(on_drop) = self.0.take() {
            on_drop();
        }
    }
}

/// Receiving end handed to one subscriber.
///
/// Dropping it detaches the subscriber; the last one to detach cancels the
/// session.
pub struct Subscription {
    replay: Option<TreeEvent>,
    receiver: broadcast::Receiver<TreeEvent>,
    finished: bool,
    _guard: DetachGuard,
}

impl Subscription {
    pub fn new(
        replay: Option<TreeEvent>,
        receiver: broadcast::Receiver<TreeEvent>,
        guard: DetachGuard,
    ) -> Self {
        Self {
            replay,
            receiver,
            finished: false,
            _guard: guard,
        }
    }

    /// Next event; `None` once the session is gone or terminated.
    ///
    /// A slow subscriber skips missed snapshots and continues with newer ones.
    pub async fn next(&mut self) -> Option<TreeEvent> {
        if self.finished {
            return None;
        }
        let event = match self.replay.take() {
            Some(event) => event,
            None => loop {
                match self.receiver.recv().await {
                    Ok(event) => break event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        self.finished = true;
                        return None;
                    }
                }
            },
        };
        self.finished = event.is_terminal();
        Some(event)
    }

    /// The subscription as a stream of events.
    pub fn into_stream(mut self) -> impl Stream<Item = TreeEvent> {
        stream! {
            while let Some(event) = self.next().await {
                yield event;
            }
        }
    }

    /// Like `next`, but fails once the session is closed.
    pub async fn next_tree(&mut self) -> ApplicationResult<Arc<Tree>> {
        match self.next().await {
            Some(TreeEvent::Refreshed(tree)) => Ok(tree),
            _ => Err(ApplicationError::SessionClosed),
        }
    }
}
