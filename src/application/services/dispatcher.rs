//! Subscription dispatcher: the single scheduler of representation sessions
//!
//! Sessions are keyed by `(editing context, representation identifier)`.
//! The first subscriber starts a session, later ones join its broadcast,
//! and the last one to detach cancels it. Subscribe and detach are
//! serialized under one lock.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::application::description::DescriptionRegistry;
use crate::application::error_ext::ResultExt;
use crate::application::services::session::{
    DetachGuard, RepresentationSession, SessionCommand, SessionKey, SessionOutcome, SessionShared,
    Subscription, TreeEvent,
};
use crate::application::{ApplicationError, ApplicationResult};
use crate::config::SessionSettings;
use crate::domain::RepresentationIdentifier;
use crate::infrastructure::feed::ChangeFeed;

struct SessionEntry {
    session_id: u64,
    shared: Arc<SessionShared>,
    commands: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
    subscribers: usize,
}

struct DispatcherInner {
    sessions: Mutex<HashMap<SessionKey, SessionEntry>>,
    registry: Arc<DescriptionRegistry>,
    feed: ChangeFeed,
    settings: SessionSettings,
    next_session_id: AtomicU64,
}

impl DispatcherInner {
    fn detach(&self, key: &SessionKey, session_id: u64) {
        let mut sessions = self.sessions.lock();
        let Some(entry) = sessions.get_mut(key) else {
            return;
        };
        if entry.session_id != session_id {
            return;
        }
        entry.subscribers = entry.subscribers.saturating_sub(1);
        if entry.subscribers > 0 {
            return;
        }
        if let Some(entry) = sessions.remove(key) {
            debug!("Last subscriber left {}, cancelling session", key);
            entry.cancel.cancel();
            entry.shared.release();
        }
    }

    /// Remove a terminated session unless a newer one took its place.
    fn evict(&self, key: &SessionKey, session_id: u64) {
        let mut sessions = self.sessions.lock();
        if sessions
            .get(key)
            .is_some_and(|entry| entry.session_id == session_id)
        {
            sessions.remove(key);
            debug!("Evicted terminated session {}", key);
        }
    }
}

/// Fan-out broadcaster of tree snapshots. Cheap to clone.
#[derive(Clone)]
pub struct SubscriptionDispatcher {
    inner: Arc<DispatcherInner>,
}

impl SubscriptionDispatcher {
    pub fn new(registry: Arc<DescriptionRegistry>, feed: ChangeFeed, settings: SessionSettings) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                sessions: Mutex::new(HashMap::new()),
                registry,
                feed,
                settings,
                next_session_id: AtomicU64::new(1),
            }),
        }
    }

    /// Attach a subscriber, starting the session if needed.
    ///
    /// Must be called from within a Tokio runtime. A subscriber joining an
    /// active session first receives its latest event.
    #[instrument(level = "debug", skip(self, representation), fields(target = %representation.target_object_id))]
    pub fn subscribe(
        &self,
        editing_context_id: &str,
        representation: RepresentationIdentifier,
    ) -> ApplicationResult<Subscription> {
        let description = self.inner.registry.get(&representation.description_id)?;
        let runtime = Handle::try_current().with_context("subscribe outside of a Tokio runtime")?;
        let key = SessionKey::new(editing_context_id, representation);

        let mut sessions = self.inner.sessions.lock();
        let entry = match sessions.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                entry.subscribers += 1;
                entry
            }
            Entry::Vacant(vacant) => {
                let session_id = self.inner.next_session_id.fetch_add(1, Ordering::Relaxed);
                let shared = Arc::new(SessionShared::new(self.inner.settings.event_capacity));
                let (commands, command_rx) = mpsc::channel(self.inner.settings.command_capacity.max(1));
                let cancel = CancellationToken::new();

                // Subscribe to the feed before spawning so no change is missed
                let session = RepresentationSession::new(
                    key.clone(),
                    description,
                    Arc::clone(&shared),
                    command_rx,
                    self.inner.feed.subscribe(),
                    cancel.clone(),
                );

                let weak: Weak<DispatcherInner> = Arc::downgrade(&self.inner);
                let task_key = key.clone();
                runtime.spawn(async move {
                    if let SessionOutcome::Terminated(_) = session.run().await {
                        if let Some(inner) = weak.upgrade() {
                            inner.evict(&task_key, session_id);
                        }
                    }
                });
                debug!("Started session {} for {}", session_id, key);

                vacant.insert(SessionEntry {
                    session_id,
                    shared,
                    commands,
                    cancel,
                    subscribers: 1,
                })
            }
        };

        let (replay, receiver) = entry.shared.attach();
        let session_id = entry.session_id;
        drop(sessions);

        let weak = Arc::downgrade(&self.inner);
        let guard = DetachGuard::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.detach(&key, session_id);
            }
        });
        Ok(Subscription::new(replay, receiver, guard))
    }

    /// Ask an active session to re-materialize.
    pub fn refresh(&self, editing_context_id: &str, representation: &RepresentationIdentifier) -> ApplicationResult<()> {
        let key = SessionKey::new(editing_context_id, representation.clone());
        let sessions = self.inner.sessions.lock();
        let entry = sessions.get(&key).ok_or(ApplicationError::SessionClosed)?;
        match entry.commands.try_send(SessionCommand::Refresh) {
            // A full queue already holds a refresh
            Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ApplicationError::SessionClosed),
        }
    }

    /// Cached latest event of an active session.
    pub fn latest(&self, editing_context_id: &str, representation: &RepresentationIdentifier) -> Option<TreeEvent> {
        let key = SessionKey::new(editing_context_id, representation.clone());
        self.inner
            .sessions
            .lock()
            .get(&key)
            .and_then(|entry| entry.shared.latest())
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.lock().len()
    }

    pub fn subscriber_count(&self, editing_context_id: &str, representation: &RepresentationIdentifier) -> usize {
        let key = SessionKey::new(editing_context_id, representation.clone());
        self.inner
            .sessions
            .lock()
            .get(&key)
            .map_or(0, |entry| entry.subscribers)
    }

    /// Cancel every session.
    pub fn shutdown(&self) {
        let mut sessions = self.inner.sessions.lock();
        for (_, entry) in sessions.drain() {
            entry.cancel.cancel();
            entry.shared.release();
        }
    }
}
