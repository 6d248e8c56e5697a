//! Session store: the owned auth context shared across the UI tree.
//!
//! The store holds the current session and a loading flag, and publishes
//! every replacement over an internal channel. Subscriptions are handles
//! that unsubscribe when dropped. Writes happen from the async event flow
//! only; the lock is never held across an await point.

use crate::auth::capability::AuthBackend;
use crate::auth::types::{AuthChange, Session};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, error};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Snapshot of the store at one point in time.
#[derive(Clone, Debug)]
pub struct SessionState {
    pub session: Option<Session>,
    /// True until the initial session fetch resolves, success or failure.
    pub loading: bool,
}

impl SessionState {
    #[must_use]
    pub fn user_onboarded(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.user.onboarding_completed())
    }
}

struct Inner {
    state: RwLock<SessionState>,
    changes: broadcast::Sender<(AuthChange, Option<Session>)>,
}

/// Cheap-to-clone handle to the shared session state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(SessionState {
                    session: None,
                    loading: true,
                }),
                changes,
            }),
        }
    }

    /// Fetches the initial session once. A failure is "no session", never
    /// an error surfaced to the caller; the loading flag clears either way.
    pub async fn initialize(&self, backend: &dyn AuthBackend) {
        let session = match backend.get_session().await {
            Ok(session) => session,
            Err(err) => {
                error!("Error getting session: {err}");
                None
            }
        };

        self.apply(AuthChange::InitialSession, session);
    }

    /// Replaces the session wholesale and publishes the change. The one
    /// exception to wholesale replacement: a write for the same subject
    /// never regresses `onboarding_completed` from true to false, because
    /// the asynchronous provider notification may carry a staler projection
    /// than the row that was just saved.
    pub fn apply(&self, change: AuthChange, session: Option<Session>) {
        let mut incoming = session;

        {
            let mut state = self
                .inner
                .state
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);

            if let (Some(current), Some(next)) = (state.session.as_ref(), incoming.as_mut()) {
                if current.user.id == next.user.id
                    && current.user.onboarding_completed()
                    && !next.user.onboarding_completed()
                {
                    next.user.set_onboarding_completed(true);
                }
            }

            state.session = incoming.clone();
            state.loading = false;
        }

        debug!("Auth state changed: {change:?}");

        // Nobody listening is fine; the send result only reports that.
        let _ = self.inner.changes.send((change, incoming));
    }

    /// Clears the session (sign-out). Local state never stays stale, even
    /// when the remote sign-out call failed.
    pub fn clear(&self) {
        self.apply(AuthChange::SignedOut, None);
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.inner
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Subscribes to change notifications. Dropping the handle
    /// unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> SessionChanges {
        SessionChanges {
            receiver: self.inner.changes.subscribe(),
        }
    }
}

/// Subscription handle over the store's change channel.
pub struct SessionChanges {
    receiver: broadcast::Receiver<(AuthChange, Option<Session>)>,
}

impl SessionChanges {
    /// Next change, or `None` once the store is gone. A slow subscriber
    /// that misses notifications skips to the oldest retained one;
    /// state convergence is guaranteed by wholesale replacement, not by
    /// observing every intermediate value.
    pub async fn recv(&mut self) -> Option<(AuthChange, Option<Session>)> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("session change subscriber lagged by {skipped}");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
