// ── Session management ──
//
// Owns the one session id the gateway uses. A renewal runs as its own
// task and is shared: every caller that needs a token while it runs
// awaits the same result, so a burst of expired calls logs in once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::{debug, info, warn};

use fritzgate_api::{RemoteProcedure, SessionId};

use crate::config::Credentials;
use crate::error::CoreError;

/// A session id together with when it was obtained.
///
/// `generation` increases with every successful login and is how stale
/// holders are told apart from the current session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub valid_since: DateTime<Utc>,
    pub generation: u64,
}

type Renewal = Shared<BoxFuture<'static, Result<Session, CoreError>>>;

enum State {
    Absent,
    Valid(Session),
    Renewing(Renewal),
}

struct SessionInner {
    backend: Arc<dyn RemoteProcedure>,
    credentials: Credentials,
    state: Mutex<State>,
    generation: AtomicU64,
    renewals: AtomicU64,
}

/// Hands out the current session, logging in when there is none.
///
/// Cheaply cloneable via `Arc<SessionInner>`.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn RemoteProcedure>, credentials: Credentials) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                backend,
                credentials,
                state: Mutex::new(State::Absent),
                generation: AtomicU64::new(0),
                renewals: AtomicU64::new(0),
            }),
        }
    }

    /// The current session, or the result of logging in if there is none.
    ///
    /// Joins a renewal that is already running instead of starting another.
    pub async fn token(&self) -> Result<Session, CoreError> {
        let renewal = {
            let mut state = self.inner.state.lock().expect("session lock poisoned");
            let running = match &*state {
                State::Valid(session) => return Ok(session.clone()),
                State::Renewing(renewal) => Some(renewal.clone()),
                State::Absent => None,
            };
            running.unwrap_or_else(|| self.start_renewal(&mut state))
        };
        renewal.await
    }

    /// Mark `stale` as no longer usable.
    ///
    /// Does nothing if a newer session has already replaced it.
    pub fn invalidate(&self, stale: &Session) {
        let mut state = self.inner.state.lock().expect("session lock poisoned");
        if let State::Valid(current) = &*state {
            if current.generation == stale.generation {
                debug!(generation = stale.generation, "session invalidated");
                *state = State::Absent;
            }
        }
    }

    /// Obtain a session newer than `stale`.
    ///
    /// Returns an already-renewed session if one exists, joins the running
    /// renewal if there is one, and only otherwise logs in.
    pub async fn renew(&self, stale: &Session) -> Result<Session, CoreError> {
        let renewal = {
            let mut state = self.inner.state.lock().expect("session lock poisoned");
            let running = match &*state {
                State::Valid(current) if current.generation != stale.generation => {
                    return Ok(current.clone());
                }
                State::Renewing(renewal) => Some(renewal.clone()),
                State::Valid(_) | State::Absent => None,
            };
            running.unwrap_or_else(|| self.start_renewal(&mut state))
        };
        renewal.await
    }

    /// The session currently considered valid, if any.
    pub fn current(&self) -> Option<Session> {
        match &*self.inner.state.lock().expect("session lock poisoned") {
            State::Valid(session) => Some(session.clone()),
            State::Absent | State::Renewing(_) => None,
        }
    }

    /// How many times a login has been attempted.
    pub fn renewal_count(&self) -> u64 {
        self.inner.renewals.load(Ordering::Relaxed)
    }

    /// Drop the current session and log it out on the box.
    pub async fn logout(&self) {
        let session = {
            let mut state = self.inner.state.lock().expect("session lock poisoned");
            match std::mem::replace(&mut *state, State::Absent) {
                State::Valid(session) => session,
                other => {
                    *state = other;
                    return;
                }
            }
        };
        if let Err(e) = self.inner.backend.logout(&session.id).await {
            warn!(error = %e, "logout failed (non-fatal)");
        } else {
            debug!("logged out");
        }
    }

    /// Spawn a login and park its shared result in `state`.
    ///
    /// The login runs on its own task so it finishes even if every waiter
    /// gives up, and it publishes its outcome before waking them.
    fn start_renewal(&self, state: &mut State) -> Renewal {
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let result = authenticate(&inner).await;
            let mut state = inner.state.lock().expect("session lock poisoned");
            *state = match &result {
                Ok(session) => State::Valid(session.clone()),
                Err(_) => State::Absent,
            };
            result
        });

        let renewal = async move {
            task.await
                .map_err(|e| CoreError::Internal(format!("session renewal task failed: {e}")))?
        }
        .boxed()
        .shared();

        *state = State::Renewing(renewal.clone());
        renewal
    }
}

async fn authenticate(inner: &SessionInner) -> Result<Session, CoreError> {
    let attempt = inner.renewals.fetch_add(1, Ordering::Relaxed) + 1;
    let username = &inner.credentials.username;
    debug!(attempt, username = %username, "authenticating");

    let id = inner
        .backend
        .authenticate(username, &inner.credentials.password)
        .await
        .map_err(|e| {
            warn!(error = %e, "authentication failed");
            CoreError::AuthenticationFailed {
                message: e.to_string(),
                unreachable: e.is_transient(),
            }
        })?;

    if id.is_invalid() {
        warn!("box returned the invalid session id");
        return Err(CoreError::refused("box returned the invalid session id"));
    }

    let generation = inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
    if generation == 1 {
        info!(username = %username, "logged in");
    } else {
        info!(generation, "session renewed");
    }

    Ok(Session {
        id,
        valid_since: Utc::now(),
        generation,
    })
}
