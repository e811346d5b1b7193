// ── Request queue ──
//
// Every backend call funnels through here. One worker task drains an
// unbounded channel in enqueue order, attaches the current session,
// recovers from session expiry with a single renewal and retries
// transient failures after a fixed delay. Callers get a `CallHandle`
// they may await or drop; dropping it does not cancel the call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use fritzgate_api::{Procedure, RemoteProcedure};

use crate::config::{DispatchPolicy, RetryPolicy};
use crate::error::CoreError;
use crate::model::Call;
use crate::session::SessionManager;

/// Queue depth above which every new call is logged.
const BACKLOG_WARN_THRESHOLD: usize = 16;

/// A call waiting for (or undergoing) dispatch.
struct PendingCall {
    call: Call,
    response_tx: oneshot::Sender<Result<Value, CoreError>>,
}

// ── CallHandle ───────────────────────────────────────────────────────

/// Result of a queued call.
///
/// Resolves to [`CoreError::QueueClosed`] if the worker stopped before
/// the call ran.
#[derive(Debug)]
pub struct CallHandle {
    rx: oneshot::Receiver<Result<Value, CoreError>>,
}

impl Future for CallHandle {
    type Output = Result<Value, CoreError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CoreError::QueueClosed)))
    }
}

// ── RequestQueue ─────────────────────────────────────────────────────

/// Front end of the dispatch worker. Cheaply cloneable.
#[derive(Clone)]
pub struct RequestQueue {
    tx: mpsc::UnboundedSender<PendingCall>,
    pending: Arc<AtomicUsize>,
}

impl RequestQueue {
    /// Create the queue and spawn its worker on the current runtime.
    ///
    /// The worker stops when `cancel` fires; calls still queued then
    /// resolve to [`CoreError::QueueClosed`].
    pub fn spawn(
        backend: Arc<dyn RemoteProcedure>,
        session: SessionManager,
        dispatch: DispatchPolicy,
        retry: RetryPolicy,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let dispatcher = Arc::new(Dispatcher {
            backend,
            session,
            retry,
            pending: Arc::clone(&pending),
        });
        let handle = tokio::spawn(dispatch_task(dispatcher, rx, dispatch, cancel));
        (Self { tx, pending }, handle)
    }

    /// Enqueue `procedure(args)`.
    ///
    /// The call is queued before this returns, so two `invoke`s from the
    /// same task are dispatched in that order whether or not their handles
    /// are ever awaited.
    pub fn invoke(&self, procedure: Procedure, args: Vec<Value>) -> CallHandle {
        self.call(Call::new(procedure, args))
    }

    /// Enqueue a prepared [`Call`].
    pub fn call(&self, call: Call) -> CallHandle {
        let (response_tx, rx) = oneshot::channel();
        let depth = self.pending.fetch_add(1, Ordering::Relaxed) + 1;
        if depth > BACKLOG_WARN_THRESHOLD {
            debug!(depth, procedure = %call.procedure, "request backlog growing");
        }
        if self.tx.send(PendingCall { call, response_tx }).is_err() {
            // worker gone; the dropped sender resolves the handle
            self.pending.fetch_sub(1, Ordering::Relaxed);
        }
        CallHandle { rx }
    }

    /// Calls queued or running but not yet finished.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }
}

// ── Worker ───────────────────────────────────────────────────────────

struct Dispatcher {
    backend: Arc<dyn RemoteProcedure>,
    session: SessionManager,
    retry: RetryPolicy,
    pending: Arc<AtomicUsize>,
}

async fn dispatch_task(
    dispatcher: Arc<Dispatcher>,
    mut rx: mpsc::UnboundedReceiver<PendingCall>,
    policy: DispatchPolicy,
    cancel: CancellationToken,
) {
    let permits = match policy {
        DispatchPolicy::Serialized => None,
        DispatchPolicy::Concurrent { max_in_flight } => {
            Some(Arc::new(Semaphore::new(max_in_flight.max(1))))
        }
    };

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            pending = rx.recv() => {
                let Some(pending) = pending else { break };
                match &permits {
                    None => dispatcher.run(pending).await,
                    Some(permits) => {
                        // Acquire before spawning so start order stays FIFO.
                        let Ok(permit) = Arc::clone(permits).acquire_owned().await else {
                            dispatcher.abandon(pending);
                            break;
                        };
                        let dispatcher = Arc::clone(&dispatcher);
                        tokio::spawn(async move {
                            dispatcher.run(pending).await;
                            drop(permit);
                        });
                    }
                }
            }
        }
    }

    // Whatever is still queued never runs; dropping it resolves each
    // handle to `QueueClosed`.
    rx.close();
    let mut abandoned = 0_usize;
    while let Ok(pending) = rx.try_recv() {
        dispatcher.abandon(pending);
        abandoned += 1;
    }
    debug!(abandoned, "request queue stopped");
}

/// How one attempt at a call ended.
enum Attempt {
    Done(Result<Value, CoreError>),
    Transient(CoreError),
}

impl Dispatcher {
    async fn run(&self, pending: PendingCall) {
        let result = self.execute(&pending.call).await;
        self.pending.fetch_sub(1, Ordering::Relaxed);
        // caller may have stopped listening
        let _ = pending.response_tx.send(result);
    }

    fn abandon(&self, pending: PendingCall) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
        drop(pending);
    }

    async fn execute(&self, call: &Call) -> Result<Value, CoreError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.attempt(call).await {
                Attempt::Done(result) => return result,
                Attempt::Transient(e) if attempt < max_attempts => {
                    warn!(
                        procedure = %call.procedure,
                        attempt,
                        error = %e,
                        "call failed, retrying in {:?}",
                        self.retry.delay
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Attempt::Transient(e) => {
                    return Err(CoreError::BackendUnavailable {
                        message: format!("{} failed after {attempt} attempts: {e}", call.procedure),
                    });
                }
            }
        }
    }

    async fn attempt(&self, call: &Call) -> Attempt {
        let session = match self.session.token().await {
            Ok(session) => session,
            Err(e) => return Attempt::Done(Err(e)),
        };

        match self.send(call, &session.id).await {
            Err(e) if e.is_auth_expired() => {
                debug!(procedure = %call.procedure, "session expired, renewing");
                self.session.invalidate(&session);
                let renewed = match self.session.renew(&session).await {
                    Ok(renewed) => renewed,
                    Err(e) => return Attempt::Done(Err(e)),
                };
                match self.send(call, &renewed.id).await {
                    Err(e) if e.is_auth_expired() => Attempt::Done(Err(CoreError::refused(
                        format!("{} rejected the renewed session", call.procedure),
                    ))),
                    other => classify(other),
                }
            }
            other => classify(other),
        }
    }

    async fn send(
        &self,
        call: &Call,
        sid: &fritzgate_api::SessionId,
    ) -> Result<Value, fritzgate_api::Error> {
        debug!("> {call}");
        let result = self.backend.call(call.procedure, sid, &call.args).await;
        match &result {
            Ok(value) => debug!("< {} {value}", call.procedure),
            Err(e) => debug!("< {} failed: {e}", call.procedure),
        }
        result
    }
}

fn classify(result: Result<Value, fritzgate_api::Error>) -> Attempt {
    match result {
        Ok(value) => Attempt::Done(Ok(value)),
        Err(e) if e.is_transient() => Attempt::Transient(e.into()),
        Err(e) => Attempt::Done(Err(e.into())),
    }
}
