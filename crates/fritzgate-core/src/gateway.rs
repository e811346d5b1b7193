// ── Gateway facade ──
//
// Wires session, queue, cache, discovery and accessories together and
// owns their background tasks. Handles startup (login, discovery,
// pollers), shutdown (cancel, join, logout), and one-shot use from the CLI.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use fritzgate_api::{FritzClient, RemoteProcedure};

use crate::accessory::AccessoryController;
use crate::config::GatewayConfig;
use crate::discovery::DiscoveryService;
use crate::error::CoreError;
use crate::model::{Ain, Device};
use crate::queue::RequestQueue;
use crate::session::SessionManager;
use crate::store::DeviceStateCache;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<GatewayInner>`.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    config: GatewayConfig,
    session: SessionManager,
    queue: RequestQueue,
    cache: DeviceStateCache,
    /// Stops the request queue worker. Cancelled last on shutdown.
    queue_cancel: CancellationToken,
    /// Stops the pollers.
    poll_cancel: CancellationToken,
    queue_task: Mutex<Option<JoinHandle<()>>>,
    poll_tasks: Mutex<Vec<JoinHandle<()>>>,
    accessories: Mutex<Vec<AccessoryController>>,
    devices: Mutex<Vec<Device>>,
    degraded: Mutex<Option<CoreError>>,
}

impl Gateway {
    /// Create a gateway over `backend`. Spawns the request queue worker,
    /// so this must run inside a Tokio runtime. Does NOT log in; call
    /// [`start()`](Self::start) for that.
    pub fn new(config: GatewayConfig, backend: Arc<dyn RemoteProcedure>) -> Self {
        let root = CancellationToken::new();
        let queue_cancel = root.child_token();
        let poll_cancel = root.child_token();

        let session = SessionManager::new(Arc::clone(&backend), config.credentials.clone());
        let (queue, queue_task) = RequestQueue::spawn(
            backend,
            session.clone(),
            config.dispatch,
            config.retry,
            queue_cancel.clone(),
        );
        let cache = DeviceStateCache::new(queue.clone());

        Self {
            inner: Arc::new(GatewayInner {
                config,
                session,
                queue,
                cache,
                queue_cancel,
                poll_cancel,
                queue_task: Mutex::new(Some(queue_task)),
                poll_tasks: Mutex::new(Vec::new()),
                accessories: Mutex::new(Vec::new()),
                devices: Mutex::new(Vec::new()),
                degraded: Mutex::new(None),
            }),
        }
    }

    /// Create a gateway talking HTTP to the box in `config`.
    pub fn connect(config: GatewayConfig) -> Result<Self, CoreError> {
        let client = FritzClient::new(config.url.clone(), &config.transport())?;
        Ok(Self::new(config, Arc::new(client)))
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.inner.queue
    }

    pub fn cache(&self) -> &DeviceStateCache {
        &self.inner.cache
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Log in, discover devices, build accessories and start polling.
    ///
    /// A failed login is returned and leaves the gateway without
    /// accessories. A failed discovery is not: the gateway starts with
    /// the meta accessories and reports it via [`degraded()`](Self::degraded).
    pub async fn start(&self) -> Result<(), CoreError> {
        self.bring_up(true).await
    }

    async fn bring_up(&self, poll: bool) -> Result<(), CoreError> {
        if let Err(e) = self.inner.session.token().await {
            if e.is_backend_unreachable() || !e.is_authentication_failed() {
                error!(error = %e, "initializing accessories failed - box unreachable");
            } else {
                error!(error = %e, "initializing accessories failed - wrong user credentials?");
            }
            return Err(e);
        }

        let discovery = DiscoveryService::new(
            self.inner.queue.clone(),
            self.inner.config.devices.clone(),
            self.inner.config.wifi.clone(),
        )
        .run()
        .await;

        let accessories: Vec<AccessoryController> = discovery
            .plans
            .iter()
            .map(|plan| {
                AccessoryController::new(
                    plan,
                    self.inner.cache.clone(),
                    self.inner.config.poll_interval,
                )
            })
            .collect();

        if poll {
            let mut handles = self.inner.poll_tasks.lock().await;
            for accessory in &accessories {
                handles.push(accessory.spawn_poller(self.inner.poll_cancel.clone()));
            }
        }

        info!(
            accessories = accessories.len(),
            polling = poll,
            "gateway started"
        );
        *self.inner.accessories.lock().await = accessories;
        *self.inner.devices.lock().await = discovery.devices;
        *self.inner.degraded.lock().await = discovery.degraded;
        Ok(())
    }

    /// Stop pollers and the queue worker, then log out.
    pub async fn shutdown(&self) {
        self.inner.poll_cancel.cancel();
        let mut handles = self.inner.poll_tasks.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.inner.session.logout().await;

        self.inner.queue_cancel.cancel();
        if let Some(handle) = self.inner.queue_task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "request queue task failed");
            }
        }
        debug!("gateway stopped");
    }

    // ── One-shot convenience ─────────────────────────────────────────

    /// One-shot: connect, start without pollers, run closure, shut down.
    pub async fn oneshot<F, Fut, T>(config: GatewayConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Gateway) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let gateway = Self::connect(config)?;
        gateway.run_once(f).await
    }

    /// Like [`oneshot`](Self::oneshot) with an existing gateway.
    pub async fn run_once<F, Fut, T>(self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Gateway) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        if let Err(e) = self.bring_up(false).await {
            self.shutdown().await;
            return Err(e);
        }
        let result = f(self.clone()).await;
        self.shutdown().await;
        result
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub async fn accessories(&self) -> Vec<AccessoryController> {
        self.inner.accessories.lock().await.clone()
    }

    /// Accessories backed by device `ain`.
    pub async fn accessories_for(&self, ain: &Ain) -> Vec<AccessoryController> {
        self.inner
            .accessories
            .lock()
            .await
            .iter()
            .filter(|a| a.ain() == ain)
            .cloned()
            .collect()
    }

    pub async fn devices(&self) -> Vec<Device> {
        self.inner.devices.lock().await.clone()
    }

    /// Why discovery fell back to the meta accessories, if it did.
    pub async fn degraded(&self) -> Option<CoreError> {
        self.inner.degraded.lock().await.clone()
    }

    /// Refresh every accessory and wait for all answers.
    ///
    /// Returns the first failure after all refreshes have finished.
    pub async fn refresh_all(&self) -> Result<(), CoreError> {
        let accessories = self.accessories().await;
        let results = join_all(accessories.iter().map(AccessoryController::refresh_now)).await;
        results.into_iter().collect()
    }
}
