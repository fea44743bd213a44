use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::ConfigStore;
use crate::traits::{Gateway, Service};

const RUNNING: u8 = 0;
const SHUTTING_DOWN: u8 = 1;
const STOPPED: u8 = 2;

/// Owns startup and shutdown ordering for the whole process.
///
/// Shutdown is a one-way `Running -> ShuttingDown -> Stopped` transition
/// taken with a compare-and-set, so the OS signal hook and an explicit call
/// racing each other collapse into a single execution.
pub struct Lifecycle {
    services: Vec<Arc<dyn Service>>,
    started: AtomicBool,
    state: AtomicU8,
    cancel: CancellationToken,
    store: Arc<ConfigStore>,
    gateway: Arc<dyn Gateway>,
}

impl Lifecycle {
    pub fn new(store: Arc<ConfigStore>, gateway: Arc<dyn Gateway>) -> Self {
        Self {
            services: Vec::new(),
            started: AtomicBool::new(false),
            state: AtomicU8::new(RUNNING),
            cancel: CancellationToken::new(),
            store,
            gateway,
        }
    }

    /// Register a service. Registration order is start order; stop runs in
    /// the same order during shutdown.
    pub fn register(&mut self, service: Arc<dyn Service>) {
        self.services.push(service);
    }

    /// The cancellation source every background loop derives from.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[allow(dead_code)] // Queried by the command layer before arming a restart.
    pub fn is_shutting_down(&self) -> bool {
        self.state.load(Ordering::SeqCst) != RUNNING
    }

    /// Start every registered service. The ready event can fire again on a
    /// session resume; repeat calls are no-ops.
    pub async fn start_services(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("services already started");
            return;
        }
        for service in &self.services {
            info!(service = service.name(), "starting service");
            if let Err(e) = Arc::clone(service).start().await {
                warn!(service = service.name(), error = %e, "service failed to start");
            }
        }
    }

    /// Block until shutdown is triggered.
    pub async fn wait(&self) {
        self.cancel.cancelled().await;
    }

    /// Run the shutdown sequence exactly once: cancel background work, stop
    /// services, flush the record store, disconnect the gateway. Concurrent
    /// callers return immediately.
    pub async fn shutdown(&self) {
        if self
            .state
            .compare_exchange(RUNNING, SHUTTING_DOWN, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("shutdown already in progress");
            return;
        }
        info!("shutting down");
        self.cancel.cancel();
        for service in &self.services {
            if let Err(e) = service.stop().await {
                warn!(service = service.name(), error = %e, "service stop failed");
            }
        }
        if let Err(e) = self.store.save().await {
            warn!(error = %e, "final save failed");
        }
        if let Err(e) = self.gateway.disconnect().await {
            warn!(error = %e, "gateway disconnect failed");
        }
        self.state.store(STOPPED, Ordering::SeqCst);
        info!("shutdown complete");
    }
}
