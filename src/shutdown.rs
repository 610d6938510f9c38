use crate::store::TicketStore;
use crate::{BoxOfficeError, Result};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Fans a single stop signal out to the HTTP server and any background task,
/// then stops registered components one by one within `shutdown_timeout`.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    stopping: Arc<watch::Sender<bool>>,
    components: Arc<Mutex<Vec<Box<dyn ShutdownComponent + Send + Sync>>>>,
    shutdown_timeout: Duration,
}

#[async_trait::async_trait]
pub trait ShutdownComponent {
    async fn shutdown(&self) -> Result<()>;
    fn name(&self) -> &str;
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ShutdownCoordinator {
    pub fn new(shutdown_timeout: Duration) -> Self {
        let (stopping, _) = watch::channel(false);
        Self {
            stopping: Arc::new(stopping),
            components: Arc::new(Mutex::new(Vec::new())),
            shutdown_timeout,
        }
    }

    pub async fn register_component(&self, component: Box<dyn ShutdownComponent + Send + Sync>) {
        info!("Registered '{}' for graceful shutdown", component.name());
        self.components.lock().await.push(component);
    }

    pub fn is_triggered(&self) -> bool {
        *self.stopping.borrow()
    }

    /// Idempotent.
    pub fn trigger(&self) {
        self.stopping.send_if_modified(|stopping| !std::mem::replace(stopping, true));
    }

    /// Resolves once [`ShutdownCoordinator::trigger`] has been called, even if
    /// that happened before this call.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.stopping.subscribe();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Triggers shutdown, then stops every component in registration order.
    pub async fn shutdown(&self) -> Result<()> {
        self.trigger();
        let components = self.components.lock().await;
        info!("Stopping {} component(s)", components.len());

        let stop_all = async {
            let mut failed = Vec::new();
            for component in components.iter() {
                if let Err(e) = component.shutdown().await {
                    error!("Component '{}' failed to stop: {}", component.name(), e);
                    failed.push(component.name().to_string());
                } else {
                    info!("Component '{}' stopped", component.name());
                }
            }
            failed
        };

        match tokio::time::timeout(self.shutdown_timeout, stop_all).await {
            Ok(failed) if failed.is_empty() => Ok(()),
            Ok(failed) => Err(BoxOfficeError::StoreUnavailable(format!(
                "failed to stop: {}",
                failed.join(", ")
            ))),
            Err(_) => {
                warn!("Shutdown exceeded {:?}", self.shutdown_timeout);
                Err(BoxOfficeError::StoreUnavailable(format!(
                    "shutdown exceeded {:?}",
                    self.shutdown_timeout
                )))
            }
        }
    }
}

/// Flushes the ticket store on shutdown
pub struct StoreShutdown {
    store: TicketStore,
}

impl StoreShutdown {
    pub fn new(store: TicketStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl ShutdownComponent for StoreShutdown {
    async fn shutdown(&self) -> Result<()> {
        info!("Flushing {} ticket store", self.store.backend().name());
        self.store.flush()
    }

    fn name(&self) -> &str {
        "ticket-store"
    }
}

/// Triggers `coordinator` on SIGINT or SIGTERM.
pub fn listen_for_signals(coordinator: ShutdownCoordinator) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    (Err(e), _) | (_, Err(e)) => {
                        error!("Failed to install signal handlers: {}", e);
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            info!("Received Ctrl+C, initiating graceful shutdown");
        }

        coordinator.trigger();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Flag(Arc<AtomicBool>);

    #[async_trait::async_trait]
    impl ShutdownComponent for Flag {
        async fn shutdown(&self) -> Result<()> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &str {
            "flag"
        }
    }

    #[tokio::test]
    async fn shutdown_stops_components_and_wakes_waiters() {
        let coordinator = ShutdownCoordinator::new(Duration::from_secs(1));
        let stopped = Arc::new(AtomicBool::new(false));
        coordinator
            .register_component(Box::new(Flag(Arc::clone(&stopped))))
            .await;
        coordinator
            .register_component(Box::new(StoreShutdown::new(TicketStore::in_memory())))
            .await;

        let waiters: Vec<_> = (0..2)
            .map(|_| {
                let waiter = coordinator.clone();
                tokio::spawn(async move { waiter.wait_for_shutdown().await })
            })
            .collect();

        coordinator.shutdown().await.unwrap();
        for waiting in waiters {
            waiting.await.unwrap();
        }
        assert!(stopped.load(Ordering::SeqCst));
        assert!(coordinator.is_triggered());

        // Late waiters return immediately
        coordinator.wait_for_shutdown().await;
    }
}
