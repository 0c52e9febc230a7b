//! Scheduled registry refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::proxy::ProxyManager;
use crate::registry::Registry;

/// Periodically rebuilds the registry until told to stop.
#[derive(Debug)]
pub struct Refresher {
    registry: Arc<Registry>,
    interval: Duration,
    proxy: Option<Arc<ProxyManager>>,
}

impl Refresher {
    /// Creates a refresher with the given period.
    #[must_use]
    pub const fn new(registry: Arc<Registry>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            proxy: None,
        }
    }

    /// Re-syncs `proxy` after every successful refresh.
    #[must_use]
    pub fn with_proxy(mut self, proxy: Arc<ProxyManager>) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Runs one refresh. Failures are logged and leave the last snapshot in
    /// place.
    pub async fn tick(&self) {
        match self.registry.refresh().await {
            Ok(snapshot) => {
                if let Some(proxy) = &self.proxy {
                    proxy.sync(&snapshot).await;
                }
            }
            Err(e) => tracing::debug!(error = %e, "scheduled refresh skipped"),
        }
    }

    /// Refreshes immediately, then every interval, until `shutdown` flips
    /// to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = self.interval.as_secs(), "refresher started");
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        if let Some(proxy) = &self.proxy {
            proxy.shutdown();
        }
        tracing::info!("refresher stopped");
    }

    /// Spawns [`Self::run`] onto the current runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RuntimeBackend;
    use crate::backend::memory::MemoryBackend;
    use berth_common::types::RunSpec;

    fn setup() -> (Arc<MemoryBackend>, Arc<Registry>) {
        let rt = Arc::new(MemoryBackend::new());
        let registry = Arc::new(Registry::new(
            Arc::clone(&rt) as Arc<dyn RuntimeBackend>,
            Duration::from_secs(5),
        ));
        (rt, registry)
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_on_every_interval() {
        let (rt, registry) = setup();
        let (tx, rx) = watch::channel(false);
        let handle = Refresher::new(Arc::clone(&registry), Duration::from_secs(3)).spawn(rx);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(registry.snapshot().generation, 1);

        let _ = rt.seed(None, &RunSpec::new("alpine"), true);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(registry.snapshot().generation, 2);
        assert_eq!(registry.snapshot().containers().count(), 1);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_sender_is_dropped() {
        let (_rt, registry) = setup();
        let (tx, rx) = watch::channel(false);
        let handle = Refresher::new(registry, Duration::from_secs(3)).spawn(rx);
        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("refresher should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn failing_tick_keeps_previous_snapshot() {
        let (rt, registry) = setup();
        let refresher = Refresher::new(Arc::clone(&registry), Duration::from_secs(3));
        refresher.tick().await;
        rt.set_available(false);
        refresher.tick().await;
        assert_eq!(registry.snapshot().generation, 1);
        assert!(registry.health().stale);
    }
}
