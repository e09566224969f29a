//! Keeps the reconciler's inputs fresh: an INI mod-time poll, a container
//! listing poll, and (when available) a live event subscription — three
//! independently configurable loops, cancelled together on shutdown.

use crate::config::reconciler::Reconciler;
use crate::config::{glob, ini, Config, ConfigOverrides};
use crate::runtime::ContainerRuntime;
use crate::scheduler::Scheduler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Watcher {
    config_pattern: String,
    overrides: ConfigOverrides,
    runtime: Arc<dyn ContainerRuntime>,
    scheduler: Arc<Scheduler>,
    reconciler: Arc<Reconciler>,
    config: RwLock<Config>,
    last_config_mtime: RwLock<Option<std::time::SystemTime>>,
    events_failed: AtomicBool,
    fallback_active: AtomicBool,
}

impl Watcher {
    pub async fn new(
        config_pattern: impl Into<String>,
        overrides: ConfigOverrides,
        runtime: Arc<dyn ContainerRuntime>,
        scheduler: Arc<Scheduler>,
        label_prefix: impl Into<String>,
    ) -> Result<Self, crate::error::SchedulerError> {
        let config_pattern = config_pattern.into();
        let mut config = ini::load(&config_pattern)?;
        config.apply_overrides(overrides.clone());

        let reconciler = Arc::new(Reconciler::new(runtime.clone(), label_prefix, config.global.notification_cooldown));

        Ok(Self {
            last_config_mtime: RwLock::new(glob::latest_mtime(&config_pattern)),
            config_pattern,
            overrides,
            runtime,
            scheduler,
            reconciler,
            config: RwLock::new(config),
            events_failed: AtomicBool::new(false),
            fallback_active: AtomicBool::new(false),
        })
    }

    /// Whether the most recent event-subscription attempt failed.
    pub fn events_failed(&self) -> bool {
        self.events_failed.load(Ordering::SeqCst)
    }

    /// Whether the polling fallback loop is currently active (subscription
    /// failed and not yet re-established).
    pub fn fallback_active(&self) -> bool {
        self.fallback_active.load(Ordering::SeqCst)
    }

    /// Runs an initial reconciliation, then drives the three loops until
    /// `cancel` fires. Each loop completes its in-flight cycle before
    /// returning.
    pub async fn run(&self, cancel: CancellationToken) {
        {
            let config = self.config.read().await;
            if let Err(error) = self.reconciler.reconcile(&self.scheduler, &config).await {
                warn!(%error, "initial reconciliation failed");
            }
        }

        let runtime_cfg = self.config.read().await.runtime.clone();
        if runtime_cfg.events && runtime_cfg.docker_poll_interval > Duration::ZERO {
            info!("container events and explicit container polling are both enabled; this is redundant but allowed");
        }

        tokio::join!(
            self.config_poll_loop(cancel.clone()),
            self.container_poll_loop(cancel.clone()),
            self.event_loop(cancel.clone()),
        );
    }

    async fn reload_config(&self) -> Result<(), crate::error::SchedulerError> {
        let mut fresh = ini::load(&self.config_pattern)?;
        fresh.apply_overrides(self.overrides.clone());
        *self.config.write().await = fresh;
        Ok(())
    }

    async fn config_poll_loop(&self, cancel: CancellationToken) {
        let interval = self.config.read().await.runtime.config_poll_interval;
        if interval == Duration::ZERO {
            return;
        }
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }

            let latest = glob::latest_mtime(&self.config_pattern);
            let stale = {
                let last = self.last_config_mtime.read().await;
                latest > *last
            };
            if !stale {
                continue;
            }
            *self.last_config_mtime.write().await = latest;

            if let Err(error) = self.reload_config().await {
                warn!(%error, "failed to reload config, keeping previous version");
                continue;
            }
            let config = self.config.read().await;
            if let Err(error) = self.reconciler.reconcile(&self.scheduler, &config).await {
                warn!(%error, "reconciliation after config reload failed");
            }
        }
    }

    async fn container_poll_loop(&self, cancel: CancellationToken) {
        let interval = self.config.read().await.runtime.docker_poll_interval;
        if interval == Duration::ZERO {
            return;
        }
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {}
            }
            let config = self.config.read().await;
            if let Err(error) = self.reconciler.reconcile(&self.scheduler, &config).await {
                warn!(%error, "reconciliation on container poll failed");
            }
        }
    }

    async fn event_loop(&self, cancel: CancellationToken) {
        let enabled = self.config.read().await.runtime.events;
        if !enabled {
            return;
        }

        loop {
            if cancel.is_cancelled() {
                return;
            }

            let mut events = match self.runtime.subscribe_events().await {
                Ok(events) => {
                    if self.events_failed.swap(false, Ordering::SeqCst) {
                        info!("event subscription re-established, cancelling polling fallback");
                    }
                    self.fallback_active.store(false, Ordering::SeqCst);
                    events
                }
                Err(error) => {
                    self.mark_events_failed(&error);
                    if !self.wait_before_resubscribe(&cancel).await {
                        return;
                    }
                    continue;
                }
            };

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    event = events.recv() => {
                        match event {
                            Some(()) => {
                                let config = self.config.read().await;
                                if let Err(error) = self.reconciler.reconcile(&self.scheduler, &config).await {
                                    warn!(%error, "reconciliation on container event failed");
                                }
                            }
                            None => {
                                self.mark_events_failed(&anyhow::anyhow!("event stream closed"));
                                break;
                            }
                        }
                    }
                }
            }

            if !self.wait_before_resubscribe(&cancel).await {
                return;
            }
        }
    }

    fn mark_events_failed(&self, error: &anyhow::Error) {
        if !self.events_failed.swap(true, Ordering::SeqCst) {
            warn!(%error, "container event subscription failed, falling back to polling");
        }
    }

    /// Runs the configured polling-fallback loop once while waiting to
    /// retry the event subscription; returns `false` if cancelled.
    async fn wait_before_resubscribe(&self, cancel: &CancellationToken) -> bool {
        self.fallback_active.store(true, Ordering::SeqCst);
        let fallback_interval = self.config.read().await.runtime.polling_fallback;
        if fallback_interval > Duration::ZERO {
            let config = self.config.read().await;
            if let Err(error) = self.reconciler.reconcile(&self.scheduler, &config).await {
                warn!(%error, "fallback-polling reconciliation failed");
            }
            drop(config);
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(fallback_interval) => {}
            }
        } else {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(Duration::from_secs(5)) => {}
            }
        }
        true
    }
}
