use crate::services::Service;
use crate::state::{ServiceStatus, ServiceStatusRegistry};
use crate::utils::fmt_duration;
use std::future::Future;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

type ServiceOutcome = (&'static str, anyhow::Result<()>);

/// Owns registered services, spawns them, and coordinates graceful shutdown.
pub struct ServiceManager {
    registered: Vec<Box<dyn Service>>,
    running: JoinSet<ServiceOutcome>,
    shutdown_tx: broadcast::Sender<()>,
    statuses: ServiceStatusRegistry,
}

impl ServiceManager {
    pub fn new(statuses: ServiceStatusRegistry) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            registered: Vec::new(),
            running: JoinSet::new(),
            shutdown_tx,
            statuses,
        }
    }

    pub fn register_service(&mut self, service: Box<dyn Service>) {
        self.statuses.set(service.name(), ServiceStatus::Starting);
        self.registered.push(service);
    }

    pub fn has_services(&self) -> bool {
        !self.registered.is_empty() || !self.running.is_empty()
    }

    /// Spawn every registered service on its own task.
    pub fn spawn_all(&mut self) {
        for mut service in self.registered.drain(..) {
            let name = service.name();
            let shutdown_rx = self.shutdown_tx.subscribe();
            let statuses = self.statuses.clone();
            self.running.spawn(async move {
                statuses.set(name, ServiceStatus::Active);
                let result = service.run(shutdown_rx).await;
                statuses.set(
                    name,
                    if result.is_ok() {
                        ServiceStatus::Disabled
                    } else {
                        ServiceStatus::Error
                    },
                );
                (name, result)
            });
            info!(service = name, "Service spawned");
        }
    }

    /// Run until `signal` resolves or any service exits, then shut everything down.
    ///
    /// Returns success only when shutdown was requested by `signal` and every
    /// service stopped cleanly within `timeout`.
    pub async fn run_until_shutdown(
        mut self,
        signal: impl Future<Output = ()>,
        timeout: Duration,
    ) -> ExitCode {
        let mut clean = tokio::select! {
            _ = signal => true,
            Some(joined) = self.running.join_next() => {
                match joined {
                    Ok((name, Ok(()))) => warn!(service = name, "Service exited unexpectedly"),
                    Ok((name, Err(e))) => error!(service = name, error = ?e, "Service failed"),
                    Err(e) => error!(error = ?e, "Service task panicked"),
                }
                false
            }
        };

        clean &= self.shutdown(timeout).await;
        if clean {
            info!("Shutdown complete");
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }

    /// Broadcast shutdown and wait up to `timeout` for services to finish.
    async fn shutdown(&mut self, timeout: Duration) -> bool {
        info!(
            services = self.running.len(),
            timeout = fmt_duration(timeout),
            "Shutting down services"
        );
        let start = Instant::now();
        let _ = self.shutdown_tx.send(());

        let drained = tokio::time::timeout(timeout, async {
            let mut clean = true;
            while let Some(joined) = self.running.join_next().await {
                match joined {
                    Ok((name, Ok(()))) => info!(service = name, "Service stopped"),
                    Ok((name, Err(e))) => {
                        error!(service = name, error = ?e, "Service failed during shutdown");
                        clean = false;
                    }
                    Err(e) => {
                        error!(error = ?e, "Service task panicked during shutdown");
                        clean = false;
                    }
                }
            }
            clean
        })
        .await;

        match drained {
            Ok(clean) => {
                info!(elapsed = fmt_duration(start.elapsed()), "All services stopped");
                clean
            }
            Err(_) => {
                warn!(
                    remaining = self.running.len(),
                    "Services did not stop within timeout, aborting"
                );
                self.running.abort_all();
                false
            }
        }
    }
}
