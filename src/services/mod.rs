//! Long-running services and the manager that supervises them.

pub mod manager;
pub mod refresher;
pub mod signals;
pub mod web;

use async_trait::async_trait;
use tokio::sync::broadcast;

/// A long-running component started by the [`manager::ServiceManager`].
///
/// `run` should return once `shutdown_rx` fires; returning earlier (either
/// `Ok` or `Err`) triggers shutdown of every other service.
#[async_trait]
pub trait Service: Send {
    fn name(&self) -> &'static str;

    async fn run(&mut self, shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()>;
}
