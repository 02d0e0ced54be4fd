use crate::cli::ServiceName;
use crate::funds::Refresher;
use crate::services::Service;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Drives the midnight refresh loop as a managed service.
pub struct RefresherService {
    refresher: Arc<Refresher>,
}

impl RefresherService {
    pub fn new(refresher: Arc<Refresher>) -> Self {
        Self { refresher }
    }
}

#[async_trait]
impl Service for RefresherService {
    fn name(&self) -> &'static str {
        ServiceName::Refresher.as_str()
    }

    async fn run(&mut self, shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        self.refresher.run(shutdown_rx).await;
        Ok(())
    }
}
