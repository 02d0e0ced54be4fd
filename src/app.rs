use crate::cli::ServiceName;
use crate::config::Config;
use crate::eastmoney::{EastmoneyClient, FundSource};
use crate::funds::{FundCache, Refresher};
use crate::services::manager::ServiceManager;
use crate::services::refresher::RefresherService;
use crate::services::web::WebService;
use crate::state::AppState;
use crate::utils::fmt_duration;
use anyhow::Context;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    refresher: Arc<Refresher>,
    app_state: AppState,
    service_manager: ServiceManager,
}

impl App {
    /// Build the client and cache, and run the startup refresh.
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let client = EastmoneyClient::new(config.eastmoney_base_url.clone(), config.fetch_timeout)
            .context("Failed to create Eastmoney client")?;
        info!(
            base_url = %config.eastmoney_base_url,
            fetch_timeout = fmt_duration(config.fetch_timeout),
            refresh_timezone = ?config.refresh_timezone,
            "Fund source configured"
        );
        Ok(Self::with_source(config, Arc::new(client)).await)
    }

    /// Like [`App::new`], with an already-built data source.
    pub async fn with_source(config: Config, source: Arc<dyn FundSource>) -> Self {
        let fund_cache = FundCache::new();
        let refresher = Arc::new(Refresher::new(
            source.clone(),
            fund_cache.clone(),
            config.fetch_timeout,
            config.refresh_timezone,
        ));

        // Non-fatal: the API answers 503 until a later refresh succeeds.
        let start = Instant::now();
        if refresher.refresh().await {
            info!(
                duration = fmt_duration(start.elapsed()),
                "Startup fund directory refresh completed"
            );
        } else {
            warn!("Startup fund directory refresh failed; serving 503 until the next refresh");
        }

        let app_state = AppState::new(
            fund_cache,
            source,
            config.refresh_timezone,
            config.fetch_timeout,
        );
        let service_manager = ServiceManager::new(app_state.service_statuses.clone());

        App {
            config,
            refresher,
            app_state,
            service_manager,
        }
    }

    pub fn app_state(&self) -> &AppState {
        &self.app_state
    }

    /// Setup and register services based on enabled service list
    pub fn setup_services(&mut self, services: &[ServiceName]) -> Result<(), anyhow::Error> {
        if services.contains(&ServiceName::Web) {
            let web_service = Box::new(WebService::new(self.config.port, self.app_state.clone()));
            self.service_manager.register_service(web_service);
        }

        if services.contains(&ServiceName::Refresher) {
            let refresher_service = Box::new(RefresherService::new(self.refresher.clone()));
            self.service_manager.register_service(refresher_service);
        }

        if !self.service_manager.has_services() {
            error!("No services enabled. Cannot start application.");
            return Err(anyhow::anyhow!("No services enabled"));
        }

        Ok(())
    }

    /// Start all registered services
    pub fn start_services(&mut self) {
        self.service_manager.spawn_all();
    }

    /// Run the application and handle shutdown signals
    pub async fn run(self) -> ExitCode {
        use crate::services::signals::handle_shutdown_signals;
        handle_shutdown_signals(self.service_manager, self.config.shutdown_timeout).await
    }
}
