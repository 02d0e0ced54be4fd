//! Application state shared across components (web handlers, refresher).

use crate::eastmoney::FundSource;
use crate::funds::FundCache;
use crate::funds::refresh::RefreshZone;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Health status of a service.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Starting,
    Active,
    Disabled,
    Error,
}

/// A timestamped status entry for a service.
#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub status: ServiceStatus,
    pub updated_at: Instant,
}

/// Thread-safe registry for services to self-report their health status.
#[derive(Debug, Clone, Default)]
pub struct ServiceStatusRegistry {
    inner: Arc<DashMap<String, StatusEntry>>,
}

impl ServiceStatusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or updates the status for a named service.
    pub fn set(&self, name: &str, status: ServiceStatus) {
        self.inner.insert(
            name.to_owned(),
            StatusEntry {
                status,
                updated_at: Instant::now(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<ServiceStatus> {
        self.inner.get(name).map(|entry| entry.status)
    }

    /// Returns a snapshot of all service statuses with their age.
    pub fn all(&self) -> Vec<(String, ServiceStatus, Duration)> {
        self.inner
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    entry.value().status,
                    entry.value().updated_at.elapsed(),
                )
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct AppState {
    pub fund_cache: FundCache,
    pub source: Arc<dyn FundSource>,
    pub service_statuses: ServiceStatusRegistry,
    /// Zone used both for the refresh schedule and for rendering `cache_time`.
    pub zone: RefreshZone,
    /// Deadline for on-demand history fetches.
    pub fetch_timeout: Duration,
}

impl AppState {
    pub fn new(
        fund_cache: FundCache,
        source: Arc<dyn FundSource>,
        zone: RefreshZone,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fund_cache,
            source,
            service_statuses: ServiceStatusRegistry::new(),
            zone,
            fetch_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_tracks_latest_status() {
        let registry = ServiceStatusRegistry::new();
        assert_eq!(registry.get("web"), None);

        registry.set("web", ServiceStatus::Starting);
        registry.set("web", ServiceStatus::Active);
        registry.set("refresher", ServiceStatus::Error);

        assert_eq!(registry.get("web"), Some(ServiceStatus::Active));
        let mut all: Vec<_> = registry.all().into_iter().map(|(n, s, _)| (n, s)).collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            all,
            vec![
                ("refresher".to_string(), ServiceStatus::Error),
                ("web".to_string(), ServiceStatus::Active),
            ]
        );
    }
}
