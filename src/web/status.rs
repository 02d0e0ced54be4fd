//! Health and status handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::trace;

use crate::state::{AppState, ServiceStatus};
use crate::web::error::{Success, success};

#[derive(Serialize)]
pub struct ServiceInfo {
    name: String,
    status: ServiceStatus,
    /// Seconds since the status last changed.
    since_secs: u64,
}

#[derive(Serialize)]
pub struct CacheInfo {
    ready: bool,
    fund_count: usize,
    cache_time: Option<String>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    status: ServiceStatus,
    version: String,
    cache: CacheInfo,
    services: BTreeMap<String, ServiceInfo>,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Status endpoint showing cache readiness and service health
pub(super) async fn status(State(state): State<AppState>) -> Json<Success<StatusResponse>> {
    let mut services = BTreeMap::new();
    for (name, svc_status, age) in state.service_statuses.all() {
        services.insert(
            name.clone(),
            ServiceInfo {
                name,
                status: svc_status,
                since_secs: age.as_secs(),
            },
        );
    }

    let snapshot = state.fund_cache.get();
    let cache = CacheInfo {
        ready: snapshot.is_some(),
        fund_count: snapshot.as_ref().map_or(0, |s| s.len()),
        cache_time: snapshot.as_ref().map(|s| {
            state
                .zone
                .localize(s.captured_at())
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        }),
    };

    let overall_status = overall(services.values().map(|s| s.status), cache.ready);

    success(StatusResponse {
        status: overall_status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        cache,
        services,
    })
}

fn overall(statuses: impl Iterator<Item = ServiceStatus>, cache_ready: bool) -> ServiceStatus {
    let statuses: Vec<ServiceStatus> = statuses.collect();
    if statuses.contains(&ServiceStatus::Error) {
        ServiceStatus::Error
    } else if !cache_ready || statuses.contains(&ServiceStatus::Starting) {
        ServiceStatus::Starting
    } else {
        ServiceStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_dominates() {
        let all = [ServiceStatus::Active, ServiceStatus::Error];
        assert_eq!(overall(all.into_iter(), true), ServiceStatus::Error);
    }

    #[test]
    fn empty_cache_reports_starting() {
        let all = [ServiceStatus::Active, ServiceStatus::Active];
        assert_eq!(overall(all.into_iter(), false), ServiceStatus::Starting);
        assert_eq!(overall(all.into_iter(), true), ServiceStatus::Active);
    }
}
