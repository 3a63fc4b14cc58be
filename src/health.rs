use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::Store;

// ============================================================================
// Health Check
// ============================================================================
//
// Each dependency reports a ComponentHealth. The report is unhealthy as soon
// as one component is, which decides the HTTP code of /health.
//
// ============================================================================

/// Health status of a component
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy(_))
    }
}

/// Health information for a component
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub last_check: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ComponentHealth {
    pub fn new(name: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            name: name.into(),
            status,
            last_check: Utc::now(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub components: Vec<ComponentHealth>,
}

impl HealthReport {
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        let status = components
            .iter()
            .map(|c| &c.status)
            .find(|s| s.is_unhealthy())
            .cloned()
            .unwrap_or(HealthStatus::Healthy);

        Self { status, components }
    }
}

const STORE_UNREACHABLE: &str = "store unreachable";

/// Probe the order store with a trivial round trip.
pub async fn check_store<S: Store>(store: &S) -> ComponentHealth {
    let started = std::time::Instant::now();

    match store.ping().await {
        Ok(()) => ComponentHealth::new("store", HealthStatus::Healthy)
            .with_details(format!("ping {} ms", started.elapsed().as_millis())),
        Err(e) => {
            // Driver detail stays in the log
            tracing::warn!(error = %e, "Store health check failed");
            ComponentHealth::new("store", HealthStatus::Unhealthy(STORE_UNREACHABLE.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_memory_store_is_healthy() {
        let health = check_store(&MemoryStore::new()).await;

        assert_eq!(health.name, "store");
        assert!(health.status.is_healthy());
        assert!(health.details.is_some());
    }

    #[tokio::test]
    async fn test_unreachable_store_hides_driver_error() {
        let store = MemoryStore::new();
        store.set_unreachable(true).await;

        let health = check_store(&store).await;

        assert_eq!(health.status, HealthStatus::Unhealthy("store unreachable".into()));
        let json = serde_json::to_string(&health).unwrap();
        assert!(!json.contains("pool"), "{}", json);
    }

    #[test]
    fn test_one_unhealthy_component_fails_report() {
        let report = HealthReport::from_components(vec![
            ComponentHealth::new("a", HealthStatus::Healthy),
            ComponentHealth::new("b", HealthStatus::Unhealthy("down".into())),
        ]);

        assert!(report.status.is_unhealthy());
    }

    #[test]
    fn test_empty_report_is_healthy() {
        assert!(HealthReport::from_components(vec![]).status.is_healthy());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(HealthStatus::Unhealthy("down".into())).unwrap();
        assert_eq!(json["state"], "UNHEALTHY");
        assert_eq!(json["reason"], "down");

        let json = serde_json::to_value(HealthStatus::Healthy).unwrap();
        assert_eq!(json["state"], "HEALTHY");
    }
}
