//! Dependency health checks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use crate::error::{Result, TollgateError};
use crate::ratelimit::{InMemoryCounterStore, RedisCounterStore};

/// A dependency that can report whether it is reachable.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<()>;
}

#[async_trait]
impl HealthProbe for RedisCounterStore {
    async fn probe(&self) -> Result<()> {
        self.ping().await
    }
}

#[async_trait]
impl HealthProbe for InMemoryCounterStore {
    async fn probe(&self) -> Result<()> {
        Ok(())
    }
}

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Result of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub checks: BTreeMap<String, CheckResult>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Runs every registered probe, each bounded by the same timeout.
pub struct HealthChecker {
    probes: Vec<(String, Arc<dyn HealthProbe>)>,
    timeout: Duration,
}

impl HealthChecker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            probes: Vec::new(),
            timeout,
        }
    }

    /// Register a probe under `name`.
    pub fn with_probe(mut self, name: impl Into<String>, probe: Arc<dyn HealthProbe>) -> Self {
        self.probes.push((name.into(), probe));
        self
    }

    pub async fn check(&self) -> HealthReport {
        let mut checks = BTreeMap::new();

        for (name, probe) in &self.probes {
            let outcome = tokio::time::timeout(self.timeout, probe.probe())
                .await
                .unwrap_or(Err(TollgateError::StoreTimeout(self.timeout)));

            let result = match outcome {
                Ok(()) => CheckResult {
                    status: CheckStatus::Ok,
                    message: None,
                },
                Err(err) => {
                    warn!(check = %name, error = %err, "Health check failed");
                    CheckResult {
                        status: CheckStatus::Error,
                        message: Some(err.to_string()),
                    }
                }
            };
            checks.insert(name.clone(), result);
        }

        let failed = checks
            .values()
            .filter(|c| c.status == CheckStatus::Error)
            .count();
        let status = if failed == 0 {
            HealthStatus::Healthy
        } else if failed == checks.len() {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport { status, checks }
    }
}
