//! Provider connectivity probes

use skyforge_cloud::ProviderAdapter;
use skyforge_core::{HealthSample, HealthStatus};
use std::time::Duration;
use tokio::time::Instant;

/// Probes slower than this are reported as degraded
pub const DEGRADED_THRESHOLD: Duration = Duration::from_millis(1000);

/// Connectivity checks still running after this are abandoned as errors
pub const CHECK_TIMEOUT: Duration = Duration::from_secs(30);

/// Times an adapter's probe and classifies the result
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    threshold: Duration,
    check_timeout: Duration,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self {
            threshold: DEGRADED_THRESHOLD,
            check_timeout: CHECK_TIMEOUT,
        }
    }
}

impl HealthMonitor {
    pub fn with_threshold(threshold: Duration) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }

    pub fn with_check_timeout(mut self, check_timeout: Duration) -> Self {
        self.check_timeout = check_timeout;
        self
    }

    /// `< threshold` healthy, `>= threshold` degraded, any error is error
    pub fn classify<E: std::fmt::Display>(
        &self,
        elapsed: Duration,
        result: Result<(), E>,
    ) -> HealthSample {
        let response_time_ms = elapsed.as_millis().min(u64::MAX as u128) as u64;
        match result {
            Ok(()) => HealthSample {
                status: if elapsed < self.threshold {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                },
                response_time_ms,
                error_message: None,
            },
            Err(e) => HealthSample {
                status: HealthStatus::Error,
                response_time_ms,
                error_message: Some(e.to_string()),
            },
        }
    }

    pub async fn probe(&self, adapter: &dyn ProviderAdapter) -> HealthSample {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.check_timeout, adapter.probe()).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!(
                "connectivity check timed out after {}s",
                self.check_timeout.as_secs()
            )),
        };
        let sample = self.classify(started.elapsed(), result);

        tracing::debug!(
            provider = %adapter.provider(),
            status = %sample.status,
            response_time_ms = sample.response_time_ms,
            "Health probe finished"
        );
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use skyforge_cloud::{Provider, ResourceDescriptor};

    struct Stalled;

    #[async_trait]
    impl ProviderAdapter for Stalled {
        fn provider(&self) -> Provider {
            Provider::Gcp
        }

        async fn probe(&self) -> skyforge_cloud::Result<()> {
            std::future::pending().await
        }

        async fn list_instances(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
            Ok(Vec::new())
        }

        async fn list_storage(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
            Ok(Vec::new())
        }

        async fn list_network(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
            Ok(Vec::new())
        }
    }

    fn ok() -> Result<(), String> {
        Ok(())
    }

    #[test]
    fn test_boundary_is_degraded() {
        let monitor = HealthMonitor::default();
        assert_eq!(
            monitor.classify(Duration::from_millis(999), ok()).status,
            HealthStatus::Healthy
        );
        assert_eq!(
            monitor.classify(Duration::from_millis(1000), ok()).status,
            HealthStatus::Degraded
        );
        assert_eq!(
            monitor.classify(Duration::from_millis(4500), ok()).status,
            HealthStatus::Degraded
        );
    }

    #[test]
    fn test_error_keeps_message_and_time() {
        let sample = HealthMonitor::default()
            .classify(Duration::from_millis(12), Err::<(), _>("connection refused"));
        assert_eq!(sample.status, HealthStatus::Error);
        assert_eq!(sample.response_time_ms, 12);
        assert_eq!(sample.error_message.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_custom_threshold() {
        let monitor = HealthMonitor::with_threshold(Duration::from_millis(50));
        assert_eq!(
            monitor.classify(Duration::from_millis(50), ok()).status,
            HealthStatus::Degraded
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_adapter_gives_up_after_timeout() {
        let monitor = HealthMonitor::default().with_check_timeout(Duration::from_secs(5));
        let sample = monitor.probe(&Stalled).await;
        assert_eq!(sample.status, HealthStatus::Error);
        assert_eq!(sample.response_time_ms, 5000);
        assert_eq!(
            sample.error_message.as_deref(),
            Some("connectivity check timed out after 5s")
        );
    }
}
