//! Simulated ad provider for demos and local development.

use adslot_core::{
    AdHandle, AdKind, AdProvider, DisplaySurface, Error, ProviderError, ProviderErrorKind,
    Result, ShowReporter,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Behaviour of the simulated provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedConfig {
    /// Time taken to "fetch" an ad.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,
    /// Fail every load with this provider code.
    #[serde(default)]
    pub load_error_code: Option<i32>,
    /// How long an ad stays on screen before the user dismisses it.
    #[serde(default = "default_display_ms")]
    pub display_ms: u64,
    /// Fail every display with this provider code.
    #[serde(default)]
    pub show_error_code: Option<i32>,
}

fn default_latency_ms() -> u64 {
    300
}

fn default_display_ms() -> u64 {
    1_500
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            latency_ms: default_latency_ms(),
            load_error_code: None,
            display_ms: default_display_ms(),
            show_error_code: None,
        }
    }
}

/// The payload behind handles issued by [`SimulatedProvider`].
#[derive(Debug, Clone)]
pub struct SimulatedCreative {
    pub placement_id: String,
    pub served_at: DateTime<Utc>,
    pub serial: u64,
}

/// An [`AdProvider`] that serves fake creatives after a fixed latency.
pub struct SimulatedProvider {
    config: SimulatedConfig,
    runtime: Handle,
    loads: AtomicU64,
}

impl SimulatedProvider {
    /// Create a provider bound to the current tokio runtime.
    pub fn new(config: SimulatedConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Ok(Self::with_runtime(config, runtime))
    }

    pub fn with_runtime(config: SimulatedConfig, runtime: Handle) -> Self {
        Self {
            config,
            runtime,
            loads: AtomicU64::new(0),
        }
    }

    /// Number of load requests received so far.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    fn error_for(code: i32) -> ProviderError {
        let message = match ProviderErrorKind::from_code(code) {
            ProviderErrorKind::Internal => "Internal error.",
            ProviderErrorKind::InvalidRequest => "Invalid ad unit id.",
            ProviderErrorKind::Network => "Network unreachable.",
            ProviderErrorKind::NoFill => "No ad config.",
            ProviderErrorKind::Unknown(_) => "Simulated failure.",
        };
        ProviderError::new(code, message)
    }
}

#[async_trait]
impl AdProvider for SimulatedProvider {
    async fn load(
        &self,
        placement_id: &str,
        kind: AdKind,
    ) -> std::result::Result<AdHandle, ProviderError> {
        let serial = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(placement = %placement_id, kind = %kind, serial, "Simulated fetch started");

        tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;

        if let Some(code) = self.config.load_error_code {
            return Err(Self::error_for(code));
        }

        Ok(AdHandle::new(
            placement_id,
            kind,
            SimulatedCreative {
                placement_id: placement_id.to_string(),
                served_at: Utc::now(),
                serial,
            },
        ))
    }

    fn show(
        &self,
        handle: &AdHandle,
        surface: &DisplaySurface,
        reporter: ShowReporter,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let creative = handle
            .downcast_ref::<SimulatedCreative>()
            .ok_or("handle was not issued by the simulated provider")?;

        if let Some(code) = self.config.show_error_code {
            reporter.failed(Self::error_for(code));
            return Ok(());
        }

        info!(
            placement = %creative.placement_id,
            serial = creative.serial,
            surface = %surface.label(),
            "Simulated ad on screen"
        );
        reporter.shown();

        let display = Duration::from_millis(self.config.display_ms);
        self.runtime.spawn(async move {
            tokio::time::sleep(display).await;
            reporter.dismissed();
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adslot_core::ShowOutcome;

    #[tokio::test(start_paused = true)]
    async fn test_load_serves_creative() {
        let provider = SimulatedProvider::new(SimulatedConfig::default()).unwrap();
        let handle = provider.load("p1", AdKind::Interstitial).await.unwrap();

        let creative = handle.downcast_ref::<SimulatedCreative>().unwrap();
        assert_eq!(creative.placement_id, "p1");
        assert_eq!(creative.serial, 1);
        assert_eq!(provider.load_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_load_error() {
        let config = SimulatedConfig {
            load_error_code: Some(3),
            ..Default::default()
        };
        let provider = SimulatedProvider::new(config).unwrap();
        let err = provider.load("p1", AdKind::Interstitial).await.unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::NoFill);
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_then_dismiss() {
        let provider = SimulatedProvider::new(SimulatedConfig::default()).unwrap();
        let handle = provider.load("p1", AdKind::Interstitial).await.unwrap();

        let (reporter, mut outcomes) = ShowReporter::channel();
        provider
            .show(&handle, &DisplaySurface::detached("screen"), reporter)
            .unwrap();

        assert_eq!(outcomes.recv().await, Some(ShowOutcome::Shown));
        assert_eq!(outcomes.recv().await, Some(ShowOutcome::Dismissed));
        assert_eq!(outcomes.recv().await, None);
    }

    #[tokio::test]
    async fn test_foreign_handle_rejected() {
        let provider = SimulatedProvider::new(SimulatedConfig::default()).unwrap();
        let foreign = AdHandle::new("p1", AdKind::Interstitial, 5u32);
        let (reporter, _outcomes) = ShowReporter::channel();

        let err = provider
            .show(&foreign, &DisplaySurface::detached("screen"), reporter)
            .unwrap_err();
        assert!(err.to_string().contains("simulated provider"));
    }
}
