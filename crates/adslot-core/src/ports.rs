//! Port traits.
//!
//! These traits define the interfaces between the cache and the two external
//! collaborators: the ad provider SDK and the UI host.

use crate::error::ProviderError;
use crate::handle::{AdHandle, DisplaySurface};
use crate::request::AdKind;
use crate::status::AdNotification;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Unit of work handed to a [`UiExecutor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Third-party ad SDK.
#[async_trait]
pub trait AdProvider: Send + Sync {
    /// Fetch an ad for a placement. The cache applies its own timeout.
    async fn load(&self, placement_id: &str, kind: AdKind) -> Result<AdHandle, ProviderError>;

    /// Start displaying a loaded ad.
    ///
    /// Always invoked on the UI executor. Outcomes are reported through
    /// `reporter`, possibly later and from any thread.
    fn show(
        &self,
        handle: &AdHandle,
        surface: &DisplaySurface,
        reporter: ShowReporter,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Display outcome reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowOutcome {
    Shown,
    Dismissed,
    Failed(ProviderError),
}

/// Per-display outcome channel handed to [`AdProvider::show`].
///
/// The terminal methods consume the reporter, so a display call can report
/// at most one of dismissed / failed.
#[derive(Debug)]
pub struct ShowReporter {
    tx: mpsc::UnboundedSender<ShowOutcome>,
}

impl ShowReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ShowOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// The ad is now on screen.
    pub fn shown(&self) {
        let _ = self.tx.send(ShowOutcome::Shown);
    }

    /// The user closed the ad.
    pub fn dismissed(self) {
        let _ = self.tx.send(ShowOutcome::Dismissed);
    }

    /// The ad could not be presented.
    pub fn failed(self, error: ProviderError) {
        let _ = self.tx.send(ShowOutcome::Failed(error));
    }
}

/// The single thread that owns UI state.
pub trait UiExecutor: Send + Sync {
    /// Whether the calling thread is the UI thread.
    fn is_current(&self) -> bool;

    /// Run `task` on the UI thread. Must not block waiting for it.
    fn execute(&self, task: Task);
}

/// Receiver of status notifications, always invoked on the UI executor.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: AdNotification);
}

impl<F> NotificationSink for F
where
    F: Fn(AdNotification) + Send + Sync,
{
    fn notify(&self, notification: AdNotification) {
        self(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::AdStatus;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_reporter_sends_in_order() {
        let (reporter, mut rx) = ShowReporter::channel();
        reporter.shown();
        reporter.dismissed();

        assert_eq!(rx.try_recv().unwrap(), ShowOutcome::Shown);
        assert_eq!(rx.try_recv().unwrap(), ShowOutcome::Dismissed);
        // Sender dropped after the terminal call
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_reporter_failure_carries_error() {
        let (reporter, mut rx) = ShowReporter::channel();
        reporter.failed(ProviderError::new(1, "bad activity"));
        let outcome = tokio_test::block_on(rx.recv());
        assert_eq!(
            outcome,
            Some(ShowOutcome::Failed(ProviderError::new(1, "bad activity")))
        );
    }

    #[test]
    fn test_closure_sink() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let sink = move |n: AdNotification| captured.lock().unwrap().push(n.status);

        sink.notify(AdNotification::new("a", "p1", AdStatus::ShowClosed));
        assert_eq!(*seen.lock().unwrap(), vec![AdStatus::ShowClosed]);
    }
}
