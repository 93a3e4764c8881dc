//! The ad lifecycle cache.
//!
//! Holds at most one ad per placement id. Loads go to the provider on the
//! tokio runtime under a timeout; display calls and every notification go
//! through the UI executor.

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::entry::{CacheEntry, EntryState};
use crate::executor::panic_message;
use crate::metrics::CacheMetrics;
use adslot_core::{
    AdError, AdHandle, AdNotification, AdProvider, AdRequestSpec, AdState, AdStatus,
    DisplaySurface, Error, LoadId, NotificationSink, ProviderError, Result, ShowOutcome,
    ShowReporter, UiExecutor,
};
use chrono::TimeDelta;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time::error::Elapsed;
use tracing::{debug, error, info, warn};

/// What `load` did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadDisposition {
    /// A provider request was issued.
    Requested,
    /// A load for this placement is already running, or its ad is on screen.
    AlreadyLoading,
    /// A fresh ad was already cached.
    Cached,
}

/// How `show` reached the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowDisposition {
    /// Called on the UI thread; the provider's display call has returned.
    Presented,
    /// Handed to the UI executor; the outcome arrives as a notification.
    Dispatched,
}

/// Caches one loaded ad per placement id for a UI host.
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct AdLifecycleCache {
    inner: Arc<Inner>,
}

struct Inner {
    config: CacheConfig,
    freshness_window: TimeDelta,
    entries: DashMap<String, CacheEntry>,
    provider: Arc<dyn AdProvider>,
    executor: Arc<dyn UiExecutor>,
    sink: RwLock<Option<Arc<dyn NotificationSink>>>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    metrics: Arc<CacheMetrics>,
}

enum ShowClaim {
    Missing,
    OnScreen,
    Stale(LoadId),
    Ready {
        handle: AdHandle,
        reporter: ShowReporter,
        load_id: LoadId,
    },
}

impl AdLifecycleCache {
    pub fn builder() -> AdCacheBuilder {
        AdCacheBuilder::default()
    }

    /// Start loading an ad for `spec.placement_id`.
    ///
    /// Never waits on the provider. The outcome arrives at the sink as
    /// `LoadSuccess`, `LoadFail` or `Loading`.
    pub fn load(&self, spec: &AdRequestSpec) -> std::result::Result<LoadDisposition, AdError> {
        self.inner.load(spec)
    }

    /// Display the cached ad for `spec.placement_id` on `surface`.
    ///
    /// A miss or a stale entry reports `ShowFail` and, unless disabled,
    /// starts a background load so a later call can succeed.
    pub fn show(
        &self,
        spec: &AdRequestSpec,
        surface: DisplaySurface,
    ) -> std::result::Result<ShowDisposition, AdError> {
        self.inner.show(spec, surface)
    }

    /// Register the notification sink, replacing any previous one.
    pub fn set_sink(&self, sink: Arc<dyn NotificationSink>) {
        *self
            .inner
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    pub fn clear_sink(&self) {
        *self
            .inner
            .sink
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn state(&self, placement_id: &str) -> AdState {
        self.inner
            .entries
            .get(placement_id)
            .map(|entry| entry.public_state())
            .unwrap_or(AdState::Empty)
    }

    /// Whether `show` would reach the provider right now.
    pub fn is_ready(&self, placement_id: &str) -> bool {
        let now = self.inner.clock.now();
        self.inner.entries.get(placement_id).is_some_and(|entry| {
            entry.state == EntryState::Loaded
                && entry.handle.is_some()
                && entry.is_fresh(now, self.inner.freshness_window)
        })
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Drop loaded ads past the freshness window. In-flight and on-screen
    /// entries are left alone.
    pub fn purge_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let window = self.inner.freshness_window;
        let mut removed = 0;
        self.inner.entries.retain(|placement, entry| {
            let expired = entry.state == EntryState::Loaded && entry.is_expired(now, window);
            if expired {
                debug!(placement = %placement, "Purging expired ad");
                removed += 1;
            }
            !expired
        });
        for _ in 0..removed {
            CacheMetrics::incr(&self.inner.metrics.expirations);
        }
        removed
    }

    /// Release every entry, unregistering pending display callbacks.
    pub fn clear(&self) {
        let count = self.inner.entries.len();
        self.inner.entries.clear();
        info!(count, "Cleared ad cache");
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.inner.metrics
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }
}

impl Inner {
    fn load(self: &Arc<Self>, spec: &AdRequestSpec) -> std::result::Result<LoadDisposition, AdError> {
        CacheMetrics::incr(&self.metrics.load_requests);

        if !spec.has_placement() {
            warn!(identifier = %spec.identifier(), "Rejecting load with empty placement id");
            self.notify(spec, AdStatus::LoadFail(AdError::InvalidPlacement));
            return Err(AdError::InvalidPlacement);
        }

        let now = self.clock.now();
        let load_id = LoadId::new();

        let disposition = match self.entries.entry(spec.placement_id().to_string()) {
            Entry::Occupied(mut occupied) => {
                let (state, fresh) = {
                    let entry = occupied.get();
                    (entry.state, entry.is_fresh(now, self.freshness_window))
                };
                match state {
                    EntryState::Loading | EntryState::Presenting | EntryState::Showing => {
                        LoadDisposition::AlreadyLoading
                    }
                    EntryState::Loaded if fresh => LoadDisposition::Cached,
                    EntryState::Loaded => {
                        debug!(placement = %spec.placement_id(), "Evicting stale ad before reload");
                        CacheMetrics::incr(&self.metrics.expirations);
                        occupied.insert(CacheEntry::loading(load_id));
                        LoadDisposition::Requested
                    }
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::loading(load_id));
                LoadDisposition::Requested
            }
        };

        match disposition {
            LoadDisposition::AlreadyLoading => {
                CacheMetrics::incr(&self.metrics.dedup_hits);
                debug!(
                    placement = %spec.placement_id(),
                    identifier = %spec.identifier(),
                    "Load already in flight"
                );
                self.notify(spec, AdStatus::Loading);
            }
            LoadDisposition::Cached => {
                CacheMetrics::incr(&self.metrics.cache_hits);
                debug!(placement = %spec.placement_id(), "Serving cached ad");
                self.notify(spec, AdStatus::LoadSuccess);
            }
            LoadDisposition::Requested => {
                CacheMetrics::incr(&self.metrics.provider_requests);
                info!(
                    placement = %spec.placement_id(),
                    identifier = %spec.identifier(),
                    kind = %spec.ad_kind(),
                    load_id = %load_id,
                    timeout_ms = spec.load_timeout().as_millis() as u64,
                    "Requesting ad from provider"
                );
                self.spawn_fetch(spec.clone(), load_id);
            }
        }

        Ok(disposition)
    }

    fn spawn_fetch(self: &Arc<Self>, spec: AdRequestSpec, load_id: LoadId) {
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            let provider = Arc::clone(&inner.provider);
            let request = spec.clone();
            // Dropping the timeout on completion disarms the timer.
            let fetch = inner.runtime.spawn(async move {
                tokio::time::timeout(
                    request.load_timeout(),
                    provider.load(request.placement_id(), request.ad_kind()),
                )
                .await
            });

            match fetch.await {
                Ok(result) => inner.finish_load(&spec, load_id, result),
                Err(join_error) => inner.abandon_load(&spec, load_id, join_error),
            }
        });
    }

    /// The provider's load task panicked or was cancelled before finishing.
    fn abandon_load(&self, spec: &AdRequestSpec, load_id: LoadId, join_error: JoinError) {
        let placement = spec.placement_id();

        if !join_error.is_panic() {
            if self.remove_current(placement, load_id) {
                debug!(placement = %placement, load_id = %load_id, "Ad load cancelled, entry released");
            }
            return;
        }

        let message = panic_message(join_error.into_panic().as_ref());
        CacheMetrics::incr(&self.metrics.host_exceptions);
        if self.remove_current(placement, load_id) {
            error!(placement = %placement, error = %message, "Provider load call panicked");
            self.notify(spec, AdStatus::LoadFail(AdError::HostException { message }));
        }
    }

    fn finish_load(
        &self,
        spec: &AdRequestSpec,
        load_id: LoadId,
        result: std::result::Result<std::result::Result<AdHandle, ProviderError>, Elapsed>,
    ) {
        let placement = spec.placement_id();

        match result {
            Ok(Ok(handle)) => {
                let now = self.clock.now();
                let stored = match self.entries.get_mut(placement) {
                    Some(mut entry)
                        if entry.load_id == load_id && entry.state == EntryState::Loading =>
                    {
                        entry.mark_loaded(handle, now);
                        true
                    }
                    _ => false,
                };

                if stored {
                    info!(placement = %placement, load_id = %load_id, "Ad loaded");
                    self.notify(spec, AdStatus::LoadSuccess);
                } else {
                    debug!(placement = %placement, load_id = %load_id, "Discarding ad from superseded load");
                }
            }
            Ok(Err(provider_error)) => {
                if self.remove_current(placement, load_id) {
                    let error = AdError::provider_load(provider_error);
                    warn!(placement = %placement, error = %error, "Ad load failed");
                    self.notify(spec, AdStatus::LoadFail(error));
                }
            }
            Err(_) => {
                if self.remove_current(placement, load_id) {
                    CacheMetrics::incr(&self.metrics.timeouts);
                    let error = AdError::Timeout {
                        after_ms: spec.load_timeout().as_millis() as u64,
                    };
                    warn!(placement = %placement, error = %error, "Ad load timed out");
                    self.notify(spec, AdStatus::LoadFail(error));
                }
            }
        }
    }

    fn show(
        self: &Arc<Self>,
        spec: &AdRequestSpec,
        surface: DisplaySurface,
    ) -> std::result::Result<ShowDisposition, AdError> {
        CacheMetrics::incr(&self.metrics.show_requests);

        if !spec.has_placement() {
            warn!(identifier = %spec.identifier(), "Rejecting show with empty placement id");
            self.notify(spec, AdStatus::ShowFail(AdError::InvalidPlacement));
            return Err(AdError::InvalidPlacement);
        }

        let placement = spec.placement_id();
        let now = self.clock.now();

        let claim = match self.entries.get_mut(placement) {
            None => ShowClaim::Missing,
            Some(mut entry) => match entry.handle.clone() {
                None => ShowClaim::Missing,
                Some(_) if entry.is_on_screen() => ShowClaim::OnScreen,
                Some(_) if !entry.is_fresh(now, self.freshness_window) => {
                    ShowClaim::Stale(entry.load_id)
                }
                Some(handle) => {
                    let load_id = entry.load_id;
                    let (reporter, outcomes) = ShowReporter::channel();
                    let listener = self.runtime.spawn(Arc::clone(self).watch_display(
                        spec.clone(),
                        load_id,
                        outcomes,
                    ));
                    entry.begin_display(listener.abort_handle());
                    ShowClaim::Ready {
                        handle,
                        reporter,
                        load_id,
                    }
                }
            },
        };

        match claim {
            ShowClaim::Missing => {
                CacheMetrics::incr(&self.metrics.show_misses);
                info!(placement = %placement, "No loaded ad to show");
                self.notify(spec, AdStatus::ShowFail(AdError::NotFound));
                self.prefetch(spec);
                Err(AdError::NotFound)
            }
            ShowClaim::OnScreen => {
                debug!(placement = %placement, "Ad for placement is already on screen");
                self.notify(spec, AdStatus::ShowFail(AdError::CannotShow));
                Err(AdError::CannotShow)
            }
            ShowClaim::Stale(load_id) => {
                CacheMetrics::incr(&self.metrics.show_misses);
                if self.remove_current(placement, load_id) {
                    CacheMetrics::incr(&self.metrics.expirations);
                }
                info!(placement = %placement, "Cached ad expired before show");
                self.notify(spec, AdStatus::ShowFail(AdError::CannotShow));
                self.prefetch(spec);
                Err(AdError::CannotShow)
            }
            ShowClaim::Ready {
                handle,
                reporter,
                load_id,
            } => self.present(spec, surface, handle, reporter, load_id),
        }
    }

    fn prefetch(self: &Arc<Self>, spec: &AdRequestSpec) {
        if self.config.prefetch_on_miss {
            // Only fails for an empty placement, which show already rejected.
            let _ = self.load(spec);
        }
    }

    fn present(
        self: &Arc<Self>,
        spec: &AdRequestSpec,
        surface: DisplaySurface,
        handle: AdHandle,
        reporter: ShowReporter,
        load_id: LoadId,
    ) -> std::result::Result<ShowDisposition, AdError> {
        let inner = Arc::clone(self);
        let spec = spec.clone();
        let invoke = move || inner.invoke_display(&spec, &handle, &surface, reporter, load_id);

        if self.executor.is_current() {
            invoke().map(|()| ShowDisposition::Presented)
        } else {
            self.executor.execute(Box::new(move || {
                // A failed display has already been reported to the sink.
                let _ = invoke();
            }));
            Ok(ShowDisposition::Dispatched)
        }
    }

    /// Runs on the UI thread. Nothing raised by the provider escapes.
    fn invoke_display(
        &self,
        spec: &AdRequestSpec,
        handle: &AdHandle,
        surface: &DisplaySurface,
        reporter: ShowReporter,
        load_id: LoadId,
    ) -> std::result::Result<(), AdError> {
        info!(
            placement = %spec.placement_id(),
            handle = %handle.id(),
            surface = %surface.label(),
            "Presenting ad"
        );

        let provider = Arc::clone(&self.provider);
        let outcome = catch_unwind(AssertUnwindSafe(move || {
            provider.show(handle, surface, reporter)
        }));
        let message = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        CacheMetrics::incr(&self.metrics.host_exceptions);
        error!(placement = %spec.placement_id(), error = %message, "Provider display call failed");
        self.remove_current(spec.placement_id(), load_id);
        let error = AdError::HostException { message };
        self.notify(spec, AdStatus::ShowFail(error.clone()));
        Err(error)
    }

    async fn watch_display(
        self: Arc<Self>,
        spec: AdRequestSpec,
        load_id: LoadId,
        mut outcomes: mpsc::UnboundedReceiver<ShowOutcome>,
    ) {
        let placement = spec.placement_id();

        while let Some(outcome) = outcomes.recv().await {
            match outcome {
                ShowOutcome::Shown => {
                    let marked = self
                        .entries
                        .get_mut(placement)
                        .filter(|entry| entry.load_id == load_id)
                        .map(|mut entry| entry.mark_shown())
                        .unwrap_or(false);
                    if marked {
                        info!(placement = %placement, "Ad shown");
                        self.notify(&spec, AdStatus::ShowSuccess);
                    }
                }
                ShowOutcome::Dismissed => {
                    self.remove_current(placement, load_id);
                    info!(placement = %placement, "Ad dismissed, entry consumed");
                    self.notify(&spec, AdStatus::ShowClosed);
                    return;
                }
                ShowOutcome::Failed(provider_error) => {
                    self.remove_current(placement, load_id);
                    let error = AdError::provider_show(provider_error);
                    warn!(placement = %placement, error = %error, "Ad failed to show");
                    self.notify(&spec, AdStatus::ShowFail(error));
                    return;
                }
            }
        }

        // Reporter dropped without a terminal outcome
        if self.remove_current(placement, load_id) {
            debug!(placement = %placement, "Display ended without an outcome, entry released");
        }
    }

    /// Remove the entry only if it still belongs to `load_id`.
    fn remove_current(&self, placement: &str, load_id: LoadId) -> bool {
        self.entries
            .remove_if(placement, |_, entry| entry.load_id == load_id)
            .is_some()
    }

    fn notify(&self, spec: &AdRequestSpec, status: AdStatus) {
        self.record(&status);

        let sink = self
            .sink
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sink) = sink else {
            debug!(status = %status, "No sink registered, dropping notification");
            return;
        };

        let notification = AdNotification::new(spec.identifier(), spec.placement_id(), status);
        self.executor
            .execute(Box::new(move || sink.notify(notification)));
    }

    fn record(&self, status: &AdStatus) {
        let counter = match status {
            AdStatus::LoadSuccess => &self.metrics.load_successes,
            AdStatus::LoadFail(_) => &self.metrics.load_failures,
            AdStatus::Loading => return,
            AdStatus::ShowSuccess => &self.metrics.shown,
            AdStatus::ShowFail(_) => &self.metrics.show_failures,
            AdStatus::ShowClosed => &self.metrics.dismissed,
        };
        CacheMetrics::incr(counter);
    }
}

/// Explicit construction for [`AdLifecycleCache`].
#[derive(Default)]
pub struct AdCacheBuilder {
    config: CacheConfig,
    provider: Option<Arc<dyn AdProvider>>,
    executor: Option<Arc<dyn UiExecutor>>,
    sink: Option<Arc<dyn NotificationSink>>,
    clock: Option<Arc<dyn Clock>>,
    runtime: Option<Handle>,
}

impl AdCacheBuilder {
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(mut self, provider: Arc<dyn AdProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// The executor that owns the UI thread.
    pub fn executor(mut self, executor: Arc<dyn UiExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Runtime for provider loads and timers. Defaults to the current one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<AdLifecycleCache> {
        self.config.validate()?;

        let freshness_window = TimeDelta::from_std(self.config.freshness_window())
            .map_err(|e| Error::InvalidConfig(format!("freshness window out of range: {}", e)))?;
        let provider = self.provider.ok_or(Error::MissingComponent("provider"))?;
        let executor = self.executor.ok_or(Error::MissingComponent("executor"))?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| Error::NoRuntime)?,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        info!(
            freshness_window_ms = self.config.freshness_window_ms,
            prefetch_on_miss = self.config.prefetch_on_miss,
            "Ad lifecycle cache ready"
        );

        Ok(AdLifecycleCache {
            inner: Arc::new(Inner {
                config: self.config,
                freshness_window,
                entries: DashMap::new(),
                provider,
                executor,
                sink: RwLock::new(self.sink),
                clock,
                runtime,
                metrics: CacheMetrics::new(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InlineExecutor;
    use async_trait::async_trait;
    use adslot_core::AdKind;

    struct NeverProvider;

    #[async_trait]
    impl AdProvider for NeverProvider {
        async fn load(
            &self,
            _placement_id: &str,
            _kind: AdKind,
        ) -> std::result::Result<AdHandle, ProviderError> {
            std::future::pending().await
        }

        fn show(
            &self,
            _handle: &AdHandle,
            _surface: &DisplaySurface,
            _reporter: ShowReporter,
        ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }
    }

    #[test]
    fn test_build_requires_provider() {
        let err = AdLifecycleCache::builder()
            .executor(Arc::new(InlineExecutor))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::MissingComponent("provider")));
    }

    #[test]
    fn test_build_requires_executor() {
        let err = AdLifecycleCache::builder()
            .provider(Arc::new(NeverProvider))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::MissingComponent("executor")));
    }

    #[test]
    fn test_build_outside_runtime() {
        let err = AdLifecycleCache::builder()
            .provider(Arc::new(NeverProvider))
            .executor(Arc::new(InlineExecutor))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::NoRuntime));
    }

    #[test]
    fn test_build_with_explicit_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let cache = AdLifecycleCache::builder()
            .provider(Arc::new(NeverProvider))
            .executor(Arc::new(InlineExecutor))
            .runtime(runtime.handle().clone())
            .build()
            .unwrap();

        assert!(cache.is_empty());
        assert_eq!(cache.state("p1"), AdState::Empty);
        assert!(!cache.is_ready("p1"));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let err = AdLifecycleCache::builder()
            .config(CacheConfig::default().with_freshness_window(std::time::Duration::ZERO))
            .provider(Arc::new(NeverProvider))
            .executor(Arc::new(InlineExecutor))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_empty_placement_rejected() {
        let cache = AdLifecycleCache::builder()
            .provider(Arc::new(NeverProvider))
            .executor(Arc::new(InlineExecutor))
            .build()
            .unwrap();

        let spec = AdRequestSpec::new("main", "");
        assert_eq!(cache.load(&spec), Err(AdError::InvalidPlacement));
        assert!(cache.is_empty());
        assert_eq!(cache.metrics().snapshot().provider_requests, 0);
        assert_eq!(cache.metrics().snapshot().load_failures, 1);
    }
}
