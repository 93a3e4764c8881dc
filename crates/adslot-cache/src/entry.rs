//! Per-placement cache entries.

use adslot_core::{AdHandle, AdState, LoadId};
use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::AbortHandle;

/// Lifecycle of a live entry. Failure and consumption remove the entry, so
/// they never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryState {
    Loading,
    Loaded,
    /// Display requested from the provider, not yet reported as shown.
    Presenting,
    Showing,
}

#[derive(Debug)]
pub(crate) struct CacheEntry {
    pub load_id: LoadId,
    pub state: EntryState,
    pub handle: Option<AdHandle>,
    pub loaded_at: Option<DateTime<Utc>>,
    display_listener: Option<AbortHandle>,
}

impl CacheEntry {
    pub fn loading(load_id: LoadId) -> Self {
        Self {
            load_id,
            state: EntryState::Loading,
            handle: None,
            loaded_at: None,
            display_listener: None,
        }
    }

    pub fn mark_loaded(&mut self, handle: AdHandle, now: DateTime<Utc>) {
        self.state = EntryState::Loaded;
        self.handle = Some(handle);
        self.loaded_at = Some(now);
    }

    /// Claim a loaded ad for display and hold on to its outcome listener.
    pub fn begin_display(&mut self, listener: AbortHandle) {
        debug_assert_eq!(self.state, EntryState::Loaded);
        self.state = EntryState::Presenting;
        self.display_listener = Some(listener);
    }

    /// Returns false if the entry was not waiting on a display.
    pub fn mark_shown(&mut self) -> bool {
        if self.state == EntryState::Presenting {
            self.state = EntryState::Showing;
            true
        } else {
            false
        }
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        match self.loaded_at {
            Some(loaded_at) => now - loaded_at < window,
            None => false,
        }
    }

    /// Loaded at some point and now past the freshness window.
    pub fn is_expired(&self, now: DateTime<Utc>, window: TimeDelta) -> bool {
        self.loaded_at.is_some() && !self.is_fresh(now, window)
    }

    pub fn is_on_screen(&self) -> bool {
        matches!(self.state, EntryState::Presenting | EntryState::Showing)
    }

    pub fn public_state(&self) -> AdState {
        match self.state {
            EntryState::Loading => AdState::Loading,
            EntryState::Loaded | EntryState::Presenting => AdState::Loaded,
            EntryState::Showing => AdState::Showing,
        }
    }
}

impl Drop for CacheEntry {
    // Removing an entry also unregisters its display callbacks.
    fn drop(&mut self) {
        if let Some(listener) = self.display_listener.take() {
            listener.abort();
        }
    }
}
