//! Ad lifecycle cache.
//!
//! Keeps at most one loaded ad per placement, enforces load timeouts and a
//! freshness window, and delivers every notification on the UI executor.

pub mod cache;
pub mod clock;
pub mod config;
mod entry;
pub mod executor;
pub mod metrics;
pub mod simulated;

pub use cache::{AdCacheBuilder, AdLifecycleCache, LoadDisposition, ShowDisposition};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use executor::{InlineExecutor, QueuedExecutor, UiThread};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use simulated::{SimulatedConfig, SimulatedCreative, SimulatedProvider};
