//! adslot core
//!
//! Domain types, error taxonomy and port traits for the ad lifecycle cache.
//! This crate has minimal dependencies and defines the vocabulary shared by
//! the cache implementation and its hosts.

pub mod error;
pub mod handle;
pub mod ids;
pub mod ports;
pub mod request;
pub mod status;

pub use error::{AdError, Error, ProviderError, ProviderErrorKind, Result};
pub use handle::{AdHandle, DisplaySurface};
pub use ids::*;
pub use ports::{AdProvider, NotificationSink, ShowOutcome, ShowReporter, Task, UiExecutor};
pub use request::{AdKind, AdRequestSpec};
pub use status::{AdNotification, AdState, AdStatus};
