//! Status notifications delivered to the UI host.

use crate::error::AdError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a load or show request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum AdStatus {
    LoadSuccess,
    LoadFail(AdError),
    /// A load for the placement is already in flight.
    Loading,
    ShowSuccess,
    ShowFail(AdError),
    ShowClosed,
}

impl AdStatus {
    pub fn name(&self) -> &'static str {
        match self {
            AdStatus::LoadSuccess => "load_success",
            AdStatus::LoadFail(_) => "load_fail",
            AdStatus::Loading => "loading",
            AdStatus::ShowSuccess => "show_success",
            AdStatus::ShowFail(_) => "show_fail",
            AdStatus::ShowClosed => "show_closed",
        }
    }

    pub fn error(&self) -> Option<&AdError> {
        match self {
            AdStatus::LoadFail(err) | AdStatus::ShowFail(err) => Some(err),
            AdStatus::LoadSuccess
            | AdStatus::Loading
            | AdStatus::ShowSuccess
            | AdStatus::ShowClosed => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error().is_some()
    }
}

impl fmt::Display for AdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single `(identifier, status, message)` notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdNotification {
    pub identifier: String,
    pub placement_id: String,
    pub status: AdStatus,
    pub timestamp: DateTime<Utc>,
}

impl AdNotification {
    pub fn new(
        identifier: impl Into<String>,
        placement_id: impl Into<String>,
        status: AdStatus,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            placement_id: placement_id.into(),
            status,
            timestamp: Utc::now(),
        }
    }

    /// Human-readable detail, present for failures and the in-flight signal.
    pub fn message(&self) -> Option<String> {
        match &self.status {
            AdStatus::LoadFail(err) | AdStatus::ShowFail(err) => Some(err.to_string()),
            AdStatus::Loading => Some(AdError::AlreadyLoading.to_string()),
            AdStatus::LoadSuccess | AdStatus::ShowSuccess | AdStatus::ShowClosed => None,
        }
    }
}

/// Observable state of a placement in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdState {
    Empty,
    Loading,
    Loaded,
    Showing,
}

impl fmt::Display for AdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdState::Empty => write!(f, "empty"),
            AdState::Loading => write!(f, "loading"),
            AdState::Loaded => write!(f, "loaded"),
            AdState::Showing => write!(f, "showing"),
        }
    }
}
