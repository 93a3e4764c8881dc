//! Error types for adslot.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Construction and configuration errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing component: {0}")]
    MissingComponent(&'static str),

    #[error("No tokio runtime available; build the cache inside a runtime or pass a handle")]
    NoRuntime,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Decoded reason for a numeric provider error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Internal,
    InvalidRequest,
    Network,
    NoFill,
    Unknown(i32),
}

impl ProviderErrorKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Internal,
            1 => Self::InvalidRequest,
            2 => Self::Network,
            3 => Self::NoFill,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => write!(f, "internal error"),
            Self::InvalidRequest => write!(f, "invalid request"),
            Self::Network => write!(f, "network error"),
            Self::NoFill => write!(f, "no fill"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Raw error reported by an ad provider.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i32,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ProviderErrorKind {
        ProviderErrorKind::from_code(self.code)
    }
}

/// Failure reasons reported through the notification sink.
///
/// Every variant except [`AdError::AlreadyLoading`] is terminal for the
/// affected cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdError {
    #[error("Invalid placement: placement id must not be empty")]
    InvalidPlacement,

    #[error("Ad is already loading")]
    AlreadyLoading,

    #[error("Load timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("Load failed: {reason} (code {code}): {message}")]
    ProviderLoad {
        reason: ProviderErrorKind,
        code: i32,
        message: String,
    },

    #[error("No loaded ad found for placement")]
    NotFound,

    #[error("Cached ad cannot be shown")]
    CannotShow,

    #[error("Show failed: {reason} (code {code}): {message}")]
    ProviderShow {
        reason: ProviderErrorKind,
        code: i32,
        message: String,
    },

    #[error("Provider call raised: {message}")]
    HostException { message: String },
}

impl AdError {
    pub fn provider_load(err: ProviderError) -> Self {
        Self::ProviderLoad {
            reason: err.kind(),
            code: err.code,
            message: err.message,
        }
    }

    pub fn provider_show(err: ProviderError) -> Self {
        Self::ProviderShow {
            reason: err.kind(),
            code: err.code,
            message: err.message,
        }
    }
}
