//! Engine Error Types
//!
//! Every component returns `EngineError`. Fetch-layer failures are recovered
//! inside the component that owns them (retry, then fallback); only geometry
//! validation errors and unrecoverable stage failures reach the orchestrator,
//! which wraps them into a single `BoreholeSiteFailure`.

use thiserror::Error;

/// Errors raised by the scoring and recharge-analysis engine.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Data unavailable from {provider}: {cause}")]
    DataUnavailable { provider: String, cause: String },

    #[error("Computation error in {stage}: {message}")]
    ComputationError { stage: String, message: String },

    #[error("Timeout after {after_ms}ms waiting for {provider}")]
    Timeout { provider: String, after_ms: u64 },

    #[error("Cache error: {0}")]
    CacheError(String),
}

impl EngineError {
    pub fn data_unavailable(provider: impl Into<String>, cause: impl ToString) -> Self {
        Self::DataUnavailable {
            provider: provider.into(),
            cause: cause.to_string(),
        }
    }

    pub fn computation(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ComputationError {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Timeouts and upstream outages may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::DataUnavailable { .. })
    }

    /// Whether the failure originated in the network/transport layer.
    pub fn is_network(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::DataUnavailable { cause, .. } => {
                let cause = cause.to_lowercase();
                cause.contains("network")
                    || cause.contains("connect")
                    || cause.contains("dns")
                    || cause.contains("status")
            }
            _ => false,
        }
    }

    /// Name of the upstream source or stage the error is attributed to.
    pub fn origin(&self) -> &str {
        match self {
            Self::DataUnavailable { provider, .. } | Self::Timeout { provider, .. } => provider,
            Self::ComputationError { stage, .. } => stage,
            Self::InvalidGeometry(_) => "geometry",
            Self::CacheError(_) => "cache",
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        let provider = e
            .url()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "http".to_string());
        if e.is_timeout() {
            return Self::Timeout {
                provider,
                after_ms: 0,
            };
        }
        let kind = if e.is_connect() {
            "network connect failure"
        } else if e.is_status() {
            "bad status"
        } else if e.is_decode() {
            "malformed response"
        } else {
            "network request failure"
        };
        Self::DataUnavailable {
            provider,
            cause: format!("{kind}: {e}"),
        }
    }
}

/// The single fatal error surfaced by `BoreholeSiteAnalyzer::analyze`.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Borehole site analysis failed: {message}")]
pub struct BoreholeSiteFailure {
    pub message: String,
    #[source]
    pub cause: EngineError,
}

impl BoreholeSiteFailure {
    pub fn new(message: impl Into<String>, cause: EngineError) -> Self {
        Self {
            message: message.into(),
            cause,
        }
    }
}

impl From<EngineError> for BoreholeSiteFailure {
    fn from(cause: EngineError) -> Self {
        Self {
            message: cause.to_string(),
            cause,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
