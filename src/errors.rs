//! Structured error types for the recommendation engine.
//!
//! Every variant carries a machine-readable code for log scraping and
//! alerting. Most failures here are deliberately non-fatal to a
//! recommendation request: config errors keep the previous configuration,
//! cache errors degrade to recomputation, and a failing algorithm only drops
//! its own contribution.

use std::fmt;

/// Which component registry a lookup went against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Algorithm,
    Filter,
    Includer,
    Combiner,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Algorithm => "algorithm",
            Self::Filter => "filter",
            Self::Includer => "includer",
            Self::Combiner => "combiner",
        }
    }
}

/// Engine error taxonomy.
#[derive(Debug)]
pub enum EngineError {
    /// Malformed JSON or a missing required field in a pushed config payload.
    /// The previous configuration for that key is left untouched.
    ConfigParse { key: String, reason: String },

    /// A config payload referenced an algorithm/filter/includer/combiner
    /// identifier that is not registered. The update is rejected wholesale.
    UnknownComponent { kind: ComponentKind, name: String },

    /// The shared cache backend failed. Swallowed at call sites; degrades to
    /// direct computation or a stale value.
    CacheBackend(String),

    /// The backing count store cannot serve this query shape directly.
    /// Triggers a fallback to a broader query plus in-process filtering.
    UnsupportedQuery,

    /// A bulk-resource rebuild failed; the previous store keeps serving.
    LoaderIo(String),

    /// One pipeline algorithm failed; its contribution is dropped.
    AlgorithmFailed { name: String, reason: String },

    /// A waiter on an in-flight cache recompute timed out with no cached
    /// value to fall back on.
    RefreshTimeout { key: String },

    /// A cache recompute failed and no cached value exists.
    RefreshFailed { key: String, reason: String },

    /// Wrapper for unexpected internal errors.
    Internal(anyhow::Error),
}

impl EngineError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } => "CONFIG_PARSE",
            Self::UnknownComponent { .. } => "UNKNOWN_COMPONENT",
            Self::CacheBackend(_) => "CACHE_BACKEND",
            Self::UnsupportedQuery => "UNSUPPORTED_QUERY",
            Self::LoaderIo(_) => "LOADER_IO",
            Self::AlgorithmFailed { .. } => "ALGORITHM_FAILED",
            Self::RefreshTimeout { .. } => "REFRESH_TIMEOUT",
            Self::RefreshFailed { .. } => "REFRESH_FAILED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Detailed human-readable message.
    pub fn message(&self) -> String {
        match self {
            Self::ConfigParse { key, reason } => {
                format!("invalid config payload for key '{key}': {reason}")
            }
            Self::UnknownComponent { kind, name } => {
                format!("unknown {} '{name}'", kind.as_str())
            }
            Self::CacheBackend(msg) => format!("cache backend error: {msg}"),
            Self::UnsupportedQuery => "query shape not supported by backing store".to_string(),
            Self::LoaderIo(msg) => format!("resource load failed: {msg}"),
            Self::AlgorithmFailed { name, reason } => {
                format!("algorithm '{name}' failed: {reason}")
            }
            Self::RefreshTimeout { key } => {
                format!("timed out waiting for refresh of cache key '{key}'")
            }
            Self::RefreshFailed { key, reason } => {
                format!("refresh of cache key '{key}' failed: {reason}")
            }
            Self::Internal(err) => format!("internal error: {err}"),
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for EngineError {}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

/// Type alias for Results using EngineError.
pub type Result<T> = std::result::Result<T, EngineError>;
