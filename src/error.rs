//! Error handling for the inspector engine
//!
//! Structural and scheduler failures always surface through [`InspectError`].
//! Value-access failures start life as [`AccessError`] and are only turned into
//! an `InspectError` when the caller opted out of catching them.

use crate::reflect::AccessError;
use crate::tree::NodeId;
use thiserror::Error;

/// Main error type for inspector operations
#[derive(Error, Debug)]
pub enum InspectError {
    /// A child list was mutated while it was being enumerated
    #[error("Concurrent structural change: {0}")]
    ConcurrentStructuralChange(String),

    /// Operation is invalid for the current state of the tree or scheduler
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A routine yielded a value no awaitable adapter understands
    #[error("Unsupported awaitable: {0}")]
    UnsupportedAwaitable(String),

    /// A value access was attempted without an owner
    #[error("Missing owner: {0}")]
    MissingOwner(String),

    /// Errors raised by an accessor and not caught by the caller
    #[error("Access error: {0}")]
    Access(AccessError),

    /// Invalid argument passed by the caller
    #[error("Argument error: {0}")]
    ArgumentError(String),

    /// Node id does not refer to a live node
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<InspectError>,
    },
}

impl InspectError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        InspectError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping any context wrappers
    pub fn root(&self) -> &InspectError {
        match self {
            InspectError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<AccessError> for InspectError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::MissingOwner => {
                InspectError::MissingOwner("value has no owner".to_string())
            }
            other => InspectError::Access(other),
        }
    }
}

impl From<serde_json::Error> for InspectError {
    fn from(err: serde_json::Error) -> Self {
        InspectError::Serialization(err.to_string())
    }
}

/// Result type alias for inspector operations
pub type Result<T> = std::result::Result<T, InspectError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, AccessError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| InspectError::from(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| InspectError::from(e).with_context(f()))
    }
}
