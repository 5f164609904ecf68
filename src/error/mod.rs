//! Unified error handling for the workspace core
//!
//! Every failure in the core propagates to the immediate caller as a
//! [`WorkfoldError`]; nothing is swallowed. Controllers translate these
//! variants into response codes.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum WorkfoldError {
    /// A referenced module, workspace, or other subscribable entity does
    /// not exist. Never retried.
    #[error("{kind} not found: {reference}")]
    NotFound { kind: &'static str, reference: String },

    /// The dependency graph contains a cycle reachable from the traversal
    /// root. The path lists the identifiers walked up to and including the
    /// repeated one.
    #[error("cyclic module dependency: {}", path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    /// A subscription lifecycle callback targets a module that is not
    /// registered in the running application.
    #[error("module not registered in application: {0}")]
    ModuleNotRegistered(String),

    /// A hook contributor failed; the whole dispatch fails with it.
    #[error("hook contributor failed for '{hook}': {message}")]
    HookContributor { hook: String, message: String },

    /// Malformed input at a collaborator boundary.
    #[error("validation error: {0}")]
    Validation(String),

    /// Underlying document store failure.
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    /// Record (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl WorkfoldError {
    /// Shorthand for the common not-found case.
    pub fn not_found(kind: &'static str, reference: impl Into<String>) -> Self {
        WorkfoldError::NotFound {
            kind,
            reference: reference.into(),
        }
    }
}

/// Result type for core operations.
pub type WorkfoldResult<T> = Result<T, WorkfoldError>;
