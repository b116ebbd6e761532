//! Engine error types.

use thiserror::Error;

use dirsync_connector::error::ConnectorError;

use crate::classify::ChangeKind;
use crate::provision::ProvisioningError;

/// Errors raised by the poll loop and its collaborators.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Source directory search failed; the cycle is skipped and retried.
    #[error("Directory search failed: {0}")]
    DirectorySearch(#[source] ConnectorError),

    /// Persisted state could not be read or written.
    #[error("State store error: {message}")]
    StateStore {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A persisted snapshot could not be decoded.
    #[error("Snapshot decode error: {message}")]
    Snapshot { message: String },

    /// A change could not be handed to a handler.
    #[error("Dispatch error for {kind}: {message}")]
    Dispatch { kind: ChangeKind, message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl SyncError {
    /// Create a state store error.
    pub fn state_store(message: impl Into<String>) -> Self {
        Self::StateStore {
            message: message.into(),
            source: None,
        }
    }

    /// Create a state store error with source.
    pub fn state_store_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::StateStore {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a snapshot error.
    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot {
            message: message.into(),
        }
    }

    /// Create a dispatch error.
    pub fn dispatch(kind: ChangeKind, message: impl Into<String>) -> Self {
        Self::Dispatch {
            kind,
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Per-entry failure inside a reconciliation handler.
///
/// Handlers log these and move on; they never reach the poll loop.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// Target lookup failed.
    #[error("lookup of {filter} failed: {source}")]
    LookupFailed {
        filter: String,
        #[source]
        source: ConnectorError,
    },

    /// Attribute replacement failed.
    #[error("replacing {attribute} on {dn} failed: {source}")]
    ReplaceFailed {
        dn: String,
        attribute: String,
        #[source]
        source: ConnectorError,
    },

    /// Provisioning executor failed for a domain.
    #[error("provisioning for domain {domain} failed: {source}")]
    Provisioning {
        domain: String,
        #[source]
        source: ProvisioningError,
    },
}
