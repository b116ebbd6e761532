//! Directory connector traits
//!
//! Capability-based trait definitions. The sync engine only ever holds
//! `Arc<dyn SourceDirectory>` / `Arc<dyn TargetDirectory>` handles.

use async_trait::async_trait;

use crate::entry::DirectoryEntry;
use crate::error::ConnectorResult;
use crate::filter::Filter;

/// Base trait for all directory clients.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Get the display name for this connector instance.
    fn display_name(&self) -> &str;

    /// Bind to the directory and verify the configured base is reachable.
    ///
    /// Returns `Ok(())` if the connection is usable, or an error describing
    /// what went wrong.
    async fn test_connection(&self) -> ConnectorResult<()>;

    /// Release the connection (unbind).
    ///
    /// Implementations must refuse further operations after disposal.
    async fn dispose(&self) -> ConnectorResult<()>;
}

/// Capability for reading full snapshots from the observed directory.
#[async_trait]
pub trait SourceDirectory: Connector {
    /// Return every entry under the configured base matching `filter`.
    async fn search_entries(&self, filter: &Filter) -> ConnectorResult<Vec<DirectoryEntry>>;
}

/// Capability for reconciling entries in the target directory.
#[async_trait]
pub trait TargetDirectory: Connector {
    /// Return the first entry matching `filter`, if any.
    async fn find_one(&self, filter: &Filter) -> ConnectorResult<Option<DirectoryEntry>>;

    /// Replace all values of a single attribute on the entry at `dn`.
    ///
    /// An empty `values` list removes the attribute.
    async fn replace_attribute(
        &self,
        dn: &str,
        attribute: &str,
        values: Vec<String>,
    ) -> ConnectorResult<()>;
}
