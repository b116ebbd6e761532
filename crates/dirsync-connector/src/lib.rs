//! # Directory Connector Framework
//!
//! Core abstractions for talking to the directory services dirsync reads
//! from and writes to.
//!
//! ## Architecture
//!
//! The framework uses small capability traits so the sync engine never
//! depends on a concrete protocol client:
//!
//! - [`Connector`] - Base trait every directory client implements
//! - [`SourceDirectory`] - Full-snapshot search of the observed directory
//! - [`TargetDirectory`] - Single-entry lookup and attribute replacement
//!
//! ## Example
//!
//! ```ignore
//! use dirsync_connector::prelude::*;
//!
//! let entries = source.search_entries(&Filter::raw("(mail=*)")).await?;
//! if let Some(existing) = target.find_one(&Filter::eq("mail", "alice@x.com")).await? {
//!     target
//!         .replace_attribute(existing.dn(), "userPassword", vec!["{SSHA}...".into()])
//!         .await?;
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`entry`] - `DirectoryEntry` and `AttributeValue`
//! - [`filter`] - Search filters rendered as RFC 4515 strings
//! - [`error`] - Error types with transient/permanent classification
//! - [`traits`] - Directory capability traits

pub mod entry;
pub mod error;
pub mod filter;
pub mod traits;

/// Prelude module for convenient imports.
///
/// ```
/// use dirsync_connector::prelude::*;
/// ```
pub mod prelude {
    pub use crate::entry::{AttributeValue, DirectoryEntry};
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::filter::Filter;
    pub use crate::traits::{Connector, SourceDirectory, TargetDirectory};
}

// Re-export async_trait for connector implementors
pub use async_trait::async_trait;
