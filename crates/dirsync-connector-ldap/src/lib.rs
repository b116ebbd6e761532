//! # LDAP Directory Client
//!
//! `ldap3`-backed implementation of the dirsync directory traits. One
//! [`LdapDirectory`] serves as the observed source directory, another as the
//! reconciliation target.
//!
//! ## Example
//!
//! ```ignore
//! use dirsync_connector_ldap::{LdapConfig, LdapDirectory};
//!
//! let config = LdapConfig::new("ldap.example.com", "dc=example,dc=com", "cn=admin,dc=example,dc=com")
//!     .with_password("secret")
//!     .with_ssl();
//!
//! let directory = LdapDirectory::new(config)?;
//! directory.test_connection().await?;
//! ```

pub mod config;
pub mod connector;

pub use config::LdapConfig;
pub use connector::LdapDirectory;
