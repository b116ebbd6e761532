//! Reconciliation handlers.
//!
//! One handler per [`ChangeKind`](crate::classify::ChangeKind). Handlers
//! resolve source entries to target entries by e-mail address, log every
//! per-entry failure, and always complete their cycle.

pub mod create;
pub mod delete;
pub mod update;

use std::sync::Arc;
use tracing::debug;

use dirsync_connector::entry::DirectoryEntry;
use dirsync_connector::filter::Filter;
use dirsync_connector::traits::TargetDirectory;

use crate::error::ReconciliationError;
use crate::filter::{is_valid_email, DEFAULT_PASSWORD_ATTRIBUTE};

pub use create::CreateHandler;
pub use delete::DeleteHandler;
pub use update::UpdateHandler;

/// Attributes scanned for an e-mail address, highest priority first.
pub const DEFAULT_EMAIL_ATTRIBUTES: &[&str] =
    &["mail", "email", "mailPrimaryAddress", "userPrincipalName"];

/// Target attribute holding a mailbox address.
const TARGET_MAIL_ATTRIBUTE: &str = "mail";

/// Target attribute naming a hosted domain.
const TARGET_DOMAIN_ATTRIBUTE: &str = "domainName";

/// A mailbox address split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailIdentity {
    pub email: String,
    pub username: String,
    pub domain: String,
}

impl EmailIdentity {
    /// Split a valid address; anything else yields `None`.
    pub fn parse(email: &str) -> Option<Self> {
        if !is_valid_email(email) {
            return None;
        }
        let (username, domain) = email.split_once('@')?;
        Some(Self {
            email: email.to_string(),
            username: username.to_string(),
            domain: domain.to_string(),
        })
    }
}

/// Priority list of attributes an e-mail address is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttributes {
    names: Vec<String>,
}

impl Default for EmailAttributes {
    fn default() -> Self {
        Self::new(DEFAULT_EMAIL_ATTRIBUTES.iter().copied())
    }
}

impl EmailAttributes {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated list; blank items are skipped.
    pub fn parse(csv: &str) -> Self {
        Self::new(csv.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The identity from the first listed attribute holding a valid address.
    ///
    /// Multi-valued attributes contribute their first value.
    pub fn identify(&self, entry: &DirectoryEntry) -> Option<EmailIdentity> {
        self.names
            .iter()
            .filter_map(|name| entry.get_first(name))
            .find_map(EmailIdentity::parse)
    }
}

/// Outcome counters for one handler invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    /// Target attributes written.
    pub updated: usize,
    /// Accounts handed to the provisioning executor successfully.
    pub provisioned: usize,
    /// Records skipped (no address, unknown domain, not in target, no password).
    pub skipped: usize,
    /// Records or attributes that failed.
    pub failed: usize,
}

/// Target directory access shared by all handlers.
#[derive(Clone)]
pub struct HandlerContext {
    target: Arc<dyn TargetDirectory>,
    email_attributes: EmailAttributes,
    password_attribute: String,
}

impl HandlerContext {
    pub fn new(target: Arc<dyn TargetDirectory>) -> Self {
        Self {
            target,
            email_attributes: EmailAttributes::default(),
            password_attribute: DEFAULT_PASSWORD_ATTRIBUTE.to_string(),
        }
    }

    #[must_use]
    pub fn with_email_attributes(mut self, attributes: EmailAttributes) -> Self {
        self.email_attributes = attributes;
        self
    }

    #[must_use]
    pub fn with_password_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.password_attribute = attribute.into();
        self
    }

    pub fn password_attribute(&self) -> &str {
        &self.password_attribute
    }

    pub(crate) fn identify(&self, entry: &DirectoryEntry) -> Option<EmailIdentity> {
        self.email_attributes.identify(entry)
    }

    /// Target entry owning `email`, if any.
    pub(crate) async fn find_by_mail(
        &self,
        email: &str,
    ) -> Result<Option<DirectoryEntry>, ReconciliationError> {
        self.find(Filter::eq(TARGET_MAIL_ATTRIBUTE, email)).await
    }

    /// Whether the target hosts `domain`.
    pub(crate) async fn domain_exists(&self, domain: &str) -> Result<bool, ReconciliationError> {
        Ok(self
            .find(Filter::eq(TARGET_DOMAIN_ATTRIBUTE, domain))
            .await?
            .is_some())
    }

    async fn find(&self, filter: Filter) -> Result<Option<DirectoryEntry>, ReconciliationError> {
        self.target
            .find_one(&filter)
            .await
            .map_err(|source| ReconciliationError::LookupFailed {
                filter: filter.to_ldap(),
                source,
            })
    }

    /// Replace one attribute on a target entry.
    pub(crate) async fn replace(
        &self,
        dn: &str,
        attribute: &str,
        values: Vec<String>,
    ) -> Result<(), ReconciliationError> {
        debug!(dn = %dn, attribute = %attribute, values = values.len(), "Replacing target attribute");
        self.target
            .replace_attribute(dn, attribute, values)
            .await
            .map_err(|source| ReconciliationError::ReplaceFailed {
                dn: dn.to_string(),
                attribute: attribute.to_string(),
                source,
            })
    }
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("target", &self.target.display_name())
            .field("email_attributes", &self.email_attributes)
            .field("password_attribute", &self.password_attribute)
            .finish()
    }
}
