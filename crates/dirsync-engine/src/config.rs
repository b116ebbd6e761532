//! Engine configuration.

use std::sync::Arc;
use std::time::Duration;

use dirsync_connector::filter::Filter;
use dirsync_connector::traits::TargetDirectory;

use crate::classify::ClassificationMode;
use crate::diff::ObservableAttributes;
use crate::error::{SyncError, SyncResult};
use crate::filter::{EntryFilter, IgnoreList, DEFAULT_PASSWORD_ATTRIBUTE};
use crate::handlers::{EmailAttributes, HandlerContext};

/// Source search filter matching any entry with a mail-like attribute.
pub const DEFAULT_SEARCH_FILTER: &str =
    "(|(mail=*)(email=*)(mailPrimaryAddress=*)(userPrincipalName=*))";

/// Default wait between cycles.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default wait after a failed search or state access.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Settings for the poll loop and its handlers.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Filter for the full-snapshot source search.
    pub search_filter: Filter,
    /// Users excluded from change detection.
    pub ignore_list: IgnoreList,
    /// Only entries carrying a password take part in change detection.
    pub require_password: bool,
    /// Password attribute, in the source and in the target.
    pub password_attribute: String,
    /// Attributes whose changes are propagated by the update handler.
    pub observable_attributes: ObservableAttributes,
    /// Attributes an e-mail address is read from.
    pub email_attributes: EmailAttributes,
    /// How changed snapshots become dispatches.
    pub classification: ClassificationMode,
    /// Wait between cycles.
    pub poll_interval: Duration,
    /// Wait after a failed cycle.
    pub retry_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            search_filter: Filter::raw(DEFAULT_SEARCH_FILTER),
            ignore_list: IgnoreList::default(),
            require_password: false,
            password_attribute: DEFAULT_PASSWORD_ATTRIBUTE.to_string(),
            observable_attributes: ObservableAttributes::default(),
            email_attributes: EmailAttributes::default(),
            classification: ClassificationMode::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

impl SyncConfig {
    /// Reject settings the poll loop cannot run with.
    pub fn validate(&self) -> SyncResult<()> {
        if self.search_filter.to_ldap().is_empty() {
            return Err(SyncError::configuration("search filter is empty"));
        }
        if self.password_attribute.trim().is_empty() {
            return Err(SyncError::configuration("password attribute is empty"));
        }
        if self.email_attributes.names().is_empty() {
            return Err(SyncError::configuration("no e-mail attributes configured"));
        }
        if self.poll_interval.is_zero() || self.retry_interval.is_zero() {
            return Err(SyncError::configuration("intervals must be positive"));
        }
        Ok(())
    }

    /// The entry filter these settings describe.
    pub fn entry_filter(&self) -> EntryFilter {
        EntryFilter::new(self.ignore_list.clone(), self.require_password)
            .with_password_marker(self.password_attribute.clone())
    }

    /// Handler context for `target` using these settings.
    pub fn handler_context(&self, target: Arc<dyn TargetDirectory>) -> HandlerContext {
        HandlerContext::new(target)
            .with_email_attributes(self.email_attributes.clone())
            .with_password_attribute(self.password_attribute.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.search_filter.to_ldap(), DEFAULT_SEARCH_FILTER);
        assert_eq!(config.classification, ClassificationMode::Cardinality);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let config = SyncConfig {
            poll_interval: Duration::ZERO,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            search_filter: Filter::raw("   "),
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            email_attributes: EmailAttributes::parse(""),
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_entry_filter_uses_password_attribute() {
        use dirsync_connector::entry::DirectoryEntry;

        let config = SyncConfig {
            require_password: true,
            password_attribute: "unicodePwd".to_string(),
            ..SyncConfig::default()
        };
        let filter = config.entry_filter();

        let with = DirectoryEntry::new("uid=a,dc=x").with("unicodePwd", "x");
        let without = DirectoryEntry::new("uid=b,dc=x").with("userPassword", "x");
        assert!(filter.keeps(&with));
        assert!(!filter.keeps(&without));
    }
}
