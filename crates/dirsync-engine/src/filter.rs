//! Entry filtering applied to every raw search result.
//!
//! Ignored users and, optionally, entries without a password never take
//! part in change detection.

use regex::Regex;
use std::sync::LazyLock;

use dirsync_connector::entry::DirectoryEntry;

/// Mailbox address shape accepted for ignore tokens and reconciliation.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,6}$")
        .expect("EMAIL_REGEX is a valid regex pattern")
});

/// Default attribute whose presence marks an entry as having a password.
pub const DEFAULT_PASSWORD_ATTRIBUTE: &str = "userPassword";

/// Check whether `value` looks like a mailbox address.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

/// Set of tokens whose appearance anywhere in an entry excludes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    tokens: Vec<String>,
}

impl IgnoreList {
    /// Build from explicit tokens.
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a comma-separated list of e-mail addresses.
    ///
    /// Tokens are trimmed; anything that is not an e-mail address is dropped.
    pub fn parse(csv: &str) -> Self {
        Self::new(
            csv.split(',')
                .map(str::trim)
                .filter(|token| is_valid_email(token)),
        )
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    fn matches(&self, serialized: &str) -> bool {
        self.tokens
            .iter()
            .any(|token| serialized.contains(token.as_str()))
    }
}

/// Drops ignored and (optionally) password-less entries.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    ignore_list: IgnoreList,
    require_password: bool,
    password_marker: String,
}

impl Default for EntryFilter {
    fn default() -> Self {
        Self::new(IgnoreList::default(), false)
    }
}

impl EntryFilter {
    pub fn new(ignore_list: IgnoreList, require_password: bool) -> Self {
        Self {
            ignore_list,
            require_password,
            password_marker: DEFAULT_PASSWORD_ATTRIBUTE.to_string(),
        }
    }

    /// Use a different marker for the password requirement.
    #[must_use]
    pub fn with_password_marker(mut self, marker: impl Into<String>) -> Self {
        self.password_marker = marker.into();
        self
    }

    /// Decide whether a single entry takes part in change detection.
    ///
    /// Ignore tokens are checked before the password requirement.
    pub fn keeps(&self, entry: &DirectoryEntry) -> bool {
        let serialized = entry.serialized();

        if self.ignore_list.matches(&serialized) {
            return false;
        }

        !self.require_password || serialized.contains(self.password_marker.as_str())
    }

    /// Filter a search result, preserving order.
    pub fn apply(&self, entries: Vec<DirectoryEntry>) -> Vec<DirectoryEntry> {
        entries.into_iter().filter(|e| self.keeps(e)).collect()
    }
}
