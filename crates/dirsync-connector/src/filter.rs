//! Search filters
//!
//! Filters are rendered to RFC 4515 strings by the directory client. Values are always escaped; configured filter
//! expressions are passed through untouched via [`Filter::Raw`].

use std::fmt;

/// Filter for search operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Match objects where attribute equals value.
    Equals { attribute: String, value: String },

    /// A pre-rendered filter expression, used verbatim.
    Raw(String),
}

impl Filter {
    /// Create an equals filter.
    pub fn eq(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Wrap a configured filter expression.
    pub fn raw(expression: impl Into<String>) -> Self {
        Filter::Raw(expression.into().trim().to_string())
    }

    /// Render as an RFC 4515 filter string.
    pub fn to_ldap(&self) -> String {
        match self {
            Filter::Equals { attribute, value } => {
                format!("({}={})", attribute, escape_filter_value(value))
            }
            Filter::Raw(expression) => expression.clone(),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ldap())
    }
}

/// Escape special characters in filter values (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}
