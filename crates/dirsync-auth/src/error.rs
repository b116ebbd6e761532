//! Error types for credential operations.

use thiserror::Error;

/// Credential digest error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Stored digest is not a well-formed `{SSHA}` value.
    #[error("Invalid password hash format")]
    InvalidHashFormat,
}
