//! Credential helpers for dirsync.
//!
//! - `{SSHA}` digests compatible with LDAP `userPassword` values
//! - Random secrets used to invalidate credentials of removed accounts
//!
//! # Example
//!
//! ```rust
//! use dirsync_auth::{generate_random_secret, ssha_hash, ssha_verify};
//!
//! let secret = generate_random_secret(16);
//! let digest = ssha_hash(&secret, None);
//! assert!(ssha_verify(&secret, &digest).unwrap());
//! ```

pub mod error;
pub mod secret;
pub mod ssha;

pub use error::AuthError;
pub use secret::generate_random_secret;
pub use ssha::{ssha_hash, ssha_verify, SSHA_PREFIX};
