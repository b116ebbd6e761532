//! Salted SHA-1 (`{SSHA}`) password digests.
//!
//! The format stored in LDAP `userPassword` attributes:
//! `{SSHA}` followed by base64(SHA-1(password || salt) || salt).

use base64::Engine as _;
use rand::{rngs::OsRng, RngCore};
use sha1::{Digest, Sha1};

use crate::error::AuthError;

/// Scheme tag prefixed to every digest.
pub const SSHA_PREFIX: &str = "{SSHA}";

/// SHA-1 digests are 20 bytes long; the salt follows them.
const SHA1_DIGEST_LEN: usize = 20;

/// Random bytes drawn for a generated salt.
const GENERATED_SALT_BYTES: usize = 32;

/// Hash a password into an `{SSHA}` digest.
///
/// When `salt` is `None`, 32 random bytes are drawn from the OS RNG and their
/// base64 text is used as the salt bytes.
///
/// # Example
///
/// ```rust
/// use dirsync_auth::ssha_hash;
///
/// let digest = ssha_hash("secret", Some(b"salt"));
/// assert_eq!(digest, "{SSHA}gVK8WC9YyFT1gMsQHTGCgT3sSv5zYWx0");
/// ```
#[must_use]
pub fn ssha_hash(password: &str, salt: Option<&[u8]>) -> String {
    match salt {
        Some(salt) => digest_with_salt(password, salt),
        None => {
            let mut random_bytes = [0u8; GENERATED_SALT_BYTES];
            OsRng.fill_bytes(&mut random_bytes);
            let salt = base64::engine::general_purpose::STANDARD.encode(random_bytes);
            digest_with_salt(password, salt.as_bytes())
        }
    }
}

/// Verify a password against an `{SSHA}` digest.
///
/// # Errors
///
/// Returns `AuthError::InvalidHashFormat` if the digest lacks the `{SSHA}`
/// tag, is not valid base64, or is too short to contain a SHA-1 digest.
pub fn ssha_verify(password: &str, digest: &str) -> Result<bool, AuthError> {
    let encoded = digest
        .strip_prefix(SSHA_PREFIX)
        .ok_or(AuthError::InvalidHashFormat)?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| AuthError::InvalidHashFormat)?;

    if decoded.len() < SHA1_DIGEST_LEN {
        return Err(AuthError::InvalidHashFormat);
    }

    let salt = &decoded[SHA1_DIGEST_LEN..];
    Ok(digest_with_salt(password, salt) == digest)
}

fn digest_with_salt(password: &str, salt: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    let hash = hasher.finalize();

    let mut payload = Vec::with_capacity(hash.len() + salt.len());
    payload.extend_from_slice(&hash);
    payload.extend_from_slice(salt);

    format!(
        "{SSHA_PREFIX}{}",
        base64::engine::general_purpose::STANDARD.encode(payload)
    )
}
