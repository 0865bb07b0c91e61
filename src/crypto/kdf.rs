//! Password-based derivation of per-object SSE-C keys.
//!
//! The key for an object is `scrypt(password, bucket ++ object)` with the
//! cost parameters below. Objects written with a given (password, bucket,
//! object) triple can only be read back by reproducing exactly the same
//! derivation, so the parameters and the salt layout are pinned.
//!
//! The salt is the bucket name immediately followed by the object name,
//! with no separator. `("ab", "c")` and `("a", "bc")` therefore share the
//! salt `"abc"` and derive the same key for the same password. Changing
//! the layout would change the key of every object already stored.

use std::panic;

use log::debug;
use zeroize::Zeroizing;

use super::KEY_LEN;
use crate::error::KdfFault;

/// scrypt CPU/memory cost as a power of two: N = 2^15 = 32768.
///
/// Version-pinned. A different cost must be introduced as a new
/// derivation version, never by editing this value.
pub const SCRYPT_LOG_N: u8 = 15;
/// scrypt block size. Version-pinned.
pub const SCRYPT_R: u32 = 8;
/// scrypt parallelization. Version-pinned.
pub const SCRYPT_P: u32 = 1;

/// Builds the KDF salt for an object.
pub fn salt(bucket: &str, object: &str) -> Vec<u8> {
    let mut salt = Vec::with_capacity(bucket.len() + object.len());
    salt.extend_from_slice(bucket.as_bytes());
    salt.extend_from_slice(object.as_bytes());
    salt
}

/// Derives the 32-byte SSE-C key for `bucket/object` from `password`.
///
/// The password is not validated; an empty password still yields a key.
///
/// # Panics
///
/// Panics with a [`KdfFault`] payload if scrypt rejects the pinned
/// parameters. That can only happen with a broken scrypt build.
pub fn derive_key(password: &str, bucket: &str, object: &str) -> Zeroizing<[u8; KEY_LEN]> {
    debug!("deriving SSE-C key for {bucket}/{object}");
    derive_with(
        password.as_bytes(),
        &salt(bucket, object),
        SCRYPT_LOG_N,
        SCRYPT_R,
        SCRYPT_P,
    )
}

fn derive_with(
    password: &[u8],
    salt: &[u8],
    log_n: u8,
    r: u32,
    p: u32,
) -> Zeroizing<[u8; KEY_LEN]> {
    let params = match scrypt::Params::new(log_n, r, p, KEY_LEN) {
        Ok(params) => params,
        Err(e) => panic::panic_any(KdfFault::new(e.to_string())),
    };

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    if let Err(e) = scrypt::scrypt(password, salt, &params, &mut key[..]) {
        panic::panic_any(KdfFault::new(e.to_string()));
    }
    key
}
