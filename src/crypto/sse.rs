//! Server-side encryption with a customer-provided key (SSE-C).

use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use md5::{Digest, Md5};
use zeroize::Zeroizing;

use super::{KEY_LEN, KEY_MD5_LEN};
use crate::error::SseError;

pub const SSE_CUSTOMER_ALGORITHM: &str = "AES256";

pub const SSE_CUSTOMER_ALGORITHM_HEADER: &str = "X-Amz-Server-Side-Encryption-Customer-Algorithm";
pub const SSE_CUSTOMER_KEY_HEADER: &str = "X-Amz-Server-Side-Encryption-Customer-Key";
pub const SSE_CUSTOMER_KEY_MD5_HEADER: &str = "X-Amz-Server-Side-Encryption-Customer-Key-MD5";

/// An SSE-C credential: the raw 256-bit key sent along with a request.
///
/// The key is zeroized on drop. Not `Clone`: build a new credential for
/// each request.
pub struct SseCustomer {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl SseCustomer {
    /// Wraps `key` as an SSE-C credential.
    ///
    /// # Errors
    ///
    /// Returns [`SseError::InvalidKeyLength`] unless `key` is exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, SseError> {
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| SseError::InvalidKeyLength(key.len()))?;
        Ok(Self {
            key: Zeroizing::new(key),
        })
    }

    pub(crate) fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    /// MD5 digest of the key, used by servers to check key integrity.
    pub fn key_md5(&self) -> [u8; KEY_MD5_LEN] {
        Md5::digest(self.key.as_slice()).into()
    }

    /// The three SSE-C request headers, values base64 encoded.
    ///
    /// Callers must only put these on a secure channel; use
    /// [`GetObjectOptions::headers`](crate::GetObjectOptions::headers)
    /// which enforces that.
    pub(crate) fn headers(&self) -> Vec<(&'static str, Zeroizing<String>)> {
        vec![
            (
                SSE_CUSTOMER_ALGORITHM_HEADER,
                Zeroizing::new(SSE_CUSTOMER_ALGORITHM.to_string()),
            ),
            (
                SSE_CUSTOMER_KEY_HEADER,
                Zeroizing::new(STANDARD.encode(self.key.as_slice())),
            ),
            (
                SSE_CUSTOMER_KEY_MD5_HEADER,
                Zeroizing::new(STANDARD.encode(self.key_md5())),
            ),
        ]
    }
}

impl fmt::Debug for SseCustomer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SseCustomer")
            .field("key", &"<redacted>")
            .finish()
    }
}
