//! On-disk format of objects held by the local store.
//!
//! Provides version-aware parsing and serialization of stored objects.

use anyhow::{Result, bail};

use crate::crypto::{KEY_MD5_LEN, NONCE_LEN};

pub mod v1;

/// Magic bytes identifying a stored object ("SSEC").
pub const MAGIC: &[u8; 4] = b"SSEC";
/// Length of magic bytes.
pub const MAGIC_LEN: usize = 4;
/// Length of version field.
pub const VER_LEN: usize = 1;
/// Latest format version
pub const CURRENT_VERSION: u8 = v1::VERSION_V1;

/// How the body of a stored object is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Encryption {
    None,
    /// Sealed under a customer key. Only the key's MD5 is kept.
    Customer {
        key_md5: [u8; KEY_MD5_LEN],
        nonce: [u8; NONCE_LEN],
    },
}

/// A parsed object file: version, encryption metadata and body.
pub(crate) struct ObjectFile {
    version: u8,
    encryption: Encryption,
    body: Vec<u8>,
}

impl ObjectFile {
    /// Creates a new ObjectFile at the current format version.
    pub fn new(encryption: Encryption, body: Vec<u8>) -> Self {
        Self {
            version: CURRENT_VERSION,
            encryption,
            body,
        }
    }

    /// Returns the file format version.
    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn encryption(&self) -> &Encryption {
        &self.encryption
    }

    /// Returns the body, ciphertext for SSE-C objects.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Parses a stored object.
///
/// Automatically dispatches to the appropriate version parser.
///
/// # Errors
///
/// Returns an error if:
/// - The file is too short
/// - The magic bytes are invalid
/// - The version is unsupported
pub(crate) fn parse(data: &[u8]) -> Result<ObjectFile> {
    if data.len() < MAGIC_LEN + VER_LEN {
        bail!("file too short");
    }

    if &data[..MAGIC_LEN] != MAGIC {
        bail!("invalid magic");
    }

    let version = data[MAGIC_LEN];

    match version {
        1 => v1::parse(data),
        _ => bail!("unsupported version"),
    }
}

/// Serializes an ObjectFile to bytes.
///
/// # Errors
///
/// Returns an error if the version is unsupported.
pub(crate) fn serialize(file: &ObjectFile) -> Result<Vec<u8>> {
    match file.version() {
        1 => v1::serialize(file),
        _ => bail!("unsupported version"),
    }
}
