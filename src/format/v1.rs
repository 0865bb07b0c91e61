//! Object format v1.
//!
//! ```text
//! MAGIC (4) | VERSION (1) | MODE (1) | [KEY_MD5 (16) | NONCE (24)] | BODY
//! ```
//!
//! MODE is 0 for plain objects and 1 for SSE-C objects; the bracketed
//! fields are only present for SSE-C.

use super::{Encryption, MAGIC, ObjectFile};
use crate::{
    crypto::{KEY_MD5_LEN, NONCE_LEN},
    format::{MAGIC_LEN, VER_LEN},
};
use anyhow::{Result, bail};

/// Current file format version.
pub const VERSION_V1: u8 = 1;

const MODE_LEN: usize = 1;
const MODE_PLAIN: u8 = 0;
const MODE_SSE_C: u8 = 1;

const PLAIN_HEADER_LEN: usize = MAGIC_LEN + VER_LEN + MODE_LEN;
const SSE_C_HEADER_LEN: usize = PLAIN_HEADER_LEN + KEY_MD5_LEN + NONCE_LEN;

/// Parses a v1 object file.
///
/// # Errors
///
/// Returns an error if the file is too short or has an unknown mode.
pub(crate) fn parse(data: &[u8]) -> Result<ObjectFile> {
    if data.len() < PLAIN_HEADER_LEN {
        bail!("file too short for v1");
    }

    let mut offset = MAGIC_LEN + VER_LEN;
    let mode = data[offset];
    offset += MODE_LEN;

    let encryption = match mode {
        MODE_PLAIN => Encryption::None,
        MODE_SSE_C => {
            if data.len() < SSE_C_HEADER_LEN {
                bail!("file too short for v1 SSE-C object");
            }

            let key_md5: [u8; KEY_MD5_LEN] = data[offset..offset + KEY_MD5_LEN].try_into()?;
            offset += KEY_MD5_LEN;

            let nonce: [u8; NONCE_LEN] = data[offset..offset + NONCE_LEN].try_into()?;
            offset += NONCE_LEN;

            Encryption::Customer { key_md5, nonce }
        }
        other => bail!("unknown object mode: {other}"),
    };

    Ok(ObjectFile::new(encryption, data[offset..].to_vec()))
}

/// Serializes an ObjectFile to v1 format bytes.
///
/// # Errors
///
/// Returns an error if the version is not v1.
pub(crate) fn serialize(file: &ObjectFile) -> Result<Vec<u8>> {
    if file.version() != VERSION_V1 {
        bail!("wrong version for v1 serializer");
    }

    let mut buf = Vec::with_capacity(SSE_C_HEADER_LEN + file.body().len());

    buf.extend_from_slice(MAGIC);
    buf.push(VERSION_V1);

    match file.encryption() {
        Encryption::None => buf.push(MODE_PLAIN),
        Encryption::Customer { key_md5, nonce } => {
            buf.push(MODE_SSE_C);
            buf.extend_from_slice(key_md5);
            buf.extend_from_slice(nonce);
        }
    }

    buf.extend_from_slice(file.body());

    Ok(buf)
}
