//! Directory-backed object store with SSE-C semantics.
//!
//! Each bucket is a directory under the root and each object a file in
//! the versioned format from [`crate::format`]. SSE-C objects are sealed
//! under the customer key; only the key's MD5 is stored, and a GET must
//! present the same key to read them back.

use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

use super::{
    GetObjectOptions, ObjectClient, ObjectReader, check_bucket_name, check_object_name,
};
use crate::crypto::{self, SseCustomer, derive_key};
use crate::error::ObjectError;
use crate::format::{self, Encryption, ObjectFile};
use crate::storage::AtomicFile;

#[derive(Clone, Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates `bucket` if it does not exist yet.
    pub fn make_bucket(&self, bucket: &str) -> Result<()> {
        check_bucket_name(bucket)?;
        std::fs::create_dir_all(self.root.join(bucket))
            .with_context(|| format!("failed to create bucket '{bucket}'"))?;
        Ok(())
    }

    pub fn bucket_exists(&self, bucket: &str) -> bool {
        check_bucket_name(bucket).is_ok() && self.root.join(bucket).is_dir()
    }

    /// Stores `data` as `bucket/object`, sealed under `sse` when given.
    pub fn put_object(
        &self,
        bucket: &str,
        object: &str,
        data: &[u8],
        sse: Option<&SseCustomer>,
    ) -> Result<()> {
        let path = self.object_path(bucket, object)?;
        if !self.bucket_exists(bucket) {
            return Err(ObjectError::NoSuchBucket(bucket.to_string()).into());
        }

        let file = match sse {
            None => ObjectFile::new(Encryption::None, data.to_vec()),
            Some(sse) => {
                let (ciphertext, nonce) = crypto::seal(sse.key(), data)?;
                ObjectFile::new(
                    Encryption::Customer {
                        key_md5: sse.key_md5(),
                        nonce,
                    },
                    ciphertext,
                )
            }
        };

        AtomicFile::new(path).save(&format::serialize(&file)?)?;
        info!("stored {bucket}/{object} ({} bytes)", data.len());
        Ok(())
    }

    /// Stores `data` sealed under the key derived from `password`.
    ///
    /// The counterpart of
    /// [`EncryptedObjects::get_encrypted_object`](crate::EncryptedObjects::get_encrypted_object).
    pub fn put_encrypted_object(
        &self,
        bucket: &str,
        object: &str,
        data: &[u8],
        password: &str,
    ) -> Result<()> {
        let key = derive_key(password, bucket, object);
        let sse = SseCustomer::new(&key[..])?;
        self.put_object(bucket, object, data, Some(&sse))
    }

    fn object_path(&self, bucket: &str, object: &str) -> Result<PathBuf> {
        check_bucket_name(bucket)?;
        check_object_name(object)?;

        let relative = Path::new(object);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !plain || object.ends_with('/') || object.contains("//") {
            return Err(ObjectError::InvalidRequest(format!(
                "object name '{object}' is not supported by the local store"
            ))
            .into());
        }

        Ok(self.root.join(bucket).join(relative))
    }
}

impl ObjectClient for LocalStore {
    /// Objects never leave the process, so the key is never on a wire.
    fn is_secure(&self) -> bool {
        true
    }

    fn get_object(
        &self,
        bucket: &str,
        object: &str,
        opts: GetObjectOptions,
    ) -> Result<ObjectReader> {
        let path = self.object_path(bucket, object)?;
        // same transport check as a networked client
        opts.headers(self.is_secure())?;

        if !self.bucket_exists(bucket) {
            return Err(ObjectError::NoSuchBucket(bucket.to_string()).into());
        }

        let data = match AtomicFile::new(path).load() {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ObjectError::NoSuchKey {
                    bucket: bucket.to_string(),
                    object: object.to_string(),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };
        let stored = format::parse(&data)
            .with_context(|| format!("object {bucket}/{object} is corrupted"))?;

        debug!("serving {bucket}/{object}");
        match (stored.encryption(), &opts.server_side_encryption) {
            (Encryption::None, None) => Ok(Box::new(Cursor::new(stored.body().to_vec()))),
            (Encryption::None, Some(_)) => Err(ObjectError::InvalidRequest(
                "the object was not stored with SSE-C; the request must not carry a key"
                    .to_string(),
            )
            .into()),
            (Encryption::Customer { .. }, None) => Err(ObjectError::InvalidRequest(
                "the object was stored with SSE-C; the request must carry the customer key"
                    .to_string(),
            )
            .into()),
            (Encryption::Customer { key_md5, nonce }, Some(sse)) => {
                if sse.key_md5() != *key_md5 {
                    return Err(ObjectError::AccessDenied {
                        bucket: bucket.to_string(),
                        object: object.to_string(),
                    }
                    .into());
                }
                let plaintext = crypto::open(sse.key(), nonce, stored.body())?;
                Ok(Box::new(Cursor::new(plaintext)))
            }
        }
    }
}
