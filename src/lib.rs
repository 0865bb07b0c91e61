//! Fetch objects stored with server-side encryption under a customer key
//! (SSE-C), where the key is derived from a password.
//!
//! The key for `bucket/object` is `scrypt(password, bucket ++ object)`
//! (see [`derive_key`]). It is sent with the GET request; the server
//! rejects the request if it differs from the key the object was written
//! with. Because SSE-C puts the raw key on the wire, requests are only
//! sent over a secure channel.

mod client;
mod crypto;
mod error;
mod format;
mod storage;

use std::path::Path;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use log::debug;

pub use crate::client::http::HttpClient;
pub use crate::client::local::LocalStore;
pub use crate::client::{
    GetObjectOptions, ObjectClient, ObjectReader, check_bucket_name, check_object_name,
};
pub use crate::crypto::kdf::{SCRYPT_LOG_N, SCRYPT_P, SCRYPT_R, salt};
pub use crate::crypto::sse::{
    SSE_CUSTOMER_ALGORITHM, SSE_CUSTOMER_ALGORITHM_HEADER, SSE_CUSTOMER_KEY_HEADER,
    SSE_CUSTOMER_KEY_MD5_HEADER,
};
pub use crate::crypto::{KEY_LEN, SseCustomer, derive_key};
pub use crate::error::{KdfFault, ObjectError, SseError};
pub use crate::storage::AtomicFile;

/// Password-keyed retrieval of SSE-C objects, available on every
/// [`ObjectClient`].
///
/// Each call derives a fresh key and credential, uses them for exactly
/// one request and drops them. Errors from the client are returned as
/// they are: a wrong password typically shows up as
/// [`ObjectError::AccessDenied`], indistinguishable from other denials.
/// Nothing is retried.
///
/// # Panics
///
/// All methods panic with a [`KdfFault`] payload if the scrypt build
/// rejects the pinned parameters.
pub trait EncryptedObjects: ObjectClient {
    /// Fetches an SSE-C object as a stream.
    fn get_encrypted_object(
        &self,
        bucket: &str,
        object: &str,
        password: &str,
    ) -> Result<ObjectReader> {
        self.get_encrypted_object_with_options(
            bucket,
            object,
            password,
            GetObjectOptions::default(),
        )
    }

    /// Like [`get_encrypted_object`](Self::get_encrypted_object) with
    /// extra request options. Any credential already in `opts` is replaced.
    fn get_encrypted_object_with_options(
        &self,
        bucket: &str,
        object: &str,
        password: &str,
        opts: GetObjectOptions,
    ) -> Result<ObjectReader> {
        let key = derive_key(password, bucket, object);
        get_with_key(self, bucket, object, &key[..], opts)
    }

    /// Fetches an SSE-C object into `file_path`.
    fn fget_encrypted_object(
        &self,
        bucket: &str,
        object: &str,
        file_path: &Path,
        password: &str,
    ) -> Result<()> {
        self.fget_encrypted_object_with_options(
            bucket,
            object,
            file_path,
            password,
            GetObjectOptions::default(),
        )
    }

    /// Like [`fget_encrypted_object`](Self::fget_encrypted_object) with
    /// extra request options. Any credential already in `opts` is replaced.
    fn fget_encrypted_object_with_options(
        &self,
        bucket: &str,
        object: &str,
        file_path: &Path,
        password: &str,
        opts: GetObjectOptions,
    ) -> Result<()> {
        let key = derive_key(password, bucket, object);
        fget_with_key(self, bucket, object, file_path, &key[..], opts)
    }
}

impl<C: ObjectClient + ?Sized> EncryptedObjects for C {}

fn get_with_key<C: ObjectClient + ?Sized>(
    client: &C,
    bucket: &str,
    object: &str,
    key: &[u8],
    opts: GetObjectOptions,
) -> Result<ObjectReader> {
    let opts = bind_key(key, opts)?;
    debug!("requesting SSE-C object {bucket}/{object}");
    client.get_object(bucket, object, opts)
}

fn fget_with_key<C: ObjectClient + ?Sized>(
    client: &C,
    bucket: &str,
    object: &str,
    file_path: &Path,
    key: &[u8],
    opts: GetObjectOptions,
) -> Result<()> {
    let opts = bind_key(key, opts)?;
    debug!(
        "requesting SSE-C object {bucket}/{object} into {}",
        file_path.display()
    );
    client.fget_object(bucket, object, file_path, opts)
}

fn bind_key(key: &[u8], opts: GetObjectOptions) -> Result<GetObjectOptions, SseError> {
    let sse = SseCustomer::new(key)?;
    Ok(GetObjectOptions {
        server_side_encryption: Some(sse),
        ..opts
    })
}

/// The local store used when no endpoint is configured.
pub fn default_store() -> Result<LocalStore> {
    let project_dirs = ProjectDirs::from("", "", "ssec-fetch")
        .context("could not determine platform directories")?;

    Ok(LocalStore::new(project_dirs.data_dir().join("objects")))
}
