//! Object-store clients that encrypted retrieval delegates to.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use log::info;
use zeroize::Zeroizing;

use crate::crypto::SseCustomer;
use crate::error::{ObjectError, SseError};
use crate::storage::AtomicFile;

pub mod http;
pub mod local;

/// A readable object body. The caller owns it and releases it by dropping.
pub type ObjectReader = Box<dyn Read + Send>;

/// Per-request options for a GET.
#[derive(Debug, Default)]
pub struct GetObjectOptions {
    /// Customer key the object was encrypted with, if any.
    pub server_side_encryption: Option<SseCustomer>,
    /// Overall request timeout, applied by clients that talk to a network.
    pub timeout: Option<Duration>,
}

impl GetObjectOptions {
    pub fn with_sse(sse: SseCustomer) -> Self {
        Self {
            server_side_encryption: Some(sse),
            ..Self::default()
        }
    }

    /// Request headers derived from these options.
    ///
    /// Every client sends SSE-C material through this method: it refuses
    /// to emit the customer key unless `secure` is set.
    ///
    /// # Errors
    ///
    /// Returns [`SseError::InsecureTransport`] when a customer key is set
    /// and the channel is not secure.
    pub fn headers(
        &self,
        secure: bool,
    ) -> Result<Vec<(&'static str, Zeroizing<String>)>, SseError> {
        match &self.server_side_encryption {
            None => Ok(Vec::new()),
            Some(_) if !secure => Err(SseError::InsecureTransport),
            Some(sse) => Ok(sse.headers()),
        }
    }
}

/// The object-store operations encrypted retrieval relies on.
pub trait ObjectClient: Send + Sync {
    /// Whether requests travel over a channel that protects the SSE-C key.
    fn is_secure(&self) -> bool;

    /// Fetches `bucket/object` as a stream.
    fn get_object(
        &self,
        bucket: &str,
        object: &str,
        opts: GetObjectOptions,
    ) -> Result<ObjectReader>;

    /// Fetches `bucket/object` into `file_path`.
    ///
    /// The download lands in a temporary file next to `file_path` and is
    /// renamed into place only once complete. On failure nothing is left
    /// at `file_path`, or its previous content is kept.
    fn fget_object(
        &self,
        bucket: &str,
        object: &str,
        file_path: &Path,
        opts: GetObjectOptions,
    ) -> Result<()> {
        if file_path.is_dir() {
            return Err(ObjectError::InvalidRequest(format!(
                "'{}' is a directory",
                file_path.display()
            ))
            .into());
        }

        let mut reader = self.get_object(bucket, object, opts)?;
        let written = AtomicFile::new(file_path.to_path_buf()).write_from(&mut reader)?;
        info!(
            "wrote {written} bytes of {bucket}/{object} to {}",
            file_path.display()
        );
        Ok(())
    }
}

/// Checks a bucket name against S3 naming rules.
pub fn check_bucket_name(bucket: &str) -> Result<(), ObjectError> {
    let invalid = |why: &str| ObjectError::InvalidRequest(format!("bucket name '{bucket}' {why}"));

    if bucket.is_empty() {
        return Err(ObjectError::InvalidRequest(
            "bucket name cannot be empty".to_string(),
        ));
    }
    if !(3..=63).contains(&bucket.len()) {
        return Err(invalid("must be between 3 and 63 characters long"));
    }
    if !bucket
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'.' || b == b'-')
    {
        return Err(invalid("contains invalid characters"));
    }
    if bucket.starts_with(['.', '-']) || bucket.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a letter or digit"));
    }
    if bucket.contains("..") {
        return Err(invalid("cannot contain consecutive periods"));
    }
    Ok(())
}

/// Checks an object name is non-empty and at most 1024 bytes.
pub fn check_object_name(object: &str) -> Result<(), ObjectError> {
    if object.is_empty() {
        return Err(ObjectError::InvalidRequest(
            "object name cannot be empty".to_string(),
        ));
    }
    if object.len() > 1024 {
        return Err(ObjectError::InvalidRequest(
            "object name cannot be longer than 1024 bytes".to_string(),
        ));
    }
    Ok(())
}
