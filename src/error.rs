use std::fmt;

/// Failures building or emitting an SSE-C credential.
#[derive(Debug, PartialEq, Eq)]
pub enum SseError {
    InvalidKeyLength(usize),
    InsecureTransport,
}

impl fmt::Display for SseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SseError::InvalidKeyLength(n) => {
                write!(f, "SSE-C key must be 32 bytes, got {n}")
            }
            SseError::InsecureTransport => write!(
                f,
                "SSE-C requires a secure (TLS) connection; refusing to send key"
            ),
        }
    }
}

impl std::error::Error for SseError {}

/// Errors reported by an object store for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    NoSuchBucket(String),
    NoSuchKey { bucket: String, object: String },
    AccessDenied { bucket: String, object: String },
    InvalidRequest(String),
    Http { status: u16, code: String, message: String },
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectError::NoSuchBucket(b) => write!(f, "bucket '{b}' does not exist"),
            ObjectError::NoSuchKey { bucket, object } => {
                write!(f, "object '{bucket}/{object}' does not exist")
            }
            ObjectError::AccessDenied { bucket, object } => {
                write!(f, "Access Denied: '{bucket}/{object}'")
            }
            ObjectError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            ObjectError::Http {
                status,
                code,
                message,
            } => write!(f, "server returned {status} {code}: {message}"),
        }
    }
}

impl std::error::Error for ObjectError {}

/// Raised, as a panic payload, when scrypt rejects the pinned cost
/// parameters. This means the build itself is broken and is never
/// returned as an `Err`.
///
/// Code that must tell a broken build apart from a failed request can
/// `catch_unwind` and downcast the payload to `KdfFault`.
#[derive(Debug)]
pub struct KdfFault {
    reason: String,
}

impl KdfFault {
    pub(crate) fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for KdfFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to derive key using fixed scrypt parameters: {}",
            self.reason
        )
    }
}

impl std::error::Error for KdfFault {}
