//! Cryptographic primitives for SSE-C retrieval.
//!
//! Provides the password-based key derivation, the SSE-C credential and
//! the sealing used by the local store to emulate server-side encryption.

pub mod aead;
pub mod kdf;
pub mod sse;

pub use aead::{open, seal};
pub use kdf::derive_key;
pub use sse::SseCustomer;

/// Length of the customer key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Length of the nonce (24 bytes for XChaCha20-Poly1305).
pub const NONCE_LEN: usize = 24;
/// Length of an MD5 digest (16 bytes).
pub const KEY_MD5_LEN: usize = 16;
