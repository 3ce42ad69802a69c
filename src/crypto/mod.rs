//! Cryptographic primitives for the wallet's core.
//!
//! Everything above the hash/MAC layer is built on constant-time comparison
//! and volatile zeroization from [`util`]; nothing in this module compares
//! secret bytes with `==` or drops a secret buffer without clearing it
//! first.

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(not(feature = "std"))]
pub mod alloc_prelude {
    pub use alloc::boxed::Box;
    pub use alloc::format;
    pub use alloc::string::{String, ToString};
    pub use alloc::vec;
    pub use alloc::vec::Vec;
}

#[cfg(feature = "std")]
pub mod alloc_prelude {
    pub use std::boxed::Box;
    pub use std::format;
    pub use std::string::{String, ToString};
    pub use std::vec;
    pub use std::vec::Vec;
}

pub mod aes;
pub mod ed25519;
pub mod gcm;
pub mod hkdf;
pub mod hmac;
pub mod sha256;
pub mod sha512;
pub mod util;

use core::fmt;

/// Cryptographic error conditions.
///
/// These are all recoverable conditions reported via `Result`; no path in
/// this crate panics on attacker-controlled input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    /// A key was the wrong length or otherwise structurally invalid.
    InvalidKey,
    /// A signature failed structural validation (wrong length, non-canonical encoding).
    InvalidSignature,
    /// A signature or authentication tag did not verify.
    VerificationFailed,
    /// An encryption operation could not complete.
    EncryptionFailed,
    /// A decryption or AEAD-open operation could not complete (including auth failure).
    DecryptionFailed,
    /// An input parameter was out of range (e.g. HKDF output length, nonce length).
    InvalidInput,
    /// A caller-supplied output buffer was too small for the result.
    BufferTooSmall,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidKey => write!(f, "invalid cryptographic key"),
            CryptoError::InvalidSignature => write!(f, "invalid signature encoding"),
            CryptoError::VerificationFailed => write!(f, "signature or tag verification failed"),
            CryptoError::EncryptionFailed => write!(f, "encryption operation failed"),
            CryptoError::DecryptionFailed => write!(f, "decryption or authentication failed"),
            CryptoError::InvalidInput => write!(f, "invalid input parameters"),
            CryptoError::BufferTooSmall => write!(f, "output buffer too small"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CryptoError {}

/// Result type alias used throughout [`crate::crypto`].
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Abstraction over a source of cryptographically secure random bytes.
///
/// The wallet core never seeds its own RNG; it is handed one by the
/// integrator (hardware TRNG on real firmware, a CSPRNG in the hosted
/// simulator, a fixed stream in tests).
pub trait SecureRng {
    fn fill_bytes(&mut self, dest: &mut [u8]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_error_display_is_non_empty() {
        let variants = [
            CryptoError::InvalidKey,
            CryptoError::InvalidSignature,
            CryptoError::VerificationFailed,
            CryptoError::EncryptionFailed,
            CryptoError::DecryptionFailed,
            CryptoError::InvalidInput,
            CryptoError::BufferTooSmall,
        ];
        for v in variants {
            assert!(!v.to_string().is_empty());
        }
    }
}
