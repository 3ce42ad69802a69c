//! LibreCrypt wallet cryptographic core.
//!
//! A self-contained suite of constant-time primitives (SHA-256, SHA-512,
//! HMAC-SHA256, HKDF, AES-256-GCM, Ed25519) plus the wallet state machine,
//! framed USB protocol, and secure-boot verifier built on top of them. See
//! the [`crypto`], [`wallet`], [`protocol`], and [`boot`] modules.
//!
//! # Features
//! - `alloc` — enables the heap-using convenience layer (`Vec`/`String`
//!   returns from the protocol dispatcher, wallet addresses, `FakeFlash`).
//! - `std` (default) — implies `alloc`; also wires up `env_logger` for the
//!   hosted `librecrypt-sim` demo binary and `std::error::Error` impls on
//!   this crate's error types.
//! - `bare_metal` — implies `alloc`; pulls in `spin` for the optional
//!   global-wallet-holder convenience wrapper. The crate itself never
//!   requires a global — see [`wallet::Wallet`], an ordinary owned value the
//!   integrator holds and passes by `&mut`.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "bare_metal")]
extern crate alloc;

#[cfg(feature = "bare_metal")]
use spin::Mutex;

pub mod boot;
pub mod crypto;
pub mod flash;
pub mod protocol;
pub mod wallet;

/// Current crate version, surfaced over the wire by `GET_VERSION`
/// ([`protocol::FIRMWARE_VERSION`]) and reported in the hosted demo banner.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Optional global wallet holder for integrators that genuinely need a
/// process-wide singleton (e.g. an interrupt handler that cannot thread a
/// `&mut Wallet` through). The crate's own protocol dispatch never uses
/// this — [`wallet::Wallet`] is designed to be owned and passed by
/// reference from a single main loop, replacing the original firmware's
/// file-static globals. This wrapper exists only because some bare-metal
/// integrators' entry points are easier to wire up against a `&'static`
/// than to thread ownership through.
#[cfg(feature = "bare_metal")]
pub struct GlobalWallet(Mutex<wallet::Wallet>);

#[cfg(feature = "bare_metal")]
impl GlobalWallet {
    pub const fn new() -> Self {
        GlobalWallet(Mutex::new(wallet::Wallet::new()))
    }

    pub fn with_lock<R>(&self, f: impl FnOnce(&mut wallet::Wallet) -> R) -> R {
        f(&mut self.0.lock())
    }
}

#[cfg(feature = "bare_metal")]
impl Default for GlobalWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_non_empty() {
        assert!(!VERSION.is_empty());
    }
}
