//! Wallet state machine: master-key lifecycle, PIN gating, signing.
//!
//! Mirrors the original firmware's `wallet_create`/`wallet_unlock`/
//! `wallet_lock`/`wallet_sign_transaction` state machine, but with real
//! Ed25519 signing instead of the placeholder `memset(signature, 0, 64)`,
//! and a `Wallet` value owned and passed by `&mut` by the integrator rather
//! than file-static globals.

use crate::crypto::ed25519::{self, Keypair, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
use crate::crypto::hkdf;
use crate::crypto::sha256::sha256;
use crate::crypto::util::{ct_eq, secure_zero};
use crate::crypto::SecureRng;

use core::fmt;

/// Length of a PIN digest and of the derived master key.
pub const DIGEST_SIZE: usize = 32;
const MASTER_KEY_INFO: &[u8] = b"wallet-master";

/// Current lifecycle state of a [`Wallet`].
///
/// Encoded as the byte the protocol layer's `GET_STATUS` response carries,
/// matching the original firmware's `wallet_status_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalletStatus {
    Uninitialized = 0,
    Locked = 1,
    Unlocked = 2,
}

/// Internal failure reason. The protocol layer collapses every variant here
/// down to a single generic `ERROR` status byte before it reaches the host,
/// so that a wrong PIN and a wrong wallet state are indistinguishable to an
/// attacker probing the USB interface — this type exists so the crate's own
/// tests and the integrator's logs can still tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletError {
    /// The operation's precondition on `status` was not met.
    WrongState,
    /// The supplied PIN did not match the stored digest.
    WrongPin,
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::WrongState => write!(f, "operation not valid in current wallet state"),
            WalletError::WrongPin => write!(f, "PIN did not match"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for WalletError {}

pub type WalletResult<T> = Result<T, WalletError>;

/// The wallet's secret-material lifecycle: uninitialized, locked (PIN set,
/// no key material resident), or unlocked (master key resident).
///
/// Production note (§4.F open question): this crate does not persist the
/// master key to flash. A cold reboot while locked loses the ability to
/// unlock unless the integrator recovers the master key independently (see
/// [`Wallet::unlock_with_master`]) — a real deployment should wrap the
/// master key under a PIN-derived key-encryption-key and store the wrapped
/// form in flash, decrypting it on `unlock` instead of requiring the caller
/// to supply it out of band.
pub struct Wallet {
    status: WalletStatus,
    pin_digest: [u8; DIGEST_SIZE],
    master_key: [u8; DIGEST_SIZE],
}

impl Wallet {
    /// A fresh, uninitialized wallet: no PIN digest, no key material.
    pub const fn new() -> Self {
        Wallet {
            status: WalletStatus::Uninitialized,
            pin_digest: [0u8; DIGEST_SIZE],
            master_key: [0u8; DIGEST_SIZE],
        }
    }

    pub fn status(&self) -> WalletStatus {
        self.status
    }

    /// Creates a new wallet: draws a random seed, hashes `pin` into the
    /// stored digest, and derives the master key via HKDF-SHA256 keyed on
    /// that digest. Requires [`WalletStatus::Uninitialized`].
    pub fn create(&mut self, pin: &[u8], rng: &mut impl SecureRng) -> WalletResult<()> {
        if !matches!(self.status, WalletStatus::Uninitialized) {
            return Err(WalletError::WrongState);
        }

        let mut seed = [0u8; DIGEST_SIZE];
        rng.fill_bytes(&mut seed);

        self.pin_digest = sha256(pin);

        let mut master = [0u8; DIGEST_SIZE];
        hkdf::hkdf(&seed, &self.pin_digest, MASTER_KEY_INFO, DIGEST_SIZE, &mut master)
            .expect("32-byte HKDF output is well within the RFC 5869 length limit");
        self.master_key = master;
        secure_zero(&mut master);
        secure_zero(&mut seed);

        self.status = WalletStatus::Unlocked;
        Ok(())
    }

    /// Unlocks a [`WalletStatus::Locked`] wallet if `pin`'s digest matches
    /// the stored one in constant time, and if so installs `master` as the
    /// resident master key.
    ///
    /// Per the open-question decision in §9/§10 of the design notes, this
    /// crate has no at-rest copy of the master key to restore on its own;
    /// the caller supplies whatever it recovered (from a PIN-derived
    /// unwrap, from a session cache, or — for the in-memory demo/tests —
    /// the same value `create` derived). `master` is copied in, never
    /// retained by reference, and the caller's copy is the caller's to
    /// zeroize.
    pub fn unlock_with_master(&mut self, pin: &[u8], master: &[u8; DIGEST_SIZE]) -> WalletResult<()> {
        if !matches!(self.status, WalletStatus::Locked) {
            return Err(WalletError::WrongState);
        }

        let mut attempt = sha256(pin);
        let matches = ct_eq(&attempt, &self.pin_digest);
        secure_zero(&mut attempt);

        if !matches {
            return Err(WalletError::WrongPin);
        }

        self.master_key = *master;
        self.status = WalletStatus::Unlocked;
        Ok(())
    }

    /// Zeroizes the master key and returns to [`WalletStatus::Locked`].
    /// From [`WalletStatus::Uninitialized`] this is a no-op (there is no PIN
    /// digest yet to lock behind).
    pub fn lock(&mut self) {
        secure_zero(&mut self.master_key);
        if !matches!(self.status, WalletStatus::Uninitialized) {
            self.status = WalletStatus::Locked;
        }
    }

    /// Derives the Ed25519 keypair used by `account`. The minimum
    /// implementation (this crate) treats every account index as the
    /// identity derivation: account 0 and every nonzero index alike yield
    /// the master key's own keypair. Hierarchical derivation (BIP-32/44
    /// style) is an explicit non-goal and the extension point this method
    /// marks for it.
    fn derive_keypair(&self, _account: u32) -> Keypair {
        Keypair::from_seed(&self.master_key)
    }

    /// Signs `tx_hash` with `account`'s derived key. Requires
    /// [`WalletStatus::Unlocked`].
    pub fn sign(&self, tx_hash: &[u8], account: u32) -> WalletResult<[u8; SIGNATURE_SIZE]> {
        if !matches!(self.status, WalletStatus::Unlocked) {
            return Err(WalletError::WrongState);
        }
        let keypair = self.derive_keypair(account);
        Ok(keypair.sign(tx_hash))
    }

    /// Returns the human-readable address for `account`: `"addr1"` followed
    /// by the lowercase hex encoding of the account's compressed Ed25519
    /// public key. Requires [`WalletStatus::Unlocked`].
    ///
    /// The original firmware returned a constant placeholder string
    /// (`"addr1_placeholder"`) regardless of account or key material; this
    /// keeps the `addr1` prefix but actually derives the suffix.
    #[cfg(feature = "alloc")]
    pub fn address(&self, account: u32) -> WalletResult<crate::crypto::alloc_prelude::String> {
        use core::fmt::Write;

        if !matches!(self.status, WalletStatus::Unlocked) {
            return Err(WalletError::WrongState);
        }
        let keypair = self.derive_keypair(account);
        let mut out = crate::crypto::alloc_prelude::String::with_capacity(5 + PUBLIC_KEY_SIZE * 2);
        out.push_str("addr1");
        for b in keypair.public_key() {
            let _ = write!(out, "{:02x}", b);
        }
        Ok(out)
    }

    /// Verifies a signature produced by [`Wallet::sign`] for `account`
    /// against this wallet's own key material. Exposed mainly for tests and
    /// for the hosted demo; the protocol layer itself never needs to verify
    /// its own signatures.
    pub fn verify(&self, tx_hash: &[u8], account: u32, signature: &[u8; SIGNATURE_SIZE]) -> WalletResult<()> {
        if !matches!(self.status, WalletStatus::Unlocked) {
            return Err(WalletError::WrongState);
        }
        let keypair = self.derive_keypair(account);
        ed25519::verify(keypair.public_key(), tx_hash, signature).map_err(|_| WalletError::WrongPin)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Wallet {
    fn drop(&mut self) {
        secure_zero(&mut self.master_key);
        secure_zero(&mut self.pin_digest);
    }
}
