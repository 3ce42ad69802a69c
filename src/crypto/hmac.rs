//! HMAC-SHA256 (RFC 2104).

use super::sha256::{self, Sha256, DIGEST_SIZE};
use super::util::{ct_eq, secure_zero};

pub const TAG_SIZE: usize = DIGEST_SIZE;
const BLOCK_SIZE: usize = 64;
const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5c;

/// A keyed HMAC-SHA256 context, keyed once and usable for repeated MACs.
pub struct HmacSha256 {
    inner_key: [u8; BLOCK_SIZE],
    outer_key: [u8; BLOCK_SIZE],
}

impl HmacSha256 {
    pub fn new(key: &[u8]) -> Self {
        let mut block_key = [0u8; BLOCK_SIZE];
        if key.len() > BLOCK_SIZE {
            let digest = sha256::sha256(key);
            block_key[..DIGEST_SIZE].copy_from_slice(&digest);
        } else {
            block_key[..key.len()].copy_from_slice(key);
        }

        let mut inner_key = [0u8; BLOCK_SIZE];
        let mut outer_key = [0u8; BLOCK_SIZE];
        for i in 0..BLOCK_SIZE {
            inner_key[i] = block_key[i] ^ IPAD;
            outer_key[i] = block_key[i] ^ OPAD;
        }
        secure_zero(&mut block_key);

        HmacSha256 {
            inner_key,
            outer_key,
        }
    }

    /// Computes the MAC of `message`.
    pub fn mac(&self, message: &[u8]) -> [u8; TAG_SIZE] {
        let mut inner = Sha256::new();
        inner.update(&self.inner_key);
        inner.update(message);
        let inner_digest = inner.finalize();

        let mut outer = Sha256::new();
        outer.update(&self.outer_key);
        outer.update(&inner_digest);
        outer.finalize()
    }

    /// Verifies `tag` against `message` in constant time.
    pub fn verify(&self, message: &[u8], tag: &[u8]) -> bool {
        let computed = self.mac(message);
        ct_eq(&computed, tag)
    }
}

impl Drop for HmacSha256 {
    fn drop(&mut self) {
        secure_zero(&mut self.inner_key);
        secure_zero(&mut self.outer_key);
    }
}

/// One-shot HMAC-SHA256.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; TAG_SIZE] {
    HmacSha256::new(key).mac(message)
}
