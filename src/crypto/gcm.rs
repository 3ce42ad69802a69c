//! AES-256-GCM authenticated encryption (NIST SP 800-38D).
//!
//! Counter-mode encryption under [`super::aes::Aes256Key`] plus a GHASH
//! universal hash over GF(2^128) for authentication. Decryption zeroes the
//! output buffer and reports [`CryptoError::VerificationFailed`] if the tag
//! does not match; the caller never sees plaintext recovered from a forged
//! ciphertext.

use super::aes::Aes256Key;
use super::util::{ct_eq, secure_zero};
use super::CryptoError;

pub const KEY_SIZE: usize = 32;
pub const NONCE_SIZE: usize = 12;
pub const TAG_SIZE: usize = 16;

/// SP 800-38D caps a single (key, IV) invocation at 2^39 − 256 plaintext
/// bits; past that the counter portion of J0 can wrap and reuse a
/// keystream block. In bytes, `(2^39 - 256) / 8`.
const MAX_PLAINTEXT_BYTES: u64 = (1u64 << 36) - 32;

/// Reduction polynomial for GF(2^128), `x^128 + x^7 + x^2 + x + 1`, placed in
/// the high byte of a big-endian 16-byte block.
const R: [u8; 16] = [0xe1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

/// Multiplies two GF(2^128) elements using constant-time bit-by-bit
/// schoolbook multiplication; every step runs regardless of operand value.
fn ghash_multiply(x: &[u8; 16], h: &[u8; 16]) -> [u8; 16] {
    let mut z = [0u8; 16];
    let mut v = *h;

    for i in 0..128 {
        let byte_idx = i / 8;
        let bit_idx = 7 - (i % 8);
        let xi = (x[byte_idx] >> bit_idx) & 1;

        let mask = 0u8.wrapping_sub(xi);
        for j in 0..16 {
            z[j] ^= v[j] & mask;
        }

        let lsb = v[15] & 1;
        for j in (1..16).rev() {
            v[j] = (v[j] >> 1) | (v[j - 1] << 7);
        }
        v[0] >>= 1;

        let reduce_mask = 0u8.wrapping_sub(lsb);
        for j in 0..16 {
            v[j] ^= R[j] & reduce_mask;
        }
    }

    z
}

fn xor_block(acc: &mut [u8; 16], block: &[u8; 16]) {
    for i in 0..16 {
        acc[i] ^= block[i];
    }
}

/// GHASH over associated data followed by ciphertext, per SP 800-38D §6.4.
fn ghash(h: &[u8; 16], aad: &[u8], ciphertext: &[u8]) -> [u8; 16] {
    let mut acc = [0u8; 16];

    for chunk in aad.chunks(16) {
        let mut block = [0u8; 16];
        block[..chunk.len()].copy_from_slice(chunk);
        xor_block(&mut acc, &block);
        acc = ghash_multiply(&acc, h);
    }

    for chunk in ciphertext.chunks(16) {
        let mut block = [0u8; 16];
        block[..chunk.len()].copy_from_slice(chunk);
        xor_block(&mut acc, &block);
        acc = ghash_multiply(&acc, h);
    }

    let aad_bits = (aad.len() as u64) * 8;
    let ct_bits = (ciphertext.len() as u64) * 8;
    let mut len_block = [0u8; 16];
    len_block[..8].copy_from_slice(&aad_bits.to_be_bytes());
    len_block[8..16].copy_from_slice(&ct_bits.to_be_bytes());

    xor_block(&mut acc, &len_block);
    ghash_multiply(&acc, h)
}

fn increment_counter(counter: &mut [u8; 16]) {
    let ctr = u32::from_be_bytes([counter[12], counter[13], counter[14], counter[15]]);
    let bytes = ctr.wrapping_add(1).to_be_bytes();
    counter[12..16].copy_from_slice(&bytes);
}

fn j0_from_nonce(nonce: &[u8; NONCE_SIZE]) -> [u8; 16] {
    let mut j0 = [0u8; 16];
    j0[..NONCE_SIZE].copy_from_slice(nonce);
    j0[15] = 0x01;
    j0
}

fn ctr_xor(cipher: &Aes256Key, j0: &[u8; 16], input: &[u8], output: &mut [u8]) {
    let mut counter = *j0;
    let mut offset = 0;
    while offset < input.len() {
        increment_counter(&mut counter);
        let mut keystream = counter;
        cipher.encrypt_block(&mut keystream);

        let block_len = core::cmp::min(16, input.len() - offset);
        for i in 0..block_len {
            output[offset + i] = input[offset + i] ^ keystream[i];
        }
        offset += block_len;
    }
}

/// AES-256-GCM over a fixed 256-bit key.
pub struct Aes256Gcm {
    cipher: Aes256Key,
    h: [u8; 16],
}

impl Aes256Gcm {
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        let cipher = Aes256Key::new(key);
        let mut h = [0u8; 16];
        cipher.encrypt_block(&mut h);
        Aes256Gcm { cipher, h }
    }

    /// Encrypts `plaintext` under `nonce` and `aad`, writing ciphertext into
    /// `ciphertext` (same length as `plaintext`) and the tag into `tag`.
    /// Returns [`CryptoError::InvalidInput`] if `plaintext` exceeds the
    /// SP 800-38D bound of 2^39 − 256 bits for a single (key, nonce) use.
    pub fn encrypt(
        &self,
        nonce: &[u8; NONCE_SIZE],
        aad: &[u8],
        plaintext: &[u8],
        ciphertext: &mut [u8],
        tag: &mut [u8; TAG_SIZE],
    ) -> Result<(), CryptoError> {
        if ciphertext.len() != plaintext.len() {
            return Err(CryptoError::BufferTooSmall);
        }
        if plaintext.len() as u64 > MAX_PLAINTEXT_BYTES {
            return Err(CryptoError::InvalidInput);
        }

        let j0 = j0_from_nonce(nonce);
        ctr_xor(&self.cipher, &j0, plaintext, ciphertext);

        let ghash_val = ghash(&self.h, aad, ciphertext);
        let mut encrypted_j0 = j0;
        self.cipher.encrypt_block(&mut encrypted_j0);
        for i in 0..TAG_SIZE {
            tag[i] = encrypted_j0[i] ^ ghash_val[i];
        }
        Ok(())
    }

    /// Verifies `tag` against `nonce`/`aad`/`ciphertext` and, only on success,
    /// decrypts into `plaintext`. On authentication failure `plaintext` is
    /// zeroed and `CryptoError::VerificationFailed` is returned. Also bounded
    /// by the same 2^39 − 256 bit length limit as [`Self::encrypt`].
    pub fn decrypt(
        &self,
        nonce: &[u8; NONCE_SIZE],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8; TAG_SIZE],
        plaintext: &mut [u8],
    ) -> Result<(), CryptoError> {
        if plaintext.len() != ciphertext.len() {
            return Err(CryptoError::BufferTooSmall);
        }
        if ciphertext.len() as u64 > MAX_PLAINTEXT_BYTES {
            return Err(CryptoError::InvalidInput);
        }

        let j0 = j0_from_nonce(nonce);
        let ghash_val = ghash(&self.h, aad, ciphertext);
        let mut encrypted_j0 = j0;
        self.cipher.encrypt_block(&mut encrypted_j0);
        let mut expected_tag = [0u8; TAG_SIZE];
        for i in 0..TAG_SIZE {
            expected_tag[i] = encrypted_j0[i] ^ ghash_val[i];
        }

        if !ct_eq(&expected_tag, tag) {
            secure_zero(plaintext);
            return Err(CryptoError::VerificationFailed);
        }

        ctr_xor(&self.cipher, &j0, ciphertext, plaintext);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_to_vec(hex: &str) -> Vec<u8> {
        (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn known_answer_zero_key_empty_message() {
        let key = [0u8; KEY_SIZE];
        let nonce = [0u8; NONCE_SIZE];

        let gcm = Aes256Gcm::new(&key);
        let mut ciphertext: [u8; 0] = [];
        let mut tag = [0u8; TAG_SIZE];
        gcm.encrypt(&nonce, &[], &[], &mut ciphertext, &mut tag)
            .unwrap();

        assert_eq!(
            hex_to_vec("530f8afbc74536b9a963b4f1c4cb738b"),
            tag.to_vec()
        );

        let mut plaintext: [u8; 0] = [];
        gcm.decrypt(&nonce, &[], &ciphertext, &tag, &mut plaintext)
            .unwrap();
    }

    #[test]
    fn known_answer_with_aad_and_plaintext() {
        let key: [u8; KEY_SIZE] = hex_to_vec(
            "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
        )
        .try_into()
        .unwrap();
        let nonce: [u8; NONCE_SIZE] = hex_to_vec("000000000000000000000001")
            .try_into()
            .unwrap();
        let aad = hex_to_vec("feedfacedeadbeeffeedfacedeadbeefabaddad2");
        let plaintext = hex_to_vec(
            "d9313225f88406e5a55909c5aff5269a\
             86a7a9531534f7da2e4c303d8a318a72\
             1c3c0c95956809532fcf0e2449a6b525\
             b16aedf5aa0de657ba637b391aafd255",
        );
        let expected_ciphertext = hex_to_vec(
            "cce78dd9bc7036fbab7758fc43531c6d\
             9338b5077186a35e5d4c33e4ac01f92c\
             26aa6b64bd448d6f7610cd252542b216\
             9f7cbe6757e3fb100476665c421a495d",
        );
        let expected_tag = hex_to_vec("e4b73a06f4b069db27cf33e85f88e7d6");

        let gcm = Aes256Gcm::new(&key);
        let mut ciphertext = vec![0u8; plaintext.len()];
        let mut tag = [0u8; TAG_SIZE];
        gcm.encrypt(&nonce, &aad, &plaintext, &mut ciphertext, &mut tag)
            .unwrap();

        assert_eq!(ciphertext, expected_ciphertext);
        assert_eq!(tag.to_vec(), expected_tag);

        let mut decrypted = vec![0u8; ciphertext.len()];
        gcm.decrypt(&nonce, &aad, &ciphertext, &tag, &mut decrypted)
            .unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn decrypt_rejects_tampered_tag_and_zeroes_output() {
        let key = [0x42u8; KEY_SIZE];
        let nonce = [0x24u8; NONCE_SIZE];
        let plaintext = b"a wallet secret that must not leak";

        let gcm = Aes256Gcm::new(&key);
        let mut ciphertext = vec![0u8; plaintext.len()];
        let mut tag = [0u8; TAG_SIZE];
        gcm.encrypt(&nonce, b"assoc", plaintext, &mut ciphertext, &mut tag)
            .unwrap();

        tag[0] ^= 0xff;
        let mut output = vec![0xAAu8; plaintext.len()];
        let err = gcm
            .decrypt(&nonce, b"assoc", &ciphertext, &tag, &mut output)
            .unwrap_err();
        assert_eq!(err, CryptoError::VerificationFailed);
        assert_eq!(output, vec![0u8; plaintext.len()]);
    }

    #[test]
    fn max_plaintext_bytes_matches_sp_800_38d_bound() {
        // 2^39 - 256 bits, in bytes.
        assert_eq!(MAX_PLAINTEXT_BYTES, ((1u64 << 39) - 256) / 8);
    }

    #[test]
    fn decrypt_rejects_tampered_ciphertext() {
        let key = [0x07u8; KEY_SIZE];
        let nonce = [0x01u8; NONCE_SIZE];
        let plaintext = b"0123456789abcdef0123456789abcdef";

        let gcm = Aes256Gcm::new(&key);
        let mut ciphertext = vec![0u8; plaintext.len()];
        let mut tag = [0u8; TAG_SIZE];
        gcm.encrypt(&nonce, &[], plaintext, &mut ciphertext, &mut tag)
            .unwrap();

        ciphertext[0] ^= 0x01;
        let mut output = vec![0u8; plaintext.len()];
        let err = gcm
            .decrypt(&nonce, &[], &ciphertext, &tag, &mut output)
            .unwrap_err();
        assert_eq!(err, CryptoError::VerificationFailed);
    }
}
