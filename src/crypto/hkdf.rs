//! HKDF-SHA256 (RFC 5869): Extract-then-Expand key derivation.

use super::hmac::{HmacSha256, TAG_SIZE};
use super::CryptoError;

/// Maximum output length allowed by RFC 5869: 255 times the hash length.
pub const MAX_OUTPUT_LEN: usize = 255 * TAG_SIZE;

/// `HKDF-Extract(salt, ikm) = HMAC-Hash(salt, ikm)`.
///
/// `salt` may be empty, in which case a string of `TAG_SIZE` zero bytes is
/// used per RFC 5869 §2.2.
pub fn extract(salt: &[u8], ikm: &[u8]) -> [u8; TAG_SIZE] {
    if salt.is_empty() {
        let zero_salt = [0u8; TAG_SIZE];
        HmacSha256::new(&zero_salt).mac(ikm)
    } else {
        HmacSha256::new(salt).mac(ikm)
    }
}

/// `HKDF-Expand(prk, info, len)`: derives `len` bytes of output keying
/// material from `prk` (the output of [`extract`]).
///
/// Returns `CryptoError::InvalidInput` if `len` exceeds [`MAX_OUTPUT_LEN`].
pub fn expand(prk: &[u8], info: &[u8], len: usize, out: &mut [u8]) -> Result<(), CryptoError> {
    if len > MAX_OUTPUT_LEN || out.len() < len {
        return Err(CryptoError::InvalidInput);
    }

    let hmac = HmacSha256::new(prk);
    let mut t_prev: [u8; TAG_SIZE] = [0u8; TAG_SIZE];
    let mut t_prev_len = 0usize;
    let mut written = 0usize;
    let mut counter: u8 = 1;

    while written < len {
        let mut buf = [0u8; TAG_SIZE + 260 + 1];
        let mut pos = 0usize;
        buf[pos..pos + t_prev_len].copy_from_slice(&t_prev[..t_prev_len]);
        pos += t_prev_len;
        buf[pos..pos + info.len()].copy_from_slice(info);
        pos += info.len();
        buf[pos] = counter;
        pos += 1;

        let t = hmac.mac(&buf[..pos]);
        let take = core::cmp::min(TAG_SIZE, len - written);
        out[written..written + take].copy_from_slice(&t[..take]);
        written += take;
        t_prev = t;
        t_prev_len = TAG_SIZE;
        counter = counter.wrapping_add(1);
    }

    Ok(())
}

/// `HKDF(ikm, salt, info, len)`: one-shot Extract-then-Expand.
pub fn hkdf(ikm: &[u8], salt: &[u8], info: &[u8], len: usize, out: &mut [u8]) -> Result<(), CryptoError> {
    let prk = extract(salt, ikm);
    expand(&prk, info, len, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(bytes: &[u8]) -> String {
        use core::fmt::Write;
        let mut s = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            write!(s, "{:02x}", b).unwrap();
        }
        s
    }

    // RFC 5869 Appendix A.1 (SHA-256 test case 1).
    #[test]
    fn rfc5869_case1() {
        let ikm = [0x0bu8; 22];
        let salt: [u8; 13] = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c,
        ];
        let info: [u8; 10] = [0xf0, 0xf1, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf8, 0xf9];

        let mut okm = [0u8; 42];
        hkdf(&ikm, &salt, &info, 42, &mut okm).unwrap();

        assert_eq!(
            hex(&okm),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    // RFC 5869 Appendix A.3: zero-length salt and info.
    #[test]
    fn rfc5869_case3_empty_salt_and_info() {
        let ikm = [0x0bu8; 22];
        let mut okm = [0u8; 42];
        hkdf(&ikm, &[], &[], 42, &mut okm).unwrap();

        assert_eq!(
            hex(&okm),
            "8da4e775a563c18f715f802a063c5a31b8a11f5c5ee1879ec3454e5f3c738d2d9d201395faa4b61a96c8"
        );
    }

    #[test]
    fn rejects_output_longer_than_max() {
        let mut out = [0u8; 32];
        let err = expand(&[0u8; 32], b"info", MAX_OUTPUT_LEN + 1, &mut out).unwrap_err();
        assert_eq!(err, CryptoError::InvalidInput);
    }

    #[test]
    fn different_info_yields_different_output() {
        let ikm = b"input key material";
        let mut out_a = [0u8; 32];
        let mut out_b = [0u8; 32];
        hkdf(ikm, b"salt", b"context-a", 32, &mut out_a).unwrap();
        hkdf(ikm, b"salt", b"context-b", 32, &mut out_b).unwrap();
        assert_ne!(out_a, out_b);
    }
}
