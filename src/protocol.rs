//! Framed USB command protocol: `SOF‖LEN‖CMD‖PAYLOAD‖CRC16` requests in,
//! `SOF‖LEN‖STATUS‖DATA‖CRC16` responses out, dispatched into a [`Wallet`].
//!
//! Grounded on the original firmware's `usb_protocol.c`: same frame shape,
//! same CRC placement (`LEN‖CMD‖PAYLOAD`, i.e. everything after `SOF`), same
//! resync-on-bad-SOF and drop-on-bad-CRC behavior. The difference is that
//! `CMD_CREATE_WALLET`/`CMD_UNLOCK`/`CMD_SIGN_TX` here actually call into a
//! real [`Wallet`] instead of stubs, and `SIGN_TX`/`GET_ADDRESS` exist at
//! all (the C source only sketches `wallet_get_address`/
//! `wallet_sign_transaction` as placeholders the protocol layer never
//! wired up).

use crate::crypto::ed25519::SIGNATURE_SIZE;
use crate::crypto::SecureRng;
use crate::wallet::{Wallet, WalletStatus};

#[cfg(feature = "alloc")]
use crate::crypto::alloc_prelude::{vec, Vec};

/// Start-of-frame marker.
pub const SOF: u8 = 0xAA;
/// Size of the receiver's byte buffer, matching the original firmware's
/// `MAX_FRAME_SIZE` guard. Large enough to hold the largest legal frame
/// (`LEN = 253` ⇒ `SOF‖LEN‖CMD‖PAYLOAD‖CRC16` = `2 + 253 + 2 = 257`
/// bytes); a frame claiming more than this resyncs the receiver.
pub const MAX_FRAME_SIZE: usize = 257;

/// Command codes understood by [`dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Ping = 0x01,
    GetVersion = 0x02,
    GetStatus = 0x03,
    CreateWallet = 0x10,
    Unlock = 0x11,
    Lock = 0x12,
    GetAddress = 0x20,
    SignTx = 0x21,
}

impl Command {
    fn from_byte(b: u8) -> Option<Command> {
        match b {
            0x01 => Some(Command::Ping),
            0x02 => Some(Command::GetVersion),
            0x03 => Some(Command::GetStatus),
            0x10 => Some(Command::CreateWallet),
            0x11 => Some(Command::Unlock),
            0x12 => Some(Command::Lock),
            0x20 => Some(Command::GetAddress),
            0x21 => Some(Command::SignTx),
            _ => None,
        }
    }
}

/// Response status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    Error = 0x01,
    InvalidCmd = 0x02,
    Locked = 0x03,
    NeedConfirm = 0x04,
}

/// Firmware version reported by `GET_VERSION`.
pub const FIRMWARE_VERSION: (u8, u8, u8) = (0, 1, 0);

/// CRC-16/ARC: reflected polynomial 0x8408 (taps 0xA001 in the
/// right-shifting form used here), initial value 0xFFFF, no final XOR.
/// Matches the original firmware's `crc16()` bit for bit.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Builds a response frame: `SOF ‖ LEN ‖ STATUS ‖ DATA ‖ CRC16_LE`.
#[cfg(feature = "alloc")]
fn build_response(status: Status, data: &[u8]) -> Vec<u8> {
    let len = 1 + data.len();
    let mut frame = Vec::with_capacity(2 + len + 2);
    frame.push(SOF);
    frame.push(len as u8);
    frame.push(status as u8);
    frame.extend_from_slice(data);
    let crc = crc16(&frame[1..]);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

/// Dispatches one already-CRC-verified frame (`cmd`, `payload`) against
/// `wallet`, returning the full response frame bytes.
///
/// `rng` is only consulted for `CreateWallet`; every other command ignores
/// it. The wallet layer's [`crate::wallet::WalletError`] is deliberately
/// collapsed to a single [`Status::Error`] here — see §4.F/§7: the protocol
/// must not let a host distinguish "wrong PIN" from "wrong state" beyond
/// what constant-time comparison already permits.
#[cfg(feature = "alloc")]
pub fn dispatch(wallet: &mut Wallet, cmd: u8, payload: &[u8], rng: &mut impl SecureRng) -> Vec<u8> {
    let command = match Command::from_byte(cmd) {
        Some(c) => c,
        None => {
            log::warn!("protocol: unrecognized command 0x{:02x}", cmd);
            return build_response(Status::InvalidCmd, &[]);
        }
    };

    match command {
        Command::Ping => {
            log::debug!("protocol: PING");
            build_response(Status::Ok, b"PONG")
        }
        Command::GetVersion => {
            let (major, minor, patch) = FIRMWARE_VERSION;
            build_response(Status::Ok, &[major, minor, patch])
        }
        Command::GetStatus => {
            let status_byte = wallet.status() as u8;
            build_response(Status::Ok, &[status_byte])
        }
        Command::CreateWallet => {
            if payload.len() < 32 {
                return build_response(Status::Error, &[]);
            }
            match wallet.create(payload, rng) {
                Ok(()) => {
                    log::info!("protocol: wallet created");
                    build_response(Status::Ok, &[])
                }
                Err(_) => build_response(Status::Error, &[]),
            }
        }
        Command::Unlock => {
            if payload.is_empty() {
                return build_response(Status::Error, &[]);
            }
            // Without flash-backed persistence (§4.F open question) this
            // crate has nothing to restore the master key from on a cold
            // unlock; the protocol layer can only report failure. An
            // integrator wiring in real persistence would call
            // `Wallet::unlock_with_master` directly with the key it
            // recovered instead of going through `dispatch`.
            if !matches!(wallet.status(), WalletStatus::Locked) {
                return build_response(Status::Error, &[]);
            }
            log::warn!("protocol: UNLOCK requested but no persisted master key is available");
            build_response(Status::Error, &[])
        }
        Command::Lock => {
            wallet.lock();
            log::info!("protocol: wallet locked");
            build_response(Status::Ok, &[])
        }
        Command::GetAddress => {
            if payload.len() < 4 {
                return build_response(Status::Error, &[]);
            }
            let index = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
            match wallet.address(index) {
                Ok(addr) => build_response(Status::Ok, addr.as_bytes()),
                Err(_) => build_response(Status::Locked, &[]),
            }
        }
        Command::SignTx => {
            if payload.len() < 36 {
                return build_response(Status::Error, &[]);
            }
            let tx_hash = &payload[0..32];
            let index = u32::from_le_bytes([payload[32], payload[33], payload[34], payload[35]]);
            match wallet.sign(tx_hash, index) {
                Ok(sig) => build_response(Status::Ok, &sig),
                Err(_) => build_response(Status::Locked, &[]),
            }
        }
    }
}

/// Byte-at-a-time frame receiver: wait for `SOF`, accumulate until `LEN`
/// bytes of header+CRC have arrived, verify CRC, and hand the caller a
/// complete `(cmd, payload)` on success. Malformed or mismatched frames are
/// dropped silently and the
/// receiver resyncs on the next `SOF` byte, exactly as the original
/// firmware's `usb_protocol_task` does.
pub struct FrameReceiver {
    buf: [u8; MAX_FRAME_SIZE],
    pos: usize,
}

/// A fully received and CRC-verified request frame.
pub struct ReceivedFrame<'a> {
    pub cmd: u8,
    pub payload: &'a [u8],
}

impl FrameReceiver {
    pub const fn new() -> Self {
        FrameReceiver {
            buf: [0u8; MAX_FRAME_SIZE],
            pos: 0,
        }
    }

    /// Feeds one byte in. Returns `Some` exactly when a complete, CRC-valid
    /// frame has just been assembled; the receiver resets itself
    /// immediately afterward (success or CRC failure) so the next call
    /// starts a fresh frame.
    pub fn push_byte(&mut self, byte: u8) -> Option<ReceivedFrame<'_>> {
        if self.pos == 0 && byte != SOF {
            // Require SOF on the first byte; anything else is discarded.
            return None;
        }

        if self.pos >= self.buf.len() {
            self.pos = 0;
            if byte != SOF {
                return None;
            }
        }

        self.buf[self.pos] = byte;
        self.pos += 1;

        if self.pos < 2 {
            return None;
        }

        let frame_len = self.buf[1] as usize;
        let expected_total = 2 + frame_len + 2;

        if self.pos < expected_total {
            return None;
        }

        let received_crc = u16::from_le_bytes([self.buf[expected_total - 2], self.buf[expected_total - 1]]);
        let calc_crc = crc16(&self.buf[1..expected_total - 2]);
        self.pos = 0;

        if received_crc != calc_crc || frame_len == 0 {
            log::debug!("protocol: frame dropped (CRC mismatch or empty frame)");
            return None;
        }

        let cmd = self.buf[2];
        Some(ReceivedFrame {
            cmd,
            payload: &self.buf[3..expected_total - 2],
        })
    }
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes a request frame (for test harnesses and the hosted demo driving
/// the protocol end to end).
#[cfg(feature = "alloc")]
pub fn encode_request(cmd: u8, payload: &[u8]) -> Vec<u8> {
    let len = 1 + payload.len();
    let mut frame = Vec::with_capacity(2 + len + 2);
    frame.push(SOF);
    frame.push(len as u8);
    frame.push(cmd);
    frame.extend_from_slice(payload);
    let crc = crc16(&frame[1..]);
    frame.extend_from_slice(&crc.to_le_bytes());
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SecureRng;

    struct CountingRng(u8);
    impl SecureRng for CountingRng {
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for b in dest.iter_mut() {
                *b = self.0;
                self.0 = self.0.wrapping_add(1);
            }
        }
    }

    fn feed(receiver: &mut FrameReceiver, bytes: &[u8]) -> Option<(u8, Vec<u8>)> {
        let mut result = None;
        for &b in bytes {
            if let Some(frame) = receiver.push_byte(b) {
                result = Some((frame.cmd, frame.payload.to_vec()));
            }
        }
        result
    }

    #[test]
    fn crc16_matches_known_value() {
        // CRC-16/ARC of ASCII "123456789" is the well-known check value 0xBB3D.
        assert_eq!(crc16(b"123456789"), 0xBB3D);
    }

    #[test]
    fn ping_round_trip_via_receiver() {
        let request = encode_request(Command::Ping as u8, &[]);
        let mut receiver = FrameReceiver::new();
        let (cmd, payload) = feed(&mut receiver, &request).expect("frame should parse");
        assert_eq!(cmd, Command::Ping as u8);
        assert!(payload.is_empty());

        let mut wallet = Wallet::new();
        let mut rng = CountingRng(1);
        let response = dispatch(&mut wallet, cmd, &payload, &mut rng);
        assert_eq!(response[0], SOF);
        assert_eq!(response[2], Status::Ok as u8);
        assert_eq!(&response[3..7], b"PONG");
    }

    #[test]
    fn bad_crc_does_not_produce_a_frame() {
        let mut request = encode_request(Command::Ping as u8, &[]);
        let last = request.len() - 1;
        request[last] ^= 0xFF;

        let mut receiver = FrameReceiver::new();
        assert!(feed(&mut receiver, &request).is_none());
    }

    #[test]
    fn receiver_resyncs_after_garbage_prefix() {
        let mut bytes = vec![0x00, 0x01, 0x02];
        bytes.extend_from_slice(&encode_request(Command::GetStatus as u8, &[]));

        let mut receiver = FrameReceiver::new();
        let (cmd, _) = feed(&mut receiver, &bytes).expect("frame should eventually parse");
        assert_eq!(cmd, Command::GetStatus as u8);
    }

    #[test]
    fn create_wallet_requires_minimum_pin_length() {
        let mut wallet = Wallet::new();
        let mut rng = CountingRng(7);
        let response = dispatch(&mut wallet, Command::CreateWallet as u8, b"short", &mut rng);
        assert_eq!(response[2], Status::Error as u8);
        assert_eq!(wallet.status(), WalletStatus::Uninitialized);
    }

    #[test]
    fn create_wallet_then_lock_then_sign_is_rejected() {
        let mut wallet = Wallet::new();
        let mut rng = CountingRng(3);
        let pin = [0x42u8; 32];
        let resp = dispatch(&mut wallet, Command::CreateWallet as u8, &pin, &mut rng);
        assert_eq!(resp[2], Status::Ok as u8);
        assert_eq!(wallet.status(), WalletStatus::Unlocked);

        let resp = dispatch(&mut wallet, Command::Lock as u8, &[], &mut rng);
        assert_eq!(resp[2], Status::Ok as u8);
        assert_eq!(wallet.status(), WalletStatus::Locked);

        let mut sign_payload = [0u8; 36];
        sign_payload[..32].copy_from_slice(&[0x11u8; 32]);
        let resp = dispatch(&mut wallet, Command::SignTx as u8, &sign_payload, &mut rng);
        assert_eq!(resp[2], Status::Locked as u8);
    }

    #[test]
    fn sign_tx_round_trip_after_create() {
        let mut wallet = Wallet::new();
        let mut rng = CountingRng(11);
        let pin = [0x99u8; 32];
        dispatch(&mut wallet, Command::CreateWallet as u8, &pin, &mut rng);

        let mut sign_payload = [0u8; 36];
        sign_payload[..32].copy_from_slice(&[0x22u8; 32]);
        let resp = dispatch(&mut wallet, Command::SignTx as u8, &sign_payload, &mut rng);
        assert_eq!(resp[2], Status::Ok as u8);
        assert_eq!(resp.len(), 2 + 1 + SIGNATURE_SIZE + 2);
    }

    #[test]
    fn unrecognized_command_is_reported_as_invalid() {
        let mut wallet = Wallet::new();
        let mut rng = CountingRng(1);
        let resp = dispatch(&mut wallet, 0xEE, &[], &mut rng);
        assert_eq!(resp[2], Status::InvalidCmd as u8);
    }

    #[test]
    fn max_legal_len_parses_without_overrunning() {
        // LEN = 253 (the largest value the frame format allows) claims a
        // frame total of 2+253+2 = 257 bytes, which must fit exactly in the
        // receive buffer rather than be silently dropped as an overrun.
        let payload = vec![0xABu8; 252];
        let request = encode_request(Command::SignTx as u8, &payload);
        assert_eq!(request.len(), 257);

        let mut receiver = FrameReceiver::new();
        let (cmd, received_payload) = feed(&mut receiver, &request).expect("max-length frame should parse");
        assert_eq!(cmd, Command::SignTx as u8);
        assert_eq!(received_payload, payload);
    }

    #[test]
    fn oversized_len_overruns_the_buffer_and_resets() {
        // LEN = 255 claims a frame total of 2+255+2 = 259 bytes, which cannot
        // fit in the 257-byte receive buffer; the overrun guard must reset
        // the receiver rather than let it run past the end of `buf`.
        let mut oversized = vec![SOF, 255, Command::Ping as u8];
        oversized.extend(core::iter::repeat(0u8).take(254));
        oversized.extend_from_slice(&encode_request(Command::GetStatus as u8, &[]));

        let mut receiver = FrameReceiver::new();
        let (cmd, _) = feed(&mut receiver, &oversized).expect("receiver should resync and parse the trailing frame");
        assert_eq!(cmd, Command::GetStatus as u8);
    }
}
