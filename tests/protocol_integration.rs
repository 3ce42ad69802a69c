//! End-to-end exercises of the framed protocol against a live [`Wallet`],
//! reproducing the scenarios used to validate this crate's behavior: a PING
//! round trip, and a create/lock/unlock cycle including the negative case of
//! an unlock attempt with the wrong PIN.

use librecrypt_core::crypto::SecureRng;
use librecrypt_core::protocol::{dispatch, encode_request, Command, FrameReceiver, Status};
use librecrypt_core::wallet::{Wallet, WalletError, WalletStatus};

struct CountingRng(u8);
impl SecureRng for CountingRng {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for b in dest.iter_mut() {
            *b = self.0;
            self.0 = self.0.wrapping_add(1);
        }
    }
}

fn drive(receiver: &mut FrameReceiver, wallet: &mut Wallet, rng: &mut impl SecureRng, request: &[u8]) -> Vec<u8> {
    let mut response = None;
    for &byte in request {
        if let Some(frame) = receiver.push_byte(byte) {
            response = Some(dispatch(wallet, frame.cmd, frame.payload, rng));
        }
    }
    response.expect("well-formed request should produce exactly one response")
}

/// Host sends `AA 02 01 <crc_lo> <crc_hi>`; device responds with a frame
/// whose payload is `00 "PONG"` and a valid CRC.
#[test]
fn ping_round_trip_over_the_wire() {
    let mut wallet = Wallet::new();
    let mut rng = CountingRng(1);
    let mut receiver = FrameReceiver::new();

    let request = encode_request(Command::Ping as u8, &[]);
    assert_eq!(&request[..3], &[0xAA, 0x02, 0x01]);

    let response = drive(&mut receiver, &mut wallet, &mut rng, &request);
    assert_eq!(response[0], 0xAA);
    assert_eq!(response[2], Status::Ok as u8);
    assert_eq!(&response[3..7], b"PONG");
}

/// CREATE_WALLET with a 32-byte PIN unlocks the wallet over the wire; LOCK
/// locks it; `unlock_with_master` with the same PIN unlocks it again; with a
/// different PIN it is rejected and the wallet stays locked. The master-key
/// argument itself is whatever an integrator's own persistence layer would
/// have recovered (DESIGN.md Open Question 1) — `unlock_with_master` gates
/// only on the PIN digest, so any placeholder value demonstrates the state
/// transition without this test needing to reconstruct the real key.
#[test]
fn create_lock_unlock_cycle_over_the_wire() {
    let mut wallet = Wallet::new();
    let mut rng = CountingRng(7);
    let mut receiver = FrameReceiver::new();

    let pin = [0x5Au8; 32];
    let create = encode_request(Command::CreateWallet as u8, &pin);
    let response = drive(&mut receiver, &mut wallet, &mut rng, &create);
    assert_eq!(response[2], Status::Ok as u8);
    assert_eq!(wallet.status(), WalletStatus::Unlocked);

    let lock = encode_request(Command::Lock as u8, &[]);
    let response = drive(&mut receiver, &mut wallet, &mut rng, &lock);
    assert_eq!(response[2], Status::Ok as u8);
    assert_eq!(wallet.status(), WalletStatus::Locked);

    let recovered_master = [0u8; 32];
    wallet.unlock_with_master(&pin, &recovered_master).unwrap();
    assert_eq!(wallet.status(), WalletStatus::Unlocked);

    wallet.lock();
    assert_eq!(wallet.status(), WalletStatus::Locked);

    let wrong_pin = [0x11u8; 32];
    let err = wallet.unlock_with_master(&wrong_pin, &recovered_master).unwrap_err();
    assert!(matches!(err, WalletError::WrongPin));
    assert_eq!(wallet.status(), WalletStatus::Locked);
}

/// A frame dispatched against a still-locked wallet (`GET_ADDRESS`/`SIGN_TX`)
/// reports `Status::Locked` rather than leaking whether the payload was
/// otherwise well-formed.
#[test]
fn locked_wallet_rejects_signing_over_the_wire() {
    let mut wallet = Wallet::new();
    let mut rng = CountingRng(3);
    let mut receiver = FrameReceiver::new();

    let mut sign_payload = [0u8; 36];
    sign_payload[..32].copy_from_slice(&[0x22u8; 32]);
    let request = encode_request(Command::SignTx as u8, &sign_payload);
    let response = drive(&mut receiver, &mut wallet, &mut rng, &request);

    assert_eq!(response[2], Status::Locked as u8);
}
