//! `librecrypt-sim`: a hosted simulator that drives the wallet core's wire
//! protocol end to end without any real USB transport or flash part,
//! useful for manual smoke-testing and as a runnable illustration of the
//! crate's request/response cycle.

use librecrypt_core::boot::{self, FirmwareHeader, Layout, MAGIC};
use librecrypt_core::crypto::ed25519::Keypair;
use librecrypt_core::crypto::sha256::sha256;
use librecrypt_core::crypto::SecureRng;
use librecrypt_core::flash::{FakeFlash, FlashRegion};
use librecrypt_core::protocol::{self, Command};
use librecrypt_core::wallet::Wallet;

/// Host-side RNG backed by the OS's own randomness, used only by this demo
/// binary. The library never bundles its own RNG (§6: the physical entropy
/// source is an external collaborator).
struct OsRng;

impl SecureRng for OsRng {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        use std::time::{SystemTime, UNIX_EPOCH};
        // Not cryptographically secure; a real integrator wires in a
        // hardware TRNG or a vetted userspace CSPRNG here instead.
        let mut seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64;
        for byte in dest.iter_mut() {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            *byte = (seed >> 33) as u8;
        }
    }
}

fn demo_boot_verify() {
    println!("\n-- secure boot --");

    let mut rng = OsRng;
    let boot_signer = Keypair::generate(&mut rng);

    let layout = Layout {
        header_offset: 0,
        firmware_start_offset: boot::HEADER_SIZE as u32,
        rollback_sector_offset: 64 * 1024,
    };
    let mut flash = FakeFlash::new(128 * 1024);

    let firmware_body = vec![0xABu8; 8192];
    flash
        .program(layout.firmware_start_offset, &firmware_body)
        .expect("program firmware body");

    let digest = sha256(&firmware_body);
    let header = FirmwareHeader {
        magic: MAGIC,
        version: 1,
        size: firmware_body.len() as u32,
        entry: 0,
        digest,
        signature: boot_signer.sign(&digest),
        rollback: 1,
        flags: 0,
    };
    flash
        .program(layout.header_offset, &header.encode())
        .expect("program firmware header");

    match boot::verify(&mut flash, &layout, boot_signer.public_key()) {
        Ok(verified) => println!(
            "boot verified: entry=0x{:08x} size={}",
            verified.entry_address, verified.header.size
        ),
        Err(status) => println!("boot FAILED: {status}"),
    }
}

fn demo_protocol_round_trip() {
    println!("\n-- protocol round trip --");

    let mut wallet = Wallet::new();
    let mut rng = OsRng;

    let ping = protocol::encode_request(Command::Ping as u8, &[]);
    let mut receiver = protocol::FrameReceiver::new();
    for &byte in &ping {
        if let Some(frame) = receiver.push_byte(byte) {
            let response = protocol::dispatch(&mut wallet, frame.cmd, frame.payload, &mut rng);
            println!("PING -> status=0x{:02x} data={:?}", response[2], &response[3..response.len() - 2]);
        }
    }

    let pin = b"a demo pin at least 32 bytes long!!";
    let create = protocol::encode_request(Command::CreateWallet as u8, pin);
    for &byte in &create {
        if let Some(frame) = receiver.push_byte(byte) {
            let response = protocol::dispatch(&mut wallet, frame.cmd, frame.payload, &mut rng);
            println!("CREATE_WALLET -> status=0x{:02x}", response[2]);
        }
    }

    let mut sign_payload = [0u8; 36];
    sign_payload[..32].copy_from_slice(&sha256(b"a pretend transaction"));
    let sign = protocol::encode_request(Command::SignTx as u8, &sign_payload);
    for &byte in &sign {
        if let Some(frame) = receiver.push_byte(byte) {
            let response = protocol::dispatch(&mut wallet, frame.cmd, frame.payload, &mut rng);
            println!("SIGN_TX -> status=0x{:02x} signature_len={}", response[2], response.len() - 5);
        }
    }
}

fn main() {
    env_logger::init();

    println!("LibreCrypt wallet core v{}", librecrypt_core::VERSION);
    demo_protocol_round_trip();
    demo_boot_verify();
}
