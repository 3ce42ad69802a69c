//! Secure-boot verifier: firmware header validation, digest check, and a
//! wear-leveled anti-rollback counter.
//!
//! Grounded on the original firmware's `bootloader.c`: same header layout,
//! same `FIRMWARE_HEADER_OFFSET`/`FIRMWARE_START_OFFSET` constants, same
//! wear-leveling scheme for the rollback sector. Unlike the source, the
//! Ed25519 signature check is mandatory for `BootStatus::Ok` rather than a
//! commented-out TODO (§4.H step 5).

use crate::crypto::ed25519;
use crate::crypto::sha256::Sha256;
use crate::crypto::util::ct_eq;
use crate::flash::{FlashRegion, FlashResult, SECTOR_SIZE};

use core::fmt;

/// "LWCF" little-endian, matching the original `FIRMWARE_MAGIC`.
pub const MAGIC: u32 = 0x4C43_5746;
pub const HEADER_SIZE: usize = 256;
pub const MAX_FIRMWARE_SIZE: u32 = 2 * 1024 * 1024;
const ROLLBACK_SLOT_COUNT: usize = 1024;
const ROLLBACK_SLOT_SIZE: usize = 4;
const ERASED_SLOT: u32 = 0xFFFF_FFFF;

/// Flash offsets for the firmware image, matching §6 of the design notes.
/// Overridable by the integrator (e.g. for host-side tests against a
/// smaller [`crate::flash::FakeFlash`]) rather than hardwired.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub header_offset: u32,
    pub firmware_start_offset: u32,
    pub rollback_sector_offset: u32,
}

impl Layout {
    /// The offsets used by the original firmware: 64 KiB bootloader
    /// reservation, header immediately after, rollback sector at 0xF000.
    pub const fn default_rp2350() -> Self {
        Layout {
            header_offset: 0x0001_0000,
            firmware_start_offset: 0x0001_0100,
            rollback_sector_offset: 0x0000_F000,
        }
    }
}

/// Outcome of [`verify`]. Any non-`Ok` variant means the platform layer
/// must route to recovery mode rather than jump to the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStatus {
    Ok,
    NoFirmware,
    InvalidMagic,
    InvalidSize,
    InvalidHash,
    InvalidSignature,
    RollbackDetected,
}

impl fmt::Display for BootStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootStatus::Ok => write!(f, "firmware verified"),
            BootStatus::NoFirmware => write!(f, "no firmware header found"),
            BootStatus::InvalidMagic => write!(f, "firmware header magic mismatch"),
            BootStatus::InvalidSize => write!(f, "firmware size out of range"),
            BootStatus::InvalidHash => write!(f, "firmware digest mismatch"),
            BootStatus::InvalidSignature => write!(f, "firmware signature invalid"),
            BootStatus::RollbackDetected => write!(f, "rollback counter regressed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BootStatus {}

/// The 256-byte packed firmware header, decoded field-by-field rather than
/// relied on as a `#[repr(C)]` overlay (design note: packed structs with a
/// fixed memory layout should be a byte-level format with explicit
/// encode/decode, not struct-layout reliance).
#[derive(Debug, Clone)]
pub struct FirmwareHeader {
    pub magic: u32,
    pub version: u32,
    pub size: u32,
    pub entry: u32,
    pub digest: [u8; 32],
    pub signature: [u8; 64],
    pub rollback: u32,
    pub flags: u32,
}

impl FirmwareHeader {
    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Self {
        FirmwareHeader {
            magic: u32::from_le_bytes(buf[0..4].try_into().unwrap()),
            version: u32::from_le_bytes(buf[4..8].try_into().unwrap()),
            size: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            entry: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            digest: buf[16..48].try_into().unwrap(),
            signature: buf[48..112].try_into().unwrap(),
            rollback: u32::from_le_bytes(buf[112..116].try_into().unwrap()),
            flags: u32::from_le_bytes(buf[116..120].try_into().unwrap()),
        }
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.entry.to_le_bytes());
        buf[16..48].copy_from_slice(&self.digest);
        buf[48..112].copy_from_slice(&self.signature);
        buf[112..116].copy_from_slice(&self.rollback.to_le_bytes());
        buf[116..120].copy_from_slice(&self.flags.to_le_bytes());
        buf
    }
}

/// The wear-leveled anti-rollback counter store: a 4 KiB sector treated as
/// 1024 four-byte slots, "unused" meaning all-ones.
pub struct RollbackStore {
    sector_offset: u32,
}

impl RollbackStore {
    pub const fn new(sector_offset: u32) -> Self {
        RollbackStore { sector_offset }
    }

    /// Returns the maximum value among all non-erased slots, or 0 if the
    /// sector is entirely erased.
    pub fn read<F: FlashRegion>(&self, flash: &F) -> FlashResult<u32> {
        let mut max = 0u32;
        let mut slot = [0u8; ROLLBACK_SLOT_SIZE];
        for i in 0..ROLLBACK_SLOT_COUNT {
            flash.read(self.sector_offset + (i * ROLLBACK_SLOT_SIZE) as u32, &mut slot)?;
            let value = u32::from_le_bytes(slot);
            if value != ERASED_SLOT && value > max {
                max = value;
            }
        }
        Ok(max)
    }

    /// Programs `value` into the first erased slot; if the sector is full,
    /// erases it first and programs slot 0.
    pub fn write<F: FlashRegion>(&self, flash: &mut F, value: u32) -> FlashResult<()> {
        let mut slot = [0u8; ROLLBACK_SLOT_SIZE];
        let mut free_slot = None;
        for i in 0..ROLLBACK_SLOT_COUNT {
            flash.read(self.sector_offset + (i * ROLLBACK_SLOT_SIZE) as u32, &mut slot)?;
            if u32::from_le_bytes(slot) == ERASED_SLOT {
                free_slot = Some(i);
                break;
            }
        }

        let slot_index = match free_slot {
            Some(i) => i,
            None => {
                flash.erase_sector(self.sector_offset)?;
                0
            }
        };

        flash.program(
            self.sector_offset + (slot_index * ROLLBACK_SLOT_SIZE) as u32,
            &value.to_le_bytes(),
        )
    }
}

/// Result of a successful [`verify`]: the verified header plus the entry
/// address the platform layer should hand off to. The actual jump (disable
/// interrupts, load stack pointer, branch) is outside this crate's scope —
/// architecture-specific inline assembly the surrounding firmware performs
/// once it sees [`BootStatus::Ok`].
pub struct VerifiedFirmware {
    pub header: FirmwareHeader,
    pub entry_address: u32,
}

/// Runs the full secure-boot sequence (§4.H) against `flash` using
/// `layout`, checking the firmware's signature against `boot_public_key`.
///
/// On success, updates the rollback store if `header.rollback` advanced and
/// returns the verified header. On any failure, returns the corresponding
/// [`BootStatus`] and never touches the rollback store.
pub fn verify<F: FlashRegion>(
    flash: &mut F,
    layout: &Layout,
    boot_public_key: &[u8; ed25519::PUBLIC_KEY_SIZE],
) -> Result<VerifiedFirmware, BootStatus> {
    let mut header_buf = [0u8; HEADER_SIZE];
    if flash.read(layout.header_offset, &mut header_buf).is_err() {
        return Err(BootStatus::NoFirmware);
    }
    let header = FirmwareHeader::decode(&header_buf);

    if header.magic != MAGIC {
        return Err(BootStatus::InvalidMagic);
    }
    if header.size == 0 || header.size > MAX_FIRMWARE_SIZE {
        return Err(BootStatus::InvalidSize);
    }

    let computed_digest = hash_firmware_region(flash, layout.firmware_start_offset, header.size)
        .map_err(|_| BootStatus::InvalidHash)?;
    if !ct_eq(&computed_digest, &header.digest) {
        return Err(BootStatus::InvalidHash);
    }

    let rollback_store = RollbackStore::new(layout.rollback_sector_offset);
    let stored_counter = rollback_store.read(flash).map_err(|_| BootStatus::InvalidHash)?;
    if header.rollback < stored_counter {
        return Err(BootStatus::RollbackDetected);
    }

    ed25519::verify(boot_public_key, &header.digest, &header.signature)
        .map_err(|_| BootStatus::InvalidSignature)?;

    if header.rollback > stored_counter {
        rollback_store
            .write(flash, header.rollback)
            .map_err(|_| BootStatus::InvalidHash)?;
    }

    let entry_address = layout.firmware_start_offset + header.entry;
    Ok(VerifiedFirmware { header, entry_address })
}

fn hash_firmware_region<F: FlashRegion>(flash: &F, start: u32, size: u32) -> FlashResult<[u8; 32]> {
    let mut hasher = Sha256::new();
    let mut chunk = [0u8; 256];
    let mut remaining = size;
    let mut offset = start;
    while remaining > 0 {
        let take = core::cmp::min(remaining, chunk.len() as u32) as usize;
        flash.read(offset, &mut chunk[..take])?;
        hasher.update(&chunk[..take]);
        offset += take as u32;
        remaining -= take as u32;
    }
    Ok(hasher.finalize())
}

#[cfg(all(test, feature = "alloc"))]
mod tests {
    use super::*;
    use crate::crypto::ed25519::Keypair;
    use crate::crypto::sha256::sha256;
    use crate::crypto::SecureRng;
    use crate::flash::FakeFlash;

    struct FixedRng(u8);
    impl SecureRng for FixedRng {
        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for b in dest.iter_mut() {
                *b = self.0;
                self.0 = self.0.wrapping_add(1);
            }
        }
    }

    // The rollback sector must sit clear of the firmware body region
    // (`firmware_start_offset .. firmware_start_offset + body.len()`); the
    // largest body used below is 4096 bytes, so 8192 leaves a full sector
    // of headroom.
    const LAYOUT: Layout = Layout {
        header_offset: 0,
        firmware_start_offset: HEADER_SIZE as u32,
        rollback_sector_offset: 8192,
    };

    fn flash_with_firmware(body: &[u8], rollback: u32, signing_key: &Keypair) -> FakeFlash {
        let mut flash = FakeFlash::new(8192 + SECTOR_SIZE);
        flash.program(LAYOUT.firmware_start_offset, body).unwrap();

        let digest = sha256(body);
        let signature = signing_key.sign(&digest);

        let header = FirmwareHeader {
            magic: MAGIC,
            version: 1,
            size: body.len() as u32,
            entry: 0,
            digest,
            signature,
            rollback,
            flags: 0,
        };
        flash.program(LAYOUT.header_offset, &header.encode()).unwrap();
        flash
    }

    #[test]
    fn s1_boot_happy_path_updates_rollback() {
        let mut rng = FixedRng(1);
        let signer = Keypair::generate(&mut rng);
        let body = vec![0x42u8; 4096];
        let mut flash = flash_with_firmware(&body, 1, &signer);

        let result = verify(&mut flash, &LAYOUT, signer.public_key()).unwrap();
        assert_eq!(result.header.size, 4096);

        let stored = RollbackStore::new(LAYOUT.rollback_sector_offset).read(&flash).unwrap();
        assert_eq!(stored, 1);
    }

    #[test]
    fn s2_rollback_attack_is_detected() {
        let mut rng = FixedRng(2);
        let signer = Keypair::generate(&mut rng);
        let body = vec![0x11u8; 512];
        let mut flash = flash_with_firmware(&body, 0, &signer);

        RollbackStore::new(LAYOUT.rollback_sector_offset).write(&mut flash, 5).unwrap();

        let err = verify(&mut flash, &LAYOUT, signer.public_key()).unwrap_err();
        assert_eq!(err, BootStatus::RollbackDetected);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut flash = FakeFlash::new(8192 + SECTOR_SIZE);
        flash.program(0, &[0u8; HEADER_SIZE]).unwrap();
        let err = verify(&mut flash, &LAYOUT, &[0u8; 32]).unwrap_err();
        assert_eq!(err, BootStatus::InvalidMagic);
    }

    #[test]
    fn rejects_oversized_firmware() {
        let mut rng = FixedRng(3);
        let signer = Keypair::generate(&mut rng);
        let mut flash = FakeFlash::new(8192 + SECTOR_SIZE);
        let header = FirmwareHeader {
            magic: MAGIC,
            version: 1,
            size: MAX_FIRMWARE_SIZE + 1,
            entry: 0,
            digest: [0u8; 32],
            signature: [0u8; 64],
            rollback: 0,
            flags: 0,
        };
        flash.program(0, &header.encode()).unwrap();
        let err = verify(&mut flash, &LAYOUT, signer.public_key()).unwrap_err();
        assert_eq!(err, BootStatus::InvalidSize);
    }

    #[test]
    fn rejects_tampered_firmware_body() {
        let mut rng = FixedRng(4);
        let signer = Keypair::generate(&mut rng);
        let body = vec![0x77u8; 1024];
        let mut flash = flash_with_firmware(&body, 0, &signer);

        flash.program(LAYOUT.firmware_start_offset, &[0x00u8; 1]).unwrap();

        let err = verify(&mut flash, &LAYOUT, signer.public_key()).unwrap_err();
        assert_eq!(err, BootStatus::InvalidHash);
    }

    #[test]
    fn rejects_signature_from_wrong_key() {
        let mut rng_signer = FixedRng(5);
        let signer = Keypair::generate(&mut rng_signer);
        let mut rng_other = FixedRng(123);
        let other = Keypair::generate(&mut rng_other);

        let body = vec![0x05u8; 256];
        let mut flash = flash_with_firmware(&body, 0, &signer);

        let err = verify(&mut flash, &LAYOUT, other.public_key()).unwrap_err();
        assert_eq!(err, BootStatus::InvalidSignature);
    }

    #[test]
    fn rollback_store_wear_levels_then_erases_on_overflow() {
        let mut flash = FakeFlash::new(SECTOR_SIZE);
        let store = RollbackStore::new(0);

        for value in 1..=ROLLBACK_SLOT_COUNT as u32 {
            store.write(&mut flash, value).unwrap();
            assert_eq!(store.read(&flash).unwrap(), value);
        }

        // Sector is now full; the next write must erase and restart at slot 0.
        store.write(&mut flash, 9999).unwrap();
        assert_eq!(store.read(&flash).unwrap(), 9999);

        let mut slot0 = [0u8; 4];
        flash.read(0, &mut slot0).unwrap();
        assert_eq!(u32::from_le_bytes(slot0), 9999);
    }
}
