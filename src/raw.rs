use crate::error::Error;
use crate::platform::{AlignedOps, Platform};
use alloc::vec;
#[cfg(feature = "defmt")]
use defmt::trace;

pub(crate) const FLASH_SECTOR_SIZE: usize = 4096;

/// Marks sector 0 as the header of an initialized file table.
pub(crate) const START_MAGIC: u32 = 0x1122_3344;
pub(crate) const START_MAGIC_SIZE: usize = size_of::<u32>();

/// Names are stored null-padded in the first 16 bytes of a file sector.
pub(crate) const NAME_SIZE: usize = 16;
pub(crate) const PAYLOAD_SIZE: usize = FLASH_SECTOR_SIZE - NAME_SIZE;

/// The first word of every sector that has not been written since the last erase.
pub(crate) const ERASED_WORD: u32 = u32::MAX;

/// The bitmap of the sector allocator is a `u64`.
pub(crate) const MAX_SECTORS: usize = 64;

/// Sector copies and erase probes move data in chunks of this size.
pub(crate) const COPY_CHUNK_SIZE: usize = 128;

pub(crate) const JOURNAL_OFFSET: usize = 16;
pub(crate) const JOURNAL_RECORD_SIZE: usize = 8;
pub(crate) const JOURNAL_SLOTS: usize = (FLASH_SECTOR_SIZE - JOURNAL_OFFSET) / JOURNAL_RECORD_SIZE;

const _: () = assert!(
    JOURNAL_OFFSET >= START_MAGIC_SIZE
        && JOURNAL_OFFSET + JOURNAL_SLOTS * JOURNAL_RECORD_SIZE <= FLASH_SECTOR_SIZE,
    "Journal has to fit into sector 0 behind the magic"
);

const _: () = assert!(
    FLASH_SECTOR_SIZE.is_multiple_of(COPY_CHUNK_SIZE),
    "Copy chunks have to tile a sector"
);

const CSB_BACKING_UP: u32 = 0x01;
const CSB_BACKED_UP: u32 = 0x02;
const CSB_ERASED: u32 = 0x04;
const CSB_RESTORED: u32 = 0x08;
const CSB_RECLAIMED: u32 = 0x10;

/// Progress of a single compaction. Every transition clears exactly one more bit, so a record can
/// be advanced in place without erasing sector 0.
#[derive(strum::FromRepr, strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub(crate) enum CompactionState {
    // All bits set, the slot has not been claimed.
    Idle = u32::MAX,

    // Ids are recorded, the source sector is being copied into the backup sector.
    BackingUp = CompactionState::Idle as u32 & !CSB_BACKING_UP,

    // The backup sector holds a full mirror of the source sector.
    BackedUp = CompactionState::BackingUp as u32 & !CSB_BACKED_UP,

    // The source sector has been erased and is being restored from the backup.
    Erased = CompactionState::BackedUp as u32 & !CSB_ERASED,

    // The source sector holds its data again, the backup sector is dead.
    Restored = CompactionState::Erased as u32 & !CSB_RESTORED,

    // The dead backup sector was erased and handed back to the allocator.
    Reclaimed = CompactionState::Restored as u32 & !CSB_RECLAIMED,

    // Anything else found on flash.
    Corrupt = 0,
}

impl From<u32> for CompactionState {
    fn from(val: u32) -> Self {
        CompactionState::from_repr(val).unwrap_or(CompactionState::Corrupt)
    }
}

impl CompactionState {
    /// Whether the record still owns its backup sector.
    pub(crate) fn owns_backup(&self) -> bool {
        !matches!(self, CompactionState::Idle | CompactionState::Reclaimed)
    }

    /// Whether startup has to finish or undo the compaction.
    pub(crate) fn is_interrupted(&self) -> bool {
        matches!(
            self,
            CompactionState::BackingUp | CompactionState::BackedUp | CompactionState::Erased
        )
    }
}

/// On-flash journal slot: `state: u32 LE`, `source: u8`, `backup: u8` and two bytes of padding
/// that stay erased.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawJournalRecord {
    pub(crate) state: u32,
    pub(crate) source: u8,
    pub(crate) backup: u8,
}

impl RawJournalRecord {
    /// `raw` has to hold at least `JOURNAL_RECORD_SIZE` bytes.
    pub(crate) fn from_bytes(raw: &[u8]) -> Self {
        Self {
            state: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            source: raw[4],
            backup: raw[5],
        }
    }

    pub(crate) fn ids_to_bytes(&self) -> [u8; 4] {
        [self.source, self.backup, 0xFF, 0xFF]
    }
}

#[inline(always)]
pub(crate) fn is_erased(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0xFF)
}

/// Programs `bytes` at an arbitrary `offset`. Unaligned heads and tails are padded with 0xFF so the
/// neighbouring bytes within the same write word keep their content.
pub(crate) fn write_aligned<T: Platform>(
    hal: &mut T,
    offset: u32,
    bytes: &[u8],
) -> Result<(), Error> {
    #[cfg(feature = "defmt")]
    trace!("write_aligned @{:#08x}: [{}]", offset, bytes.len());

    let head = offset as usize - T::align_write_floor(offset as usize);
    if head == 0 && bytes.len().is_multiple_of(T::WRITE_SIZE) {
        hal.set_write_protection(false);
        return hal.write(offset, bytes).map_err(|_| Error::FlashWriteFailure);
    }

    let mut buf = vec![0xFFu8; T::align_write_ceil(head + bytes.len())];
    buf[head..head + bytes.len()].copy_from_slice(bytes);

    hal.set_write_protection(false);
    hal.write(offset - head as u32, &buf)
        .map_err(|_| Error::FlashWriteFailure)
}

/// Reads `bytes.len()` bytes at an arbitrary `offset`, widening the request to the read
/// granularity of the device if needed.
pub(crate) fn read_aligned<T: Platform>(
    hal: &mut T,
    offset: u32,
    bytes: &mut [u8],
) -> Result<(), Error> {
    let head = offset as usize - T::align_read_floor(offset as usize);
    if head == 0 && bytes.len().is_multiple_of(T::READ_SIZE) {
        return hal.read(offset, bytes).map_err(|_| Error::FlashReadFailure);
    }

    let mut buf = vec![0u8; T::align_read_ceil(head + bytes.len())];
    hal.read(offset - head as u32, &mut buf)
        .map_err(|_| Error::FlashReadFailure)?;
    bytes.copy_from_slice(&buf[head..head + bytes.len()]);
    Ok(())
}

pub(crate) fn erase_sector<T: Platform>(hal: &mut T, address: u32) -> Result<(), Error> {
    #[cfg(feature = "defmt")]
    trace!("erase_sector @{:#08x}", address);

    hal.set_write_protection(false);
    hal.erase(address, address + FLASH_SECTOR_SIZE as u32)
        .map_err(|_| Error::FlashEraseFailure)
}
