//! Compaction journal kept in sector 0 behind the start magic.
//!
//! Each compaction claims one slot and advances its state by clearing bits, see
//! [`CompactionState`]. The ids are written before the state, so a slot that is not `Idle` always
//! carries valid ids.

use crate::SectorId;
use crate::error::Error;
use crate::raw::{
    CompactionState, JOURNAL_OFFSET, JOURNAL_RECORD_SIZE, JOURNAL_SLOTS, RawJournalRecord,
    is_erased, read_aligned, write_aligned,
};
use crate::platform::Platform;
use alloc::vec;
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct JournalRecord {
    pub(crate) slot: usize,
    pub(crate) state: CompactionState,
    pub(crate) source: SectorId,
    pub(crate) backup: SectorId,
}

pub(crate) struct Journal {
    address: usize,
    records: Vec<JournalRecord>,
    next_slot: usize,
}

impl Journal {
    /// A journal for a freshly formatted header sector at `address`.
    pub(crate) fn empty(address: usize) -> Self {
        Self {
            address,
            records: Vec::new(),
            next_slot: 0,
        }
    }

    pub(crate) fn load<T: Platform>(hal: &mut T, address: usize) -> Result<Self, Error> {
        #[cfg(feature = "defmt")]
        trace!("journal load: @{:#08x}", address);

        let mut buf = vec![0u8; JOURNAL_SLOTS * JOURNAL_RECORD_SIZE];
        read_aligned(hal, (address + JOURNAL_OFFSET) as u32, &mut buf)?;

        let mut journal = Self::empty(address);
        for (slot, raw) in buf.chunks_exact(JOURNAL_RECORD_SIZE).enumerate() {
            if is_erased(raw) {
                break;
            }

            let raw = RawJournalRecord::from_bytes(raw);
            let state = CompactionState::from(raw.state);

            #[cfg(feature = "defmt")]
            if state == CompactionState::Corrupt {
                warn!("journal slot {} corrupt: {:#x}", slot, raw.state);
            }

            #[cfg(feature = "debug-logs")]
            println!(
                "  journal: slot {slot}: {state} {} -> {}",
                raw.source, raw.backup
            );

            journal.records.push(JournalRecord {
                slot,
                state,
                source: SectorId(raw.source),
                backup: SectorId(raw.backup),
            });
            journal.next_slot = slot + 1;
        }

        Ok(journal)
    }

    pub(crate) fn free_slots(&self) -> usize {
        JOURNAL_SLOTS - self.next_slot
    }

    pub(crate) fn records(&self) -> &[JournalRecord] {
        &self.records
    }

    /// Backup sectors that still belong to a compaction and must neither be handed out nor be
    /// mistaken for files.
    pub(crate) fn owned_backups(&self) -> impl Iterator<Item = SectorId> + '_ {
        self.records
            .iter()
            .filter(|record| record.state.owns_backup())
            .map(|record| record.backup)
    }

    /// True if no record refers to a live sector anymore.
    pub(crate) fn is_settled(&self) -> bool {
        self.records.iter().all(|record| {
            matches!(
                record.state,
                CompactionState::Idle | CompactionState::Reclaimed
            )
        })
    }

    /// Claims the next slot for a compaction of `source` into `backup` and returns the record
    /// index. The record starts in `BackingUp`.
    pub(crate) fn begin<T: Platform>(
        &mut self,
        hal: &mut T,
        source: SectorId,
        backup: SectorId,
    ) -> Result<usize, Error> {
        if self.free_slots() == 0 {
            return Err(Error::JournalFull);
        }

        let slot = self.next_slot;
        self.next_slot += 1;

        #[cfg(feature = "defmt")]
        trace!("journal begin: slot {} {} -> {}", slot, source.0, backup.0);

        let raw = RawJournalRecord {
            state: CompactionState::Idle as u32,
            source: source.0,
            backup: backup.0,
        };
        write_aligned(hal, (self.slot_address(slot) + 4) as u32, &raw.ids_to_bytes())?;

        self.records.push(JournalRecord {
            slot,
            state: CompactionState::Idle,
            source,
            backup,
        });
        let index = self.records.len() - 1;
        self.advance(hal, index, CompactionState::BackingUp)?;

        Ok(index)
    }

    pub(crate) fn advance<T: Platform>(
        &mut self,
        hal: &mut T,
        index: usize,
        state: CompactionState,
    ) -> Result<(), Error> {
        let slot = self.records[index].slot;

        #[cfg(feature = "defmt")]
        trace!("journal advance: slot {} -> {}", slot, state);

        #[cfg(feature = "debug-logs")]
        println!("  journal: slot {slot} -> {state}");

        write_aligned(hal, self.slot_address(slot) as u32, &(state as u32).to_le_bytes())?;
        self.records[index].state = state;

        Ok(())
    }

    fn slot_address(&self, slot: usize) -> usize {
        self.address + JOURNAL_OFFSET + slot * JOURNAL_RECORD_SIZE
    }
}
