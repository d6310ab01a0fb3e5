//! Overwriting bytes on NOR flash needs the containing sector to be erased. Compaction mirrors the
//! sector into a backup sector, erases it and copies everything back except the range that is
//! about to be written.
//!
//! Each step is recorded in the journal (see `journal.rs`) so a compaction interrupted by a power
//! loss is finished on the next start.

use crate::error::Error;
use crate::platform::Platform;
use crate::raw::{
    COPY_CHUNK_SIZE, CompactionState, FLASH_SECTOR_SIZE, erase_sector, is_erased, write_aligned,
};
use crate::{ScanMode, SectorId, StorageEngine};
use core::ops::Range;
#[cfg(feature = "defmt")]
use defmt::trace;

impl<T: Platform> StorageEngine<T> {
    /// Makes `range` (relative to the sector start) of sector `id` writable. The rest of the sector
    /// keeps its content.
    pub(crate) fn prepare_write(&mut self, id: SectorId, range: Range<usize>) -> Result<(), Error> {
        if self.is_range_erased(id, &range)? {
            return Ok(());
        }

        #[cfg(feature = "defmt")]
        trace!("prepare_write: sector {} [{}..{}]", id.0, range.start, range.end);

        #[cfg(feature = "debug-logs")]
        println!("internal: prepare_write: sector {} {range:?}", id.0);

        if self.journal.free_slots() == 0 {
            return Err(Error::JournalFull);
        }
        let backup = self.allocator.allocate()?;

        let index = self.journal.begin(&mut self.hal, id, backup)?;

        let backup_address = self.sector_address(backup);
        erase_sector(&mut self.hal, backup_address)?;
        self.copy_sector(id, backup, None)?;
        self.journal
            .advance(&mut self.hal, index, CompactionState::BackedUp)?;

        let source_address = self.sector_address(id);
        erase_sector(&mut self.hal, source_address)?;
        self.journal
            .advance(&mut self.hal, index, CompactionState::Erased)?;

        self.copy_sector(backup, id, Some(range))?;
        self.journal
            .advance(&mut self.hal, index, CompactionState::Restored)?;

        Ok(())
    }

    /// Probes the bytes of `range` chunk by chunk and stops at the first written byte.
    fn is_range_erased(&mut self, id: SectorId, range: &Range<usize>) -> Result<bool, Error> {
        let address = self.sector_address(id);
        let mut buf = [0u8; COPY_CHUNK_SIZE];

        let first_chunk = range.start - range.start % COPY_CHUNK_SIZE;
        for chunk_start in (first_chunk..range.end).step_by(COPY_CHUNK_SIZE) {
            self.hal
                .read(address + chunk_start as u32, &mut buf)
                .map_err(|_| Error::FlashReadFailure)?;

            let lo = range.start.max(chunk_start) - chunk_start;
            let hi = range.end.min(chunk_start + COPY_CHUNK_SIZE) - chunk_start;
            if !is_erased(&buf[lo..hi]) {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Copies sector `from` into the erased sector `to`. Bytes inside `keep_erased` are not copied
    /// and stay erased in `to`. Chunks without data are skipped.
    pub(crate) fn copy_sector(
        &mut self,
        from: SectorId,
        to: SectorId,
        keep_erased: Option<Range<usize>>,
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("copy_sector: {} -> {}", from.0, to.0);

        let source = self.sector_address(from);
        let target = self.sector_address(to);
        let mut buf = [0u8; COPY_CHUNK_SIZE];

        for chunk_start in (0..FLASH_SECTOR_SIZE).step_by(COPY_CHUNK_SIZE) {
            self.hal
                .read(source + chunk_start as u32, &mut buf)
                .map_err(|_| Error::FlashReadFailure)?;

            if let Some(range) = &keep_erased {
                let chunk_end = chunk_start + COPY_CHUNK_SIZE;
                if range.start < chunk_end && chunk_start < range.end {
                    let lo = range.start.max(chunk_start) - chunk_start;
                    let hi = range.end.min(chunk_end) - chunk_start;
                    buf[lo..hi].fill(0xFF);
                }
            }

            if is_erased(&buf) {
                continue;
            }

            write_aligned(&mut self.hal, target + chunk_start as u32, &buf)?;
        }

        Ok(())
    }

    pub(crate) fn reclaim_backups(&mut self) -> Result<usize, Error> {
        if self.scan != ScanMode::Full {
            return Err(Error::ReclaimRequiresFullScan);
        }

        #[cfg(feature = "defmt")]
        trace!("reclaim_backups");

        let mut reclaimed = 0;
        for index in 0..self.journal.records().len() {
            let record = self.journal.records()[index].clone();
            if record.state != CompactionState::Restored || !self.is_file_sector(record.backup) {
                continue;
            }

            #[cfg(feature = "debug-logs")]
            println!("internal: reclaim: sector {}", record.backup.0);

            let address = self.sector_address(record.backup);
            erase_sector(&mut self.hal, address)?;
            self.journal
                .advance(&mut self.hal, index, CompactionState::Reclaimed)?;
            self.allocator.release(record.backup);
            reclaimed += 1;
        }

        // A full journal whose records are all done can start over. Power loss between the erase
        // and the magic write loses the file table.
        if self.journal.free_slots() == 0 && self.journal.is_settled() {
            self.format()?;
        }

        Ok(reclaimed)
    }
}
