use crate::error::Error;
use crate::journal::Journal;
use crate::platform::Platform;
use crate::raw::{
    CompactionState, ERASED_WORD, FLASH_SECTOR_SIZE, NAME_SIZE, START_MAGIC, START_MAGIC_SIZE,
    erase_sector, read_aligned, write_aligned,
};
use crate::{FileName, Handle, ScanMode, SectorId, StorageEngine};
use alloc::collections::BTreeSet;
#[cfg(feature = "defmt")]
use defmt::{trace, warn};

impl<T: Platform> StorageEngine<T> {
    pub(crate) fn sector_address(&self, id: SectorId) -> u32 {
        (self.base_address + id.offset()) as u32
    }

    pub(crate) fn is_file_sector(&self, id: SectorId) -> bool {
        id.0 != 0 && id.0 < self.sectors
    }

    pub(crate) fn load(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("load: @{:#08x}", self.base_address);

        #[cfg(feature = "debug-logs")]
        println!("internal: load");

        let mut magic = [0u8; START_MAGIC_SIZE];
        read_aligned(&mut self.hal, self.base_address as u32, &mut magic)?;

        if u32::from_le_bytes(magic) != START_MAGIC {
            #[cfg(feature = "debug-logs")]
            println!("internal: load: file table not initialized");

            return self.format();
        }

        self.journal = Journal::load(&mut self.hal, self.base_address)?;
        self.recover()?;
        self.scan_sectors()
    }

    /// Erases the header sector and writes the start magic. File sectors are left untouched.
    pub(crate) fn format(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("format");

        erase_sector(&mut self.hal, self.base_address as u32)?;
        write_aligned(
            &mut self.hal,
            self.base_address as u32,
            &START_MAGIC.to_le_bytes(),
        )?;
        self.journal = Journal::empty(self.base_address);

        Ok(())
    }

    /// Brings every compaction that was cut short back to a state where the source sector holds
    /// its data. The write that triggered the compaction is lost.
    fn recover(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("recover");

        for index in 0..self.journal.records().len() {
            let record = self.journal.records()[index].clone();
            if !record.state.is_interrupted() {
                continue;
            }

            if !self.is_file_sector(record.source) || !self.is_file_sector(record.backup) {
                #[cfg(feature = "defmt")]
                warn!("recover: slot {} refers to invalid sectors", record.slot);
                continue;
            }

            #[cfg(feature = "debug-logs")]
            println!(
                "internal: recover: slot {} in {}: {} -> {}",
                record.slot, record.state, record.backup.0, record.source.0
            );

            // the source was not touched before the backup was complete
            if record.state != CompactionState::BackingUp {
                let source = self.sector_address(record.source);
                erase_sector(&mut self.hal, source)?;
                self.copy_sector(record.backup, record.source, None)?;
            }

            self.journal
                .advance(&mut self.hal, index, CompactionState::Restored)?;
        }

        Ok(())
    }

    fn scan_sectors(&mut self) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("scan_sectors");

        let backups: BTreeSet<SectorId> = self.journal.owned_backups().collect();
        for &id in &backups {
            self.allocator.mark_used(id);
        }

        for id in (1..self.sectors).map(SectorId) {
            if backups.contains(&id) {
                continue;
            }

            let mut header = [0u8; NAME_SIZE];
            let address = self.sector_address(id);
            read_aligned(&mut self.hal, address, &mut header)?;

            if u32::from_le_bytes([header[0], header[1], header[2], header[3]]) == ERASED_WORD {
                match self.scan {
                    ScanMode::Contiguous => {
                        #[cfg(feature = "debug-logs")]
                        println!("internal: scan: end of files at sector {}", id.0);
                        break;
                    }
                    ScanMode::Full => continue,
                }
            }

            let name = FileName::from_raw(header);
            self.allocator.mark_used(id);

            if let Some(_existing) = self.table.lookup(&name) {
                #[cfg(feature = "defmt")]
                warn!(
                    "scan: {} in sector {} shadowed by sector {}",
                    name, id.0, _existing.0
                );
                continue;
            }

            #[cfg(feature = "debug-logs")]
            println!("internal: scan: found {name:?} in sector {}", id.0);

            self.table.register(name, id);
        }

        Ok(())
    }

    pub(crate) fn create_file(&mut self, name: &FileName) -> Result<Handle, Error> {
        if !name.is_valid() {
            return Err(Error::InvalidName);
        }

        let id = self.allocator.allocate()?;

        #[cfg(feature = "defmt")]
        trace!("create_file: {} in sector {}", name, id.0);

        #[cfg(feature = "debug-logs")]
        println!("internal: create_file: {name:?} in sector {}", id.0);

        let address = self.sector_address(id);
        erase_sector(&mut self.hal, address)?;
        write_aligned(&mut self.hal, address, name.as_bytes())?;

        Ok(self.table.register(*name, id))
    }

    pub(crate) fn read_file(
        &mut self,
        handle: Handle,
        offset: usize,
        buf: &mut [u8],
    ) -> Result<(), Error> {
        let partition_size = self.sectors as usize * FLASH_SECTOR_SIZE;
        let start = (handle.offset() as usize)
            .checked_add(NAME_SIZE)
            .and_then(|it| it.checked_add(offset))
            .ok_or(Error::OutOfBounds)?;
        let end = start.checked_add(buf.len()).ok_or(Error::OutOfBounds)?;
        if end > partition_size {
            return Err(Error::OutOfBounds);
        }

        if buf.is_empty() {
            return Ok(());
        }

        read_aligned(&mut self.hal, (self.base_address + start) as u32, buf)
    }

    pub(crate) fn write_file(
        &mut self,
        handle: Handle,
        data: &[u8],
        offset: usize,
    ) -> Result<(), Error> {
        let id = self.table.sector_of(handle).ok_or(Error::NotFound)?;

        let start = NAME_SIZE.checked_add(offset).ok_or(Error::OutOfBounds)?;
        let end = start.checked_add(data.len()).ok_or(Error::OutOfBounds)?;
        if end > FLASH_SECTOR_SIZE {
            return Err(Error::OutOfBounds);
        }

        if data.is_empty() {
            return Ok(());
        }

        #[cfg(feature = "defmt")]
        trace!("write_file: sector {} [{}..{}]", id.0, start, end);

        self.prepare_write(id, start..end)?;
        let address = self.sector_address(id) + start as u32;
        write_aligned(&mut self.hal, address, data)
    }
}
