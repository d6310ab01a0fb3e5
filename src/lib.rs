#![doc = include_str!("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

mod allocator;
mod compaction;
pub mod error;
mod internal;
mod journal;
pub mod platform;
mod raw;
mod table;

/// Names occupy the first 16 bytes of a file sector. Unlike C strings a 16 byte name has no
/// terminator.
pub const MAX_NAME_LENGTH: usize = raw::NAME_SIZE;

/// Bytes available to a file behind its name header.
pub const MAX_FILE_SIZE: usize = raw::PAYLOAD_SIZE;

/// Erase unit of the flash and allocation unit of the storage.
pub const SECTOR_SIZE: usize = raw::FLASH_SECTOR_SIZE;

/// A 16-byte, null-padded file name as stored in the header of a file sector.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FileName([u8; MAX_NAME_LENGTH]);

impl FileName {
    /// Creates a 16 byte, null-padded name. Longer input is truncated to 16 bytes.
    ///
    /// Usage: `FileName::from_slice(b"config")`
    pub const fn from_slice(src: &[u8]) -> Self {
        let mut dst = [0u8; MAX_NAME_LENGTH];
        let mut i = 0;
        while i < src.len() && i < MAX_NAME_LENGTH {
            dst[i] = src[i];
            i += 1;
        }
        Self(dst)
    }

    /// Creates a 16 byte, null-padded name. Longer input is truncated to 16 bytes.
    ///
    /// Tip: use a const context if possible to ensure that the name is built at compile time:
    ///   `let name = const { FileName::from_str("config") };`
    pub const fn from_str(s: &str) -> Self {
        Self::from_slice(s.as_bytes())
    }

    /// Takes a raw header as read from flash.
    pub const fn from_raw(raw: [u8; MAX_NAME_LENGTH]) -> Self {
        Self(raw)
    }

    pub const fn as_bytes(&self) -> &[u8; MAX_NAME_LENGTH] {
        &self.0
    }

    /// The name without its null padding.
    pub fn trimmed(&self) -> &[u8] {
        match self.0.iter().position(|&b| b == 0) {
            Some(end) => &self.0[..end],
            None => &self.0,
        }
    }

    /// A name must not start with the erased word, otherwise its sector would read as free.
    pub(crate) fn is_valid(&self) -> bool {
        u32::from_le_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]) != raw::ERASED_WORD
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileName(b\"")?;
        for &byte in self.trimmed() {
            write!(f, "{}", core::ascii::escape_default(byte))?;
        }
        write!(f, "\")")
    }
}

impl AsRef<[u8]> for FileName {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Identifies an open file. The value is the byte offset of the file's sector relative to the
/// partition start, which is what scripting front ends pass around as a plain integer.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Handle(u32);

impl Handle {
    pub const fn from_offset(offset: u32) -> Self {
        Self(offset)
    }

    pub const fn offset(self) -> u32 {
        self.0
    }
}

impl From<u32> for Handle {
    fn from(offset: u32) -> Self {
        Self(offset)
    }
}

impl From<Handle> for u32 {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) struct SectorId(pub(crate) u8);

impl SectorId {
    /// Byte offset relative to the partition start.
    pub(crate) const fn offset(self) -> usize {
        self.0 as usize * raw::FLASH_SECTOR_SIZE
    }
}

impl From<SectorId> for Handle {
    fn from(id: SectorId) -> Self {
        Handle(id.offset() as u32)
    }
}

/// How the startup scan walks the file sectors.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanMode {
    /// Stop at the first erased sector. Files are allocated from sector 1 upwards without gaps as
    /// long as nothing is reclaimed.
    #[default]
    Contiguous,
    /// Visit every sector of the partition and skip erased ones. Required by
    /// [`StorageEngine::reclaim`].
    Full,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Config {
    /// Has to be a multiple of [`SECTOR_SIZE`].
    pub partition_offset: usize,
    /// Has to be a multiple of [`SECTOR_SIZE`] and span 2 to 64 sectors. Sector 0 of the partition
    /// holds the file table header.
    pub partition_size: usize,
    pub scan: ScanMode,
}

impl Config {
    pub const fn new(partition_offset: usize, partition_size: usize) -> Self {
        Self {
            partition_offset,
            partition_size,
            scan: ScanMode::Contiguous,
        }
    }

    pub const fn with_scan(mut self, scan: ScanMode) -> Self {
        self.scan = scan;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    /// Sectors available for files and backups, the header sector excluded.
    pub sectors: u8,
    pub files: u8,
    /// Sectors held by compaction backups.
    pub backups: u8,
    pub free: u8,
    pub journal_free: u16,
}

pub use error::Error;

extern crate alloc;

use crate::allocator::SectorAllocator;
use crate::journal::Journal;
use crate::platform::Platform;
use crate::raw::{FLASH_SECTOR_SIZE, MAX_SECTORS};
use crate::table::FileTable;
use alloc::collections::BTreeSet;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

/// Named files on raw NOR flash. Keeps the sector bitmap, the file table and the compaction
/// journal in memory; all of them are rebuilt from flash by [`StorageEngine::new`].
pub struct StorageEngine<T: Platform> {
    pub(crate) hal: T,
    pub(crate) base_address: usize,
    pub(crate) sectors: u8,
    pub(crate) scan: ScanMode,
    pub(crate) faulted: bool,

    // set after calling self.load
    pub(crate) allocator: SectorAllocator,
    pub(crate) table: FileTable,
    pub(crate) journal: Journal,
}

impl<T: Platform> StorageEngine<T> {
    /// Reads the file table header of the partition and
    /// 1. Formats the header sector if no file table exists yet
    /// 2. Finishes compactions that were interrupted by a power loss
    /// 3. Rebuilds the file table and the sector bitmap
    pub fn new(
        partition_offset: usize,
        partition_size: usize,
        hal: T,
    ) -> Result<StorageEngine<T>, Error> {
        Self::with_config(Config::new(partition_offset, partition_size), hal)
    }

    pub fn with_config(config: Config, hal: T) -> Result<StorageEngine<T>, Error> {
        if !config.partition_offset.is_multiple_of(FLASH_SECTOR_SIZE) {
            return Err(Error::InvalidPartitionOffset);
        }

        if !config.partition_size.is_multiple_of(FLASH_SECTOR_SIZE)
            || config
                .partition_offset
                .checked_add(config.partition_size)
                .is_none_or(|end| end > hal.capacity())
        {
            return Err(Error::InvalidPartitionSize);
        }

        let sectors = config.partition_size / FLASH_SECTOR_SIZE;
        if !(2..=MAX_SECTORS).contains(&sectors) {
            return Err(Error::InvalidPartitionSize);
        }

        if !FLASH_SECTOR_SIZE.is_multiple_of(T::ERASE_SIZE)
            || !raw::COPY_CHUNK_SIZE.is_multiple_of(T::READ_SIZE)
            || !raw::COPY_CHUNK_SIZE.is_multiple_of(T::WRITE_SIZE)
        {
            return Err(Error::UnsupportedGeometry);
        }

        let mut storage = Self {
            hal,
            base_address: config.partition_offset,
            sectors: sectors as u8,
            scan: config.scan,
            faulted: false,
            allocator: SectorAllocator::new(sectors as u8),
            table: FileTable::default(),
            journal: Journal::empty(config.partition_offset),
        };

        storage.load()?;

        Ok(storage)
    }

    /// Opens a file, creating it on first use of the name.
    ///
    /// Creating a file takes one sector, erases it and writes the name header.
    pub fn open(&mut self, name: &FileName) -> Result<Handle, Error> {
        if let Some(id) = self.table.lookup(name) {
            return Ok(id.into());
        }

        if self.faulted {
            return Err(Error::Faulted);
        }

        let result = self.create_file(name);
        self.track(result)
    }

    /// Resolves a name without creating the file.
    pub fn lookup(&self, name: &FileName) -> Result<Handle, Error> {
        self.table
            .lookup(name)
            .map(Handle::from)
            .ok_or(Error::NotFound)
    }

    /// Reads `length` bytes starting at `offset` within the payload of the file.
    ///
    /// Reads are not limited to the file's sector, a read past its end returns the bytes of the
    /// following sector. Only the partition end is enforced.
    pub fn read(&mut self, handle: Handle, offset: usize, length: usize) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; length];
        self.read_into(handle, offset, &mut buf)?;
        Ok(buf)
    }

    /// Same as [`StorageEngine::read`] but fills a caller provided buffer.
    pub fn read_into(&mut self, handle: Handle, offset: usize, buf: &mut [u8]) -> Result<(), Error> {
        let result = self.read_file(handle, offset, buf);
        self.track(result)
    }

    /// Writes `data` at `offset` within the payload of the file.
    ///
    /// Writing into bytes that are still erased programs them directly. Otherwise the file's
    /// sector is compacted first, which costs one backup sector unless [`StorageEngine::reclaim`]
    /// is used.
    pub fn write(&mut self, handle: Handle, data: &[u8], offset: usize) -> Result<(), Error> {
        if self.faulted {
            return Err(Error::Faulted);
        }

        let result = self.write_file(handle, data, offset);
        self.track(result)
    }

    /// All files, ordered by name.
    pub fn files(&self) -> impl Iterator<Item = (FileName, Handle)> + '_ {
        self.table.iter().map(|(name, id)| (*name, id.into()))
    }

    pub fn statistics(&self) -> Statistics {
        let backups = self
            .journal
            .owned_backups()
            .filter(|id| id.0 != 0 && id.0 < self.sectors)
            .collect::<BTreeSet<_>>()
            .len();

        Statistics {
            sectors: self.sectors - 1,
            files: self.table.len() as u8,
            backups: backups as u8,
            free: self.allocator.free_count(),
            journal_free: self.journal.free_slots() as u16,
        }
    }

    /// Erases the backup sectors of finished compactions and returns them to the allocator.
    /// Returns the number of sectors reclaimed.
    ///
    /// Only available with [`ScanMode::Full`], as reclaimed sectors leave holes behind.
    pub fn reclaim(&mut self) -> Result<usize, Error> {
        if self.faulted {
            return Err(Error::Faulted);
        }

        let result = self.reclaim_backups();
        self.track(result)
    }

    fn track<R>(&mut self, result: Result<R, Error>) -> Result<R, Error> {
        if matches!(&result, Err(e) if e.is_flash_failure()) {
            self.faulted = true;
        }
        result
    }
}
