use thiserror::Error;

/// Errors that can occur during storage operations. Marked as non-exhaustive to allow for future
/// additions without breaking the API. A caller would usually only need to handle `NotFound`,
/// `OutOfSpace` and the flash failures, the remaining variants report misuse or misconfiguration.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The partition offset has to be aligned to the size of a flash sector (4k)
    #[error("invalid partition offset")]
    InvalidPartitionOffset,

    /// The partition size has to be a multiple of the flash sector size (4k) and span between
    /// 2 and 64 sectors.
    #[error("invalid partition size")]
    InvalidPartitionSize,

    /// The read, write or erase granularity of the flash does not fit the sector layout.
    #[error("unsupported flash geometry")]
    UnsupportedGeometry,

    /// The flash driver reported an error while reading.
    #[error("flash read failed")]
    FlashReadFailure,

    /// The flash driver reported an error while programming.
    #[error("flash write failed")]
    FlashWriteFailure,

    /// The flash driver reported an error while erasing a sector.
    #[error("flash erase failed")]
    FlashEraseFailure,

    /// Every sector id is in use. Sectors are never reused unless `reclaim` is called.
    #[error("out of space")]
    OutOfSpace,

    /// Every compaction journal slot is in use.
    #[error("compaction journal full")]
    JournalFull,

    /// No file with the given name or handle exists.
    #[error("file not found")]
    NotFound,

    /// The first four bytes of a name must not all be 0xFF, that pattern marks a free sector.
    #[error("invalid file name")]
    InvalidName,

    /// The requested range leaves the file's sector or the partition.
    #[error("out of bounds")]
    OutOfBounds,

    /// A previous flash failure left the storage in an unknown state. Create a new
    /// `StorageEngine` to run the startup recovery.
    #[error("storage faulted")]
    Faulted,

    /// Reclaiming backup sectors leaves holes in the sector chain, which a contiguous scan would
    /// stop at.
    #[error("reclaim requires a full scan")]
    ReclaimRequiresFullScan,
}

impl Error {
    /// Whether the error was reported by the flash driver itself.
    pub fn is_flash_failure(&self) -> bool {
        matches!(
            self,
            Error::FlashReadFailure | Error::FlashWriteFailure | Error::FlashEraseFailure
        )
    }
}
