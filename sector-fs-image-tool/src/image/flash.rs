use embedded_storage::nor_flash::{
    ErrorType,
    NorFlash,
    NorFlashErrorKind,
    ReadNorFlash,
};
use sector_fs::platform::WriteProtection;
use sector_fs::SECTOR_SIZE;

/// A flash image held in memory. Programming clears bits like real NOR
/// flash, so writing over programmed bytes without an erase corrupts them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFlash {
    data: Vec<u8>,
}

impl ImageFlash {
    /// An erased image of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0xFF; size],
        }
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn range(&self, offset: u32, len: usize) -> Result<std::ops::Range<usize>, NorFlashErrorKind> {
        let start = offset as usize;
        let end = start
            .checked_add(len)
            .ok_or(NorFlashErrorKind::OutOfBounds)?;
        if end > self.data.len() {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl ErrorType for ImageFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for ImageFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl NorFlash for ImageFlash {
    const WRITE_SIZE: usize = 1;

    const ERASE_SIZE: usize = SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from > to {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        if !(from as usize).is_multiple_of(SECTOR_SIZE) || !(to as usize).is_multiple_of(SECTOR_SIZE)
        {
            return Err(NorFlashErrorKind::NotAligned);
        }
        let range = self.range(from, (to - from) as usize)?;
        self.data[range].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        for (cell, &byte) in self.data[range].iter_mut().zip(bytes) {
            *cell &= byte;
        }
        Ok(())
    }
}

// nothing to unlock in memory
impl WriteProtection for ImageFlash {
    fn set_write_protection(&mut self, _enabled: bool) {}
}
