use crate::SectorId;
use crate::error::Error;

/// Tracks which sector ids are in use. Sector 0 holds the file table header and is never handed
/// out.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SectorAllocator {
    used: u64,
    sectors: u8,
}

impl SectorAllocator {
    /// `sectors` is the number of ids managed, including the header sector. At most 64.
    pub(crate) fn new(sectors: u8) -> Self {
        debug_assert!(sectors as u32 <= u64::BITS);
        Self { used: 1, sectors }
    }

    /// Returns the lowest free sector id and marks it as used.
    pub(crate) fn allocate(&mut self) -> Result<SectorId, Error> {
        let id = (1..self.sectors)
            .find(|&id| !self.is_used(SectorId(id)))
            .ok_or(Error::OutOfSpace)?;
        self.used |= 1u64 << id;
        Ok(SectorId(id))
    }

    pub(crate) fn mark_used(&mut self, id: SectorId) {
        if id.0 < self.sectors {
            self.used |= 1u64 << id.0;
        }
    }

    pub(crate) fn release(&mut self, id: SectorId) {
        if id.0 != 0 && id.0 < self.sectors {
            self.used &= !(1u64 << id.0);
        }
    }

    pub(crate) fn is_used(&self, id: SectorId) -> bool {
        id.0 < self.sectors && self.used & (1u64 << id.0) != 0
    }

    pub(crate) fn free_count(&self) -> u8 {
        self.sectors - (self.used.count_ones() as u8)
    }
}
