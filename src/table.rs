use crate::{FileName, Handle, SectorId};
use alloc::collections::BTreeMap;

/// In-memory index of all files. Rebuilt from flash on startup, entries are never removed.
#[derive(Default)]
pub(crate) struct FileTable {
    entries: BTreeMap<FileName, SectorId>,
}

impl FileTable {
    pub(crate) fn lookup(&self, name: &FileName) -> Option<SectorId> {
        self.entries.get(name).copied()
    }

    /// Records a file whose name header has already been written to `id`.
    pub(crate) fn register(&mut self, name: FileName, id: SectorId) -> Handle {
        self.entries.insert(name, id);
        id.into()
    }

    /// Resolves a handle back to the sector of an open file.
    pub(crate) fn sector_of(&self, handle: Handle) -> Option<SectorId> {
        self.entries
            .values()
            .copied()
            .find(|id| Handle::from(*id) == handle)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&FileName, SectorId)> {
        self.entries.iter().map(|(name, id)| (name, *id))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
