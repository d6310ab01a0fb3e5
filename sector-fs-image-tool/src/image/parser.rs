use sector_fs::{
    Config,
    ScanMode,
    StorageEngine,
    MAX_FILE_SIZE,
    SECTOR_SIZE,
};

use super::{
    DataValue,
    FileEntry,
    ImageFlash,
};
use crate::error::Error;
use crate::FileImage;

const START_MAGIC: [u8; 4] = 0x1122_3344u32.to_le_bytes();

/// Parse a flash image from memory.
///
/// Every sector is visited, holes left behind by reclaimed backups included.
/// The payload length is not stored on flash: trailing 0xFF bytes are cut
/// off.
pub(crate) fn parse_image_data(data: &[u8]) -> Result<FileImage, Error> {
    if !data.len().is_multiple_of(SECTOR_SIZE) || !(2..=64).contains(&(data.len() / SECTOR_SIZE)) {
        return Err(Error::InvalidImageSize(data.len()));
    }

    // opening an unformatted image would format it
    if data[..START_MAGIC.len()] != START_MAGIC {
        return Err(Error::NotFormatted);
    }

    let mut flash = ImageFlash::from_bytes(data.to_vec());
    let config = Config::new(0, data.len()).with_scan(ScanMode::Full);
    let mut storage = StorageEngine::with_config(config, &mut flash)?;

    let mut handles: Vec<_> = storage.files().collect();
    handles.sort_by_key(|(_, handle)| *handle);

    let mut image = FileImage { files: vec![] };
    for (name, handle) in handles {
        let name = std::str::from_utf8(name.trimmed())
            .map_err(|_| Error::InvalidName(format!("{:?}", name)))?
            .to_string();

        let mut payload = storage.read(handle, 0, MAX_FILE_SIZE)?;
        let len = payload
            .iter()
            .rposition(|&b| b != 0xFF)
            .map_or(0, |last| last + 1);
        payload.truncate(len);

        image
            .files
            .push(FileEntry::new_data(name, DataValue::from_payload(payload)));
    }

    Ok(image)
}
