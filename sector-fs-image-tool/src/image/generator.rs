use std::collections::HashSet;
use std::fs::read;

use base64::Engine;
use sector_fs::{
    FileName,
    StorageEngine,
    MAX_FILE_SIZE,
    SECTOR_SIZE,
};

use super::{
    validate_name,
    DataValue,
    FileContent,
    FileEncoding,
    ImageFlash,
};
use crate::error::Error;
use crate::FileImage;

/// Generate a flash image in memory. Files are created in manifest order, so
/// the first file lands in sector 1.
pub(crate) fn generate_image_data(image: &FileImage, size: usize) -> Result<Vec<u8>, Error> {
    if !size.is_multiple_of(SECTOR_SIZE) || !(2..=64).contains(&(size / SECTOR_SIZE)) {
        return Err(Error::InvalidImageSize(size));
    }

    let mut flash = ImageFlash::new(size);
    let mut storage = StorageEngine::new(0, size, &mut flash)?;
    let mut seen = HashSet::new();

    for file in &image.files {
        validate_name(&file.name)?;
        if !seen.insert(file.name.as_str()) {
            return Err(Error::DuplicateName(file.name.clone()));
        }

        // Resolve the payload, reading referenced files at generation time.
        let resolved;
        let value = match &file.content {
            FileContent::Data(value) => value,
            FileContent::File {
                encoding,
                file_path,
            } => {
                let content = read(file_path)?;
                resolved = parse_file_content(&content, encoding)?;
                &resolved
            }
        };

        let payload = value.as_bytes();
        if payload.len() > MAX_FILE_SIZE {
            return Err(Error::FileTooLarge {
                name: file.name.clone(),
                size: payload.len(),
                max: MAX_FILE_SIZE,
            });
        }

        let handle = storage.open(&FileName::from_str(&file.name))?;
        storage.write(handle, payload, 0)?;
    }

    drop(storage);
    Ok(flash.into_bytes())
}

fn parse_file_content(content: &[u8], encoding: &FileEncoding) -> Result<DataValue, Error> {
    match encoding {
        FileEncoding::String => {
            let s = String::from_utf8(content.to_vec())
                .map_err(|e| Error::InvalidValue(format!("file is not valid UTF-8: {}", e)))?;
            Ok(DataValue::String(s))
        }
        FileEncoding::Hex2Bin => {
            let text = std::str::from_utf8(content)
                .map_err(|e| Error::InvalidValue(format!("hex file is not valid UTF-8: {}", e)))?;
            Ok(DataValue::Binary(hex::decode(text.trim())?))
        }
        FileEncoding::Base64 => {
            let text = std::str::from_utf8(content).map_err(|e| {
                Error::InvalidValue(format!("base64 file is not valid UTF-8: {}", e))
            })?;
            Ok(DataValue::Binary(
                base64::engine::general_purpose::STANDARD.decode(text.trim())?,
            ))
        }
        FileEncoding::Binary => Ok(DataValue::Binary(content.to_vec())),
    }
}
