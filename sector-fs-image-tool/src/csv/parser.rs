use std::collections::HashSet;
use std::path::Path;

use base64::Engine;

use crate::error::Error;
use crate::image::{
    validate_name,
    DataValue,
    FileEncoding,
    FileEntry,
};
use crate::FileImage;

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    name: String,
    #[serde(rename = "type")]
    entry_type: String,
    encoding: String,
    value: String,
}

/// Parse a CSV manifest with the columns `name,type,encoding,value`.
pub(crate) fn parse_csv(content: &str) -> Result<FileImage, Error> {
    let mut image = FileImage { files: vec![] };
    let mut names = HashSet::new();
    let mut reader = csv::Reader::from_reader(content.as_bytes());

    for result in reader.deserialize() {
        let row: CsvRow = result?;
        validate_name(&row.name)?;
        if !names.insert(row.name.clone()) {
            return Err(Error::DuplicateName(row.name));
        }
        image.files.push(parse_row(row)?);
    }

    Ok(image)
}

fn parse_row(row: CsvRow) -> Result<FileEntry, Error> {
    match row.entry_type.as_str() {
        "data" => {
            let value = parse_value(&row.value, &row.encoding)?;
            Ok(FileEntry::new_data(row.name, value))
        }
        "file" => {
            if row.value.is_empty() {
                return Err(Error::InvalidValue(
                    "file entries must have a file path".to_string(),
                ));
            }
            let encoding: FileEncoding = row.encoding.parse()?;
            let file_path = Path::new(&row.value).to_path_buf();
            Ok(FileEntry::new_file(row.name, encoding, file_path))
        }
        _ => Err(Error::InvalidType(row.entry_type)),
    }
}

fn parse_value(value: &str, encoding: &str) -> Result<DataValue, Error> {
    match encoding {
        "string" => Ok(DataValue::String(value.to_string())),
        "hex2bin" => Ok(DataValue::Binary(hex::decode(value.trim())?)),
        "base64" => Ok(DataValue::Binary(
            base64::engine::general_purpose::STANDARD.decode(value.trim())?,
        )),
        "" => Err(Error::InvalidEncoding(
            "data entries must have an encoding".to_string(),
        )),
        _ => Err(Error::InvalidEncoding(encoding.to_string())),
    }
}
