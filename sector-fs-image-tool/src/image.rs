mod flash;

pub(crate) mod generator;
pub(crate) mod parser;

use std::path::PathBuf;

pub use flash::ImageFlash;
use sector_fs::MAX_NAME_LENGTH;

use crate::error::Error;

/// A single file of the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Up to 16 bytes, stored null-padded in the sector header.
    pub name: String,
    pub content: FileContent,
}

/// Inline data or a reference to a file read at generation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Data(DataValue),
    File {
        encoding: FileEncoding,
        /// Resolved relative to the manifest location.
        file_path: PathBuf,
    },
}

/// How the content of a referenced file is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEncoding {
    /// UTF-8 text.
    String,
    /// Hex-encoded binary data.
    Hex2Bin,
    /// Base64-encoded binary data.
    Base64,
    /// Raw bytes.
    Binary,
}

impl std::str::FromStr for FileEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(Self::String),
            "hex2bin" => Ok(Self::Hex2Bin),
            "base64" => Ok(Self::Base64),
            "binary" => Ok(Self::Binary),
            _ => Err(Error::InvalidEncoding(s.to_string())),
        }
    }
}

impl FileEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Hex2Bin => "hex2bin",
            Self::Base64 => "base64",
            Self::Binary => "binary",
        }
    }
}

impl std::fmt::Display for FileEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The payload of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    /// UTF-8 text without terminator.
    String(String),
    /// Opaque bytes.
    Binary(Vec<u8>),
}

impl DataValue {
    /// Return the CSV encoding column string for this value. Binary payloads
    /// are written as base64.
    pub fn encoding_str(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Binary(_) => "base64",
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::String(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    /// Text when the payload is printable UTF-8, bytes otherwise.
    pub(crate) fn from_payload(payload: Vec<u8>) -> Self {
        match String::from_utf8(payload) {
            Ok(s) if !s.chars().any(char::is_control) => Self::String(s),
            Ok(s) => Self::Binary(s.into_bytes()),
            Err(e) => Self::Binary(e.into_bytes()),
        }
    }
}

impl std::fmt::Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Binary(b) => {
                use base64::Engine;
                f.write_str(&base64::engine::general_purpose::STANDARD.encode(b))
            }
        }
    }
}

impl FileEntry {
    pub fn new_data(name: String, value: DataValue) -> Self {
        Self {
            name,
            content: FileContent::Data(value),
        }
    }

    pub fn new_file(name: String, encoding: FileEncoding, file_path: PathBuf) -> Self {
        Self {
            name,
            content: FileContent::File {
                encoding,
                file_path,
            },
        }
    }
}

/// Validate that `name` is non-empty, fits the name header and does not start
/// with the erased pattern.
pub(crate) fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::InvalidName("name must not be empty".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::InvalidName(format!(
            "name '{}' is too long (max {} bytes)",
            name, MAX_NAME_LENGTH
        )));
    }
    if name.contains('\0') {
        return Err(Error::InvalidName(format!(
            "name '{}' contains a null byte",
            name.escape_debug()
        )));
    }
    Ok(())
}
