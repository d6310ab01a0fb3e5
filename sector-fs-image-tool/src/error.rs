use thiserror::Error;

/// Errors that can occur while reading a manifest, generating an image or
/// parsing one.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to parse CSV: {0}")]
    CsvError(#[from] csv::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("invalid entry type: {0}")]
    InvalidType(String),

    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("hex decoding error: {0}")]
    HexError(#[from] hex::FromHexError),

    #[error("base64 decoding error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("duplicate file name: {0}")]
    DuplicateName(String),

    #[error("file {name} has {size} bytes, at most {max} fit into a sector")]
    FileTooLarge { name: String, size: usize, max: usize },

    #[error("invalid image size {0}: must be a multiple of 4096 bytes spanning 2 to 64 sectors")]
    InvalidImageSize(usize),

    #[error("image is not formatted")]
    NotFormatted,

    #[error("storage error: {0}")]
    Storage(#[from] sector_fs::Error),
}
