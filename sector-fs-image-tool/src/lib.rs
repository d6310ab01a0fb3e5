//! Generates sector-fs flash images from a CSV manifest and parses images
//! back into one.
//!
//! Images are produced by running the `sector-fs` storage engine against an
//! in-memory flash, so a generated image is byte-for-byte what a device would
//! have written.

pub mod error;
pub mod image;

mod csv;

use std::fs;
use std::io::Write;
use std::path::Path;

pub use error::Error;
pub use image::{
    DataValue,
    FileContent,
    FileEncoding,
    FileEntry,
    ImageFlash,
};
pub use sector_fs::{
    MAX_FILE_SIZE,
    MAX_NAME_LENGTH,
    SECTOR_SIZE,
};

/// The files of a sector-fs partition, in sector order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileImage {
    pub files: Vec<FileEntry>,
}

impl FileImage {
    /// Parse a CSV manifest from a string.
    ///
    /// File-type rows keep their path exactly as written. Use
    /// [`FileImage::from_csv_file`] to resolve relative paths against the
    /// location of the manifest.
    pub fn from_csv(content: &str) -> Result<Self, Error> {
        csv::parser::parse_csv(content)
    }

    /// Parse the CSV manifest at `path`.
    ///
    /// Relative paths of file-type rows are resolved against the parent
    /// directory of the manifest.
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = fs::read_to_string(&path)?;
        let mut image = csv::parser::parse_csv(&content)?;

        if let Some(base) = path.as_ref().parent() {
            for file in &mut image.files {
                if let FileContent::File { file_path, .. } = &mut file.content {
                    if file_path.is_relative() {
                        *file_path = base.join(&file_path);
                    }
                }
            }
        }

        Ok(image)
    }

    /// Serialize to CSV and return the content as a `String`.
    pub fn to_csv(&self) -> Result<String, Error> {
        csv::writer::write_csv_content(self)
    }

    /// Serialize to a CSV file at `path`. Binary payloads are written as
    /// base64.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        csv::writer::write_csv(self, path)
    }

    /// Generate a flash image of `size` bytes in memory.
    ///
    /// `size` must be a multiple of 4096 and span 2 to 64 sectors.
    pub fn generate_image(&self, size: usize) -> Result<Vec<u8>, Error> {
        image::generator::generate_image_data(self, size)
    }

    /// Generate a flash image and write it to `path`.
    pub fn generate_image_file<P: AsRef<Path>>(&self, path: P, size: usize) -> Result<(), Error> {
        let data = self.generate_image(size)?;
        fs::File::create(path)?.write_all(&data)?;
        Ok(())
    }

    /// Parse a flash image from memory. Interrupted compactions are finished
    /// on a copy of the data before the files are read.
    pub fn parse_image(data: &[u8]) -> Result<Self, Error> {
        image::parser::parse_image_data(data)
    }

    /// Parse the flash image at `path`.
    pub fn parse_image_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let data = fs::read(path)?;
        image::parser::parse_image_data(&data)
    }
}
