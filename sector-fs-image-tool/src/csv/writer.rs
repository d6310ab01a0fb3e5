use std::path::Path;

use csv::Writer;

use crate::error::Error;
use crate::image::FileContent;
use crate::FileImage;

/// Serialize a file image to a CSV file at `output_path`, in sector order.
pub(crate) fn write_csv<P: AsRef<Path>>(image: &FileImage, output_path: P) -> Result<(), Error> {
    let mut wtr = Writer::from_path(output_path)?;
    write_records(&mut wtr, image)
}

/// Serialize a file image to CSV and return the content as a `String`.
pub(crate) fn write_csv_content(image: &FileImage) -> Result<String, Error> {
    let mut wtr = Writer::from_writer(Vec::new());
    write_records(&mut wtr, image)?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| Error::IoError(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::InvalidValue(format!("CSV output is not valid UTF-8: {}", e)))
}

fn write_records<W: std::io::Write>(wtr: &mut Writer<W>, image: &FileImage) -> Result<(), Error> {
    wtr.write_record(["name", "type", "encoding", "value"])?;

    for file in &image.files {
        match &file.content {
            FileContent::Data(value) => {
                let value_str = value.to_string();
                wtr.write_record([
                    file.name.as_str(),
                    "data",
                    value.encoding_str(),
                    value_str.as_str(),
                ])?;
            }
            FileContent::File {
                encoding,
                file_path,
            } => {
                wtr.write_record([
                    file.name.as_str(),
                    "file",
                    encoding.as_str(),
                    &*file_path.to_string_lossy(),
                ])?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}
