use std::fs;

use pretty_assertions::assert_eq;
use sector_fs_image_tool::{
    DataValue,
    FileContent,
    FileEntry,
    FileImage,
    SECTOR_SIZE,
};
use tempfile::NamedTempFile;

#[test]
fn test_csv_to_image() {
    let image = FileImage::from_csv_file("tests/assets/basic.csv").unwrap();
    assert_eq!(image.files.len(), 4);
    assert_eq!(image.files[0].name, "config");
    assert_eq!(
        image.files[0].content,
        FileContent::Data(DataValue::String("{\"mode\":1}".to_string()))
    );

    let bin_file = NamedTempFile::new().unwrap();
    image.generate_image_file(bin_file.path(), 20480).unwrap();

    let data = fs::read(bin_file.path()).unwrap();
    assert_eq!(data.len(), 20480);

    // one sector per file in manifest order
    assert_eq!(&data[SECTOR_SIZE..SECTOR_SIZE + 7], b"config\0");
    assert_eq!(&data[SECTOR_SIZE + 16..SECTOR_SIZE + 26], b"{\"mode\":1}");
    assert_eq!(
        &data[2 * SECTOR_SIZE + 16..2 * SECTOR_SIZE + 21],
        &[0xDE, 0xAD, 0xBE, 0xEF, 0x00]
    );
    assert_eq!(&data[3 * SECTOR_SIZE + 16..3 * SECTOR_SIZE + 21], &[0, 1, 2, 3, 4]);
    assert_eq!(&data[4 * SECTOR_SIZE..4 * SECTOR_SIZE + 6], b"notes\0");
    assert_eq!(
        &data[4 * SECTOR_SIZE + 16..4 * SECTOR_SIZE + 39],
        b"first line\nsecond line\n"
    );

    // four files and the header need five sectors
    assert!(matches!(
        image.generate_image(4 * SECTOR_SIZE),
        Err(sector_fs_image_tool::Error::Storage(sector_fs::Error::OutOfSpace))
    ));
}

#[test]
fn test_file_paths_resolve_against_manifest() {
    let image = FileImage::from_csv_file("tests/assets/basic.csv").unwrap();

    match &image.files[3].content {
        FileContent::File { file_path, .. } => {
            assert_eq!(file_path, &std::path::Path::new("tests/assets").join("notes.txt"));
        }
        _ => panic!("Expected file content"),
    }

    // an in-memory manifest keeps the path as written
    let image = FileImage::from_csv(&fs::read_to_string("tests/assets/basic.csv").unwrap())
        .unwrap();
    assert!(image.generate_image(20480).is_err());
}

#[test]
fn test_generate_from_api() {
    let image = FileImage {
        files: vec![
            FileEntry::new_data("version".to_string(), DataValue::Binary(vec![1])),
            FileEntry::new_data(
                "name".to_string(),
                DataValue::String("Test Device".to_string()),
            ),
        ],
    };

    let data = image.generate_image(3 * SECTOR_SIZE).unwrap();
    assert_eq!(data.len(), 3 * SECTOR_SIZE);

    // the header sector leaves room for a single file
    assert!(image.generate_image(2 * SECTOR_SIZE).is_err());
}

#[test]
fn test_invalid_manifests() {
    assert!(FileImage::from_csv_file("tests/assets/long_name.csv").is_err());
    assert!(FileImage::from_csv_file("tests/assets/duplicate_name.csv").is_err());
    assert!(FileImage::from_csv_file("tests/assets/missing.csv").is_err());
}

#[test]
fn test_invalid_image_size() {
    let image = FileImage { files: vec![] };

    let bin_file = NamedTempFile::new().unwrap();
    assert!(image.generate_image_file(bin_file.path(), 1024).is_err());
    assert!(image.generate_image_file(bin_file.path(), 4096).is_err());
    assert!(image.generate_image_file(bin_file.path(), 8192).is_ok());
}
