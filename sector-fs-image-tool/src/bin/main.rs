use std::path::{
    Path,
    PathBuf,
};

use clap::{
    Parser,
    Subcommand,
};
use sector_fs_image_tool::{
    FileContent,
    FileImage,
    SECTOR_SIZE,
};

#[derive(Parser)]
#[command(name = "sector-fs-image-tool")]
#[command(about = "Build and inspect sector-fs flash images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a flash image from a CSV manifest
    Generate {
        /// Manifest listing one file per row
        manifest: PathBuf,

        /// Image to write
        image: PathBuf,

        /// Image size in bytes, decimal or 0x-prefixed (2 to 64 sectors of 4096 bytes)
        #[arg(short, long, value_parser = parse_size)]
        size: usize,
    },
    /// Extract the files of a flash image into a CSV manifest
    Parse {
        /// Image to read
        image: PathBuf,

        /// Manifest to write, omit to only list the files
        manifest: Option<PathBuf>,
    },
}

fn parse_size(s: &str) -> Result<usize, String> {
    let size = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => s.parse::<usize>(),
    }
    .map_err(|e| e.to_string())?;

    if !size.is_multiple_of(SECTOR_SIZE) {
        return Err(format!("{size} is not a multiple of {SECTOR_SIZE}"));
    }
    Ok(size)
}

fn generate(manifest: &Path, output: &Path, size: usize) -> Result<(), Box<dyn std::error::Error>> {
    let image = FileImage::from_csv_file(manifest)?;
    image.generate_image_file(output, size)?;

    let sectors = size / SECTOR_SIZE;
    println!(
        "{}: {} files, {} of {} file sectors free",
        output.display(),
        image.files.len(),
        sectors - 1 - image.files.len(),
        sectors - 1
    );
    Ok(())
}

fn parse(input: &Path, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let image = FileImage::parse_image_file(input)?;

    for file in &image.files {
        let len = match &file.content {
            FileContent::Data(value) => value.as_bytes().len(),
            FileContent::File { .. } => 0,
        };
        println!("{:<16}  {len:>5} bytes", file.name);
    }

    if let Some(output) = output {
        image.to_csv_file(output)?;
        println!("wrote {} files to {}", image.files.len(), output.display());
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Commands::Generate {
            manifest,
            image,
            size,
        } => generate(&manifest, &image, size),
        Commands::Parse { image, manifest } => parse(&image, manifest.as_deref()),
    }
}
