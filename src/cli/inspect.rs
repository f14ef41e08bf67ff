use anyhow::{Context, Result};
use std::path::PathBuf;

use platespec::fits::{FitsReader, HduKind};

/// Integer primary header keywords shown when present
const INT_CARDS: [&str; 6] = ["PLATEID", "MJD", "EXPOSURE", "NEXP", "BESTEXP", "NAXIS1"];
/// Floating-point primary header keywords shown when present
const FLOAT_CARDS: [&str; 2] = ["COEFF0", "COEFF1"];

/// Display the HDU layout of a FITS file
pub fn run(file: PathBuf) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {}", file.display());
    }

    let mut fits = FitsReader::open(&file)
        .with_context(|| format!("Failed to open FITS file: {}", file.display()))?;
    let hdus = fits
        .hdus()
        .with_context(|| format!("Failed to list HDUs of {}", file.display()))?;

    println!("FITS File Information");
    println!("=====================");
    println!("File: {}", file.display());
    println!("HDUs: {}", hdus.len());
    println!();

    println!("Key Header Values:");
    for key in INT_CARDS {
        if let Ok(value) = fits.key_i64(0, key) {
            println!("  {:<8} = {}", key, value);
        }
    }
    for key in FLOAT_CARDS {
        if let Ok(value) = fits.key_f64(0, key) {
            println!("  {:<8} = {}", key, value);
        }
    }
    if let Ok(cameras) = fits.key_string(0, "CAMERAS") {
        println!("  {:<8} = {}", "CAMERAS", cameras.trim_end());
    }
    println!();

    println!("Structure:");
    for (index, hdu) in hdus.iter().enumerate() {
        let name = hdu.name.as_deref().unwrap_or("-");
        match &hdu.kind {
            HduKind::Image(shape) => {
                let axes = shape
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(" x ");
                println!(
                    "  {:2}. {:<9} {:<12} [{}]",
                    index,
                    "IMAGE",
                    name,
                    if axes.is_empty() { "empty" } else { axes.as_str() }
                );
            }
            HduKind::Table { columns, rows } => {
                println!("  {:2}. {:<9} {:<12} [{} rows]", index, "TABLE", name, rows);
                println!("      columns: {}", columns.join(", "));
            }
            HduKind::Other => println!("  {:2}. {:<9} {}", index, "OTHER", name),
        }
    }

    Ok(())
}
