use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

use platespec::exposure::SelectionMode;
use platespec::ingest::{read_spectra, ReadOptions};
use platespec::synthetic::SyntheticPlate;

/// Write a synthetic plate directory and read it back once per mode
pub fn run(output: PathBuf, plate: i64, mjd: i64, fibers: usize, exposures: u32) -> Result<()> {
    if exposures == 0 {
        anyhow::bail!("At least one exposure is required");
    }

    info!("platespec demo - synthetic plate {}-{}", plate, mjd);

    let expids: Vec<u32> = (1..=exposures).map(|i| 100_000 + i).collect();
    let synthetic = SyntheticPlate::new(plate, mjd)
        .fibers_per_spectrograph(fibers)
        .exposures(expids);
    let files = synthetic
        .write(&output)
        .with_context(|| format!("Failed to write demo files to {}", output.display()))?;

    println!("Wrote {}", files.plate.display());
    println!("Wrote {} frame files", files.frames.len());
    println!("Wrote {}", files.identity.display());
    println!();

    for mode in [
        SelectionMode::Coadded,
        SelectionMode::AllFrames,
        SelectionMode::BestExposure,
        SelectionMode::RandomExposure,
    ] {
        let options = ReadOptions {
            mode,
            ..Default::default()
        };
        let result = read_spectra(&[&files.plate], &options)
            .with_context(|| format!("Failed to read demo plate in {:?} mode", mode))?;
        println!(
            "{:<16} {:>3} targets {:>4} spectra from {} exposure files",
            format!("{:?}", mode),
            result.report.targets,
            result.report.spectra,
            result.report.exposures_read
        );
    }

    println!();
    println!(
        "Try: platespec read {} --mode all-frames --coadd-frames",
        files.plate.display()
    );

    Ok(())
}
