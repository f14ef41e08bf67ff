//! # Ingestion pipeline
//!
//! [`read_spectra`] runs the whole engine for a list of plate files:
//!
//! 1. Validate [`ReadOptions`]
//! 2. Select exposure files ([`ExposureSelector`])
//! 3. For each exposure, in selection order: read, optionally resample onto
//!    the plate grid, crop, substitute degenerate dispersion
//! 4. Build one resolution matrix per accepted fiber and hand the spectrum to
//!    the [`TargetAssembler`]
//! 5. Finalize targets, metadata and the [`IngestReport`]
//!
//! Exposures are processed one at a time and dropped after use.
//!
//! ## Example
//!
//! ```rust,no_run
//! use platespec::ingest::{read_spectra, ReadOptions};
//! use platespec::exposure::SelectionMode;
//!
//! let options = ReadOptions {
//!     mode: SelectionMode::BestExposure,
//!     use_andmask: true,
//!     ..Default::default()
//! };
//! let output = read_spectra(&["data/7027/spPlate-7027-56448.fits"], &options)?;
//! println!("{} targets", output.targets.len());
//! # Ok::<(), platespec::error::IngestError>(())
//! ```

mod observer;
mod options;

pub use observer::{IngestObserver, LogObserver, NullObserver};
pub use options::ReadOptions;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::warn;

use crate::assemble::TargetAssembler;
use crate::crop::{crop_exposure, CropWindow};
use crate::error::IngestError;
use crate::exposure::{ExposureData, ExposureReader, ExposureRef, ExposureSelector};
use crate::report::{IngestReport, Omission};
use crate::resample::{resample_exposure, ReferenceGridCache};
use crate::resolution::{exposure_band_count, sanitize_dispersion, ResolutionMatrix};
use crate::target::{Spectrum, Target, TargetMetadataTable};

/// Result of one run
#[derive(Debug)]
pub struct IngestOutput {
    /// Targets ascending by id
    pub targets: Vec<Target>,
    /// One row per target
    pub metadata: TargetMetadataTable,
    /// Counters and omissions
    pub report: IngestReport,
}

/// Expand plate arguments: entries containing `*`, `?` or `[` are glob
/// patterns, anything else is taken as a path
pub fn expand_plate_patterns<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<PathBuf>, IngestError> {
    let mut plates = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if input.contains(['*', '?', '[']) {
            let mut matches = Vec::new();
            for entry in glob::glob(input)? {
                matches.push(entry.map_err(|e| IngestError::IoError(e.into_error()))?);
            }
            if matches.is_empty() {
                warn!("Pattern {} matched no files", input);
            }
            matches.sort();
            plates.extend(matches);
        } else {
            plates.push(PathBuf::from(input));
        }
    }
    Ok(plates)
}

/// Read spectra with progress forwarded to the `log` facade
pub fn read_spectra<P: AsRef<Path>>(
    plates: &[P],
    options: &ReadOptions,
) -> Result<IngestOutput, IngestError> {
    read_spectra_with_observer(plates, options, &mut LogObserver)
}

/// Read spectra, reporting progress to `observer`
pub fn read_spectra_with_observer<P: AsRef<Path>>(
    plates: &[P],
    options: &ReadOptions,
    observer: &mut dyn IngestObserver,
) -> Result<IngestOutput, IngestError> {
    options.validate()?;
    if options.coadd_frames && !options.mode.uses_frames() {
        warn!("coadd_frames has no effect when reading coadded plate files");
    }

    let selector = ExposureSelector::new(options.mode, options.random_seed);
    let selection = selector.select(plates)?;

    let mut report = IngestReport {
        plates: plates.len(),
        ..Default::default()
    };
    for omission in selection.omissions {
        observer.omission(&omission);
        report.add_omission(omission);
    }
    observer.exposures_selected(selection.exposures.len());

    let mut reader = ExposureReader::new(options.use_andmask);
    if let Some(fibers) = &options.fiber_ids {
        reader = reader.with_fiber_filter(fibers.iter().copied());
    }
    let resampler = options
        .resamples_frames()
        .then(|| options.resample_method.resampler());
    let mut grids = ReferenceGridCache::new();

    let allow_list: Option<BTreeSet<i64>> = options
        .target_ids
        .as_ref()
        .map(|ids| ids.iter().copied().collect());
    let mut assembler = TargetAssembler::new(allow_list, options.coadd_hint());

    // spectra contributed per plate, in selection order
    let mut per_plate: Vec<(PathBuf, usize)> = Vec::new();

    for (index, exposure) in selection.exposures.iter().enumerate() {
        observer.exposure_started(index, exposure);

        let mut data = reader.read(exposure)?;
        if let Some(resampler) = &resampler {
            let grid = grids.grid_for(exposure)?;
            data = resample_exposure(data, &grid, &**resampler);
        }
        let window = CropWindow::for_exposure(data.camera, resampler.is_some());
        crop_exposure(&mut data, window);
        sanitize_dispersion(&mut data.wdisp);

        let added = add_spectra(&data, exposure, options.cache_csr, &mut assembler)?;
        report.exposures_read += 1;
        report.spectra += added;
        match per_plate.iter_mut().find(|(p, _)| *p == exposure.plate_path) {
            Some((_, count)) => *count += added,
            None => per_plate.push((exposure.plate_path.clone(), added)),
        }
        observer.exposure_read(&data, added);
    }

    for (plate_path, count) in per_plate {
        if count == 0 {
            let omission = Omission::PlateWithoutTargets { plate_path };
            observer.omission(&omission);
            report.add_omission(omission);
        }
    }

    let assembly = assembler.finalize();
    for omission in assembly.omissions {
        observer.omission(&omission);
        report.add_omission(omission);
    }
    report.targets = assembly.targets.len();
    observer.finished(&report);

    Ok(IngestOutput {
        targets: assembly.targets,
        metadata: assembly.metadata,
        report,
    })
}

/// Build spectra for every accepted fiber of one prepared exposure
fn add_spectra(
    data: &ExposureData,
    exposure: &ExposureRef,
    cache_csr: bool,
    assembler: &mut TargetAssembler,
) -> Result<usize, IngestError> {
    let ndiag = exposure_band_count(&data.wdisp);
    let brickname = exposure.brickname();
    let mut added = 0;

    for fiber in &data.fibers {
        let target_id = exposure
            .identity
            .target_id(exposure.plate, exposure.mjd, fiber.fiber)?;
        if !assembler.accepts(target_id) {
            continue;
        }

        let wdisp = data.wdisp.row(fiber.row).to_vec();
        let mut resolution = ResolutionMatrix::from_dispersion(&wdisp, ndiag);
        if cache_csr {
            resolution = resolution.with_cached_csr();
        }
        let spectrum = Spectrum::new(
            data.wave.row(fiber.row).to_vec(),
            data.flux.row(fiber.row).to_vec(),
            data.ivar.row(fiber.row).to_vec(),
            resolution,
        )
        .ok_or_else(|| IngestError::ShapeMismatch {
            path: data.path.clone(),
            what: "spectrum",
            expected: data.shape(),
            found: (1, data.wave.ncols()),
        })?;

        if assembler.add(target_id, &brickname, spectrum) {
            added += 1;
        }
    }
    Ok(added)
}
