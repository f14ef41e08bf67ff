//! Synthetic survey files for demos and tests
//!
//! [`SyntheticPlate`] writes one `spPlate` file, its `spCFrame` files for all
//! four cameras and its `photoPosPlate` companion, following the same HDU
//! layout as survey data, through `fitsio`. Fluxes follow [`flux_model`] so readers can check
//! what they got back.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use log::debug;

use crate::exposure::{frame_file_name, identity_file_path, plate_file_name, Camera, FRAME_FIBERS};
use crate::fits::FitsError;
use fitsio::images::{ImageDescription, ImageType};
use fitsio::tables::{ColumnDataType, ColumnDescription};
use fitsio::FitsFile;
use ndarray::Array2;

/// Blue camera coverage in Angstrom
pub const BLUE_RANGE: (f64, f64) = (3550.0, 6350.0);
/// Red camera coverage in Angstrom
pub const RED_RANGE: (f64, f64) = (5600.0, 10450.0);
/// Plate grid coverage in Angstrom
pub const PLATE_RANGE: (f64, f64) = (3600.0, 10400.0);

/// Flux of `fiber` at `wave`; smooth and distinct per fiber
pub fn flux_model(fiber: i64, wave: f64) -> f64 {
    1.0 + 0.01 * fiber as f64 + 0.25 * (wave / 150.0).sin()
}

/// Builder for a synthetic plate directory
#[derive(Debug, Clone)]
pub struct SyntheticPlate {
    plate: i64,
    mjd: i64,
    fibers_per_spectrograph: usize,
    npix: usize,
    exposures: Vec<u32>,
    best_exposure: Option<u32>,
    missing_cameras: BTreeSet<Camera>,
    missing_frames: BTreeSet<(Camera, u32)>,
    thing_id_base: i64,
    wdisp: f64,
    masked_every: usize,
}

/// Paths written by [`SyntheticPlate::write`]
#[derive(Debug, Clone)]
pub struct SyntheticFiles {
    /// The `spPlate` file
    pub plate: PathBuf,
    /// Every `spCFrame` file, in header listing order
    pub frames: Vec<PathBuf>,
    /// The `photoPosPlate` file
    pub identity: PathBuf,
}

impl SyntheticPlate {
    /// Plate with three fibers per spectrograph and two exposures
    pub fn new(plate: i64, mjd: i64) -> Self {
        Self {
            plate,
            mjd,
            fibers_per_spectrograph: 3,
            npix: 400,
            exposures: vec![100_001, 100_002],
            best_exposure: None,
            missing_cameras: BTreeSet::new(),
            missing_frames: BTreeSet::new(),
            thing_id_base: 1_000 * plate,
            wdisp: 1.1,
            masked_every: 0,
        }
    }

    /// Fibers plugged per spectrograph (at most 500)
    pub fn fibers_per_spectrograph(mut self, n: usize) -> Self {
        self.fibers_per_spectrograph = n.min(FRAME_FIBERS as usize);
        self
    }

    /// Pixels per spectrum, in plate and frame files alike
    pub fn npix(mut self, npix: usize) -> Self {
        self.npix = npix.max(2);
        self
    }

    /// Exposure ids, in header order
    pub fn exposures(mut self, exposures: Vec<u32>) -> Self {
        self.exposures = exposures;
        self
    }

    /// `BESTEXP` value; defaults to the first exposure
    pub fn best_exposure(mut self, expid: u32) -> Self {
        self.best_exposure = Some(expid);
        self
    }

    /// Leave a camera out of the plate header and write none of its frames
    pub fn without_camera(mut self, camera: Camera) -> Self {
        self.missing_cameras.insert(camera);
        self
    }

    /// List a frame in the header but do not write its file
    pub fn without_frame(mut self, camera: Camera, expid: u32) -> Self {
        self.missing_frames.insert((camera, expid));
        self
    }

    /// Constant dispersion width written to every pixel
    pub fn wdisp(mut self, wdisp: f64) -> Self {
        self.wdisp = wdisp;
        self
    }

    /// Set the and-mask on every n-th pixel (0 = never)
    pub fn masked_every(mut self, n: usize) -> Self {
        self.masked_every = n;
        self
    }

    /// Plate number
    pub fn plate(&self) -> i64 {
        self.plate
    }

    /// Mjd
    pub fn mjd(&self) -> i64 {
        self.mjd
    }

    /// Plugged fibers of one spectrograph (1 or 2)
    pub fn spectrograph_fibers(&self, spectrograph: i64) -> Vec<i64> {
        let first = (spectrograph - 1) * FRAME_FIBERS + 1;
        (0..self.fibers_per_spectrograph as i64)
            .map(|i| first + i)
            .collect()
    }

    /// All plugged fibers
    pub fn fiber_ids(&self) -> Vec<i64> {
        let mut fibers = self.spectrograph_fibers(1);
        fibers.extend(self.spectrograph_fibers(2));
        fibers
    }

    /// `THING_ID` of a fiber
    pub fn thing_id(&self, fiber: i64) -> i64 {
        self.thing_id_base + fiber
    }

    /// Eight-digit exposure id string
    pub fn expid(expid: u32) -> String {
        format!("{:08}", expid)
    }

    fn cameras(&self) -> impl Iterator<Item = Camera> + '_ {
        Camera::ALL
            .into_iter()
            .filter(|c| !self.missing_cameras.contains(c))
    }

    /// Write all files into `dir`
    pub fn write(&self, dir: &Path) -> Result<SyntheticFiles, FitsError> {
        std::fs::create_dir_all(dir)?;
        let plate_path = dir.join(plate_file_name(self.plate, self.mjd));
        self.write_plate(&plate_path)?;

        let mut frames = Vec::new();
        for camera in self.cameras() {
            for &expid in &self.exposures {
                if self.missing_frames.contains(&(camera, expid)) {
                    continue;
                }
                let path = dir.join(frame_file_name(camera, &Self::expid(expid)));
                self.write_frame(&path, camera, expid)?;
                frames.push(path);
            }
        }

        let identity = identity_file_path(&plate_path);
        self.write_identity(&identity)?;

        debug!(
            "Wrote synthetic plate {} with {} frames",
            plate_path.display(),
            frames.len()
        );
        Ok(SyntheticFiles {
            plate: plate_path,
            frames,
            identity,
        })
    }

    fn loglinear(&self, range: (f64, f64)) -> (f64, f64) {
        let coeff0 = range.0.log10();
        let coeff1 = (range.1.log10() - coeff0) / (self.npix - 1) as f64;
        (coeff0, coeff1)
    }

    fn create(&self, path: &Path, rows: usize, pixel: ImageType) -> Result<FitsFile, FitsError> {
        let description = ImageDescription {
            data_type: pixel,
            dimensions: &[rows, self.npix],
        };
        let mut fptr = FitsFile::create(path)
            .with_custom_primary(&description)
            .overwrite()
            .open()?;
        let primary = fptr.hdu(0)?;
        primary.write_key(&mut fptr, "PLATEID", self.plate)?;
        primary.write_key(&mut fptr, "MJD", self.mjd)?;
        Ok(fptr)
    }

    fn write_extension(
        &self,
        fptr: &mut FitsFile,
        name: &str,
        pixel: ImageType,
        pixels: &[f64],
    ) -> Result<(), FitsError> {
        let description = ImageDescription {
            data_type: pixel,
            dimensions: &[pixels.len() / self.npix, self.npix],
        };
        let hdu = fptr.create_image(name.to_string(), &description)?;
        hdu.write_image(fptr, pixels)?;
        Ok(())
    }

    fn write_plate(&self, path: &Path) -> Result<(), FitsError> {
        let (coeff0, coeff1) = self.loglinear(PLATE_RANGE);
        // plate rows are indexed by fiber - 1
        let rows = (FRAME_FIBERS as usize) + self.fibers_per_spectrograph;
        let mut fptr = self.create(path, rows, ImageType::Float)?;

        let primary = fptr.hdu(0)?;
        primary.write_key(&mut fptr, "COEFF0", coeff0)?;
        primary.write_key(&mut fptr, "COEFF1", coeff1)?;

        let cameras: Vec<Camera> = self.cameras().collect();
        primary.write_key(&mut fptr, "NEXP", (cameras.len() * self.exposures.len()) as i64)?;
        let mut running = 0;
        for &camera in &cameras {
            let key = format!("NEXP_{}", camera.label().to_ascii_uppercase());
            primary.write_key(&mut fptr, &key, self.exposures.len() as i64)?;
            for &expid in &self.exposures {
                running += 1;
                // survey headers list the flat and arc after the science frame
                let value = format!(
                    "{}-{}-{}-{}",
                    camera,
                    Self::expid(expid),
                    Self::expid(expid.saturating_sub(2)),
                    Self::expid(expid.saturating_sub(1))
                );
                primary.write_key(&mut fptr, &format!("EXPID{:02}", running), value)?;
            }
        }
        let best = self
            .best_exposure
            .or_else(|| self.exposures.first().copied())
            .unwrap_or(0);
        primary.write_key(&mut fptr, "BESTEXP", i64::from(best))?;

        let wave: Vec<f64> = (0..self.npix)
            .map(|i| 10f64.powf(coeff0 + coeff1 * i as f64))
            .collect();
        let plugged = self.fiber_ids();
        let mut flux = Array2::<f64>::zeros((rows, self.npix));
        let mut ivar = Array2::<f64>::zeros((rows, self.npix));
        for &fiber in &plugged {
            let row = (fiber - 1) as usize;
            for (i, &w) in wave.iter().enumerate() {
                flux[[row, i]] = flux_model(fiber, w);
                ivar[[row, i]] = 1.0;
            }
        }
        let flux: Vec<f64> = flux.iter().copied().collect();
        let ivar: Vec<f64> = ivar.iter().copied().collect();
        primary.write_image(&mut fptr, &flux)?;

        let size = rows * self.npix;
        self.write_extension(&mut fptr, "IVAR", ImageType::Float, &ivar)?;
        self.write_extension(&mut fptr, "ANDMASK", ImageType::Long, &self.andmask(rows))?;
        self.write_extension(&mut fptr, "ORMASK", ImageType::Long, &vec![0.0; size])?;
        self.write_extension(&mut fptr, "WAVEDISP", ImageType::Float, &vec![self.wdisp; size])?;
        Self::write_plugmap(&mut fptr, &plugged)
    }

    fn write_frame(&self, path: &Path, camera: Camera, expid: u32) -> Result<(), FitsError> {
        let range = if camera.is_blue() { BLUE_RANGE } else { RED_RANGE };
        let (coeff0, coeff1) = self.loglinear(range);
        let spectrograph = if matches!(camera, Camera::B1 | Camera::R1) { 1 } else { 2 };
        let fibers = self.spectrograph_fibers(spectrograph);
        let rows = fibers.len();

        let mut fptr = self.create(path, rows, ImageType::Float)?;
        let primary = fptr.hdu(0)?;
        primary.write_key(&mut fptr, "CAMERAS", camera.label().to_string())?;
        primary.write_key(&mut fptr, "EXPOSURE", i64::from(expid))?;

        let mut loglam = Vec::with_capacity(rows * self.npix);
        let mut flux = Vec::with_capacity(rows * self.npix);
        for (row, &fiber) in fibers.iter().enumerate() {
            // each fiber has its own slightly shifted solution
            let shift = 2e-6 * row as f64;
            for i in 0..self.npix {
                let l = coeff0 + shift + coeff1 * i as f64;
                loglam.push(l);
                flux.push(flux_model(fiber, 10f64.powf(l)));
            }
        }
        primary.write_image(&mut fptr, &flux)?;

        let size = rows * self.npix;
        self.write_extension(&mut fptr, "IVAR", ImageType::Float, &vec![1.0; size])?;
        self.write_extension(&mut fptr, "MASK", ImageType::Long, &self.andmask(rows))?;
        self.write_extension(&mut fptr, "LOGLAM", ImageType::Double, &loglam)?;
        self.write_extension(&mut fptr, "WAVEDISP", ImageType::Float, &vec![self.wdisp; size])?;
        Self::write_plugmap(&mut fptr, &fibers)
    }

    fn write_identity(&self, path: &Path) -> Result<(), FitsError> {
        let rows = FRAME_FIBERS + self.fibers_per_spectrograph as i64;
        let ids: Vec<i32> = (1..=rows)
            .map(|fiber| self.thing_id(fiber) as i32)
            .collect();

        let mut fptr = FitsFile::create(path).overwrite().open()?;
        let column = ColumnDescription::new("THING_ID")
            .with_type(ColumnDataType::Int)
            .create()?;
        let hdu = fptr.create_table("PHOTOPOS".to_string(), &[column])?;
        hdu.write_col(&mut fptr, "THING_ID", &ids)?;
        Ok(())
    }

    fn andmask(&self, rows: usize) -> Vec<f64> {
        (0..rows * self.npix)
            .map(|i| {
                let pixel = i % self.npix;
                if self.masked_every > 0 && pixel % self.masked_every == self.masked_every - 1 {
                    1.0
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn write_plugmap(fptr: &mut FitsFile, fibers: &[i64]) -> Result<(), FitsError> {
        let fiber_ids: Vec<i32> = fibers.iter().map(|&f| f as i32).collect();
        let column = ColumnDescription::new("FIBERID")
            .with_type(ColumnDataType::Int)
            .create()?;
        let hdu = fptr.create_table("PLUGMAP".to_string(), &[column])?;
        hdu.write_col(fptr, "FIBERID", &fiber_ids)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::FitsReader;
    use tempfile::tempdir;

    #[test]
    fn test_written_layout() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let synthetic = SyntheticPlate::new(7027, 56448).npix(50);
        let files = synthetic.write(dir.path())?;

        assert_eq!(files.frames.len(), 8);
        assert!(files.identity.is_file());

        let mut plate = FitsReader::open(&files.plate)?;
        assert_eq!(plate.key_i64(0, "NEXP")?, 8);
        assert_eq!(plate.key_i64(0, "NEXP_R2")?, 2);
        assert_eq!(plate.key_string(0, "EXPID01")?.get(..11), Some("b1-00100001"));
        assert_eq!(plate.key_string(0, "EXPID08")?.get(3..11), Some("00100002"));
        assert_eq!(plate.key_i64(0, "BESTEXP")?, 100_001);

        let mut frame = FitsReader::open(&files.frames[0])?;
        assert_eq!(frame.image(0)?.dim(), (3, 50));
        assert_eq!(frame.key_string(0, "CAMERAS")?, "b1");
        assert_eq!(frame.column_i64(5, "FIBERID")?, vec![1, 2, 3]);

        let mut red2 = FitsReader::open(dir.path().join("spCFrame-r2-00100001.fits"))?;
        assert_eq!(red2.column_i64(5, "FIBERID")?, vec![501, 502, 503]);
        Ok(())
    }

    #[test]
    fn test_flux_rows_follow_fibers() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let synthetic = SyntheticPlate::new(7027, 56448).npix(30);
        let files = synthetic.write(dir.path())?;

        let mut plate = FitsReader::open(&files.plate)?;
        let coeff0 = plate.key_f64(0, "COEFF0")?;
        let flux = plate.image(0)?;
        let expected = flux_model(502, 10f64.powf(coeff0));
        assert!((flux[[501, 0]] - expected).abs() < 1e-5);
        assert_eq!(flux[[10, 0]], 0.0);
        Ok(())
    }

    #[test]
    fn test_identity_table() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let synthetic = SyntheticPlate::new(7027, 56448).fibers_per_spectrograph(2);
        let files = synthetic.write(dir.path())?;

        let ids = FitsReader::open(&files.identity)?.column_i64(1, "THING_ID")?;
        assert_eq!(ids.len(), 502);
        assert_eq!(ids[500], synthetic.thing_id(501));
        Ok(())
    }

    #[test]
    fn test_missing_camera_and_frame() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let files = SyntheticPlate::new(1, 2)
            .npix(20)
            .without_camera(Camera::R2)
            .without_frame(Camera::B1, 100_002)
            .write(dir.path())?;

        assert_eq!(files.frames.len(), 5);
        let mut plate = FitsReader::open(&files.plate)?;
        assert_eq!(plate.optional_key_i64(0, "NEXP_R2"), None);
        assert_eq!(plate.key_i64(0, "NEXP")?, 6);
        Ok(())
    }
}
