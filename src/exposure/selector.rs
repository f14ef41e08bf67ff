use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{frame_file_name, identity_file_path, plate_dir, Camera, ExposureRef};
use crate::error::IngestError;
use crate::fits::FitsReader;
use crate::identity::FiberIdentity;
use crate::report::Omission;

/// Which exposure files are read for each plate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMode {
    /// The coadded plate file only
    #[default]
    Coadded,
    /// Every frame listed in the plate header
    AllFrames,
    /// The frames of the exposure recorded as `BESTEXP`
    BestExposure,
    /// The frames of one reproducibly shuffled exposure with all cameras present
    RandomExposure,
}

impl SelectionMode {
    /// True when frame files are read instead of the plate file
    pub fn uses_frames(&self) -> bool {
        !matches!(self, SelectionMode::Coadded)
    }
}

/// Result of exposure selection over all input plates
#[derive(Debug, Default)]
pub struct Selection {
    /// Exposures to read, in reading order
    pub exposures: Vec<ExposureRef>,
    /// Plates and cameras that contributed nothing
    pub omissions: Vec<Omission>,
}

/// Expands plate files into the list of exposure files to read
#[derive(Debug, Clone)]
pub struct ExposureSelector {
    mode: SelectionMode,
    seed: u64,
}

impl ExposureSelector {
    /// Create a selector for `mode`; `seed` only affects `RandomExposure`
    pub fn new(mode: SelectionMode, seed: u64) -> Self {
        Self { mode, seed }
    }

    /// Selection mode
    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Resolve every plate into exposure references.
    ///
    /// More than one plate switches fiber identities to the `THING_ID`s of
    /// each plate's `photoPosPlate` companion, which must exist.
    pub fn select<P: AsRef<Path>>(&self, plates: &[P]) -> Result<Selection, IngestError> {
        if plates.is_empty() {
            return Err(IngestError::ConfigError("no plate files given".to_string()));
        }

        let multi_plate = plates.len() > 1;
        if multi_plate {
            info!(
                "Reading {} plates: using THING_ID instead of PLATE*1000000000 + MJD*10000 + FIBERID",
                plates.len()
            );
        }

        let mut selection = Selection::default();
        for plate_path in plates {
            let plate_path = plate_path.as_ref();
            let mut header = FitsReader::open(plate_path).map_err(IngestError::fits(plate_path))?;
            let identity = if multi_plate {
                load_thing_ids(plate_path)?
            } else {
                FiberIdentity::PlateMjdFiber
            };
            let plate = PlateContext {
                path: plate_path,
                plate: header_i64(&mut header, "PLATEID")?,
                mjd: header_i64(&mut header, "MJD")?,
                identity,
            };

            match self.mode {
                SelectionMode::Coadded => {
                    selection.exposures.push(plate.exposure(plate_path.to_path_buf(), None, None))
                }
                SelectionMode::AllFrames => {
                    self.select_all_frames(&plate, &mut header, &mut selection)?
                }
                SelectionMode::BestExposure => {
                    self.select_best_exposure(&plate, &mut header, &mut selection)?
                }
                SelectionMode::RandomExposure => {
                    self.select_random_exposure(&plate, &mut header, &mut selection)?
                }
            }
        }

        Ok(selection)
    }

    fn select_all_frames(
        &self,
        plate: &PlateContext<'_>,
        header: &mut FitsReader,
        selection: &mut Selection,
    ) -> Result<(), IngestError> {
        let dir = plate_dir(plate.path);
        // EXPIDnn entries are numbered cumulatively across cameras
        let mut running = 0;
        for camera in Camera::ALL {
            let key = format!("NEXP_{}", camera.label().to_ascii_uppercase());
            let Some(nexp) = header.optional_key_i64(0, &key) else {
                debug!(
                    "{} has no exposures in camera {}",
                    plate.path.display(),
                    camera
                );
                selection.omissions.push(Omission::CameraWithoutExposures {
                    plate_path: plate.path.to_path_buf(),
                    camera,
                });
                continue;
            };

            for _ in 0..nexp {
                running += 1;
                let expid_key = format!("EXPID{:02}", running);
                let value = header_str(header, &expid_key)?;
                let stem = value.get(..11).ok_or_else(|| IngestError::InvalidHeader {
                    path: plate.path.to_path_buf(),
                    message: format!("{} = '{}' is too short", expid_key, value),
                })?;
                let frame_camera = Camera::from_label(stem).unwrap_or(camera);
                let path = dir.join(format!("spCFrame-{}.fits", stem));
                selection.exposures.push(plate.exposure(
                    path,
                    Some(frame_camera),
                    Some(stem[3..].to_string()),
                ));
            }
        }
        Ok(())
    }

    fn select_best_exposure(
        &self,
        plate: &PlateContext<'_>,
        header: &mut FitsReader,
        selection: &mut Selection,
    ) -> Result<(), IngestError> {
        let best = header_i64(header, "BESTEXP")?;
        let expid = format!("{:08}", best);
        debug!("Using best exposure {} of {}", expid, plate.path.display());

        let dir = plate_dir(plate.path);
        for camera in Camera::ALL {
            let path = dir.join(frame_file_name(camera, &expid));
            selection
                .exposures
                .push(plate.exposure(path, Some(camera), Some(expid.clone())));
        }
        Ok(())
    }

    fn select_random_exposure(
        &self,
        plate: &PlateContext<'_>,
        header: &mut FitsReader,
        selection: &mut Selection,
    ) -> Result<(), IngestError> {
        let nexp = header_i64(header, "NEXP")?;
        let mut candidates = BTreeSet::new();
        for n in 1..=nexp {
            let key = format!("EXPID{:02}", n);
            let value = header_str(header, &key)?;
            let expid = value.get(3..11).ok_or_else(|| IngestError::InvalidHeader {
                path: plate.path.to_path_buf(),
                message: format!("{} = '{}' is too short", key, value),
            })?;
            candidates.insert(expid.to_string());
        }

        let order = shuffled_exposures(plate.plate, plate.mjd, self.seed, candidates);
        let dir = plate_dir(plate.path);
        for expid in order {
            let paths: Vec<(Camera, PathBuf)> = Camera::ALL
                .iter()
                .map(|&camera| (camera, dir.join(frame_file_name(camera, &expid))))
                .collect();

            if let Some((_, missing)) = paths.iter().find(|(_, path)| !path.is_file()) {
                debug!(
                    "Exposure {} of {} is incomplete: {} not found",
                    expid,
                    plate.path.display(),
                    missing.display()
                );
                continue;
            }

            debug!("Using randomly chosen exposure {} of {}", expid, plate.path.display());
            for (camera, path) in paths {
                selection
                    .exposures
                    .push(plate.exposure(path, Some(camera), Some(expid.clone())));
            }
            return Ok(());
        }

        selection.omissions.push(Omission::NoCompleteExposure {
            plate_path: plate.path.to_path_buf(),
        });
        Ok(())
    }
}

/// Candidate exposure ids in the order `RandomExposure` tries them.
///
/// Candidates are sorted before shuffling and the generator is seeded from
/// `(plate, mjd, seed)`, so the order depends only on those three values.
/// `StdRng` streams may differ between rand releases; the order holds for
/// the locked rand 0.8.
pub fn shuffled_exposures(
    plate: i64,
    mjd: i64,
    seed: u64,
    candidates: impl IntoIterator<Item = String>,
) -> Vec<String> {
    let mut ordered: Vec<String> = candidates
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&plate.to_le_bytes());
    key[8..16].copy_from_slice(&mjd.to_le_bytes());
    key[16..24].copy_from_slice(&seed.to_le_bytes());
    let mut rng = StdRng::from_seed(key);
    ordered.shuffle(&mut rng);
    ordered
}

struct PlateContext<'a> {
    path: &'a Path,
    plate: i64,
    mjd: i64,
    identity: FiberIdentity,
}

impl PlateContext<'_> {
    fn exposure(&self, path: PathBuf, camera: Option<Camera>, expid: Option<String>) -> ExposureRef {
        ExposureRef {
            path,
            plate_path: self.path.to_path_buf(),
            plate: self.plate,
            mjd: self.mjd,
            camera,
            expid,
            identity: self.identity.clone(),
        }
    }
}

fn load_thing_ids(plate_path: &Path) -> Result<FiberIdentity, IngestError> {
    let path = identity_file_path(plate_path);
    if !path.is_file() {
        return Err(IngestError::MissingIdentityFile(path));
    }
    let mut fits = FitsReader::open(&path).map_err(IngestError::fits(&path))?;
    let ids = fits
        .column_i64(1, "THING_ID")
        .map_err(IngestError::fits(&path))?;
    Ok(FiberIdentity::ThingIds(Arc::new(ids)))
}

fn header_i64(header: &mut FitsReader, key: &str) -> Result<i64, IngestError> {
    let path = header.path().to_path_buf();
    header.key_i64(0, key).map_err(IngestError::fits(&path))
}

fn header_str(header: &mut FitsReader, key: &str) -> Result<String, IngestError> {
    let path = header.path().to_path_buf();
    let value = header.key_string(0, key).map_err(IngestError::fits(&path))?;
    Ok(value.trim_end().to_string())
}
