//! # Exposure references, selection and reading
//!
//! A plate-level `spPlate` file already coadds every exposure of a visit.
//! Frame-level `spCFrame` files hold one exposure of one camera channel and
//! live in the same directory as their parent plate file. This module decides
//! which of those files are read ([`ExposureSelector`]) and extracts their
//! arrays ([`ExposureReader`]).

mod reader;
mod selector;

pub use reader::{ExposureData, ExposureReader, SelectedFiber, FRAME_FIBERS};
pub use selector::{shuffled_exposures, ExposureSelector, Selection, SelectionMode};

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::identity::FiberIdentity;

/// Spectrograph camera channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Camera {
    /// Blue arm, spectrograph 1
    B1,
    /// Red arm, spectrograph 1
    R1,
    /// Blue arm, spectrograph 2
    B2,
    /// Red arm, spectrograph 2
    R2,
}

impl Camera {
    /// The four channels in file-listing order
    pub const ALL: [Camera; 4] = [Camera::B1, Camera::R1, Camera::B2, Camera::R2];

    /// Lower-case label used in file names and the `CAMERAS` keyword
    pub fn label(&self) -> &'static str {
        match self {
            Camera::B1 => "b1",
            Camera::R1 => "r1",
            Camera::B2 => "b2",
            Camera::R2 => "r2",
        }
    }

    /// Parse a camera label; only the first two characters are significant
    pub fn from_label(label: &str) -> Option<Self> {
        match label.get(..2)?.to_ascii_lowercase().as_str() {
            "b1" => Some(Camera::B1),
            "r1" => Some(Camera::R1),
            "b2" => Some(Camera::B2),
            "r2" => Some(Camera::R2),
            _ => None,
        }
    }

    /// True for the blue arms
    pub fn is_blue(&self) -> bool {
        matches!(self, Camera::B1 | Camera::B2)
    }
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One exposure file to be read, with everything known before opening it
#[derive(Debug, Clone)]
pub struct ExposureRef {
    /// File to read
    pub path: PathBuf,
    /// Parent plate file
    pub plate_path: PathBuf,
    /// Plate number from the parent plate header
    pub plate: i64,
    /// Visit mjd from the parent plate header
    pub mjd: i64,
    /// Camera channel, `None` for the plate file itself
    pub camera: Option<Camera>,
    /// Eight-digit exposure id, `None` for the plate file itself
    pub expid: Option<String>,
    /// Fiber to target id mapping
    pub identity: FiberIdentity,
}

impl ExposureRef {
    /// True for `spCFrame` references
    pub fn is_frame(&self) -> bool {
        self.camera.is_some()
    }

    /// Brick label attached to every target observed in this exposure
    pub fn brickname(&self) -> String {
        format!("{}-{}", self.plate, self.mjd)
    }
}

/// `spCFrame-<cam>-<expid>.fits`
pub fn frame_file_name(camera: Camera, expid: &str) -> String {
    format!("spCFrame-{}-{}.fits", camera.label(), expid)
}

/// `spPlate-<plate>-<mjd>.fits`
pub fn plate_file_name(plate: i64, mjd: i64) -> String {
    format!("spPlate-{}-{}.fits", plate, mjd)
}

/// Companion fiber identity file: `spPlate` replaced by `photoPosPlate`
pub fn identity_file_path(plate_path: &Path) -> PathBuf {
    let name = plate_path
        .file_name()
        .map(|n| n.to_string_lossy().replace("spPlate", "photoPosPlate"))
        .unwrap_or_default();
    plate_path.with_file_name(name)
}

/// Directory holding a plate file and its frames
pub(crate) fn plate_dir(plate_path: &Path) -> PathBuf {
    plate_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_labels() {
        for camera in Camera::ALL {
            assert_eq!(Camera::from_label(camera.label()), Some(camera));
        }
        assert_eq!(Camera::from_label("R2-00123456"), Some(Camera::R2));
        assert_eq!(Camera::from_label("x"), None);
        assert!(Camera::B2.is_blue());
        assert!(!Camera::R1.is_blue());
    }

    #[test]
    fn test_file_naming() {
        assert_eq!(
            frame_file_name(Camera::B1, "00123456"),
            "spCFrame-b1-00123456.fits"
        );
        assert_eq!(plate_file_name(7027, 56448), "spPlate-7027-56448.fits");
        assert_eq!(
            identity_file_path(Path::new("/data/7027/spPlate-7027-56448.fits")),
            PathBuf::from("/data/7027/photoPosPlate-7027-56448.fits")
        );
    }
}
