//! # FITS access
//!
//! Survey exposure files are multi-extension FITS: a primary image plus
//! `IMAGE` and `BINTABLE` extensions. [`FitsReader`] wraps a `fitsio` handle
//! and addresses HDUs by index, the way the spPlate and spCFrame layouts are
//! defined. Images come back as `[NAXIS2 x NAXIS1]` arrays of `f64` whatever
//! their BITPIX; cfitsio applies `BSCALE`/`BZERO` and opens gzip-compressed
//! files directly.
//!
//! ## Example
//!
//! ```rust,no_run
//! use platespec::fits::FitsReader;
//!
//! let mut fits = FitsReader::open("spPlate-7027-56448.fits")?;
//! let plate = fits.key_i64(0, "PLATEID")?;
//! let flux = fits.image(0)?;
//! let fibers = fits.column_i64(5, "FIBERID")?;
//! println!("plate {}: {} fibers x {} pixels", plate, flux.nrows(), flux.ncols());
//! # let _ = fibers;
//! # Ok::<(), platespec::fits::FitsError>(())
//! ```

use std::path::{Path, PathBuf};

use fitsio::hdu::{FitsHdu, HduInfo};
use fitsio::FitsFile;
use ndarray::Array2;
use thiserror::Error;

/// Errors raised while reading or writing FITS files
#[derive(Error, Debug)]
pub enum FitsError {
    /// cfitsio error, including missing files, HDUs and keywords
    #[error("FITS I/O error: {0}")]
    FitsIo(#[from] fitsio::errors::Error),

    /// Filesystem error around a FITS file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HDU is not a two-dimensional image
    #[error("HDU {hdu} is not a 2-D image (NAXIS = {naxis})")]
    NotAnImage {
        /// HDU index
        hdu: usize,
        /// Number of axes found
        naxis: i64,
    },

    /// Pixel count disagrees with `NAXIS1 x NAXIS2`
    #[error("Image data does not match its axes: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// Layout of one HDU, as shown by `platespec inspect`
#[derive(Debug, Clone, PartialEq)]
pub enum HduKind {
    /// Image with its shape, slowest axis first
    Image(Vec<usize>),
    /// Binary or ASCII table
    Table {
        /// Column names in file order
        columns: Vec<String>,
        /// Number of rows
        rows: usize,
    },
    /// Anything else
    Other,
}

/// One entry of [`FitsReader::hdus`]
#[derive(Debug, Clone, PartialEq)]
pub struct HduSummary {
    /// `EXTNAME`, when set
    pub name: Option<String>,
    /// Image or table layout
    pub kind: HduKind,
}

/// Read handle on one FITS file
pub struct FitsReader {
    path: PathBuf,
    fptr: FitsFile,
}

impl std::fmt::Debug for FitsReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitsReader").field("path", &self.path).finish()
    }
}

impl FitsReader {
    /// Open `path` read-only; `.fits.gz` files are decompressed by cfitsio
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FitsError> {
        let path = path.as_ref();
        let fptr = FitsFile::open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            fptr,
        })
    }

    /// File this reader was opened on
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn hdu(&mut self, index: usize) -> Result<FitsHdu, FitsError> {
        Ok(self.fptr.hdu(index)?)
    }

    /// Integer keyword of HDU `index`
    pub fn key_i64(&mut self, index: usize, key: &str) -> Result<i64, FitsError> {
        let hdu = self.hdu(index)?;
        Ok(hdu.read_key::<i64>(&mut self.fptr, key)?)
    }

    /// Floating-point keyword of HDU `index`
    pub fn key_f64(&mut self, index: usize, key: &str) -> Result<f64, FitsError> {
        let hdu = self.hdu(index)?;
        Ok(hdu.read_key::<f64>(&mut self.fptr, key)?)
    }

    /// String keyword of HDU `index`
    pub fn key_string(&mut self, index: usize, key: &str) -> Result<String, FitsError> {
        let hdu = self.hdu(index)?;
        Ok(hdu.read_key::<String>(&mut self.fptr, key)?)
    }

    /// Integer keyword that may be absent
    pub fn optional_key_i64(&mut self, index: usize, key: &str) -> Option<i64> {
        self.key_i64(index, key).ok()
    }

    /// Image HDU `index` as `[NAXIS2 x NAXIS1]`
    pub fn image(&mut self, index: usize) -> Result<Array2<f64>, FitsError> {
        let hdu = self.hdu(index)?;
        let naxis = hdu.read_key::<i64>(&mut self.fptr, "NAXIS")?;
        if !matches!(hdu.info, HduInfo::ImageInfo { .. }) || naxis != 2 {
            return Err(FitsError::NotAnImage { hdu: index, naxis });
        }
        let naxis1 = hdu.read_key::<i64>(&mut self.fptr, "NAXIS1")?;
        let naxis2 = hdu.read_key::<i64>(&mut self.fptr, "NAXIS2")?;
        let (Ok(cols), Ok(rows)) = (usize::try_from(naxis1), usize::try_from(naxis2)) else {
            return Err(FitsError::NotAnImage { hdu: index, naxis });
        };

        let pixels = hdu.read_image::<Vec<f64>>(&mut self.fptr)?;
        Ok(Array2::from_shape_vec((rows, cols), pixels)?)
    }

    /// Integer column `name` of table HDU `index`
    pub fn column_i64(&mut self, index: usize, name: &str) -> Result<Vec<i64>, FitsError> {
        let hdu = self.hdu(index)?;
        Ok(hdu.read_col::<i64>(&mut self.fptr, name)?)
    }

    /// Name and layout of every HDU
    pub fn hdus(&mut self) -> Result<Vec<HduSummary>, FitsError> {
        let mut summaries = Vec::new();
        let mut index = 0;
        while let Ok(hdu) = self.fptr.hdu(index) {
            let name = hdu.read_key::<String>(&mut self.fptr, "EXTNAME").ok();
            let kind = match &hdu.info {
                HduInfo::ImageInfo { shape, .. } => HduKind::Image(shape.clone()),
                HduInfo::TableInfo {
                    column_descriptions,
                    num_rows,
                } => HduKind::Table {
                    columns: column_descriptions.iter().map(|c| c.name.clone()).collect(),
                    rows: *num_rows,
                },
                HduInfo::AnyInfo => HduKind::Other,
            };
            summaries.push(HduSummary { name, kind });
            index += 1;
        }
        Ok(summaries)
    }
}
