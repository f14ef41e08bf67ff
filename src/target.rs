//! Output types: spectra grouped by target, plus the per-target metadata table

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::resolution::ResolutionMatrix;

/// Metadata key holding the brick label
pub const BRICKNAME: &str = "BRICKNAME";

/// One observation of one target
#[derive(Debug, Clone)]
pub struct Spectrum {
    /// Wavelength in Angstrom
    pub wave: Vec<f64>,
    /// Flux
    pub flux: Vec<f64>,
    /// Inverse variance
    pub ivar: Vec<f64>,
    /// Line-spread function per pixel
    pub resolution: ResolutionMatrix,
}

impl Spectrum {
    /// `None` unless all arrays and the matrix share one length
    pub fn new(
        wave: Vec<f64>,
        flux: Vec<f64>,
        ivar: Vec<f64>,
        resolution: ResolutionMatrix,
    ) -> Option<Self> {
        let n = wave.len();
        (flux.len() == n && ivar.len() == n && resolution.n() == n).then_some(Self {
            wave,
            flux,
            ivar,
            resolution,
        })
    }

    /// Number of pixels
    pub fn npix(&self) -> usize {
        self.wave.len()
    }
}

/// All spectra of one target
#[derive(Debug, Clone)]
pub struct Target {
    /// Target id
    pub id: i64,
    /// Spectra in reading order
    pub spectra: Vec<Spectrum>,
    /// String metadata, at least [`BRICKNAME`]
    pub meta: BTreeMap<String, String>,
    /// Downstream consumers should coadd the spectra before fitting
    pub coadd: bool,
}

impl Target {
    /// Brick label, if set
    pub fn brickname(&self) -> Option<&str> {
        self.meta.get(BRICKNAME).map(String::as_str)
    }
}

/// One row of [`TargetMetadataTable`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRow {
    /// Target id
    #[serde(rename = "TARGETID")]
    pub target_id: i64,
    /// Brick label
    #[serde(rename = "BRICKNAME")]
    pub brickname: String,
}

/// Per-target metadata, sorted by target id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetMetadataTable {
    rows: Vec<TargetRow>,
}

impl TargetMetadataTable {
    /// Build from rows in any order
    pub fn from_rows(mut rows: Vec<TargetRow>) -> Self {
        rows.sort_by_key(|r| r.target_id);
        Self { rows }
    }

    /// Rows in ascending target id order
    pub fn rows(&self) -> &[TargetRow] {
        &self.rows
    }

    /// Row of one target
    pub fn get(&self, target_id: i64) -> Option<&TargetRow> {
        self.rows
            .binary_search_by_key(&target_id, |r| r.target_id)
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Target ids in table order
    pub fn target_ids(&self) -> Vec<i64> {
        self.rows.iter().map(|r| r.target_id).collect()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True for an empty table
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
