//! Grouping of spectra into targets

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::report::Omission;
use crate::target::{Spectrum, Target, TargetMetadataTable, TargetRow, BRICKNAME};

/// Everything the assembler produced
#[derive(Debug, Default)]
pub struct Assembly {
    /// Targets with at least one spectrum, ascending by id
    pub targets: Vec<Target>,
    /// One row per target in `targets`
    pub metadata: TargetMetadataTable,
    /// Allow-listed targets that received no spectrum
    pub omissions: Vec<Omission>,
}

/// Accumulates spectra per target id.
///
/// An optional allow-list restricts which ids are accepted; callers should
/// check [`TargetAssembler::accepts`] before building a spectrum.
#[derive(Debug, Default)]
pub struct TargetAssembler {
    allow_list: Option<BTreeSet<i64>>,
    coadd: bool,
    spectra: BTreeMap<i64, Vec<Spectrum>>,
    bricknames: BTreeMap<i64, String>,
}

impl TargetAssembler {
    /// New assembler; `coadd` is copied onto every target
    pub fn new(allow_list: Option<BTreeSet<i64>>, coadd: bool) -> Self {
        Self {
            allow_list,
            coadd,
            ..Default::default()
        }
    }

    /// True when `target_id` passes the allow-list
    pub fn accepts(&self, target_id: i64) -> bool {
        self.allow_list
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&target_id))
    }

    /// Attach a spectrum; returns false when the id is not allowed.
    ///
    /// The brick label of the first spectrum of a target is kept.
    pub fn add(&mut self, target_id: i64, brickname: &str, spectrum: Spectrum) -> bool {
        if !self.accepts(target_id) {
            return false;
        }
        self.bricknames
            .entry(target_id)
            .or_insert_with(|| brickname.to_string());
        self.spectra.entry(target_id).or_default().push(spectrum);
        true
    }

    /// Number of targets with spectra so far
    pub fn target_count(&self) -> usize {
        self.spectra.len()
    }

    /// Number of spectra so far
    pub fn spectrum_count(&self) -> usize {
        self.spectra.values().map(Vec::len).sum()
    }

    /// Emit targets and metadata ordered by id
    pub fn finalize(self) -> Assembly {
        let mut assembly = Assembly::default();

        if let Some(allowed) = &self.allow_list {
            for &target_id in allowed {
                if !self.spectra.contains_key(&target_id) {
                    debug!("Target {} has no spectra", target_id);
                    assembly
                        .omissions
                        .push(Omission::TargetWithoutSpectra { target_id });
                }
            }
        }

        let mut bricknames = self.bricknames;
        let mut rows = Vec::with_capacity(self.spectra.len());
        for (id, spectra) in self.spectra {
            let brickname = bricknames.remove(&id).unwrap_or_default();
            rows.push(TargetRow {
                target_id: id,
                brickname: brickname.clone(),
            });
            let mut meta = BTreeMap::new();
            meta.insert(BRICKNAME.to_string(), brickname);
            assembly.targets.push(Target {
                id,
                spectra,
                meta,
                coadd: self.coadd,
            });
        }
        assembly.metadata = TargetMetadataTable::from_rows(rows);
        assembly
    }
}
