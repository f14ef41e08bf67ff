use log::{debug, info, warn};

use crate::exposure::{ExposureData, ExposureRef};
use crate::report::{IngestReport, Omission};

/// Progress callbacks of one ingestion run.
///
/// Every method has an empty default, so implementors only override the
/// events they care about.
pub trait IngestObserver {
    /// Selection finished with `count` exposures to read
    fn exposures_selected(&mut self, _count: usize) {}

    /// An exposure is about to be opened
    fn exposure_started(&mut self, _index: usize, _exposure: &ExposureRef) {}

    /// An exposure was read and its spectra handed to the assembler
    fn exposure_read(&mut self, _exposure: &ExposureData, _spectra: usize) {}

    /// Something was skipped
    fn omission(&mut self, _omission: &Omission) {}

    /// The run finished
    fn finished(&mut self, _report: &IngestReport) {}
}

/// Forwards progress events to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl IngestObserver for LogObserver {
    fn exposures_selected(&mut self, count: usize) {
        info!("Selected {} exposure files", count);
    }

    fn exposure_started(&mut self, index: usize, exposure: &ExposureRef) {
        debug!("[{}] Opening {}", index + 1, exposure.path.display());
    }

    fn exposure_read(&mut self, exposure: &ExposureData, spectra: usize) {
        debug!("Read {}: {} spectra", exposure.path.display(), spectra);
    }

    fn omission(&mut self, omission: &Omission) {
        match omission {
            Omission::CameraWithoutExposures { .. } => debug!("Skipped: {}", omission),
            _ => warn!("Skipped: {}", omission),
        }
    }

    fn finished(&mut self, report: &IngestReport) {
        info!(
            "Read {} spectra for {} targets from {} exposures",
            report.spectra, report.targets, report.exposures_read
        );
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl IngestObserver for NullObserver {}
