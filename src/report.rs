//! Summary of one ingestion run
//!
//! Missing data never aborts a run: plates without a complete exposure,
//! cameras without exposures, allow-listed targets that were never observed
//! and plates that contributed nothing are recorded as [`Omission`]s.

use std::fmt;
use std::path::PathBuf;

#[cfg(feature = "colorized_output")]
use console::style;
use serde::Serialize;

use crate::exposure::Camera;

/// Something the run skipped instead of failing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Omission {
    /// Random-exposure mode found no exposure with all four camera files
    NoCompleteExposure {
        /// Plate file
        plate_path: PathBuf,
    },
    /// Plate header has no `NEXP_<CAM>` keyword for a camera
    CameraWithoutExposures {
        /// Plate file
        plate_path: PathBuf,
        /// Camera without exposures
        camera: Camera,
    },
    /// Allow-listed target absent from every exposure
    TargetWithoutSpectra {
        /// Requested target id
        target_id: i64,
    },
    /// Plate whose fibers were all filtered out
    PlateWithoutTargets {
        /// Plate file
        plate_path: PathBuf,
    },
}

impl fmt::Display for Omission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Omission::NoCompleteExposure { plate_path } => write!(
                f,
                "{}: no exposure with all cameras present, plate skipped",
                plate_path.display()
            ),
            Omission::CameraWithoutExposures { plate_path, camera } => write!(
                f,
                "{}: no exposures for camera {}",
                plate_path.display(),
                camera
            ),
            Omission::TargetWithoutSpectra { target_id } => {
                write!(f, "target {} has no spectra", target_id)
            }
            Omission::PlateWithoutTargets { plate_path } => {
                write!(f, "{}: no targets selected", plate_path.display())
            }
        }
    }
}

/// Counters and omissions of one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// Plate files given as input
    pub plates: usize,
    /// Exposure files read
    pub exposures_read: usize,
    /// Spectra attached to targets
    pub spectra: usize,
    /// Targets in the output
    pub targets: usize,
    /// Skipped data, in the order encountered
    pub omissions: Vec<Omission>,
}

impl IngestReport {
    /// Record an omission
    pub fn add_omission(&mut self, omission: Omission) {
        self.omissions.push(omission);
    }

    /// True when anything was skipped
    pub fn has_omissions(&self) -> bool {
        !self.omissions.is_empty()
    }

    /// Format the report with colors (requires console feature)
    pub fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        {
            use console::Emoji;

            static OK: Emoji<'_, '_> = Emoji("✓", "[OK]");
            static SKIP: Emoji<'_, '_> = Emoji("⚠", "[SKIP]");

            let mut output = String::new();
            output.push_str(&format!("{}\n", style("Ingest Report").bold().cyan()));
            output.push_str(&format!("{}\n", style("=============").cyan()));
            output.push_str(&format!(
                "{}: {} plates, {} exposures, {} spectra, {} targets\n",
                style("Read").bold(),
                self.plates,
                self.exposures_read,
                style(self.spectra).green(),
                style(self.targets).green()
            ));

            if self.omissions.is_empty() {
                output.push_str(&format!("[{}] {}\n", OK, style("nothing skipped").green()));
            } else {
                for omission in &self.omissions {
                    output.push_str(&format!(
                        "[{}] {}\n",
                        SKIP,
                        style(omission.to_string()).yellow()
                    ));
                }
            }
            output
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            format!("{}", self)
        }
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ingest Report")?;
        writeln!(f, "=============")?;
        writeln!(
            f,
            "Read: {} plates, {} exposures, {} spectra, {} targets",
            self.plates, self.exposures_read, self.spectra, self.targets
        )?;
        if self.omissions.is_empty() {
            writeln!(f, "[✓] nothing skipped")?;
        }
        for omission in &self.omissions {
            writeln!(f, "[⚠] {}", omission)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_omissions() {
        let mut report = IngestReport {
            plates: 1,
            exposures_read: 4,
            spectra: 8,
            targets: 2,
            ..Default::default()
        };
        assert!(!report.has_omissions());
        assert!(report.to_string().contains("nothing skipped"));

        report.add_omission(Omission::TargetWithoutSpectra { target_id: 42 });
        report.add_omission(Omission::CameraWithoutExposures {
            plate_path: PathBuf::from("spPlate-7027-56448.fits"),
            camera: Camera::R2,
        });
        let text = report.to_string();
        assert!(text.contains("target 42 has no spectra"));
        assert!(text.contains("camera r2"));
        assert!(report.format_colored().contains("target 42"));
    }

    #[test]
    fn test_omission_serializes_with_kind() -> Result<(), serde_json::Error> {
        let json = serde_json::to_string(&Omission::TargetWithoutSpectra { target_id: 7 })?;
        assert_eq!(json, r#"{"kind":"target-without-spectra","target_id":7}"#);
        Ok(())
    }
}
