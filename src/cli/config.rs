//! TOML configuration file support.
//!
//! Instead of passing many CLI flags, read options can live in a config file:
//!
//! ```toml
//! # platespec.toml
//! [read]
//! mode = "random-exposure"
//! random_seed = 42
//! use_andmask = true
//! coadd_frames = true
//! resample_method = "masked-spline"
//! cache_csr = true
//! ```
//!
//! Command-line flags take precedence over the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use platespec::exposure::SelectionMode;
use platespec::ingest::ReadOptions;
use platespec::resample::ResampleMethod;

/// Root configuration structure for platespec.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Settings for the read command.
    #[serde(default)]
    pub read: ReadConfig,
}

/// Configuration for the read command.
#[derive(Debug, Default, Deserialize)]
pub struct ReadConfig {
    /// Exposure selection mode.
    pub mode: Option<SelectionMode>,

    /// Seed for random-exposure selection.
    pub random_seed: Option<u64>,

    /// Zero ivar where the and-mask is set.
    pub use_andmask: Option<bool>,

    /// Resample frames onto the plate grid.
    pub coadd_frames: Option<bool>,

    /// Resampling policy for coadded frames.
    pub resample_method: Option<ResampleMethod>,

    /// Build CSR views of resolution matrices eagerly.
    pub cache_csr: Option<bool>,

    /// Keep individual spectra instead of requesting a coadd downstream.
    pub all_spectra: Option<bool>,

    /// Restrict output to these target ids.
    pub target_ids: Option<Vec<i64>>,

    /// Restrict input to these fibers.
    pub fiber_ids: Option<Vec<i64>>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }
}

impl ReadConfig {
    /// Options with every value present in the file applied over the defaults
    pub fn to_options(&self) -> ReadOptions {
        let defaults = ReadOptions::default();
        ReadOptions {
            target_ids: self.target_ids.clone(),
            fiber_ids: self.fiber_ids.clone(),
            mode: self.mode.unwrap_or(defaults.mode),
            random_seed: self.random_seed.unwrap_or(defaults.random_seed),
            use_andmask: self.use_andmask.unwrap_or(defaults.use_andmask),
            coadd_frames: self.coadd_frames.unwrap_or(defaults.coadd_frames),
            resample_method: self.resample_method.unwrap_or(defaults.resample_method),
            cache_csr: self.cache_csr.unwrap_or(defaults.cache_csr),
            all_spectra: self.all_spectra.unwrap_or(defaults.all_spectra),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
            [read]
            mode = "random-exposure"
            random_seed = 42
            use_andmask = true
            coadd_frames = true
            resample_method = "masked-spline"
            cache_csr = false
            target_ids = [7027564480001, 7027564480002]
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.read.mode, Some(SelectionMode::RandomExposure));
        assert_eq!(config.read.random_seed, Some(42));
        assert_eq!(config.read.use_andmask, Some(true));
        assert_eq!(config.read.resample_method, Some(ResampleMethod::MaskedSpline));
        assert_eq!(
            config.read.target_ids,
            Some(vec![7_027_564_480_001, 7_027_564_480_002])
        );

        let options = config.read.to_options();
        assert_eq!(options.mode, SelectionMode::RandomExposure);
        assert!(options.coadd_frames);
        assert!(!options.all_spectra);
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [read]
            mode = "best-exposure"
        "#;

        let config = Config::from_str(toml).unwrap();
        assert_eq!(config.read.mode, Some(SelectionMode::BestExposure));
        assert_eq!(config.read.random_seed, None);
        assert_eq!(config.read.to_options().random_seed, 0);
    }

    #[test]
    fn test_empty_config() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config.read.mode, None);
        assert_eq!(config.read.to_options(), ReadOptions::default());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(Config::from_str("[read]\nmode = \"every-other\"\n").is_err());
    }
}
