use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use platespec::exposure::SelectionMode;
use platespec::resample::ResampleMethod;

mod config;
mod demo;
mod inspect;
mod read;

pub use read::ReadArgs;

/// platespec - spectral ingestion for plate-based fiber spectrograph surveys
#[derive(Parser)]
#[command(name = "platespec")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Which exposure files are read for each plate.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum ModeArg {
    /// The coadded spPlate file itself
    #[default]
    Coadded,
    /// Every spCFrame listed in the plate header
    AllFrames,
    /// The frames of the exposure named by BESTEXP
    BestExposure,
    /// One random exposure present for all four cameras
    RandomExposure,
}

impl From<ModeArg> for SelectionMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Coadded => SelectionMode::Coadded,
            ModeArg::AllFrames => SelectionMode::AllFrames,
            ModeArg::BestExposure => SelectionMode::BestExposure,
            ModeArg::RandomExposure => SelectionMode::RandomExposure,
        }
    }
}

/// Resampling policy used when coadding frames onto the plate grid.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum MethodArg {
    /// Bin-averaged integration of the piecewise-linear input
    Integration,
    /// Closest input sample
    NearestNeighbor,
    /// Cubic spline with masked pixels propagated to ivar
    MaskedSpline,
    /// Cubic spline through every pixel
    SimpleSpline,
}

impl From<MethodArg> for ResampleMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Integration => ResampleMethod::Integration,
            MethodArg::NearestNeighbor => ResampleMethod::NearestNeighbor,
            MethodArg::MaskedSpline => ResampleMethod::MaskedSpline,
            MethodArg::SimpleSpline => ResampleMethod::SimpleSpline,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Read spectra from spPlate files and summarize the targets
    Read(ReadArgs),

    /// Show the HDU layout and key header values of a FITS file
    Inspect {
        /// Input FITS file (plain or gzip-compressed)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Write a synthetic plate with frames and identity file
    Demo {
        /// Output directory
        #[arg(value_name = "DIR", default_value = "platespec-demo")]
        output: PathBuf,

        /// Plate number
        #[arg(long, default_value_t = 7027)]
        plate: i64,

        /// Modified Julian date
        #[arg(long, default_value_t = 56448)]
        mjd: i64,

        /// Fibers per spectrograph
        #[arg(long, default_value_t = 5)]
        fibers: usize,

        /// Number of exposures
        #[arg(long, default_value_t = 3)]
        exposures: u32,
    },
}

impl Cli {
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

pub fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Read(args) => read::run(args),
        Commands::Inspect { file } => inspect::run(file),
        Commands::Demo {
            output,
            plate,
            mjd,
            fibers,
            exposures,
        } => demo::run(output, plate, mjd, fibers, exposures),
    }
}
