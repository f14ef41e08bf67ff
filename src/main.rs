//! # platespec
//!
//! Command-line front end for the spectral ingestion engine.
//!
//! ## Usage
//!
//! ```bash
//! # Summarize the coadded spectra of a plate
//! platespec read data/7027/spPlate-7027-56448.fits
//!
//! # Every frame of several plates, coadded onto the plate grid
//! platespec read 'data/*/spPlate-*.fits' --mode all-frames --coadd-frames
//!
//! # Show the HDU layout of a file
//! platespec inspect spCFrame-b1-00100001.fits.gz
//!
//! # Write a synthetic plate directory
//! platespec demo platespec-demo
//! ```

use anyhow::Result;
use clap::Parser;

mod cli;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::init_logging(cli.verbosity());
    cli::dispatch(cli)
}
