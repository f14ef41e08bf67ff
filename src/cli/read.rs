use anyhow::{Context, Result};
use clap::Args;
use log::info;
use std::path::PathBuf;

use platespec::ingest::{expand_plate_patterns, read_spectra, IngestOutput, ReadOptions};
use platespec::target::TargetMetadataTable;

use super::config::Config;
use super::{MethodArg, ModeArg};

/// Arguments of the read command
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// spPlate files or glob patterns
    #[arg(value_name = "SPPLATE", required = true)]
    pub plates: Vec<String>,

    /// TOML configuration file with a [read] table
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Exposure selection mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Seed for random-exposure selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Comma-separated target ids to keep
    #[arg(long, value_delimiter = ',')]
    pub targetids: Option<Vec<i64>>,

    /// Comma-separated fibers to read
    #[arg(long, value_delimiter = ',')]
    pub fiberids: Option<Vec<i64>>,

    /// Index of the first target to report
    #[arg(long)]
    pub first_target: Option<usize>,

    /// Number of targets to report
    #[arg(short, long)]
    pub ntargets: Option<usize>,

    /// Zero ivar where the and-mask is set
    #[arg(long)]
    pub use_andmask: bool,

    /// Resample frames onto the plate wavelength grid
    #[arg(long)]
    pub coadd_frames: bool,

    /// Resampling policy for --coadd-frames
    #[arg(long, value_enum)]
    pub resample_method: Option<MethodArg>,

    /// Build CSR views of the resolution matrices eagerly
    #[arg(long)]
    pub cache_csr: bool,

    /// Keep every exposure as its own spectrum
    #[arg(long)]
    pub allspec: bool,

    /// Print the target metadata table as JSON
    #[arg(long)]
    pub json: bool,
}

impl ReadArgs {
    /// Config file values with command-line flags applied on top
    fn options(&self) -> Result<ReadOptions> {
        if self.targetids.is_some() && (self.first_target.is_some() || self.ntargets.is_some()) {
            anyhow::bail!("--targetids cannot be combined with --first-target or --ntargets");
        }

        let mut options = match &self.config {
            Some(path) => Config::from_file(path)?.read.to_options(),
            None => ReadOptions::default(),
        };

        if let Some(mode) = self.mode {
            options.mode = mode.into();
        }
        if let Some(seed) = self.seed {
            options.random_seed = seed;
        }
        if let Some(method) = self.resample_method {
            options.resample_method = method.into();
        }
        if self.targetids.is_some() {
            options.target_ids = self.targetids.clone();
        }
        if self.fiberids.is_some() {
            options.fiber_ids = self.fiberids.clone();
        }
        options.use_andmask |= self.use_andmask;
        options.coadd_frames |= self.coadd_frames;
        options.cache_csr |= self.cache_csr;
        options.all_spectra |= self.allspec;

        Ok(options)
    }
}

/// Read spectra and print a summary or the metadata table
pub fn run(args: ReadArgs) -> Result<()> {
    let options = args.options()?;
    let plates = expand_plate_patterns(&args.plates).context("Failed to expand plate patterns")?;
    if plates.is_empty() {
        anyhow::bail!("No plate files matched {:?}", args.plates);
    }

    info!("Reading {} plate files ({:?})", plates.len(), options.mode);
    let output = read_spectra(&plates, &options).context("Failed to read spectra")?;
    let output = window(output, args.first_target, args.ntargets);

    if args.json {
        let json = serde_json::to_string_pretty(&output.metadata)
            .context("Failed to serialize target metadata")?;
        println!("{}", json);
        return Ok(());
    }

    println!("Targets");
    println!("=======");
    for target in &output.targets {
        let npix: usize = target.spectra.iter().map(|s| s.npix()).sum();
        println!(
            "  {:>16}  {:<14} {:>3} spectra {:>7} pixels",
            target.id,
            target.brickname().unwrap_or("-"),
            target.spectra.len(),
            npix
        );
    }
    println!();

    print!("{}", output.report.format_colored());

    Ok(())
}

/// Keep `ntargets` targets starting at `first`
fn window(mut output: IngestOutput, first: Option<usize>, ntargets: Option<usize>) -> IngestOutput {
    if first.is_none() && ntargets.is_none() {
        return output;
    }
    let start = first.unwrap_or(0).min(output.targets.len());
    let end = ntargets
        .map(|n| start.saturating_add(n).min(output.targets.len()))
        .unwrap_or(output.targets.len());

    output.targets = output.targets.drain(start..end).collect();
    let rows = output
        .targets
        .iter()
        .filter_map(|t| output.metadata.get(t.id).cloned())
        .collect();
    output.metadata = TargetMetadataTable::from_rows(rows);
    output
}
