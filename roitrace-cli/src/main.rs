//!
//! Command-line driver for ROI trace extraction and event detection.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use thiserror::Error;

use roitrace_core::{SplitSpec, Traceable};
use roitrace_detect::{template_matching, BiExponential};
use roitrace_io::{load_document, masks_from_swc, save_document, SaveOptions, SwcFile};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    RoitraceIo(#[from] roitrace_io::Error),

    #[error("core error: {0}")]
    Core(#[from] roitrace_core::Error),

    #[error("detection error: {0}")]
    Detect(#[from] roitrace_detect::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// ROI mask geometry, trace extraction and event detection.
#[derive(Parser)]
#[command(name = "roitrace")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an SWC skeleton into a document
    ImportSwc {
        /// SWC skeleton file
        swc: PathBuf,

        /// Document holding the 3-D dataset
        #[arg(short, long)]
        data: PathBuf,

        /// Output document path
        #[arg(short, long)]
        output: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about a document
    Info {
        /// Input document
        input: PathBuf,
    },

    /// Extract all traces and print them as JSON
    Traces {
        /// Input document
        input: PathBuf,

        /// Skip the document overlay during extraction
        #[arg(long)]
        no_overlay: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Re-segment a branch mask at a fixed arc length or count
    Split {
        /// Input document
        input: PathBuf,

        /// Name of the branch mask to split
        #[arg(short, long)]
        branch: String,

        /// Target segment count (exclusive with --length)
        #[arg(short = 'n', long, conflicts_with = "length")]
        count: Option<usize>,

        /// Target segment arc length (exclusive with --count)
        #[arg(short, long)]
        length: Option<f64>,

        /// Output document path
        #[arg(short, long)]
        output: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Detect events on one mask's trace with a biexponential template
    Detect {
        /// Input document
        input: PathBuf,

        /// Name of the mask (or segment) to analyse
        #[arg(short, long)]
        mask: String,

        /// Slow decay time constant of the template, in frames
        #[arg(long, default_value = "8.0")]
        tau1: f64,

        /// Fast rise time constant of the template, in frames
        #[arg(long, default_value = "1.5")]
        tau2: f64,

        /// Detection threshold on the matched-filter criterion
        #[arg(short, long, default_value = "3.0")]
        threshold: f64,

        /// Skip the document overlay during extraction
        #[arg(long)]
        no_overlay: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::ImportSwc {
            swc,
            data,
            output,
            verbose,
        } => {
            let start = Instant::now();
            let skeleton = SwcFile::open(&swc)?;
            if verbose {
                eprintln!(
                    "Read {} samples in {} chains from {}",
                    skeleton.rows().len(),
                    skeleton.chains().len(),
                    swc.display()
                );
            }

            let mut document = load_document(&data)?;
            let mut names = roitrace_core::NameAllocator::new();
            let mut imported = 0usize;
            for mask in masks_from_swc(&skeleton, &mut names)? {
                if document.masks.add(mask) {
                    imported += 1;
                }
            }

            let options = SaveOptions {
                data: true,
                ..SaveOptions::default()
            };
            save_document(&output, &document, &options)?;
            if verbose {
                eprintln!(
                    "Imported {imported} masks into {} in {:.2?}",
                    output.display(),
                    start.elapsed()
                );
            }
            Ok(())
        }

        Commands::Info { input } => {
            let document = load_document(&input)?;
            let (rows, cols, frames) = document.data().dim();
            println!("data: {rows} x {cols} pixels, {frames} frames");
            println!("threshold: {}", document.threshold());
            println!("masks: {}", document.masks.len());
            for mask in document.masks.iter() {
                let children = mask.children().len();
                if children > 0 {
                    println!("  {} ({}, {} children)", mask.name(), mask.kind().label(), children);
                } else {
                    println!("  {} ({})", mask.name(), mask.kind().label());
                }
            }
            Ok(())
        }

        Commands::Traces {
            input,
            no_overlay,
            verbose,
        } => {
            let start = Instant::now();
            let document = load_document(&input)?;
            let data = document.data();
            let overlay = (!no_overlay).then(|| document.overlay());

            let sources: Vec<&dyn Traceable> = document.masks.iter_flat().collect();
            let traces = sources
                .par_iter()
                .map(|mask| {
                    let trace = mask.apply(data, overlay)?;
                    Ok((mask.name().to_string(), trace.to_vec()))
                })
                .collect::<Result<Vec<_>>>()?;

            if verbose {
                eprintln!("Extracted {} traces in {:.2?}", traces.len(), start.elapsed());
            }

            let report: serde_json::Map<String, serde_json::Value> = traces
                .into_iter()
                .map(|(name, trace)| (name, serde_json::json!(trace)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        Commands::Split {
            input,
            branch,
            count,
            length,
            output,
            verbose,
        } => {
            let spec = match (count, length) {
                (Some(n), None) => SplitSpec::Count(n),
                (None, Some(l)) => SplitSpec::Length(l),
                _ => {
                    return Err(roitrace_core::Error::InvalidSplit(
                        "provide exactly one of --count or --length".to_string(),
                    )
                    .into())
                }
            };

            let mut document = load_document(&input)?;
            let mask = document
                .masks
                .get_mut(&branch)
                .ok_or_else(|| roitrace_core::Error::UnknownMask(branch.clone()))?;
            let roitrace_core::Mask::Branch(branch_mask) = mask else {
                return Err(roitrace_core::Error::UnknownMask(format!(
                    "{branch} is not a branch mask"
                ))
                .into());
            };
            branch_mask.split(spec)?;
            if verbose {
                eprintln!(
                    "Split {branch} into {} segments",
                    branch_mask.segments().len()
                );
            }

            let options = SaveOptions {
                data: true,
                ..SaveOptions::default()
            };
            save_document(&output, &document, &options)?;
            Ok(())
        }

        Commands::Detect {
            input,
            mask,
            tau1,
            tau2,
            threshold,
            no_overlay,
            verbose,
        } => {
            let document = load_document(&input)?;
            let data = document.data();
            let overlay = (!no_overlay).then(|| document.overlay());

            let source = document
                .masks
                .iter_flat()
                .find(|m| m.name() == mask)
                .ok_or_else(|| roitrace_core::Error::UnknownMask(mask.clone()))?;
            let trace = document.postprocess(source.apply(data, overlay)?);

            let kernel = BiExponential::new(tau1, tau2)?.kernel();
            let half_window = kernel.len() / 2;
            if verbose {
                eprintln!(
                    "Matching a {}-sample template against {} frames",
                    kernel.len(),
                    trace.len()
                );
            }

            let result = template_matching(&trace, &kernel, threshold)?;
            let events: Vec<serde_json::Value> = result
                .indices
                .iter()
                .map(|&i| {
                    serde_json::json!({
                        // Convolution centers the window; report onsets.
                        "frame": i.saturating_sub(half_window),
                        "scale": result.scale[i],
                        "offset": result.offset[i],
                        "crit": result.crit[i],
                    })
                })
                .collect();

            let report = serde_json::json!({
                "mask": mask,
                "threshold": threshold,
                "kernel_samples": kernel.len(),
                "nevents": events.len(),
                "events": events,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
