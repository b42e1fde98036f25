//! # ptlabel CLI
//!
//! Command-line interface for P-touch label printing.
//!
//! ## Usage
//!
//! ```bash
//! # List USB printers, or scan for Bluetooth peers
//! ptlabel discover
//! ptlabel discover --bluetooth --duration 10
//!
//! # Query printer status
//! ptlabel status
//! ptlabel status --bt EC:79:49:12:34:56
//!
//! # List the built-in fonts
//! ptlabel fonts
//!
//! # Render the first row of a job to PNG
//! ptlabel preview job.json --png label.png
//!
//! # Render every row (label-1.png, label-2.png, ...)
//! ptlabel preview job.json --png label.png --all
//!
//! # Print every row of a job over USB
//! ptlabel print job.json
//! ```
//!
//! Set `RUST_LOG=debug` to see the protocol exchange.

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ptlabel::{
    LabelError,
    batch::{Batch, JobFile, Outcome, query_status},
    layout::{DataRow, Typeface},
    preview,
    transport::{self, LinkKind, TransportTarget, bluetooth},
};

/// ptlabel - P-touch tape label printer utility
#[derive(Parser, Debug)]
#[command(name = "ptlabel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List reachable printers
    Discover {
        /// Scan for Bluetooth peers instead of USB devices
        #[arg(long)]
        bluetooth: bool,

        /// Bluetooth inquiry duration in seconds
        #[arg(long, default_value = "8")]
        duration: u64,
    },

    /// Print the printer's status as JSON
    Status {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// List the built-in fonts as JSON
    Fonts,

    /// Render a job to PNG instead of printing
    Preview {
        /// Job file (JSON)
        job: PathBuf,

        /// Output PNG file
        #[arg(long, value_name = "FILE")]
        png: PathBuf,

        /// Row to render (1-based)
        #[arg(long, default_value = "1")]
        row: usize,

        /// Render every row, numbering the output files
        #[arg(long, conflicts_with = "row")]
        all: bool,
    },

    /// Print one label per row of a job
    Print {
        /// Job file (JSON)
        job: PathBuf,

        #[command(flatten)]
        target: TargetArgs,

        /// Print back to back and cut only after the last label
        #[arg(long)]
        continuous: bool,
    },
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Bluetooth address of the printer (USB is used when omitted)
    #[arg(long, value_name = "ADDR")]
    bt: Option<String>,

    /// RFCOMM channel
    #[arg(long, default_value = "1")]
    channel: u8,

    /// USB serial number, to pick one of several printers
    #[arg(long, conflicts_with = "bt")]
    serial: Option<String>,
}

impl TargetArgs {
    fn target(&self) -> TransportTarget {
        match &self.bt {
            Some(address) => TransportTarget::Bluetooth {
                address: address.clone(),
                channel: self.channel,
            },
            None => TransportTarget::Usb {
                serial: self.serial.clone(),
            },
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), LabelError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Discover {
            bluetooth: true,
            duration,
        } => {
            let scan = bluetooth::discover(Duration::from_secs(duration))?;
            print_json(&scan)?;
        }
        Commands::Discover { .. } => {
            let devices = transport::discover(LinkKind::Usb, Duration::ZERO)?;
            print_json(&devices)?;
        }

        Commands::Status { target } => {
            let status = query_status(&target.target(), &Default::default())?;
            print_json(&status)?;
        }

        Commands::Fonts => {
            print_json(&Typeface::available())?;
        }

        Commands::Preview { job, png, row, all } => {
            let job = JobFile::load(&job)?;
            let rows = job.effective_rows();

            if all {
                let results = preview::preview_batch(&job.label, &rows, &job.mapping);
                for (i, result) in results.into_iter().enumerate() {
                    let path = numbered(&png, i + 1);
                    match result {
                        Ok(bytes) => {
                            std::fs::write(&path, bytes)?;
                            println!("Saved to {}", path.display());
                        }
                        Err(e) => eprintln!("Row {}: {}", i + 1, e),
                    }
                }
                return Ok(());
            }

            let data: &DataRow = row
                .checked_sub(1)
                .and_then(|i| rows.get(i))
                .ok_or_else(|| {
                    LabelError::Config(format!("row {} out of range 1..={}", row, rows.len()))
                })?;
            let bytes = preview::preview_row(&job.label, data, &job.mapping)?;
            std::fs::write(&png, bytes)?;
            println!("Saved to {}", png.display());
        }

        Commands::Print {
            job,
            target,
            continuous,
        } => {
            let job = JobFile::load(&job)?;
            let rows = job.effective_rows();
            let mut options = job.options.clone();
            options.continuous |= continuous;

            let result = Batch::new(&job.label, &rows)
                .mapping(job.mapping.clone())
                .options(options)
                .run_on(&target.target(), |report| match report.outcome {
                    Outcome::Success => eprintln!("Row {}: printed", report.index + 1),
                    Outcome::Error => eprintln!(
                        "Row {}: {}",
                        report.index + 1,
                        report.message.as_deref().unwrap_or("failed")
                    ),
                });

            print_json(&result)?;
            if result.totals.failed > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), LabelError> {
    let text = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{}", text);
    Ok(())
}

/// `label.png` -> `label-3.png`
fn numbered(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "label".to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    path.with_file_name(format!("{}-{}.{}", stem, n, ext))
}
