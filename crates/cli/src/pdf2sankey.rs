//! pdf2sankey - Break a PDF down by byte layout for a Sankey diagram
//!
//! Scans a PDF for its structural keywords, reconstructs how every byte of
//! the file is used and writes the result as a `source,target,size[,color]`
//! edge list.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use pdfstrata_core::flow::write_csv;
use pdfstrata_core::params::LayoutParams;
use pdfstrata_core::pipeline::{Engine, analyze_file};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Decompression backend.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
enum EngineKind {
    /// Decode streams in-process (default)
    #[default]
    Inline,
    /// Ask the qpdf command line tool
    Qpdf,
}

/// Determine PDF file layout and write a Sankey edge list.
#[derive(Parser, Debug)]
#[command(name = "pdf2sankey")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// PDF file to analyze
    pdf: PathBuf,

    /// CSV output file, always overwritten. Without it CSV goes to stdout
    #[arg(short = 'c', long = "csv")]
    csv: Option<PathBuf>,

    /// Best effort: disable the marker ceiling and consistency checks
    #[arg(short = 'f', long, action = ArgAction::SetTrue)]
    force: bool,

    /// Use debug logging level
    #[arg(short = 'd', long, action = ArgAction::SetTrue)]
    debug: bool,

    /// Print the full layout report as JSON on stdout
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Marker ceiling above which a file is considered too complex
    #[arg(long, default_value = "500")]
    ceiling: usize,

    /// Per-call decompression timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    /// Decompression backend
    #[arg(long, value_enum, default_value = "inline")]
    engine: EngineKind,

    /// Path of the qpdf executable
    #[arg(long, default_value = "qpdf")]
    qpdf: PathBuf,
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let params = LayoutParams::default()
        .marker_ceiling(args.ceiling)
        .force(args.force)
        .service_timeout(Duration::from_secs(args.timeout));
    let engine = match args.engine {
        EngineKind::Inline => Engine::Inline,
        EngineKind::Qpdf => Engine::Qpdf {
            program: args.qpdf.clone(),
        },
    };

    debug!(pdf = %args.pdf.display(), ?engine, ?params, "analyzing");
    let analysis = analyze_file(&args.pdf, &engine, &params)
        .with_context(|| format!("cannot analyze {}", args.pdf.display()))?;

    let stdout = io::stdout();
    if args.json {
        let mut out = BufWriter::new(stdout.lock());
        serde_json::to_writer_pretty(&mut out, &analysis)?;
        writeln!(out)?;
        out.flush()?;
    }

    match &args.csv {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            write_csv(&analysis.edges, BufWriter::new(file))?;
            if args.json {
                eprintln!("\"{}\" created.", path.display());
            } else {
                println!("\"{}\" created.", path.display());
            }
        }
        None if !args.json => write_csv(&analysis.edges, BufWriter::new(stdout.lock()))?,
        None => {}
    }
    Ok(())
}
