pub use run_app as run;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use clap::Parser;
use anyhow::{Context, Result};
use printer::{TerminalPrinter, WriterOutput};
use report::ReportSet;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Print Gherkin lint feedback grouped by file and line", long_about = None)]
pub struct Args {
    /// JSON report mapping paths to line feedback; reads stdin when omitted or "-"
    #[arg(help = "Feedback report file (JSON)")]
    pub report: Option<PathBuf>,

    /// Directory the report paths were collected under; its length is cut from every path
    #[arg(long, short = 'b', help = "Base path stripped from displayed paths (default: current directory)")]
    pub base_path: Option<String>,

    #[arg(long, short = 'v', help = "Enable debug logging on stderr")]
    pub verbose: bool,
}

pub fn run_app() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let base_path = match &args.base_path {
        Some(base_path) => base_path.clone(),
        None => std::env::current_dir()
            .context("Failed to resolve current directory")?
            .to_string_lossy()
            .into_owned(),
    };

    let reports = load_reports(args.report.as_deref())?;
    info!(files = reports.len(), base_path = %base_path, "printing feedback");

    let stdout = io::stdout();
    print_reports(&reports, &base_path, stdout.lock())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (e.g. from tests) is harmless, so the error is dropped.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .try_init();
}

/// Reads a report from `path`, or from stdin when `path` is `None` or `-`.
pub fn load_reports(path: Option<&Path>) -> Result<ReportSet> {
    match path {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open report: {}", path.display()))?;
            ReportSet::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to read report: {}", path.display()))
        }
        _ => ReportSet::from_reader(io::stdin().lock()).context("Failed to read report from stdin"),
    }
}

pub fn print_reports<W: Write>(reports: &ReportSet, base_path: &str, writer: W) -> Result<()> {
    let mut printer = TerminalPrinter::new(WriterOutput::new(writer), base_path);
    printer.print(reports).context("Failed to write feedback")?;
    printer
        .into_output()
        .into_inner()
        .flush()
        .context("Failed to write feedback")
}
