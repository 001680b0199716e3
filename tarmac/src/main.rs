mod output;

use anyhow::{Context, Result};
use clap::Parser;
use output::{ArchiveSink, BuildOutput, Reporter};
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use tarmac_core::{Algorithm, BuildOptions, build_archive};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit code for failed runs. Usage errors exit with 2 (clap's default).
const EXIT_FAILURE: u8 = 1;

/// Tarmac - write a deduplicated, content-addressed tar archive to stdout
#[derive(Parser)]
#[command(name = "tarmac")]
#[command(
    about = "Archive a directory to stdout, storing each distinct file content once",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Source directory to archive
    source: PathBuf,

    /// Compress output using gzip
    #[arg(short = 'z', long, env = "TARMAC_COMPRESS")]
    compress: bool,

    /// Gzip compression level (0-9)
    #[arg(
        long,
        env = "TARMAC_LEVEL",
        default_value_t = 6,
        value_parser = clap::value_parser!(u32).range(0..=9)
    )]
    level: u32,

    /// Content hash algorithm (sha512 or blake3)
    #[arg(long, env = "TARMAC_ALGO", default_value = "sha512")]
    algo: Algorithm,

    /// Write the archive even when stdout is a terminal
    #[arg(long)]
    force: bool,

    /// Print build statistics to stderr
    #[arg(long)]
    stats: bool,

    /// Report statistics and errors as JSON (implies --stats)
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let reporter = Reporter::new(cli.json);
    match run(&cli, &reporter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            reporter.write_error(&e, EXIT_FAILURE);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Log to stderr; stdout carries the archive.
fn init_tracing(verbose: u8) {
    let default_filter = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("TARMAC_LOG")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}

fn run(cli: &Cli, reporter: &Reporter) -> Result<()> {
    if !cli.force && atty::is(atty::Stream::Stdout) {
        anyhow::bail!("Refusing to write archive data to a terminal (use --force or redirect stdout)");
    }

    let stdout = io::stdout();
    let sink = ArchiveSink::new(BufWriter::new(stdout.lock()), cli.compress, cli.level);
    let options = BuildOptions {
        algorithm: cli.algo,
    };

    let (sink, stats) = build_archive(&cli.source, sink, options)
        .with_context(|| format!("Failed to archive {}", cli.source.display()))?;

    sink.finish().with_context(|| "Failed to finalize output stream")?;

    info!(
        source = %cli.source.display(),
        files = stats.files,
        blobs = stats.blobs_stored,
        links = stats.links_written,
        "wrote archive"
    );

    if cli.stats || reporter.is_json() {
        let output = BuildOutput {
            success: true,
            result_code: 0,
            source: cli.source.display().to_string(),
            algorithm: cli.algo.to_string(),
            compressed: cli.compress,
            stats,
        };
        reporter.write(&output, || output.to_text())?;
    }

    Ok(())
}
