// Declare modules
pub mod cli;
pub mod config;
pub mod error;
pub mod formatter;
pub mod invocation;
pub mod models;
pub mod runner;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Read, Write};

use self::cli::{Cli, ReportFormat};
use self::config::resolve_settings;
use self::formatter::{OutputGenerator, Report};
use self::invocation::Invocation;
use self::runner::Runner;

/// Renders one policy document and prints the report.
///
/// Returns whether RtConfig exited cleanly; the report is printed either way.
pub fn run() -> Result<bool> {
    // 1. Parse Args
    let args = Cli::parse();

    // 2. Resolve Settings
    let settings = resolve_settings(&args)?;

    // 3. Read the policy source, byte for byte
    let input = match &args.input {
        Some(path) => fs::read(path).context(format!("Failed to read input {:?}", path))?,
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read input from stdin")?;
            buf
        }
    };
    if input.is_empty() {
        log::warn!("Input is empty; RtConfig will have nothing to expand.");
    }

    // 4. Build and Run
    let invocation = Invocation::build(&settings);
    let result = Runner::new()
        .with_timeout(settings.timeout())
        .run(&invocation, &input);

    // 5. Generate Output
    let report = Report::new(&args.page_name, &result, &input, settings.debug);
    let output = match args.format {
        ReportFormat::Text => OutputGenerator::generate_text(&report, &result, &input),
        ReportFormat::Json => OutputGenerator::generate_json(&report)?.into_bytes(),
    };

    // 6. Print to Stdout
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(&output)
        .context("Failed to write report")?;
    if !output.ends_with(b"\n") {
        stdout.write_all(b"\n").context("Failed to write report")?;
    }

    if let Some(err) = result.error() {
        log::error!("{}", err);
    }
    Ok(result.is_success())
}
