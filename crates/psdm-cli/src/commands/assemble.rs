use std::io::{self, Write};

use anyhow::{bail, Result};
use psdm_core::GridAssembly;
use tabwriter::TabWriter;

use psdm_cli::cli::{InputArgs, OutputFormat};
use psdm_cli::config::PsdmConfig;

use super::assemble_input;

pub fn handle(args: &InputArgs, format: OutputFormat, config: &PsdmConfig) -> Result<()> {
    let grid = assemble_input(args, config)?;
    match format {
        OutputFormat::Plain => print_plain(&grid)?,
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&grid.report)?);
        }
    }

    let failed: Vec<String> = grid
        .report
        .failed_kinds()
        .map(|kind| kind.kind.to_string())
        .collect();
    if !failed.is_empty() {
        bail!("assembly failed for {}", failed.join(", "));
    }
    Ok(())
}

fn print_plain(grid: &GridAssembly) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "Kind\tStatus\tBuilt\tFailed")?;
    for kind in &grid.report.kinds {
        let failed = kind
            .failed
            .map(|count| count.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(writer, "{}\t{}\t{}\t{}", kind.kind, kind.status, kind.built, failed)?;
    }
    writer.flush()?;

    for kind in grid.report.failed_kinds() {
        if let Some(error) = &kind.error {
            println!("{}: {}", kind.kind, error);
        }
    }
    let diagnostics = &grid.report.diagnostics;
    if diagnostics.has_issues() {
        print!("{diagnostics}");
    }
    Ok(())
}
