pub mod assemble;
pub mod fields;
pub mod graph;

use anyhow::Result;
use psdm_core::{GridAssembler, GridAssembly};
use psdm_io::{open_source, SourceFormat};
use tracing::info;

use psdm_cli::cli::{InputArgs, InputFormat};
use psdm_cli::config::PsdmConfig;

/// Open the input directory and assemble it with config and flag settings.
pub fn assemble_input(args: &InputArgs, config: &PsdmConfig) -> Result<GridAssembly> {
    let format = match args.input_format {
        InputFormat::Auto => config.source_format()?,
        InputFormat::Csv => Some(SourceFormat::Csv),
        InputFormat::Json => Some(SourceFormat::Json),
    };
    let (format, source) = open_source(&args.input, format, config.source_options()?)?;
    let assembly = config.assembly_for(args);
    info!(
        input = %args.input.display(),
        %format,
        policy = %assembly.policy,
        parallel = assembly.parallel,
        "assembling grid"
    );
    Ok(GridAssembler::new(source, assembly).assemble())
}
