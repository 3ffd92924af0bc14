use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use psdm_core::{AggregationPolicy, EntityKind};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "psdm", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    /// Configuration file (defaults to ~/.psdm/config.toml)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Assemble a grid topology from an input directory and report per kind
    Assemble {
        #[command(flatten)]
        input: InputArgs,

        /// Output format of the report
        #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
        format: OutputFormat,
    },
    /// List the accepted field-set variants of an entity kind
    Fields {
        /// Entity kind, e.g. `node`, `transformer_3w` or `LineInput`
        kind: EntityKind,
    },
    /// Graph utilities on an assembled topology
    Graph {
        #[command(subcommand)]
        command: GraphCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum GraphCommands {
    /// Graph stats summary
    Stats {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Find islands in the grid
    Islands {
        #[command(flatten)]
        input: InputArgs,
        /// Emit the island of every node
        #[arg(long)]
        emit: bool,
    },
    /// Export graph to Graphviz DOT
    Export {
        #[command(flatten)]
        input: InputArgs,
        /// Export format
        #[arg(long, default_value = "dot")]
        graph_format: String,
        /// Write output to a file instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
}

/// Where the raw records come from and how they are assembled.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Directory with one file per entity kind
    #[arg(value_hint = ValueHint::DirPath)]
    pub input: PathBuf,

    /// Input format (auto-detected by default)
    #[arg(long, value_enum, default_value_t = InputFormat::Auto)]
    pub input_format: InputFormat,

    /// Aggregation policy: `all_or_nothing` or `partial`
    #[arg(long)]
    pub policy: Option<AggregationPolicy>,

    /// Convert records in parallel
    #[arg(long)]
    pub parallel: bool,

    /// Restrict assembly to these kinds (repeatable)
    #[arg(long = "kind")]
    pub kinds: Vec<EntityKind>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Auto,
    Csv,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_assemble_arguments() {
        let cli = Cli::try_parse_from([
            "psdm",
            "assemble",
            "grid",
            "--policy",
            "partial",
            "--kind",
            "node",
            "--kind",
            "line",
            "--format",
            "json",
        ])
        .unwrap();
        match cli.command {
            Commands::Assemble { input, format } => {
                assert_eq!(input.policy, Some(AggregationPolicy::Partial));
                assert_eq!(input.kinds, vec![EntityKind::Node, EntityKind::Line]);
                assert_eq!(input.input_format, InputFormat::Auto);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
