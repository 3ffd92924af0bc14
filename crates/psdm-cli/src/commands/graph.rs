use std::fs;

use anyhow::Result;
use psdm_core::graph_utils;

use psdm_cli::cli::GraphCommands;
use psdm_cli::config::PsdmConfig;

use super::assemble_input;

pub fn handle(command: &GraphCommands, config: &PsdmConfig) -> Result<()> {
    match command {
        GraphCommands::Stats { input } => {
            let grid = assemble_input(input, config)?;
            let stats = graph_utils::graph_stats(&grid.topology);
            println!("Graph statistics for {}:", input.input.display());
            println!("  Nodes         : {}", stats.node_count);
            println!("  Edges         : {}", stats.edge_count);
            println!("  Components    : {}", stats.connected_components);
            println!(
                "  Degree [min/avg/max]: {}/{:.2}/{}",
                stats.min_degree, stats.avg_degree, stats.max_degree
            );
            println!("  Density       : {:.4}", stats.density);
            Ok(())
        }
        GraphCommands::Islands { input, emit } => {
            let grid = assemble_input(input, config)?;
            let analysis = graph_utils::find_islands(&grid.topology);
            for summary in &analysis.islands {
                println!(
                    "Island {}: {} node(s){}",
                    summary.island_id,
                    summary.node_count,
                    if summary.has_slack { ", slack" } else { "" }
                );
            }
            if *emit {
                println!("\nNode → Island assignments:");
                for assignment in &analysis.assignments {
                    println!(
                        "  {}: {:<20} -> island {}",
                        assignment.uuid, assignment.label, assignment.island_id
                    );
                }
            }
            Ok(())
        }
        GraphCommands::Export {
            input,
            graph_format,
            out,
        } => {
            let grid = assemble_input(input, config)?;
            let dot = graph_utils::export_graph(&grid.topology, graph_format)?;
            if let Some(path) = out {
                fs::write(path, &dot)?;
                println!("Graph exported to {}", path.display());
            } else {
                println!("{dot}");
            }
            Ok(())
        }
    }
}
