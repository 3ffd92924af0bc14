//! # psdm-io: Raw Record Sources
//!
//! [`RawRecordSource`](psdm_core::RawRecordSource) adapters for directories
//! holding one file per entity kind, plus format detection.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use psdm_core::{AssemblyConfig, GridAssembler};
//! use psdm_io::{open_source, SourceOptions};
//!
//! fn main() -> anyhow::Result<()> {
//!     let (format, source) = open_source(Path::new("grid/"), None, SourceOptions::default())?;
//!     let grid = GridAssembler::new(source, AssemblyConfig::default()).assemble();
//!     println!("{format}: {} nodes", grid.topology.nodes.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Layout
//!
//! | kind | file |
//! |------|------|
//! | nodes | `node_input.{csv,json}` |
//! | lines | `line_input.{csv,json}` |
//! | switches | `switch_input.{csv,json}` |
//! | two-winding transformers | `transformer_2_w_input.{csv,json}` |
//! | three-winding transformers | `transformer_3_w_input.{csv,json}` |
//! | node graphics | `node_graphic_input.{csv,json}` |
//! | line graphics | `line_graphic_input.{csv,json}` |
//!
//! A missing file is an empty kind. Unreadable or malformed files fail their
//! kind with a [`SourceError`](psdm_core::SourceError).

pub mod csv_source;
pub mod format;
pub mod json_source;
pub mod naming;

pub use csv_source::CsvRecordSource;
pub use format::{open_source, Confidence, SourceFormat, SourceOptions};
pub use json_source::JsonRecordSource;
pub use naming::{file_name, file_stem, kind_for_stem};

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use psdm_core::{AssemblyConfig, EntityKind, GridAssembler, GridAssembly, RawRecordSource};

    use super::*;

    const NODES_CSV: &str = "\
uuid,id,v_target,slack,subnet,volt_lvl,v_rated,geo_position
00000000-0000-0000-0000-000000000001,n1,1.0,true,1,mv,20,
00000000-0000-0000-0000-000000000002,n2,1.0,false,1,mv,20,\"{\"\"type\"\":\"\"Point\"\",\"\"coordinates\"\":[7.4,51.5]}\"
";

    const LINES_CSV: &str = "\
uuid,id,node_a,node_b,r,x,b,g,i_max,v_rated,length,parallel_devices
00000000-0000-0000-0000-0000000000a1,l1,00000000-0000-0000-0000-000000000001,00000000-0000-0000-0000-000000000002,0.1,0.2,3,0,300,20,1.5,2
";

    const NODES_JSON: &str = r#"[
  {"uuid":"00000000-0000-0000-0000-000000000001","id":"n1","vTarget":1.0,"slack":true,
   "subnet":1,"voltLvl":"mv","vRated":20,"geoPosition":null},
  {"uuid":"00000000-0000-0000-0000-000000000002","id":"n2","vTarget":1.0,"slack":false,
   "subnet":1,"voltLvl":"mv","vRated":20,
   "geoPosition":{"type":"Point","coordinates":[7.4,51.5]}}
]"#;

    const LINES_JSON: &str = r#"[
  {"uuid":"00000000-0000-0000-0000-0000000000a1","id":"l1",
   "nodeA":"00000000-0000-0000-0000-000000000001","nodeB":"00000000-0000-0000-0000-000000000002",
   "r":0.1,"x":0.2,"b":3,"g":0,"iMax":300,"vRated":20,"length":1.5,"parallelDevices":2}
]"#;

    fn assemble(source: impl RawRecordSource) -> GridAssembly {
        GridAssembler::new(source, AssemblyConfig::default()).assemble()
    }

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_csv_and_json_assemble_the_same_grid() {
        let csv_dir = tempfile::tempdir().unwrap();
        write(csv_dir.path(), "node_input.csv", NODES_CSV);
        write(csv_dir.path(), "line_input.csv", LINES_CSV);
        let json_dir = tempfile::tempdir().unwrap();
        write(json_dir.path(), "node_input.json", NODES_JSON);
        write(json_dir.path(), "line_input.json", LINES_JSON);

        let from_csv = assemble(CsvRecordSource::new(csv_dir.path()));
        let from_json = assemble(JsonRecordSource::new(json_dir.path()));

        assert!(from_csv.report.is_complete(), "{:?}", from_csv.report);
        assert!(from_json.report.is_complete(), "{:?}", from_json.report);
        for kind in EntityKind::ALL {
            assert_eq!(
                from_csv.topology.count(kind),
                from_json.topology.count(kind),
                "{kind}"
            );
        }
        assert_eq!(from_csv.topology.nodes.len(), 2);
        for (a, b) in from_csv.topology.nodes.iter().zip(&from_json.topology.nodes) {
            assert_eq!(**a, **b);
        }
        let (line_csv, line_json) = (&from_csv.topology.lines[0], &from_json.topology.lines[0]);
        assert_eq!(line_csv.parallel_devices, 2);
        assert_eq!(line_csv.node_b.geo_position, line_json.node_b.geo_position);
        assert_eq!(line_csv.r, line_json.r);
    }

    #[test]
    fn test_malformed_kind_fails_alone() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "node_input.json", NODES_JSON);
        write(dir.path(), "line_input.json", "{not json");
        let grid = assemble(JsonRecordSource::new(dir.path()));
        assert_eq!(grid.topology.nodes.len(), 2);
        let lines = grid.report.kind(EntityKind::Line).unwrap();
        assert_eq!(lines.failed, None);
        assert!(lines.error.as_deref().unwrap_or_default().contains("malformed"));
    }
}
