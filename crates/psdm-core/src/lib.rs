//! # psdm-core: Grid Topology Ingestion Core
//!
//! Turns loosely typed raw records (field name → string value maps coming from
//! CSV rows, SQL rows, JSON documents or graph database nodes) into a strongly
//! typed, cross-referenced grid topology, collecting per-record failures
//! instead of aborting the batch.
//!
//! ## Pipeline
//!
//! ```text
//! RawRecordSource ──► FieldSetSpec::select ──► EntityFactory::build ──┐
//!                         (normalize)                                 │
//!                                                                     ▼
//!   GridTopology ◄── GridAssembler ◄── scan_for_exceptions ◄── Result<T, IngestError>
//!                       │   ▲
//!                       ▼   │
//!               ReferenceResolver / MultiPartJoiner
//! ```
//!
//! - **Nodes** are built first and registered in a run-scoped
//!   [`ReferenceResolver`].
//! - **Edges** (lines, switches, two- and three-winding transformers) hold
//!   shared [`Arc`] references to those nodes, never raw ids.
//! - **Graphics** reference nodes or lines and are built last.
//!
//! ## Quick Start
//!
//! ```rust
//! use psdm_core::*;
//!
//! let mut source = InMemorySource::new();
//! source.push(RawRecord::new(EntityKind::Node, [
//!     ("uuid", "4ca90220-74c2-4369-9afa-a18bf068840d"),
//!     ("id", "node_a"),
//!     ("v_target", "1.0"),
//!     ("slack", "true"),
//!     ("subnet", "1"),
//!     ("volt_lvl", "mv"),
//!     ("v_rated", "20.0"),
//! ]));
//!
//! let assembler = GridAssembler::new(source, AssemblyConfig::default());
//! let grid = assembler.assemble();
//! assert_eq!(grid.topology.nodes.len(), 1);
//! assert!(grid.report.is_complete());
//! ```
//!
//! ## Modules
//!
//! - [`record`] - raw records and key normalization
//! - [`fields`] - field-set variants and typed field access
//! - [`normalize`] - field name → physical quantity table
//! - [`factory`] - per-kind entity factories
//! - [`resolver`] - run-scoped id → entity index
//! - [`joiner`] - multi-part (transformer winding) joining
//! - [`aggregate`] - capture and fold per-record outcomes
//! - [`assembler`] - fetch ordering, caching, topology assembly
//! - [`topology`] / [`graph_utils`] - the assembled container and its graph view

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod aggregate;
pub mod assembler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod factory;
pub mod fields;
pub mod graph_utils;
pub mod joiner;
pub mod normalize;
pub mod record;
pub mod resolver;
pub mod source;
pub mod topology;
pub mod units;

pub use aggregate::{apply, partition_results, scan_for_exceptions, scan_labelled};
pub use assembler::{AssemblyReport, GridAssembler, GridAssembly, KindOutcome, KindReport};
pub use config::{AggregationPolicy, AssemblyConfig};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{
    AggregateError, CoercionCause, IngestError, IngestResult, KindFailure, SourceError,
    UnitMappingError,
};
pub use factory::EntityFactory;
pub use fields::{FieldSet, FieldSetSpec, FieldValues};
pub use joiner::{Joinable, MultiPartJoiner, MultiPartKey, TransformerFragment, WindingPosition};
pub use normalize::normalize;
pub use record::RawRecord;
pub use resolver::{NodeResolver, ReferenceResolver};
pub use source::{InMemorySource, RawRecordSource};
pub use topology::GridTopology;
pub use units::{
    Amperes, Degrees, Kilometers, KilovoltAmperes, Kilovolts, Kilovars, Kilowatts,
    MicrosiemensPerKilometer, Nanosiemens, Ohms, OhmsPerKilometer, PerUnit, Percent, Quantity,
    QuantityKind,
};

/// Entity kinds the pipeline knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "node")]
    Node,
    #[serde(rename = "line")]
    Line,
    #[serde(rename = "switch")]
    Switch,
    #[serde(rename = "transformer_2w")]
    Transformer2W,
    #[serde(rename = "transformer_3w")]
    Transformer3W,
    #[serde(rename = "node_graphic")]
    NodeGraphic,
    #[serde(rename = "line_graphic")]
    LineGraphic,
}

impl EntityKind {
    /// All kinds in build order (nodes, edges, graphics).
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Node,
        EntityKind::Line,
        EntityKind::Switch,
        EntityKind::Transformer2W,
        EntityKind::Transformer3W,
        EntityKind::NodeGraphic,
        EntityKind::LineGraphic,
    ];

    /// Short snake_case tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Node => "node",
            EntityKind::Line => "line",
            EntityKind::Switch => "switch",
            EntityKind::Transformer2W => "transformer_2w",
            EntityKind::Transformer3W => "transformer_3w",
            EntityKind::NodeGraphic => "node_graphic",
            EntityKind::LineGraphic => "line_graphic",
        }
    }

    /// Name of the typed entity produced for this kind.
    pub fn entity_name(&self) -> &'static str {
        match self {
            EntityKind::Node => "NodeInput",
            EntityKind::Line => "LineInput",
            EntityKind::Switch => "SwitchInput",
            EntityKind::Transformer2W => "Transformer2WInput",
            EntityKind::Transformer3W => "Transformer3WInput",
            EntityKind::NodeGraphic => "NodeGraphicInput",
            EntityKind::LineGraphic => "LineGraphicInput",
        }
    }

    /// True for kinds that connect nodes.
    pub fn is_edge(&self) -> bool {
        matches!(
            self,
            EntityKind::Line
                | EntityKind::Switch
                | EntityKind::Transformer2W
                | EntityKind::Transformer3W
        )
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = record::normalize_key(s);
        EntityKind::ALL
            .into_iter()
            .find(|kind| {
                record::normalize_key(kind.as_str()) == wanted
                    || record::normalize_key(kind.entity_name()) == wanted
            })
            .ok_or_else(|| format!("unknown entity kind '{s}'"))
    }
}

/// Minimal capability shared by every typed entity.
pub trait UniqueEntity {
    /// Kind tag of the implementing entity.
    const KIND: EntityKind;

    /// Unique id of this entity within one assembly run.
    fn uuid(&self) -> Uuid;
}

/// Entities that connect two or more nodes.
pub trait Connector: UniqueEntity {
    /// All connected nodes, in port order (A, B, C).
    fn nodes(&self) -> Vec<&Arc<NodeInput>>;
}

/// Period in which an asset is in operation. Open ends are unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationTime {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl OperationTime {
    /// Unlimited operation.
    pub fn not_limited() -> Self {
        Self::default()
    }

    pub fn is_limited(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }

    /// Whether the asset operates at the given instant.
    pub fn includes(&self, instant: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| start <= instant)
            && self.end.map_or(true, |end| instant <= end)
    }
}

/// WGS84 coordinate (x = longitude, y = latitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub x: f64,
    pub y: f64,
}

/// Ordered coordinate sequence, e.g. the route of a line.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPath {
    pub points: Vec<GeoPoint>,
}

/// Common voltage levels with their rated-voltage bands (kV, lower bound inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoltageLevel {
    Lv,
    Mv,
    Hv,
    Ehv,
}

impl VoltageLevel {
    pub const ALL: [VoltageLevel; 4] = [
        VoltageLevel::Lv,
        VoltageLevel::Mv,
        VoltageLevel::Hv,
        VoltageLevel::Ehv,
    ];

    /// Rated voltage band `[low, high)` in kV; the `ehv` band is closed at 1000 kV.
    pub fn band(&self) -> (Kilovolts, Kilovolts) {
        match self {
            VoltageLevel::Lv => (Kilovolts(0.0), Kilovolts(10.0)),
            VoltageLevel::Mv => (Kilovolts(10.0), Kilovolts(110.0)),
            VoltageLevel::Hv => (Kilovolts(110.0), Kilovolts(220.0)),
            VoltageLevel::Ehv => (Kilovolts(220.0), Kilovolts(1000.0)),
        }
    }

    pub fn covers(&self, v_rated: Kilovolts) -> bool {
        let (low, high) = self.band();
        match self {
            VoltageLevel::Ehv => low <= v_rated && v_rated <= high,
            _ => low <= v_rated && v_rated < high,
        }
    }

    /// Level whose band contains the rated voltage.
    pub fn infer(v_rated: Kilovolts) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.covers(v_rated))
    }

    /// Parse an English or German level code (`mv`, `ms`, `hös`, ...).
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "lv" | "ns" => Some(VoltageLevel::Lv),
            "mv" | "ms" => Some(VoltageLevel::Mv),
            "hv" | "hs" => Some(VoltageLevel::Hv),
            "ehv" | "hös" | "hoes" => Some(VoltageLevel::Ehv),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            VoltageLevel::Lv => "lv",
            VoltageLevel::Mv => "mv",
            VoltageLevel::Hv => "hv",
            VoltageLevel::Ehv => "ehv",
        }
    }
}

// Basic component structs

/// Electrical node (bus bar) all connectors attach to.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInput {
    pub uuid: Uuid,
    pub id: String,
    pub operation_time: OperationTime,
    /// Voltage setpoint in per-unit of `v_rated`
    pub v_target: PerUnit,
    /// Whether this node is the slack (reference) node of its subnet
    pub slack: bool,
    pub geo_position: Option<GeoPoint>,
    pub volt_lvl: VoltageLevel,
    pub v_rated: Kilovolts,
    pub subnet: i32,
}

/// Overhead line or cable between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct LineInput {
    pub uuid: Uuid,
    pub id: String,
    pub operation_time: OperationTime,
    pub node_a: Arc<NodeInput>,
    pub node_b: Arc<NodeInput>,
    /// Number of identical systems operated in parallel
    pub parallel_devices: u32,
    pub r: OhmsPerKilometer,
    pub x: OhmsPerKilometer,
    pub b: MicrosiemensPerKilometer,
    pub g: MicrosiemensPerKilometer,
    /// Thermal current limit
    pub i_max: Amperes,
    pub v_rated: Kilovolts,
    pub length: Kilometers,
    pub geo_position: Option<GeoPath>,
    /// Operational line monitoring characteristic
    pub olm_characteristic: String,
}

impl LineInput {
    /// Characteristic used when the record does not provide one.
    pub const DEFAULT_OLM_CHARACTERISTIC: &'static str = "olm:{(0.00,1.00)}";
}

/// Switch between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchInput {
    pub uuid: Uuid,
    pub id: String,
    pub operation_time: OperationTime,
    pub node_a: Arc<NodeInput>,
    pub node_b: Arc<NodeInput>,
    pub closed: bool,
}

/// Tap changer and magnetization data shared by all windings of a transformer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapChanger {
    pub g_m: Nanosiemens,
    pub b_m: Nanosiemens,
    pub d_v: Percent,
    pub d_phi: Degrees,
    pub tap_neutr: i32,
    pub tap_min: i32,
    pub tap_max: i32,
    pub tap_pos: i32,
    pub auto_tap: bool,
}

/// Rating of one transformer winding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindingRating {
    pub s_rated: KilovoltAmperes,
    pub v_rated: Kilovolts,
    pub r_sc: Ohms,
    pub x_sc: Ohms,
}

/// Two-winding transformer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformer2WInput {
    pub uuid: Uuid,
    pub id: String,
    pub operation_time: OperationTime,
    /// High voltage side
    pub node_a: Arc<NodeInput>,
    /// Low voltage side
    pub node_b: Arc<NodeInput>,
    pub parallel_devices: u32,
    pub s_rated: KilovoltAmperes,
    pub v_rated_a: Kilovolts,
    pub v_rated_b: Kilovolts,
    pub r_sc: Ohms,
    pub x_sc: Ohms,
    pub tap: TapChanger,
}

/// Three-winding transformer, assembled from one fragment per winding.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformer3WInput {
    pub uuid: Uuid,
    pub id: String,
    pub operation_time: OperationTime,
    pub node_a: Arc<NodeInput>,
    pub node_b: Arc<NodeInput>,
    pub node_c: Arc<NodeInput>,
    pub parallel_devices: u32,
    /// Ratings of windings A, B and C
    pub windings: [WindingRating; 3],
    pub tap: TapChanger,
}

/// Schematic placement of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeGraphicInput {
    pub uuid: Uuid,
    pub graphic_layer: String,
    pub path: Option<GeoPath>,
    pub node: Arc<NodeInput>,
    pub point: Option<GeoPoint>,
}

/// Schematic route of a line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineGraphicInput {
    pub uuid: Uuid,
    pub graphic_layer: String,
    pub path: Option<GeoPath>,
    pub line: Arc<LineInput>,
}

macro_rules! impl_unique_entity {
    ($type:ty, $kind:ident) => {
        impl UniqueEntity for $type {
            const KIND: EntityKind = EntityKind::$kind;

            fn uuid(&self) -> Uuid {
                self.uuid
            }
        }
    };
}

impl_unique_entity!(NodeInput, Node);
impl_unique_entity!(LineInput, Line);
impl_unique_entity!(SwitchInput, Switch);
impl_unique_entity!(Transformer2WInput, Transformer2W);
impl_unique_entity!(Transformer3WInput, Transformer3W);
impl_unique_entity!(NodeGraphicInput, NodeGraphic);
impl_unique_entity!(LineGraphicInput, LineGraphic);

impl Connector for LineInput {
    fn nodes(&self) -> Vec<&Arc<NodeInput>> {
        vec![&self.node_a, &self.node_b]
    }
}

impl Connector for SwitchInput {
    fn nodes(&self) -> Vec<&Arc<NodeInput>> {
        vec![&self.node_a, &self.node_b]
    }
}

impl Connector for Transformer2WInput {
    fn nodes(&self) -> Vec<&Arc<NodeInput>> {
        vec![&self.node_a, &self.node_b]
    }
}

impl Connector for Transformer3WInput {
    fn nodes(&self) -> Vec<&Arc<NodeInput>> {
        vec![&self.node_a, &self.node_b, &self.node_c]
    }
}

impl<T: UniqueEntity> UniqueEntity for Arc<T> {
    const KIND: EntityKind = T::KIND;

    fn uuid(&self) -> Uuid {
        self.as_ref().uuid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_entity_kind_parse_accepts_tags_and_names() {
        assert_eq!("transformer_2w".parse::<EntityKind>(), Ok(EntityKind::Transformer2W));
        assert_eq!("LineInput".parse::<EntityKind>(), Ok(EntityKind::Line));
        assert_eq!("node-graphic".parse::<EntityKind>(), Ok(EntityKind::NodeGraphic));
        assert!("trafo".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_entity_kind_order_puts_nodes_first() {
        assert_eq!(EntityKind::ALL[0], EntityKind::Node);
        assert!(EntityKind::ALL[1..5].iter().all(|k| k.is_edge()));
        assert!(!EntityKind::NodeGraphic.is_edge());
    }

    #[test]
    fn test_voltage_level_codes() {
        assert_eq!(VoltageLevel::from_code("MS"), Some(VoltageLevel::Mv));
        assert_eq!(VoltageLevel::from_code("hös"), Some(VoltageLevel::Ehv));
        assert_eq!(VoltageLevel::from_code("xv"), None);
    }

    #[test]
    fn test_voltage_level_bands() {
        assert_eq!(VoltageLevel::infer(Kilovolts(0.4)), Some(VoltageLevel::Lv));
        assert_eq!(VoltageLevel::infer(Kilovolts(10.0)), Some(VoltageLevel::Mv));
        assert_eq!(VoltageLevel::infer(Kilovolts(110.0)), Some(VoltageLevel::Hv));
        assert_eq!(VoltageLevel::infer(Kilovolts(380.0)), Some(VoltageLevel::Ehv));
        assert_eq!(VoltageLevel::infer(Kilovolts(1000.0)), Some(VoltageLevel::Ehv));
        assert_eq!(VoltageLevel::infer(Kilovolts(-1.0)), None);
        assert!(!VoltageLevel::Mv.covers(Kilovolts(110.0)));
    }

    #[test]
    fn test_operation_time_bounds() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let limited = OperationTime {
            start: Some(start),
            end: Some(end),
        };
        assert!(limited.is_limited());
        assert!(limited.includes(Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()));
        assert!(!limited.includes(Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap()));
        assert!(OperationTime::not_limited().includes(end));
    }
}
