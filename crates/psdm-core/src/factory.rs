//! Per-kind entity factories.
//!
//! Every factory owns the [`FieldSetSpec`] of its kind, selects the variant a
//! record covers and coerces the selected fields into a typed entity. Edge and
//! graphic factories borrow a run-scoped resolver for their foreign keys; a
//! record whose reference does not resolve fails on its own.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::{CoercionCause, IngestError, IngestResult};
use crate::fields::{FieldSetSpec, FieldValues};
use crate::joiner::{FragmentPort, TransformerFragment, WindingPosition};
use crate::record::RawRecord;
use crate::resolver::{NodeResolver, ReferenceResolver};
use crate::units::{
    Amperes, Degrees, Kilometers, KilovoltAmperes, Kilovolts, MicrosiemensPerKilometer,
    Nanosiemens, Ohms, OhmsPerKilometer, PerUnit, Percent,
};
use crate::{
    EntityKind, LineGraphicInput, LineInput, NodeGraphicInput, NodeInput, OperationTime,
    SwitchInput, TapChanger, VoltageLevel, WindingRating,
};

const OPERATES_FROM: &[&str] = &["operatesFrom"];
const OPERATES_UNTIL: &[&str] = &["operatesUntil"];
const PARALLEL_DEVICES: &[&str] = &["parallelDevices"];
const GEO_POSITION: &[&str] = &["geoPosition"];

const TRANSFORMER_BASE: &[&str] = &["uuid", "id", "windings"];
const TAP_FIELDS: &[&str] = &[
    "gM", "bM", "dV", "dPhi", "tapNeutr", "tapMin", "tapMax", "tapPos", "autoTap",
];
const COMPLETE_PORTS: &[&str] = &["nodeA", "nodeB", "sRated", "vRatedA", "vRatedB", "rSc", "xSc"];
const WINDING_PORT: &[&str] = &["winding", "node", "sRated", "vRated", "rSc", "xSc"];

/// Ordered field-set variants of an entity kind.
pub fn field_sets(kind: EntityKind) -> FieldSetSpec {
    match kind {
        EntityKind::Node => FieldSetSpec::builder(kind, &["uuid", "id", "vTarget", "slack", "subnet"])
            .alternative(&["voltLvl", "vRated"])
            .alternative(&["vRated"])
            .optional(OPERATES_FROM)
            .optional(OPERATES_UNTIL)
            .optional(GEO_POSITION)
            .build(),
        EntityKind::Line => FieldSetSpec::builder(
            kind,
            &["uuid", "id", "nodeA", "nodeB", "r", "x", "b", "g", "iMax", "vRated", "length"],
        )
        .optional(OPERATES_FROM)
        .optional(OPERATES_UNTIL)
        .optional(PARALLEL_DEVICES)
        .optional(GEO_POSITION)
        .optional(&["olmCharacteristic"])
        .build(),
        EntityKind::Switch => FieldSetSpec::builder(kind, &["uuid", "id", "nodeA", "nodeB"])
            .optional(OPERATES_FROM)
            .optional(OPERATES_UNTIL)
            .optional(&["closed"])
            .build(),
        EntityKind::Transformer2W | EntityKind::Transformer3W => {
            let complete: Vec<&'static str> = COMPLETE_PORTS.iter().chain(TAP_FIELDS).copied().collect();
            let winding_with_tap: Vec<&'static str> =
                WINDING_PORT.iter().chain(TAP_FIELDS).copied().collect();
            FieldSetSpec::builder(kind, TRANSFORMER_BASE)
                .alternative(&complete)
                .alternative(&winding_with_tap)
                .alternative(WINDING_PORT)
                .optional(OPERATES_FROM)
                .optional(OPERATES_UNTIL)
                .optional(PARALLEL_DEVICES)
                .build()
        }
        EntityKind::NodeGraphic => {
            FieldSetSpec::builder(kind, &["uuid", "graphicLayer", "path", "node"])
                .optional(&["point"])
                .build()
        }
        EntityKind::LineGraphic => {
            FieldSetSpec::builder(kind, &["uuid", "graphicLayer", "path", "line"]).build()
        }
    }
}

/// Converts raw records of one kind into typed values.
pub trait EntityFactory {
    type Entity;

    /// Variants this factory accepts, most specific first.
    fn field_sets(&self) -> &FieldSetSpec;

    /// Build from the fields of an already selected variant.
    fn build_from(&self, fields: &FieldValues<'_>) -> IngestResult<Self::Entity>;

    /// Select a variant and build. Failures stay with this record.
    fn build(&self, record: &RawRecord) -> IngestResult<Self::Entity> {
        let fields = self.field_sets().select(record)?;
        self.build_from(&fields)
    }
}

fn operation_time(fields: &FieldValues<'_>) -> IngestResult<OperationTime> {
    let start = fields.opt_timestamp("operatesFrom")?;
    let end = fields.opt_timestamp("operatesUntil")?;
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(IngestError::coercion(
                "operatesUntil",
                CoercionCause::Constraint(format!("{end} lies before operatesFrom {start}")),
            ));
        }
    }
    Ok(OperationTime { start, end })
}

fn parallel_devices(fields: &FieldValues<'_>) -> IngestResult<u32> {
    match fields.opt_u32("parallelDevices")? {
        Some(0) => Err(IngestError::coercion(
            "parallelDevices",
            CoercionCause::Constraint("at least one device is required".into()),
        )),
        Some(count) => Ok(count),
        None => Ok(1),
    }
}

fn resolve_node(
    fields: &FieldValues<'_>,
    field: &str,
    nodes: &NodeResolver,
) -> IngestResult<Arc<NodeInput>> {
    let id = fields.uuid(field)?;
    nodes.resolve(&id)
}

/// Reject edges that attach to the same node more than once.
pub fn ensure_distinct_nodes(uuid: Uuid, nodes: &[&Arc<NodeInput>]) -> IngestResult<()> {
    for (i, first) in nodes.iter().enumerate() {
        for second in &nodes[i + 1..] {
            if Arc::ptr_eq(first, second) || first.uuid == second.uuid {
                return Err(IngestError::InvalidConnection {
                    uuid,
                    reason: format!("node {} is connected more than once", first.uuid),
                });
            }
        }
    }
    Ok(())
}

/// Builds [`NodeInput`]s.
#[derive(Debug, Clone)]
pub struct NodeFactory {
    spec: FieldSetSpec,
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self {
            spec: field_sets(EntityKind::Node),
        }
    }
}

impl NodeFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntityFactory for NodeFactory {
    type Entity = NodeInput;

    fn field_sets(&self) -> &FieldSetSpec {
        &self.spec
    }

    fn build_from(&self, fields: &FieldValues<'_>) -> IngestResult<NodeInput> {
        let v_rated = fields.quantity::<Kilovolts>("vRated")?;
        let volt_lvl = if fields.has("voltLvl") {
            let code = fields.string("voltLvl")?;
            let level = VoltageLevel::from_code(&code).ok_or_else(|| {
                IngestError::coercion(
                    "voltLvl",
                    CoercionCause::Enum {
                        value: code.clone(),
                        expected: "lv, mv, hv, ehv (or ns, ms, hs, hös)".into(),
                    },
                )
            })?;
            if !level.covers(v_rated) {
                let (low, high) = level.band();
                return Err(IngestError::coercion(
                    "vRated",
                    CoercionCause::Constraint(format!(
                        "{v_rated} is outside the {} band [{low}, {high})",
                        level.code()
                    )),
                ));
            }
            level
        } else {
            VoltageLevel::infer(v_rated).ok_or_else(|| {
                IngestError::coercion(
                    "vRated",
                    CoercionCause::Constraint(format!("no voltage level covers {v_rated}")),
                )
            })?
        };

        Ok(NodeInput {
            uuid: fields.uuid("uuid")?,
            id: fields.string("id")?,
            operation_time: operation_time(fields)?,
            v_target: fields.quantity::<PerUnit>("vTarget")?,
            slack: fields.bool("slack")?,
            geo_position: fields.opt_geo_point("geoPosition")?,
            volt_lvl,
            v_rated,
            subnet: fields.i32("subnet")?,
        })
    }
}

/// Builds [`LineInput`]s against the nodes of the current run.
#[derive(Debug)]
pub struct LineFactory<'r> {
    spec: FieldSetSpec,
    nodes: &'r NodeResolver,
}

impl<'r> LineFactory<'r> {
    pub fn new(nodes: &'r NodeResolver) -> Self {
        Self {
            spec: field_sets(EntityKind::Line),
            nodes,
        }
    }
}

impl EntityFactory for LineFactory<'_> {
    type Entity = LineInput;

    fn field_sets(&self) -> &FieldSetSpec {
        &self.spec
    }

    fn build_from(&self, fields: &FieldValues<'_>) -> IngestResult<LineInput> {
        let uuid = fields.uuid("uuid")?;
        let node_a = resolve_node(fields, "nodeA", self.nodes)?;
        let node_b = resolve_node(fields, "nodeB", self.nodes)?;
        ensure_distinct_nodes(uuid, &[&node_a, &node_b])?;

        Ok(LineInput {
            uuid,
            id: fields.string("id")?,
            operation_time: operation_time(fields)?,
            node_a,
            node_b,
            parallel_devices: parallel_devices(fields)?,
            r: fields.quantity::<OhmsPerKilometer>("r")?,
            x: fields.quantity::<OhmsPerKilometer>("x")?,
            b: fields.quantity::<MicrosiemensPerKilometer>("b")?,
            g: fields.quantity::<MicrosiemensPerKilometer>("g")?,
            i_max: fields.quantity::<Amperes>("iMax")?,
            v_rated: fields.quantity::<Kilovolts>("vRated")?,
            length: fields.quantity::<Kilometers>("length")?,
            geo_position: fields.opt_geo_path("geoPosition")?,
            olm_characteristic: fields
                .opt_string("olmCharacteristic")?
                .unwrap_or_else(|| LineInput::DEFAULT_OLM_CHARACTERISTIC.to_string()),
        })
    }
}

/// Builds [`SwitchInput`]s against the nodes of the current run.
#[derive(Debug)]
pub struct SwitchFactory<'r> {
    spec: FieldSetSpec,
    nodes: &'r NodeResolver,
}

impl<'r> SwitchFactory<'r> {
    pub fn new(nodes: &'r NodeResolver) -> Self {
        Self {
            spec: field_sets(EntityKind::Switch),
            nodes,
        }
    }
}

impl EntityFactory for SwitchFactory<'_> {
    type Entity = SwitchInput;

    fn field_sets(&self) -> &FieldSetSpec {
        &self.spec
    }

    fn build_from(&self, fields: &FieldValues<'_>) -> IngestResult<SwitchInput> {
        let uuid = fields.uuid("uuid")?;
        let node_a = resolve_node(fields, "nodeA", self.nodes)?;
        let node_b = resolve_node(fields, "nodeB", self.nodes)?;
        ensure_distinct_nodes(uuid, &[&node_a, &node_b])?;

        Ok(SwitchInput {
            uuid,
            id: fields.string("id")?,
            operation_time: operation_time(fields)?,
            node_a,
            node_b,
            closed: fields.opt_bool("closed")?.unwrap_or(true),
        })
    }
}

/// Builds unresolved transformer fragments; node references stay ids until
/// the joiner materializes a complete group.
#[derive(Debug, Clone)]
pub struct TransformerFragmentFactory {
    spec: FieldSetSpec,
}

impl TransformerFragmentFactory {
    /// `kind` is [`EntityKind::Transformer2W`] or [`EntityKind::Transformer3W`].
    pub fn new(kind: EntityKind) -> Self {
        Self {
            spec: field_sets(kind),
        }
    }

    fn tap(fields: &FieldValues<'_>) -> IngestResult<Option<TapChanger>> {
        if !fields.has("tapPos") {
            return Ok(None);
        }
        let tap = TapChanger {
            g_m: fields.quantity::<Nanosiemens>("gM")?,
            b_m: fields.quantity::<Nanosiemens>("bM")?,
            d_v: fields.quantity::<Percent>("dV")?,
            d_phi: fields.quantity::<Degrees>("dPhi")?,
            tap_neutr: fields.i32("tapNeutr")?,
            tap_min: fields.i32("tapMin")?,
            tap_max: fields.i32("tapMax")?,
            tap_pos: fields.i32("tapPos")?,
            auto_tap: fields.bool("autoTap")?,
        };
        let range = tap.tap_min..=tap.tap_max;
        for (field, value) in [("tapNeutr", tap.tap_neutr), ("tapPos", tap.tap_pos)] {
            if !range.contains(&value) {
                return Err(IngestError::coercion(
                    field,
                    CoercionCause::Constraint(format!(
                        "{value} is outside the tap range [{}, {}]",
                        tap.tap_min, tap.tap_max
                    )),
                ));
            }
        }
        Ok(Some(tap))
    }

    fn port(fields: &FieldValues<'_>, windings: u8) -> IngestResult<FragmentPort> {
        if fields.has("winding") {
            let raw = fields.string("winding")?;
            let position = raw.parse::<WindingPosition>().map_err(|_| {
                IngestError::coercion(
                    "winding",
                    CoercionCause::Enum {
                        value: raw.clone(),
                        expected: "A, B, C (or 1, 2, 3)".into(),
                    },
                )
            })?;
            if position.index() >= usize::from(windings) {
                return Err(IngestError::coercion(
                    "winding",
                    CoercionCause::Constraint(format!(
                        "winding {position} does not exist on a {windings}-winding transformer"
                    )),
                ));
            }
            Ok(FragmentPort::Winding {
                position,
                node: fields.uuid("node")?,
                rating: WindingRating {
                    s_rated: fields.quantity::<KilovoltAmperes>("sRated")?,
                    v_rated: fields.quantity::<Kilovolts>("vRated")?,
                    r_sc: fields.quantity::<Ohms>("rSc")?,
                    x_sc: fields.quantity::<Ohms>("xSc")?,
                },
            })
        } else {
            if windings != 2 {
                return Err(IngestError::coercion(
                    "windings",
                    CoercionCause::Constraint(
                        "only two-winding transformers can be given as one record".into(),
                    ),
                ));
            }
            Ok(FragmentPort::Complete {
                node_a: fields.uuid("nodeA")?,
                node_b: fields.uuid("nodeB")?,
                s_rated: fields.quantity::<KilovoltAmperes>("sRated")?,
                v_rated_a: fields.quantity::<Kilovolts>("vRatedA")?,
                v_rated_b: fields.quantity::<Kilovolts>("vRatedB")?,
                r_sc: fields.quantity::<Ohms>("rSc")?,
                x_sc: fields.quantity::<Ohms>("xSc")?,
            })
        }
    }
}

impl EntityFactory for TransformerFragmentFactory {
    type Entity = TransformerFragment;

    fn field_sets(&self) -> &FieldSetSpec {
        &self.spec
    }

    fn build_from(&self, fields: &FieldValues<'_>) -> IngestResult<TransformerFragment> {
        let raw = fields.string("windings")?;
        let windings = match raw.parse::<u8>() {
            Ok(count @ (2 | 3)) => count,
            _ => {
                return Err(IngestError::coercion(
                    "windings",
                    CoercionCause::Enum {
                        value: raw,
                        expected: "2, 3".into(),
                    },
                ))
            }
        };
        let fragment = TransformerFragment {
            uuid: fields.uuid("uuid")?,
            id: fields.string("id")?,
            windings,
            operation_time: operation_time(fields)?,
            parallel_devices: parallel_devices(fields)?,
            port: Self::port(fields, windings)?,
            tap: Self::tap(fields)?,
        };
        debug!(uuid = %fragment.uuid, key = %fragment.key(), "built transformer fragment");
        Ok(fragment)
    }
}

/// Builds [`NodeGraphicInput`]s against the nodes of the current run.
#[derive(Debug)]
pub struct NodeGraphicFactory<'r> {
    spec: FieldSetSpec,
    nodes: &'r NodeResolver,
}

impl<'r> NodeGraphicFactory<'r> {
    pub fn new(nodes: &'r NodeResolver) -> Self {
        Self {
            spec: field_sets(EntityKind::NodeGraphic),
            nodes,
        }
    }
}

impl EntityFactory for NodeGraphicFactory<'_> {
    type Entity = NodeGraphicInput;

    fn field_sets(&self) -> &FieldSetSpec {
        &self.spec
    }

    fn build_from(&self, fields: &FieldValues<'_>) -> IngestResult<NodeGraphicInput> {
        Ok(NodeGraphicInput {
            uuid: fields.uuid("uuid")?,
            graphic_layer: fields.string("graphicLayer")?,
            path: fields.opt_geo_path("path")?,
            node: resolve_node(fields, "node", self.nodes)?,
            point: fields.opt_geo_point("point")?,
        })
    }
}

/// Builds [`LineGraphicInput`]s against the lines of the current run.
#[derive(Debug)]
pub struct LineGraphicFactory<'r> {
    spec: FieldSetSpec,
    lines: &'r ReferenceResolver<LineInput>,
}

impl<'r> LineGraphicFactory<'r> {
    pub fn new(lines: &'r ReferenceResolver<LineInput>) -> Self {
        Self {
            spec: field_sets(EntityKind::LineGraphic),
            lines,
        }
    }
}

impl EntityFactory for LineGraphicFactory<'_> {
    type Entity = LineGraphicInput;

    fn field_sets(&self) -> &FieldSetSpec {
        &self.spec
    }

    fn build_from(&self, fields: &FieldValues<'_>) -> IngestResult<LineGraphicInput> {
        let line = fields.uuid("line")?;
        Ok(LineGraphicInput {
            uuid: fields.uuid("uuid")?,
            graphic_layer: fields.string("graphicLayer")?,
            path: fields.opt_geo_path("path")?,
            line: self.lines.resolve(&line)?,
        })
    }
}
