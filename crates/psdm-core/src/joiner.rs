//! Joining of entities that arrive split over several records.
//!
//! Transformers may be delivered as one record per winding. Fragments are
//! buffered by their [`MultiPartKey`] in arrival order; once a group holds
//! exactly the expected number of fragments, its node references are resolved
//! and one merged entity is emitted. Groups still short at stream end become
//! [`IngestError::IncompleteGroup`] failures without affecting other groups.
//!
//! A complete two-winding record is a group of its own (expected count 1).

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::error::{IngestError, IngestResult};
use crate::factory::ensure_distinct_nodes;
use crate::resolver::NodeResolver;
use crate::units::{KilovoltAmperes, Kilovolts, Ohms};
use crate::{
    NodeInput, OperationTime, TapChanger, Transformer2WInput, Transformer3WInput, UniqueEntity,
    WindingRating,
};

/// Port of a transformer winding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WindingPosition {
    A,
    B,
    C,
}

impl WindingPosition {
    pub const ALL: [WindingPosition; 3] = [WindingPosition::A, WindingPosition::B, WindingPosition::C];

    /// Zero-based port index.
    pub fn index(&self) -> usize {
        match self {
            WindingPosition::A => 0,
            WindingPosition::B => 1,
            WindingPosition::C => 2,
        }
    }
}

impl fmt::Display for WindingPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindingPosition::A => f.write_str("A"),
            WindingPosition::B => f.write_str("B"),
            WindingPosition::C => f.write_str("C"),
        }
    }
}

impl FromStr for WindingPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" | "1" => Ok(WindingPosition::A),
            "B" | "2" => Ok(WindingPosition::B),
            "C" | "3" => Ok(WindingPosition::C),
            other => Err(format!("unknown winding position '{other}'")),
        }
    }
}

/// Shared identity of a group plus the number of fragments it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MultiPartKey {
    pub key: Uuid,
    pub expected: usize,
}

impl fmt::Display for MultiPartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (1/{})", self.key, self.expected)
    }
}

/// What a single transformer record contributes.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentPort {
    /// A whole two-winding transformer in one record.
    Complete {
        node_a: Uuid,
        node_b: Uuid,
        s_rated: KilovoltAmperes,
        v_rated_a: Kilovolts,
        v_rated_b: Kilovolts,
        r_sc: Ohms,
        x_sc: Ohms,
    },
    /// One winding of a split transformer.
    Winding {
        position: WindingPosition,
        node: Uuid,
        rating: WindingRating,
    },
}

/// Typed but unresolved transformer record.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformerFragment {
    pub uuid: Uuid,
    pub id: String,
    /// Discriminator: 2 or 3
    pub windings: u8,
    pub operation_time: OperationTime,
    pub parallel_devices: u32,
    pub port: FragmentPort,
    pub tap: Option<TapChanger>,
}

impl TransformerFragment {
    pub fn key(&self) -> MultiPartKey {
        let expected = match self.port {
            FragmentPort::Complete { .. } => 1,
            FragmentPort::Winding { .. } => usize::from(self.windings),
        };
        MultiPartKey {
            key: self.uuid,
            expected,
        }
    }

    pub fn position(&self) -> Option<WindingPosition> {
        match self.port {
            FragmentPort::Winding { position, .. } => Some(position),
            FragmentPort::Complete { .. } => None,
        }
    }

    fn winding(&self) -> Option<(Uuid, WindingRating)> {
        match self.port {
            FragmentPort::Winding { node, rating, .. } => Some((node, rating)),
            FragmentPort::Complete { .. } => None,
        }
    }
}

/// Entities that can be merged from a complete fragment group.
pub trait Joinable: UniqueEntity + Sized {
    /// Value of the `windings` discriminator this entity is built from.
    const WINDINGS: u8;

    /// Merge a complete group. Fragments are sorted by winding position.
    fn join(
        key: Uuid,
        fragments: Vec<TransformerFragment>,
        nodes: &NodeResolver,
    ) -> IngestResult<Self>;
}

fn inconsistent(key: Uuid, reason: impl Into<String>) -> IngestError {
    IngestError::InconsistentGroup {
        key,
        reason: reason.into(),
    }
}

/// Tap data of a group: at least one fragment carries it and all carriers agree.
fn shared_tap(key: Uuid, fragments: &[TransformerFragment]) -> IngestResult<TapChanger> {
    let mut taps = fragments.iter().filter_map(|fragment| fragment.tap);
    let first = taps
        .next()
        .ok_or_else(|| inconsistent(key, "no fragment carries tap changer data"))?;
    if taps.any(|tap| tap != first) {
        return Err(inconsistent(key, "fragments disagree on tap changer data"));
    }
    Ok(first)
}

/// Asset data every fragment repeats (id, operation time, parallel devices).
fn shared_asset(
    key: Uuid,
    fragments: &[TransformerFragment],
) -> IngestResult<(String, OperationTime, u32)> {
    let (head, rest) = fragments
        .split_first()
        .ok_or_else(|| inconsistent(key, "empty group"))?;
    for fragment in rest {
        if fragment.id != head.id {
            return Err(inconsistent(
                key,
                format!("fragments disagree on id ('{}' vs '{}')", head.id, fragment.id),
            ));
        }
        if fragment.operation_time != head.operation_time {
            return Err(inconsistent(key, "fragments disagree on operation time"));
        }
        if fragment.parallel_devices != head.parallel_devices {
            return Err(inconsistent(
                key,
                format!(
                    "fragments disagree on parallelDevices ({} vs {})",
                    head.parallel_devices, fragment.parallel_devices
                ),
            ));
        }
    }
    Ok((head.id.clone(), head.operation_time, head.parallel_devices))
}

/// Node uuid and rating of every fragment, in position order.
fn windings(
    key: Uuid,
    fragments: &[TransformerFragment],
) -> IngestResult<Vec<(Uuid, WindingRating)>> {
    fragments
        .iter()
        .enumerate()
        .map(|(index, fragment)| match (fragment.position(), fragment.winding()) {
            (Some(position), Some(winding)) if position.index() == index => Ok(winding),
            _ => Err(inconsistent(
                key,
                format!("expected winding {}", WindingPosition::ALL[index]),
            )),
        })
        .collect()
}

fn resolve_all(nodes: &NodeResolver, ids: &[Uuid]) -> IngestResult<Vec<Arc<NodeInput>>> {
    ids.iter().map(|id| nodes.resolve(id)).collect()
}

impl Joinable for Transformer2WInput {
    const WINDINGS: u8 = 2;

    fn join(
        key: Uuid,
        fragments: Vec<TransformerFragment>,
        nodes: &NodeResolver,
    ) -> IngestResult<Self> {
        let (id, operation_time, parallel_devices) = shared_asset(key, &fragments)?;

        if let Some(&FragmentPort::Complete {
            node_a,
            node_b,
            s_rated,
            v_rated_a,
            v_rated_b,
            r_sc,
            x_sc,
        }) = fragments.first().map(|head| &head.port)
        {
            let tap = shared_tap(key, &fragments)?;
            let node_a = nodes.resolve(&node_a)?;
            let node_b = nodes.resolve(&node_b)?;
            ensure_distinct_nodes(key, &[&node_a, &node_b])?;
            return Ok(Transformer2WInput {
                uuid: key,
                id,
                operation_time,
                node_a,
                node_b,
                parallel_devices,
                s_rated,
                v_rated_a,
                v_rated_b,
                r_sc,
                x_sc,
                tap,
            });
        }

        let tap = shared_tap(key, &fragments)?;
        let parts = windings(key, &fragments)?;
        let [(id_a, a), (id_b, b)] = parts[..] else {
            return Err(inconsistent(key, "two windings required"));
        };
        if a.s_rated != b.s_rated {
            return Err(inconsistent(
                key,
                format!("windings disagree on sRated ({} vs {})", a.s_rated, b.s_rated),
            ));
        }
        let resolved = resolve_all(nodes, &[id_a, id_b])?;
        ensure_distinct_nodes(key, &[&resolved[0], &resolved[1]])?;
        let mut resolved = resolved.into_iter();
        let (Some(node_a), Some(node_b)) = (resolved.next(), resolved.next()) else {
            return Err(inconsistent(key, "two windings required"));
        };

        Ok(Transformer2WInput {
            uuid: key,
            id,
            operation_time,
            node_a,
            node_b,
            parallel_devices,
            s_rated: a.s_rated,
            v_rated_a: a.v_rated,
            v_rated_b: b.v_rated,
            r_sc: a.r_sc + b.r_sc,
            x_sc: a.x_sc + b.x_sc,
            tap,
        })
    }
}

impl Joinable for Transformer3WInput {
    const WINDINGS: u8 = 3;

    fn join(
        key: Uuid,
        fragments: Vec<TransformerFragment>,
        nodes: &NodeResolver,
    ) -> IngestResult<Self> {
        let (id, operation_time, parallel_devices) = shared_asset(key, &fragments)?;
        let tap = shared_tap(key, &fragments)?;
        let parts = windings(key, &fragments)?;
        let [(id_a, a), (id_b, b), (id_c, c)] = parts[..] else {
            return Err(inconsistent(key, "three windings required"));
        };
        let resolved = resolve_all(nodes, &[id_a, id_b, id_c])?;
        ensure_distinct_nodes(key, &[&resolved[0], &resolved[1], &resolved[2]])?;
        let mut resolved = resolved.into_iter();
        let (Some(node_a), Some(node_b), Some(node_c)) =
            (resolved.next(), resolved.next(), resolved.next())
        else {
            return Err(inconsistent(key, "three windings required"));
        };
        Ok(Transformer3WInput {
            uuid: key,
            id,
            operation_time,
            node_a,
            node_b,
            node_c,
            parallel_devices,
            windings: [a, b, c],
            tap,
        })
    }
}

#[derive(Debug)]
struct PendingGroup {
    expected: usize,
    fragments: Vec<TransformerFragment>,
}

/// Accumulates fragments and emits merged entities of type `J`.
///
/// Single writer: pushing takes `&mut self`. The node resolver is only read.
#[derive(Debug)]
pub struct MultiPartJoiner<'r, J> {
    nodes: &'r NodeResolver,
    pending: HashMap<Uuid, PendingGroup>,
    /// First-arrival order of pending keys, for stable end-of-stream reports.
    order: Vec<Uuid>,
    completed: HashSet<Uuid>,
    _entity: std::marker::PhantomData<fn() -> J>,
}

impl<'r, J: Joinable> MultiPartJoiner<'r, J> {
    pub fn new(nodes: &'r NodeResolver) -> Self {
        Self {
            nodes,
            pending: HashMap::new(),
            order: Vec::new(),
            completed: HashSet::new(),
            _entity: std::marker::PhantomData,
        }
    }

    /// Number of groups still waiting for fragments.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Add a fragment. Returns an outcome when the fragment is rejected on its
    /// own or when it completes its group.
    pub fn push(&mut self, fragment: TransformerFragment) -> Option<IngestResult<J>> {
        let MultiPartKey { key, expected } = fragment.key();

        if fragment.windings != J::WINDINGS {
            return Some(Err(inconsistent(
                key,
                format!(
                    "{}-winding fragment in a {}-winding stream",
                    fragment.windings,
                    J::WINDINGS
                ),
            )));
        }
        if self.completed.contains(&key) {
            return Some(Err(IngestError::DuplicateId {
                id: key.to_string(),
            }));
        }

        let order = &mut self.order;
        let group = self.pending.entry(key).or_insert_with(|| {
            order.push(key);
            PendingGroup {
                expected,
                fragments: Vec::with_capacity(expected),
            }
        });
        if group.expected != expected {
            return Some(Err(inconsistent(
                key,
                format!(
                    "fragment expects {expected} part(s), group expects {}",
                    group.expected
                ),
            )));
        }
        if let Some(position) = fragment.position() {
            if group.fragments.iter().any(|f| f.position() == Some(position)) {
                return Some(Err(inconsistent(
                    key,
                    format!("winding {position} delivered twice"),
                )));
            }
        }

        group.fragments.push(fragment);
        if group.fragments.len() < group.expected {
            return None;
        }

        let mut group = self.pending.remove(&key)?;
        self.order.retain(|pending| *pending != key);
        self.completed.insert(key);
        group.fragments.sort_by_key(|f| f.position());
        debug!(%key, fragments = group.fragments.len(), "materializing group");
        Some(J::join(key, group.fragments, self.nodes))
    }

    /// End of stream: every group still short becomes an `IncompleteGroup`,
    /// in first-arrival order.
    pub fn finish(mut self) -> Vec<IngestResult<J>> {
        self.order
            .iter()
            .filter_map(|key| self.pending.remove(key).map(|group| (*key, group)))
            .map(|(key, group)| {
                Err(IngestError::IncompleteGroup {
                    key,
                    found: group.fragments.len(),
                    expected: group.expected,
                })
            })
            .collect()
    }

    /// Push every fragment outcome and finish. Fragment failures pass through
    /// in arrival order, merged entities appear when their group completes.
    pub fn join_all<I>(mut self, fragments: I) -> Vec<IngestResult<J>>
    where
        I: IntoIterator<Item = IngestResult<TransformerFragment>>,
    {
        let mut results = Vec::new();
        for fragment in fragments {
            match fragment {
                Ok(fragment) => results.extend(self.push(fragment)),
                Err(err) => results.push(Err(err)),
            }
        }
        results.extend(self.finish());
        results
    }
}
