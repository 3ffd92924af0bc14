//! Orchestrates one assembly run over a [`RawRecordSource`].
//!
//! Nodes are built first and registered in the run's resolver; edge kinds
//! (lines, switches, transformers) only read that resolver and are independent
//! of each other; graphics come last. Every kind is fetched and built at most
//! once per assembler, on first access, and a failure of one kind never keeps
//! the others from being built.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregate::{apply, partition_results, scan_for_exceptions};
use crate::config::{AggregationPolicy, AssemblyConfig};
use crate::diagnostics::Diagnostics;
use crate::error::{AggregateError, IngestError, IngestResult, KindFailure, SourceError};
use crate::factory::{
    EntityFactory, LineFactory, LineGraphicFactory, NodeFactory, NodeGraphicFactory,
    SwitchFactory, TransformerFragmentFactory,
};
use crate::joiner::{Joinable, MultiPartJoiner};
use crate::record::RawRecord;
use crate::resolver::{NodeResolver, ReferenceResolver};
use crate::source::RawRecordSource;
use crate::topology::GridTopology;
use crate::{
    EntityKind, LineGraphicInput, LineInput, NodeGraphicInput, NodeInput, SwitchInput,
    Transformer2WInput, Transformer3WInput, UniqueEntity,
};

/// Built entities of one kind plus what went wrong, if anything.
///
/// Under [`AggregationPolicy::AllOrNothing`] a failure leaves `entities`
/// empty; under [`AggregationPolicy::Partial`] the successful records are
/// kept next to the failure.
#[derive(Debug)]
pub struct KindOutcome<T> {
    pub entities: Vec<Arc<T>>,
    pub failure: Option<KindFailure>,
}

impl<T> KindOutcome<T> {
    fn failed(failure: KindFailure) -> Self {
        Self {
            entities: Vec::new(),
            failure: Some(failure),
        }
    }

    fn empty() -> Self {
        Self {
            entities: Vec::new(),
            failure: None,
        }
    }

    /// The entities, or the failure when any record (or the fetch) failed.
    pub fn as_result(&self) -> Result<&[Arc<T>], &KindFailure> {
        match &self.failure {
            Some(failure) => Err(failure),
            None => Ok(&self.entities),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[derive(Debug)]
struct NodePhase {
    outcome: KindOutcome<NodeInput>,
    resolver: NodeResolver,
}

#[derive(Debug)]
struct LinePhase {
    outcome: KindOutcome<LineInput>,
    resolver: ReferenceResolver<LineInput>,
}

/// How a kind came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KindStatus {
    Complete,
    /// Some records failed, the rest was kept.
    Partial,
    Failed,
    /// Not part of the configured kinds.
    Skipped,
}

impl std::fmt::Display for KindStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            KindStatus::Complete => "complete",
            KindStatus::Partial => "partial",
            KindStatus::Failed => "failed",
            KindStatus::Skipped => "skipped",
        })
    }
}

/// Per-kind line of an [`AssemblyReport`].
#[derive(Debug, Clone, Serialize)]
pub struct KindReport {
    pub kind: EntityKind,
    pub status: KindStatus,
    pub built: usize,
    /// Failed records; `None` when the fetch failed as a whole.
    pub failed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KindReport {
    fn new<T>(kind: EntityKind, included: bool, outcome: &KindOutcome<T>) -> Self {
        let status = match (&outcome.failure, included) {
            (_, false) => KindStatus::Skipped,
            (None, true) => KindStatus::Complete,
            (Some(_), true) if outcome.entities.is_empty() => KindStatus::Failed,
            (Some(_), true) => KindStatus::Partial,
        };
        Self {
            kind,
            status,
            built: outcome.entities.len(),
            failed: match &outcome.failure {
                Some(failure) => failure.failed_records(),
                None => Some(0),
            },
            error: outcome.failure.as_ref().map(ToString::to_string),
        }
    }
}

/// Per-kind counts and failure texts of one run, plus topology diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct AssemblyReport {
    pub kinds: Vec<KindReport>,
    pub diagnostics: Diagnostics,
}

impl AssemblyReport {
    /// Whether every configured kind came through without failures.
    pub fn is_complete(&self) -> bool {
        self.kinds
            .iter()
            .all(|kind| matches!(kind.status, KindStatus::Complete | KindStatus::Skipped))
    }

    pub fn kind(&self, kind: EntityKind) -> Option<&KindReport> {
        self.kinds.iter().find(|report| report.kind == kind)
    }

    pub fn failed_kinds(&self) -> impl Iterator<Item = &KindReport> {
        self.kinds
            .iter()
            .filter(|kind| matches!(kind.status, KindStatus::Failed | KindStatus::Partial))
    }
}

/// Topology plus report of one run.
#[derive(Debug, Clone)]
pub struct GridAssembly {
    pub topology: GridTopology,
    pub report: AssemblyReport,
}

/// Fetch and conversion result of one kind, before folding.
type Converted<T> = Result<Option<Vec<IngestResult<T>>>, SourceError>;

/// Lazily builds and caches every kind of one source.
///
/// Uuids are unique across the whole run: the first kind to fold keeps a
/// uuid and later records carrying it fail with [`IngestError::DuplicateId`].
/// [`GridAssembler::assemble`] folds kinds in [`EntityKind::ALL`] order, also
/// when the edge kinds are converted concurrently.
pub struct GridAssembler<S> {
    source: S,
    config: AssemblyConfig,
    claims: Mutex<HashMap<Uuid, EntityKind>>,
    nodes: OnceCell<NodePhase>,
    lines: OnceCell<LinePhase>,
    switches: OnceCell<KindOutcome<SwitchInput>>,
    transformers_2w: OnceCell<KindOutcome<Transformer2WInput>>,
    transformers_3w: OnceCell<KindOutcome<Transformer3WInput>>,
    node_graphics: OnceCell<KindOutcome<NodeGraphicInput>>,
    line_graphics: OnceCell<KindOutcome<LineGraphicInput>>,
}

impl<S: RawRecordSource> GridAssembler<S> {
    pub fn new(source: S, config: AssemblyConfig) -> Self {
        Self {
            source,
            config,
            claims: Mutex::new(HashMap::new()),
            nodes: OnceCell::new(),
            lines: OnceCell::new(),
            switches: OnceCell::new(),
            transformers_2w: OnceCell::new(),
            transformers_3w: OnceCell::new(),
            node_graphics: OnceCell::new(),
            line_graphics: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn fetch(&self, kind: EntityKind) -> Result<Option<Vec<RawRecord>>, SourceError> {
        if !self.config.includes(kind) {
            debug!(%kind, "kind not configured, skipping");
            return Ok(None);
        }
        let records = self.source.fetch(kind).map_err(|err| {
            warn!(%kind, error = %err, "fetching kind failed");
            err
        })?;
        debug!(%kind, records = records.len(), "fetched raw records");
        Ok(Some(records))
    }

    fn build_records<F>(&self, factory: &F, records: &[RawRecord]) -> Vec<IngestResult<F::Entity>>
    where
        F: EntityFactory + Sync,
        F::Entity: Send,
    {
        if self.config.parallel {
            records
                .par_iter()
                .map(|record| apply(|| factory.build(record)))
                .collect()
        } else {
            records
                .iter()
                .map(|record| apply(|| factory.build(record)))
                .collect()
        }
    }

    fn convert<F>(&self, kind: EntityKind, factory: &F) -> Converted<F::Entity>
    where
        F: EntityFactory + Sync,
        F::Entity: Send,
    {
        Ok(self
            .fetch(kind)?
            .map(|records| self.build_records(factory, &records)))
    }

    fn convert_transformers<J: Joinable>(&self, kind: EntityKind) -> Converted<J> {
        let Some(records) = self.fetch(kind)? else {
            return Ok(None);
        };
        let fragments = self.build_records(&TransformerFragmentFactory::new(kind), &records);
        Ok(Some(
            MultiPartJoiner::<J>::new(self.node_resolver()).join_all(fragments),
        ))
    }

    fn finish<T: UniqueEntity>(&self, converted: Converted<T>) -> KindOutcome<T> {
        match converted {
            Ok(Some(results)) => self.fold(results),
            Ok(None) => KindOutcome::empty(),
            Err(err) => KindOutcome::failed(err.into()),
        }
    }

    fn fold<T: UniqueEntity>(&self, results: Vec<IngestResult<T>>) -> KindOutcome<T> {
        let kind = T::KIND;
        // Held until the kept uuids are claimed so concurrent folds see each other.
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        let results = reject_duplicates(results, &claims);
        let total = results.len();
        let outcome = match self.config.policy {
            AggregationPolicy::AllOrNothing => match scan_for_exceptions(results) {
                Ok(values) => KindOutcome {
                    entities: values.into_iter().map(Arc::new).collect(),
                    failure: None,
                },
                Err(err) => KindOutcome::failed(err.into()),
            },
            AggregationPolicy::Partial => {
                let (values, errors) = partition_results(results);
                let failed = errors.len();
                KindOutcome {
                    entities: values.into_iter().map(Arc::new).collect(),
                    failure: errors.into_iter().next().map(|first| {
                        KindFailure::Records(AggregateError {
                            label: kind.entity_name().to_string(),
                            failed,
                            total,
                            first: Box::new(first),
                        })
                    }),
                }
            }
        };
        for entity in &outcome.entities {
            claims.insert(entity.uuid(), kind);
        }
        drop(claims);

        match &outcome.failure {
            None => info!(%kind, built = outcome.len(), "assembled kind"),
            Some(failure) => warn!(
                %kind,
                built = outcome.len(),
                failed = failure.failed_records().unwrap_or(0),
                total,
                "kind has failures: {failure}"
            ),
        }
        outcome
    }

    fn node_phase(&self) -> &NodePhase {
        self.nodes.get_or_init(|| {
            let outcome = self.finish(self.convert(EntityKind::Node, &NodeFactory::new()));
            let mut resolver = NodeResolver::with_capacity(outcome.len());
            for node in &outcome.entities {
                // Duplicates were rejected while folding.
                if let Err(err) = resolver.register(node.uuid, Arc::clone(node)) {
                    warn!(error = %err, "node not registered");
                }
            }
            NodePhase { outcome, resolver }
        })
    }

    fn convert_lines(&self) -> Converted<LineInput> {
        self.convert(EntityKind::Line, &LineFactory::new(self.node_resolver()))
    }

    fn line_phase_from(&self, converted: Converted<LineInput>) -> LinePhase {
        let outcome = self.finish(converted);
        let mut resolver = ReferenceResolver::with_capacity(outcome.len());
        for line in &outcome.entities {
            if let Err(err) = resolver.register(line.uuid, Arc::clone(line)) {
                warn!(error = %err, "line not registered");
            }
        }
        LinePhase { outcome, resolver }
    }

    fn line_phase(&self) -> &LinePhase {
        self.lines
            .get_or_init(|| self.line_phase_from(self.convert_lines()))
    }

    fn convert_switches(&self) -> Converted<SwitchInput> {
        self.convert(
            EntityKind::Switch,
            &SwitchFactory::new(self.node_resolver()),
        )
    }

    /// Resolver over the nodes of this run (builds the node phase if needed).
    pub fn node_resolver(&self) -> &NodeResolver {
        &self.node_phase().resolver
    }

    pub fn nodes(&self) -> &KindOutcome<NodeInput> {
        &self.node_phase().outcome
    }

    pub fn lines(&self) -> &KindOutcome<LineInput> {
        &self.line_phase().outcome
    }

    pub fn switches(&self) -> &KindOutcome<SwitchInput> {
        self.switches
            .get_or_init(|| self.finish(self.convert_switches()))
    }

    pub fn transformers_2w(&self) -> &KindOutcome<Transformer2WInput> {
        self.transformers_2w.get_or_init(|| {
            self.finish(self.convert_transformers(EntityKind::Transformer2W))
        })
    }

    pub fn transformers_3w(&self) -> &KindOutcome<Transformer3WInput> {
        self.transformers_3w.get_or_init(|| {
            self.finish(self.convert_transformers(EntityKind::Transformer3W))
        })
    }

    pub fn node_graphics(&self) -> &KindOutcome<NodeGraphicInput> {
        self.node_graphics.get_or_init(|| {
            self.finish(self.convert(
                EntityKind::NodeGraphic,
                &NodeGraphicFactory::new(self.node_resolver()),
            ))
        })
    }

    pub fn line_graphics(&self) -> &KindOutcome<LineGraphicInput> {
        self.line_graphics.get_or_init(|| {
            let lines = &self.line_phase().resolver;
            self.finish(self.convert(EntityKind::LineGraphic, &LineGraphicFactory::new(lines)))
        })
    }

    /// Convert the edge kinds not built yet concurrently, then fold them in order.
    fn build_edges_concurrently(&self) {
        let ((lines, switches), (transformers_2w, transformers_3w)) = rayon::join(
            || {
                rayon::join(
                    || self.lines.get().is_none().then(|| self.convert_lines()),
                    || self.switches.get().is_none().then(|| self.convert_switches()),
                )
            },
            || {
                rayon::join(
                    || {
                        self.transformers_2w.get().is_none().then(|| {
                            self.convert_transformers::<Transformer2WInput>(
                                EntityKind::Transformer2W,
                            )
                        })
                    },
                    || {
                        self.transformers_3w.get().is_none().then(|| {
                            self.convert_transformers::<Transformer3WInput>(
                                EntityKind::Transformer3W,
                            )
                        })
                    },
                )
            },
        );
        if let Some(converted) = lines {
            self.lines.get_or_init(|| self.line_phase_from(converted));
        }
        if let Some(converted) = switches {
            self.switches.get_or_init(|| self.finish(converted));
        }
        if let Some(converted) = transformers_2w {
            self.transformers_2w.get_or_init(|| self.finish(converted));
        }
        if let Some(converted) = transformers_3w {
            self.transformers_3w.get_or_init(|| self.finish(converted));
        }
    }

    /// Build every kind and gather the results.
    pub fn assemble(&self) -> GridAssembly {
        self.node_phase();
        if self.config.parallel {
            self.build_edges_concurrently();
        }

        let topology = GridTopology {
            nodes: self.nodes().entities.clone(),
            lines: self.lines().entities.clone(),
            switches: self.switches().entities.clone(),
            transformers_2w: self.transformers_2w().entities.clone(),
            transformers_3w: self.transformers_3w().entities.clone(),
            node_graphics: self.node_graphics().entities.clone(),
            line_graphics: self.line_graphics().entities.clone(),
        };

        let included = |kind| self.config.includes(kind);
        let kinds = vec![
            KindReport::new(EntityKind::Node, included(EntityKind::Node), self.nodes()),
            KindReport::new(EntityKind::Line, included(EntityKind::Line), self.lines()),
            KindReport::new(EntityKind::Switch, included(EntityKind::Switch), self.switches()),
            KindReport::new(
                EntityKind::Transformer2W,
                included(EntityKind::Transformer2W),
                self.transformers_2w(),
            ),
            KindReport::new(
                EntityKind::Transformer3W,
                included(EntityKind::Transformer3W),
                self.transformers_3w(),
            ),
            KindReport::new(
                EntityKind::NodeGraphic,
                included(EntityKind::NodeGraphic),
                self.node_graphics(),
            ),
            KindReport::new(
                EntityKind::LineGraphic,
                included(EntityKind::LineGraphic),
                self.line_graphics(),
            ),
        ];

        let mut diagnostics = Diagnostics::new();
        if self.config.validate_topology {
            topology.validate_into(&mut diagnostics);
        }
        info!(
            nodes = topology.nodes.len(),
            connectors = topology.connector_count(),
            issues = diagnostics.issues.len(),
            "assembly finished"
        );

        GridAssembly {
            topology,
            report: AssemblyReport { kinds, diagnostics },
        }
    }
}

/// Fail every entity whose uuid was already produced by this kind or is
/// claimed by a kind folded earlier in the run.
fn reject_duplicates<T: UniqueEntity>(
    results: Vec<IngestResult<T>>,
    claims: &HashMap<Uuid, EntityKind>,
) -> Vec<IngestResult<T>> {
    let mut seen = HashSet::with_capacity(results.len());
    results
        .into_iter()
        .map(|result| match result {
            Ok(entity) => {
                let uuid = entity.uuid();
                if let Some(owner) = claims.get(&uuid) {
                    debug!(kind = %T::KIND, %uuid, %owner, "uuid already taken by another kind");
                    Err(IngestError::DuplicateId {
                        id: uuid.to_string(),
                    })
                } else if !seen.insert(uuid) {
                    Err(IngestError::DuplicateId {
                        id: uuid.to_string(),
                    })
                } else {
                    Ok(entity)
                }
            }
            Err(err) => Err(err),
        })
        .collect()
}
