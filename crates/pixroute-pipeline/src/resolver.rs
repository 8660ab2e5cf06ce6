//! Least-penalty pipeline resolution
//!
//! # Algorithm
//!
//! 1. A loader that directly produces a flavor compatible with a target wins
//!    outright; the cheapest such loader is used.
//! 2. Otherwise every origin flavor (the artifact's flavor, or each flavor an
//!    applicable loader produces, starting at that loader's cost) runs a
//!    Dijkstra search over the current conversion graph. The cheapest path
//!    ending at a flavor compatible with any target is selected.
//!
//! Edges with infinite penalty are treated as absent, so no selected
//! pipeline ever has an infinite total.
//!
//! # Tie-breaking
//!
//! Candidates with equal total penalty are ordered by:
//! 1. Fewer converter steps
//! 2. Earlier converter registration, compared step by step
//! 3. Earlier origin (loader registration order), then earlier target in the
//!    caller's target list

use crate::graph::{ConversionGraph, GraphCache};
use crate::pipeline::{ConversionStep, LoaderStep, Pipeline, PipelineSource};
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use pixroute_flavor::{Flavor, ImageDescriptor, Penalty};
use pixroute_registry::{CapabilityRegistry, RegistryState};
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Lexicographic path cost: penalty, then hops, then converter ordinals
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Cost {
    penalty: Penalty,
    hops: usize,
    ordinals: SmallVec<[usize; 4]>,
}

impl Cost {
    fn start(penalty: Penalty) -> Self {
        Self {
            penalty,
            hops: 0,
            ordinals: SmallVec::new(),
        }
    }

    fn extend(&self, penalty: Penalty, ordinal: usize) -> Self {
        let mut ordinals = self.ordinals.clone();
        ordinals.push(ordinal);
        Self {
            penalty,
            hops: self.hops + 1,
            ordinals,
        }
    }
}

struct Reach {
    cost: Cost,
    via: Option<EdgeIndex>,
}

/// Starting point of a search
struct Origin {
    flavor: Flavor,
    loader: Option<LoaderStep>,
    cost: Penalty,
}

/// Selection key across origins and targets
type Rank = (Cost, usize, usize, NodeIndex);

/// Finds the cheapest pipeline from a source to any of a set of flavors
pub struct PipelineResolver {
    registry: Arc<CapabilityRegistry>,
    graphs: GraphCache,
}

impl PipelineResolver {
    #[must_use]
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            graphs: GraphCache::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Conversion graph for the registry's current state
    #[must_use]
    pub fn graph(&self) -> Arc<ConversionGraph> {
        self.graphs.current(&self.registry)
    }

    /// Cheapest pipeline from `source` to a flavor compatible with one of `targets`
    ///
    /// Returns `None` when no route exists. An artifact already compatible
    /// with a target yields an identity pipeline of penalty zero.
    #[must_use]
    pub fn resolve(&self, source: PipelineSource<'_>, targets: &[Flavor]) -> Option<Pipeline> {
        if targets.is_empty() {
            return None;
        }

        if let PipelineSource::Artifact(artifact) = source {
            if targets.iter().any(|t| artifact.flavor().is_compatible(t)) {
                return Some(Pipeline::identity(artifact.flavor().clone()));
            }
        }

        let state = self.registry.snapshot();
        let origins = origins(&state, source);

        if let Some(direct) = direct_loader(&origins, targets) {
            tracing::debug!(route = %direct.describe(), penalty = %direct.penalty(), "direct loader");
            return Some(direct);
        }

        let graph = self.graphs.for_state(&state);
        let searches = search_all(&graph, &origins);

        let best = (0..targets.len())
            .filter_map(|t| best_for_target(&graph, &searches, targets, t))
            .min()?;
        let pipeline = assemble(&graph, &origins, &searches, &best);

        tracing::debug!(
            route = %pipeline.describe(),
            penalty = %pipeline.penalty(),
            generation = ?graph.generation(),
            "pipeline resolved"
        );
        Some(pipeline)
    }

    /// Best pipeline for every reachable target, cheapest first
    ///
    /// Useful for diagnostics; unlike [`PipelineResolver::resolve`] this does
    /// not prefer direct loaders.
    #[must_use]
    pub fn candidates(&self, source: PipelineSource<'_>, targets: &[Flavor]) -> Vec<Pipeline> {
        let state = self.registry.snapshot();
        let origins = origins(&state, source);
        let graph = self.graphs.for_state(&state);
        let searches = search_all(&graph, &origins);

        let mut ranked: Vec<(Rank, Pipeline)> = (0..targets.len())
            .filter_map(|t| {
                let rank = match best_for_target(&graph, &searches, targets, t) {
                    Some(rank) => rank,
                    // origin flavor never touched by a converter
                    None => identity_rank(&origins, targets, t)?,
                };
                let pipeline = assemble(&graph, &origins, &searches, &rank);
                Some((rank, pipeline))
            })
            .collect();
        ranked.sort_by(|a, b| a.0.cmp(&b.0));
        ranked.into_iter().map(|(_, pipeline)| pipeline).collect()
    }
}

impl Debug for PipelineResolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineResolver")
            .field("graph", &self.graphs.peek())
            .finish_non_exhaustive()
    }
}

/// Origins for a source, in loader registration order
///
/// Each flavor appears once, carried by its cheapest loader.
fn origins(state: &RegistryState, source: PipelineSource<'_>) -> Vec<Origin> {
    match source {
        PipelineSource::Artifact(artifact) => vec![Origin {
            flavor: artifact.flavor().clone(),
            loader: None,
            cost: Penalty::ZERO,
        }],
        PipelineSource::Descriptor(descriptor) => loader_origins(state, descriptor),
    }
}

fn loader_origins(state: &RegistryState, descriptor: &ImageDescriptor) -> Vec<Origin> {
    let mut origins: Vec<Origin> = Vec::new();

    for (flavor, factory) in state.loader_factories_for_mime(descriptor.mime_type()) {
        if !factory.is_supported(descriptor) {
            continue;
        }
        let Some(loader) = factory.new_loader(&flavor) else {
            continue;
        };
        let cost = state.effective_penalty(factory.implementation_id(), loader.usage_penalty());
        if cost.is_infinite() {
            continue;
        }

        let step = LoaderStep::new(Arc::clone(&factory), Arc::from(loader), flavor.clone(), cost);
        match origins.iter().position(|o| o.flavor == flavor) {
            Some(i) if cost < origins[i].cost => {
                origins[i].loader = Some(step);
                origins[i].cost = cost;
            }
            Some(_) => {}
            None => origins.push(Origin {
                flavor,
                loader: Some(step),
                cost,
            }),
        }
    }

    origins
}

fn direct_loader(origins: &[Origin], targets: &[Flavor]) -> Option<Pipeline> {
    origins
        .iter()
        .enumerate()
        .filter(|(_, o)| o.loader.is_some() && targets.iter().any(|t| o.flavor.is_compatible(t)))
        .min_by_key(|(i, o)| (o.cost, *i))
        .map(|(_, o)| Pipeline::assemble(o.loader.clone(), o.flavor.clone(), std::iter::empty()))
}

fn search_all(graph: &ConversionGraph, origins: &[Origin]) -> Vec<HashMap<NodeIndex, Reach>> {
    origins
        .iter()
        .map(|origin| match graph.node(&origin.flavor) {
            Some(node) => shortest_paths(graph, node, origin.cost),
            None => HashMap::new(),
        })
        .collect()
}

/// Dijkstra from one origin node, skipping infinite edges
fn shortest_paths(graph: &ConversionGraph, origin: NodeIndex, start: Penalty) -> HashMap<NodeIndex, Reach> {
    let inner = graph.inner();
    let mut best: HashMap<NodeIndex, Reach> = HashMap::new();
    let mut heap = BinaryHeap::new();

    best.insert(
        origin,
        Reach {
            cost: Cost::start(start),
            via: None,
        },
    );
    heap.push(Reverse((Cost::start(start), origin)));

    while let Some(Reverse((cost, node))) = heap.pop() {
        if best.get(&node).is_some_and(|r| r.cost < cost) {
            continue;
        }

        for edge in inner.edges_directed(node, Direction::Outgoing) {
            let weight = edge.weight();
            if weight.penalty().is_infinite() {
                continue;
            }
            let penalty = cost.penalty + weight.penalty();
            if penalty.is_infinite() {
                continue;
            }

            let next = cost.extend(penalty, weight.ordinal());
            let target = edge.target();
            if best.get(&target).map_or(true, |r| next < r.cost) {
                best.insert(
                    target,
                    Reach {
                        cost: next.clone(),
                        via: Some(edge.id()),
                    },
                );
                heap.push(Reverse((next, target)));
            }
        }
    }

    best
}

fn best_for_target(
    graph: &ConversionGraph,
    searches: &[HashMap<NodeIndex, Reach>],
    targets: &[Flavor],
    target: usize,
) -> Option<Rank> {
    let wanted = &targets[target];
    searches
        .iter()
        .enumerate()
        .flat_map(move |(origin, reached)| {
            reached
                .iter()
                .filter(move |(node, _)| graph.inner()[**node].is_compatible(wanted))
                .map(move |(node, reach)| (reach.cost.clone(), origin, target, *node))
        })
        .min()
}

/// Rank of a zero-hop candidate whose origin flavor has no graph node
fn identity_rank(origins: &[Origin], targets: &[Flavor], target: usize) -> Option<Rank> {
    origins
        .iter()
        .enumerate()
        .filter(|(_, o)| o.flavor.is_compatible(&targets[target]))
        .map(|(i, o)| (Cost::start(o.cost), i, target, NodeIndex::end()))
        .min()
}

fn assemble(
    graph: &ConversionGraph,
    origins: &[Origin],
    searches: &[HashMap<NodeIndex, Reach>],
    rank: &Rank,
) -> Pipeline {
    let (_, origin_index, _, end) = rank;
    let origin = &origins[*origin_index];
    let reached = &searches[*origin_index];

    let mut edges = Vec::new();
    let mut node = *end;
    while let Some(edge) = reached.get(&node).and_then(|r| r.via) {
        edges.push(edge);
        match graph.inner().edge_endpoints(edge) {
            Some((from, _)) => node = from,
            None => break,
        }
    }
    edges.reverse();

    let steps = edges.into_iter().filter_map(|edge| {
        let (from, to) = graph.inner().edge_endpoints(edge)?;
        let weight = graph.edge(edge);
        Some(ConversionStep::new(
            Arc::clone(weight.converter()),
            graph.inner()[from].clone(),
            graph.inner()[to].clone(),
            weight.penalty(),
        ))
    });

    Pipeline::assemble(origin.loader.clone(), origin.flavor.clone(), steps)
}
