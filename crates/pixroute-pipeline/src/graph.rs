//! Conversion graph
//!
//! Directed multigraph over flavors: one edge per (converter, declared source
//! flavor), weighted by the converter's effective penalty. A graph is an
//! immutable snapshot of one registry state; [`GraphCache`] rebuilds it when
//! the registry has moved on and publishes the new snapshot atomically.

use arc_swap::ArcSwap;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use pixroute_flavor::{Converter, Flavor, Penalty};
use pixroute_registry::{CapabilityRegistry, RegistryState};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// One conversion edge
#[derive(Clone)]
pub struct ConversionEdge {
    converter: Arc<dyn Converter>,
    penalty: Penalty,
    ordinal: usize,
}

impl ConversionEdge {
    /// Converter traversed by this edge
    #[inline]
    #[must_use]
    pub fn converter(&self) -> &Arc<dyn Converter> {
        &self.converter
    }

    /// Base penalty plus any additional penalty
    #[inline]
    #[must_use]
    pub fn penalty(&self) -> Penalty {
        self.penalty
    }

    /// Registration position of the converter
    #[inline]
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

impl Debug for ConversionEdge {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionEdge")
            .field("converter", &self.converter.implementation_id())
            .field("penalty", &self.penalty)
            .field("ordinal", &self.ordinal)
            .finish()
    }
}

/// Immutable conversion graph built from one registry snapshot
pub struct ConversionGraph {
    graph: DiGraph<Flavor, ConversionEdge>,
    nodes: HashMap<Flavor, NodeIndex>,
    stamp: Option<(u64, u64)>,
}

impl ConversionGraph {
    /// Graph with no nodes, stale against every registry
    #[must_use]
    pub fn empty() -> Self {
        Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
            stamp: None,
        }
    }

    /// Build from a registry snapshot
    ///
    /// Every converter is visited once; each declared source flavor yields
    /// an edge to the target flavor. Parallel edges are kept.
    #[must_use]
    pub fn build(state: &RegistryState) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<Flavor, NodeIndex> = HashMap::new();

        let mut node_for = |graph: &mut DiGraph<Flavor, ConversionEdge>, flavor: Flavor| {
            *nodes
                .entry(flavor.clone())
                .or_insert_with(|| graph.add_node(flavor))
        };

        for (ordinal, converter) in state.converters().iter().enumerate() {
            let penalty = state.effective_penalty(
                converter.implementation_id(),
                converter.conversion_penalty(),
            );
            let target = node_for(&mut graph, converter.target_flavor());
            for source in converter.source_flavors() {
                let source = node_for(&mut graph, source);
                graph.add_edge(
                    source,
                    target,
                    ConversionEdge {
                        converter: Arc::clone(converter),
                        penalty,
                        ordinal,
                    },
                );
            }
        }

        let built = Self {
            graph,
            nodes,
            stamp: Some((state.converter_generation(), state.override_revision())),
        };

        tracing::debug!(
            generation = state.converter_generation(),
            nodes = built.node_count(),
            edges = built.edge_count(),
            "conversion graph built"
        );
        built
    }

    /// Converter generation this graph was built from
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Option<u64> {
        self.stamp.map(|(generation, _)| generation)
    }

    /// Whether this graph reflects `state`
    #[inline]
    #[must_use]
    pub fn is_current(&self, state: &RegistryState) -> bool {
        self.stamp == Some((state.converter_generation(), state.override_revision()))
    }

    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All flavors mentioned by some converter
    pub fn flavors(&self) -> impl Iterator<Item = &Flavor> {
        self.graph.node_weights()
    }

    /// Outgoing edges of `flavor` as (target flavor, edge)
    pub fn edges_from<'a>(
        &'a self,
        flavor: &Flavor,
    ) -> impl Iterator<Item = (&'a Flavor, &'a ConversionEdge)> + 'a {
        self.nodes
            .get(flavor)
            .into_iter()
            .flat_map(move |&node| {
                self.graph
                    .edges_directed(node, Direction::Outgoing)
                    .map(move |edge| (&self.graph[edge.target()], edge.weight()))
            })
    }

    pub(crate) fn node(&self, flavor: &Flavor) -> Option<NodeIndex> {
        self.nodes.get(flavor).copied()
    }

    pub(crate) fn inner(&self) -> &DiGraph<Flavor, ConversionEdge> {
        &self.graph
    }

    pub(crate) fn edge(&self, edge: EdgeIndex) -> &ConversionEdge {
        &self.graph[edge]
    }
}

impl Debug for ConversionGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionGraph")
            .field("nodes", &self.node_count())
            .field("edges", &self.edge_count())
            .field("stamp", &self.stamp)
            .finish()
    }
}

/// Lazily rebuilt, atomically published conversion graph
pub struct GraphCache {
    current: ArcSwap<ConversionGraph>,
}

impl GraphCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(ConversionGraph::empty()),
        }
    }

    /// Graph reflecting the registry's current state
    ///
    /// Rebuilds outside any lock when stale. Concurrent rebuilds race
    /// harmlessly; a newer published graph is never replaced by an older one.
    pub fn current(&self, registry: &CapabilityRegistry) -> Arc<ConversionGraph> {
        self.for_state(&registry.snapshot())
    }

    /// Graph reflecting a specific registry snapshot
    pub fn for_state(&self, state: &RegistryState) -> Arc<ConversionGraph> {
        let published = self.current.load_full();
        if published.is_current(state) {
            return published;
        }

        let fresh = Arc::new(ConversionGraph::build(state));
        self.current.rcu(|existing| {
            if existing.stamp >= fresh.stamp {
                Arc::clone(existing)
            } else {
                Arc::clone(&fresh)
            }
        });
        fresh
    }

    /// Last published graph, possibly stale
    #[must_use]
    pub fn peek(&self) -> Arc<ConversionGraph> {
        self.current.load_full()
    }
}

impl Default for GraphCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for GraphCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphCache")
            .field("current", &*self.current.load())
            .finish()
    }
}
