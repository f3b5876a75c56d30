//! Dependency graph model
//!
//! This module provides:
//! - [`Graph::merge`]: builds one immutable graph from per-file fragments,
//!   pairing lockfiles with their manifests
//! - Traversal primitives: dependencies, dependents, transitive closure,
//!   depth and cycle groups
//!
//! Nodes are stored in canonical order (ecosystem, name, scope, manifest,
//! resolved version); a node's [`NodeId`] is its position in that order and
//! equals its petgraph index. Edges point from a package to what it depends on.

mod merge;

use crate::domain::{Dependency, Ecosystem, NodeId, NodeKey, PackageRef};
use crate::manifest::ManifestRecord;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::Direction;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::path::Path;

/// A lockfile requirement naming a package the lockfile does not contain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedRef {
    /// Ecosystem of the lockfile the requirement appears in
    pub ecosystem: Ecosystem,
    /// Required package name
    pub name: String,
    /// Requirement text, when the lockfile records one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<String>,
    /// Another ecosystem in the graph has a package with this name
    pub cross_ecosystem: bool,
}

/// Target of a dependency edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeTarget {
    Node(NodeId),
    Unresolved(UnresolvedRef),
}

/// Immutable dependency graph of one run
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Dependency>,
    index: HashMap<NodeKey, NodeId>,
    edges: DiGraph<NodeId, ()>,
    unresolved: Vec<(NodeId, UnresolvedRef)>,
    manifests: Vec<ManifestRecord>,
    depths: Vec<Option<usize>>,
}

fn node_index(id: NodeId) -> NodeIndex {
    NodeIndex::new(id.index())
}

fn node_id(index: NodeIndex) -> NodeId {
    NodeId(index.index())
}

impl Graph {
    /// Assembles a graph from nodes already in canonical order
    pub(crate) fn from_parts(
        nodes: Vec<Dependency>,
        edges: Vec<(NodeId, NodeId)>,
        unresolved: Vec<(NodeId, UnresolvedRef)>,
        manifests: Vec<ManifestRecord>,
    ) -> Self {
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.key(), NodeId(i)))
            .collect();

        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
        for i in 0..nodes.len() {
            graph.add_node(NodeId(i));
        }
        for (from, to) in edges {
            graph.update_edge(node_index(from), node_index(to), ());
        }

        let mut built = Self {
            nodes,
            index,
            edges: graph,
            unresolved,
            manifests,
            depths: Vec::new(),
        };
        built.depths = built.compute_depths();
        built
    }

    /// Shortest distance from any direct node; direct nodes have depth 1
    fn compute_depths(&self) -> Vec<Option<usize>> {
        let mut depths = vec![None; self.nodes.len()];
        let mut queue = VecDeque::new();
        for (id, node) in self.nodes() {
            if node.is_direct() {
                depths[id.index()] = Some(1);
                queue.push_back(id);
            }
        }
        while let Some(id) = queue.pop_front() {
            let next = depths[id.index()].unwrap_or(1) + 1;
            for child in self.edges.neighbors_directed(node_index(id), Direction::Outgoing) {
                if depths[child.index()].is_none() {
                    depths[child.index()] = Some(next);
                    queue.push_back(node_id(child));
                }
            }
        }
        depths
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true when the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node with the given id
    pub fn node(&self, id: NodeId) -> Option<&Dependency> {
        self.nodes.get(id.index())
    }

    /// All nodes in canonical order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Dependency)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Nodes declared in a manifest, in canonical order
    pub fn direct_nodes(&self) -> impl Iterator<Item = (NodeId, &Dependency)> {
        self.nodes().filter(|(_, n)| n.is_direct())
    }

    /// Nodes belonging to one manifest or lockfile
    pub fn nodes_in<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = (NodeId, &'a Dependency)> {
        self.nodes().filter(move |(_, n)| n.belongs_to(path))
    }

    /// Node id for an identity key
    pub fn lookup(&self, key: &NodeKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    /// Every node with the given ecosystem and name
    pub fn find_by_name(&self, ecosystem: Ecosystem, name: &str) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| n.ecosystem == ecosystem && n.name == name)
            .map(|(id, _)| id)
            .collect()
    }

    /// Manifest and lockfile records, sorted by path
    pub fn manifests(&self) -> &[ManifestRecord] {
        &self.manifests
    }

    /// Record of one file
    pub fn manifest(&self, path: &Path) -> Option<&ManifestRecord> {
        self.manifests.iter().find(|m| m.path == path)
    }

    /// Human-facing identity of a node
    pub fn package_ref(&self, id: NodeId) -> Option<PackageRef> {
        self.node(id).map(|node| PackageRef {
            ecosystem: node.ecosystem,
            name: node.name.clone(),
            scope: node.scope,
            version: node.current_version().map(|v| v.as_str().to_string()),
        })
    }

    /// Number of resolved edges
    pub fn edge_count(&self) -> usize {
        self.edges.edge_count()
    }

    /// Every edge leaving `id`, resolved ones first, each group in canonical order
    pub fn edges_from(&self, id: NodeId) -> Vec<EdgeTarget> {
        let mut targets: Vec<EdgeTarget> = self
            .dependencies(id)
            .into_iter()
            .map(EdgeTarget::Node)
            .collect();
        targets.extend(
            self.unresolved
                .iter()
                .filter(|(from, _)| *from == id)
                .map(|(_, r)| EdgeTarget::Unresolved(r.clone())),
        );
        targets
    }

    /// Nodes `id` depends on directly
    pub fn dependencies(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Nodes depending on `id` directly
    pub fn direct_dependents(&self, id: NodeId) -> Vec<NodeId> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: NodeId, direction: Direction) -> Vec<NodeId> {
        if id.index() >= self.nodes.len() {
            return Vec::new();
        }
        let mut ids: Vec<NodeId> = self
            .edges
            .edges_directed(node_index(id), direction)
            .map(|edge| match direction {
                Direction::Outgoing => node_id(edge.target()),
                Direction::Incoming => node_id(edge.source()),
            })
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Unresolved requirements of every node
    pub fn unresolved_edges(&self) -> &[(NodeId, UnresolvedRef)] {
        &self.unresolved
    }

    /// Everything reachable from `id`, excluding `id` itself unless it sits on a cycle
    pub fn transitive_closure(&self, id: NodeId) -> Vec<NodeId> {
        if id.index() >= self.nodes.len() {
            return Vec::new();
        }
        let start = node_index(id);
        let mut reached = Vec::new();
        let mut bfs = Bfs::new(&self.edges, start);
        while let Some(next) = bfs.next(&self.edges) {
            if next != start {
                reached.push(node_id(next));
            }
        }
        let on_cycle = self
            .edges
            .neighbors_directed(start, Direction::Incoming)
            .any(|parent| parent == start || reached.contains(&node_id(parent)));
        if on_cycle {
            reached.push(id);
        }
        reached.sort();
        reached
    }

    /// Shortest distance from a direct node (direct nodes have depth 1),
    /// None for lockfile packages nothing reaches
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        self.depths.get(id.index()).copied().flatten()
    }

    /// Groups of nodes that depend on each other, each sorted, in canonical order.
    /// A package depending on itself forms a group of one.
    pub fn strongly_connected_groups(&self) -> Vec<Vec<NodeId>> {
        let mut groups: Vec<Vec<NodeId>> = tarjan_scc(&self.edges)
            .into_iter()
            .filter(|group| {
                group.len() > 1 || group.iter().any(|&n| self.edges.contains_edge(n, n))
            })
            .map(|group| {
                let mut ids: Vec<NodeId> = group.into_iter().map(node_id).collect();
                ids.sort();
                ids
            })
            .collect();
        groups.sort();
        groups
    }
}
