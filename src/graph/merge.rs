//! Building a graph from per-file fragments

use super::{Graph, UnresolvedRef};
use crate::domain::{Constraint, Dependency, Ecosystem, NodeId, NodeKey, Scope, SourceLocation};
use crate::manifest::{GraphFragment, LockedPackage, ManifestRecord};
use crate::parser::parse_constraint;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::debug;

/// Lockfile paired with a manifest: same ecosystem, same directory, or the
/// nearest ancestor directory for ecosystems whose workspaces share one lockfile
fn find_lockfile(manifest: &ManifestRecord, lockfiles: &[GraphFragment]) -> Option<usize> {
    let dir = manifest.path.parent().unwrap_or(Path::new(""));
    lockfiles
        .iter()
        .enumerate()
        .filter(|(_, lock)| lock.record.ecosystem == manifest.ecosystem)
        .filter_map(|(i, lock)| {
            let lock_dir = lock.record.path.parent().unwrap_or(Path::new(""));
            if lock_dir == dir {
                Some((0, i))
            } else if manifest.ecosystem.shares_workspace_lockfile() && dir.starts_with(lock_dir) {
                let distance = dir.components().count() - lock_dir.components().count();
                Some((distance, i))
            } else {
                None
            }
        })
        .min()
        .map(|(_, i)| i)
}

/// Picks the entry a requirement resolves to among same-named lockfile entries
fn choose<'a>(
    candidates: &[(usize, &'a LockedPackage)],
    ecosystem: Ecosystem,
    requirement: Option<&str>,
) -> Option<(usize, &'a LockedPackage)> {
    let Some(requirement) = requirement else {
        return candidates.first().copied();
    };
    if let Some(exact) = candidates
        .iter()
        .find(|(_, p)| p.version.as_str() == requirement.trim())
    {
        return Some(*exact);
    }
    let constraint = parse_constraint(ecosystem, requirement);
    candidates
        .iter()
        .find(|(_, p)| constraint.matches(&p.version) == Some(true))
        .or_else(|| candidates.first())
        .copied()
}

/// Requirement of the lockfile entry at `index`: one whose edge resolves to
/// that entry, else one its version satisfies, else the first by name
fn requirement_for<'a>(
    lock: &'a GraphFragment,
    candidates: &[(usize, &LockedPackage)],
    index: usize,
) -> Option<&'a str> {
    let ecosystem = lock.record.ecosystem;
    let package = &lock.packages[index];
    let requirements: Vec<&str> = lock
        .packages
        .iter()
        .flat_map(|p| p.dependencies.iter())
        .filter(|r| r.name == package.name)
        .filter_map(|r| r.requirement.as_deref())
        .collect();
    requirements
        .iter()
        .copied()
        .find(|r| matches!(choose(candidates, ecosystem, Some(*r)), Some((i, _)) if i == index))
        .or_else(|| {
            requirements.iter().copied().find(|r| {
                parse_constraint(ecosystem, r).matches(&package.version) == Some(true)
            })
        })
        .or_else(|| requirements.first().copied())
}

/// Inserts a node, folding a repeated identity into extra declaration sites
fn insert(nodes: &mut BTreeMap<NodeKey, Dependency>, dep: Dependency) -> NodeKey {
    let key = dep.key();
    match nodes.get_mut(&key) {
        Some(existing) => existing.also_declared.push(dep.source),
        None => {
            nodes.insert(key.clone(), dep);
        }
    }
    key
}

impl Graph {
    /// Merges fragments into one graph. Never fails: anything that cannot be
    /// connected is kept as an unresolved edge.
    pub fn merge(fragments: impl IntoIterator<Item = GraphFragment>) -> Self {
        let mut fragments: Vec<GraphFragment> = fragments.into_iter().collect();
        fragments.sort_by(|a, b| a.record.path.cmp(&b.record.path));
        let (lockfiles, manifests): (Vec<_>, Vec<_>) =
            fragments.into_iter().partition(|f| f.record.is_lockfile());

        let mut records: Vec<ManifestRecord> = Vec::new();
        let mut paired: Vec<Vec<usize>> = vec![Vec::new(); lockfiles.len()];
        for (i, manifest) in manifests.iter().enumerate() {
            let mut record = manifest.record.clone();
            if let Some(lock) = find_lockfile(&record, &lockfiles) {
                record.lockfile = Some(lockfiles[lock].record.path.clone());
                paired[lock].push(i);
            }
            records.push(record);
        }
        records.extend(lockfiles.iter().map(|l| l.record.clone()));
        records.sort_by(|a, b| a.path.cmp(&b.path));

        let mut nodes: BTreeMap<NodeKey, Dependency> = BTreeMap::new();
        let mut declared: Vec<Vec<NodeKey>> = Vec::with_capacity(manifests.len());
        for manifest in &manifests {
            let keys = manifest
                .dependencies
                .iter()
                .map(|dep| insert(&mut nodes, dep.clone()))
                .collect();
            declared.push(keys);
        }

        // Nodes standing for each lockfile entry: (lockfile, entry) -> keys
        let mut entry_nodes: HashMap<(usize, usize), Vec<NodeKey>> = HashMap::new();

        for (l, lock) in lockfiles.iter().enumerate() {
            let ecosystem = lock.record.ecosystem;
            let mut by_name: HashMap<&str, Vec<(usize, &LockedPackage)>> = HashMap::new();
            let mut resolvable: HashMap<&str, Vec<(usize, &LockedPackage)>> = HashMap::new();
            for (i, package) in lock.packages.iter().enumerate() {
                resolvable.entry(package.name.as_str()).or_default().push((i, package));
                if !package.root {
                    by_name.entry(package.name.as_str()).or_default().push((i, package));
                }
            }

            for &m in &paired[l] {
                let mut seen = BTreeSet::new();
                for key in &declared[m] {
                    if !seen.insert(key.clone()) {
                        continue;
                    }
                    let Some(node) = nodes.get_mut(key) else {
                        continue;
                    };
                    if !node.is_direct() {
                        continue;
                    }
                    let Some(candidates) = by_name.get(node.name.as_str()) else {
                        continue;
                    };
                    let chosen = candidates
                        .iter()
                        .find(|(_, p)| node.constraint.matches(&p.version) == Some(true))
                        .or_else(|| candidates.first());
                    if let Some(&(i, package)) = chosen {
                        node.locked = Some(package.version.clone());
                        entry_nodes.entry((l, i)).or_default().push(key.clone());
                    }
                }
            }

            for (i, package) in lock.packages.iter().enumerate() {
                if package.root || entry_nodes.contains_key(&(l, i)) {
                    continue;
                }
                let candidates = resolvable
                    .get(package.name.as_str())
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let constraint = requirement_for(lock, candidates, i)
                    .map(|r| parse_constraint(ecosystem, r))
                    .unwrap_or_else(|| Constraint::any(""));
                let mut source = SourceLocation::new(&lock.record.path, "packages");
                source.line = package.line;
                let dep = Dependency::new(
                    ecosystem,
                    package.name.as_str(),
                    constraint,
                    Scope::Transitive,
                    source,
                )
                .with_locked(package.version.clone())
                .with_position(package.line.unwrap_or(i));
                let key = insert(&mut nodes, dep);
                entry_nodes.entry((l, i)).or_default().push(key);
            }
        }

        let ids: HashMap<NodeKey, NodeId> = nodes
            .keys()
            .enumerate()
            .map(|(i, key)| (key.clone(), NodeId(i)))
            .collect();
        let nodes: Vec<Dependency> = nodes.into_values().collect();

        let mut edges = Vec::new();
        let mut unresolved = Vec::new();
        for (l, lock) in lockfiles.iter().enumerate() {
            let ecosystem = lock.record.ecosystem;
            let mut by_name: HashMap<&str, Vec<(usize, &LockedPackage)>> = HashMap::new();
            for (i, package) in lock.packages.iter().enumerate() {
                by_name.entry(package.name.as_str()).or_default().push((i, package));
            }

            for (i, package) in lock.packages.iter().enumerate() {
                let Some(sources) = entry_nodes.get(&(l, i)) else {
                    continue;
                };
                for requirement in &package.dependencies {
                    let Some(candidates) = by_name.get(requirement.name.as_str()) else {
                        let reference = UnresolvedRef {
                            ecosystem,
                            name: requirement.name.clone(),
                            requirement: requirement.requirement.clone(),
                            cross_ecosystem: nodes.iter().any(|n| {
                                n.name == requirement.name
                                    && n.ecosystem.registry_family() != ecosystem.registry_family()
                            }),
                        };
                        for key in sources {
                            if let Some(&from) = ids.get(key) {
                                unresolved.push((from, reference.clone()));
                            }
                        }
                        continue;
                    };
                    let Some((target, _)) =
                        choose(candidates, ecosystem, requirement.requirement.as_deref())
                    else {
                        continue;
                    };
                    // Workspace members are not nodes of their own
                    let Some(target) = entry_nodes
                        .get(&(l, target))
                        .and_then(|keys| keys.first())
                        .and_then(|key| ids.get(key))
                    else {
                        continue;
                    };
                    for key in sources {
                        if let Some(&from) = ids.get(key) {
                            edges.push((from, *target));
                        }
                    }
                }
            }
        }
        unresolved.sort_by(|a: &(NodeId, UnresolvedRef), b| {
            a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name))
        });
        unresolved.dedup();

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            unresolved = unresolved.len(),
            "merged dependency graph"
        );
        Graph::from_parts(nodes, edges, unresolved, records)
    }
}
