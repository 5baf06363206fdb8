//! Links canonical nodes into one forest per `topParent` partition.
//!
//! Nodes live in an arena and refer to each other by slot index. Parent links
//! are resolved first, then every cycle in the parent graph is cut before any
//! child list is built, so later traversals only ever see trees.
//!
//! A subtree is filed under the `topParent` of its root: a child that names a
//! parent in another partition follows that parent.

use std::collections::{BTreeMap, HashMap};

use crate::record::CanonicalNode;

#[derive(Debug, Clone)]
pub struct TreeNode {
    pub node: CanonicalNode,
    /// Arena slots of the direct children, unsorted.
    pub children: Vec<usize>,
}

/// Counters collected while building, surfaced in the compile report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub nodes: usize,
    /// Records whose id had already been seen and that replaced the earlier node.
    pub duplicates: usize,
    /// Nodes whose `parentId` named no known node.
    pub orphans: usize,
    pub cycles_broken: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: Vec<TreeNode>,
    roots: BTreeMap<String, Vec<usize>>,
    report: BuildReport,
}

impl Forest {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, slot: usize) -> &TreeNode {
        &self.nodes[slot]
    }

    /// Partition keys (the roots' `topParent`) with their root slots, in byte order of the key.
    pub fn partitions(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.roots
            .iter()
            .map(|(key, slots)| (key.as_str(), slots.as_slice()))
    }

    pub fn report(&self) -> BuildReport {
        self.report
    }
}

/// Build the forest. Duplicate ids are last-write-wins; the surviving node
/// keeps the slot of the first occurrence.
pub fn build(nodes: Vec<CanonicalNode>) -> Forest {
    let mut report = BuildReport::default();
    let mut arena: Vec<CanonicalNode> = Vec::with_capacity(nodes.len());
    let mut by_id: HashMap<String, usize> = HashMap::with_capacity(nodes.len());

    for node in nodes {
        match by_id.get(&node.id) {
            Some(&slot) => {
                tracing::debug!(id = %node.id, "duplicate id, later record wins");
                arena[slot] = node;
                report.duplicates += 1;
            }
            None => {
                by_id.insert(node.id.clone(), arena.len());
                arena.push(node);
            }
        }
    }

    let mut parents: Vec<Option<usize>> = Vec::with_capacity(arena.len());
    for node in &arena {
        let resolved = node.parent_id.as_deref().and_then(|pid| {
            let parent = by_id.get(pid).copied();
            if parent.is_none() {
                report.orphans += 1;
            }
            parent
        });
        parents.push(resolved);
    }

    report.cycles_broken = break_cycles(&arena, &mut parents);
    report.nodes = arena.len();

    let mut tree: Vec<TreeNode> = arena
        .into_iter()
        .map(|node| TreeNode {
            node,
            children: Vec::new(),
        })
        .collect();
    let mut roots: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (slot, parent) in parents.into_iter().enumerate() {
        match parent {
            Some(parent) => tree[parent].children.push(slot),
            None => roots
                .entry(tree[slot].node.top_parent.clone())
                .or_default()
                .push(slot),
        }
    }

    Forest {
        nodes: tree,
        roots,
        report,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Walk every ancestor chain once and cut each cycle found. The member with
/// the smallest id loses its parent link, so the outcome depends only on the
/// set of nodes and never on their input order. Returns the number of cuts.
fn break_cycles(arena: &[CanonicalNode], parents: &mut [Option<usize>]) -> usize {
    let mut marks = vec![Mark::Unvisited; parents.len()];
    let mut broken = 0;

    for start in 0..parents.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        let mut path = Vec::new();
        let mut cursor = Some(start);
        while let Some(slot) = cursor {
            match marks[slot] {
                Mark::Unvisited => {
                    marks[slot] = Mark::OnPath;
                    path.push(slot);
                    cursor = parents[slot];
                }
                Mark::OnPath => {
                    let begin = path.iter().position(|&s| s == slot).unwrap_or(0);
                    let cycle = &path[begin..];
                    if let Some(&head) = cycle.iter().min_by(|a, b| arena[**a].id.cmp(&arena[**b].id)) {
                        let members: Vec<&str> = cycle.iter().map(|&s| arena[s].id.as_str()).collect();
                        tracing::warn!(
                            root = %arena[head].id,
                            ?members,
                            "parent cycle detected, treating node as root"
                        );
                        parents[head] = None;
                        broken += 1;
                    }
                    break;
                }
                Mark::Done => break,
            }
        }
        for slot in path {
            marks[slot] = Mark::Done;
        }
    }

    broken
}
