//! Immutable dependency graph keyed by dense node ids.
//!
//! The graph is a set of parallel arrays indexed by [`NodeId`] plus one
//! name→id map. It is built once from a parsed rule set (or decoded from
//! the on-disk cache) and never mutated afterwards, so the scheduler and
//! the background cache writer can share it through `Arc` without locking.

use std::collections::{HashMap, HashSet};

use maku_types::{MakuError, MakuResult, NodeId, RuleSet};

use crate::codec::{Cursor, Decode, Encode};

/// Version tag leading the encoded graph.
pub const GRAPH_FORMAT_VERSION: u32 = 1;

/// Immutable build graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    /// Command sequence per node, in rule order.
    commands: Vec<Vec<String>>,
    /// Forward adjacency: nodes that depend on the index node.
    children: Vec<Vec<NodeId>>,
    /// Reverse adjacency: nodes the index node depends on, in dep order.
    parents: Vec<Vec<NodeId>>,
    /// Name → id index.
    ids: HashMap<String, NodeId>,
    /// Ids whose staleness check always answers "must execute".
    phony: HashSet<NodeId>,
    /// Id → name, inverse of `ids`.
    names: Vec<String>,
}

impl Graph {
    /// Build a graph from a parsed rule set.
    ///
    /// Rules receive positional ids in presentation order. Duplicate rule
    /// names, dependencies naming an unknown rule, and phony names that do
    /// not resolve are all fatal input errors.
    pub fn build(parsed: &RuleSet) -> MakuResult<Graph> {
        let n = parsed.rules.len();
        let mut ids = HashMap::with_capacity(n);
        let mut names = Vec::with_capacity(n);

        for (i, rule) in parsed.rules.iter().enumerate() {
            if ids.insert(rule.name.clone(), NodeId(i as u32)).is_some() {
                return Err(MakuError::DuplicateRule(rule.name.clone()));
            }
            names.push(rule.name.clone());
        }

        let mut commands = Vec::with_capacity(n);
        let mut children = vec![Vec::new(); n];
        let mut parents = vec![Vec::new(); n];

        for rule in &parsed.rules {
            let child = ids[rule.name.as_str()];
            commands.push(rule.commands.clone());

            for dep in &rule.deps {
                let parent =
                    *ids.get(dep).ok_or_else(|| MakuError::UnknownDependency {
                        rule: rule.name.clone(),
                        dep: dep.clone(),
                    })?;
                children[parent.index()].push(child);
                parents[child.index()].push(parent);
            }
        }

        let mut phony = HashSet::with_capacity(parsed.phony.len());
        for name in &parsed.phony {
            let id = ids
                .get(name)
                .copied()
                .ok_or_else(|| MakuError::UnknownPhony(name.clone()))?;
            phony.insert(id);
        }

        tracing::debug!(nodes = n, phony = phony.len(), "graph built");
        Ok(Graph { commands, children, parents, ids, phony, names })
    }

    /// Look up a target by name.
    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.ids.get(name).copied()
    }

    /// Name of a node. Doubles as the path its output file lives at.
    pub fn name_of(&self, id: NodeId) -> &str {
        &self.names[id.index()]
    }

    /// Command sequence of a node, in source order.
    pub fn commands_of(&self, id: NodeId) -> &[String] {
        &self.commands[id.index()]
    }

    /// Nodes that depend on `id`.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        &self.children[id.index()]
    }

    /// Nodes `id` depends on, in dep order.
    pub fn parents_of(&self, id: NodeId) -> &[NodeId] {
        &self.parents[id.index()]
    }

    /// True if the node's staleness check always answers "must execute".
    pub fn is_phony(&self, id: NodeId) -> bool {
        self.phony.contains(&id)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Encode into the cache byte layout: version, commands, children,
    /// parents, name index, phony set (flattened), names.
    pub fn encode(&self) -> MakuResult<Vec<u8>> {
        let mut out = Vec::with_capacity(4096);

        GRAPH_FORMAT_VERSION.encode(&mut out)?;
        self.commands.encode(&mut out)?;
        self.children.encode(&mut out)?;
        self.parents.encode(&mut out)?;
        self.ids.encode(&mut out)?;
        // set order is unspecified and not observable after reload
        let phony: Vec<NodeId> = self.phony.iter().copied().collect();
        phony.encode(&mut out)?;
        self.names.encode(&mut out)?;

        Ok(out)
    }

    /// Decode a cache buffer, validating version, lengths, and id ranges.
    pub fn decode(bytes: &[u8]) -> MakuResult<Graph> {
        let mut cur = Cursor::new(bytes);

        let version = u32::decode(&mut cur)?;
        if version != GRAPH_FORMAT_VERSION {
            return Err(MakuError::CacheVersionMismatch {
                found: version,
                expected: GRAPH_FORMAT_VERSION,
            });
        }

        let commands = Vec::<Vec<String>>::decode(&mut cur)?;
        let children = Vec::<Vec<NodeId>>::decode(&mut cur)?;
        let parents = Vec::<Vec<NodeId>>::decode(&mut cur)?;
        let ids = HashMap::<String, NodeId>::decode(&mut cur)?;
        let phony_list = Vec::<NodeId>::decode(&mut cur)?;
        let names = Vec::<String>::decode(&mut cur)?;
        cur.finish()?;

        let n = commands.len();
        if children.len() != n || parents.len() != n || names.len() != n || ids.len() != n {
            return Err(MakuError::SizeMismatch);
        }

        let out_of_range = children
            .iter()
            .flatten()
            .chain(parents.iter().flatten())
            .chain(phony_list.iter())
            .chain(ids.values())
            .any(|id| id.index() >= n);
        if out_of_range {
            return Err(MakuError::CacheCorrupt("node id out of range".to_string()));
        }

        Ok(Graph {
            commands,
            children,
            parents,
            ids,
            phony: phony_list.into_iter().collect(),
            names,
        })
    }
}
