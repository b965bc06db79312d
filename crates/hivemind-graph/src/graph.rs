//! The in-memory projection: node arena, edge arena, adjacency.
//!
//! Nodes and edges form cycles, so nothing here owns anything else;
//! every cross-reference is an id, and deletions remove by id only.
//! Truth lives in storage; this structure is a cache the search and
//! tool layers read under a lock held by the builder.

use std::collections::{HashMap, HashSet};

use hivemind_core::{Edge, NoteId, Wikilink};
use hivemind_db::NodeRecord;

/// A node plus the outbound links needed to recompute its edges.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub record: NodeRecord,
    pub links: Vec<Wikilink>,
}

type EdgeKey = (NoteId, NoteId, String);

/// Node table, edge table, adjacency map, and the link-resolution
/// indexes (by id, by case-folded title).
#[derive(Debug, Default)]
pub struct VaultGraph {
    nodes: HashMap<NoteId, GraphNode>,
    edges: HashMap<EdgeKey, Edge>,
    adjacency: HashMap<NoteId, HashSet<NoteId>>,
    title_index: HashMap<String, NoteId>,
}

impl VaultGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &NoteId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    pub fn neighbors(&self, id: &NoteId) -> Option<&HashSet<NoteId>> {
        self.adjacency.get(id)
    }

    /// Insert or replace a node and refresh the title index. A title
    /// already claimed by another note is overwritten: last write wins.
    pub fn insert_node(&mut self, node: GraphNode) {
        let id = node.record.id.clone();
        if let Some(previous) = self.nodes.get(&id) {
            let old_folded = previous.record.title.to_lowercase();
            if self.title_index.get(&old_folded) == Some(&id) {
                self.title_index.remove(&old_folded);
            }
        }
        self.title_index
            .insert(node.record.title.to_lowercase(), id.clone());
        self.nodes.insert(id, node);
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: &NoteId) -> Option<GraphNode> {
        let node = self.nodes.remove(id)?;
        let folded = node.record.title.to_lowercase();
        if self.title_index.get(&folded) == Some(id) {
            self.title_index.remove(&folded);
        }
        self.remove_edges_touching(id);
        self.adjacency.remove(id);
        Some(node)
    }

    /// Resolve a wikilink target: exact id match first, then case-folded
    /// title. Surrounding whitespace is ignored.
    pub fn resolve(&self, target: &str) -> Option<NoteId> {
        let target = target.trim();
        let as_id = NoteId::from(target);
        if self.nodes.contains_key(&as_id) {
            return Some(as_id);
        }
        self.title_index.get(&target.to_lowercase()).cloned()
    }

    /// Insert an edge; a duplicate `(source, target, type)` triple is a
    /// no-op. Returns whether the edge was new.
    pub fn insert_edge(&mut self, edge: Edge) -> bool {
        let key = edge.key();
        if self.edges.contains_key(&key) {
            return false;
        }
        self.adjacency
            .entry(edge.source.clone())
            .or_default()
            .insert(edge.target.clone());
        self.adjacency
            .entry(edge.target.clone())
            .or_default()
            .insert(edge.source.clone());
        self.edges.insert(key, edge);
        true
    }

    /// Whether any edge `source -> target` exists, regardless of type.
    pub fn has_edge_between(&self, source: &NoteId, target: &NoteId) -> bool {
        self.edges
            .keys()
            .any(|(s, t, _)| s == source && t == target)
    }

    /// Drop one edge by its identity triple.
    pub fn remove_edge(&mut self, source: &NoteId, target: &NoteId, type_id: &str) {
        let key = (source.clone(), target.clone(), type_id.to_string());
        self.remove_edge_key(&key);
    }

    /// Drop every edge whose source is `id`. Edges pointing at `id`
    /// belong to other notes and stay.
    pub fn remove_edges_from(&mut self, id: &NoteId) {
        let keys: Vec<EdgeKey> = self
            .edges
            .keys()
            .filter(|(s, _, _)| s == id)
            .cloned()
            .collect();
        for key in keys {
            self.remove_edge_key(&key);
        }
    }

    /// Drop every edge with `id` at either end.
    pub fn remove_edges_touching(&mut self, id: &NoteId) {
        let keys: Vec<EdgeKey> = self
            .edges
            .keys()
            .filter(|(s, t, _)| s == id || t == id)
            .cloned()
            .collect();
        for key in keys {
            self.remove_edge_key(&key);
        }
    }

    /// Ids of nodes with an edge pointing at `id`.
    pub fn inbound_sources(&self, id: &NoteId) -> HashSet<NoteId> {
        self.edges
            .keys()
            .filter(|(_, t, _)| t == id)
            .map(|(s, _, _)| s.clone())
            .collect()
    }

    fn remove_edge_key(&mut self, key: &EdgeKey) {
        let (source, target, _) = key;
        self.edges.remove(key);
        // Adjacency holds only while some edge joins the pair, in either
        // direction.
        let still_joined = self
            .edges
            .keys()
            .any(|(s, t, _)| (s == source && t == target) || (s == target && t == source));
        if !still_joined {
            if let Some(set) = self.adjacency.get_mut(source) {
                set.remove(target);
            }
            if let Some(set) = self.adjacency.get_mut(target) {
                set.remove(source);
            }
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.adjacency.clear();
        self.title_index.clear();
    }
}
