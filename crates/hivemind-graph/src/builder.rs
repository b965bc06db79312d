//! The two-pass builder and incremental patcher.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use hivemind_core::{CancellationToken, Edge, Note, NoteId};
use hivemind_db::{Database, NodeRecord};
use hivemind_parse::extract_wikilinks;
use hivemind_template::TemplateRegistry;

use crate::graph::{GraphNode, VaultGraph};
use crate::infer::{infer_relationship_type, GENERIC_RELATED};
use crate::GraphError;

/// Counters reported after a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub nodes: usize,
    pub edges: usize,
    /// Files parsed but not admitted (no frontmatter id).
    pub skipped: usize,
    /// Link targets that resolved to no known note.
    pub dangling_links: usize,
}

/// Sole owner of in-memory graph mutation. Every durable write flows
/// through the storage engine first; the projection is only updated
/// after the store accepts the write, and can be rebuilt from the store
/// at any time via [`GraphBuilder::reload_from_store`].
pub struct GraphBuilder {
    registry: Arc<TemplateRegistry>,
    db: Arc<Database>,
    graph: RwLock<VaultGraph>,
}

impl GraphBuilder {
    pub fn new(registry: Arc<TemplateRegistry>, db: Arc<Database>) -> Self {
        Self {
            registry,
            db,
            graph: RwLock::new(VaultGraph::new()),
        }
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    /// Read access to the projection for search and tool handlers.
    pub fn graph(&self) -> RwLockReadGuard<'_, VaultGraph> {
        self.graph.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn graph_mut(&self) -> std::sync::RwLockWriteGuard<'_, VaultGraph> {
        self.graph.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Two-pass initial build over parsed notes.
    ///
    /// Pass 1 admits every note with an id as a node; pass 2 resolves
    /// wikilinks and emits typed edges. Unadmitted notes are counted and
    /// skipped, never fatal. Re-running over an unchanged vault yields
    /// the same node and edge sets.
    pub fn initial_build(
        &self,
        notes: &[Note],
        cancel: &CancellationToken,
    ) -> Result<BuildStats, GraphError> {
        let mut stats = BuildStats::default();
        let mut graph = self.graph_mut();

        // Pass 1: nodes and lookup indexes.
        let mut admitted: Vec<NoteId> = Vec::with_capacity(notes.len());
        for note in notes {
            if cancel.is_cancelled() {
                return Err(GraphError::Cancelled);
            }
            let Some(id) = &note.id else {
                debug!(path = %note.path.display(), "note has no id, skipping");
                stats.skipped += 1;
                continue;
            };
            let record = NodeRecord::from_note(note)?;
            self.db.upsert_node(&record)?;
            graph.insert_node(GraphNode {
                record,
                links: note.links.clone(),
            });
            admitted.push(id.clone());
        }
        stats.nodes = graph.node_count();

        // Pass 2: edges.
        for id in &admitted {
            if cancel.is_cancelled() {
                return Err(GraphError::Cancelled);
            }
            stats.dangling_links += self.emit_links(&mut graph, id)?;
        }
        stats.edges = graph.edge_count();

        info!(
            nodes = stats.nodes,
            edges = stats.edges,
            skipped = stats.skipped,
            dangling = stats.dangling_links,
            "initial graph build complete"
        );
        Ok(stats)
    }

    /// Resolve one node's outbound links and emit edges. Returns the
    /// count of dangling links. Idempotent: duplicate triples are
    /// no-ops, and a generic `related` edge is suppressed whenever any
    /// edge already joins the pair in that direction.
    fn emit_links(&self, graph: &mut VaultGraph, source_id: &NoteId) -> Result<usize, GraphError> {
        let Some(source) = graph.get(source_id) else {
            return Ok(0);
        };
        let source_type = source.record.entity_type.clone();
        let links = source.links.clone();

        let mut dangling = 0usize;
        for link in &links {
            let Some(target_id) = graph.resolve(&link.target) else {
                debug!(source = %source_id, target = %link.target, "dangling link");
                dangling += 1;
                continue;
            };
            let Some(target) = graph.get(&target_id) else {
                continue;
            };
            let target_type = target.record.entity_type.clone();

            let inferred = infer_relationship_type(&self.registry, &source_type, &target_type);
            if inferred.type_id == GENERIC_RELATED
                && graph.has_edge_between(source_id, &target_id)
            {
                continue;
            }

            let edge = Edge::new(source_id.clone(), target_id.clone(), inferred.type_id);
            self.db.insert_edge(&edge)?;
            graph.insert_edge(edge);

            if let Some(reverse_id) = inferred.reverse_id {
                let reverse = Edge::new(target_id.clone(), source_id.clone(), reverse_id);
                self.db.insert_edge(&reverse)?;
                graph.insert_edge(reverse);
            }
        }
        Ok(dangling)
    }

    /// Handle a `created` event for an already-parsed note.
    ///
    /// Besides inserting the node and its edges, notes whose links
    /// mention the newcomer (by id or by title) are re-resolved so their
    /// previously dangling references materialise.
    pub fn apply_created(&self, note: &Note) -> Result<(), GraphError> {
        let Some(id) = &note.id else {
            debug!(path = %note.path.display(), "created note has no id, ignoring");
            return Ok(());
        };
        let record = NodeRecord::from_note(note)?;
        let title_folded = record.title.to_lowercase();

        let mut graph = self.graph_mut();
        self.db.upsert_node(&record)?;
        graph.insert_node(GraphNode {
            record,
            links: note.links.clone(),
        });
        self.emit_links(&mut graph, id)?;

        // Revisit notes that referenced the newcomer before it existed.
        let referrers: Vec<NoteId> = graph
            .nodes()
            .filter(|n| n.record.id != *id)
            .filter(|n| {
                n.links.iter().any(|l| {
                    let t = l.target.trim();
                    t == id.as_str() || t.to_lowercase() == title_folded
                })
            })
            .map(|n| n.record.id.clone())
            .collect();
        for referrer in referrers {
            self.emit_links(&mut graph, &referrer)?;
        }
        Ok(())
    }

    /// Handle a `modified` event. An id change is a delete of the old
    /// identity followed by a create; otherwise the node record is
    /// replaced and its outbound edges recomputed. When the entity type
    /// changed, the sources of its inbound edges are recomputed too.
    pub fn apply_modified(&self, note: &Note) -> Result<(), GraphError> {
        let path_str = note.path.display().to_string();
        let previous = {
            let graph = self.graph();
            let found = graph
                .nodes()
                .find(|n| n.record.path == path_str)
                .map(|n| (n.record.id.clone(), n.record.entity_type.clone()));
            found
        };

        let Some((old_id, old_type)) = previous else {
            // Never indexed (or previously unadmitted): treat as create.
            return self.apply_created(note);
        };

        if note.id.as_ref() != Some(&old_id) {
            self.remove_node(&old_id)?;
            return self.apply_created(note);
        }

        let record = NodeRecord::from_note(note)?;
        let type_changed = record.entity_type != old_type;

        let mut graph = self.graph_mut();
        self.db.upsert_node(&record)?;
        graph.insert_node(GraphNode {
            record,
            links: note.links.clone(),
        });

        // Inbound edges were inferred against the old type. The set has
        // to be captured before the outbound drop below: a bidirectional
        // pair's inbound half is removed there as the paired reverse.
        let inbound_sources = if type_changed {
            graph.inbound_sources(&old_id)
        } else {
            HashSet::new()
        };

        self.drop_outbound_edges(&mut graph, &old_id)?;
        self.emit_links(&mut graph, &old_id)?;

        for source in inbound_sources {
            self.drop_outbound_edges(&mut graph, &source)?;
            self.emit_links(&mut graph, &source)?;
        }
        Ok(())
    }

    /// Drop a node's outbound edges together with the paired reverse
    /// edges of any bidirectional type, keeping the exists-iff invariant
    /// intact before re-emission.
    fn drop_outbound_edges(
        &self,
        graph: &mut VaultGraph,
        id: &NoteId,
    ) -> Result<(), GraphError> {
        let outbound: Vec<Edge> = graph
            .edges()
            .filter(|e| e.source == *id)
            .cloned()
            .collect();
        self.db.delete_edges_from(id)?;
        graph.remove_edges_from(id);
        for edge in outbound {
            if let Some(reverse_id) = self.reverse_of(&edge.type_id) {
                self.db.delete_edge(&edge.target, id, &reverse_id)?;
                graph.remove_edge(&edge.target, id, &reverse_id);
            }
        }
        Ok(())
    }

    /// The declared reverse of a bidirectional relationship type, with
    /// the built-in pairs covering the template-less case.
    fn reverse_of(&self, type_id: &str) -> Option<String> {
        match self.registry.get_relationship_type(type_id) {
            Ok(rt) if rt.bidirectional => rt.reverse_id.clone(),
            Ok(_) => None,
            Err(hivemind_template::TemplateError::NoActiveTemplate) => match type_id {
                "knows" | "connected_to" => Some(type_id.to_string()),
                "located_in" => Some("has_inhabitant".to_string()),
                "has_inhabitant" => Some("located_in".to_string()),
                _ => None,
            },
            Err(_) => None,
        }
    }

    /// Handle a `deleted` event by path.
    pub fn apply_deleted(&self, path: &Path) -> Result<(), GraphError> {
        let path_str = path.display().to_string();
        let id = {
            let graph = self.graph();
            let found = graph
                .nodes()
                .find(|n| n.record.path == path_str)
                .map(|n| n.record.id.clone());
            found
        };
        let id = match id {
            Some(id) => Some(id),
            // Projection may be cold (fresh restore); fall back to the
            // store's path index.
            None => self.db.node_id_for_path(&path_str)?,
        };
        let Some(id) = id else {
            debug!(path = %path.display(), "delete event for unindexed path");
            return Ok(());
        };
        self.remove_node(&id)
    }

    fn remove_node(&self, id: &NoteId) -> Result<(), GraphError> {
        let mut graph = self.graph_mut();
        self.db.delete_node(id)?;
        graph.remove_node(id);
        debug!(%id, "removed node and touching edges");
        Ok(())
    }

    /// Rebuild the projection from the store after an external mutation
    /// or a write failure left it suspect.
    pub fn reload_from_store(&self) -> Result<(), GraphError> {
        let records = self.db.all_nodes()?;
        let edges = self.db.all_edges()?;
        let mut graph = self.graph_mut();
        graph.clear();
        for record in records {
            let links = extract_wikilinks(&record.body);
            graph.insert_node(GraphNode { record, links });
        }
        for edge in edges {
            graph.insert_edge(edge);
        }
        warn!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph projection reloaded from store"
        );
        Ok(())
    }

    /// Node ids currently admitted; test and diagnostics helper.
    pub fn node_ids(&self) -> HashSet<NoteId> {
        self.graph().nodes().map(|n| n.record.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivemind_core::{CancellationToken, FileStats};
    use hivemind_parse::parse_source;
    use hivemind_template::{worldbuilding_template, TemplateSource};
    use std::path::PathBuf;

    fn builder() -> GraphBuilder {
        let mut registry = TemplateRegistry::new();
        registry
            .register(worldbuilding_template(), TemplateSource::Builtin)
            .unwrap();
        registry.activate("worldbuilding").unwrap();
        let db = Arc::new(Database::init_with_schema().unwrap());
        GraphBuilder::new(Arc::new(registry), db)
    }

    fn note(path: &str, text: &str) -> Note {
        parse_source(&PathBuf::from(path), text, FileStats::default()).unwrap()
    }

    fn character(id: &str, body: &str) -> Note {
        note(
            &format!("/vault/{id}.md"),
            &format!("---\nid: {id}\ntype: character\nname: {id}\n---\n{body}\n"),
        )
    }

    fn location(id: &str, body: &str) -> Note {
        note(
            &format!("/vault/{id}.md"),
            &format!("---\nid: {id}\ntype: location\nname: {id}\n---\n{body}\n"),
        )
    }

    fn edge_set(b: &GraphBuilder) -> HashSet<(String, String, String)> {
        b.graph()
            .edges()
            .map(|e| {
                (
                    e.source.to_string(),
                    e.target.to_string(),
                    e.type_id.clone(),
                )
            })
            .collect()
    }

    fn no_cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[test]
    fn bidirectional_edges_and_no_generic_related() {
        let b = builder();
        let notes = vec![character("alice", "[[bob]]"), character("bob", "")];
        let stats = b.initial_build(&notes, &no_cancel()).unwrap();
        assert_eq!(stats.nodes, 2);

        let edges = edge_set(&b);
        assert!(edges.contains(&("alice".into(), "bob".into(), "knows".into())));
        assert!(edges.contains(&("bob".into(), "alice".into(), "knows".into())));
        assert!(!edges.iter().any(|(_, _, k)| k == "related"));
        assert_eq!(edges.len(), 2);

        // Storage agrees with the projection.
        assert_eq!(b.db().all_edges().unwrap().len(), 2);
    }

    #[test]
    fn inference_prefers_specific_types() {
        let b = builder();
        let notes = vec![character("alice", "[[castle]]"), location("castle", "")];
        b.initial_build(&notes, &no_cancel()).unwrap();

        let edges = edge_set(&b);
        assert!(edges.contains(&("alice".into(), "castle".into(), "located_in".into())));
        assert!(edges.contains(&("castle".into(), "alice".into(), "has_inhabitant".into())));
        assert!(!edges.iter().any(|(_, _, k)| k == "related"));
    }

    #[test]
    fn links_resolve_by_case_folded_title() {
        let b = builder();
        let notes = vec![
            note(
                "/vault/alice.md",
                "---\nid: alice\ntype: character\nname: Alice\n---\n[[The Great Castle]]\n",
            ),
            note(
                "/vault/castle.md",
                "---\nid: castle\ntype: location\nname: The GREAT Castle\n---\n",
            ),
        ];
        let stats = b.initial_build(&notes, &no_cancel()).unwrap();
        assert_eq!(stats.dangling_links, 0);
        assert!(edge_set(&b).contains(&("alice".into(), "castle".into(), "located_in".into())));
    }

    #[test]
    fn dangling_links_are_counted_not_fatal() {
        let b = builder();
        let notes = vec![character("alice", "[[nobody]] and [[nothing]]")];
        let stats = b.initial_build(&notes, &no_cancel()).unwrap();
        assert_eq!(stats.dangling_links, 2);
        assert_eq!(stats.edges, 0);
    }

    #[test]
    fn notes_without_id_are_skipped() {
        let b = builder();
        let notes = vec![
            character("alice", ""),
            note("/vault/scratch.md", "no frontmatter at all\n"),
        ];
        let stats = b.initial_build(&notes, &no_cancel()).unwrap();
        assert_eq!(stats.nodes, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn initial_build_is_idempotent() {
        let b = builder();
        let notes = vec![
            character("alice", "[[bob]] [[castle]]"),
            character("bob", "[[castle]]"),
            location("castle", ""),
        ];
        b.initial_build(&notes, &no_cancel()).unwrap();
        let first_edges = edge_set(&b);
        let first_nodes = b.node_ids();

        b.initial_build(&notes, &no_cancel()).unwrap();
        assert_eq!(edge_set(&b), first_edges);
        assert_eq!(b.node_ids(), first_nodes);
        assert_eq!(b.db().all_edges().unwrap().len(), first_edges.len());
    }

    #[test]
    fn incremental_relink_on_edit() {
        let b = builder();
        let notes = vec![character("alice", "[[castle]]"), location("castle", "")];
        b.initial_build(&notes, &no_cancel()).unwrap();

        // alice now points at a new location instead.
        b.apply_created(&location("village", "")).unwrap();
        b.apply_modified(&character("alice", "[[village]]")).unwrap();

        let edges = edge_set(&b);
        assert!(edges.contains(&("alice".into(), "village".into(), "located_in".into())));
        assert!(edges.contains(&("village".into(), "alice".into(), "has_inhabitant".into())));
        assert!(!edges.contains(&("alice".into(), "castle".into(), "located_in".into())));
        assert!(!edges.contains(&("castle".into(), "alice".into(), "has_inhabitant".into())));
    }

    #[test]
    fn created_note_resolves_previously_dangling_links() {
        let b = builder();
        b.initial_build(&[character("alice", "[[bob]]")], &no_cancel())
            .unwrap();
        assert_eq!(b.graph().edge_count(), 0);

        b.apply_created(&character("bob", "")).unwrap();
        let edges = edge_set(&b);
        assert!(edges.contains(&("alice".into(), "bob".into(), "knows".into())));
        assert!(edges.contains(&("bob".into(), "alice".into(), "knows".into())));
    }

    #[test]
    fn id_change_is_delete_plus_create() {
        let b = builder();
        b.initial_build(
            &[character("alice", ""), character("bob", "[[alice]]")],
            &no_cancel(),
        )
        .unwrap();

        // alice.md now declares a different id.
        let renamed = note(
            "/vault/alice.md",
            "---\nid: alicia\ntype: character\nname: alicia\n---\n",
        );
        b.apply_modified(&renamed).unwrap();

        assert!(!b.node_ids().contains(&NoteId::from("alice")));
        assert!(b.node_ids().contains(&NoteId::from("alicia")));
        // bob's link to the vanished id is dangling again.
        assert!(!edge_set(&b)
            .iter()
            .any(|(s, t, _)| s == "bob" && t == "alice"));
    }

    #[test]
    fn type_change_recomputes_inbound_sources() {
        let b = builder();
        b.initial_build(
            &[character("alice", "[[shifty]]"), character("shifty", "")],
            &no_cancel(),
        )
        .unwrap();
        assert!(edge_set(&b).contains(&("alice".into(), "shifty".into(), "knows".into())));

        // shifty.md becomes a location; alice's edge must be re-inferred.
        b.apply_modified(&location("shifty", "")).unwrap();
        let edges = edge_set(&b);
        assert!(edges.contains(&("alice".into(), "shifty".into(), "located_in".into())));
        assert!(!edges.iter().any(|(_, _, k)| k == "knows"));
    }

    #[test]
    fn deletion_removes_node_and_inbound_edges() {
        let b = builder();
        b.initial_build(
            &[character("alice", "[[bob]]"), character("bob", "")],
            &no_cancel(),
        )
        .unwrap();

        b.apply_deleted(&PathBuf::from("/vault/bob.md")).unwrap();
        assert!(!b.node_ids().contains(&NoteId::from("bob")));
        assert_eq!(b.graph().edge_count(), 0);
        assert!(b.db().all_edges().unwrap().is_empty());
    }

    #[test]
    fn cancellation_aborts_the_build() {
        let b = builder();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = b
            .initial_build(&[character("alice", "")], &cancel)
            .unwrap_err();
        assert!(matches!(err, GraphError::Cancelled));
    }

    #[test]
    fn reload_from_store_rebuilds_the_projection() {
        let b = builder();
        b.initial_build(
            &[character("alice", "[[bob]]"), character("bob", "")],
            &no_cancel(),
        )
        .unwrap();
        let edges_before = edge_set(&b);

        b.reload_from_store().unwrap();
        assert_eq!(edge_set(&b), edges_before);
        assert_eq!(b.node_ids().len(), 2);
    }
}
