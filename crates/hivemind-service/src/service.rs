//! Long-running indexing service: initial build, watch loop, tool
//! surface wiring.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

use hivemind_core::{CancellationToken, ChangeKind, Note, VaultEvent};
use hivemind_db::{store_path, Database, OpenState};
use hivemind_graph::{BuildStats, GraphBuilder};
use hivemind_io::{scan_vault, start_watcher, ScanOptions, WatcherConfig};
use hivemind_mcp::{Reindex, ToolDispatcher, ToolError};
use hivemind_parse::parse_file;
use hivemind_rag::SearchEngine;
use hivemind_template::{FolderMapper, Template, TemplateRegistry};

use crate::config::{build_registry, Config, IndexingStrategy};

/// How often the dirty store is snapshotted to disk during watching.
const PERSIST_INTERVAL: Duration = Duration::from_secs(5);
/// Cap on the indexer worker pool.
const MAX_WORKERS: usize = 4;

/// The assembled core: registry, store, builder, search, ready to build
/// and serve.
pub struct IndexerService {
    config: Config,
    registry: Arc<TemplateRegistry>,
    db: Arc<Database>,
    builder: Arc<GraphBuilder>,
    search: Arc<SearchEngine>,
    store: PathBuf,
    open_state: OpenState,
}

impl IndexerService {
    /// Wire the components for a vault: registry from config (+ optional
    /// standalone template), store opened at `<vault>/.hivemind/vault.db`.
    pub fn bootstrap(
        config: Config,
        standalone: Option<Template>,
    ) -> Result<Self, hivemind_error::Error> {
        let registry = Arc::new(build_registry(&config, standalone)?);
        let store = store_path(&config.vault.path);
        let (db, open_state) = Database::open(&store).map_err(hivemind_error::Error::from)?;
        let db = Arc::new(db);
        let builder = Arc::new(GraphBuilder::new(Arc::clone(&registry), Arc::clone(&db)));
        let search = Arc::new(SearchEngine::new(Arc::clone(&db)));
        Ok(Self {
            config,
            registry,
            db,
            builder,
            search,
            store,
            open_state,
        })
    }

    pub fn registry(&self) -> &Arc<TemplateRegistry> {
        &self.registry
    }

    pub fn vault_root(&self) -> &std::path::Path {
        &self.config.vault.path
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn builder(&self) -> &Arc<GraphBuilder> {
        &self.builder
    }

    pub fn search(&self) -> &Arc<SearchEngine> {
        &self.search
    }

    /// The folder mapper for the active template's rules.
    pub fn folder_mapper(&self) -> Result<FolderMapper, hivemind_error::Error> {
        let rules = self.registry.folder_mappings()?;
        Ok(FolderMapper::new(rules, None)?)
    }

    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            excludes: self.config.vault.exclude.clone(),
        }
    }

    /// Scan, parse, and build the graph; persist the store at the end.
    ///
    /// `full` strategy (or a fresh store) clears everything first; the
    /// incremental path re-admits files over the restored rows, which is
    /// idempotent. Cancellable between files; a cancelled build leaves a
    /// consistent store and can simply be re-run.
    pub fn initial_build(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BuildStats, hivemind_error::Error> {
        if self.config.indexing.strategy == IndexingStrategy::Full
            && self.open_state == OpenState::Restored
        {
            info!("full strategy: clearing restored store");
            self.db.clear().map_err(hivemind_error::Error::from)?;
            self.builder.reload_from_store()?;
        } else if self.open_state == OpenState::Restored {
            self.builder.reload_from_store()?;
        }

        let files = scan_vault(&self.config.vault.path, &self.scan_options())?;
        info!(files = files.len(), "scanning vault");

        // Files can vanish while the service is down; restored rows with
        // no backing file are pruned before re-admission.
        if self.open_state == OpenState::Restored {
            let scanned: std::collections::HashSet<String> =
                files.iter().map(|p| p.display().to_string()).collect();
            for record in self.db.all_nodes().map_err(hivemind_error::Error::from)? {
                if !scanned.contains(&record.path) {
                    self.builder
                        .apply_deleted(std::path::Path::new(&record.path))?;
                }
            }
        }

        let batch_size = self.config.indexing.batch_size.max(1);
        let mut notes: Vec<Note> = Vec::with_capacity(files.len());
        for chunk in files.chunks(batch_size) {
            if cancel.is_cancelled() {
                return Err(hivemind_graph::GraphError::Cancelled.into());
            }
            for path in chunk {
                match parse_file(path) {
                    Ok(note) => notes.push(note),
                    Err(e) => {
                        warn!(path = %path.display(), "skipping unparseable file: {e}");
                    }
                }
            }
        }

        let stats = self.builder.initial_build(&notes, cancel)?;
        self.db
            .persist(&self.store)
            .map_err(hivemind_error::Error::from)?;
        Ok(stats)
    }

    /// Apply one debounced change event. Parse failures skip the file
    /// with a diagnostic; they never stop the loop.
    pub fn handle_event(&self, event: &VaultEvent) -> Result<(), hivemind_error::Error> {
        match event.kind {
            ChangeKind::Created => match parse_file(&event.path) {
                Ok(note) => self.builder.apply_created(&note)?,
                Err(e) => warn!(path = %event.path.display(), "skipping created file: {e}"),
            },
            ChangeKind::Modified => match parse_file(&event.path) {
                Ok(note) => self.builder.apply_modified(&note)?,
                Err(e) => warn!(path = %event.path.display(), "skipping modified file: {e}"),
            },
            ChangeKind::Deleted => self.builder.apply_deleted(&event.path)?,
        }
        Ok(())
    }

    /// Build the tool dispatcher, wired with a rebuild hook into this
    /// service's pipeline.
    pub fn dispatcher(self: &Arc<Self>) -> Result<ToolDispatcher, ToolError> {
        let hook: Arc<dyn Reindex> = Arc::new(RebuildHook {
            service: Arc::clone(self),
        });
        ToolDispatcher::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.db),
            Arc::clone(&self.search),
            Some(hook),
        )
    }

    /// Watch the vault and keep the index consistent with disk until
    /// cancelled. Events for the same path stay ordered (sticky routing
    /// to one worker); different paths proceed in parallel across the
    /// pool.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        if !self.config.vault.watch_for_changes {
            info!("watching disabled; initial index stands until restart");
            cancel.cancelled().await;
            return;
        }

        let (events_tx, mut events_rx) = broadcast::channel::<VaultEvent>(1024);
        let watcher_config = WatcherConfig {
            debounce: Duration::from_millis(self.config.vault.debounce_ms),
            ..WatcherConfig::default()
        };
        let _watcher = match start_watcher(
            self.config.vault.path.clone(),
            watcher_config,
            events_tx,
        ) {
            Ok(handle) => handle,
            Err(e) => {
                error!("cannot watch vault: {e}");
                return;
            }
        };

        // Worker pool with sticky per-path routing.
        let worker_count = num_cpus::get().clamp(1, MAX_WORKERS);
        let dirty = Arc::new(AtomicBool::new(false));
        let mut senders = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (tx, mut rx) = mpsc::channel::<VaultEvent>(256);
            senders.push(tx);
            let service = Arc::clone(&self);
            let dirty = Arc::clone(&dirty);
            workers.push(tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let service = Arc::clone(&service);
                    let result = tokio::task::spawn_blocking(move || {
                        service.handle_event(&event)
                    })
                    .await;
                    match result {
                        Ok(Ok(())) => dirty.store(true, Ordering::Relaxed),
                        Ok(Err(e)) => warn!("event handling failed: {e}"),
                        Err(e) => error!("indexer worker panicked: {e}"),
                    }
                }
            }));
        }

        let mut persist_tick = tokio::time::interval(PERSIST_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = persist_tick.tick() => {
                    if dirty.swap(false, Ordering::Relaxed) {
                        let service = Arc::clone(&self);
                        let result = tokio::task::spawn_blocking(move || {
                            service.db.persist(&service.store)
                        })
                        .await;
                        if let Ok(Err(e)) = result {
                            error!("periodic persist failed: {e}");
                        }
                    }
                }
                event = events_rx.recv() => {
                    match event {
                        Ok(event) => {
                            let slot = path_slot(&event.path, worker_count);
                            if senders[slot].send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            // Coalescing upstream makes lag survivable; a
                            // rebuild resyncs if anything was truly lost.
                            warn!(missed = n, "event stream lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        drop(senders);
        for worker in workers {
            let _ = worker.await;
        }
        if dirty.load(Ordering::Relaxed) {
            if let Err(e) = self.db.persist(&self.store) {
                error!("final persist failed: {e}");
            }
        }
        info!("indexer service stopped");
    }
}

fn path_slot(path: &std::path::Path, workers: usize) -> usize {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    (hasher.finish() as usize) % workers
}

/// `rebuild_index` handler: drop the store, rebuild from disk, persist.
struct RebuildHook {
    service: Arc<IndexerService>,
}

impl Reindex for RebuildHook {
    fn rebuild(&self) -> Result<serde_json::Value, ToolError> {
        let rebuild = || -> Result<BuildStats, hivemind_error::Error> {
            let service = &self.service;
            service.db.clear().map_err(hivemind_error::Error::from)?;
            service.builder.reload_from_store()?;

            let files = scan_vault(&service.config.vault.path, &service.scan_options())?;
            let mut notes = Vec::with_capacity(files.len());
            for path in &files {
                match parse_file(path) {
                    Ok(note) => notes.push(note),
                    Err(e) => warn!(path = %path.display(), "skipping unparseable file: {e}"),
                }
            }
            let cancel = hivemind_core::CancellationToken::new();
            let stats = service.builder.initial_build(&notes, &cancel)?;
            service
                .db
                .persist(&service.store)
                .map_err(hivemind_error::Error::from)?;
            Ok(stats)
        };
        let stats = rebuild().map_err(|e| ToolError::Rebuild(e.to_string()))?;
        Ok(json!({
            "rebuilt": true,
            "nodes": stats.nodes,
            "edges": stats.edges,
            "skipped": stats.skipped,
            "danglingLinks": stats.dangling_links,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivemind_core::CancellationToken;
    use std::path::Path;

    fn write(root: &Path, rel: &str, text: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    fn seeded_vault() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "Characters/alice.md",
            "---\nid: alice\ntype: character\nname: Alice\n---\nShe knows [[bob]].\n",
        );
        write(
            root,
            "Characters/bob.md",
            "---\nid: bob\ntype: character\nname: Bob\n---\n",
        );
        write(
            root,
            "Locations/castle.md",
            "---\nid: castle\ntype: location\nname: The Castle\n---\n",
        );
        dir
    }

    fn service_for(dir: &tempfile::TempDir) -> Arc<IndexerService> {
        let config = Config::for_vault(dir.path());
        Arc::new(IndexerService::bootstrap(config, None).unwrap())
    }

    fn no_cancel() -> CancellationToken {
        CancellationToken::new()
    }

    #[test]
    fn builds_and_persists_a_seeded_vault() {
        let dir = seeded_vault();
        let service = service_for(&dir);
        let stats = service.initial_build(&no_cancel()).unwrap();
        assert_eq!(stats.nodes, 3);
        assert_eq!(stats.edges, 2); // knows + reverse knows
        assert!(dir.path().join(".hivemind/vault.db").is_file());
    }

    #[test]
    fn restart_restores_and_stays_idempotent() {
        let dir = seeded_vault();
        {
            let service = service_for(&dir);
            service.initial_build(&no_cancel()).unwrap();
        }
        // Second bootstrap restores the snapshot and re-indexes.
        let service = service_for(&dir);
        let stats = service.initial_build(&no_cancel()).unwrap();
        assert_eq!(stats.nodes, 3);
        assert_eq!(service.db().all_edges().unwrap().len(), 2);
    }

    #[test]
    fn events_keep_the_index_consistent() {
        let dir = seeded_vault();
        let service = service_for(&dir);
        service.initial_build(&no_cancel()).unwrap();

        // alice moves to the castle.
        write(
            dir.path(),
            "Characters/alice.md",
            "---\nid: alice\ntype: character\nname: Alice\n---\nLives in [[The Castle]].\n",
        );
        service
            .handle_event(&VaultEvent::new(
                dir.path().join("Characters/alice.md"),
                ChangeKind::Modified,
            ))
            .unwrap();

        let edges: Vec<_> = service
            .db()
            .all_edges()
            .unwrap()
            .into_iter()
            .map(|e| (e.source.to_string(), e.target.to_string(), e.type_id))
            .collect();
        assert!(edges.contains(&("alice".into(), "castle".into(), "located_in".into())));
        assert!(!edges
            .iter()
            .any(|(s, t, _)| s == "alice" && t == "bob"));

        // bob leaves the vault.
        std::fs::remove_file(dir.path().join("Characters/bob.md")).unwrap();
        service
            .handle_event(&VaultEvent::new(
                dir.path().join("Characters/bob.md"),
                ChangeKind::Deleted,
            ))
            .unwrap();
        assert!(service
            .db()
            .get_node(&hivemind_core::NoteId::from("bob"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn dispatcher_serves_tools_and_rebuilds() {
        let dir = seeded_vault();
        let service = service_for(&dir);
        service.initial_build(&no_cancel()).unwrap();
        let dispatcher = service.dispatcher().unwrap();

        let stats = dispatcher
            .dispatch("get_vault_stats", &json!({}))
            .unwrap();
        assert_eq!(stats["nodes"], 3);

        let result = dispatcher
            .dispatch("query_character", &json!({ "id": "alice" }))
            .unwrap();
        // alice→bob plus the reverse bob→alice, both typed `knows`.
        assert_eq!(result["relationships"]["knows"].as_array().unwrap().len(), 2);

        let rebuilt = dispatcher.dispatch("rebuild_index", &json!({})).unwrap();
        assert_eq!(rebuilt["nodes"], 3);
        assert_eq!(rebuilt["edges"], 2);
    }

    #[test]
    fn cancellation_aborts_the_initial_build() {
        let dir = seeded_vault();
        let service = service_for(&dir);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(service.initial_build(&cancel).is_err());
    }
}
