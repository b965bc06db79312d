//! Live vault watching with debouncing and per-path coalescing.
//!
//! A single recursive watch on the vault root feeds an aggregator loop.
//! Raw notify events are normalized to [`VaultEvent`]s (renames become a
//! delete of the old path plus a create of the new one), coalesced per
//! path with kind precedence, and flushed once a path has been quiet for
//! the debounce window. Slow consumers therefore see at most one event
//! per path per window: latest state wins, nothing is dropped.

use std::collections::HashMap;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use notify::{Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;
use tracing::warn;

use hivemind_core::{ChangeKind, VaultEvent};

use crate::{is_markdown, IoError};

/// Watcher tuning; the debounce default tracks the config contract.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub debounce: Duration,
    /// Poll interval used when the native watcher cannot be created.
    pub poll_fallback: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            poll_fallback: Duration::from_secs(2),
        }
    }
}

/// Coalescing precedence: a deletion outranks a creation outranks a
/// modification for the same path within one window.
fn event_rank(kind: ChangeKind) -> u8 {
    match kind {
        ChangeKind::Deleted => 3,
        ChangeKind::Created => 2,
        ChangeKind::Modified => 1,
    }
}

/// Start a background watcher thread over the vault root, broadcasting
/// debounced [`VaultEvent`]s. Returns after the watch is registered so
/// callers cannot miss early events.
pub fn start_watcher(
    root: PathBuf,
    config: WatcherConfig,
    events_tx: broadcast::Sender<VaultEvent>,
) -> Result<thread::JoinHandle<()>, IoError> {
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), IoError>>();
    let debounce = config.debounce;

    let jh = thread::spawn(move || {
        // Raw notify events funnel into the aggregator via a std channel.
        let (notify_tx, notify_rx) = std::sync::mpsc::channel::<Result<Event, notify::Error>>();
        let forward = move |res: Result<Event, notify::Error>| {
            let _ = notify_tx.send(res);
        };

        let mut watcher: Box<dyn Watcher + Send> =
            match RecommendedWatcher::new(forward.clone(), Config::default()) {
                Ok(w) => Box::new(w),
                Err(e) => {
                    warn!("native watcher unavailable, falling back to polling: {e}");
                    let poll_config =
                        Config::default().with_poll_interval(config.poll_fallback);
                    match PollWatcher::new(forward, poll_config) {
                        Ok(w) => Box::new(w),
                        Err(e) => {
                            let _ = ready_tx.send(Err(IoError::CreateWatcher(e.to_string())));
                            return;
                        }
                    }
                }
            };

        if let Err(e) = watcher.watch(&root, RecursiveMode::Recursive) {
            let _ = ready_tx.send(Err(IoError::Watch {
                path: root.clone(),
                message: e.to_string(),
            }));
            return;
        }
        let _ = ready_tx.send(Ok(()));

        // Debounce/coalesce loop. The watcher must stay alive for the
        // duration, so it is owned by this frame.
        let mut pending: HashMap<PathBuf, (ChangeKind, Instant)> = HashMap::new();
        loop {
            match notify_rx.recv_timeout(debounce) {
                Ok(Ok(event)) => {
                    let now = Instant::now();
                    for (path, kind) in normalize(event) {
                        if !is_markdown(&path) {
                            continue;
                        }
                        pending
                            .entry(path)
                            .and_modify(|(existing, last)| {
                                if event_rank(kind) > event_rank(*existing) {
                                    *existing = kind;
                                }
                                *last = now;
                            })
                            .or_insert((kind, now));
                    }
                }
                Ok(Err(e)) => {
                    warn!("watcher error: {e}");
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }

            // Flush paths quiet for at least one debounce window.
            let now = Instant::now();
            let ready: Vec<PathBuf> = pending
                .iter()
                .filter(|(_, (_, last))| now.duration_since(*last) >= debounce)
                .map(|(p, _)| p.clone())
                .collect();
            for path in ready {
                if let Some((kind, _)) = pending.remove(&path) {
                    let _ = events_tx.send(VaultEvent::new(path, kind));
                }
            }
        }
        drop(watcher);
    });

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(jh),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(IoError::CreateWatcher("watcher thread died".to_string())),
    }
}

/// Map one notify event to zero or more normalized (path, kind) pairs.
/// Renames expand to deleted(old) + created(new).
fn normalize(event: Event) -> Vec<(PathBuf, ChangeKind)> {
    use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
    match &event.kind {
        EventKind::Create(CreateKind::Any | CreateKind::File | CreateKind::Folder) => event
            .paths
            .into_iter()
            .map(|p| (p, ChangeKind::Created))
            .collect(),
        EventKind::Remove(RemoveKind::Any | RemoveKind::File | RemoveKind::Folder) => event
            .paths
            .into_iter()
            .map(|p| (p, ChangeKind::Deleted))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if event.paths.len() >= 2 {
                let from = event.paths[0].clone();
                let to = event.paths[1].clone();
                vec![(from, ChangeKind::Deleted), (to, ChangeKind::Created)]
            } else {
                event
                    .paths
                    .into_iter()
                    .map(|p| (p, ChangeKind::Modified))
                    .collect()
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => event
            .paths
            .into_iter()
            .map(|p| (p, ChangeKind::Deleted))
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event
            .paths
            .into_iter()
            .map(|p| (p, ChangeKind::Created))
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .into_iter()
            .map(|p| (p, ChangeKind::Modified))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration as TokioDuration};

    async fn recv_event(
        rx: &mut broadcast::Receiver<VaultEvent>,
        expected_path: &PathBuf,
        expected_kind: ChangeKind,
        max_wait: TokioDuration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + max_wait;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match timeout(remaining, rx.recv()).await {
                Ok(Ok(evt)) => {
                    if &evt.path == expected_path && evt.kind == expected_kind {
                        return true;
                    }
                }
                _ => return false,
            }
        }
    }

    #[tokio::test]
    async fn watcher_emits_create_modify_delete() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let (tx, _) = broadcast::channel(128);
        let _jh = start_watcher(root.clone(), WatcherConfig::default(), tx.clone()).unwrap();
        let mut rx = tx.subscribe();

        let file = root.join("note.md");
        std::fs::write(&file, b"---\nid: note\n---\n").unwrap();
        assert!(
            recv_event(
                &mut rx,
                &file,
                ChangeKind::Created,
                TokioDuration::from_secs(3)
            )
            .await,
            "no Created event for {}",
            file.display()
        );

        std::fs::write(&file, b"---\nid: note\n---\nchanged\n").unwrap();
        assert!(
            recv_event(
                &mut rx,
                &file,
                ChangeKind::Modified,
                TokioDuration::from_secs(3)
            )
            .await,
            "no Modified event"
        );

        std::fs::remove_file(&file).unwrap();
        assert!(
            recv_event(
                &mut rx,
                &file,
                ChangeKind::Deleted,
                TokioDuration::from_secs(3)
            )
            .await,
            "no Deleted event"
        );
    }

    #[tokio::test]
    async fn non_markdown_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let (tx, _) = broadcast::channel(128);
        let _jh = start_watcher(root.clone(), WatcherConfig::default(), tx.clone()).unwrap();
        let mut rx = tx.subscribe();

        std::fs::write(root.join("image.png"), b"not markdown").unwrap();
        let md = root.join("after.md");
        std::fs::write(&md, b"---\nid: after\n---\n").unwrap();

        // The first event received must be for the markdown file.
        let evt = timeout(TokioDuration::from_secs(3), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        assert_eq!(evt.path, md);
    }

    #[test]
    fn rename_normalizes_to_delete_plus_create() {
        use notify::event::{ModifyKind, RenameMode};
        let event = Event {
            kind: EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            paths: vec![PathBuf::from("/v/old.md"), PathBuf::from("/v/new.md")],
            attrs: Default::default(),
        };
        let normalized = normalize(event);
        assert_eq!(
            normalized,
            vec![
                (PathBuf::from("/v/old.md"), ChangeKind::Deleted),
                (PathBuf::from("/v/new.md"), ChangeKind::Created),
            ]
        );
    }
}
