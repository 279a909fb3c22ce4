//! Settle-window debouncer.
//!
//! Editors and atomic-save tooling emit bursts of events per file; acting on
//! each would re-parse partially-written content. Events are coalesced per
//! `(source, path)` and released only after the path has been quiet for the
//! configured window. The latest kind wins, so a create-then-remove burst
//! settles as a remove.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::trace;

use crate::events::{SyncEvent, SyncEventKind, SyncSource};

/// Coalesce `input` into settled events, released after `window` of quiet.
///
/// The returned receiver closes once `input` closes and all pending events
/// have been flushed. A zero window passes events through on the next tick.
pub fn settle(
    mut input: mpsc::UnboundedReceiver<SyncEvent>,
    window: Duration,
) -> mpsc::UnboundedReceiver<SyncEvent> {
    let (tx, out) = mpsc::unbounded_channel();
    drop(tokio::spawn(async move {
        let mut pending: HashMap<(SyncSource, PathBuf), (SyncEventKind, Instant)> = HashMap::new();
        loop {
            let next_due = pending.values().map(|(_, due)| *due).min();
            tokio::select! {
                event = input.recv() => {
                    match event {
                        Some(event) => {
                            trace!(source = event.source.label(), path = %event.path.display(), "raw watch event");
                            let _ = pending.insert(
                                (event.source, event.path),
                                (event.kind, Instant::now() + window),
                            );
                        }
                        None => break,
                    }
                }
                () = sleep_until_opt(next_due) => {
                    let now = Instant::now();
                    let due: Vec<_> = pending
                        .iter()
                        .filter(|(_, (_, deadline))| *deadline <= now)
                        .map(|(key, _)| key.clone())
                        .collect();
                    for key in due {
                        if let Some((kind, _)) = pending.remove(&key) {
                            let (source, path) = key;
                            if tx.send(SyncEvent { source, kind, path }).is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
        // Input closed: flush whatever is still settling.
        for ((source, path), (kind, _)) in pending {
            let _ = tx.send(SyncEvent { source, kind, path });
        }
    }));
    out
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: SyncEventKind, path: &str) -> SyncEvent {
        SyncEvent {
            source: SyncSource::Personas,
            kind,
            path: PathBuf::from(path),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_for_one_path_coalesces_to_latest_kind() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut out = settle(rx, Duration::from_millis(300));

        tx.send(event(SyncEventKind::Added, "/p/a.json")).unwrap();
        tx.send(event(SyncEventKind::Changed, "/p/a.json")).unwrap();
        tx.send(event(SyncEventKind::Removed, "/p/a.json")).unwrap();

        let settled = out.recv().await.unwrap();
        assert_eq!(settled.kind, SyncEventKind::Removed);
        assert_eq!(settled.path, PathBuf::from("/p/a.json"));

        // Nothing else pending.
        drop(tx);
        assert!(out.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_paths_each_settle() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut out = settle(rx, Duration::from_millis(100));

        tx.send(event(SyncEventKind::Changed, "/p/a.json")).unwrap();
        tx.send(event(SyncEventKind::Changed, "/p/b.json")).unwrap();
        drop(tx);

        let mut paths = vec![
            out.recv().await.unwrap().path,
            out.recv().await.unwrap().path,
        ];
        paths.sort();
        assert_eq!(paths, [PathBuf::from("/p/a.json"), PathBuf::from("/p/b.json")]);
        assert!(out.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_writes_keep_resetting_the_window() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut out = settle(rx, Duration::from_millis(300));

        for _ in 0..5 {
            tx.send(event(SyncEventKind::Changed, "/p/a.json")).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            // Still inside the window, so nothing has been released yet.
            assert!(out.try_recv().is_err());
        }

        tokio::time::sleep(Duration::from_millis(400)).await;
        let settled = out.recv().await.unwrap();
        assert_eq!(settled.kind, SyncEventKind::Changed);
    }

    #[tokio::test(start_paused = true)]
    async fn close_flushes_pending_events() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut out = settle(rx, Duration::from_secs(60));

        tx.send(event(SyncEventKind::Added, "/p/a.json")).unwrap();
        drop(tx);

        let settled = out.recv().await.unwrap();
        assert_eq!(settled.kind, SyncEventKind::Added);
        assert!(out.recv().await.is_none());
    }
}
