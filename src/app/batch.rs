// src/app/batch.rs
// Batch poster job: resolve movie folders one at a time, isolating per-item
// failures. Cancellation is checked between items only.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::app::error::ResolveError;
use crate::app::resolver::PosterResolver;
use crate::app::scan::MovieFolder;
use crate::app::utils::build_search_query;

#[derive(Clone, Debug)]
pub struct BatchOutcome {
    pub folder: MovieFolder,
    pub result: Result<PathBuf, ResolveError>,
    pub from_cache: bool,
}

impl BatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug)]
pub enum BatchMsg {
    Progress { done: usize, total: usize },
    Done {
        outcomes: Vec<BatchOutcome>,
        cancelled: bool,
        elapsed: Duration,
    },
}

/// Resolve every folder in order. Returns one outcome per processed item;
/// fewer than `folders.len()` only when `cancel` was raised.
///
/// `delay` is slept after each item that went to the network, never after a
/// cache hit, an unsearchable name, or the last item.
pub fn run_batch(
    folders: &[MovieFolder],
    resolver: &PosterResolver,
    force_refetch: bool,
    cancel: &AtomicBool,
    delay: Duration,
    mut on_progress: impl FnMut(usize, usize),
) -> Vec<BatchOutcome> {
    let total = folders.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, folder) in folders.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            info!("Batch: cancelled after {i}/{total}");
            break;
        }

        let outcome = match resolver.resolve(folder, force_refetch) {
            Ok(resolved) => BatchOutcome {
                folder: folder.clone(),
                result: Ok(resolved.path),
                from_cache: resolved.from_cache,
            },
            Err(err) => {
                warn!("Batch: {}/{} failed: {err}", folder.category, folder.name);
                BatchOutcome {
                    folder: folder.clone(),
                    result: Err(err),
                    from_cache: false,
                }
            }
        };
        // an empty query fails before any request is made
        let went_to_network = match &outcome.result {
            Ok(_) => !outcome.from_cache,
            Err(_) => !build_search_query(&folder.name).is_empty(),
        };
        outcomes.push(outcome);
        on_progress(i + 1, total);

        if went_to_network && !delay.is_zero() && i + 1 < total {
            thread::sleep(delay);
        }
    }

    let ok = outcomes.iter().filter(|o| o.is_ok()).count();
    info!("Batch: {ok}/{} resolved ({total} queued)", outcomes.len());
    outcomes
}

/// Run [`run_batch`] on a worker thread, streaming progress over `tx`.
pub fn spawn_batch(
    folders: Vec<MovieFolder>,
    resolver: Arc<PosterResolver>,
    force_refetch: bool,
    cancel: Arc<AtomicBool>,
    delay: Duration,
    tx: Sender<BatchMsg>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let started = Instant::now();
        let progress_tx = tx.clone();
        let outcomes = run_batch(
            &folders,
            &resolver,
            force_refetch,
            &cancel,
            delay,
            |done, total| {
                let _ = progress_tx.send(BatchMsg::Progress { done, total });
            },
        );
        let cancelled = outcomes.len() < folders.len();
        let _ = tx.send(BatchMsg::Done {
            outcomes,
            cancelled,
            elapsed: started.elapsed(),
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::cache::PosterCache;
    use crate::app::resolver::tests::{movie, setup, FakeSource};
    use std::fs;
    use std::sync::mpsc;

    #[test]
    fn failing_item_does_not_abort_batch() {
        let fake = FakeSource {
            missing: vec!["Broken".into()],
            ..FakeSource::default()
        };
        let (dir, _fake, resolver) = setup(fake);
        let folders = vec![
            movie(dir.path(), "Action", "Alien"),
            movie(dir.path(), "Action", "Broken"),
            movie(dir.path(), "Action", "Heat"),
            movie(dir.path(), "Action", "Ronin"),
        ];

        let mut progress = Vec::new();
        let outcomes = run_batch(
            &folders,
            &resolver,
            false,
            &AtomicBool::new(false),
            Duration::ZERO,
            |done, total| progress.push((done, total)),
        );

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes[0].is_ok());
        assert!(matches!(outcomes[1].result, Err(ResolveError::NotFound(_))));
        assert!(outcomes[2].is_ok());
        assert!(outcomes[3].is_ok());
        assert_eq!(outcomes[1].folder.name, "Broken");
        assert_eq!(progress, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }

    #[test]
    fn cache_hits_are_reported_and_skip_network() {
        let (dir, fake, resolver) = setup(FakeSource::default());
        let cached = movie(dir.path(), "Drama", "Cached");
        let poster = cached.path.join("poster.jpg");
        fs::write(&poster, b"jpg").unwrap();
        resolver
            .cache()
            .put(&PosterCache::key_for("Drama", "Cached"), &poster, None)
            .unwrap();

        let outcomes = run_batch(
            &[cached],
            &resolver,
            false,
            &AtomicBool::new(false),
            Duration::from_secs(30),
            |_, _| {},
        );
        assert!(outcomes[0].from_cache);
        assert_eq!(outcomes[0].result.as_ref().unwrap(), &poster);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsearchable_names_are_not_paced() {
        let (dir, fake, resolver) = setup(FakeSource::default());
        let folders = vec![
            movie(dir.path(), "Drama", "(1999)"),
            movie(dir.path(), "Drama", "[2001]"),
            movie(dir.path(), "Drama", "Heat"),
        ];

        let started = Instant::now();
        let outcomes = run_batch(
            &folders,
            &resolver,
            false,
            &AtomicBool::new(false),
            Duration::from_secs(5),
            |_, _| {},
        );

        assert!(started.elapsed() < Duration::from_secs(5), "no pause before Heat");
        assert!(matches!(outcomes[0].result, Err(ResolveError::NotFound(_))));
        assert!(matches!(outcomes[1].result, Err(ResolveError::NotFound(_))));
        assert!(outcomes[2].is_ok());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 3, "only Heat made requests");
    }

    #[test]
    fn cancel_stops_between_items() {
        let (dir, _fake, resolver) = setup(FakeSource::default());
        let folders = vec![
            movie(dir.path(), "Action", "Alien"),
            movie(dir.path(), "Action", "Heat"),
            movie(dir.path(), "Action", "Ronin"),
        ];
        let cancel = AtomicBool::new(false);

        let outcomes = run_batch(&folders, &resolver, false, &cancel, Duration::ZERO, |done, _| {
            if done == 1 {
                cancel.store(true, Ordering::Relaxed);
            }
        });

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_ok());
        assert!(folders[0].path.join("poster.jpg").is_file(), "completed item kept");
        assert!(!folders[1].path.join("poster.jpg").exists());
    }

    #[test]
    fn spawned_batch_streams_progress_then_done() {
        let (dir, _fake, resolver) = setup(FakeSource::default());
        let folders = vec![
            movie(dir.path(), "Action", "Alien"),
            movie(dir.path(), "Action", "Heat"),
        ];
        let (tx, rx) = mpsc::channel();
        spawn_batch(
            folders,
            Arc::new(resolver),
            false,
            Arc::new(AtomicBool::new(false)),
            Duration::ZERO,
            tx,
        )
        .join()
        .unwrap();

        let msgs: Vec<BatchMsg> = rx.try_iter().collect();
        assert_eq!(msgs.len(), 3);
        assert!(matches!(msgs[0], BatchMsg::Progress { done: 1, total: 2 }));
        match &msgs[2] {
            BatchMsg::Done {
                outcomes,
                cancelled,
                ..
            } => {
                assert_eq!(outcomes.len(), 2);
                assert!(!cancelled);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
