// src/app/types.rs
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use crate::app::batch::{BatchMsg, BatchOutcome};
use crate::app::cache::CacheKey;
use crate::app::catalog::CatalogEntry;
use crate::app::error::ResolveError;
use crate::app::resolver::ResolvedPoster;

// ---- cross-thread messages ----

/// Worker results tagged with the request generation that produced them.
pub enum CatalogMsg {
    Categories {
        generation: u64,
        root: PathBuf,
        categories: Vec<String>,
    },
    Loaded {
        generation: u64,
        category: String,
        entries: Vec<CatalogEntry>,
    },
}

pub struct FetchDone {
    pub key: CacheKey,
    pub result: Result<ResolvedPoster, ResolveError>,
}

// ---- per-card state ----
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PosterState {
    Fetching,
    Failed { label: &'static str, detail: String },
}

// ---- batch ----
pub struct BatchRun {
    pub rx: Receiver<BatchMsg>,
    pub cancel: Arc<AtomicBool>,
    pub done: usize,
    pub total: usize,
}

impl BatchRun {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f32 / self.total as f32
        }
    }
}

pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn ok_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_ok()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.ok_count()
    }
}
