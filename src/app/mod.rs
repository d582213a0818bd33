// src/app/mod.rs — catalog state, worker plumbing, frame loop

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use eframe::egui::{self as eg, TextureHandle};
use tracing::{error, info, warn};

pub mod batch;
pub mod cache;
pub mod catalog;
pub mod detail;
pub mod error;
pub mod gfx;
pub mod launch;
pub mod prefs;
pub mod resolver;
pub mod scan;
pub mod source;
pub mod types;
pub mod ui;
pub mod utils;

use crate::app::batch::{spawn_batch, BatchMsg};
use crate::app::cache::{poster_cache_path, CacheKey, PosterCache};
use crate::app::catalog::{filter_entries, CatalogEntry};
use crate::app::error::CacheError;
use crate::app::prefs::{
    prefs_path, SettingsStore, KEY_AUTO_SCAN_ON_START, KEY_LAST_SELECTED_CATEGORY, KEY_POSTER_W,
    KEY_ROOT_DIRECTORY,
};
use crate::app::resolver::{PosterResolver, ResolveOptions};
use crate::app::source::HttpSource;
use crate::app::types::{BatchReport, BatchRun, CatalogMsg, FetchDone, PosterState};
use crate::config::AppConfig;

// ---- Tunables ----
pub(crate) const MAX_UPLOADS_PER_FRAME: usize = 4;
const BUSY_REPAINT: Duration = Duration::from_millis(100);
const POSTER_W_RANGE: std::ops::RangeInclusive<f32> = 120.0..=260.0;

pub struct CinedexApp {
    cfg: AppConfig,
    settings: SettingsStore,
    cache: Arc<PosterCache>,
    /// `None` when the HTTP client could not be built; lookups are disabled.
    resolver: Option<Arc<PosterResolver>>,

    // library
    root: Option<PathBuf>,
    categories: Vec<String>,
    selected_category: Option<String>,
    entries: Vec<CatalogEntry>,
    filter_text: String,
    selected: Option<CacheKey>,

    // catalog workers; a result is applied only if its generation is current
    scan_generation: u64,
    load_generation: u64,
    scanning: bool,
    loading: bool,
    catalog_tx: Sender<CatalogMsg>,
    catalog_rx: Receiver<CatalogMsg>,

    // single-entry fetches
    fetch_tx: Sender<FetchDone>,
    fetch_rx: Receiver<FetchDone>,
    poster_states: HashMap<CacheKey, PosterState>,
    textures: HashMap<CacheKey, TextureHandle>,
    broken_textures: HashMap<CacheKey, String>,

    // batch
    batch: Option<BatchRun>,
    batch_report: Option<BatchReport>,
    show_batch_report: bool,

    // settings window
    show_settings: bool,
    settings_root_text: String,
    settings_auto_scan: bool,

    poster_width_ui: f32,
    status: String,
    did_init: bool,
}

impl CinedexApp {
    pub fn new(cfg: AppConfig) -> Result<Self, CacheError> {
        let settings = SettingsStore::load(&prefs_path(&cfg));
        let mut status = String::new();

        let cache = match PosterCache::open(&poster_cache_path(&cfg)) {
            Ok(c) => c,
            Err(e) => {
                error!("Poster cache unavailable: {e}");
                status = format!("Poster cache unavailable ({e}); posters are kept for this session only.");
                PosterCache::open_in_memory()?
            }
        };
        let cache = Arc::new(cache);

        let resolver = match HttpSource::new(&cfg) {
            Ok(src) => Some(Arc::new(PosterResolver::new(
                Arc::clone(&cache),
                Box::new(src),
                ResolveOptions::from(&cfg),
            ))),
            Err(e) => {
                error!("HTTP client unavailable: {e}");
                status = format!("Poster lookups disabled: {e}");
                None
            }
        };

        let root = settings.get(KEY_ROOT_DIRECTORY).map(PathBuf::from);
        let poster_width_ui = settings
            .get_f32(KEY_POSTER_W)
            .map(|w| w.clamp(*POSTER_W_RANGE.start(), *POSTER_W_RANGE.end()))
            .unwrap_or(160.0);
        let settings_root_text = root
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let settings_auto_scan = settings.get_bool(KEY_AUTO_SCAN_ON_START);

        let (catalog_tx, catalog_rx) = mpsc::channel();
        let (fetch_tx, fetch_rx) = mpsc::channel();

        Ok(Self {
            cfg,
            settings,
            cache,
            resolver,
            root,
            categories: Vec::new(),
            selected_category: None,
            entries: Vec::new(),
            filter_text: String::new(),
            selected: None,
            scan_generation: 0,
            load_generation: 0,
            scanning: false,
            loading: false,
            catalog_tx,
            catalog_rx,
            fetch_tx,
            fetch_rx,
            poster_states: HashMap::new(),
            textures: HashMap::new(),
            broken_textures: HashMap::new(),
            batch: None,
            batch_report: None,
            show_batch_report: false,
            show_settings: false,
            settings_root_text,
            settings_auto_scan,
            poster_width_ui,
            status,
            did_init: false,
        })
    }

    fn set_status(&mut self, msg: impl Into<String>) {
        self.status = msg.into();
    }

    pub(crate) fn remember_poster_width(&mut self) {
        self.settings.set(KEY_POSTER_W, format!("{:.1}", self.poster_width_ui));
    }

    // ---------- startup ----------
    fn startup(&mut self, ctx: &eg::Context) {
        if self.root.is_none() {
            self.set_status("Choose a movie folder in Settings to get started.");
            return;
        }
        if self.settings.get_bool(KEY_AUTO_SCAN_ON_START) {
            self.start_scan(ctx);
        } else {
            self.set_status("Press Scan library to list your categories.");
        }
    }

    // ---------- catalog workers ----------
    pub(crate) fn start_scan(&mut self, ctx: &eg::Context) {
        let Some(root) = self.root.clone() else {
            self.set_status("No movie folder configured.");
            return;
        };
        self.scan_generation += 1;
        let generation = self.scan_generation;
        self.scanning = true;
        self.set_status(format!("Scanning {}…", root.display()));

        let tx = self.catalog_tx.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let categories = scan::list_categories(&root);
            let _ = tx.send(CatalogMsg::Categories {
                generation,
                root,
                categories,
            });
            ctx.request_repaint();
        });
    }

    pub(crate) fn select_category(&mut self, ctx: &eg::Context, category: &str) {
        if self.selected_category.as_deref() != Some(category) {
            self.selected = None;
            self.entries.clear();
            self.textures.clear();
            self.broken_textures.clear();
        }
        self.selected_category = Some(category.to_string());
        self.settings.set(KEY_LAST_SELECTED_CATEGORY, category);
        self.reload_category(ctx);
    }

    /// Rebuild the visible category from disk + cache on a worker.
    pub(crate) fn reload_category(&mut self, ctx: &eg::Context) {
        let (Some(root), Some(category)) = (self.root.clone(), self.selected_category.clone()) else {
            return;
        };
        self.load_generation += 1;
        let generation = self.load_generation;
        self.loading = true;

        let tx = self.catalog_tx.clone();
        let cache = Arc::clone(&self.cache);
        let ctx = ctx.clone();
        thread::spawn(move || {
            let entries = catalog::load_category(&root, &category, &cache);
            let _ = tx.send(CatalogMsg::Loaded {
                generation,
                category,
                entries,
            });
            ctx.request_repaint();
        });
    }

    fn poll_catalog(&mut self, ctx: &eg::Context) {
        while let Ok(msg) = self.catalog_rx.try_recv() {
            match msg {
                CatalogMsg::Categories {
                    generation,
                    root,
                    categories,
                } => {
                    if generation != self.scan_generation {
                        continue;
                    }
                    self.scanning = false;
                    info!("{} categories under {}", categories.len(), root.display());
                    self.categories = categories;

                    let remembered = self
                        .settings
                        .get(KEY_LAST_SELECTED_CATEGORY)
                        .filter(|c| self.categories.iter().any(|x| x.as_str() == *c))
                        .map(str::to_string);
                    match remembered.or_else(|| self.categories.first().cloned()) {
                        Some(cat) => self.select_category(ctx, &cat),
                        None => {
                            self.selected_category = None;
                            self.entries.clear();
                            self.load_generation += 1;
                            self.loading = false;
                            self.set_status(format!("No categories found in {}", root.display()));
                        }
                    }
                }
                CatalogMsg::Loaded {
                    generation,
                    category,
                    entries,
                } => {
                    if generation != self.load_generation
                        || self.selected_category.as_deref() != Some(category.as_str())
                    {
                        continue;
                    }
                    self.loading = false;
                    let with_posters = entries.iter().filter(|e| e.poster.is_some()).count();
                    self.set_status(format!(
                        "{category}: {} movies, {with_posters} with posters",
                        entries.len()
                    ));
                    self.entries = entries;
                }
            }
        }
    }

    // ---------- single-entry fetch ----------
    pub(crate) fn request_fetch(&mut self, ctx: &eg::Context, entry: &CatalogEntry, force: bool) {
        let Some(resolver) = self.resolver.clone() else {
            self.set_status("Poster lookups are disabled.");
            return;
        };
        let key = PosterCache::key_for(&entry.folder.category, &entry.folder.name);
        if self.poster_states.get(&key) == Some(&PosterState::Fetching) {
            return;
        }
        self.poster_states.insert(key.clone(), PosterState::Fetching);

        let folder = entry.folder.clone();
        let tx = self.fetch_tx.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let result = resolver.resolve(&folder, force);
            let _ = tx.send(FetchDone { key, result });
            ctx.request_repaint();
        });
    }

    fn poll_fetches(&mut self, ctx: &eg::Context) {
        let mut changed = false;
        while let Ok(done) = self.fetch_rx.try_recv() {
            match done.result {
                Ok(resolved) => {
                    self.poster_states.remove(&done.key);
                    if !resolved.from_cache {
                        // file at the same path was replaced
                        self.textures.remove(&done.key);
                        self.broken_textures.remove(&done.key);
                    }
                    self.set_status(format!("Poster saved for {}", done.key.folder));
                    changed = true;
                }
                Err(err) => {
                    warn!(key = %done.key, "poster fetch failed: {err}");
                    self.poster_states.insert(
                        done.key,
                        PosterState::Failed {
                            label: err.kind_label(),
                            detail: err.to_string(),
                        },
                    );
                }
            }
        }
        if changed {
            self.reload_category(ctx);
        }
    }

    // ---------- batch ----------
    pub(crate) fn missing_poster_folders(&self) -> Vec<scan::MovieFolder> {
        self.entries
            .iter()
            .filter(|e| e.poster.is_none())
            .map(|e| e.folder.clone())
            .collect()
    }

    pub(crate) fn start_batch(&mut self, ctx: &eg::Context) {
        if self.batch.is_some() {
            return;
        }
        let Some(resolver) = self.resolver.clone() else {
            self.set_status("Poster lookups are disabled.");
            return;
        };
        let folders = self.missing_poster_folders();
        if folders.is_empty() {
            self.set_status("Every movie in this category already has a poster.");
            return;
        }

        let total = folders.len();
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let (relay_tx, relay_rx) = mpsc::channel();
        spawn_batch(
            folders,
            resolver,
            false,
            Arc::clone(&cancel),
            Duration::from_millis(self.cfg.batch_delay_ms),
            tx,
        );
        // forward messages and wake the UI for each one
        let ctx = ctx.clone();
        thread::spawn(move || {
            for msg in rx {
                if relay_tx.send(msg).is_err() {
                    break;
                }
                ctx.request_repaint();
            }
        });

        info!("Batch started for {total} movies");
        self.set_status(format!("Fetching {total} missing posters…"));
        self.batch = Some(BatchRun {
            rx: relay_rx,
            cancel,
            done: 0,
            total,
        });
    }

    pub(crate) fn cancel_batch(&mut self) {
        if let Some(run) = &self.batch {
            run.cancel.store(true, Ordering::Relaxed);
            self.set_status("Cancelling after the current movie…");
        }
    }

    fn poll_batch(&mut self, ctx: &eg::Context) {
        let Some(run) = self.batch.as_mut() else {
            return;
        };
        let mut finished = None;
        while let Ok(msg) = run.rx.try_recv() {
            match msg {
                BatchMsg::Progress { done, total } => {
                    run.done = done;
                    run.total = total;
                }
                BatchMsg::Done {
                    outcomes,
                    cancelled,
                    elapsed,
                } => {
                    finished = Some(BatchReport {
                        outcomes,
                        cancelled,
                        elapsed,
                    });
                }
            }
        }

        if let Some(report) = finished {
            self.batch = None;
            for o in report.outcomes.iter().filter(|o| o.is_ok()) {
                let key = PosterCache::key_for(&o.folder.category, &o.folder.name);
                // an earlier failed single fetch no longer applies
                self.poster_states.remove(&key);
                if !o.from_cache {
                    self.textures.remove(&key);
                    self.broken_textures.remove(&key);
                }
            }
            self.set_status(format!(
                "Batch {}: {} fetched, {} failed in {:.1}s",
                if report.cancelled { "cancelled" } else { "finished" },
                report.ok_count(),
                report.failed_count(),
                report.elapsed.as_secs_f32()
            ));
            self.batch_report = Some(report);
            self.show_batch_report = true;
            self.reload_category(ctx);
        }
    }

    // ---------- actions ----------
    pub(crate) fn play_entry(&mut self, entry: &CatalogEntry) {
        let Some(file) = entry.play_target.as_deref() else {
            return;
        };
        match launch::play(&self.cfg, file) {
            Ok(()) => self.set_status(format!("Playing {}", entry.display_title())),
            Err(e) => self.set_status(format!("Could not play {}: {e}", entry.display_title())),
        }
    }

    pub(crate) fn reveal_path(&mut self, path: &Path) {
        if let Err(e) = launch::reveal(path) {
            self.set_status(format!("Could not reveal {}: {e}", path.display()));
        }
    }

    pub(crate) fn prune_cache(&mut self) {
        match self.cache.prune_missing() {
            Ok(n) => self.set_status(format!("Removed {n} stale poster cache entries")),
            Err(e) => self.set_status(format!("Cache cleanup failed: {e}")),
        }
    }

    /// Apply the settings window: new root triggers a rescan.
    pub(crate) fn apply_settings(&mut self, ctx: &eg::Context) {
        let text = self.settings_root_text.trim().to_string();
        let new_root = (!text.is_empty()).then(|| PathBuf::from(&text));

        match &new_root {
            Some(p) => self.settings.set(KEY_ROOT_DIRECTORY, p.display().to_string()),
            None => self.settings.delete(KEY_ROOT_DIRECTORY),
        }
        self.settings
            .set_bool(KEY_AUTO_SCAN_ON_START, self.settings_auto_scan);
        if let Err(e) = self.settings.save() {
            warn!("Failed to save settings: {e}");
            self.set_status(format!("Could not save settings: {e}"));
        }

        if new_root != self.root {
            self.root = new_root;
            self.categories.clear();
            self.selected_category = None;
            self.entries.clear();
            self.selected = None;
            self.textures.clear();
            self.broken_textures.clear();
            self.poster_states.clear();
            if self.root.is_some() {
                self.start_scan(ctx);
            } else {
                // drop whatever running workers would deliver
                self.scan_generation += 1;
                self.load_generation += 1;
                self.scanning = false;
                self.loading = false;
            }
        }
    }

    // ---------- view helpers ----------
    pub(crate) fn visible_entries(&self) -> Vec<&CatalogEntry> {
        filter_entries(&self.entries, &self.filter_text)
    }

    pub(crate) fn entry_by_key(&self, key: &CacheKey) -> Option<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.folder.category == key.category && e.folder.name == key.folder)
    }

    /// Texture for an entry's poster, uploading it if `budget` allows.
    pub(crate) fn poster_texture(
        &mut self,
        ctx: &eg::Context,
        entry: &CatalogEntry,
        budget: &mut usize,
    ) -> Option<TextureHandle> {
        let key = PosterCache::key_for(&entry.folder.category, &entry.folder.name);
        if let Some(tex) = self.textures.get(&key) {
            return Some(tex.clone());
        }
        let path = entry.poster.as_ref()?;
        if self.broken_textures.contains_key(&key) || *budget == 0 {
            return None;
        }
        *budget -= 1;
        match gfx::load_texture_from_path(ctx, path, &key.to_string()) {
            Ok(tex) => {
                self.textures.insert(key, tex.clone());
                Some(tex)
            }
            Err(e) => {
                warn!("Poster texture failed for {key}: {e}");
                self.broken_textures.insert(key, e);
                None
            }
        }
    }

    fn is_busy(&self) -> bool {
        self.scanning
            || self.loading
            || self.batch.is_some()
            || self
                .poster_states
                .values()
                .any(|s| *s == PosterState::Fetching)
    }
}

// ========== App impl ==========
impl eframe::App for CinedexApp {
    fn update(&mut self, ctx: &eg::Context, _frame: &mut eframe::Frame) {
        if !self.did_init {
            self.did_init = true;
            self.startup(ctx);
        }

        self.poll_catalog(ctx);
        self.poll_fetches(ctx);
        self.poll_batch(ctx);

        if self.is_busy() {
            ctx.request_repaint_after(BUSY_REPAINT);
        }

        eg::TopBottomPanel::top("topbar").show(ctx, |ui| {
            self.ui_render_topbar(ui, ctx);
        });
        eg::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.scanning || self.loading {
                    ui.add(eg::Spinner::new().size(12.0));
                }
                ui.label(eg::RichText::new(&self.status).weak());
            });
        });

        if self.selected.is_some() {
            self.ui_render_detail_panel(ctx);
        }

        eg::CentralPanel::default().show(ctx, |ui| {
            if let Some(msg) = self.empty_state_message() {
                self.ui_render_empty_state(ui, ctx, &msg);
            } else {
                self.ui_render_grid(ui, ctx);
            }
        });

        self.ui_render_settings_window(ctx);
        self.ui_render_batch_report(ctx);

        self.settings.maybe_save();
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(run) = &self.batch {
            run.cancel.store(true, Ordering::Relaxed);
        }
        if self.settings.is_dirty() {
            if let Err(e) = self.settings.save() {
                warn!("Failed to save settings on exit: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn app_in(dir: &Path) -> CinedexApp {
        let cfg = AppConfig {
            cache_dir: Some(dir.join("cache").display().to_string()),
            ..AppConfig::default()
        };
        CinedexApp::new(cfg).unwrap()
    }

    fn drain_catalog(app: &mut CinedexApp, ctx: &eg::Context) {
        for _ in 0..200 {
            app.poll_catalog(ctx);
            if !app.scanning && !app.loading {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("catalog worker never answered");
    }

    #[test]
    fn scan_selects_remembered_category() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("movies");
        fs::create_dir_all(root.join("Action").join("Heat")).unwrap();
        fs::create_dir_all(root.join("Comedy").join("Airplane")).unwrap();
        fs::write(root.join("Comedy").join("Airplane").join("a.mp4"), b"x").unwrap();

        let mut app = app_in(dir.path());
        app.root = Some(root);
        app.settings.set(KEY_LAST_SELECTED_CATEGORY, "Comedy");
        let ctx = eg::Context::default();

        app.start_scan(&ctx);
        drain_catalog(&mut app, &ctx);
        // categories arrive first, then the category load
        drain_catalog(&mut app, &ctx);

        assert_eq!(app.categories, vec!["Action", "Comedy"]);
        assert_eq!(app.selected_category.as_deref(), Some("Comedy"));
        assert_eq!(app.entries.len(), 1);
        assert!(app.entries[0].is_playable());
    }

    #[test]
    fn stale_generation_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path());
        app.selected_category = Some("Action".into());
        app.load_generation = 5;
        app.loading = true;
        app.catalog_tx
            .send(CatalogMsg::Loaded {
                generation: 4,
                category: "Action".into(),
                entries: vec![],
            })
            .unwrap();
        app.poll_catalog(&eg::Context::default());
        assert!(app.loading, "older result must not complete the newer request");
    }

    #[test]
    fn failed_fetch_marks_only_that_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path());
        let key = PosterCache::key_for("Action", "Heat");
        app.poster_states.insert(key.clone(), PosterState::Fetching);
        app.fetch_tx
            .send(FetchDone {
                key: key.clone(),
                result: Err(error::ResolveError::NotFound("x".into())),
            })
            .unwrap();
        app.poll_fetches(&eg::Context::default());
        assert_eq!(
            app.poster_states.get(&key),
            Some(&PosterState::Failed {
                label: "not found",
                detail: "no poster found: x".into()
            })
        );
        assert_eq!(app.poster_states.len(), 1);
    }

    #[test]
    fn successful_batch_clears_earlier_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path());
        let heat = PosterCache::key_for("Action", "Heat");
        let ronin = PosterCache::key_for("Action", "Ronin");
        for key in [&heat, &ronin] {
            app.poster_states.insert(
                key.clone(),
                PosterState::Failed {
                    label: "not found",
                    detail: "no poster found: x".into(),
                },
            );
        }

        let (tx, rx) = mpsc::channel();
        app.batch = Some(BatchRun {
            rx,
            cancel: Arc::new(AtomicBool::new(false)),
            done: 0,
            total: 2,
        });
        let folder = |name: &str| scan::MovieFolder {
            category: "Action".into(),
            name: name.into(),
            path: dir.path().join("Action").join(name),
        };
        tx.send(BatchMsg::Done {
            outcomes: vec![
                batch::BatchOutcome {
                    folder: folder("Heat"),
                    result: Ok(dir.path().join("Action").join("Heat").join("poster.jpg")),
                    from_cache: false,
                },
                batch::BatchOutcome {
                    folder: folder("Ronin"),
                    result: Err(error::ResolveError::Download("HTTP 503".into())),
                    from_cache: false,
                },
            ],
            cancelled: false,
            elapsed: Duration::from_millis(5),
        })
        .unwrap();

        app.poll_batch(&eg::Context::default());
        assert!(app.batch.is_none());
        assert_eq!(app.poster_states.get(&heat), None);
        assert!(matches!(app.poster_states.get(&ronin), Some(PosterState::Failed { .. })));
        assert_eq!(app.batch_report.as_ref().map(|r| r.ok_count()), Some(1));
    }

    #[test]
    fn missing_root_prompts_for_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(dir.path());
        app.root = None;
        app.startup(&eg::Context::default());
        assert!(app.status.contains("Settings"));
        assert!(app.empty_state_message().is_some());
    }
}
