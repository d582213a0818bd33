// src/app/resolver.rs
// Poster resolution: cache fast path, search, title page, image download,
// atomic write next to the movie, cache write-through.
// Concurrent lookups for the same key share one network pipeline: the first
// caller leads, later callers wait for its result.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use tracing::{debug, info, warn};

use crate::app::cache::{CacheKey, PosterCache};
use crate::app::error::ResolveError;
use crate::app::scan::MovieFolder;
use crate::app::source::{self, PosterSource};
use crate::app::utils::build_search_query;
use crate::config::AppConfig;

pub const POSTER_FILE_NAME: &str = "poster.jpg";

#[derive(Clone, Debug)]
pub struct ResolveOptions {
    pub base_url: String,
    pub max_width: u32,
    pub quality: u8,
}

impl From<&AppConfig> for ResolveOptions {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            base_url: cfg.search_base_url.clone(),
            max_width: cfg.poster_max_width,
            quality: cfg.poster_quality,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPoster {
    pub path: PathBuf,
    pub from_cache: bool,
}

type FlightResult = Result<PathBuf, ResolveError>;

#[derive(Default)]
struct Flight {
    result: Mutex<Option<FlightResult>>,
    ready: Condvar,
}

impl Flight {
    fn publish(&self, result: FlightResult) {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(result);
        }
        self.ready.notify_all();
    }

    fn wait(&self) -> FlightResult {
        let mut slot = self.result.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self.ready.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// Clears the in-flight slot on every exit path; a leader that unwinds
/// without publishing leaves `Interrupted` for its waiters.
struct FlightGuard<'a> {
    in_flight: &'a Mutex<HashMap<CacheKey, Arc<Flight>>>,
    key: CacheKey,
    flight: Arc<Flight>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
        self.flight.publish(Err(ResolveError::Interrupted));
    }
}

enum Role {
    Leader(Arc<Flight>),
    Follower(Arc<Flight>),
}

pub struct PosterResolver {
    cache: Arc<PosterCache>,
    source: Box<dyn PosterSource>,
    opts: ResolveOptions,
    in_flight: Mutex<HashMap<CacheKey, Arc<Flight>>>,
}

impl PosterResolver {
    pub fn new(cache: Arc<PosterCache>, source: Box<dyn PosterSource>, opts: ResolveOptions) -> Self {
        Self {
            cache,
            source,
            opts,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Arc<PosterCache> {
        &self.cache
    }

    /// Resolve the poster for `folder`. With `force_refetch` the cache is
    /// bypassed and the full network pipeline runs.
    pub fn resolve(&self, folder: &MovieFolder, force_refetch: bool) -> Result<ResolvedPoster, ResolveError> {
        let key = PosterCache::key_for(&folder.category, &folder.name);

        if !force_refetch {
            if let Some(path) = self.cache.get(&key) {
                debug!(key = %key, "poster cache hit");
                return Ok(ResolvedPoster {
                    path,
                    from_cache: true,
                });
            }
        }

        let role = {
            let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match map.get(&key) {
                Some(existing) => Role::Follower(Arc::clone(existing)),
                None => {
                    let flight = Arc::new(Flight::default());
                    map.insert(key.clone(), Arc::clone(&flight));
                    Role::Leader(flight)
                }
            }
        };

        let path = match role {
            Role::Follower(flight) => {
                debug!(key = %key, "joining in-flight poster lookup");
                flight.wait()?
            }
            Role::Leader(flight) => {
                let guard = FlightGuard {
                    in_flight: &self.in_flight,
                    key: key.clone(),
                    flight,
                };
                let result = self.fetch_and_store(folder, &key);
                guard.flight.publish(result.clone());
                drop(guard);
                result?
            }
        };

        Ok(ResolvedPoster {
            path,
            from_cache: false,
        })
    }

    fn fetch_and_store(&self, folder: &MovieFolder, key: &CacheKey) -> FlightResult {
        let query = build_search_query(&folder.name);
        if query.is_empty() {
            return Err(ResolveError::NotFound(format!(
                "`{}` has no searchable title",
                folder.name
            )));
        }

        let search_url = source::search_url(&self.opts.base_url, &query);
        info!(key = %key, query = %query, "searching for poster");
        let results = self
            .source
            .fetch_text(&search_url)
            .map_err(|e| ResolveError::NotFound(format!("search for `{query}` failed ({e})")))?;

        let detail_url = source::first_result_url(&results, &self.opts.base_url)
            .ok_or_else(|| ResolveError::NotFound(format!("no results for `{query}`")))?;
        debug!(key = %key, url = %detail_url, "first search result");

        let detail = self
            .source
            .fetch_text(&detail_url)
            .map_err(|e| ResolveError::NotFound(format!("title page {detail_url} failed ({e})")))?;

        let image_url = source::poster_image_url(&detail, &self.opts.base_url)
            .ok_or_else(|| ResolveError::NotFound(format!("no poster image on {detail_url}")))?;
        let info = source::title_info(&detail);
        debug!(key = %key, url = %image_url, has_info = info.is_some(), "poster image");

        let bytes = self
            .source
            .fetch_bytes(&image_url)
            .map_err(|e| ResolveError::Download(format!("{image_url}: {e}")))?;

        let path = store_poster(&bytes, &folder.path, &self.opts)?;

        self.cache
            .put(key, &path, info.as_ref())
            .map_err(|e| ResolveError::fs(self.cache.path(), e))?;

        info!(key = %key, path = %path.display(), "poster stored");
        Ok(path)
    }
}

/// Decode, downscale, re-encode as JPEG and move into place as
/// `<movie_dir>/poster.jpg`. Nothing is visible at the final path until the
/// write completed.
pub fn store_poster(bytes: &[u8], movie_dir: &Path, opts: &ResolveOptions) -> FlightResult {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ResolveError::Download(format!("payload is not an image: {e}")))?;

    let (w, h) = img.dimensions();
    let out: DynamicImage = if w > opts.max_width {
        let new_h = ((h as f32) * (opts.max_width as f32 / w as f32))
            .round()
            .max(1.0) as u32;
        img.resize_exact(opts.max_width, new_h, FilterType::CatmullRom)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(out.to_rgb8());
    let mut jpeg_bytes: Vec<u8> = Vec::new();
    {
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg_bytes, opts.quality);
        encoder
            .encode_image(&rgb)
            .map_err(|e| ResolveError::Download(format!("jpeg encode: {e}")))?;
    }

    let dest = movie_dir.join(POSTER_FILE_NAME);
    let tmp = dest.with_extension("jpg.part");
    let written = fs::File::create(&tmp).and_then(|mut f| {
        f.write_all(&jpeg_bytes)?;
        f.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(ResolveError::fs(&tmp, e));
    }
    if let Err(e) = fs::rename(&tmp, &dest) {
        warn!("failed to move poster into place at {}: {e}", dest.display());
        let _ = fs::remove_file(&tmp);
        return Err(ResolveError::fs(&dest, e));
    }
    Ok(dest)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::app::error::FetchError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub(crate) const BASE: &str = "https://db.test";

    pub(crate) fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(w, h, image::Rgb([200, 30, 30]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    /// In-memory movie database: every search finds one title whose page
    /// carries one poster, unless the query is listed in `missing`.
    pub(crate) struct FakeSource {
        pub calls: AtomicUsize,
        pub missing: Vec<String>,
        pub image_status: Option<u16>,
        pub image: Vec<u8>,
        pub delay: Duration,
        /// `<title>` text served on every title page.
        pub title_tag: Option<String>,
    }

    impl Default for FakeSource {
        fn default() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                missing: Vec::new(),
                image_status: None,
                image: png_bytes(40, 60),
                delay: Duration::ZERO,
                title_tag: None,
            }
        }
    }

    impl PosterSource for Arc<FakeSource> {
        fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if url.contains("/find/") {
                if self.missing.iter().any(|m| url.contains(&urlencoding::encode(m).into_owned())) {
                    return Ok("<p>No results found</p>".into());
                }
                return Ok(r#"<a class="ipc-metadata-list-summary-item__t" href="/title/tt1/">x</a>"#.into());
            }
            let title = self
                .title_tag
                .as_ref()
                .map(|t| format!("<title>{t}</title>"))
                .unwrap_or_default();
            Ok(format!(r#"{title}<img class="ipc-image" src="/img/tt1.jpg">"#))
        }

        fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.image_status {
                Some(code) => Err(FetchError::Status(code)),
                None => Ok(self.image.clone()),
            }
        }
    }

    pub(crate) fn opts() -> ResolveOptions {
        ResolveOptions {
            base_url: BASE.into(),
            max_width: 20,
            quality: 80,
        }
    }

    pub(crate) fn setup(fake: FakeSource) -> (tempfile::TempDir, Arc<FakeSource>, PosterResolver) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(PosterCache::open(&dir.path().join("posters.db")).unwrap());
        let fake = Arc::new(fake);
        let resolver = PosterResolver::new(cache, Box::new(Arc::clone(&fake)), opts());
        (dir, fake, resolver)
    }

    pub(crate) fn movie(root: &Path, category: &str, name: &str) -> MovieFolder {
        let path = root.join(category).join(name);
        fs::create_dir_all(&path).unwrap();
        MovieFolder {
            category: category.into(),
            name: name.into(),
            path,
        }
    }

    #[test]
    fn full_pipeline_writes_poster_and_cache() {
        let (dir, fake, resolver) = setup(FakeSource::default());
        let m = movie(dir.path(), "Action", "Die.Hard.1988");

        let got = resolver.resolve(&m, false).unwrap();
        assert!(!got.from_cache);
        assert_eq!(got.path, m.path.join(POSTER_FILE_NAME));
        assert!(got.path.is_file());
        assert!(!m.path.join("poster.jpg.part").exists());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 3);

        let decoded = image::open(&got.path).unwrap();
        assert_eq!(decoded.width(), 20, "poster is downscaled to max width");

        let key = PosterCache::key_for("Action", "Die.Hard.1988");
        assert_eq!(resolver.cache().get(&key), Some(got.path));
    }

    #[test]
    fn title_info_from_detail_page_is_cached() {
        let fake = FakeSource {
            title_tag: Some("Die Hard (1988) - IMDb".into()),
            ..FakeSource::default()
        };
        let (dir, _fake, resolver) = setup(fake);
        let m = movie(dir.path(), "Action", "Die.Hard.1988");

        resolver.resolve(&m, false).unwrap();
        let hit = resolver
            .cache()
            .lookup(&PosterCache::key_for("Action", "Die.Hard.1988"))
            .unwrap();
        let info = hit.info.unwrap();
        assert_eq!(info.title.as_deref(), Some("Die Hard"));
        assert_eq!(info.year, Some(1988));
    }

    #[test]
    fn cache_hit_makes_no_network_calls() {
        let (dir, fake, resolver) = setup(FakeSource::default());
        let m = movie(dir.path(), "Action", "Heat");
        let poster = m.path.join("poster.jpg");
        fs::write(&poster, b"existing").unwrap();
        resolver
            .cache()
            .put(&PosterCache::key_for("Action", "Heat"), &poster, None)
            .unwrap();

        let got = resolver.resolve(&m, false).unwrap();
        assert!(got.from_cache);
        assert_eq!(got.path, poster);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn force_refetch_always_hits_network() {
        let (dir, fake, resolver) = setup(FakeSource::default());
        let m = movie(dir.path(), "Action", "Heat");
        let poster = m.path.join("poster.jpg");
        fs::write(&poster, b"old").unwrap();
        resolver
            .cache()
            .put(&PosterCache::key_for("Action", "Heat"), &poster, None)
            .unwrap();

        let got = resolver.resolve(&m, true).unwrap();
        assert!(!got.from_cache);
        assert_eq!(fake.calls.load(Ordering::SeqCst), 3);
        assert_ne!(fs::read(&poster).unwrap(), b"old".to_vec(), "poster overwritten");
    }

    #[test]
    fn no_search_result_is_not_found() {
        let fake = FakeSource {
            missing: vec!["Nothing Here".into()],
            ..FakeSource::default()
        };
        let (dir, _fake, resolver) = setup(fake);
        let m = movie(dir.path(), "Drama", "Nothing.Here");

        let err = resolver.resolve(&m, false).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)), "{err:?}");
        assert!(!m.path.join(POSTER_FILE_NAME).exists());
    }

    #[test]
    fn empty_query_is_not_found_without_network() {
        let (dir, fake, resolver) = setup(FakeSource::default());
        let m = movie(dir.path(), "Drama", "(1999)");
        let err = resolver.resolve(&m, false).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(_)));
        assert_eq!(fake.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_download_leaves_no_cache_entry() {
        let fake = FakeSource {
            image_status: Some(503),
            ..FakeSource::default()
        };
        let (dir, _fake, resolver) = setup(fake);
        let m = movie(dir.path(), "Action", "Heat");

        let err = resolver.resolve(&m, false).unwrap_err();
        assert!(matches!(err, ResolveError::Download(_)), "{err:?}");
        assert!(!m.path.join(POSTER_FILE_NAME).exists());
        assert_eq!(resolver.cache().get(&PosterCache::key_for("Action", "Heat")), None);
    }

    #[test]
    fn undecodable_image_is_download_error() {
        let fake = FakeSource {
            image: b"<html>blocked</html>".to_vec(),
            ..FakeSource::default()
        };
        let (dir, _fake, resolver) = setup(fake);
        let m = movie(dir.path(), "Action", "Heat");
        let err = resolver.resolve(&m, false).unwrap_err();
        assert!(matches!(err, ResolveError::Download(_)));
        assert!(resolver.cache().entries().unwrap().is_empty());
    }

    #[test]
    fn unwritable_movie_folder_is_fs_error() {
        let (dir, _fake, resolver) = setup(FakeSource::default());
        let m = MovieFolder {
            category: "Action".into(),
            name: "Heat".into(),
            path: dir.path().join("does-not-exist"),
        };
        let err = resolver.resolve(&m, false).unwrap_err();
        assert!(matches!(err, ResolveError::FileSystem { .. }), "{err:?}");
        assert!(resolver.cache().entries().unwrap().is_empty());
    }

    #[test]
    fn concurrent_lookups_share_one_fetch() {
        let fake = FakeSource {
            delay: Duration::from_millis(150),
            ..FakeSource::default()
        };
        let (dir, fake, resolver) = setup(fake);
        let m = movie(dir.path(), "Action", "Heat");

        let results: Vec<_> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| resolver.resolve(&m, true)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for r in &results {
            assert_eq!(r.as_ref().unwrap().path, m.path.join(POSTER_FILE_NAME));
        }
        assert_eq!(fake.calls.load(Ordering::SeqCst), 3, "one pipeline for all callers");
        assert!(resolver.in_flight.lock().unwrap().is_empty());
    }

    #[test]
    fn in_flight_slot_is_cleared_after_failure() {
        let fake = FakeSource {
            image_status: Some(404),
            ..FakeSource::default()
        };
        let (dir, fake, resolver) = setup(fake);
        let m = movie(dir.path(), "Action", "Heat");

        assert!(resolver.resolve(&m, false).is_err());
        assert!(resolver.in_flight.lock().unwrap().is_empty());
        assert!(resolver.resolve(&m, false).is_err());
        assert_eq!(fake.calls.load(Ordering::SeqCst), 6, "second call retried");
    }

    #[test]
    fn store_poster_keeps_small_images_unscaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = store_poster(&png_bytes(10, 15), dir.path(), &opts()).unwrap();
        let img = image::open(path).unwrap();
        assert_eq!((img.width(), img.height()), (10, 15));
    }
}
